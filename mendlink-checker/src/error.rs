use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Scheduler is no longer running")]
    SchedulerGone,
}

pub type Result<T> = std::result::Result<T, CheckError>;
