use crate::config::DeployConfig;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Marker file not found: {0}")]
    MissingMarker(PathBuf),

    #[error("Environment variable {0} is not set")]
    MissingToken(String),

    #[error("Step '{step}' failed with exit code {code}")]
    StepFailed { step: String, code: i32 },

    #[error("Deploy failed after {attempts} attempts")]
    DeployExhausted { attempts: u32 },

    #[error("Failed to run '{step}': {source}")]
    Spawn {
        step: String,
        #[source]
        source: std::io::Error,
    },
}

/// Abstraction over subprocess execution so the pipeline is testable
/// without touching a real package manager or hosting CLI.
pub trait CommandRunner {
    fn run(&mut self, program: &str, args: &[&str], cwd: &Path) -> std::io::Result<i32>;
}

/// Runs commands for real via std::process.
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&mut self, program: &str, args: &[&str], cwd: &Path) -> std::io::Result<i32> {
        let status = Command::new(program).args(args).current_dir(cwd).status()?;
        Ok(status.code().unwrap_or(-1))
    }
}

/// The deployment pipeline: verify preconditions, build and export the
/// site, then push it to the hosting provider. Every step is fatal except
/// the final deploy, which gets a bounded retry with a fixed pause.
pub struct DeployPipeline<R: CommandRunner> {
    config: DeployConfig,
    runner: R,
}

impl DeployPipeline<ShellRunner> {
    pub fn new(config: DeployConfig) -> Self {
        Self::with_runner(config, ShellRunner)
    }
}

impl<R: CommandRunner> DeployPipeline<R> {
    pub fn with_runner(config: DeployConfig, runner: R) -> Self {
        Self { config, runner }
    }

    pub fn run(&mut self) -> Result<(), DeployError> {
        self.run_with_lookup(|var| std::env::var(var).ok())
    }

    /// `lookup` resolves environment variables; injected for tests.
    pub fn run_with_lookup<F>(&mut self, lookup: F) -> Result<(), DeployError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Preconditions come first: no command runs until both pass.
        let marker = self.config.project_dir.join(&self.config.marker_file);
        if !marker.exists() {
            return Err(DeployError::MissingMarker(marker));
        }
        if lookup(&self.config.token_var).is_none() {
            return Err(DeployError::MissingToken(self.config.token_var.clone()));
        }

        let pm = self.config.package_manager.clone();
        self.step("install", &pm, &["install"])?;
        self.step("build", &pm, &["run", "build"])?;
        self.step("export", &pm, &["run", "export"])?;
        self.deploy()
    }

    fn step(&mut self, name: &str, program: &str, args: &[&str]) -> Result<(), DeployError> {
        info!("Running step '{}': {} {}", name, program, args.join(" "));
        let cwd = self.config.project_dir.clone();
        let code = self
            .runner
            .run(program, args, &cwd)
            .map_err(|source| DeployError::Spawn {
                step: name.to_string(),
                source,
            })?;
        if code != 0 {
            error!("Step '{}' failed with exit code {}", name, code);
            return Err(DeployError::StepFailed {
                step: name.to_string(),
                code,
            });
        }
        Ok(())
    }

    fn deploy(&mut self) -> Result<(), DeployError> {
        let publish_dir = self.config.publish_dir.clone();
        let args = ["deploy", "--prod", "--dir", publish_dir.as_str()];
        let cwd = self.config.project_dir.clone();

        for attempt in 1..=self.config.deploy_retries {
            info!(
                "Deploy attempt {}/{}",
                attempt, self.config.deploy_retries
            );
            match self.runner.run("netlify", &args, &cwd) {
                Ok(0) => {
                    info!("Deploy succeeded on attempt {}", attempt);
                    return Ok(());
                }
                Ok(code) => {
                    warn!("Deploy attempt {} exited with code {}", attempt, code);
                }
                Err(e) => {
                    warn!("Deploy attempt {} could not run: {}", attempt, e);
                }
            }
            if attempt < self.config.deploy_retries {
                std::thread::sleep(Duration::from_secs(self.config.retry_pause_secs));
            }
        }
        Err(DeployError::DeployExhausted {
            attempts: self.config.deploy_retries,
        })
    }
}
