// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{build_check_config, build_checker, resolve_site_dir, watch_commands};

// Re-export the checker surface from mendlink-checker
pub use mendlink_checker::{
    CheckScheduler, CorrectionKind, Corrector, CycleReport, LinkValidator, SchedulerHandle,
    SiteChecker,
};
