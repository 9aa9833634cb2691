pub mod checker;
pub mod correct;
pub mod error;
pub mod page;
pub mod probe;
pub mod scheduler;

pub use checker::{CorrectedLink, CycleReport, SiteChecker};
pub use correct::{Correction, CorrectionKind, Corrector};
pub use error::CheckError;
pub use page::{Anchor, Page};
pub use probe::{LinkValidator, ProbeOutcome};
pub use scheduler::{CheckScheduler, SchedulerHandle};
