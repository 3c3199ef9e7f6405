pub mod email_template;
pub mod scheduler;
pub mod workflow;

pub use scheduler::{ReportScheduler, SchedulerStatus};
pub use workflow::{CycleSummary, ReportError, ReportWorkflow};
