//! Background job scheduling and execution system.
//!
//! Jobs run on fixed intervals or in response to hooks. The scheduler keeps
//! run history and schedule state in the server store so that the interval
//! grid survives restarts.

mod audit_logger;
mod context;
mod handle;
mod job;
pub mod jobs;
mod scheduler;

pub use audit_logger::JobAuditLogger;
pub use context::JobContext;
pub use handle::{JobInfo, JobRunInfo, JobScheduleInfo, SchedulerHandle};
pub use job::{BackgroundJob, HookEvent, JobError, JobSchedule, ShutdownBehavior};
pub use scheduler::{create_scheduler, JobScheduler};
