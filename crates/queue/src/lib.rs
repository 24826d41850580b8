//! Background jobs for osccai.
//!
//! - **Scheduler**: periodic batch score recalculation, as an in-process
//!   alternative to the external cron trigger

pub mod scheduler;

pub use scheduler::{JobExecutor, ScheduledJob, SchedulerConfig, SchedulerState, run_scheduler};
