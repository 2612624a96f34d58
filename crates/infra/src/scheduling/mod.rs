//! Scheduling infrastructure for background tasks
//!
//! - `SyncScheduler`: cron-driven full sync of every connected account
//!
//! Lifecycles are explicit (`start`/`stop`) with timeouts on every
//! scheduler call.

pub mod error;
pub mod sync_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use sync_scheduler::{SyncScheduler, SyncSchedulerConfig};
