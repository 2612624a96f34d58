//! In-process delivery queue with visibility timeouts
//!
//! Messages are hidden (not removed) on receive and must be deleted with the
//! receipt handle once processed. Anything left unacknowledged becomes
//! visible again after the visibility timeout, so delivery is at-least-once.

mod core;
mod errors;
mod types;

pub use self::core::DeliveryQueue;
pub use self::errors::{QueueError, QueueResult};
pub use self::types::{Delivery, QueueConfig, QueueStats, ReceiptHandle};
