//! Asynchronous delivery primitives.

pub mod queue;

pub use queue::{Delivery, DeliveryQueue, QueueConfig, QueueError, QueueResult, ReceiptHandle};
