//! Webhook/refresh delivery queue wiring.

use std::sync::Arc;
use std::time::Duration;

use sellersync_common::sync::queue::{DeliveryQueue, QueueConfig};
use sellersync_domain::{QueueMessage, Result, SellerSyncError, WorkerConfig};

/// The process-local queue carrying [`QueueMessage`]s to the webhook worker.
pub type InMemoryQueue = DeliveryQueue<QueueMessage>;

#[must_use]
pub fn queue_config(config: &WorkerConfig) -> QueueConfig {
    QueueConfig {
        visibility_timeout: Duration::from_secs(config.visibility_timeout_secs),
        max_receive_count: config.max_receive_count,
        max_dead_letters: config.max_dead_letters,
    }
}

pub fn build_queue(config: &WorkerConfig) -> Result<Arc<InMemoryQueue>> {
    DeliveryQueue::new(queue_config(config))
        .map(Arc::new)
        .map_err(|e| SellerSyncError::Config(format!("invalid worker queue settings: {e}")))
}
