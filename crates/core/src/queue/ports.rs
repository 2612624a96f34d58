//! Port interface for the message queue feeding the webhook worker

use sellersync_common::sync::queue::{Delivery, DeliveryQueue, QueueError};
use sellersync_domain::{QueueMessage, Result, SellerSyncError};
use uuid::Uuid;

/// At-least-once queue with manual acknowledgement.
///
/// `receive` hides messages for a visibility window; only `delete` removes
/// them for good. Anything not deleted is delivered again.
pub trait MessageQueue: Send + Sync {
    fn enqueue(&self, message: QueueMessage) -> Uuid;

    fn receive(&self, max: usize) -> Vec<Delivery<QueueMessage>>;

    fn delete(&self, delivery: &Delivery<QueueMessage>) -> Result<()>;

    /// Messages not yet acknowledged.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MessageQueue for DeliveryQueue<QueueMessage> {
    fn enqueue(&self, message: QueueMessage) -> Uuid {
        DeliveryQueue::enqueue(self, message)
    }

    fn receive(&self, max: usize) -> Vec<Delivery<QueueMessage>> {
        DeliveryQueue::receive(self, max)
    }

    fn delete(&self, delivery: &Delivery<QueueMessage>) -> Result<()> {
        DeliveryQueue::delete(self, &delivery.receipt).map_err(|e| match e {
            QueueError::ReceiptNotFound(receipt) => {
                SellerSyncError::NotFound(format!("queue receipt {receipt}"))
            }
            other => SellerSyncError::Internal(other.to_string()),
        })
    }

    fn len(&self) -> usize {
        DeliveryQueue::len(self)
    }
}
