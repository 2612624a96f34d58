//! Synchronous, cheap acceptance of marketplace push notifications

use std::sync::Arc;

use sellersync_domain::{
    IngestOutcome, QueueMessage, Result, SellerSyncError, WebhookLedgerEntry, WebhookNotification,
};
use tracing::{debug, info, instrument};

use super::ports::WebhookLedger;
use crate::queue::MessageQueue;

/// Records notifications in the ledger and queues them for the worker.
///
/// A notification whose event id is already in the ledger is a redelivery
/// and is acknowledged without queuing anything.
pub struct WebhookIngester {
    ledger: Arc<dyn WebhookLedger>,
    queue: Arc<dyn MessageQueue>,
}

impl WebhookIngester {
    pub fn new(ledger: Arc<dyn WebhookLedger>, queue: Arc<dyn MessageQueue>) -> Self {
        Self { ledger, queue }
    }

    /// `raw` is the request body as received, kept on the ledger entry.
    #[instrument(
        skip(self, notification, raw),
        fields(topic = %notification.topic, resource = %notification.resource)
    )]
    pub async fn accept(&self, notification: &WebhookNotification, raw: &str) -> Result<IngestOutcome> {
        if notification.topic.trim().is_empty() || notification.resource.trim().is_empty() {
            return Err(SellerSyncError::InvalidInput(
                "notification requires a topic and a resource".into(),
            ));
        }

        let entry = WebhookLedgerEntry::received(notification, raw.to_string());
        if !self.ledger.insert_if_absent(&entry).await? {
            debug!(event_id = %entry.event_id, "Duplicate notification ignored");
            return Ok(IngestOutcome::Duplicate);
        }

        let message_id = self.queue.enqueue(webhook_message(&entry));
        info!(event_id = %entry.event_id, %message_id, "Notification accepted");
        Ok(IngestOutcome::Accepted)
    }
}

/// Queue payload for a ledger entry.
pub(crate) fn webhook_message(entry: &WebhookLedgerEntry) -> QueueMessage {
    QueueMessage::Webhook {
        event_id: entry.event_id.clone(),
        topic: entry.topic.clone(),
        resource: entry.resource.clone(),
        seller_user_id: entry.seller_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::harness;

    fn notification(id: Option<&str>, sent: Option<&str>) -> WebhookNotification {
        WebhookNotification {
            id: id.map(ToString::to_string),
            resource: "/orders/2000001".into(),
            topic: "orders_v2".into(),
            user_id: "1001".into(),
            attempts: Some(1),
            sent: sent.map(ToString::to_string),
            received: None,
        }
    }

    /// Validates idempotent ingest.
    ///
    /// Assertions:
    /// - The first delivery is accepted and queued.
    /// - The redelivery is a duplicate with no second ledger entry or message.
    #[tokio::test]
    async fn test_redelivery_is_duplicate() {
        let h = harness();
        let ingester = h.ingester();
        let event = notification(Some("evt-1"), None);

        assert_eq!(ingester.accept(&event, "{}").await.unwrap(), IngestOutcome::Accepted);
        assert_eq!(ingester.accept(&event, "{}").await.unwrap(), IngestOutcome::Duplicate);

        assert_eq!(h.ledger.len(), 1);
        assert_eq!(h.queue.len(), 1);
        let queued = h.queue.receive(1).remove(0).body;
        assert_eq!(
            queued,
            QueueMessage::Webhook {
                event_id: "evt-1".into(),
                topic: "orders_v2".into(),
                resource: "/orders/2000001".into(),
                seller_user_id: "1001".into(),
            }
        );
    }

    /// Validates the fallback key for notifications without an id.
    #[tokio::test]
    async fn test_fallback_key_separates_sends() {
        let h = harness();
        let ingester = h.ingester();

        let first = notification(None, Some("2024-05-01T10:00:00Z"));
        let second = notification(None, Some("2024-05-01T10:05:00Z"));
        assert_eq!(ingester.accept(&first, "{}").await.unwrap(), IngestOutcome::Accepted);
        assert_eq!(ingester.accept(&first, "{}").await.unwrap(), IngestOutcome::Duplicate);
        assert_eq!(ingester.accept(&second, "{}").await.unwrap(), IngestOutcome::Accepted);
        assert_eq!(h.ledger.len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_blank_topic() {
        let h = harness();
        let mut event = notification(Some("evt-2"), None);
        event.topic = "  ".into();

        let err = h.ingester().accept(&event, "{}").await.unwrap_err();
        assert!(matches!(err, SellerSyncError::InvalidInput(_)));
        assert!(h.ledger.is_empty());
        assert!(h.queue.is_empty());
    }

    #[tokio::test]
    async fn test_raw_body_is_kept() {
        let h = harness();
        let raw = r#"{"_id":"evt-3","topic":"orders_v2"}"#;
        h.ingester().accept(&notification(Some("evt-3"), None), raw).await.unwrap();

        let entry = h.ledger.get("evt-3").await.unwrap().unwrap();
        assert_eq!(entry.payload, raw);
        assert!(!entry.processed);
    }
}
