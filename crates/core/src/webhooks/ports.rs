//! Port interface for the webhook deduplication ledger

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sellersync_domain::{Result, WebhookLedgerEntry};

/// Trait for the webhook ledger
///
/// The unique event id is the deduplication mechanism.
#[async_trait]
pub trait WebhookLedger: Send + Sync {
    /// Insert `entry` unless its event id exists. Returns `false` for a
    /// duplicate, without modifying the stored entry.
    async fn insert_if_absent(&self, entry: &WebhookLedgerEntry) -> Result<bool>;

    async fn get(&self, event_id: &str) -> Result<Option<WebhookLedgerEntry>>;

    async fn mark_processed(&self, event_id: &str, processed_at: DateTime<Utc>) -> Result<()>;

    /// Unprocessed entries received before `cutoff` and requeued fewer than
    /// `max_requeues` times, oldest first.
    async fn list_unprocessed_older_than(
        &self,
        cutoff: DateTime<Utc>,
        max_requeues: u32,
        limit: usize,
    ) -> Result<Vec<WebhookLedgerEntry>>;

    /// Count one sweep requeue of `event_id`, returning the new total.
    async fn record_requeue(&self, event_id: &str) -> Result<u32>;
}
