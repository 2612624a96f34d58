//! Recovery of ledger entries whose queue message was lost

use std::time::Duration;

use chrono::Utc;
use sellersync_domain::{Result, SellerSyncError};
use tracing::{info, instrument, warn};

use super::ingester::webhook_message;
use super::ports::WebhookLedger;
use crate::queue::MessageQueue;

/// Re-enqueue up to `limit` entries that stayed unprocessed for `min_age`.
///
/// A message still in flight may be queued twice; processing is an upsert,
/// so the duplicate is harmless. An entry is requeued at most
/// `max_requeues` times, after which it stays unprocessed in the ledger.
#[instrument(skip(ledger, queue))]
pub async fn requeue_unprocessed(
    ledger: &dyn WebhookLedger,
    queue: &dyn MessageQueue,
    min_age: Duration,
    max_requeues: u32,
    limit: usize,
) -> Result<usize> {
    let min_age = chrono::Duration::from_std(min_age)
        .map_err(|e| SellerSyncError::Config(format!("sweep age out of range: {e}")))?;
    let stale = ledger
        .list_unprocessed_older_than(Utc::now() - min_age, max_requeues, limit)
        .await?;

    for entry in &stale {
        queue.enqueue(webhook_message(entry));
        let requeues = ledger.record_requeue(&entry.event_id).await?;
        if requeues >= max_requeues {
            warn!(
                event_id = %entry.event_id,
                requeues,
                "Webhook event reached the requeue limit, leaving it for inspection"
            );
        }
    }
    if !stale.is_empty() {
        info!(requeued = stale.len(), "Requeued unprocessed webhook events");
    }
    Ok(stale.len())
}
