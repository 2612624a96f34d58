//! Dispatch of queued messages to the sync-one routines

use std::sync::Arc;

use chrono::Utc;
use sellersync_domain::{
    resource_id_from_path, QueueMessage, ResourceKind, Result, SellerSyncError, UpsertOutcome,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::ports::WebhookLedger;
use crate::accounts::ports::AccountRepository;
use crate::sync::SyncOrchestrator;

/// What processing a message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Synced { kind: ResourceKind, outcome: UpsertOutcome },
    /// Nothing to sync; the reason is logged and returned.
    Skipped(String),
}

/// Handles one queue message at a time.
///
/// An `Err` means the message was not handled and should be redelivered.
/// Webhook messages that cannot be acted on (unknown seller, unsupported
/// topic, unusable resource path, revoked credentials, a record the
/// marketplace reports as missing or gone) are marked processed and reported
/// as [`ProcessOutcome::Skipped`].
pub struct WebhookProcessor {
    accounts: Arc<dyn AccountRepository>,
    ledger: Arc<dyn WebhookLedger>,
    orchestrator: SyncOrchestrator,
}

impl WebhookProcessor {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        ledger: Arc<dyn WebhookLedger>,
        orchestrator: SyncOrchestrator,
    ) -> Self {
        Self { accounts, ledger, orchestrator }
    }

    #[instrument(skip(self, message), fields(kind = message.kind()))]
    pub async fn process(&self, message: &QueueMessage) -> Result<ProcessOutcome> {
        match message {
            QueueMessage::Webhook { event_id, topic, resource, seller_user_id } => {
                let outcome = self.process_webhook(topic, resource, seller_user_id).await?;
                self.ledger.mark_processed(event_id, Utc::now()).await?;
                debug!(%event_id, ?outcome, "Ledger entry marked processed");
                Ok(outcome)
            }
            QueueMessage::SyncItem { account_id, resource_id } => {
                self.sync(ResourceKind::Items, *account_id, resource_id).await
            }
            QueueMessage::SyncOrder { account_id, resource_id } => {
                self.sync(ResourceKind::Orders, *account_id, resource_id).await
            }
            QueueMessage::SyncShipment { account_id, resource_id } => {
                self.sync(ResourceKind::Shipments, *account_id, resource_id).await
            }
            QueueMessage::SyncQuestion { account_id, resource_id } => {
                self.sync(ResourceKind::Questions, *account_id, resource_id).await
            }
        }
    }

    async fn process_webhook(
        &self,
        topic: &str,
        resource: &str,
        seller_user_id: &str,
    ) -> Result<ProcessOutcome> {
        let Some(kind) = ResourceKind::from_topic(topic) else {
            return Ok(skip(format!("unsupported topic {topic}")));
        };
        let Some(resource_id) = resource_id_from_path(resource) else {
            return Ok(skip(format!("no resource id in {resource}")));
        };
        let Some(account) = self.accounts.find_by_seller_id(seller_user_id).await? else {
            return Ok(skip(format!("unknown seller {seller_user_id}")));
        };

        match self.sync(kind, account.id, resource_id).await {
            Err(e) if e.requires_reauthentication() => {
                // The next connect triggers a full sync that covers this record.
                Ok(skip(format!("account {} needs reauthentication: {e}", account.id)))
            }
            Err(SellerSyncError::UpstreamError { status: status @ (404 | 410), .. }) => {
                Ok(skip(format!("{kind} {resource_id} returned {status}")))
            }
            other => other,
        }
    }

    async fn sync(&self, kind: ResourceKind, account_id: Uuid, resource_id: &str) -> Result<ProcessOutcome> {
        let outcome = self.orchestrator.sync_one(kind, account_id, resource_id).await?;
        info!(%kind, %account_id, resource_id, ?outcome, "Record synced");
        Ok(ProcessOutcome::Synced { kind, outcome })
    }
}

fn skip(reason: String) -> ProcessOutcome {
    warn!(%reason, "Webhook skipped");
    ProcessOutcome::Skipped(reason)
}
