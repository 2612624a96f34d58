//! Delivery queue message payloads

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::sync::ResourceKind;

/// Work item carried by the delivery queue.
///
/// `webhook` messages come from the ingester; the `sync_*` variants are
/// retry/backfill requests for a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueMessage {
    Webhook { event_id: String, topic: String, resource: String, seller_user_id: String },
    SyncItem { account_id: Uuid, resource_id: String },
    SyncOrder { account_id: Uuid, resource_id: String },
    SyncShipment { account_id: Uuid, resource_id: String },
    SyncQuestion { account_id: Uuid, resource_id: String },
}

impl QueueMessage {
    /// Single-record refresh for the given resource kind.
    #[must_use]
    pub fn refresh(kind: ResourceKind, account_id: Uuid, resource_id: impl Into<String>) -> Self {
        let resource_id = resource_id.into();
        match kind {
            ResourceKind::Items => Self::SyncItem { account_id, resource_id },
            ResourceKind::Orders => Self::SyncOrder { account_id, resource_id },
            ResourceKind::Shipments => Self::SyncShipment { account_id, resource_id },
            ResourceKind::Questions => Self::SyncQuestion { account_id, resource_id },
        }
    }

    /// The type tag, as written on the wire.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Webhook { .. } => "webhook",
            Self::SyncItem { .. } => "sync_item",
            Self::SyncOrder { .. } => "sync_order",
            Self::SyncShipment { .. } => "sync_shipment",
            Self::SyncQuestion { .. } => "sync_question",
        }
    }
}
