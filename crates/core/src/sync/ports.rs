//! Port interfaces for the local resource mirror

use async_trait::async_trait;
use sellersync_domain::{Listing, Order, Question, Result, Shipment, ShipmentRef, UpsertOutcome};
use uuid::Uuid;

/// Trait for the mirror of marketplace resources
///
/// Records are keyed by `(account_id, id)`. Upserts never delete; they report
/// whether the record was new.
#[async_trait]
pub trait MirrorRepository: Send + Sync {
    async fn upsert_listing(&self, listing: &Listing) -> Result<UpsertOutcome>;

    async fn upsert_order(&self, order: &Order) -> Result<UpsertOutcome>;

    async fn upsert_shipment(&self, shipment: &Shipment) -> Result<UpsertOutcome>;

    async fn upsert_question(&self, question: &Question) -> Result<UpsertOutcome>;

    /// Shipment references of mirrored orders, ordered by order id.
    async fn shipment_refs(
        &self,
        account_id: Uuid,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ShipmentRef>>;
}
