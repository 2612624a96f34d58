//! SQLite-backed mirror of marketplace resources.
//!
//! Rows are keyed by `(account_id, id)`. Each upsert checks for an existing
//! row inside the same transaction so callers learn whether the record was
//! created or updated.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Transaction};
use sellersync_core::MirrorRepository;
use sellersync_domain::{
    Listing, Order, Question, ResourceKind, Result, SellerSyncError, Shipment, ShipmentRef,
    UpsertOutcome,
};
use serde_json::Value;
use uuid::Uuid;

use super::manager::{to_millis, usize_param, with_connection, DbConnection, DbManager};
use crate::errors::map_sql_error;

pub struct SqliteMirrorRepository {
    db: Arc<DbManager>,
}

impl SqliteMirrorRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Rows stored per resource for one account.
    pub async fn counts(&self, account_id: Uuid) -> Result<BTreeMap<ResourceKind, u64>> {
        with_connection(&self.db, move |conn| {
            let mut counts = BTreeMap::new();
            for kind in ResourceKind::ALL {
                let count: i64 = conn
                    .query_row(
                        &format!("SELECT count(*) FROM {} WHERE account_id = ?1", table_for(kind)),
                        params![account_id.to_string()],
                        |row| row.get(0),
                    )
                    .map_err(map_sql_error)?;
                counts.insert(kind, u64::try_from(count).unwrap_or_default());
            }
            Ok(counts)
        })
        .await
    }
}

fn table_for(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Items => "listings",
        ResourceKind::Orders => "orders",
        ResourceKind::Shipments => "shipments",
        ResourceKind::Questions => "questions",
    }
}

fn raw_json(value: &Value) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| SellerSyncError::Internal(format!("cannot serialize raw payload: {e}")))
}

fn upsert_in_tx(
    conn: &mut DbConnection,
    kind: ResourceKind,
    account_id: Uuid,
    id: &str,
    write: impl FnOnce(&Transaction<'_>) -> rusqlite::Result<usize>,
) -> Result<UpsertOutcome> {
    let tx = conn.transaction().map_err(map_sql_error)?;
    let exists: bool = tx
        .query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE account_id = ?1 AND id = ?2)",
                table_for(kind)
            ),
            params![account_id.to_string(), id],
            |row| row.get(0),
        )
        .map_err(map_sql_error)?;
    write(&tx).map_err(map_sql_error)?;
    tx.commit().map_err(map_sql_error)?;
    Ok(if exists { UpsertOutcome::Updated } else { UpsertOutcome::Created })
}

const LISTING_UPSERT_SQL: &str = "INSERT INTO listings (
        account_id, id, title, status, price, currency, available_quantity, permalink,
        remote_updated_at, raw, synced_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
    ON CONFLICT(account_id, id) DO UPDATE SET
        title = excluded.title,
        status = excluded.status,
        price = excluded.price,
        currency = excluded.currency,
        available_quantity = excluded.available_quantity,
        permalink = excluded.permalink,
        remote_updated_at = excluded.remote_updated_at,
        raw = excluded.raw,
        synced_at = excluded.synced_at";

const ORDER_UPSERT_SQL: &str = "INSERT INTO orders (
        account_id, id, status, total_amount, currency, buyer_id, shipment_id, date_created,
        raw, synced_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
    ON CONFLICT(account_id, id) DO UPDATE SET
        status = excluded.status,
        total_amount = excluded.total_amount,
        currency = excluded.currency,
        buyer_id = excluded.buyer_id,
        shipment_id = excluded.shipment_id,
        date_created = excluded.date_created,
        raw = excluded.raw,
        synced_at = excluded.synced_at";

const SHIPMENT_UPSERT_SQL: &str = "INSERT INTO shipments (
        account_id, id, order_id, status, substatus, tracking_number, raw, synced_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    ON CONFLICT(account_id, id) DO UPDATE SET
        order_id = excluded.order_id,
        status = excluded.status,
        substatus = excluded.substatus,
        tracking_number = excluded.tracking_number,
        raw = excluded.raw,
        synced_at = excluded.synced_at";

const QUESTION_UPSERT_SQL: &str = "INSERT INTO questions (
        account_id, id, item_id, text, status, answer, date_created, raw, synced_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(account_id, id) DO UPDATE SET
        item_id = excluded.item_id,
        text = excluded.text,
        status = excluded.status,
        answer = excluded.answer,
        date_created = excluded.date_created,
        raw = excluded.raw,
        synced_at = excluded.synced_at";

#[async_trait]
impl MirrorRepository for SqliteMirrorRepository {
    async fn upsert_listing(&self, listing: &Listing) -> Result<UpsertOutcome> {
        let l = listing.clone();
        with_connection(&self.db, move |conn| {
            let raw = raw_json(&l.raw)?;
            upsert_in_tx(conn, ResourceKind::Items, l.account_id, &l.id, |tx| {
                tx.execute(
                    LISTING_UPSERT_SQL,
                    params![
                        l.account_id.to_string(),
                        l.id,
                        l.title,
                        l.status,
                        l.price,
                        l.currency,
                        l.available_quantity,
                        l.permalink,
                        l.remote_updated_at,
                        raw,
                        to_millis(l.synced_at),
                    ],
                )
            })
        })
        .await
    }

    async fn upsert_order(&self, order: &Order) -> Result<UpsertOutcome> {
        let o = order.clone();
        with_connection(&self.db, move |conn| {
            let raw = raw_json(&o.raw)?;
            upsert_in_tx(conn, ResourceKind::Orders, o.account_id, &o.id, |tx| {
                tx.execute(
                    ORDER_UPSERT_SQL,
                    params![
                        o.account_id.to_string(),
                        o.id,
                        o.status,
                        o.total_amount,
                        o.currency,
                        o.buyer_id,
                        o.shipment_id,
                        o.date_created,
                        raw,
                        to_millis(o.synced_at),
                    ],
                )
            })
        })
        .await
    }

    async fn upsert_shipment(&self, shipment: &Shipment) -> Result<UpsertOutcome> {
        let s = shipment.clone();
        with_connection(&self.db, move |conn| {
            let raw = raw_json(&s.raw)?;
            upsert_in_tx(conn, ResourceKind::Shipments, s.account_id, &s.id, |tx| {
                tx.execute(
                    SHIPMENT_UPSERT_SQL,
                    params![
                        s.account_id.to_string(),
                        s.id,
                        s.order_id,
                        s.status,
                        s.substatus,
                        s.tracking_number,
                        raw,
                        to_millis(s.synced_at),
                    ],
                )
            })
        })
        .await
    }

    async fn upsert_question(&self, question: &Question) -> Result<UpsertOutcome> {
        let q = question.clone();
        with_connection(&self.db, move |conn| {
            let raw = raw_json(&q.raw)?;
            upsert_in_tx(conn, ResourceKind::Questions, q.account_id, &q.id, |tx| {
                tx.execute(
                    QUESTION_UPSERT_SQL,
                    params![
                        q.account_id.to_string(),
                        q.id,
                        q.item_id,
                        q.text,
                        q.status,
                        q.answer,
                        q.date_created,
                        raw,
                        to_millis(q.synced_at),
                    ],
                )
            })
        })
        .await
    }

    async fn shipment_refs(
        &self,
        account_id: Uuid,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ShipmentRef>> {
        with_connection(&self.db, move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, shipment_id FROM orders
                     WHERE account_id = ?1 AND shipment_id IS NOT NULL
                     ORDER BY id
                     LIMIT ?2 OFFSET ?3",
                )
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(
                    params![account_id.to_string(), usize_param(limit), usize_param(offset)],
                    |row| Ok(ShipmentRef { order_id: row.get(0)?, shipment_id: row.get(1)? }),
                )
                .map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
    }
}
