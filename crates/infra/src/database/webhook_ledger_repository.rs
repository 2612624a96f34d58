//! SQLite-backed webhook ledger.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use sellersync_core::WebhookLedger;
use sellersync_domain::{Result, SellerSyncError, WebhookLedgerEntry};

use super::manager::{
    millis_column, optional_millis_column, to_millis, usize_param, with_connection, DbManager,
};
use crate::errors::map_sql_error;

pub struct SqliteWebhookLedger {
    db: Arc<DbManager>,
}

impl SqliteWebhookLedger {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

const LEDGER_COLUMNS: &str = "event_id, topic, resource, seller_id, received_at, processed, \
     processed_at, payload, requeue_count";

fn map_ledger_row(row: &Row<'_>) -> rusqlite::Result<WebhookLedgerEntry> {
    Ok(WebhookLedgerEntry {
        event_id: row.get(0)?,
        topic: row.get(1)?,
        resource: row.get(2)?,
        seller_id: row.get(3)?,
        received_at: millis_column(row, 4)?,
        processed: row.get::<_, i64>(5)? != 0,
        processed_at: optional_millis_column(row, 6)?,
        payload: row.get(7)?,
        requeue_count: row.get(8)?,
    })
}

#[async_trait]
impl WebhookLedger for SqliteWebhookLedger {
    async fn insert_if_absent(&self, entry: &WebhookLedgerEntry) -> Result<bool> {
        let entry = entry.clone();
        with_connection(&self.db, move |conn| {
            let inserted = conn
                .execute(
                    &format!(
                        "INSERT INTO webhook_ledger ({LEDGER_COLUMNS})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                         ON CONFLICT(event_id) DO NOTHING"
                    ),
                    params![
                        entry.event_id,
                        entry.topic,
                        entry.resource,
                        entry.seller_id,
                        to_millis(entry.received_at),
                        i64::from(entry.processed),
                        entry.processed_at.map(to_millis),
                        entry.payload,
                        entry.requeue_count,
                    ],
                )
                .map_err(map_sql_error)?;
            Ok(inserted == 1)
        })
        .await
    }

    async fn get(&self, event_id: &str) -> Result<Option<WebhookLedgerEntry>> {
        let event_id = event_id.to_string();
        with_connection(&self.db, move |conn| {
            conn.query_row(
                &format!("SELECT {LEDGER_COLUMNS} FROM webhook_ledger WHERE event_id = ?1"),
                params![event_id],
                map_ledger_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
    }

    async fn mark_processed(&self, event_id: &str, processed_at: DateTime<Utc>) -> Result<()> {
        let event_id = event_id.to_string();
        with_connection(&self.db, move |conn| {
            let updated = conn
                .execute(
                    "UPDATE webhook_ledger SET processed = 1, processed_at = ?2 WHERE event_id = ?1",
                    params![event_id, to_millis(processed_at)],
                )
                .map_err(map_sql_error)?;
            if updated == 0 {
                return Err(SellerSyncError::NotFound(format!("webhook event {event_id}")));
            }
            Ok(())
        })
        .await
    }

    async fn list_unprocessed_older_than(
        &self,
        cutoff: DateTime<Utc>,
        max_requeues: u32,
        limit: usize,
    ) -> Result<Vec<WebhookLedgerEntry>> {
        with_connection(&self.db, move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {LEDGER_COLUMNS} FROM webhook_ledger
                     WHERE processed = 0 AND received_at < ?1 AND requeue_count < ?2
                     ORDER BY received_at ASC
                     LIMIT ?3"
                ))
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(
                    params![to_millis(cutoff), max_requeues, usize_param(limit)],
                    map_ledger_row,
                )
                .map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
    }

    async fn record_requeue(&self, event_id: &str) -> Result<u32> {
        let event_id = event_id.to_string();
        with_connection(&self.db, move |conn| {
            let tx = conn.transaction().map_err(map_sql_error)?;
            let updated = tx
                .execute(
                    "UPDATE webhook_ledger SET requeue_count = requeue_count + 1 WHERE event_id = ?1",
                    params![event_id],
                )
                .map_err(map_sql_error)?;
            if updated == 0 {
                return Err(SellerSyncError::NotFound(format!("webhook event {event_id}")));
            }
            let count: u32 = tx
                .query_row(
                    "SELECT requeue_count FROM webhook_ledger WHERE event_id = ?1",
                    params![event_id],
                    |row| row.get(0),
                )
                .map_err(map_sql_error)?;
            tx.commit().map_err(map_sql_error)?;
            Ok(count)
        })
        .await
    }
}
