//! SQLite-backed pending authorization store.
//!
//! Verifiers survive a restart between `/oauth/start` and the callback.
//! Consumption is a single `DELETE ... RETURNING`, so a state redeems once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use sellersync_core::PendingAuthStore;
use sellersync_domain::{PendingAuthState, Result};
use tracing::debug;

use super::manager::{millis_column, to_millis, with_connection, DbManager};
use crate::errors::map_sql_error;

pub struct SqlitePendingAuthStore {
    db: Arc<DbManager>,
    ttl: Duration,
}

impl SqlitePendingAuthStore {
    pub fn new(db: Arc<DbManager>, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    fn cutoff_millis(&self) -> i64 {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
            .map_or(i64::MIN, to_millis)
    }
}

#[async_trait]
impl PendingAuthStore for SqlitePendingAuthStore {
    async fn put(&self, pending: PendingAuthState) -> Result<()> {
        with_connection(&self.db, move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO pending_auth_states (state, code_verifier, created_at)
                 VALUES (?1, ?2, ?3)",
                params![pending.state, pending.code_verifier, to_millis(pending.created_at)],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    async fn take(&self, state: &str) -> Result<Option<PendingAuthState>> {
        let state = state.to_string();
        let ttl = self.ttl;
        with_connection(&self.db, move |conn| {
            let taken = conn
                .query_row(
                    "DELETE FROM pending_auth_states WHERE state = ?1
                     RETURNING state, code_verifier, created_at",
                    params![state],
                    |row| {
                        Ok(PendingAuthState {
                            state: row.get(0)?,
                            code_verifier: row.get(1)?,
                            created_at: millis_column(row, 2)?,
                        })
                    },
                )
                .optional()
                .map_err(map_sql_error)?;
            Ok(taken.filter(|pending| !pending.is_expired(ttl, Utc::now())))
        })
        .await
    }

    async fn purge_expired(&self) -> Result<usize> {
        let cutoff = self.cutoff_millis();
        let purged = with_connection(&self.db, move |conn| {
            conn.execute(
                "DELETE FROM pending_auth_states WHERE created_at < ?1",
                params![cutoff],
            )
            .map_err(map_sql_error)
        })
        .await?;
        if purged > 0 {
            debug!(purged, "Purged expired pending authorization states");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::super::manager::test_support::migrated_db;
    use super::*;

    fn pending(state: &str, age: chrono::Duration) -> PendingAuthState {
        PendingAuthState {
            state: state.to_string(),
            code_verifier: format!("verifier-for-{state}"),
            created_at: Utc::now() - age,
        }
    }

    /// Validates single-use consumption.
    ///
    /// Assertions:
    /// - Confirms the first take returns the stored verifier.
    /// - Confirms a replayed state finds nothing.
    #[tokio::test]
    async fn test_take_consumes_once() {
        let (_dir, db) = migrated_db();
        let store = SqlitePendingAuthStore::new(db, Duration::from_secs(300));

        store.put(pending("abc", chrono::Duration::zero())).await.unwrap();

        let taken = store.take("abc").await.unwrap().unwrap();
        assert_eq!(taken.code_verifier, "verifier-for-abc");
        assert!(store.take("abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_state_is_absent() {
        let (_dir, db) = migrated_db();
        let store = SqlitePendingAuthStore::new(db, Duration::from_secs(300));

        store.put(pending("old", chrono::Duration::minutes(10))).await.unwrap();
        assert!(store.take("old").await.unwrap().is_none());
    }

    /// Validates that verifiers survive a new store over the same file.
    #[tokio::test]
    async fn test_state_survives_store_restart() {
        let (_dir, db) = migrated_db();
        SqlitePendingAuthStore::new(Arc::clone(&db), Duration::from_secs(300))
            .put(pending("persisted", chrono::Duration::zero()))
            .await
            .unwrap();

        let restarted = SqlitePendingAuthStore::new(db, Duration::from_secs(300));
        assert!(restarted.take("persisted").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (_dir, db) = migrated_db();
        let store = SqlitePendingAuthStore::new(db, Duration::from_secs(300));

        store.put(pending("fresh", chrono::Duration::zero())).await.unwrap();
        store.put(pending("stale-1", chrono::Duration::minutes(6))).await.unwrap();
        store.put(pending("stale-2", chrono::Duration::hours(1))).await.unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 2);
        assert!(store.take("fresh").await.unwrap().is_some());
    }
}
