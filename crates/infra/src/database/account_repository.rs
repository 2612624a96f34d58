//! SQLite-backed account and credential repositories.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use sellersync_core::{AccountRepository, CredentialRepository};
use sellersync_domain::{Account, CredentialRecord, NewAccount, NewCredentialRecord, Result};
use uuid::Uuid;

use super::manager::{millis_column, to_millis, uuid_column, with_connection, DbManager};
use crate::errors::map_sql_error;

pub struct SqliteAccountRepository {
    db: Arc<DbManager>,
}

impl SqliteAccountRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

const ACCOUNT_COLUMNS: &str =
    "id, seller_id, display_name, marketplace_id, created_at, updated_at";

fn map_account_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: uuid_column(row, 0)?,
        seller_id: row.get(1)?,
        display_name: row.get(2)?,
        marketplace_id: row.get(3)?,
        created_at: millis_column(row, 4)?,
        updated_at: millis_column(row, 5)?,
    })
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn upsert_by_seller_id(&self, account: &NewAccount) -> Result<Account> {
        let account = account.clone();
        with_connection(&self.db, move |conn| {
            let now = to_millis(Utc::now());
            conn.query_row(
                &format!(
                    "INSERT INTO accounts ({ACCOUNT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                     ON CONFLICT(seller_id) DO UPDATE SET
                         display_name = excluded.display_name,
                         updated_at = excluded.updated_at
                     RETURNING {ACCOUNT_COLUMNS}"
                ),
                params![
                    Uuid::now_v7().to_string(),
                    account.seller_id,
                    account.display_name,
                    account.marketplace_id,
                    now
                ],
                map_account_row,
            )
            .map_err(map_sql_error)
        })
        .await
    }

    async fn get(&self, account_id: Uuid) -> Result<Option<Account>> {
        with_connection(&self.db, move |conn| {
            conn.query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
                params![account_id.to_string()],
                map_account_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
    }

    async fn find_by_seller_id(&self, seller_id: &str) -> Result<Option<Account>> {
        let seller_id = seller_id.to_string();
        with_connection(&self.db, move |conn| {
            conn.query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE seller_id = ?1"),
                params![seller_id],
                map_account_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<Account>> {
        with_connection(&self.db, |conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY created_at, id"))
                .map_err(map_sql_error)?;
            let rows = stmt.query_map([], map_account_row).map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
    }
}

/// Credentials are stored as vault ciphertext; this repository never sees
/// plaintext tokens.
pub struct SqliteCredentialRepository {
    db: Arc<DbManager>,
}

impl SqliteCredentialRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

fn map_credential_row(row: &Row<'_>) -> rusqlite::Result<CredentialRecord> {
    Ok(CredentialRecord {
        id: uuid_column(row, 0)?,
        account_id: uuid_column(row, 1)?,
        access_token_ciphertext: row.get(2)?,
        refresh_token_ciphertext: row.get(3)?,
        token_type: row.get(4)?,
        scope: row.get(5)?,
        expires_in: row.get(6)?,
        obtained_at: millis_column(row, 7)?,
    })
}

#[async_trait]
impl CredentialRepository for SqliteCredentialRepository {
    async fn replace_active(&self, record: NewCredentialRecord) -> Result<CredentialRecord> {
        let record = record.into_record();
        with_connection(&self.db, move |conn| {
            let tx = conn.transaction().map_err(map_sql_error)?;
            tx.execute(
                "INSERT INTO credentials (
                    id, account_id, access_token_ciphertext, refresh_token_ciphertext,
                    token_type, scope, expires_in, obtained_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id.to_string(),
                    record.account_id.to_string(),
                    record.access_token_ciphertext,
                    record.refresh_token_ciphertext,
                    record.token_type,
                    record.scope,
                    record.expires_in,
                    to_millis(record.obtained_at),
                ],
            )
            .map_err(map_sql_error)?;
            tx.execute(
                "DELETE FROM credentials WHERE account_id = ?1 AND id <> ?2",
                params![record.account_id.to_string(), record.id.to_string()],
            )
            .map_err(map_sql_error)?;
            tx.commit().map_err(map_sql_error)?;
            Ok(record)
        })
        .await
    }

    async fn active(&self, account_id: Uuid) -> Result<Option<CredentialRecord>> {
        with_connection(&self.db, move |conn| {
            conn.query_row(
                "SELECT id, account_id, access_token_ciphertext, refresh_token_ciphertext,
                        token_type, scope, expires_in, obtained_at
                 FROM credentials
                 WHERE account_id = ?1
                 ORDER BY obtained_at DESC
                 LIMIT 1",
                params![account_id.to_string()],
                map_credential_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::manager::test_support::migrated_db;
    use super::*;

    fn new_account(seller_id: &str, name: &str) -> NewAccount {
        NewAccount {
            seller_id: seller_id.to_string(),
            display_name: name.to_string(),
            marketplace_id: "MLA".to_string(),
        }
    }

    fn new_credentials(account_id: Uuid, access: &str) -> NewCredentialRecord {
        NewCredentialRecord {
            account_id,
            access_token_ciphertext: access.to_string(),
            refresh_token_ciphertext: Some(format!("{access}-refresh")),
            token_type: "Bearer".to_string(),
            scope: Some("offline_access read".to_string()),
            expires_in: 21_600,
            obtained_at: Utc::now(),
        }
    }

    /// Validates the upsert keyed by seller id.
    ///
    /// Assertions:
    /// - Confirms a reconnect keeps the account id and creation time.
    /// - Confirms the display name is refreshed.
    /// - Confirms lookups by id and seller id agree.
    #[tokio::test]
    async fn test_upsert_by_seller_id_keeps_identity() {
        let (_dir, db) = migrated_db();
        let repo = SqliteAccountRepository::new(db);

        let first = repo.upsert_by_seller_id(&new_account("1001", "old-name")).await.unwrap();
        let second = repo.upsert_by_seller_id(&new_account("1001", "new-name")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.display_name, "new-name");

        let by_id = repo.get(first.id).await.unwrap().unwrap();
        let by_seller = repo.find_by_seller_id("1001").await.unwrap().unwrap();
        assert_eq!(by_id, by_seller);
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_account_is_none() {
        let (_dir, db) = migrated_db();
        let repo = SqliteAccountRepository::new(db);

        assert!(repo.get(Uuid::now_v7()).await.unwrap().is_none());
        assert!(repo.find_by_seller_id("nobody").await.unwrap().is_none());
    }

    /// Validates that only one credential row stays active.
    ///
    /// Assertions:
    /// - Confirms `active` returns the latest replacement.
    /// - Confirms older rows are deleted in the same transaction.
    #[tokio::test]
    async fn test_replace_active_keeps_single_row() {
        let (_dir, db) = migrated_db();
        let accounts = SqliteAccountRepository::new(Arc::clone(&db));
        let credentials = SqliteCredentialRepository::new(Arc::clone(&db));
        let account = accounts.upsert_by_seller_id(&new_account("1001", "shop")).await.unwrap();

        credentials.replace_active(new_credentials(account.id, "first")).await.unwrap();
        let latest = credentials.replace_active(new_credentials(account.id, "second")).await.unwrap();

        let active = credentials.active(account.id).await.unwrap().unwrap();
        assert_eq!(active.id, latest.id);
        assert_eq!(active.access_token_ciphertext, "second");
        assert_eq!(active.refresh_token_ciphertext.as_deref(), Some("second-refresh"));

        let conn = db.get_connection().unwrap();
        let rows: i64 = conn
            .query_row(
                "SELECT count(*) FROM credentials WHERE account_id = ?1",
                params![account.id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_credentials_require_existing_account() {
        let (_dir, db) = migrated_db();
        let credentials = SqliteCredentialRepository::new(db);

        let result = credentials.replace_active(new_credentials(Uuid::now_v7(), "orphan")).await;
        assert!(result.is_err());
        assert!(credentials.active(Uuid::now_v7()).await.unwrap().is_none());
    }
}
