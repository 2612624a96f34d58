//! Port interfaces for account and credential persistence

use async_trait::async_trait;
use sellersync_domain::{Account, CredentialRecord, NewAccount, NewCredentialRecord, Result};
use uuid::Uuid;

/// Trait for the account registry
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert the account, or refresh display name and `updated_at` when the
    /// seller id is already known. Returns the stored account.
    async fn upsert_by_seller_id(&self, account: &NewAccount) -> Result<Account>;

    async fn get(&self, account_id: Uuid) -> Result<Option<Account>>;

    async fn find_by_seller_id(&self, seller_id: &str) -> Result<Option<Account>>;

    async fn list(&self) -> Result<Vec<Account>>;
}

/// Trait for encrypted credential storage
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Store a new active record and delete the account's previous ones in a
    /// single transaction.
    async fn replace_active(&self, record: NewCredentialRecord) -> Result<CredentialRecord>;

    /// Most recent record by `obtained_at`.
    async fn active(&self, account_id: Uuid) -> Result<Option<CredentialRecord>>;
}
