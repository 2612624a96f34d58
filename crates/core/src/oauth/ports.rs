//! Port interface for pending authorization state

use async_trait::async_trait;
use sellersync_domain::{PendingAuthState, Result};

/// Short-lived `{state -> verifier}` storage for in-flight authorizations
#[async_trait]
pub trait PendingAuthStore: Send + Sync {
    async fn put(&self, pending: PendingAuthState) -> Result<()>;

    /// Remove and return the entry for `state`. Consumption is atomic, so
    /// a state token can be redeemed once; expired entries read as absent.
    async fn take(&self, state: &str) -> Result<Option<PendingAuthState>>;

    /// Drop expired entries, returning how many were removed.
    async fn purge_expired(&self) -> Result<usize>;
}
