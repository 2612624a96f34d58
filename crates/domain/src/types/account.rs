//! Seller accounts, stored credentials and pending OAuth state

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A connected marketplace seller.
///
/// Created on the first successful OAuth exchange and updated on re-auth.
/// Accounts are never hard-deleted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    /// Seller id assigned by the marketplace.
    pub seller_id: String,
    pub display_name: String,
    pub marketplace_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity resolved from a token exchange, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub seller_id: String,
    pub display_name: String,
    pub marketplace_id: String,
}

/// Encrypted token pair owned by an account.
///
/// Only the most recent record (by `obtained_at`) is active.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub access_token_ciphertext: String,
    pub refresh_token_ciphertext: Option<String>,
    pub token_type: String,
    pub scope: Option<String>,
    pub expires_in: i64,
    pub obtained_at: DateTime<Utc>,
}

impl CredentialRecord {
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.obtained_at + Duration::seconds(self.expires_in)
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_in > 0 && now >= self.expires_at()
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("id", &self.id)
            .field("account_id", &self.account_id)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("expires_in", &self.expires_in)
            .field("obtained_at", &self.obtained_at)
            .finish_non_exhaustive()
    }
}

/// Encrypted credentials about to replace the active record.
#[derive(Clone)]
pub struct NewCredentialRecord {
    pub account_id: Uuid,
    pub access_token_ciphertext: String,
    pub refresh_token_ciphertext: Option<String>,
    pub token_type: String,
    pub scope: Option<String>,
    pub expires_in: i64,
    pub obtained_at: DateTime<Utc>,
}

impl NewCredentialRecord {
    /// Materialize the record with a fresh id.
    #[must_use]
    pub fn into_record(self) -> CredentialRecord {
        CredentialRecord {
            id: Uuid::now_v7(),
            account_id: self.account_id,
            access_token_ciphertext: self.access_token_ciphertext,
            refresh_token_ciphertext: self.refresh_token_ciphertext,
            token_type: self.token_type,
            scope: self.scope,
            expires_in: self.expires_in,
            obtained_at: self.obtained_at,
        }
    }
}

impl fmt::Debug for NewCredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewCredentialRecord")
            .field("account_id", &self.account_id)
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// One-time `{state -> verifier}` binding for an in-progress authorization.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthState {
    pub state: String,
    pub code_verifier: String,
    pub created_at: DateTime<Utc>,
}

impl PendingAuthState {
    #[must_use]
    pub fn new(state: String, code_verifier: String) -> Self {
        Self { state, code_verifier, created_at: Utc::now() }
    }

    #[must_use]
    pub fn is_expired(&self, ttl: std::time::Duration, now: DateTime<Utc>) -> bool {
        let ttl = Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(365));
        now - self.created_at >= ttl
    }
}

impl fmt::Debug for PendingAuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAuthState")
            .field("state", &self.state)
            .field("code_verifier", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Output of starting an authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationStart {
    pub authorization_url: String,
    pub state: String,
}

/// Output of a completed authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectedAccount {
    pub account_id: Uuid,
    pub seller_id: String,
}
