//! Sealing token sets into credential records and opening them again

use std::fmt;
use std::sync::Arc;

use sellersync_common::auth::TokenSet;
use sellersync_common::crypto::{CredentialVault, VaultError};
use sellersync_domain::{CredentialRecord, NewCredentialRecord, Result, SellerSyncError};
use tokio::task;
use uuid::Uuid;

/// Decrypted access/refresh pair.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Encrypts both tokens independently with the vault.
///
/// Key derivation is CPU-bound, so [`seal`](Self::seal) and
/// [`open`](Self::open) run on the blocking pool.
#[derive(Debug, Clone)]
pub struct CredentialCodec {
    vault: Arc<CredentialVault>,
}

impl CredentialCodec {
    pub fn new(vault: Arc<CredentialVault>) -> Self {
        Self { vault }
    }

    #[must_use]
    pub fn uses_default_passphrase(&self) -> bool {
        self.vault.uses_default_passphrase()
    }

    pub async fn seal(&self, account_id: Uuid, tokens: &TokenSet) -> Result<NewCredentialRecord> {
        let codec = self.clone();
        let tokens = tokens.clone();
        task::spawn_blocking(move || codec.seal_now(account_id, &tokens))
            .await
            .map_err(|e| SellerSyncError::Internal(format!("credential sealing aborted: {e}")))?
    }

    pub async fn open(&self, record: &CredentialRecord) -> Result<TokenPair> {
        let codec = self.clone();
        let record = record.clone();
        task::spawn_blocking(move || codec.open_now(&record))
            .await
            .map_err(|e| SellerSyncError::Internal(format!("credential opening aborted: {e}")))?
    }

    fn seal_now(&self, account_id: Uuid, tokens: &TokenSet) -> Result<NewCredentialRecord> {
        let access_token_ciphertext = self.vault.encrypt(&tokens.access_token).map_err(vault_error)?;
        let refresh_token_ciphertext = tokens
            .refresh_token
            .as_deref()
            .map(|token| self.vault.encrypt(token))
            .transpose()
            .map_err(vault_error)?;

        Ok(NewCredentialRecord {
            account_id,
            access_token_ciphertext,
            refresh_token_ciphertext,
            token_type: tokens.token_type.clone(),
            scope: tokens.scope.clone(),
            expires_in: tokens.expires_in,
            obtained_at: tokens.obtained_at,
        })
    }

    fn open_now(&self, record: &CredentialRecord) -> Result<TokenPair> {
        let access_token = self.vault.decrypt(&record.access_token_ciphertext).map_err(vault_error)?;
        let refresh_token = record
            .refresh_token_ciphertext
            .as_deref()
            .map(|ciphertext| self.vault.decrypt(ciphertext))
            .transpose()
            .map_err(vault_error)?;
        Ok(TokenPair { access_token, refresh_token })
    }
}

/// Tampered or undecryptable ciphertexts are never retried.
pub(crate) fn vault_error(err: VaultError) -> SellerSyncError {
    match err {
        VaultError::Authentication | VaultError::Malformed(_) => SellerSyncError::AuthenticationError,
        VaultError::KeyDerivation(msg) => SellerSyncError::Internal(format!("key derivation: {msg}")),
        VaultError::Common(inner) => SellerSyncError::Internal(inner.to_string()),
    }
}
