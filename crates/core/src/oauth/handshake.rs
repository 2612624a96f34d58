//! OAuth handshake service
//!
//! `start_authorization` mints a state token and PKCE pair and parks the
//! verifier in the [`PendingAuthStore`]. `complete_authorization` redeems the
//! state exactly once, exchanges the code and persists the account with its
//! encrypted credentials.

use std::sync::Arc;
use std::time::Duration;

use sellersync_common::auth::{OAuthClientError, OAuthClientTrait, PKCEChallenge, TokenSet};
use sellersync_domain::constants::PENDING_AUTH_TTL_SECS;
use sellersync_domain::{
    json_id, AuthorizationStart, Config, ConnectedAccount, NewAccount, PendingAuthState, Result,
    SellerSyncError,
};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::ports::PendingAuthStore;
use crate::accounts::ports::{AccountRepository, CredentialRepository};
use crate::marketplace::ports::{ApiRequest, MarketplaceApi};
use crate::tokens::CredentialCodec;

#[derive(Debug, Clone)]
pub struct HandshakeSettings {
    pub marketplace_id: String,
    /// Refuse callbacks whose verifier cannot be recovered.
    pub pkce_required: bool,
    pub state_ttl: Duration,
}

impl Default for HandshakeSettings {
    fn default() -> Self {
        Self {
            marketplace_id: "default".to_string(),
            pkce_required: true,
            state_ttl: Duration::from_secs(PENDING_AUTH_TTL_SECS),
        }
    }
}

impl HandshakeSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            marketplace_id: config.marketplace.marketplace_id.clone(),
            pkce_required: config.oauth.pkce_required,
            state_ttl: Duration::from_secs(config.oauth.state_ttl_secs),
        }
    }
}

pub struct OAuthHandshake {
    oauth: Arc<dyn OAuthClientTrait>,
    pending: Arc<dyn PendingAuthStore>,
    accounts: Arc<dyn AccountRepository>,
    credentials: Arc<dyn CredentialRepository>,
    api: Arc<dyn MarketplaceApi>,
    codec: CredentialCodec,
    settings: HandshakeSettings,
}

impl OAuthHandshake {
    pub fn new(
        oauth: Arc<dyn OAuthClientTrait>,
        pending: Arc<dyn PendingAuthStore>,
        accounts: Arc<dyn AccountRepository>,
        credentials: Arc<dyn CredentialRepository>,
        api: Arc<dyn MarketplaceApi>,
        codec: CredentialCodec,
        settings: HandshakeSettings,
    ) -> Self {
        Self { oauth, pending, accounts, credentials, api, codec, settings }
    }

    #[must_use]
    pub fn settings(&self) -> &HandshakeSettings {
        &self.settings
    }

    /// Begin an authorization; the caller redirects the browser to the
    /// returned URL.
    #[instrument(skip(self))]
    pub async fn start_authorization(&self) -> Result<AuthorizationStart> {
        match self.pending.purge_expired().await {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "Purged expired pending authorizations"),
            Err(e) => warn!(error = %e, "Failed to purge expired pending authorizations"),
        }

        let pkce = PKCEChallenge::generate();
        self.pending.put(PendingAuthState::new(pkce.state.clone(), pkce.code_verifier.clone())).await?;

        let authorization_url = self.oauth.authorization_url(&pkce.state, &pkce.code_challenge);
        info!(method = pkce.challenge_method(), "Authorization started");
        Ok(AuthorizationStart { authorization_url, state: pkce.state })
    }

    /// Finish an authorization from the provider callback.
    ///
    /// `cookie_state` is the state carried by an already verified signed
    /// cookie; it is only consulted when the pending entry is gone.
    #[instrument(skip_all)]
    pub async fn complete_authorization(
        &self,
        code: Option<&str>,
        state: Option<&str>,
        cookie_state: Option<&str>,
    ) -> Result<ConnectedAccount> {
        let (Some(code), Some(state)) = (present(code), present(state)) else {
            return Err(SellerSyncError::InvalidCallback);
        };

        let verifier = match self.pending.take(state).await? {
            Some(pending) => Some(pending.code_verifier),
            None if present(cookie_state) == Some(state) => {
                if self.settings.pkce_required {
                    warn!("Pending authorization lost and PKCE is required; rejecting callback");
                    return Err(SellerSyncError::PkceVerifierMissing);
                }
                warn!("Pending authorization lost; exchanging code without a PKCE verifier");
                None
            }
            None => {
                debug!("Callback state is unknown, expired or already used");
                return Err(SellerSyncError::InvalidCallback);
            }
        };

        let tokens = self
            .oauth
            .exchange_code(code, verifier.as_deref())
            .await
            .map_err(|e| exchange_error(e, verifier.is_none()))?;

        let account = self.accounts.upsert_by_seller_id(&self.identity(&tokens).await?).await?;
        let record = self.codec.seal(account.id, &tokens).await?;
        self.credentials.replace_active(record).await?;

        info!(account_id = %account.id, seller_id = %account.seller_id, "Marketplace account connected");
        Ok(ConnectedAccount { account_id: account.id, seller_id: account.seller_id })
    }

    /// Seller identity for a fresh token set; asks `/users/me` when the
    /// token response does not carry `user_id`.
    async fn identity(&self, tokens: &TokenSet) -> Result<NewAccount> {
        let marketplace_id = self.settings.marketplace_id.clone();
        if let Some(seller_id) = tokens.user_id.clone() {
            let display_name = self
                .accounts
                .find_by_seller_id(&seller_id)
                .await?
                .map_or_else(|| seller_id.clone(), |existing| existing.display_name);
            return Ok(NewAccount { seller_id, display_name, marketplace_id });
        }

        let me = self.api.send(&tokens.access_token, &ApiRequest::get("/users/me")).await?;
        let seller_id = me
            .get("id")
            .and_then(json_id)
            .ok_or_else(|| SellerSyncError::Internal("identity response has no `id`".into()))?;
        let display_name = me
            .get("nickname")
            .and_then(Value::as_str)
            .map_or_else(|| seller_id.clone(), ToString::to_string);
        Ok(NewAccount { seller_id, display_name, marketplace_id })
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn exchange_error(err: OAuthClientError, verifier_missing: bool) -> SellerSyncError {
    if verifier_missing && err.mentions_code_verifier() {
        return SellerSyncError::PkceVerifierMissing;
    }
    match err {
        OAuthClientError::Status { status, body } => {
            warn!(status, %body, "Token exchange rejected");
            SellerSyncError::token_exchange_failed(status, body)
        }
        OAuthClientError::RequestFailed(e) => SellerSyncError::Network(e.to_string()),
        OAuthClientError::ParseError(msg) => {
            SellerSyncError::Internal(format!("unreadable token response: {msg}"))
        }
        OAuthClientError::NoRefreshToken | OAuthClientError::ConfigError(_) => {
            SellerSyncError::Config(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use sellersync_common::auth::pkce::generate_code_challenge;
    use sellersync_common::testing::MockOAuthClient;
    use serde_json::json;

    use super::*;
    use crate::testing::harness;

    fn strict() -> HandshakeSettings {
        HandshakeSettings::default()
    }

    fn lenient() -> HandshakeSettings {
        HandshakeSettings { pkce_required: false, ..HandshakeSettings::default() }
    }

    fn query_param(url: &str, key: &str) -> Option<String> {
        url.split(['?', '&'])
            .find_map(|pair| pair.strip_prefix(&format!("{key}=")))
            .map(ToString::to_string)
    }

    /// Validates the full connect flow.
    ///
    /// Assertions:
    /// - The authorization URL carries `code_challenge_method=S256`.
    /// - The exchange received the verifier matching the URL's challenge.
    /// - One account and one active credential record exist afterwards.
    /// - The broker returns the provider's access token byte-for-byte.
    #[tokio::test]
    async fn test_end_to_end_connect() {
        let h = harness();
        let handshake = h.handshake(strict());

        let start = handshake.start_authorization().await.unwrap();
        assert!(start.authorization_url.contains("code_challenge_method=S256"));
        assert_eq!(h.pending.len(), 1);

        let connected =
            handshake.complete_authorization(Some("TG-code"), Some(&start.state), None).await.unwrap();
        assert_eq!(connected.seller_id, "1001");
        assert!(h.pending.is_empty());

        let verifiers = h.oauth.exchange_verifiers();
        let verifier = verifiers[0].clone().expect("verifier sent");
        let challenge = query_param(&start.authorization_url, "code_challenge").unwrap();
        assert_eq!(generate_code_challenge(&verifier), challenge);

        assert_eq!(h.credentials.record_count(connected.account_id), 1);
        assert_eq!(h.broker.get_access_token(connected.account_id).await.unwrap(), "mock_access_token");
    }

    /// Validates single use of the state token.
    #[tokio::test]
    async fn test_state_is_single_use() {
        let h = harness();
        let handshake = h.handshake(strict());
        let start = handshake.start_authorization().await.unwrap();

        handshake.complete_authorization(Some("c"), Some(&start.state), None).await.unwrap();
        let err = handshake.complete_authorization(Some("c"), Some(&start.state), None).await.unwrap_err();
        assert_eq!(err, SellerSyncError::InvalidCallback);
        assert_eq!(h.oauth.exchange_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_code_or_state() {
        let h = harness();
        let handshake = h.handshake(strict());
        for (code, state) in [(None, Some("s")), (Some("c"), None), (Some(" "), Some("s"))] {
            let err = handshake.complete_authorization(code, state, None).await.unwrap_err();
            assert_eq!(err, SellerSyncError::InvalidCallback);
        }
        assert_eq!(h.oauth.exchange_count(), 0);
    }

    /// Validates expiry of pending state.
    #[tokio::test]
    async fn test_expired_state_is_rejected() {
        let h = harness();
        let handshake = h.handshake(strict());
        let start = handshake.start_authorization().await.unwrap();
        h.pending.age(&start.state, chrono::Duration::minutes(6));

        let err = handshake.complete_authorization(Some("c"), Some(&start.state), None).await.unwrap_err();
        assert_eq!(err, SellerSyncError::InvalidCallback);
    }

    /// Validates that cookie recovery is refused while PKCE is required.
    #[tokio::test]
    async fn test_cookie_fallback_requires_pkce() {
        let h = harness();
        let err = h
            .handshake(strict())
            .complete_authorization(Some("c"), Some("lost-state"), Some("lost-state"))
            .await
            .unwrap_err();
        assert_eq!(err, SellerSyncError::PkceVerifierMissing);
        assert_eq!(h.oauth.exchange_count(), 0);
    }

    /// Validates the degraded cookie path when PKCE is optional.
    ///
    /// Assertions:
    /// - The exchange runs without a verifier and the account connects.
    /// - A provider complaint about `code_verifier` maps to
    ///   `PkceVerifierMissing`.
    #[tokio::test]
    async fn test_cookie_fallback_without_pkce() {
        let h = harness();
        let handshake = h.handshake(lenient());

        handshake.complete_authorization(Some("c"), Some("lost"), Some("lost")).await.unwrap();
        assert_eq!(h.oauth.exchange_verifiers(), vec![None]);

        h.oauth.push_exchange(Err(MockOAuthClient::rejected(
            400,
            r#"{"error":"invalid_request","message":"code_verifier is required"}"#,
        )));
        let err = handshake.complete_authorization(Some("c"), Some("lost"), Some("lost")).await.unwrap_err();
        assert_eq!(err, SellerSyncError::PkceVerifierMissing);
    }

    #[tokio::test]
    async fn test_cookie_for_other_state_is_ignored() {
        let h = harness();
        let err = h
            .handshake(lenient())
            .complete_authorization(Some("c"), Some("state-a"), Some("state-b"))
            .await
            .unwrap_err();
        assert_eq!(err, SellerSyncError::InvalidCallback);
    }

    /// Validates retriable versus terminal exchange failures.
    #[tokio::test]
    async fn test_exchange_failure_classification() {
        let h = harness();
        let handshake = h.handshake(strict());

        h.oauth.push_exchange(Err(MockOAuthClient::rejected(503, "upstream down")));
        let start = handshake.start_authorization().await.unwrap();
        let err = handshake.complete_authorization(Some("c"), Some(&start.state), None).await.unwrap_err();
        assert!(matches!(err, SellerSyncError::TokenExchangeFailed { status: 503, retriable: true, .. }));
        assert!(err.is_retriable());

        h.oauth.push_exchange(Err(MockOAuthClient::rejected(400, r#"{"error":"invalid_grant"}"#)));
        let start = handshake.start_authorization().await.unwrap();
        let err = handshake.complete_authorization(Some("c"), Some(&start.state), None).await.unwrap_err();
        match err {
            SellerSyncError::TokenExchangeFailed { status, body, retriable } => {
                assert_eq!(status, 400);
                assert!(body.contains("invalid_grant"));
                assert!(!retriable);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    /// Validates identity lookup when the token response has no `user_id`.
    #[tokio::test]
    async fn test_identity_from_users_me() {
        let h = harness();
        h.oauth.push_exchange(Ok(MockOAuthClient::tokens("APP_USR-x", "TG-x", None)));
        h.marketplace.on("/users/me", json!({"id": 424242, "nickname": "TIENDA_SUR"}));

        let handshake = h.handshake(strict());
        let start = handshake.start_authorization().await.unwrap();
        let connected =
            handshake.complete_authorization(Some("c"), Some(&start.state), None).await.unwrap();

        assert_eq!(connected.seller_id, "424242");
        let account = h.accounts.get(connected.account_id).await.unwrap().unwrap();
        assert_eq!(account.display_name, "TIENDA_SUR");
        assert_eq!(h.marketplace.calls_to("/users/me")[0].access_token, "APP_USR-x");
    }

    /// Validates that re-authorizing a seller reuses the account and keeps a
    /// single active credential record.
    #[tokio::test]
    async fn test_reauthorization_replaces_credentials() {
        let h = harness();
        let handshake = h.handshake(strict());

        let first = handshake.start_authorization().await.unwrap();
        let a = handshake.complete_authorization(Some("c1"), Some(&first.state), None).await.unwrap();

        h.oauth.push_exchange(Ok(MockOAuthClient::tokens("APP_USR-2", "TG-2", Some("1001"))));
        let second = handshake.start_authorization().await.unwrap();
        let b = handshake.complete_authorization(Some("c2"), Some(&second.state), None).await.unwrap();

        assert_eq!(a.account_id, b.account_id);
        assert_eq!(h.credentials.record_count(a.account_id), 1);
        assert_eq!(h.broker.get_access_token(a.account_id).await.unwrap(), "APP_USR-2");
    }
}
