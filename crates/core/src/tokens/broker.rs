//! Token broker
//!
//! Single place that turns stored credentials into a usable access token and
//! owns the refresh-on-401 contract: one refresh, one retry, then
//! `Unauthorized`.

use std::sync::Arc;

use dashmap::DashMap;
use sellersync_common::auth::{OAuthClientError, OAuthClientTrait};
use sellersync_domain::{Result, SellerSyncError};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::codec::{CredentialCodec, TokenPair};
use crate::accounts::ports::CredentialRepository;
use crate::marketplace::ports::{ApiRequest, MarketplaceApi};

pub struct TokenBroker {
    credentials: Arc<dyn CredentialRepository>,
    oauth: Arc<dyn OAuthClientTrait>,
    api: Arc<dyn MarketplaceApi>,
    codec: CredentialCodec,
    /// Serializes refreshes per account so concurrent 401s spend the
    /// refresh token once.
    refresh_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl TokenBroker {
    pub fn new(
        credentials: Arc<dyn CredentialRepository>,
        oauth: Arc<dyn OAuthClientTrait>,
        api: Arc<dyn MarketplaceApi>,
        codec: CredentialCodec,
    ) -> Self {
        Self { credentials, oauth, api, codec, refresh_locks: DashMap::new() }
    }

    #[must_use]
    pub fn api(&self) -> &Arc<dyn MarketplaceApi> {
        &self.api
    }

    /// Decrypt the account's active credential record.
    pub async fn active_tokens(&self, account_id: Uuid) -> Result<TokenPair> {
        let record = self
            .credentials
            .active(account_id)
            .await?
            .ok_or_else(|| SellerSyncError::NoCredentials(account_id.to_string()))?;
        self.codec.open(&record).await
    }

    #[instrument(skip(self))]
    pub async fn get_access_token(&self, account_id: Uuid) -> Result<String> {
        Ok(self.active_tokens(account_id).await?.access_token)
    }

    /// Force a refresh and return the new access token.
    #[instrument(skip(self))]
    pub async fn refresh_access_token(&self, account_id: Uuid) -> Result<String> {
        Ok(self.refresh_tokens(account_id, None).await?.access_token)
    }

    /// Exchange the stored refresh token and replace the active record.
    ///
    /// When `stale_access_token` is given and the active record no longer
    /// holds it, another caller already refreshed; the current pair is
    /// returned without calling the provider.
    pub async fn refresh_tokens(
        &self,
        account_id: Uuid,
        stale_access_token: Option<&str>,
    ) -> Result<TokenPair> {
        let lock = self.refresh_locks.entry(account_id).or_default().clone();
        let _guard = lock.lock().await;

        let current = self.active_tokens(account_id).await?;
        if stale_access_token.is_some_and(|stale| stale != current.access_token) {
            debug!(%account_id, "Credentials already refreshed by a concurrent caller");
            return Ok(current);
        }

        let refresh_token = current.refresh_token.ok_or_else(|| {
            SellerSyncError::RefreshFailed("no refresh token stored for account".into())
        })?;

        let mut tokens = self
            .oauth
            .refresh_access_token(&refresh_token)
            .await
            .map_err(|err| refresh_error(account_id, err))?;
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token);
        }

        let record = self.codec.seal(account_id, &tokens).await?;
        self.credentials.replace_active(record).await?;
        info!(%account_id, expires_in = tokens.expires_in, "Access token refreshed");

        Ok(TokenPair { access_token: tokens.access_token, refresh_token: tokens.refresh_token })
    }

    /// Send `request` with the account's token, refreshing once on 401.
    #[instrument(skip(self, request), fields(path = %request.path))]
    pub async fn authenticated_request(&self, account_id: Uuid, request: &ApiRequest) -> Result<Value> {
        let mut tokens = self.active_tokens(account_id).await?;
        self.send_with_refresh(account_id, &mut tokens, request).await
    }

    /// Send with `tokens`; on 401 refresh once, update `tokens` in place and
    /// retry exactly once.
    pub(crate) async fn send_with_refresh(
        &self,
        account_id: Uuid,
        tokens: &mut TokenPair,
        request: &ApiRequest,
    ) -> Result<Value> {
        match self.api.send(&tokens.access_token, request).await {
            Err(SellerSyncError::Unauthorized(reason)) => {
                debug!(%account_id, path = %request.path, %reason, "401 from marketplace, refreshing");
                let fresh = self
                    .refresh_tokens(account_id, Some(&tokens.access_token))
                    .await
                    .map_err(|e| match e {
                        SellerSyncError::RefreshFailed(_) => {
                            SellerSyncError::Unauthorized(format!("token refresh failed: {e}"))
                        }
                        other => other,
                    })?;
                *tokens = fresh;

                self.api.send(&tokens.access_token, request).await.map_err(|e| match e {
                    SellerSyncError::Unauthorized(reason) => SellerSyncError::Unauthorized(format!(
                        "still unauthorized after refresh: {reason}"
                    )),
                    other => other,
                })
            }
            other => other,
        }
    }
}

/// Only a 4xx answer from the token endpoint rejects the refresh token.
/// Transport failures, 5xx and 429 leave the credentials intact and are
/// reported as retriable.
fn refresh_error(account_id: Uuid, err: OAuthClientError) -> SellerSyncError {
    match err {
        OAuthClientError::RequestFailed(e) => SellerSyncError::Network(e.to_string()),
        OAuthClientError::Status { status, body } if status >= 500 || status == 429 => {
            warn!(%account_id, status, "Token endpoint unavailable, refresh deferred");
            SellerSyncError::UpstreamError { status, message: format!("token refresh: {body}") }
        }
        other => {
            warn!(%account_id, error = %other, "Marketplace rejected refresh token");
            SellerSyncError::RefreshFailed(other.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{harness, FakeMarketplace, TestHarness};

    async fn connected(h: &TestHarness) -> Uuid {
        h.connect_account("1001", "APP_USR-old", Some("TG-old")).await
    }

    /// Validates decrypting the active token.
    #[tokio::test]
    async fn test_get_access_token() {
        let h = harness();
        let account_id = connected(&h).await;
        assert_eq!(h.broker.get_access_token(account_id).await.unwrap(), "APP_USR-old");
    }

    #[tokio::test]
    async fn test_get_access_token_without_credentials() {
        let h = harness();
        let err = h.broker.get_access_token(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, SellerSyncError::NoCredentials(_)));
    }

    /// Validates the refresh primitive.
    ///
    /// Assertions:
    /// - Confirms the stored refresh token is presented to the provider.
    /// - Confirms exactly one active record remains and it holds the new pair.
    #[tokio::test]
    async fn test_refresh_replaces_active_record() {
        let h = harness();
        let account_id = connected(&h).await;

        let token = h.broker.refresh_access_token(account_id).await.unwrap();
        assert_eq!(token, "refreshed_access_token");
        assert_eq!(h.oauth.refresh_tokens_seen(), vec!["TG-old".to_string()]);
        assert_eq!(h.credentials.record_count(account_id), 1);

        let pair = h.broker.active_tokens(account_id).await.unwrap();
        assert_eq!(pair.refresh_token.as_deref(), Some("refreshed_refresh_token"));
    }

    /// Validates that a rejected refresh token maps to `RefreshFailed`.
    #[tokio::test]
    async fn test_refresh_rejected() {
        let h = harness();
        let account_id = connected(&h).await;
        h.oauth.push_refresh(Err(sellersync_common::testing::MockOAuthClient::rejected(
            400,
            r#"{"error":"invalid_grant"}"#,
        )));

        let err = h.broker.refresh_access_token(account_id).await.unwrap_err();
        assert!(matches!(err, SellerSyncError::RefreshFailed(_)));
        assert!(err.user_hint().is_some());
        assert_eq!(h.broker.get_access_token(account_id).await.unwrap(), "APP_USR-old");
    }

    /// Validates refresh-on-401 with a successful retry.
    ///
    /// Assertions:
    /// - Confirms one refresh and two sends (original plus retry).
    /// - Confirms the retry carried the new token.
    #[tokio::test]
    async fn test_authenticated_request_refreshes_once() {
        let h = harness();
        let account_id = connected(&h).await;
        h.marketplace.accept_only(&["refreshed_access_token"]);
        h.marketplace.on("/users/me", json!({"id": 1001}));

        let body = h.broker.authenticated_request(account_id, &ApiRequest::get("/users/me")).await.unwrap();
        assert_eq!(body["id"], 1001);
        assert_eq!(h.oauth.refresh_count(), 1);

        let tokens: Vec<String> = h.marketplace.calls().into_iter().map(|c| c.access_token).collect();
        assert_eq!(tokens, vec!["APP_USR-old".to_string(), "refreshed_access_token".to_string()]);
    }

    /// Validates that a second 401 surfaces without another refresh.
    #[tokio::test]
    async fn test_second_unauthorized_is_final() {
        let h = harness();
        let account_id = connected(&h).await;
        h.marketplace.accept_only(&[]);

        let err =
            h.broker.authenticated_request(account_id, &ApiRequest::get("/users/me")).await.unwrap_err();
        assert!(matches!(err, SellerSyncError::Unauthorized(_)));
        assert_eq!(h.oauth.refresh_count(), 1);
        assert_eq!(h.marketplace.calls().len(), 2);
    }

    /// Validates that an unavailable token endpoint is not a rejection.
    ///
    /// Assertions:
    /// - A 503 from the token endpoint is a retriable `UpstreamError`.
    /// - The stored credentials are untouched and the next refresh succeeds.
    #[tokio::test]
    async fn test_refresh_unavailable_is_retriable() {
        let h = harness();
        let account_id = connected(&h).await;
        h.oauth.push_refresh(Err(sellersync_common::testing::MockOAuthClient::rejected(
            503,
            "service unavailable",
        )));

        let err = h.broker.refresh_access_token(account_id).await.unwrap_err();
        assert!(matches!(err, SellerSyncError::UpstreamError { status: 503, .. }), "{err:?}");
        assert!(err.is_retriable());
        assert!(!err.requires_reauthentication());
        assert_eq!(h.broker.get_access_token(account_id).await.unwrap(), "APP_USR-old");

        assert_eq!(h.broker.refresh_access_token(account_id).await.unwrap(), "refreshed_access_token");
    }

    /// Validates that a 401 followed by an unavailable token endpoint
    /// surfaces the retriable error instead of `Unauthorized`.
    #[tokio::test]
    async fn test_refresh_outage_during_retry_is_not_unauthorized() {
        let h = harness();
        let account_id = connected(&h).await;
        h.marketplace.accept_only(&["refreshed_access_token"]);
        h.oauth.push_refresh(Err(sellersync_common::testing::MockOAuthClient::rejected(429, "slow down")));

        let err =
            h.broker.authenticated_request(account_id, &ApiRequest::get("/users/me")).await.unwrap_err();
        assert!(matches!(err, SellerSyncError::UpstreamError { status: 429, .. }), "{err:?}");
        assert!(!err.requires_reauthentication());
    }

    /// Validates that a refresh failure during retry surfaces as `Unauthorized`.
    #[tokio::test]
    async fn test_refresh_failure_during_retry() {
        let h = harness();
        let account_id = connected(&h).await;
        h.marketplace.accept_only(&[]);
        h.oauth.push_refresh(Err(sellersync_common::testing::MockOAuthClient::rejected(400, "invalid_grant")));

        let err =
            h.broker.authenticated_request(account_id, &ApiRequest::get("/users/me")).await.unwrap_err();
        assert!(matches!(err, SellerSyncError::Unauthorized(_)));
        assert_eq!(h.marketplace.calls().len(), 1);
    }

    /// Validates that non-401 upstream errors pass through untouched.
    #[tokio::test]
    async fn test_upstream_error_passes_through() {
        let h = harness();
        let account_id = connected(&h).await;
        h.marketplace.fail("/items/MLA1", FakeMarketplace::upstream(404, "item not found"));

        let err =
            h.broker.authenticated_request(account_id, &ApiRequest::get("/items/MLA1")).await.unwrap_err();
        assert_eq!(err, SellerSyncError::UpstreamError { status: 404, message: "item not found".into() });
        assert_eq!(h.oauth.refresh_count(), 0);
    }

    /// Validates that a stale caller reuses a concurrent refresh.
    #[tokio::test]
    async fn test_stale_refresh_reuses_current_tokens() {
        let h = harness();
        let account_id = connected(&h).await;

        h.broker.refresh_tokens(account_id, Some("APP_USR-old")).await.unwrap();
        let pair = h.broker.refresh_tokens(account_id, Some("APP_USR-old")).await.unwrap();
        assert_eq!(pair.access_token, "refreshed_access_token");
        assert_eq!(h.oauth.refresh_count(), 1);
    }
}
