//! Mock implementations of common traits

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::auth::{OAuthClientError, OAuthClientTrait, TokenSet};

type Scripted = Arc<Mutex<VecDeque<Result<TokenSet, OAuthClientError>>>>;

/// Scripted OAuth client.
///
/// Each call pops the next scripted result; when the script is empty a
/// default token set is returned. Calls are recorded for assertions.
#[derive(Clone, Default)]
pub struct MockOAuthClient {
    exchanges: Scripted,
    refreshes: Scripted,
    exchange_verifiers: Arc<Mutex<Vec<Option<String>>>>,
    refresh_tokens_seen: Arc<Mutex<Vec<String>>>,
}

impl std::fmt::Debug for MockOAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockOAuthClient")
            .field("exchange_calls", &self.exchange_verifiers.lock().len())
            .field("refresh_calls", &self.refresh_tokens_seen.lock().len())
            .finish()
    }
}

impl MockOAuthClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Token set shaped like a marketplace grant for `user_id`.
    #[must_use]
    pub fn tokens(access: &str, refresh: &str, user_id: Option<&str>) -> TokenSet {
        let tokens = TokenSet::new(
            access.to_string(),
            Some(refresh.to_string()),
            21_600,
            Some("offline_access read write".to_string()),
        );
        match user_id {
            Some(id) => tokens.with_user_id(id),
            None => tokens,
        }
    }

    /// Token endpoint rejection with `status` and `body`.
    #[must_use]
    pub fn rejected(status: u16, body: &str) -> OAuthClientError {
        OAuthClientError::Status { status, body: body.to_string() }
    }

    pub fn push_exchange(&self, result: Result<TokenSet, OAuthClientError>) {
        self.exchanges.lock().push_back(result);
    }

    pub fn push_refresh(&self, result: Result<TokenSet, OAuthClientError>) {
        self.refreshes.lock().push_back(result);
    }

    #[must_use]
    pub fn exchange_count(&self) -> usize {
        self.exchange_verifiers.lock().len()
    }

    /// Verifier passed to each `exchange_code` call, in order.
    #[must_use]
    pub fn exchange_verifiers(&self) -> Vec<Option<String>> {
        self.exchange_verifiers.lock().clone()
    }

    #[must_use]
    pub fn refresh_count(&self) -> usize {
        self.refresh_tokens_seen.lock().len()
    }

    /// Refresh tokens presented to `refresh_access_token`, in order.
    #[must_use]
    pub fn refresh_tokens_seen(&self) -> Vec<String> {
        self.refresh_tokens_seen.lock().clone()
    }
}

#[async_trait]
impl OAuthClientTrait for MockOAuthClient {
    fn authorization_url(&self, state: &str, code_challenge: &str) -> String {
        format!(
            "https://auth.mock.local/authorization?state={state}&code_challenge={code_challenge}&code_challenge_method=S256"
        )
    }

    async fn exchange_code(
        &self,
        _code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenSet, OAuthClientError> {
        self.exchange_verifiers.lock().push(code_verifier.map(str::to_string));
        self.exchanges
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Self::tokens("mock_access_token", "mock_refresh_token", Some("1001"))))
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenSet, OAuthClientError> {
        self.refresh_tokens_seen.lock().push(refresh_token.to_string());
        self.refreshes
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Self::tokens("refreshed_access_token", "refreshed_refresh_token", None)))
    }
}
