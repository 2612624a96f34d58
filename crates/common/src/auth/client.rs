//! OAuth 2.0 client for the marketplace token endpoint
//!
//! Handles:
//! - Authorization URL building with an S256 PKCE challenge
//! - Authorization code exchange (with or without a recovered verifier)
//! - Refresh token exchange
//!
//! Non-2xx token endpoint responses surface as [`OAuthClientError::Status`]
//! with the raw body so callers can classify and log them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::pkce::CHALLENGE_METHOD;
use super::traits::OAuthClientTrait;
use super::types::{OAuthConfig, TokenResponse, TokenSet};
use crate::error::{ErrorClassification, ErrorSeverity};

/// Upper bound on response bodies kept for diagnostics.
const MAX_ERROR_BODY: usize = 2_048;

/// Error type for OAuth client operations
#[derive(Debug)]
pub enum OAuthClientError {
    /// HTTP request failed before a response arrived
    RequestFailed(reqwest::Error),

    /// Token endpoint answered with a non-2xx status
    Status { status: u16, body: String },

    /// Failed to parse response
    ParseError(String),

    /// No refresh token available
    NoRefreshToken,

    /// Invalid configuration
    ConfigError(String),
}

impl std::fmt::Display for OAuthClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestFailed(e) => write!(f, "HTTP request failed: {e}"),
            Self::Status { status, body } => write!(f, "token endpoint returned {status}: {body}"),
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
            Self::NoRefreshToken => write!(f, "No refresh token available"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for OAuthClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RequestFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for OAuthClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::RequestFailed(err)
    }
}

impl OAuthClientError {
    /// Whether the provider complained about a missing `code_verifier`.
    #[must_use]
    pub fn mentions_code_verifier(&self) -> bool {
        matches!(self, Self::Status { body, .. } if body.to_ascii_lowercase().contains("code_verifier"))
    }
}

impl ErrorClassification for OAuthClientError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::RequestFailed(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::ParseError(_) | Self::NoRefreshToken | Self::ConfigError(_) => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::RequestFailed(_) => ErrorSeverity::Warning,
            Self::Status { status, .. } if *status >= 500 => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }
}

/// OAuth 2.0 client for the marketplace
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: OAuthConfig,
    client: Client,
}

impl OAuthClient {
    /// Create a client with the given request timeout.
    ///
    /// # Errors
    /// Returns `ConfigError` if the HTTP client cannot be built.
    pub fn new(config: OAuthConfig, timeout: Duration) -> Result<Self, OAuthClientError> {
        if config.client_id.trim().is_empty() {
            return Err(OAuthClientError::ConfigError("client_id is required".to_string()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OAuthClientError::ConfigError(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Build the browser authorization URL for `state` and `code_challenge`.
    #[must_use]
    pub fn authorization_url(&self, state: &str, code_challenge: &str) -> String {
        let mut params = vec![
            ("response_type", "code".to_string()),
            ("client_id", self.config.client_id.clone()),
            ("redirect_uri", self.config.redirect_uri.clone()),
            ("state", state.to_string()),
            ("code_challenge", code_challenge.to_string()),
            ("code_challenge_method", CHALLENGE_METHOD.to_string()),
        ];
        if !self.config.scopes.is_empty() {
            params.push(("scope", self.config.scope_string()));
        }

        let query_string = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let separator = if self.config.authorization_url.contains('?') { '&' } else { '?' };
        format!("{}{separator}{query_string}", self.config.authorization_url)
    }

    /// Exchange an authorization code for tokens.
    ///
    /// `code_verifier` is attached when the pending state was recovered.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenSet, OAuthClientError> {
        let mut params = vec![
            ("grant_type", "authorization_code".to_string()),
            ("client_id", self.config.client_id.clone()),
            ("code", code.to_string()),
            ("redirect_uri", self.config.redirect_uri.clone()),
        ];
        if let Some(verifier) = code_verifier.filter(|v| !v.is_empty()) {
            params.push(("code_verifier", verifier.to_string()));
        } else {
            warn!("Exchanging authorization code without a PKCE verifier");
        }
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret.clone()));
        }

        self.post_token_request(&params).await
    }

    /// Exchange a refresh token for a new token pair.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenSet, OAuthClientError> {
        if refresh_token.is_empty() {
            return Err(OAuthClientError::NoRefreshToken);
        }

        let mut params = vec![
            ("grant_type", "refresh_token".to_string()),
            ("client_id", self.config.client_id.clone()),
            ("refresh_token", refresh_token.to_string()),
        ];
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret.clone()));
        }

        self.post_token_request(&params).await
    }

    async fn post_token_request(
        &self,
        params: &[(&str, String)],
    ) -> Result<TokenSet, OAuthClientError> {
        let grant_type = params.first().map_or("", |(_, v)| v.as_str());
        debug!(grant_type, url = %self.config.token_url, "Calling token endpoint");

        let response = self
            .client
            .post(&self.config.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(OAuthClientError::Status { status: status.as_u16(), body });
        }

        let token_response: TokenResponse =
            response.json().await.map_err(|e| OAuthClientError::ParseError(e.to_string()))?;
        Ok(token_response.into())
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }
}

#[async_trait]
impl OAuthClientTrait for OAuthClient {
    fn authorization_url(&self, state: &str, code_challenge: &str) -> String {
        self.authorization_url(state, code_challenge)
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenSet, OAuthClientError> {
        self.exchange_code(code, code_verifier).await
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenSet, OAuthClientError> {
        self.refresh_access_token(refresh_token).await
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::client.
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server_uri: &str) -> OAuthClient {
        let config = OAuthConfig::new(
            "https://auth.marketplace.test/authorization",
            format!("{server_uri}/oauth/token"),
            "test_client_id",
            "http://localhost:8080/oauth/callback",
        )
        .with_client_secret("test_secret")
        .with_scopes(vec!["offline_access".to_string(), "read".to_string()]);
        OAuthClient::new(config, Duration::from_secs(5)).unwrap()
    }

    /// Validates authorization URL parameters.
    ///
    /// Assertions:
    /// - Ensures the URL carries `response_type=code` and the S256 method.
    /// - Ensures the redirect URI and scope are percent-encoded.
    #[test]
    fn test_authorization_url() {
        let client = client_for("http://127.0.0.1:1");
        let url = client.authorization_url("state123", "challenge456");

        assert!(url.starts_with("https://auth.marketplace.test/authorization?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=test_client_id"));
        assert!(url.contains("state=state123"));
        assert!(url.contains("code_challenge=challenge456"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Foauth%2Fcallback"));
        assert!(url.contains("scope=offline_access%20read"));
    }

    /// Validates a successful code exchange with a verifier.
    ///
    /// Assertions:
    /// - Ensures the form body carries the grant type and `code_verifier`.
    /// - Confirms the parsed token set.
    #[tokio::test]
    async fn test_exchange_code_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code_verifier=verifier-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "APP_USR-abc",
                "refresh_token": "TG-def",
                "token_type": "bearer",
                "expires_in": 21600,
                "user_id": 987
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = client_for(&server.uri()).exchange_code("code-1", Some("verifier-1")).await.unwrap();
        assert_eq!(tokens.access_token, "APP_USR-abc");
        assert_eq!(tokens.refresh_token.as_deref(), Some("TG-def"));
        assert_eq!(tokens.user_id.as_deref(), Some("987"));
    }

    /// Validates non-2xx handling.
    ///
    /// Assertions:
    /// - Confirms the status and body are preserved.
    /// - Ensures 5xx is retryable and 4xx is not.
    #[tokio::test]
    async fn test_exchange_code_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"error":"invalid_grant","message":"code_verifier required"}"#),
            )
            .mount(&server)
            .await;

        let err = client_for(&server.uri()).exchange_code("code-1", None).await.unwrap_err();
        match &err {
            OAuthClientError::Status { status, body } => {
                assert_eq!(*status, 400);
                assert!(body.contains("invalid_grant"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.mentions_code_verifier());
        assert!(!err.is_retryable());
        assert!(OAuthClientError::Status { status: 503, body: String::new() }.is_retryable());
    }

    /// Validates the refresh grant.
    #[tokio::test]
    async fn test_refresh_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=TG-old"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "APP_USR-new",
                "refresh_token": "TG-new",
                "expires_in": 21600
            })))
            .mount(&server)
            .await;

        let tokens = client_for(&server.uri()).refresh_access_token("TG-old").await.unwrap();
        assert_eq!(tokens.access_token, "APP_USR-new");
        assert_eq!(tokens.refresh_token.as_deref(), Some("TG-new"));
    }

    /// Validates that an empty refresh token never reaches the network.
    #[tokio::test]
    async fn test_refresh_requires_token() {
        let err = client_for("http://127.0.0.1:1").refresh_access_token("").await.unwrap_err();
        assert!(matches!(err, OAuthClientError::NoRefreshToken));
    }
}
