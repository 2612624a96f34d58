//! OAuth 2.0 token and configuration types for the marketplace provider.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Tokens issued by the marketplace token endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,

    /// Absent when the provider did not grant `offline_access`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Seller id the tokens were issued for, when the provider includes it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    pub obtained_at: DateTime<Utc>,
}

impl TokenSet {
    #[must_use]
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
        scope: Option<String>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
            scope,
            user_id: None,
            obtained_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Whether the access token expires within `threshold_seconds`.
    #[must_use]
    pub fn is_expired(&self, threshold_seconds: i64) -> bool {
        if self.expires_in <= 0 {
            return false;
        }
        let expires_at = self.obtained_at + chrono::Duration::seconds(self.expires_in);
        Utc::now() + chrono::Duration::seconds(threshold_seconds) >= expires_at
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Raw token endpoint response (RFC 6749 section 5.1 plus `user_id`).
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    pub scope: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub user_id: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

impl From<TokenResponse> for TokenSet {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            token_type: response.token_type,
            expires_in: response.expires_in,
            scope: response.scope,
            user_id: response.user_id,
            obtained_at: Utc::now(),
        }
    }
}

/// Provider endpoints and client registration.
#[derive(Clone)]
pub struct OAuthConfig {
    pub authorization_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    #[must_use]
    pub fn new(
        authorization_url: impl Into<String>,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            authorization_url: authorization_url.into(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: redirect_uri.into(),
            scopes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("authorization_url", &self.authorization_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::types.
    use super::*;

    /// Validates parsing of a marketplace token response.
    ///
    /// Assertions:
    /// - Confirms a numeric `user_id` is normalized to a string.
    /// - Confirms a missing `token_type` defaults to `Bearer`.
    #[test]
    fn test_token_response_conversion() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"APP_USR-1","refresh_token":"TG-1","expires_in":21600,"scope":"offline_access read","user_id":123456}"#,
        )
        .unwrap();
        let tokens: TokenSet = response.into();

        assert_eq!(tokens.access_token, "APP_USR-1");
        assert_eq!(tokens.refresh_token.as_deref(), Some("TG-1"));
        assert_eq!(tokens.token_type, "Bearer");
        assert_eq!(tokens.user_id.as_deref(), Some("123456"));
        assert!(!tokens.is_expired(300));
    }

    /// Validates expiry arithmetic.
    #[test]
    fn test_is_expired() {
        let mut tokens = TokenSet::new("a".into(), None, 60, None);
        assert!(tokens.is_expired(120));
        assert!(!tokens.is_expired(0));

        tokens.expires_in = 0;
        assert!(!tokens.is_expired(3600));
    }

    /// Validates that Debug output never contains secrets.
    #[test]
    fn test_debug_redaction() {
        let tokens = TokenSet::new("secret-access".into(), Some("secret-refresh".into()), 60, None);
        let rendered = format!("{tokens:?}");
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));

        let config = OAuthConfig::new("a", "b", "c", "d").with_client_secret("hunter2");
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
