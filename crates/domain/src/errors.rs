//! Error types used throughout the engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for SellerSync
///
/// The first group of variants is the credential/sync taxonomy surfaced to
/// callers; the second group covers ambient infrastructure failures.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum SellerSyncError {
    #[error("OAuth callback is missing the authorization code or state")]
    InvalidCallback,

    #[error("PKCE verifier for this authorization attempt could not be recovered")]
    PkceVerifierMissing,

    #[error("Token exchange failed with status {status}: {body}")]
    TokenExchangeFailed { status: u16, body: String, retriable: bool },

    #[error("No credentials stored for account {0}")]
    NoCredentials(String),

    #[error("Refresh token rejected: {0}")]
    RefreshFailed(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Upstream error {status}: {message}")]
    UpstreamError { status: u16, message: String },

    #[error("Ciphertext failed authentication")]
    AuthenticationError,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SellerSyncError {
    /// Build a `TokenExchangeFailed`, classifying 5xx upstream responses as
    /// retriable and everything else as terminal.
    pub fn token_exchange_failed(status: u16, body: impl Into<String>) -> Self {
        Self::TokenExchangeFailed { status, body: body.into(), retriable: status >= 500 }
    }

    /// Whether retrying the same operation later may succeed.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::TokenExchangeFailed { retriable, .. } => *retriable,
            Self::UpstreamError { status, .. } => *status >= 500 || *status == 429,
            Self::Network(_) | Self::Database(_) => true,
            _ => false,
        }
    }

    /// Terminal errors require a human (usually re-authentication) before
    /// the operation can succeed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !self.is_retriable()
    }

    /// The stored credentials can no longer be used; further calls for the
    /// account will fail the same way until the seller reconnects.
    #[must_use]
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            Self::NoCredentials(_)
                | Self::RefreshFailed(_)
                | Self::Unauthorized(_)
                | Self::AuthenticationError
        )
    }

    /// Stable machine-readable code for API payloads.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCallback => "invalid_callback",
            Self::PkceVerifierMissing => "pkce_verifier_missing",
            Self::TokenExchangeFailed { .. } => "token_exchange_failed",
            Self::NoCredentials(_) => "no_credentials",
            Self::RefreshFailed(_) => "refresh_failed",
            Self::Unauthorized(_) => "unauthorized",
            Self::UpstreamError { .. } => "upstream_error",
            Self::AuthenticationError => "authentication_error",
            Self::Database(_) => "database",
            Self::Config(_) => "config",
            Self::Network(_) => "network",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal",
        }
    }

    /// User-actionable hint for the dashboard, when one exists.
    #[must_use]
    pub fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidCallback | Self::PkceVerifierMissing => {
                Some("Restart the marketplace connect flow.")
            }
            Self::TokenExchangeFailed { retriable: true, .. } => {
                Some("The marketplace is temporarily unavailable. Try connecting again shortly.")
            }
            Self::TokenExchangeFailed { retriable: false, .. } => {
                Some("The authorization was rejected. Restart the marketplace connect flow.")
            }
            Self::NoCredentials(_) | Self::RefreshFailed(_) | Self::Unauthorized(_) => {
                Some("Reconnect the marketplace account.")
            }
            _ => None,
        }
    }

    /// HTTP status used when this error crosses the API boundary.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidCallback | Self::PkceVerifierMissing | Self::InvalidInput(_) => 400,
            Self::NoCredentials(_) | Self::RefreshFailed(_) | Self::Unauthorized(_) => 401,
            Self::NotFound(_) => 404,
            Self::TokenExchangeFailed { retriable: false, .. } => 400,
            Self::TokenExchangeFailed { retriable: true, .. } | Self::UpstreamError { .. } => 502,
            Self::Network(_) => 503,
            Self::AuthenticationError
            | Self::Database(_)
            | Self::Config(_)
            | Self::Internal(_) => 500,
        }
    }
}

/// Result type alias for SellerSync operations
pub type Result<T> = std::result::Result<T, SellerSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates retriable classification of token exchange failures.
    ///
    /// Assertions:
    /// - 503 upstream maps to a retriable error.
    /// - 400 upstream maps to a terminal error.
    #[test]
    fn test_token_exchange_classification() {
        let transient = SellerSyncError::token_exchange_failed(503, "unavailable");
        assert!(transient.is_retriable());
        assert_eq!(transient.http_status(), 502);

        let rejected = SellerSyncError::token_exchange_failed(400, "invalid_grant");
        assert!(rejected.is_terminal());
        assert_eq!(rejected.http_status(), 400);
    }

    /// Validates that decryption failures are never retried.
    #[test]
    fn test_authentication_error_is_terminal() {
        assert!(SellerSyncError::AuthenticationError.is_terminal());
        assert_eq!(SellerSyncError::AuthenticationError.code(), "authentication_error");
        assert!(SellerSyncError::AuthenticationError.requires_reauthentication());
        assert!(!SellerSyncError::Network("reset".into()).requires_reauthentication());
    }

    /// Validates that re-authentication errors carry a hint.
    #[test]
    fn test_user_hints() {
        assert!(SellerSyncError::RefreshFailed("invalid_grant".into()).user_hint().is_some());
        assert!(SellerSyncError::PkceVerifierMissing.user_hint().is_some());
        assert!(SellerSyncError::Internal("boom".into()).user_hint().is_none());
    }

    /// Validates the adjacently tagged wire format.
    #[test]
    fn test_serialization_shape() {
        let err = SellerSyncError::UpstreamError { status: 404, message: "not found".into() };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "UpstreamError");
        assert_eq!(json["details"]["status"], 404);
    }
}
