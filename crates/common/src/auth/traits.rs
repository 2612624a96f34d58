//! Seams for dependency injection and testing.

use async_trait::async_trait;

use super::client::OAuthClientError;
use super::types::TokenSet;

/// Token endpoint operations used by the handshake and token broker.
#[async_trait]
pub trait OAuthClientTrait: Send + Sync {
    /// Browser authorization URL for `state` and an S256 `code_challenge`.
    fn authorization_url(&self, state: &str, code_challenge: &str) -> String;

    /// Exchange an authorization code, attaching `code_verifier` when known.
    ///
    /// # Errors
    /// `OAuthClientError::Status` carries non-2xx responses verbatim.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenSet, OAuthClientError>;

    /// Exchange a refresh token for a new token pair.
    ///
    /// # Errors
    /// Returns an error if the provider rejects the refresh token.
    async fn refresh_access_token(&self, refresh_token: &str)
        -> Result<TokenSet, OAuthClientError>;
}
