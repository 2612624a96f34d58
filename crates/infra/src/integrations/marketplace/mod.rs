//! Marketplace provider integration: resource API client and OAuth client
//! wiring.

pub mod client;

use std::time::Duration;

use sellersync_common::auth::{OAuthClient, OAuthConfig};
use sellersync_domain::{MarketplaceConfig, Result, SellerSyncError};

pub use client::MarketplaceClient;

/// Token-endpoint configuration for the configured marketplace.
#[must_use]
pub fn oauth_config(config: &MarketplaceConfig) -> OAuthConfig {
    let oauth = OAuthConfig::new(
        config.authorization_url.clone(),
        config.token_url.clone(),
        config.client_id.clone(),
        config.redirect_uri.clone(),
    )
    .with_scopes(config.scopes.clone());
    match &config.client_secret {
        Some(secret) => oauth.with_client_secret(secret.expose()),
        None => oauth,
    }
}

pub fn oauth_client(config: &MarketplaceConfig) -> Result<OAuthClient> {
    OAuthClient::new(oauth_config(config), Duration::from_secs(config.request_timeout_secs.max(1)))
        .map_err(|e| SellerSyncError::Config(format!("cannot build OAuth client: {e}")))
}
