//! Token-threading fetch capability used within one sync run

use std::sync::Arc;

use sellersync_domain::Result;
use serde_json::Value;
use uuid::Uuid;

use crate::marketplace::ports::ApiRequest;
use crate::tokens::{TokenBroker, TokenPair};

/// Resolves credentials once and carries them across every call of a run.
///
/// A 401 triggers one refresh through the [`TokenBroker`] and one retry; the
/// refreshed pair replaces the carried one so later calls use it directly.
pub struct AuthenticatedFetcher {
    broker: Arc<TokenBroker>,
    account_id: Uuid,
    tokens: TokenPair,
    refreshes: u32,
}

impl AuthenticatedFetcher {
    pub async fn resolve(broker: Arc<TokenBroker>, account_id: Uuid) -> Result<Self> {
        let tokens = broker.active_tokens(account_id).await?;
        Ok(Self { broker, account_id, tokens, refreshes: 0 })
    }

    #[must_use]
    pub fn account_id(&self) -> Uuid {
        self.account_id
    }

    /// Refreshes observed by this fetcher.
    #[must_use]
    pub fn refreshes(&self) -> u32 {
        self.refreshes
    }

    pub async fn fetch(&mut self, request: &ApiRequest) -> Result<Value> {
        let before = self.tokens.access_token.clone();
        let result = self.broker.send_with_refresh(self.account_id, &mut self.tokens, request).await;
        if self.tokens.access_token != before {
            self.refreshes += 1;
        }
        result
    }
}
