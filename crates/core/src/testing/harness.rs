//! Wires the core services over in-memory adapters

use std::sync::Arc;
use std::time::Duration;

use sellersync_common::auth::TokenSet;
use sellersync_common::crypto::{CredentialVault, KdfParams};
use sellersync_common::sync::queue::{DeliveryQueue, QueueConfig};
use sellersync_common::testing::MockOAuthClient;
use sellersync_domain::{NewAccount, QueueMessage, SyncConfig};
use uuid::Uuid;

use super::marketplace::FakeMarketplace;
use super::repositories::{
    InMemoryAccountRepository, InMemoryCredentialRepository, InMemoryMirrorRepository,
    InMemoryPendingAuthStore, InMemoryWebhookLedger,
};
use crate::accounts::ports::{AccountRepository, CredentialRepository};
use crate::oauth::{HandshakeSettings, OAuthHandshake};
use crate::queue::MessageQueue;
use crate::sync::SyncOrchestrator;
use crate::tokens::{CredentialCodec, TokenBroker};
use crate::webhooks::{WebhookIngester, WebhookProcessor};

/// Every adapter is exposed so tests can script inputs and inspect state.
pub struct TestHarness {
    pub accounts: Arc<InMemoryAccountRepository>,
    pub credentials: Arc<InMemoryCredentialRepository>,
    pub pending: Arc<InMemoryPendingAuthStore>,
    pub mirror: Arc<InMemoryMirrorRepository>,
    pub ledger: Arc<InMemoryWebhookLedger>,
    pub marketplace: Arc<FakeMarketplace>,
    pub oauth: MockOAuthClient,
    pub queue: Arc<DeliveryQueue<QueueMessage>>,
    pub codec: CredentialCodec,
    pub broker: Arc<TokenBroker>,
}

/// Fresh harness with empty stores.
#[must_use]
pub fn harness() -> TestHarness {
    TestHarness::new()
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    #[must_use]
    pub fn new() -> Self {
        let credentials = Arc::new(InMemoryCredentialRepository::default());
        let marketplace = Arc::new(FakeMarketplace::new());
        let oauth = MockOAuthClient::new();
        let codec = CredentialCodec::new(Arc::new(CredentialVault::new(
            Some("harness-passphrase"),
            KdfParams::testing(),
        )));
        let broker = Arc::new(TokenBroker::new(
            credentials.clone(),
            Arc::new(oauth.clone()),
            marketplace.clone(),
            codec.clone(),
        ));
        let queue = DeliveryQueue::new(QueueConfig::default()).expect("default queue config");

        Self {
            accounts: Arc::new(InMemoryAccountRepository::default()),
            credentials,
            pending: Arc::new(InMemoryPendingAuthStore::new(Duration::from_secs(300))),
            mirror: Arc::new(InMemoryMirrorRepository::default()),
            ledger: Arc::new(InMemoryWebhookLedger::default()),
            marketplace,
            oauth,
            queue: Arc::new(queue),
            codec,
            broker,
        }
    }

    /// No delays, two records per page, five pages at most.
    #[must_use]
    pub fn sync_config() -> SyncConfig {
        SyncConfig {
            page_size: 2,
            max_pages: 5,
            page_delay_ms: 0,
            failure_backoff_ms: 0,
            ..SyncConfig::default()
        }
    }

    #[must_use]
    pub fn handshake(&self, settings: HandshakeSettings) -> OAuthHandshake {
        OAuthHandshake::new(
            Arc::new(self.oauth.clone()),
            self.pending.clone(),
            self.accounts.clone(),
            self.credentials.clone(),
            self.marketplace.clone(),
            self.codec.clone(),
            settings,
        )
    }

    #[must_use]
    pub fn orchestrator(&self, config: SyncConfig) -> SyncOrchestrator {
        let queue: Arc<dyn MessageQueue> = self.queue.clone();
        SyncOrchestrator::new(
            self.accounts.clone(),
            self.broker.clone(),
            self.mirror.clone(),
            Some(queue),
            config,
        )
    }

    #[must_use]
    pub fn ingester(&self) -> WebhookIngester {
        WebhookIngester::new(self.ledger.clone(), self.queue.clone())
    }

    #[must_use]
    pub fn processor(&self, orchestrator: SyncOrchestrator) -> WebhookProcessor {
        WebhookProcessor::new(self.accounts.clone(), self.ledger.clone(), orchestrator)
    }

    /// Register an account with stored credentials, bypassing the handshake.
    pub async fn connect_account(&self, seller_id: &str, access: &str, refresh: Option<&str>) -> Uuid {
        let account = self
            .accounts
            .upsert_by_seller_id(&NewAccount {
                seller_id: seller_id.to_string(),
                display_name: format!("seller-{seller_id}"),
                marketplace_id: "default".to_string(),
            })
            .await
            .expect("upsert account");

        let tokens = TokenSet::new(access.to_string(), refresh.map(ToString::to_string), 21_600, None);
        let record = self.codec.seal(account.id, &tokens).await.expect("seal tokens");
        self.credentials.replace_active(record).await.expect("store credentials");
        account.id
    }
}
