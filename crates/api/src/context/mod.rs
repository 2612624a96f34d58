//! Application context - dependency injection container

use std::sync::Arc;
use std::time::Duration;

use sellersync_common::auth::{OAuthClientTrait, StateCookieSigner};
use sellersync_common::{CredentialVault, KdfParams};
use sellersync_core::{
    AccountRepository, CredentialCodec, CredentialRepository, HandshakeSettings, MarketplaceApi,
    MessageQueue, MirrorRepository, OAuthHandshake, PendingAuthStore, SyncOrchestrator,
    TokenBroker, WebhookIngester, WebhookLedger, WebhookProcessor,
};
use sellersync_domain::{Config, Result, Secret, SellerSyncError};
use sellersync_infra::integrations::marketplace::oauth_client;
use sellersync_infra::{
    build_queue, DbManager, InMemoryQueue, MarketplaceClient, MemoryPendingAuthStore,
    PendingCacheConfig, SchedulerError, SqliteAccountRepository, SqliteCredentialRepository,
    SqliteMirrorRepository, SqlitePendingAuthStore, SqliteWebhookLedger, SyncScheduler,
    SyncSchedulerConfig, WebhookWorker, WebhookWorkerConfig,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Grace period for in-flight sync runs on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Holds every service the HTTP layer and background tasks share.
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub accounts: Arc<dyn AccountRepository>,
    pub mirror: Arc<SqliteMirrorRepository>,
    pub queue: Arc<InMemoryQueue>,
    pub handshake: Arc<OAuthHandshake>,
    pub orchestrator: SyncOrchestrator,
    pub ingester: Arc<WebhookIngester>,
    pub cookie_signer: StateCookieSigner,
    worker: Mutex<WebhookWorker>,
    scheduler: Mutex<Option<SyncScheduler>>,
}

impl AppContext {
    /// Open the database, run migrations and wire the services.
    ///
    /// Background tasks are not started; see [`start_background`](Self::start_background).
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        if config.marketplace.redirect_uri.trim().is_empty() {
            return Err(SellerSyncError::Config("marketplace.redirect_uri is required".into()));
        }

        let db = Arc::new(DbManager::from_config(&config.database)?);
        db.run_migrations()?;

        let accounts: Arc<dyn AccountRepository> =
            Arc::new(SqliteAccountRepository::new(Arc::clone(&db)));
        let credentials: Arc<dyn CredentialRepository> =
            Arc::new(SqliteCredentialRepository::new(Arc::clone(&db)));
        let mirror = Arc::new(SqliteMirrorRepository::new(Arc::clone(&db)));
        let ledger: Arc<dyn WebhookLedger> = Arc::new(SqliteWebhookLedger::new(Arc::clone(&db)));
        let pending = pending_store(&config, &db);

        let api: Arc<dyn MarketplaceApi> = Arc::new(MarketplaceClient::from_config(&config.marketplace)?);
        let oauth: Arc<dyn OAuthClientTrait> = Arc::new(oauth_client(&config.marketplace)?);
        let codec = CredentialCodec::new(Arc::new(build_vault(&config)));
        let cookie_signer = build_cookie_signer(config.server.cookie_secret.as_ref())?;

        let handshake = Arc::new(OAuthHandshake::new(
            Arc::clone(&oauth),
            pending,
            Arc::clone(&accounts),
            Arc::clone(&credentials),
            Arc::clone(&api),
            codec.clone(),
            HandshakeSettings::from_config(&config),
        ));
        let broker = Arc::new(TokenBroker::new(credentials, oauth, api, codec));

        let queue = build_queue(&config.worker)?;
        let dyn_queue: Arc<dyn MessageQueue> = queue.clone();
        let mirror_port: Arc<dyn MirrorRepository> = mirror.clone();
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&accounts),
            broker,
            mirror_port,
            Some(Arc::clone(&dyn_queue)),
            config.sync.clone(),
        );

        let ingester = Arc::new(WebhookIngester::new(Arc::clone(&ledger), Arc::clone(&dyn_queue)));
        let processor = Arc::new(WebhookProcessor::new(
            Arc::clone(&accounts),
            Arc::clone(&ledger),
            orchestrator.clone(),
        ));
        let worker = WebhookWorker::new(
            dyn_queue,
            processor,
            ledger,
            WebhookWorkerConfig::from_config(&config.worker),
        );

        info!(
            database = %db.path().display(),
            encrypted = db.is_encrypted(),
            durable_pending_state = config.oauth.durable_pending_state,
            "Application context initialised"
        );

        Ok(Self {
            config,
            db,
            accounts,
            mirror,
            queue,
            handshake,
            orchestrator,
            ingester,
            cookie_signer,
            worker: Mutex::new(worker),
            scheduler: Mutex::new(None),
        })
    }

    /// Start the webhook worker and, when enabled, the cron sync scheduler.
    pub async fn start_background(&self) -> Result<()> {
        self.worker.lock().await.start()?;

        if self.config.sync.schedule_enabled {
            let mut scheduler = SyncScheduler::new(
                self.orchestrator.clone(),
                SyncSchedulerConfig::from_config(&self.config.sync),
            )
            .await?;
            scheduler.start().await?;
            *self.scheduler.lock().await = Some(scheduler);
        } else {
            info!("Scheduled sync disabled");
        }
        Ok(())
    }

    /// Stop background tasks and let in-flight sync runs settle.
    pub async fn shutdown(&self) {
        match self.worker.lock().await.stop().await {
            Ok(()) | Err(SchedulerError::NotRunning) => {}
            Err(err) => warn!(error = %err, "Webhook worker did not stop cleanly"),
        }

        if let Some(mut scheduler) = self.scheduler.lock().await.take() {
            if let Err(err) = scheduler.stop().await {
                warn!(error = %err, "Sync scheduler did not stop cleanly");
            }
        }

        self.orchestrator.shutdown(SHUTDOWN_GRACE).await;
        info!("Application context shut down");
    }

    pub async fn worker_running(&self) -> bool {
        self.worker.lock().await.is_running()
    }

    /// Database reachability plus queue depth.
    pub async fn health_check(&self) -> HealthReport {
        let db = Arc::clone(&self.db);
        let database = match tokio::task::spawn_blocking(move || db.health_check()).await {
            Ok(Ok(())) => "ok".to_string(),
            Ok(Err(err)) => format!("error: {err}"),
            Err(err) => format!("error: {err}"),
        };

        let stats = self.queue.stats();
        HealthReport {
            status: if database == "ok" { "ok" } else { "degraded" },
            database,
            queue: QueueHealth {
                visible: stats.visible,
                in_flight: stats.in_flight,
                dead_lettered: stats.dead_lettered,
            },
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub database: String,
    pub queue: QueueHealth,
    pub version: &'static str,
}

impl HealthReport {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    pub visible: usize,
    pub in_flight: usize,
    pub dead_lettered: usize,
}

fn pending_store(config: &Config, db: &Arc<DbManager>) -> Arc<dyn PendingAuthStore> {
    let ttl = Duration::from_secs(config.oauth.state_ttl_secs);
    if config.oauth.durable_pending_state {
        Arc::new(SqlitePendingAuthStore::new(Arc::clone(db), ttl))
    } else {
        warn!("Pending authorizations kept in memory; a restart drops in-progress connects");
        Arc::new(MemoryPendingAuthStore::new(PendingCacheConfig::with_ttl(ttl)))
    }
}

fn build_vault(config: &Config) -> CredentialVault {
    let params = KdfParams {
        memory_kib: config.vault.memory_kib,
        iterations: config.vault.iterations,
        parallelism: config.vault.parallelism,
    };
    let vault = CredentialVault::new(config.vault.passphrase.as_ref().map(Secret::expose), params);
    if vault.uses_default_passphrase() {
        warn!("Credential vault is using the default development passphrase; set SELLERSYNC_VAULT_PASSPHRASE");
    }
    vault
}

fn build_cookie_signer(secret: Option<&Secret>) -> Result<StateCookieSigner> {
    let signer = match secret {
        Some(secret) => StateCookieSigner::new(secret.expose().as_bytes()),
        None => {
            warn!("No cookie secret configured; state cookies will not survive a restart");
            StateCookieSigner::ephemeral()
        }
    };
    signer.map_err(|e| SellerSyncError::Config(e.to_string()))
}
