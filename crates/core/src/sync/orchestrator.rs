//! Sync orchestrator
//!
//! Per-account state machine `Idle -> Running -> Idle`. `start` flips the
//! account to Running and detaches the run; callers poll [`status`].
//!
//! Within a run, resources sync sequentially (items, orders, shipments,
//! questions) through one [`AuthenticatedFetcher`]. Each resource pages until
//! an empty page or the page cap, sleeping a fixed interval between pages and
//! after every failed record.
//!
//! [`status`]: SyncOrchestrator::status

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sellersync_domain::{
    clamp_window_days, json_id, Account, QueueMessage, ResourceCounters, ResourceKind, Result,
    SellerSyncError, StartOutcome, SyncConfig, SyncRun, SyncScope, UpsertOutcome,
};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::fetcher::AuthenticatedFetcher;
use super::ports::MirrorRepository;
use super::registry::RunRegistry;
use super::resources;
use crate::accounts::ports::AccountRepository;
use crate::queue::MessageQueue;
use crate::tokens::TokenBroker;

/// Counters plus the running streak of failed records for one resource.
#[derive(Debug, Default)]
struct Progress {
    counters: ResourceCounters,
    consecutive_failures: u32,
}

impl Progress {
    fn record(&mut self, outcome: UpsertOutcome) {
        self.consecutive_failures = 0;
        match outcome {
            UpsertOutcome::Created => self.counters.created += 1,
            UpsertOutcome::Updated => self.counters.updated += 1,
        }
    }
}

struct Inner {
    accounts: Arc<dyn AccountRepository>,
    broker: Arc<TokenBroker>,
    mirror: Arc<dyn MirrorRepository>,
    queue: Option<Arc<dyn MessageQueue>>,
    config: SyncConfig,
    runs: RunRegistry,
    shutdown: CancellationToken,
}

/// Cheap to clone; clones share runs and the shutdown token.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<Inner>,
}

impl SyncOrchestrator {
    /// `queue`, when present, receives a `sync_<resource>` message for every
    /// record that fails during a run.
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        broker: Arc<TokenBroker>,
        mirror: Arc<dyn MirrorRepository>,
        queue: Option<Arc<dyn MessageQueue>>,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                accounts,
                broker,
                mirror,
                queue,
                config,
                runs: RunRegistry::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Start a run unless one is active for the account.
    ///
    /// `window_days` bounds the orders search and is clamped to 1..=90.
    #[instrument(skip(self))]
    pub async fn start(
        &self,
        account_id: Uuid,
        scope: SyncScope,
        window_days: Option<u32>,
    ) -> Result<StartOutcome> {
        if self.inner.shutdown.is_cancelled() {
            return Err(SellerSyncError::Internal("sync orchestrator is shut down".into()));
        }
        let account = self
            .inner
            .accounts
            .get(account_id)
            .await?
            .ok_or_else(|| SellerSyncError::NotFound(format!("account {account_id}")))?;

        let window_days =
            clamp_window_days(Some(window_days.unwrap_or(self.inner.config.default_window_days)));
        if self.inner.runs.try_begin(account_id, scope, window_days) == StartOutcome::AlreadyRunning {
            debug!("Sync already running, start ignored");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let cancel = self.inner.shutdown.child_token();
        let this = self.clone();
        tokio::spawn(async move { this.supervise(account, scope, window_days, cancel).await });

        info!(window_days, "Sync run started");
        Ok(StartOutcome::Started)
    }

    /// Start an `all` sync for every known account; returns how many started.
    pub async fn start_all(&self) -> Result<usize> {
        let mut started = 0;
        for account in self.inner.accounts.list().await? {
            match self.start(account.id, SyncScope::All, None).await {
                Ok(StartOutcome::Started) => started += 1,
                Ok(StartOutcome::AlreadyRunning) => {}
                Err(e) => warn!(account_id = %account.id, error = %e, "Failed to start scheduled sync"),
            }
        }
        Ok(started)
    }

    /// Current or last run; `NotFound` if the account never synced.
    pub fn status(&self, account_id: Uuid) -> Result<SyncRun> {
        self.inner
            .runs
            .get(account_id)
            .ok_or_else(|| SellerSyncError::NotFound(format!("no sync run for account {account_id}")))
    }

    #[must_use]
    pub fn is_running(&self, account_id: Uuid) -> bool {
        self.inner.runs.is_running(account_id)
    }

    /// Cancel in-flight runs and wait up to `grace` for them to settle.
    pub async fn shutdown(&self, grace: Duration) {
        self.inner.shutdown.cancel();
        let waited = tokio::time::timeout(grace, async {
            while self.inner.runs.running_count() > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        if waited.is_err() {
            warn!(running = self.inner.runs.running_count(), "Sync runs still active after shutdown grace");
        }
    }

    /// Fetch one record by id and upsert it.
    #[instrument(skip(self))]
    pub async fn sync_one(
        &self,
        kind: ResourceKind,
        account_id: Uuid,
        resource_id: &str,
    ) -> Result<UpsertOutcome> {
        let mut fetcher = AuthenticatedFetcher::resolve(self.inner.broker.clone(), account_id).await?;
        self.fetch_and_store(kind, account_id, resource_id, &mut fetcher).await
    }

    pub async fn sync_item(&self, account_id: Uuid, item_id: &str) -> Result<UpsertOutcome> {
        self.sync_one(ResourceKind::Items, account_id, item_id).await
    }

    pub async fn sync_order(&self, account_id: Uuid, order_id: &str) -> Result<UpsertOutcome> {
        self.sync_one(ResourceKind::Orders, account_id, order_id).await
    }

    pub async fn sync_shipment(&self, account_id: Uuid, shipment_id: &str) -> Result<UpsertOutcome> {
        self.sync_one(ResourceKind::Shipments, account_id, shipment_id).await
    }

    pub async fn sync_question(&self, account_id: Uuid, question_id: &str) -> Result<UpsertOutcome> {
        self.sync_one(ResourceKind::Questions, account_id, question_id).await
    }

    /// Run `execute` in its own task so a panic is caught and recorded, then
    /// return the account to Idle.
    async fn supervise(
        self,
        account: Account,
        scope: SyncScope,
        window_days: u32,
        cancel: CancellationToken,
    ) {
        let account_id = account.id;
        let worker = self.clone();
        let run_cancel = cancel.clone();
        let result = tokio::spawn(async move {
            worker.execute(&account, scope, window_days, &run_cancel).await
        })
        .await;

        let cancelled = cancel.is_cancelled();
        self.inner.runs.update(account_id, |run| {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => run.record_error(e.to_string()),
                Err(join) => run.record_error(join_failure(join)),
            }
            if cancelled {
                run.cancelled = true;
                run.record_error("cancelled");
            }
            run.finish();
        });

        if let Some(run) = self.inner.runs.get(account_id) {
            let fetched: u64 = run.counters.values().map(|c| c.fetched).sum();
            let failed: u64 = run.counters.values().map(|c| c.failed).sum();
            if run.errors.is_empty() {
                info!(%account_id, fetched, "Sync run finished");
            } else {
                warn!(%account_id, fetched, failed, errors = run.errors.len(), "Sync run finished with errors");
            }
        }
    }

    async fn execute(
        &self,
        account: &Account,
        scope: SyncScope,
        window_days: u32,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut fetcher = AuthenticatedFetcher::resolve(self.inner.broker.clone(), account.id).await?;

        for &kind in scope.resources() {
            if cancel.is_cancelled() {
                break;
            }
            let result = match kind {
                ResourceKind::Shipments => self.sync_shipments(account, &mut fetcher, cancel).await,
                _ => self.sync_paged(kind, account, window_days, &mut fetcher, cancel).await,
            };
            if let Err(e) = result {
                if e.requires_reauthentication() {
                    return Err(e);
                }
                error!(account_id = %account.id, %kind, error = %e, "Resource sync failed");
                self.inner.runs.update(account.id, |run| run.record_error(format!("{kind}: {e}")));
            }
        }
        Ok(())
    }

    /// Items, orders and questions: page through the marketplace search.
    async fn sync_paged(
        &self,
        kind: ResourceKind,
        account: &Account,
        window_days: u32,
        fetcher: &mut AuthenticatedFetcher,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let page_size = self.inner.config.page_size;
        let max_pages = self.inner.config.max_pages;
        let orders_since = Utc::now() - chrono::Duration::days(i64::from(window_days));
        let mut progress = Progress::default();

        for page in 0..max_pages {
            if cancel.is_cancelled() {
                break;
            }
            let Some(offset) = page.checked_mul(page_size) else {
                warn!(%kind, page, page_size, "Page offset out of range, stopping");
                break;
            };
            let Some(request) =
                resources::page_request(kind, account, offset, page_size, orders_since)
            else {
                break;
            };
            let entries = resources::page_entries(kind, &fetcher.fetch(&request).await?);
            if entries.is_empty() {
                debug!(%kind, page, "Empty page, resource complete");
                break;
            }
            progress.counters.pages += 1;
            progress.counters.fetched += entries.len() as u64;

            for entry in entries {
                let (resource_id, outcome) = match kind {
                    ResourceKind::Items => {
                        let id = json_id(&entry);
                        let outcome = match &id {
                            Some(id) => self.fetch_and_store(kind, account.id, id, fetcher).await,
                            None => Err(SellerSyncError::InvalidInput("search result without id".into())),
                        };
                        (id, outcome)
                    }
                    _ => {
                        let id = entry.get("id").and_then(json_id);
                        (id, resources::store(self.inner.mirror.as_ref(), kind, account.id, entry).await)
                    }
                };
                match outcome {
                    Ok(outcome) => progress.record(outcome),
                    Err(e) => {
                        self.record_failure(kind, account.id, resource_id.as_deref(), e, &mut progress, cancel)
                            .await?;
                    }
                }
            }

            self.publish(account.id, kind, &progress);
            if page + 1 == max_pages {
                info!(%kind, max_pages, "Page cap reached, ending resource sync");
            } else {
                self.pause(self.page_delay(), cancel).await;
            }
        }

        self.publish(account.id, kind, &progress);
        Ok(())
    }

    /// Shipments: resolve the shipment reference of every mirrored order.
    async fn sync_shipments(
        &self,
        account: &Account,
        fetcher: &mut AuthenticatedFetcher,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let kind = ResourceKind::Shipments;
        let page_size = self.inner.config.page_size as usize;
        let max_pages = self.inner.config.max_pages;
        let mut progress = Progress::default();

        for page in 0..max_pages {
            if cancel.is_cancelled() {
                break;
            }
            let offset = (page as usize).saturating_mul(page_size);
            let refs = self.inner.mirror.shipment_refs(account.id, offset, page_size).await?;
            if refs.is_empty() {
                break;
            }
            progress.counters.pages += 1;
            progress.counters.fetched += refs.len() as u64;

            for shipment in refs {
                match self.fetch_and_store(kind, account.id, &shipment.shipment_id, fetcher).await {
                    Ok(outcome) => progress.record(outcome),
                    Err(e) => {
                        self.record_failure(
                            kind,
                            account.id,
                            Some(&shipment.shipment_id),
                            e,
                            &mut progress,
                            cancel,
                        )
                        .await?;
                    }
                }
            }

            self.publish(account.id, kind, &progress);
            if page + 1 == max_pages {
                info!(%kind, max_pages, "Page cap reached, ending resource sync");
            } else {
                self.pause(self.page_delay(), cancel).await;
            }
        }

        self.publish(account.id, kind, &progress);
        Ok(())
    }

    async fn fetch_and_store(
        &self,
        kind: ResourceKind,
        account_id: Uuid,
        resource_id: &str,
        fetcher: &mut AuthenticatedFetcher,
    ) -> Result<UpsertOutcome> {
        let payload = fetcher.fetch(&resources::record_request(kind, resource_id)).await?;
        resources::store(self.inner.mirror.as_ref(), kind, account_id, payload).await
    }

    /// Record a failed record and back off. Credential failures and an
    /// exceeded failure streak end the resource sync instead.
    async fn record_failure(
        &self,
        kind: ResourceKind,
        account_id: Uuid,
        resource_id: Option<&str>,
        error: SellerSyncError,
        progress: &mut Progress,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if error.requires_reauthentication() {
            return Err(error);
        }

        progress.counters.failed += 1;
        progress.consecutive_failures += 1;
        let label = resource_id.unwrap_or("<unknown>");
        warn!(%account_id, %kind, resource_id = label, error = %error, "Record sync failed");
        self.inner.runs.update(account_id, |run| run.record_error(format!("{kind} {label}: {error}")));

        if let (Some(queue), Some(id)) = (&self.inner.queue, resource_id) {
            queue.enqueue(QueueMessage::refresh(kind, account_id, id));
        }

        let limit = self.inner.config.max_consecutive_failures;
        if limit > 0 && progress.consecutive_failures >= limit {
            self.publish(account_id, kind, progress);
            return Err(SellerSyncError::Internal(format!(
                "aborted after {limit} consecutive failures"
            )));
        }

        self.pause(Duration::from_millis(self.inner.config.failure_backoff_ms), cancel).await;
        Ok(())
    }

    fn publish(&self, account_id: Uuid, kind: ResourceKind, progress: &Progress) {
        self.inner.runs.update(account_id, |run| *run.counters_mut(kind) = progress.counters);
    }

    fn page_delay(&self) -> Duration {
        Duration::from_millis(self.inner.config.page_delay_ms)
    }

    async fn pause(&self, delay: Duration, cancel: &CancellationToken) {
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            () = cancel.cancelled() => {}
            () = tokio::time::sleep(delay) => {}
        }
    }
}

fn join_failure(join: JoinError) -> String {
    if !join.is_panic() {
        return format!("sync task aborted: {join}");
    }
    let payload: Box<dyn Any + Send> = join.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("sync task panicked: {message}")
}
