//! Cron-driven full sync of every connected account.
//!
//! Each tick calls [`SyncOrchestrator::start_all`]; accounts that are already
//! syncing are skipped by the orchestrator's single-flight rule, so a slow run
//! never overlaps with the next tick.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sellersync_core::SyncOrchestrator;
use sellersync_domain::SyncConfig;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::error::{SchedulerError, SchedulerResult};

#[derive(Debug, Clone)]
pub struct SyncSchedulerConfig {
    /// Six-field cron expression (seconds first).
    pub cron_expression: String,
    pub job_timeout: Duration,
    pub start_timeout: Duration,
    pub stop_timeout: Duration,
}

impl Default for SyncSchedulerConfig {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

impl SyncSchedulerConfig {
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            cron_expression: config.schedule.clone(),
            job_timeout: Duration::from_secs(30),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

pub struct SyncScheduler {
    scheduler: Arc<RwLock<JobScheduler>>,
    config: SyncSchedulerConfig,
    job_id: Uuid,
    running: bool,
}

impl SyncScheduler {
    /// Create the scheduler and register the sync job. Nothing fires until
    /// [`start`](Self::start).
    pub async fn new(
        orchestrator: SyncOrchestrator,
        config: SyncSchedulerConfig,
    ) -> SchedulerResult<Self> {
        let raw_scheduler = JobScheduler::new()
            .await
            .map_err(|source| SchedulerError::CreationFailed { source })?;
        let job_id = register_sync_job(&raw_scheduler, orchestrator, &config).await?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(raw_scheduler)),
            config,
            job_id,
            running: false,
        })
    }

    #[must_use]
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[instrument(skip(self), fields(cron = %self.config.cron_expression))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.running {
            return Err(SchedulerError::AlreadyRunning);
        }

        let scheduler = Arc::clone(&self.scheduler);
        let start_timeout = self.config.start_timeout;
        tokio::time::timeout(start_timeout, async move {
            let guard = scheduler.write().await;
            guard.start().await
        })
        .await
        .map_err(|source| SchedulerError::Timeout { duration: start_timeout, source })?
        .map_err(|source| SchedulerError::StartFailed { source })?;

        self.running = true;
        info!("Sync scheduler started");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.running {
            return Err(SchedulerError::NotRunning);
        }

        let scheduler = Arc::clone(&self.scheduler);
        let stop_timeout = self.config.stop_timeout;
        tokio::time::timeout(stop_timeout, async move {
            let mut guard = scheduler.write().await;
            guard.shutdown().await
        })
        .await
        .map_err(|source| SchedulerError::Timeout { duration: stop_timeout, source })?
        .map_err(|source| SchedulerError::StopFailed { source })?;

        self.running = false;
        info!("Sync scheduler stopped");
        Ok(())
    }
}

async fn register_sync_job(
    scheduler: &JobScheduler,
    orchestrator: SyncOrchestrator,
    config: &SyncSchedulerConfig,
) -> SchedulerResult<Uuid> {
    let job_timeout = config.job_timeout;

    let job = Job::new_async(config.cron_expression.as_str(), move |_id, _lock| {
        let orchestrator = orchestrator.clone();
        Box::pin(async move {
            let started = Instant::now();
            match tokio::time::timeout(job_timeout, orchestrator.start_all()).await {
                Ok(Ok(started_runs)) => {
                    info!(
                        started_runs,
                        elapsed_ms = started.elapsed().as_millis(),
                        "Scheduled sync dispatched"
                    );
                }
                Ok(Err(err)) => error!(error = %err, "Scheduled sync failed to start"),
                Err(_) => warn!(timeout_secs = job_timeout.as_secs(), "Scheduled sync timed out"),
            }
        })
    })
    .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

    let job_id = scheduler
        .add(job)
        .await
        .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;
    debug!(cron = %config.cron_expression, %job_id, "Registered scheduled sync job");
    Ok(job_id)
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if self.running {
            warn!("SyncScheduler dropped while running; jobs stop with the runtime");
        }
    }
}

#[cfg(test)]
mod tests {
    use sellersync_core::testing::harness;

    use super::*;

    fn fast_config() -> SyncSchedulerConfig {
        SyncSchedulerConfig {
            cron_expression: "*/1 * * * * *".into(),
            job_timeout: Duration::from_secs(2),
            start_timeout: Duration::from_secs(2),
            stop_timeout: Duration::from_secs(2),
        }
    }

    /// Validates that a tick starts a sync for each connected account.
    ///
    /// Assertions:
    /// - Confirms a run is recorded for the account after the first tick.
    /// - Confirms stop succeeds and a second stop reports NotRunning.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tick_starts_sync_for_accounts() {
        let h = harness();
        let account_id = h.connect_account("1001", "access", Some("refresh")).await;
        let orchestrator = h.orchestrator(harness_sync_config());

        let mut scheduler = SyncScheduler::new(orchestrator.clone(), fast_config()).await.unwrap();
        scheduler.start().await.unwrap();
        assert!(matches!(scheduler.start().await, Err(SchedulerError::AlreadyRunning)));

        let deadline = Instant::now() + Duration::from_secs(5);
        while orchestrator.status(account_id).is_err() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(orchestrator.status(account_id).is_ok());

        scheduler.stop().await.unwrap();
        assert!(matches!(scheduler.stop().await, Err(SchedulerError::NotRunning)));
    }

    #[tokio::test]
    async fn test_invalid_cron_is_rejected() {
        let h = harness();
        let config = SyncSchedulerConfig { cron_expression: "not a cron".into(), ..fast_config() };

        let result = SyncScheduler::new(h.orchestrator(harness_sync_config()), config).await;
        assert!(matches!(result, Err(SchedulerError::JobRegistrationFailed { .. })));
    }

    fn harness_sync_config() -> SyncConfig {
        sellersync_core::testing::TestHarness::sync_config()
    }
}
