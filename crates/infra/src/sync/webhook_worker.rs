//! Background consumer of the webhook/refresh queue.
//!
//! Each pass receives up to `batch_size` messages, hands them to the
//! [`WebhookProcessor`] and deletes only the ones it handled. Failed messages
//! stay in the queue and come back after the visibility timeout, until the
//! queue dead-letters them. A second timer periodically re-enqueues ledger
//! entries that were accepted but never processed (for example after a
//! restart dropped the in-memory queue).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sellersync_infra::sync::{WebhookWorker, WebhookWorkerConfig};
//!
//! # async fn example(
//! #     queue: Arc<dyn sellersync_core::MessageQueue>,
//! #     processor: Arc<sellersync_core::WebhookProcessor>,
//! #     ledger: Arc<dyn sellersync_core::WebhookLedger>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let mut worker = WebhookWorker::new(queue, processor, ledger, WebhookWorkerConfig::default());
//! worker.start()?;
//! // ... application runs ...
//! worker.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sellersync_core::webhooks::requeue_unprocessed;
use sellersync_core::{MessageQueue, ProcessOutcome, WebhookLedger, WebhookProcessor};
use sellersync_domain::{Result, WorkerConfig};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

const MIN_TICK: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct WebhookWorkerConfig {
    pub batch_size: usize,
    pub poll_interval: Duration,
    /// Upper bound for one pass over a batch.
    pub batch_timeout: Duration,
    pub join_timeout: Duration,
    pub sweep_interval: Duration,
    /// Ledger entries younger than this are left to the queue.
    pub sweep_min_age: Duration,
    pub sweep_limit: usize,
    pub max_sweep_requeues: u32,
}

impl Default for WebhookWorkerConfig {
    fn default() -> Self {
        Self::from_config(&WorkerConfig::default())
    }
}

impl WebhookWorkerConfig {
    #[must_use]
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            batch_timeout: Duration::from_secs(config.batch_timeout_secs),
            join_timeout: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
            sweep_min_age: Duration::from_secs(config.sweep_min_age_secs),
            sweep_limit: config.sweep_limit,
            max_sweep_requeues: config.max_sweep_requeues,
        }
    }
}

/// Tally of one worker pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerPass {
    pub received: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub timed_out: bool,
}

struct WorkerContext {
    queue: Arc<dyn MessageQueue>,
    processor: Arc<WebhookProcessor>,
    ledger: Arc<dyn WebhookLedger>,
    config: WebhookWorkerConfig,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the pass ends, including on cancellation.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct WebhookWorker {
    context: Arc<WorkerContext>,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl WebhookWorker {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        processor: Arc<WebhookProcessor>,
        ledger: Arc<dyn WebhookLedger>,
        config: WebhookWorkerConfig,
    ) -> Self {
        Self {
            context: Arc::new(WorkerContext {
                queue,
                processor,
                ledger,
                config,
                in_flight: AtomicBool::new(false),
            }),
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    #[instrument(skip(self))]
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();
        let context = Arc::clone(&self.context);
        let cancel = self.cancellation.clone();
        self.task_handle = Some(tokio::spawn(async move {
            Self::process_loop(context, cancel).await;
        }));

        info!(
            poll_ms = self.context.config.poll_interval.as_millis(),
            batch_size = self.context.config.batch_size,
            "Webhook worker started"
        );
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(handle) = self.task_handle.take() else {
            return Err(SchedulerError::NotRunning);
        };

        self.cancellation.cancel();
        let join_timeout = self.context.config.join_timeout;
        tokio::time::timeout(join_timeout, handle)
            .await
            .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??;

        info!("Webhook worker stopped");
        Ok(())
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Run one pass now. Returns `None` when another pass is in flight.
    pub async fn run_once(&self) -> Option<WorkerPass> {
        Self::guarded_pass(&self.context).await
    }

    /// Re-enqueue stale unprocessed ledger entries now.
    pub async fn sweep_once(&self) -> Result<usize> {
        Self::sweep(&self.context).await
    }

    async fn process_loop(context: Arc<WorkerContext>, cancel: CancellationToken) {
        let mut poll = tokio::time::interval(context.config.poll_interval.max(MIN_TICK));
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let sweep_every = context.config.sweep_interval.max(MIN_TICK);
        let mut sweep = tokio::time::interval_at(tokio::time::Instant::now() + sweep_every, sweep_every);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("Webhook worker loop cancelled");
                    break;
                }
                _ = poll.tick() => {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        _ = Self::guarded_pass(&context) => {}
                    }
                }
                _ = sweep.tick() => {
                    if let Err(err) = Self::sweep(&context).await {
                        error!(error = %err, "Ledger sweep failed");
                    }
                }
            }
        }
    }

    async fn guarded_pass(context: &WorkerContext) -> Option<WorkerPass> {
        let Some(_guard) = InFlightGuard::acquire(&context.in_flight) else {
            debug!("Previous worker pass still running, skipping");
            return None;
        };

        let started = Instant::now();
        let timeout = context.config.batch_timeout;
        let pass = match tokio::time::timeout(timeout, Self::process_batch(context)).await {
            Ok(pass) => pass,
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "Worker pass timed out");
                WorkerPass { timed_out: true, ..WorkerPass::default() }
            }
        };

        if pass.received > 0 {
            info!(
                received = pass.received,
                processed = pass.processed,
                skipped = pass.skipped,
                failed = pass.failed,
                elapsed_ms = started.elapsed().as_millis(),
                "Worker pass finished"
            );
        }
        Some(pass)
    }

    async fn process_batch(context: &WorkerContext) -> WorkerPass {
        let deliveries = context.queue.receive(context.config.batch_size);
        let mut pass = WorkerPass { received: deliveries.len(), ..WorkerPass::default() };

        for delivery in deliveries {
            match context.processor.process(&delivery.body).await {
                Ok(outcome) => {
                    match outcome {
                        ProcessOutcome::Synced { .. } => pass.processed += 1,
                        ProcessOutcome::Skipped(_) => pass.skipped += 1,
                    }
                    if let Err(err) = context.queue.delete(&delivery) {
                        // The receipt expired mid-pass; the redelivered copy
                        // is an idempotent upsert.
                        warn!(message_id = %delivery.message_id, error = %err, "Failed to acknowledge message");
                    }
                }
                Err(err) => {
                    pass.failed += 1;
                    warn!(
                        message_id = %delivery.message_id,
                        kind = delivery.body.kind(),
                        receive_count = delivery.receive_count,
                        error = %err,
                        "Message processing failed, leaving for redelivery"
                    );
                }
            }
        }

        pass
    }

    async fn sweep(context: &WorkerContext) -> Result<usize> {
        let requeued = requeue_unprocessed(
            context.ledger.as_ref(),
            context.queue.as_ref(),
            context.config.sweep_min_age,
            context.config.max_sweep_requeues,
            context.config.sweep_limit,
        )
        .await?;
        if requeued > 0 {
            info!(requeued, "Re-enqueued unprocessed webhook events");
        }
        Ok(requeued)
    }
}

impl Drop for WebhookWorker {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("WebhookWorker dropped while running; cancelling");
            self.cancellation.cancel();
        }
    }
}
