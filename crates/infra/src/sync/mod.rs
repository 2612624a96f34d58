//! Background consumers of the sync queue
//!
//! The [`WebhookWorker`] owns its task handle and cancellation token; call
//! [`WebhookWorker::stop`] before dropping it.

pub mod webhook_worker;

pub use webhook_worker::{WebhookWorker, WebhookWorkerConfig, WorkerPass};
