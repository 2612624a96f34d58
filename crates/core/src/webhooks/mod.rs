//! Webhook ingestion, dispatch and ledger recovery

pub mod ingester;
pub mod ports;
pub mod processor;
pub mod sweep;

pub use ingester::WebhookIngester;
pub use processor::{ProcessOutcome, WebhookProcessor};
pub use sweep::requeue_unprocessed;
