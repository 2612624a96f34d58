//! # SellerSync Infrastructure
//!
//! Infrastructure implementations of the core ports.
//!
//! This crate contains:
//! - SQLite/SQLCipher repositories for accounts, credentials, pending
//!   authorizations, the webhook ledger and the resource mirror
//! - The marketplace HTTP client with retry and `Retry-After` handling
//! - An in-memory pending authorization cache
//! - The webhook worker and the cron-driven full sync scheduler
//! - Layered configuration loading
//!
//! ## Architecture
//! - Implements traits defined in `sellersync-core`
//! - Depends on `sellersync-common` and `sellersync-domain`
//! - Contains all "impure" code (I/O, timers, network)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod queue;
pub mod scheduling;
pub mod sync;

// Re-export commonly used items
pub use auth::{MemoryPendingAuthStore, PendingCacheConfig};
pub use database::{
    DbManager, SqliteAccountRepository, SqliteCredentialRepository, SqliteMirrorRepository,
    SqlitePendingAuthStore, SqliteWebhookLedger,
};
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use integrations::MarketplaceClient;
pub use queue::{build_queue, InMemoryQueue};
pub use scheduling::{SchedulerError, SyncScheduler, SyncSchedulerConfig};
pub use sync::{WebhookWorker, WebhookWorkerConfig, WorkerPass};
