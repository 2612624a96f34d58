//! Database implementations

pub mod account_repository;
pub mod manager;
pub mod mirror_repository;
pub mod pending_auth_repository;
pub mod webhook_ledger_repository;

pub use account_repository::{SqliteAccountRepository, SqliteCredentialRepository};
pub use manager::{DbConnection, DbManager};
pub use mirror_repository::SqliteMirrorRepository;
pub use pending_auth_repository::SqlitePendingAuthStore;
pub use webhook_ledger_repository::SqliteWebhookLedger;
