//! Configuration structures
//!
//! Every section deserializes with defaults so a partial TOML/JSON file (or
//! none at all) still yields a usable `Config`. Loading and environment
//! overrides live in the infra crate.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_FAILURE_BACKOFF_MS, DEFAULT_MAX_DEAD_LETTERS, DEFAULT_MAX_PAGES, DEFAULT_MAX_RECEIVE_COUNT,
    DEFAULT_MAX_SWEEP_REQUEUES,
    DEFAULT_PAGE_DELAY_MS, DEFAULT_PAGE_SIZE, DEFAULT_SWEEP_INTERVAL_SECS, DEFAULT_SWEEP_LIMIT,
    DEFAULT_SWEEP_MIN_AGE_SECS, DEFAULT_VISIBILITY_TIMEOUT_SECS, DEFAULT_WINDOW_DAYS,
    DEFAULT_WORKER_BATCH_SIZE, DEFAULT_WORKER_POLL_MS, MAX_PAGES_LIMIT, MAX_PAGE_SIZE, MAX_WINDOW_DAYS,
    MIN_WINDOW_DAYS, PENDING_AUTH_TTL_SECS,
};
use crate::errors::{Result, SellerSyncError};

/// A configuration value that must never be printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the underlying value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub marketplace: MarketplaceConfig,
    pub vault: VaultConfig,
    pub oauth: OAuthSettings,
    pub sync: SyncConfig,
    pub worker: WorkerConfig,
}

impl Config {
    /// Check cross-field limits after loading.
    pub fn validate(&self) -> Result<()> {
        self.sync.validate()?;
        self.worker.validate()?;
        if self.database.pool_size == 0 {
            return Err(SellerSyncError::Config("database.pool_size must be at least 1".into()));
        }
        if let Some(secret) = &self.server.cookie_secret {
            if secret.expose().len() < 32 {
                return Err(SellerSyncError::Config(
                    "server.cookie_secret must be at least 32 bytes".into(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Dashboard base URL the OAuth callback redirects to.
    pub frontend_url: String,
    /// HMAC key for the signed state cookie; generated per process if unset.
    pub cookie_secret: Option<Secret>,
    pub cookie_secure: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            cookie_secret: None,
            cookie_secure: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub pool_size: u32,
    /// SQLCipher key; the database is stored in plaintext when unset.
    pub encryption_key: Option<Secret>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("sellersync.db"), pool_size: 8, encryption_key: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketplaceConfig {
    pub marketplace_id: String,
    pub api_base_url: String,
    pub authorization_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: Option<Secret>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            marketplace_id: "default".to_string(),
            api_base_url: "https://api.marketplace.local".to_string(),
            authorization_url: "https://auth.marketplace.local/authorization".to_string(),
            token_url: "https://api.marketplace.local/oauth/token".to_string(),
            client_id: String::new(),
            client_secret: None,
            redirect_uri: "http://localhost:8080/oauth/callback".to_string(),
            scopes: vec!["offline_access".to_string(), "read".to_string(), "write".to_string()],
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Master passphrase; the well-known development default is used if unset.
    pub passphrase: Option<Secret>,
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self { passphrase: None, memory_kib: 19 * 1024, iterations: 2, parallelism: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    pub state_ttl_secs: u64,
    /// Refuse to exchange a code when the PKCE verifier cannot be recovered.
    pub pkce_required: bool,
    /// Persist pending authorization state in SQLite instead of process memory.
    pub durable_pending_state: bool,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self { state_ttl_secs: PENDING_AUTH_TTL_SECS, pkce_required: true, durable_pending_state: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub page_size: u32,
    pub max_pages: u32,
    pub page_delay_ms: u64,
    pub failure_backoff_ms: u64,
    pub default_window_days: u32,
    /// Abort a resource sync after this many consecutive record failures
    /// (0 disables escalation).
    pub max_consecutive_failures: u32,
    /// Six-field cron expression for the scheduled full sync.
    pub schedule: String,
    pub schedule_enabled: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            page_delay_ms: DEFAULT_PAGE_DELAY_MS,
            failure_backoff_ms: DEFAULT_FAILURE_BACKOFF_MS,
            default_window_days: DEFAULT_WINDOW_DAYS,
            max_consecutive_failures: 0,
            schedule: "0 */30 * * * *".to_string(),
            schedule_enabled: true,
        }
    }
}

impl SyncConfig {
    fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(SellerSyncError::Config(format!(
                "sync.page_size must be within 1..={MAX_PAGE_SIZE}"
            )));
        }
        if self.max_pages == 0 || self.max_pages > MAX_PAGES_LIMIT {
            return Err(SellerSyncError::Config(format!(
                "sync.max_pages must be within 1..={MAX_PAGES_LIMIT}"
            )));
        }
        if !(MIN_WINDOW_DAYS..=MAX_WINDOW_DAYS).contains(&self.default_window_days) {
            return Err(SellerSyncError::Config(format!(
                "sync.default_window_days must be within {MIN_WINDOW_DAYS}..={MAX_WINDOW_DAYS}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub poll_interval_ms: u64,
    pub batch_size: usize,
    pub batch_timeout_secs: u64,
    pub visibility_timeout_secs: u64,
    pub max_receive_count: u32,
    pub sweep_interval_secs: u64,
    pub sweep_min_age_secs: u64,
    pub sweep_limit: usize,
    /// Sweeps allowed per ledger entry before it is left for inspection.
    pub max_sweep_requeues: u32,
    pub max_dead_letters: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_WORKER_POLL_MS,
            batch_size: DEFAULT_WORKER_BATCH_SIZE,
            batch_timeout_secs: 120,
            visibility_timeout_secs: DEFAULT_VISIBILITY_TIMEOUT_SECS,
            max_receive_count: DEFAULT_MAX_RECEIVE_COUNT,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            sweep_min_age_secs: DEFAULT_SWEEP_MIN_AGE_SECS,
            sweep_limit: DEFAULT_SWEEP_LIMIT,
            max_sweep_requeues: DEFAULT_MAX_SWEEP_REQUEUES,
            max_dead_letters: DEFAULT_MAX_DEAD_LETTERS,
        }
    }
}

impl WorkerConfig {
    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(SellerSyncError::Config("worker.batch_size must be at least 1".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(SellerSyncError::Config(
                "worker.poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.max_receive_count == 0 {
            return Err(SellerSyncError::Config(
                "worker.max_receive_count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"sync": {"page_size": 20}}"#).expect("parse config");
        assert_eq!(config.sync.page_size, 20);
        assert_eq!(config.sync.max_pages, DEFAULT_MAX_PAGES);
        assert_eq!(config.worker.batch_size, DEFAULT_WORKER_BATCH_SIZE);
    }

    #[test]
    fn test_rejects_unbounded_max_pages() {
        let mut config = Config::default();
        config.sync.max_pages = MAX_PAGES_LIMIT + 1;
        assert!(matches!(config.validate(), Err(SellerSyncError::Config(_))));

        config.sync.max_pages = MAX_PAGES_LIMIT;
        config.sync.page_size = MAX_PAGE_SIZE;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_oversized_page() {
        let mut config = Config::default();
        config.sync.page_size = MAX_PAGE_SIZE + 1;
        assert!(matches!(config.validate(), Err(SellerSyncError::Config(_))));
    }

    #[test]
    fn test_rejects_short_cookie_secret() {
        let mut config = Config::default();
        config.server.cookie_secret = Some(Secret::new("short"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("hunter2");
        assert!(!format!("{secret:?}").contains("hunter2"));
        assert_eq!(secret.expose(), "hunter2");
    }
}
