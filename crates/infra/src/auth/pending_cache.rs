//! In-memory pending authorization store backed by moka
//!
//! Entries expire after the configured TTL (default 5 minutes) and are lost
//! on restart. Used when `oauth.durable_pending_state` is off and in tests;
//! the server otherwise prefers the SQLite store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use moka::future::Cache;
use sellersync_core::PendingAuthStore;
use sellersync_domain::constants::PENDING_AUTH_TTL_SECS;
use sellersync_domain::{PendingAuthState, Result};
use tracing::{debug, info};

/// Default max number of concurrently pending authorizations.
pub const DEFAULT_PENDING_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct PendingCacheConfig {
    pub ttl: Duration,
    pub max_capacity: u64,
}

impl Default for PendingCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(PENDING_AUTH_TTL_SECS),
            max_capacity: DEFAULT_PENDING_CAPACITY,
        }
    }
}

impl PendingCacheConfig {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl, ..Self::default() }
    }
}

pub struct MemoryPendingAuthStore {
    cache: Cache<String, PendingAuthState>,
    ttl: Duration,
}

impl MemoryPendingAuthStore {
    pub fn new(config: PendingCacheConfig) -> Self {
        info!(
            ttl_seconds = config.ttl.as_secs(),
            max_capacity = config.max_capacity,
            "pending authorization cache configured"
        );
        let cache =
            Cache::builder().time_to_live(config.ttl).max_capacity(config.max_capacity).build();
        Self { cache, ttl: config.ttl }
    }

    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

impl Default for MemoryPendingAuthStore {
    fn default() -> Self {
        Self::new(PendingCacheConfig::default())
    }
}

#[async_trait]
impl PendingAuthStore for MemoryPendingAuthStore {
    async fn put(&self, pending: PendingAuthState) -> Result<()> {
        self.cache.insert(pending.state.clone(), pending).await;
        Ok(())
    }

    async fn take(&self, state: &str) -> Result<Option<PendingAuthState>> {
        // The cache clock and `created_at` can disagree for entries written
        // with a backdated timestamp, so check both.
        let taken = self.cache.remove(state).await;
        Ok(taken.filter(|pending| !pending.is_expired(self.ttl, Utc::now())))
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let expired: Vec<String> = self
            .cache
            .iter()
            .filter(|(_, pending)| pending.is_expired(self.ttl, now))
            .map(|(state, _)| state.as_ref().clone())
            .collect();
        for state in &expired {
            self.cache.invalidate(state).await;
        }
        self.cache.run_pending_tasks().await;
        if !expired.is_empty() {
            debug!(purged = expired.len(), "Purged expired pending authorization states");
        }
        Ok(expired.len())
    }
}
