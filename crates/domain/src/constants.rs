//! Engine constants
//!
//! Centralized location for domain-level defaults and limits.

// OAuth handshake
pub const PENDING_AUTH_TTL_SECS: u64 = 300;
pub const STATE_COOKIE_NAME: &str = "sellersync_oauth_state";
pub const PKCE_CHALLENGE_METHOD: &str = "S256";

// Pull-sync
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;
pub const DEFAULT_MAX_PAGES: u32 = 100;
pub const MAX_PAGES_LIMIT: u32 = 10_000;
pub const DEFAULT_PAGE_DELAY_MS: u64 = 500;
pub const DEFAULT_FAILURE_BACKOFF_MS: u64 = 1_000;
pub const MIN_WINDOW_DAYS: u32 = 1;
pub const MAX_WINDOW_DAYS: u32 = 90;
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

// Delivery queue and worker
pub const DEFAULT_VISIBILITY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RECEIVE_COUNT: u32 = 5;
pub const DEFAULT_WORKER_BATCH_SIZE: usize = 10;
pub const DEFAULT_WORKER_POLL_MS: u64 = 5_000;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_SWEEP_MIN_AGE_SECS: u64 = 600;
pub const DEFAULT_SWEEP_LIMIT: usize = 100;
pub const DEFAULT_MAX_SWEEP_REQUEUES: u32 = 3;
pub const DEFAULT_MAX_DEAD_LETTERS: usize = 1_000;
