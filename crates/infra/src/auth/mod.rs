//! Pending authorization stores.

pub mod pending_cache;

pub use pending_cache::{MemoryPendingAuthStore, PendingCacheConfig};
