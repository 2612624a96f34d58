use std::time::Duration;

use uuid::Uuid;

/// Delivery queue configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// How long a received message stays hidden before it is redelivered.
    pub visibility_timeout: Duration,
    /// Receives allowed before a message is moved to the dead-letter list.
    pub max_receive_count: u32,
    /// Dead letters kept for inspection; the oldest are dropped beyond this.
    pub max_dead_letters: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(30),
            max_receive_count: 5,
            max_dead_letters: 1_000,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.visibility_timeout.is_zero() {
            return Err("visibility_timeout must be greater than zero".to_string());
        }
        if self.max_receive_count == 0 {
            return Err("max_receive_count must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Opaque token proving a particular receive of a message.
///
/// A new handle is issued on every receive, so a handle from an expired
/// receive cannot delete the redelivered copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(pub(crate) String);

impl ReceiptHandle {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A received message.
#[derive(Debug, Clone)]
pub struct Delivery<T> {
    pub message_id: Uuid,
    pub receipt: ReceiptHandle,
    pub body: T,
    /// 1 on first delivery.
    pub receive_count: u32,
}

/// Point-in-time queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub visible: usize,
    pub in_flight: usize,
    pub dead_lettered: usize,
}
