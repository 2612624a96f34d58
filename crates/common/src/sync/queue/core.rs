use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use super::errors::{QueueError, QueueResult};
use super::types::{Delivery, QueueConfig, QueueStats, ReceiptHandle};

struct Entry<T> {
    message_id: Uuid,
    body: T,
    receive_count: u32,
    visible_at: Instant,
    receipt: Option<ReceiptHandle>,
}

struct QueueState<T> {
    /// FIFO by enqueue sequence.
    entries: BTreeMap<u64, Entry<T>>,
    receipts: HashMap<ReceiptHandle, u64>,
    dead_letters: VecDeque<T>,
    sequence: u64,
}

/// At-least-once in-process queue.
///
/// `receive` hides messages for the visibility timeout and hands out a
/// receipt; `delete` with that receipt acknowledges the message. Timing uses
/// `tokio::time::Instant`, so paused-clock tests can advance past timeouts.
pub struct DeliveryQueue<T> {
    state: Mutex<QueueState<T>>,
    config: QueueConfig,
}

impl<T> std::fmt::Debug for DeliveryQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue").field("config", &self.config).finish_non_exhaustive()
    }
}

impl<T: Clone + Send> DeliveryQueue<T> {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        config.validate().map_err(QueueError::InvalidConfig)?;
        Ok(Self {
            state: Mutex::new(QueueState {
                entries: BTreeMap::new(),
                receipts: HashMap::new(),
                dead_letters: VecDeque::new(),
                sequence: 0,
            }),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> QueueConfig {
        self.config
    }

    /// Append a message; it is immediately visible.
    pub fn enqueue(&self, body: T) -> Uuid {
        let message_id = Uuid::now_v7();
        let mut state = self.state.lock();
        let seq = state.sequence;
        state.sequence += 1;
        state.entries.insert(
            seq,
            Entry { message_id, body, receive_count: 0, visible_at: Instant::now(), receipt: None },
        );
        debug!(%message_id, depth = state.entries.len(), "Message enqueued");
        message_id
    }

    /// Receive up to `max` visible messages in FIFO order.
    ///
    /// Messages that already used up `max_receive_count` deliveries are moved
    /// to the dead-letter list instead of being handed out again.
    #[instrument(skip(self), level = "debug")]
    pub fn receive(&self, max: usize) -> Vec<Delivery<T>> {
        let now = Instant::now();
        let hidden_until = now + self.config.visibility_timeout;
        let max_receives = self.config.max_receive_count;

        let mut state = self.state.lock();
        let QueueState { entries, receipts, dead_letters, .. } = &mut *state;

        let mut deliveries = Vec::new();
        let mut exhausted = Vec::new();

        for (seq, entry) in entries.iter_mut() {
            if deliveries.len() >= max {
                break;
            }
            if entry.visible_at > now {
                continue;
            }
            if entry.receive_count >= max_receives {
                exhausted.push(*seq);
                continue;
            }

            if let Some(stale) = entry.receipt.take() {
                receipts.remove(&stale);
            }
            let receipt = ReceiptHandle::generate();
            receipts.insert(receipt.clone(), *seq);
            entry.receipt = Some(receipt.clone());
            entry.receive_count += 1;
            entry.visible_at = hidden_until;

            deliveries.push(Delivery {
                message_id: entry.message_id,
                receipt,
                body: entry.body.clone(),
                receive_count: entry.receive_count,
            });
        }

        for seq in exhausted {
            if let Some(entry) = entries.remove(&seq) {
                if let Some(receipt) = entry.receipt {
                    receipts.remove(&receipt);
                }
                error!(
                    message_id = %entry.message_id,
                    receive_count = entry.receive_count,
                    "Message exceeded max receive count, moved to dead letters"
                );
                dead_letters.push_back(entry.body);
            }
        }
        let overflow = dead_letters.len().saturating_sub(self.config.max_dead_letters);
        if overflow > 0 {
            dead_letters.drain(..overflow);
            warn!(dropped = overflow, "Dead-letter list full, dropped oldest entries");
        }

        deliveries
    }

    /// Acknowledge a processed message.
    pub fn delete(&self, receipt: &ReceiptHandle) -> QueueResult<()> {
        let mut state = self.state.lock();
        let seq = state
            .receipts
            .remove(receipt)
            .ok_or_else(|| QueueError::ReceiptNotFound(receipt.to_string()))?;
        if let Some(entry) = state.entries.remove(&seq) {
            debug!(message_id = %entry.message_id, "Message acknowledged");
        }
        Ok(())
    }

    /// Make a received message visible again after `delay` instead of the
    /// full visibility timeout.
    pub fn release(&self, receipt: &ReceiptHandle, delay: Duration) -> QueueResult<()> {
        let mut state = self.state.lock();
        let seq = *state
            .receipts
            .get(receipt)
            .ok_or_else(|| QueueError::ReceiptNotFound(receipt.to_string()))?;
        if let Some(entry) = state.entries.get_mut(&seq) {
            entry.visible_at = Instant::now() + delay;
        }
        Ok(())
    }

    /// Total messages not yet acknowledged (visible plus in flight).
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let now = Instant::now();
        let state = self.state.lock();
        let in_flight = state.entries.values().filter(|e| e.visible_at > now).count();
        QueueStats {
            visible: state.entries.len() - in_flight,
            in_flight,
            dead_lettered: state.dead_letters.len(),
        }
    }

    /// Remove and return dead-lettered message bodies.
    pub fn drain_dead_letters(&self) -> Vec<T> {
        self.state.lock().dead_letters.drain(..).collect()
    }
}
