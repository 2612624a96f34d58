//! Integration tests for the delivery queue
//!
//! Exercises a consumer loop against the queue the way the webhook worker
//! drives it: receive a batch, acknowledge successes, leave failures for
//! redelivery.

#![cfg(feature = "runtime")]

use std::sync::Arc;
use std::time::Duration;

use sellersync_common::sync::queue::{DeliveryQueue, QueueConfig, QueueResult};

fn queue(visibility_secs: u64, max_receive_count: u32) -> Arc<DeliveryQueue<u32>> {
    Arc::new(
        DeliveryQueue::new(QueueConfig {
            visibility_timeout: Duration::from_secs(visibility_secs),
            max_receive_count,
            ..QueueConfig::default()
        })
        .expect("valid queue config"),
    )
}

/// Failed messages come back after the visibility timeout while
/// acknowledged ones are gone for good.
#[tokio::test(start_paused = true)]
async fn test_partial_failure_is_redelivered() -> QueueResult<()> {
    let queue = queue(10, 5);
    for n in 1..=4 {
        queue.enqueue(n);
    }

    for delivery in queue.receive(10) {
        if delivery.body % 2 == 0 {
            queue.delete(&delivery.receipt)?;
        }
    }
    assert_eq!(queue.len(), 2);
    assert!(queue.receive(10).is_empty());

    tokio::time::advance(Duration::from_secs(11)).await;

    let redelivered = queue.receive(10);
    let bodies: Vec<u32> = redelivered.iter().map(|d| d.body).collect();
    assert_eq!(bodies, vec![1, 3]);
    assert!(redelivered.iter().all(|d| d.receive_count == 2));

    for delivery in redelivered {
        queue.delete(&delivery.receipt)?;
    }
    assert!(queue.is_empty());
    Ok(())
}

/// Concurrent consumers never receive the same visible message twice.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_consumers_split_messages() {
    let queue = queue(300, 5);
    for n in 0..200 {
        queue.enqueue(n);
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let queue = Arc::clone(&queue);
        handles.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            loop {
                let batch = queue.receive(7);
                if batch.is_empty() {
                    break;
                }
                for delivery in batch {
                    seen.push(delivery.body);
                    queue.delete(&delivery.receipt).expect("fresh receipt");
                }
                tokio::task::yield_now().await;
            }
            seen
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.expect("consumer task"));
    }
    all.sort_unstable();
    assert_eq!(all, (0..200).collect::<Vec<_>>());
    assert!(queue.is_empty());
}

/// A message that keeps failing ends up dead-lettered and stops blocking
/// the queue.
#[tokio::test(start_paused = true)]
async fn test_poison_message_is_dead_lettered() {
    let queue = queue(1, 3);
    queue.enqueue(42);
    queue.enqueue(7);

    for _ in 0..3 {
        for delivery in queue.receive(10) {
            if delivery.body == 7 {
                queue.delete(&delivery.receipt).expect("ack");
            }
        }
        tokio::time::advance(Duration::from_secs(2)).await;
    }

    assert!(queue.receive(10).is_empty());
    let stats = queue.stats();
    assert_eq!(stats.visible + stats.in_flight, 0);
    assert_eq!(stats.dead_lettered, 1);
    assert_eq!(queue.drain_dead_letters(), vec![42]);
}
