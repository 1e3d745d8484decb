// ABOUTME: Event Bus (Wire) — multi-consumer pub/sub over the Loop Driver's lifecycle events.
// ABOUTME: Non-blocking publish, bounded per-subscriber buffers, drop-oldest-on-overflow.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::core::message::ContentPart;
use crate::tools::{ToolCallDescriptor, ToolResult};

/// Everything the Loop Driver reports about its own progress.
#[derive(Debug, Clone)]
pub enum Event {
    StepBegin { step_number: u64 },
    StepInterrupted,
    StepEnd,
    CompactionBegin,
    CompactionEnd,
    ContentPart(ContentPart),
    ToolCall(ToolCallDescriptor),
    ToolResult { call_id: String, result: ToolResult },
    StatusUpdate(HashMap<String, String>),
}

/// Bounded broadcast bus. Publish never blocks; a subscriber that falls
/// behind the channel capacity silently misses the oldest events it hasn't
/// read yet, and its next `recv` reports how many via `Subscription::lagged`.
pub struct Bus {
    tx: broadcast::Sender<Event>,
    lag_total: Arc<AtomicU64>,
}

impl Bus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Bus { tx, lag_total: Arc::new(AtomicU64::new(0)) }
    }

    /// Fire-and-forget. A publish with no subscribers is not an error.
    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription { rx: self.tx.subscribe(), lag_total: self.lag_total.clone() }
    }

    /// Total events dropped across all subscribers due to lag, for diagnostics.
    pub fn total_lagged(&self) -> u64 {
        self.lag_total.load(Ordering::Relaxed)
    }
}

/// A single consumer's view of the bus. Dropping it unsubscribes.
pub struct Subscription {
    rx: broadcast::Receiver<Event>,
    lag_total: Arc<AtomicU64>,
}

impl Subscription {
    /// Returns `None` once the bus itself is gone (all senders dropped).
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.lag_total.fetch_add(n, Ordering::Relaxed);
                    tracing::warn!(dropped = n, "event bus subscriber lagged, oldest events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = Bus::new(8);
        let mut sub = bus.subscribe();
        bus.publish(Event::StepBegin { step_number: 1 });
        match sub.recv().await {
            Some(Event::StepBegin { step_number }) => assert_eq!(step_number, 1),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = Bus::new(8);
        bus.publish(Event::StepEnd);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_every_event() {
        let bus = Bus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.publish(Event::StepEnd);
        assert!(matches!(a.recv().await, Some(Event::StepEnd)));
        assert!(matches!(b.recv().await, Some(Event::StepEnd)));
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_counts_lag() {
        let bus = Bus::new(2);
        let mut sub = bus.subscribe();
        bus.publish(Event::StepBegin { step_number: 1 });
        bus.publish(Event::StepBegin { step_number: 2 });
        bus.publish(Event::StepBegin { step_number: 3 });
        bus.publish(Event::StepBegin { step_number: 4 });
        // Subscriber was behind by enough to lag; it should recover and
        // eventually observe the lag counter move.
        let _ = sub.recv().await;
        assert!(bus.total_lagged() > 0);
    }
}
