//! Publishing side of the broadcast control channel.

use crate::events::{BusEvent, EventFilter};
use crate::subscriber::{EventStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use shared_types::ipc::ControlEvent;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Interface the pipeline stages use to emit control events and stream
/// payloads without knowing who is listening.
#[async_trait]
pub trait ControlPublisher: Send + Sync {
    /// Publish an event. Returns the number of subscribers it reached.
    async fn publish(&self, event: BusEvent) -> usize;

    /// Total events published since construction.
    fn events_published(&self) -> u64;
}

/// In-memory broadcast implementation.
///
/// Built on `tokio::sync::broadcast`: every subscriber sees every event,
/// and a subscriber that falls behind loses the oldest events instead of
/// blocking publishers. That is the right trade for diagnostics and live
/// streaming, where staleness is worse than loss.
pub struct InMemoryControlBus {
    sender: broadcast::Sender<BusEvent>,

    /// Active subscription count by topic set, for introspection.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    events_published: AtomicU64,

    capacity: usize,
}

impl InMemoryControlBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to events matching a filter.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let topic_key = format!("{:?}", filter.topics);

        {
            if let Ok(mut subs) = self.subscriptions.write() {
                *subs.entry(topic_key.clone()).or_insert(0) += 1;
            }
        }

        debug!(topics = ?filter.topics, "control subscription created");

        Subscription::new(receiver, filter, self.subscriptions.clone(), topic_key)
    }

    /// Convenience wrapper returning a `Stream` of matching events.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.subscribe(filter))
    }

    /// Shorthand for the common case of emitting a control event.
    pub async fn publish_control(&self, event: ControlEvent) -> usize {
        self.publish(BusEvent::Control(event)).await
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryControlBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ControlPublisher for InMemoryControlBus {
    async fn publish(&self, event: BusEvent) -> usize {
        let topic = event.topic();

        self.events_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(event) {
            Ok(receiver_count) => {
                debug!(topic = ?topic, receivers = receiver_count, "event published");
                receiver_count
            }
            Err(e) => {
                warn!(topic = ?topic, error = %e, "event dropped (no receivers)");
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
