//! Publisher side of the status channel.
//!
//! One [`StatusChannel`] exists per deployment. Publishing never waits on
//! subscribers: events go into a bounded [`broadcast`] queue and slow
//! subscribers are told to resync instead of holding the publisher back.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use allways_types::StatusEvent;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::filter::EventFilter;
use crate::subscription::{DeliveryStream, SubscriberGuard, Subscription};

/// Default queue capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

/// The in-process status bus. Cheap to clone; clones share the queue.
#[derive(Clone)]
pub struct StatusChannel {
    sender: broadcast::Sender<StatusEvent>,
    subscribers: Arc<AtomicUsize>,
    published: Arc<AtomicU64>,
    capacity: usize,
}

impl StatusChannel {
    /// Create a channel with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a channel holding at most `capacity` undelivered events per
    /// subscriber. A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscribers: Arc::new(AtomicUsize::new(0)),
            published: Arc::new(AtomicU64::new(0)),
            capacity,
        }
    }

    /// Publish an event to every current subscriber.
    ///
    /// Returns the number of subscribers the event was queued for; zero
    /// when nobody is listening.
    pub fn publish(&self, event: StatusEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        let kind = event.kind();
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(kind = kind.as_str(), receivers, "Status event published");
                receivers
            }
            Err(_) => {
                trace!(kind = kind.as_str(), "Status event dropped (no subscribers)");
                0
            }
        }
    }

    /// Subscribe with a filter.
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let guard = SubscriberGuard::register(&self.subscribers);
        Subscription::new(self.sender.subscribe(), filter, guard)
    }

    /// Subscribe and receive deliveries as a [`Stream`](tokio_stream::Stream).
    pub fn stream(&self, filter: EventFilter) -> DeliveryStream {
        self.subscribe(filter).into_stream()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }

    /// Total events published since creation.
    pub fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Queue capacity.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for StatusChannel {
    fn default() -> Self {
        Self::new()
    }
}
