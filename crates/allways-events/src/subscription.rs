//! Subscriber side of the status channel.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use allways_types::StatusEvent;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::debug;

use crate::error::ChannelError;
use crate::filter::EventFilter;

/// What a subscriber receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Delivery {
    /// The next matching event, in publish order.
    Event {
        /// The event.
        event: StatusEvent,
    },
    /// The subscriber fell behind and events were discarded. It must
    /// re-read the registry before trusting further events.
    Resync {
        /// How many events were skipped.
        missed: u64,
    },
}

/// Keeps the channel's live-subscriber count accurate.
#[derive(Debug)]
pub(crate) struct SubscriberGuard(Arc<AtomicUsize>);

impl SubscriberGuard {
    pub(crate) fn register(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(count))
    }
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        // Saturating: never wraps below zero.
        let _ = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        debug!("Status subscriber dropped");
    }
}

/// A subscription handle. Dropping it unsubscribes.
pub struct Subscription {
    receiver: broadcast::Receiver<StatusEvent>,
    filter: EventFilter,
    _guard: SubscriberGuard,
}

impl Subscription {
    pub(crate) const fn new(
        receiver: broadcast::Receiver<StatusEvent>,
        filter: EventFilter,
        guard: SubscriberGuard,
    ) -> Self {
        Self {
            receiver,
            filter,
            _guard: guard,
        }
    }

    /// Wait for the next delivery.
    ///
    /// Returns `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<Delivery> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => {
                    return Some(Delivery::Event { event });
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "Status subscriber lagged, requesting resync");
                    return Some(Delivery::Resync { missed });
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next delivery if one is ready.
    pub fn try_recv(&mut self) -> Result<Option<Delivery>, ChannelError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => {
                    return Ok(Some(Delivery::Event { event }));
                }
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    return Ok(Some(Delivery::Resync { missed }));
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(ChannelError::Closed),
            }
        }
    }

    /// The filter this subscription applies.
    pub const fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Convert into a [`Stream`] of deliveries.
    pub fn into_stream(self) -> DeliveryStream {
        DeliveryStream {
            inner: BroadcastStream::new(self.receiver),
            filter: self.filter,
            _guard: self._guard,
        }
    }
}

/// [`Stream`] adapter over a subscription.
pub struct DeliveryStream {
    inner: BroadcastStream<StatusEvent>,
    filter: EventFilter,
    _guard: SubscriberGuard,
}

impl Stream for DeliveryStream {
    type Item = Delivery;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if self.filter.matches(&event) {
                        return Poll::Ready(Some(Delivery::Event { event }));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(missed)))) => {
                    return Poll::Ready(Some(Delivery::Resync { missed }));
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
