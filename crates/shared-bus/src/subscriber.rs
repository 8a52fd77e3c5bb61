//! # Event Subscriber
//!
//! Defines the subscription side of the event bus.

use crate::events::{BlockchainEvent, EventFilter};
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tracing::{debug, warn};

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus was closed.
    #[error("Event bus closed")]
    Closed,
}

/// A subscription handle for receiving events.
///
/// A slow subscriber does not stall publishers: when it falls more than the
/// bus capacity behind, the oldest events are skipped and counted in
/// [`Subscription::lagged`].
pub struct Subscription {
    receiver: broadcast::Receiver<BlockchainEvent>,
    filter: EventFilter,
    lagged: u64,
}

impl Subscription {
    pub(crate) fn new(receiver: broadcast::Receiver<BlockchainEvent>, filter: EventFilter) -> Self {
        Self {
            receiver,
            filter,
            lagged: 0,
        }
    }

    /// Receive the next event that matches the filter.
    ///
    /// Returns `None` once the bus has been dropped.
    pub async fn recv(&mut self) -> Option<BlockchainEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    self.lagged += count;
                    warn!(skipped = count, "Subscriber lagged, some events dropped");
                }
            }
        }
    }

    /// Try to receive the next matching event without waiting.
    ///
    /// `Ok(None)` means nothing is queued right now.
    pub fn try_recv(&mut self) -> Result<Option<BlockchainEvent>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Ok(Some(event)),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    self.lagged += count;
                }
            }
        }
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn event_filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Total number of events skipped because this subscriber fell behind.
    #[must_use]
    pub fn lagged(&self) -> u64 {
        self.lagged
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(topics = ?self.filter.topics, lagged = self.lagged, "Subscription dropped");
    }
}

/// A stream wrapper for subscriptions.
///
/// Implements `tokio_stream::Stream` for use with stream combinators.
pub struct EventStream {
    subscription: Subscription,
}

impl EventStream {
    /// Create a new event stream from a subscription.
    #[must_use]
    pub fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }

    /// Get the filter for this stream.
    #[must_use]
    pub fn event_filter(&self) -> &EventFilter {
        self.subscription.event_filter()
    }
}

impl Stream for EventStream {
    type Item = BlockchainEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.subscription.try_recv() {
            Ok(Some(event)) => Poll::Ready(Some(event)),
            Ok(None) => {
                // Broadcast receivers expose no waker hook through try_recv.
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Err(SubscriptionError::Closed) => Poll::Ready(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventTopic;
    use crate::publisher::InMemoryEventBus;
    use crate::EventPublisher;
    use primitive_types::U256;
    use shared_types::entities::{Block, SignedTransaction};
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_subscription_recv() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());

        bus.publish(BlockchainEvent::PendingState).await;

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("event");

        assert!(matches!(received, BlockchainEvent::PendingState));
    }

    #[tokio::test]
    async fn test_subscription_filter() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::TxPool]));

        // Filtered out
        bus.publish(BlockchainEvent::GasPriceChanged {
            price: U256::from(5),
        })
        .await;
        bus.publish(BlockchainEvent::TxPre {
            tx: SignedTransaction::default(),
        })
        .await;

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("event");

        assert!(matches!(received, BlockchainEvent::TxPre { .. }));
    }

    #[test]
    fn test_subscription_reports_its_filter() {
        let bus = InMemoryEventBus::new();
        let sub = bus.subscribe(EventFilter::topics(vec![EventTopic::Chain]));
        assert_eq!(sub.event_filter().topics, vec![EventTopic::Chain]);
    }

    #[tokio::test]
    async fn test_subscription_drop_cleanup() {
        let bus = InMemoryEventBus::new();

        {
            let _sub1 = bus.subscribe(EventFilter::all());
            let _sub2 = bus.subscribe(EventFilter::all());
            assert_eq!(bus.subscriber_count(), 2);
        }

        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());
        assert!(matches!(sub.try_recv(), Ok(None)));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_oldest() {
        let bus = InMemoryEventBus::with_capacity(2);
        let mut sub = bus.subscribe(EventFilter::all());

        for _ in 0..5 {
            bus.publish(BlockchainEvent::ChainHead {
                block: Block::default(),
            })
            .await;
        }

        let mut delivered = 0;
        while let Ok(Some(_)) = sub.try_recv() {
            delivered += 1;
        }
        assert_eq!(delivered, 2);
        assert_eq!(sub.lagged(), 3);
    }

    #[tokio::test]
    async fn test_event_stream_yields_matching_events() {
        let bus = InMemoryEventBus::new();
        let mut stream = bus.event_stream(EventFilter::topics(vec![EventTopic::Miner]));

        bus.publish(BlockchainEvent::PendingState).await;

        let next = timeout(Duration::from_millis(100), stream.next())
            .await
            .expect("timeout");
        assert!(matches!(next, Some(BlockchainEvent::PendingState)));
        assert_eq!(stream.event_filter().topics, vec![EventTopic::Miner]);
    }
}
