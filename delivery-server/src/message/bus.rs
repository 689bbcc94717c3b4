//! In-process event bus
//!
//! ```text
//! OrdersManager ──publish()──► broadcast::Sender<BusEvent>
//!                                      │ one envelope per topic
//!              ┌───────────────────────┼───────────────────────┐
//!              ▼                       ▼                       ▼
//!        restaurant feed         customer feed            shipper pool
//!     (Restaurant filter)      (Customer filter)     (ShipperNear filter)
//! ```
//!
//! Publishing is fire-and-forget: it happens after the owning transaction
//! committed and never fails the caller.

use super::filter::SubscriberFilter;
use crate::utils::SharedClock;
use dashmap::DashMap;
use shared::message::{BusEvent, OrderBusEvent, Topic};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Default capacity of the broadcast channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
    /// Per-topic sequence counters
    sequences: Arc<DashMap<Topic, u64>>,
    clock: SharedClock,
}

impl EventBus {
    pub fn new(clock: SharedClock) -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY, clock)
    }

    pub fn with_capacity(capacity: usize, clock: SharedClock) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            sequences: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Last sequence issued on a topic (0 if none)
    pub fn sequence(&self, topic: Topic) -> u64 {
        self.sequences.get(&topic).map(|s| *s).unwrap_or(0)
    }

    /// Publish an event on every topic it belongs to
    ///
    /// Returns the number of envelopes handed to live receivers.
    pub fn publish(&self, event: OrderBusEvent) -> usize {
        let now = self.clock.now_millis();
        let mut delivered = 0;
        for &topic in event.topics() {
            // The counter's shard lock is held through the send so envelopes
            // enter the channel in sequence order per topic
            let mut sequence = self.sequences.entry(topic).or_insert(0);
            *sequence += 1;
            let envelope = BusEvent::new(topic, *sequence, now, event.clone());
            let sent = self.tx.send(envelope);
            drop(sequence);
            match sent {
                Ok(_) => delivered += 1,
                Err(_) => {
                    tracing::debug!(
                        event = event.name(),
                        order_id = event.order_id(),
                        %topic,
                        "No subscribers for event"
                    );
                }
            }
        }
        delivered
    }

    /// Subscribe to one topic with a filter
    pub fn subscribe(&self, topic: Topic, filter: SubscriberFilter) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            topic,
            filter,
        }
    }

    /// Raw receiver over every topic (used by the event logger)
    pub fn subscribe_all(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Filtered view of one topic
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<BusEvent>,
    topic: Topic,
    filter: SubscriberFilter,
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    fn accepts(&self, event: &BusEvent) -> bool {
        event.topic == self.topic && self.filter.matches(event)
    }

    /// Next matching event; `None` once the bus is gone
    ///
    /// A lagging subscriber skips what it missed and keeps going.
    pub async fn recv(&mut self) -> Option<BusEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(topic = %self.topic, skipped = n, "Subscriber lagged, skipped events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event already buffered, without waiting
    pub fn try_recv(&mut self) -> Option<BusEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(n)) => {
                    tracing::warn!(topic = %self.topic, skipped = n, "Subscriber lagged, skipped events");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drain every matching event already buffered
    pub fn drain(&mut self) -> Vec<BusEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ManualClock;
    use shared::message::{OrderStatusUpdatedPayload, ShipperPoolRemovalPayload, RemovalReason};
    use shared::models::OrderStatus;

    fn bus() -> EventBus {
        EventBus::new(Arc::new(ManualClock::new(5_000)))
    }

    fn status_update(order_id: i64, restaurant_id: i64, user_id: i64) -> OrderBusEvent {
        OrderBusEvent::OrderStatusUpdated(OrderStatusUpdatedPayload {
            order_id,
            restaurant_id,
            user_id,
            from: OrderStatus::Pending,
            to: OrderStatus::Confirmed,
            reason: None,
        })
    }

    #[test]
    fn test_publish_without_subscribers_is_not_an_error() {
        let bus = bus();
        assert_eq!(bus.publish(status_update(1, 2, 3)), 0);
        // sequences still advance
        assert_eq!(bus.sequence(Topic::RestaurantFeed), 1);
    }

    #[tokio::test]
    async fn test_fan_out_per_topic_with_filters() {
        let bus = bus();
        let mut restaurant = bus.subscribe(Topic::RestaurantFeed, SubscriberFilter::Restaurant(2));
        let mut other_restaurant =
            bus.subscribe(Topic::RestaurantFeed, SubscriberFilter::Restaurant(9));
        let mut customer = bus.subscribe(Topic::CustomerFeed, SubscriberFilter::Customer(3));

        assert_eq!(bus.publish(status_update(1, 2, 3)), 2);

        let ev = restaurant.recv().await.unwrap();
        assert_eq!(ev.topic, Topic::RestaurantFeed);
        assert_eq!(ev.sequence, 1);
        assert_eq!(ev.timestamp, 5_000);
        assert_eq!(customer.recv().await.unwrap().topic, Topic::CustomerFeed);
        assert!(other_restaurant.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_topic_isolation_and_sequences() {
        let bus = bus();
        let mut pool = bus.subscribe(Topic::ShipperPool, SubscriberFilter::All);
        bus.publish(status_update(1, 2, 3));
        bus.publish(OrderBusEvent::OrderRemovedFromShipperPool(ShipperPoolRemovalPayload {
            order_id: 1,
            reason: RemovalReason::StatusChanged,
        }));
        bus.publish(OrderBusEvent::OrderRemovedFromShipperPool(ShipperPoolRemovalPayload {
            order_id: 2,
            reason: RemovalReason::Expired,
        }));

        let events = pool.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].sequence, 1);
        assert_eq!(events[1].sequence, 2);
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_bus_dropped() {
        let bus = bus();
        let mut sub = bus.subscribe(Topic::CustomerFeed, SubscriberFilter::All);
        drop(bus);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber_recovers() {
        let bus = EventBus::with_capacity(2, Arc::new(ManualClock::new(0)));
        let mut sub = bus.subscribe(Topic::CustomerFeed, SubscriberFilter::All);
        for id in 1..=5 {
            bus.publish(status_update(id, 2, 3));
        }
        let ev = sub.recv().await.unwrap();
        assert!(ev.event.order_id() >= 4);
    }

    #[test]
    fn test_concurrent_publishers_keep_sequence_order() {
        let bus = EventBus::with_capacity(4096, Arc::new(ManualClock::new(0)));
        let mut feed = bus.subscribe(Topic::RestaurantFeed, SubscriberFilter::All);

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let bus = bus.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        bus.publish(status_update(worker * 1_000 + i, 2, 3));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let sequences: Vec<u64> = feed.drain().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences.len(), 1_000);
        assert!(sequences.windows(2).all(|w| w[1] == w[0] + 1), "out of order");
        assert_eq!(bus.sequence(Topic::RestaurantFeed), 1_000);
    }
}
