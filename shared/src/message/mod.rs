//! Event bus message types
//!
//! Order lifecycle events are a closed set ([`OrderBusEvent`]) so
//! subscribers match exhaustively. Each event is published on one or more
//! [`Topic`]s wrapped in a [`BusEvent`] envelope.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod payload;
pub use payload::*;

/// Fan-out channels consumed by downstream dashboards and apps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Restaurant dashboards (filtered by restaurant id)
    RestaurantFeed,
    /// Customer apps (filtered by user id)
    CustomerFeed,
    /// Shipper apps (filtered by location and radius)
    ShipperPool,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::RestaurantFeed => write!(f, "restaurant_feed"),
            Topic::CustomerFeed => write!(f, "customer_feed"),
            Topic::ShipperPool => write!(f, "shipper_pool"),
        }
    }
}

/// Closed set of order lifecycle events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OrderBusEvent {
    OrderCreated(OrderCreatedPayload),
    OrderStatusUpdated(OrderStatusUpdatedPayload),
    OrderConfirmedForShippers(ShipperPoolOfferPayload),
    OrderRemovedFromShipperPool(ShipperPoolRemovalPayload),
    ShipperAssigned(ShipperAssignedPayload),
    AssignmentExpired(AssignmentExpiredPayload),
}

impl OrderBusEvent {
    /// Topics this event is delivered on
    pub fn topics(&self) -> &'static [Topic] {
        match self {
            OrderBusEvent::OrderCreated(_) => &[Topic::RestaurantFeed],
            OrderBusEvent::OrderStatusUpdated(_) => &[Topic::RestaurantFeed, Topic::CustomerFeed],
            OrderBusEvent::OrderConfirmedForShippers(_) => &[Topic::ShipperPool],
            OrderBusEvent::OrderRemovedFromShipperPool(_) => &[Topic::ShipperPool],
            OrderBusEvent::ShipperAssigned(_) => &[Topic::RestaurantFeed, Topic::CustomerFeed],
            OrderBusEvent::AssignmentExpired(_) => &[Topic::ShipperPool, Topic::RestaurantFeed],
        }
    }

    pub fn order_id(&self) -> i64 {
        match self {
            OrderBusEvent::OrderCreated(p) => p.order_id,
            OrderBusEvent::OrderStatusUpdated(p) => p.order_id,
            OrderBusEvent::OrderConfirmedForShippers(p) => p.order_id,
            OrderBusEvent::OrderRemovedFromShipperPool(p) => p.order_id,
            OrderBusEvent::ShipperAssigned(p) => p.order_id,
            OrderBusEvent::AssignmentExpired(p) => p.order_id,
        }
    }

    /// Restaurant the event concerns, when known
    pub fn restaurant_id(&self) -> Option<i64> {
        match self {
            OrderBusEvent::OrderCreated(p) => Some(p.restaurant_id),
            OrderBusEvent::OrderStatusUpdated(p) => Some(p.restaurant_id),
            OrderBusEvent::OrderConfirmedForShippers(p) => Some(p.restaurant_id),
            OrderBusEvent::OrderRemovedFromShipperPool(_) => None,
            OrderBusEvent::ShipperAssigned(p) => Some(p.restaurant_id),
            OrderBusEvent::AssignmentExpired(p) => Some(p.restaurant_id),
        }
    }

    /// Customer the event concerns, when known
    pub fn user_id(&self) -> Option<i64> {
        match self {
            OrderBusEvent::OrderCreated(p) => Some(p.user_id),
            OrderBusEvent::OrderStatusUpdated(p) => Some(p.user_id),
            OrderBusEvent::ShipperAssigned(p) => Some(p.user_id),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OrderBusEvent::OrderCreated(_) => "order_created",
            OrderBusEvent::OrderStatusUpdated(_) => "order_status_updated",
            OrderBusEvent::OrderConfirmedForShippers(_) => "order_confirmed_for_shippers",
            OrderBusEvent::OrderRemovedFromShipperPool(_) => "order_removed_from_shipper_pool",
            OrderBusEvent::ShipperAssigned(_) => "shipper_assigned",
            OrderBusEvent::AssignmentExpired(_) => "assignment_expired",
        }
    }
}

/// Envelope delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEvent {
    pub event_id: Uuid,
    pub topic: Topic,
    /// Per-topic monotonically increasing sequence
    pub sequence: u64,
    pub timestamp: i64,
    pub event: OrderBusEvent,
}

impl BusEvent {
    pub fn new(topic: Topic, sequence: u64, timestamp: i64, event: OrderBusEvent) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            topic,
            sequence,
            timestamp,
            event,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
