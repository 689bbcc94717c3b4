//! Per-subscriber event filters

use crate::geo::haversine_km;
use shared::message::{BusEvent, OrderBusEvent};
use shared::models::GeoPoint;
use std::fmt;
use std::sync::Arc;

pub type EventPredicate = Arc<dyn Fn(&BusEvent) -> bool + Send + Sync>;

/// Which events a subscriber wants to see on its topic
#[derive(Clone, Default)]
pub enum SubscriberFilter {
    #[default]
    All,
    /// Restaurant dashboard: only its own orders
    Restaurant(i64),
    /// Customer app: only its own orders
    Customer(i64),
    /// Shipper app: offers whose restaurant is within reach
    ///
    /// An offer matches when the restaurant lies within both the shipper's
    /// radius and the offer's broadcast radius. Other shipper-pool events
    /// (withdrawals, expiries) always pass so stale offers can be cleared.
    ShipperNear { location: GeoPoint, radius_km: f64 },
    Custom(EventPredicate),
}

impl fmt::Debug for SubscriberFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "All"),
            Self::Restaurant(id) => write!(f, "Restaurant({id})"),
            Self::Customer(id) => write!(f, "Customer({id})"),
            Self::ShipperNear {
                location,
                radius_km,
            } => f
                .debug_struct("ShipperNear")
                .field("location", location)
                .field("radius_km", radius_km)
                .finish(),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl SubscriberFilter {
    pub fn custom(f: impl Fn(&BusEvent) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    pub fn matches(&self, event: &BusEvent) -> bool {
        match self {
            Self::All => true,
            Self::Restaurant(id) => event.event.restaurant_id() == Some(*id),
            Self::Customer(id) => event.event.user_id() == Some(*id),
            Self::ShipperNear {
                location,
                radius_km,
            } => match &event.event {
                OrderBusEvent::OrderConfirmedForShippers(offer) => {
                    let reach = radius_km.min(offer.radius_km);
                    haversine_km(*location, offer.restaurant_location) <= reach
                }
                _ => true,
            },
            Self::Custom(predicate) => predicate(event),
        }
    }
}
