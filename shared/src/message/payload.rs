use crate::models::{GeoPoint, OrderStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// New order visible to the restaurant (COD creation or confirmed payment)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreatedPayload {
    pub order_id: i64,
    pub restaurant_id: i64,
    pub user_id: i64,
    pub total: f64,
    pub item_count: usize,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusUpdatedPayload {
    pub order_id: i64,
    pub restaurant_id: i64,
    pub user_id: i64,
    pub from: OrderStatus,
    pub to: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Offer of a confirmed order to shippers near the restaurant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipperPoolOfferPayload {
    pub order_id: i64,
    pub restaurant_id: i64,
    pub restaurant_location: GeoPoint,
    pub delivery_location: GeoPoint,
    /// Only shippers within this radius of the restaurant should see it
    pub radius_km: f64,
    pub delivery_distance_km: f64,
    pub shipper_earnings: f64,
    pub priority: i32,
    pub attempt: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    ShipperAccepted,
    StatusChanged,
    Expired,
    Deleted,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShipperAccepted => write!(f, "shipper_accepted"),
            Self::StatusChanged => write!(f, "status_changed"),
            Self::Expired => write!(f, "expired"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipperPoolRemovalPayload {
    pub order_id: i64,
    pub reason: RemovalReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipperAssignedPayload {
    pub order_id: i64,
    pub restaurant_id: i64,
    pub user_id: i64,
    pub shipper_id: i64,
    pub shipper_earnings: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentExpiredPayload {
    pub order_id: i64,
    pub restaurant_id: i64,
    pub attempt_count: u32,
    pub age_minutes: i64,
}
