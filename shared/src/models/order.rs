//! Order Models
//!
//! The order aggregate: [`Order`] root, immutable [`OrderDetail`] lines,
//! the optional [`ShippingDetail`] of the durably assigned shipper, and the
//! create-order request shapes.

use super::address::GeoPoint;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Status
// ============================================================================

/// Order lifecycle status
///
/// ```text
/// processing_payment -> pending -> confirmed -> delivering -> completed
///          \               \           \             \
///           +---------------+-----------+-------------+--> canceled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    ProcessingPayment,
    Pending,
    Confirmed,
    Delivering,
    Completed,
    Canceled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::ProcessingPayment,
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Delivering,
        OrderStatus::Completed,
        OrderStatus::Canceled,
    ];

    /// Targets reachable from this status in one step
    pub const fn allowed_targets(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::ProcessingPayment => &[OrderStatus::Pending, OrderStatus::Canceled],
            OrderStatus::Pending => &[OrderStatus::Confirmed, OrderStatus::Canceled],
            OrderStatus::Confirmed => &[OrderStatus::Delivering, OrderStatus::Canceled],
            OrderStatus::Delivering => &[OrderStatus::Completed, OrderStatus::Canceled],
            OrderStatus::Completed | OrderStatus::Canceled => &[],
        }
    }

    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Canceled)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::ProcessingPayment => "processing_payment",
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Delivering => "delivering",
            OrderStatus::Completed => "completed",
            OrderStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("unknown order status: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    #[default]
    Asap,
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery, bypasses the payment gateway
    #[default]
    Cod,
    Card,
    EWallet,
}

impl PaymentMethod {
    pub const fn is_cod(&self) -> bool {
        matches!(self, PaymentMethod::Cod)
    }
}

// ============================================================================
// Aggregate
// ============================================================================

/// Copy of the delivery address taken at creation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAddressSnapshot {
    pub address_id: i64,
    pub text: String,
    pub location: GeoPoint,
}

/// Order root aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub restaurant_id: i64,
    pub status: OrderStatus,

    // === Amounts ===
    /// Sum of line totals (discounted food + toppings)
    pub subtotal: f64,
    pub shipping_fee: f64,
    pub shipper_earnings: f64,
    pub platform_fee: f64,
    pub promotion_discount: f64,
    /// subtotal + shipping_fee - promotion_discount, never negative
    pub total: f64,

    // === Delivery ===
    pub delivery_address: DeliveryAddressSnapshot,
    pub restaurant_location: GeoPoint,
    pub delivery_distance_km: f64,
    /// Minutes from creation until expected delivery
    pub estimated_delivery_minutes: i64,
    /// Absolute expected delivery timestamp
    pub estimated_delivery_at: i64,
    pub delivery_type: DeliveryType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_delivery_time: Option<i64>,

    // === Promotion ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_code: Option<String>,

    // === Payment ===
    pub payment_method: PaymentMethod,
    pub is_paid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,

    pub created_at: i64,
    pub updated_at: i64,
}

/// Topping snapshot inside an order line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedTopping {
    pub topping_id: i64,
    pub name: String,
    pub price: f64,
}

/// Immutable priced line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetail {
    pub id: i64,
    pub order_id: i64,
    /// Position within the order, starting at 1
    pub line_no: u32,
    pub food_id: i64,
    pub food_name: String,
    pub quantity: i32,
    /// List price per unit at order time
    pub original_price: f64,
    /// Discount actually applied (0-100)
    pub discount_percent: f64,
    /// Charged price per unit after discount
    pub price: f64,
    pub toppings: Vec<SelectedTopping>,
    /// Sum of topping prices x quantity
    pub topping_total: f64,
    /// price x quantity + topping_total
    pub line_total: f64,
}

/// Durable shipper assignment (at most one per order)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingDetail {
    pub order_id: i64,
    pub shipper_id: i64,
    pub shipper_earnings: f64,
    pub assigned_at: i64,
}

/// Order together with its line items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderWithDetails {
    pub order: Order,
    pub details: Vec<OrderDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping: Option<ShippingDetail>,
}

// ============================================================================
// Requests
// ============================================================================

/// Client-side topping selection with the price the client displayed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToppingSelection {
    pub topping_id: i64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemInput {
    pub food_id: i64,
    pub quantity: i32,
    #[serde(default)]
    pub selected_toppings: Vec<ToppingSelection>,
    /// Client-proposed discount, honoured only when the food has none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: i64,
    pub restaurant_id: i64,
    pub address_id: i64,
    pub items: Vec<OrderItemInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_code: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub delivery_type: DeliveryType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_delivery_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_matches_lifecycle() {
        use OrderStatus::*;
        let allowed = [
            (ProcessingPayment, Pending),
            (ProcessingPayment, Canceled),
            (Pending, Confirmed),
            (Pending, Canceled),
            (Confirmed, Delivering),
            (Confirmed, Canceled),
            (Delivering, Completed),
            (Delivering, Canceled),
        ];
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn terminal_states_have_no_targets() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(OrderStatus::Completed.allowed_targets().is_empty());
        assert!(!OrderStatus::Delivering.is_terminal());
    }

    #[test]
    fn status_string_forms() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::ProcessingPayment).unwrap(),
            "\"processing_payment\""
        );
        for st in OrderStatus::ALL {
            assert_eq!(st.as_str().parse::<OrderStatus>().unwrap(), st);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn create_request_defaults() {
        let req: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "user_id": 1,
            "restaurant_id": 2,
            "address_id": 3,
            "items": [{ "food_id": 4, "quantity": 2 }]
        }))
        .unwrap();
        assert_eq!(req.payment_method, PaymentMethod::Cod);
        assert_eq!(req.delivery_type, DeliveryType::Asap);
        assert!(req.items[0].selected_toppings.is_empty());
        assert!(req.promotion_code.is_none());
    }
}
