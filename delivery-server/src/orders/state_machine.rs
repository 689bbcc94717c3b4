//! Order status transitions
//!
//! ```text
//! processing_payment ──► pending ──► confirmed ──► delivering ──► completed
//!         │                 │            │              │
//!         └─────────────────┴────────────┴──────────────┴──► canceled
//! ```
//!
//! The edge table lives on [`OrderStatus`]; this module adds who may drive
//! each edge and which side effects it carries.

use super::OrderError;
use shared::models::{Order, OrderStatus};
use std::fmt;

/// Who is asking for a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Customer(i64),
    Restaurant(i64),
    Shipper(i64),
    /// Payment confirmation path
    PaymentGateway,
    /// Reconciliation sweeps and internal maintenance
    System,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Customer(id) => write!(f, "customer:{id}"),
            Actor::Restaurant(id) => write!(f, "restaurant:{id}"),
            Actor::Shipper(id) => write!(f, "shipper:{id}"),
            Actor::PaymentGateway => write!(f, "payment_gateway"),
            Actor::System => write!(f, "system"),
        }
    }
}

/// Reject edges not in the transition table
pub fn validate_transition(from: OrderStatus, to: OrderStatus) -> Result<(), OrderError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(OrderError::InvalidTransition { from, to })
    }
}

/// Check that `actor` may move `order` to `to`
pub fn authorize(order: &Order, to: OrderStatus, actor: Actor) -> Result<(), OrderError> {
    let from = order.status;
    let allowed = match actor {
        Actor::System => true,
        Actor::Restaurant(id) => {
            id == order.restaurant_id
                && from != OrderStatus::ProcessingPayment
                && matches!(
                    to,
                    OrderStatus::Confirmed
                        | OrderStatus::Delivering
                        | OrderStatus::Completed
                        | OrderStatus::Canceled
                )
        }
        Actor::Customer(id) => {
            id == order.user_id
                && to == OrderStatus::Canceled
                && matches!(from, OrderStatus::Pending | OrderStatus::ProcessingPayment)
        }
        Actor::PaymentGateway => {
            from == OrderStatus::ProcessingPayment
                && matches!(to, OrderStatus::Pending | OrderStatus::Canceled)
        }
        Actor::Shipper(_) => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(OrderError::Forbidden(format!(
            "{} may not move order {} from {} to {}",
            actor, order.id, from, to
        )))
    }
}

/// Side effects carried by one transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransitionEffects {
    /// Announce the order to the restaurant feed
    pub announce_created: bool,
    /// Enqueue for shipper pickup and offer to the pool
    pub enqueue_assignment: bool,
    /// Drop the pending assignment and withdraw the offer
    pub remove_assignment: bool,
    /// Mark paid and stamp the payment date
    pub mark_paid: bool,
    /// Cancel any non-terminal checkout
    pub cancel_checkouts: bool,
}

/// Effects for `from -> to`, given whether a shipper is already assigned
pub fn effects_of(from: OrderStatus, to: OrderStatus, has_shipper: bool) -> TransitionEffects {
    TransitionEffects {
        announce_created: to == OrderStatus::Pending,
        enqueue_assignment: to == OrderStatus::Confirmed && !has_shipper,
        remove_assignment: from == OrderStatus::Confirmed && to != OrderStatus::Confirmed,
        mark_paid: to == OrderStatus::Completed,
        cancel_checkouts: to == OrderStatus::Canceled,
    }
}

/// Notification text for a status change
pub fn status_message(order_id: i64, to: OrderStatus, reason: Option<&str>) -> String {
    match (to, reason) {
        (OrderStatus::Canceled, Some(reason)) => {
            format!("Order #{order_id} was canceled: {reason}")
        }
        (OrderStatus::Canceled, None) => format!("Order #{order_id} was canceled"),
        (OrderStatus::Pending, _) => format!("Order #{order_id} has been placed"),
        (OrderStatus::Confirmed, _) => {
            format!("Order #{order_id} was confirmed by the restaurant")
        }
        (OrderStatus::Delivering, _) => format!("Order #{order_id} is on the way"),
        (OrderStatus::Completed, _) => format!("Order #{order_id} was delivered"),
        (OrderStatus::ProcessingPayment, _) => {
            format!("Order #{order_id} is waiting for payment")
        }
    }
}
