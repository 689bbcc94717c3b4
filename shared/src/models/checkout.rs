//! Checkout (payment session) Model

use super::order::PaymentMethod;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl CheckoutStatus {
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, CheckoutStatus::Pending)
    }
}

impl fmt::Display for CheckoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// One payment-gateway attempt for one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkout {
    pub id: i64,
    pub order_id: i64,
    pub user_id: i64,
    pub amount: f64,
    pub payment_method: PaymentMethod,
    pub status: CheckoutStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    /// Opaque gateway payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_details: Option<serde_json::Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_is_open() {
        assert!(!CheckoutStatus::Pending.is_terminal());
        assert!(CheckoutStatus::Completed.is_terminal());
        assert!(CheckoutStatus::Failed.is_terminal());
        assert!(CheckoutStatus::Cancelled.is_terminal());
        assert_eq!(
            serde_json::to_string(&CheckoutStatus::Cancelled).unwrap(),
            "\"CANCELLED\""
        );
    }
}
