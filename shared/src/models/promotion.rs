//! Promotion Model

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromotionType {
    /// Discount applied to the food subtotal
    FoodDiscount,
    /// Discount applied to the shipping fee
    ShippingDiscount,
}

/// Either a percentage or a fixed amount, never both
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PromotionValue {
    Percent(f64),
    Amount(f64),
}

/// Promotion code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: i64,
    /// Unique, matched case-insensitively
    pub code: String,
    pub promotion_type: PromotionType,
    pub discount: PromotionValue,
    /// Minimum order value the promotion applies to
    #[serde(default)]
    pub min_order_value: f64,
    /// Upper bound on the computed discount
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_discount_amount: Option<f64>,
    pub starts_at: i64,
    pub ends_at: i64,
    #[serde(default)]
    pub number_of_used: u32,
    /// None = unlimited
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_usage: Option<u32>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl Promotion {
    pub fn is_exhausted(&self) -> bool {
        self.max_usage.is_some_and(|max| self.number_of_used >= max)
    }

    pub fn is_within_window(&self, now: i64) -> bool {
        self.starts_at <= now && now <= self.ends_at
    }
}

fn default_active() -> bool {
    true
}
