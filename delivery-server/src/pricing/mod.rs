//! Pricing: money math, shipping fees and promotions

pub mod fee;
pub mod money;
pub mod promotion;

pub use fee::{DeliveryEstimate, FeeCalculator, FeeConfig, ShippingQuote};
pub use promotion::{OrderAmounts, PromotionCheck, PromotionValidator};
