//! Money calculation utilities using rust_decimal for precision
//!
//! Amounts travel as `f64` on the models; every calculation here is done in
//! `Decimal` and rounded to 2 decimal places (half away from zero) on the
//! way back out.

use crate::orders::OrderError;
use crate::utils::validation::{MAX_QUANTITY, validate_finite_range};
use rust_decimal::prelude::*;

/// Rounding strategy for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Maximum allowed unit price
const MAX_PRICE: f64 = 100_000_000.0;

/// Validate that a f64 value is finite (not NaN, not Infinity)
#[inline]
fn require_finite(value: f64, field_name: &str) -> Result<(), OrderError> {
    if !value.is_finite() {
        return Err(OrderError::Validation(format!(
            "{} must be a finite number, got {}",
            field_name, value
        )));
    }
    Ok(())
}

/// Validate a stored or submitted price
pub fn validate_price(value: f64, field_name: &str) -> Result<(), OrderError> {
    require_finite(value, field_name)?;
    if value < 0.0 {
        return Err(OrderError::Validation(format!(
            "{} must be non-negative, got {}",
            field_name, value
        )));
    }
    if value > MAX_PRICE {
        return Err(OrderError::Validation(format!(
            "{} exceeds maximum allowed ({}), got {}",
            field_name, MAX_PRICE, value
        )));
    }
    Ok(())
}

/// Quantity must be positive and within bounds
pub fn validate_quantity(food_id: i64, quantity: i32) -> Result<(), OrderError> {
    if quantity <= 0 || quantity > MAX_QUANTITY {
        return Err(OrderError::InvalidQuantity { food_id, quantity });
    }
    Ok(())
}

/// Discount percent must be finite and in [0, 100]
pub fn validate_discount_percent(value: f64) -> Result<(), OrderError> {
    validate_finite_range(value, "discount_percent", 0.0, 100.0)
        .map_err(|e| OrderError::Validation(e.message))
}

/// Convert f64 to Decimal for calculation
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    round_money(value).to_f64().unwrap_or_default()
}

#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Unit price after a percentage discount
///
/// Formula: price * (1 - discount_percent/100), never negative
pub fn discounted_unit_price(price: f64, discount_percent: f64) -> Decimal {
    let base = to_decimal(price);
    let discount = base * to_decimal(discount_percent) / Decimal::ONE_HUNDRED;
    round_money((base - discount).max(Decimal::ZERO))
}

/// Line total: (unit price * qty) + (topping sum * qty)
pub fn line_total(unit_price: Decimal, topping_sum: Decimal, quantity: i32) -> Decimal {
    let qty = Decimal::from(quantity);
    round_money(unit_price * qty + topping_sum * qty)
}

/// Order total: subtotal + shipping fee - promotion discount, clamped at zero
pub fn order_total(subtotal: Decimal, shipping_fee: Decimal, promotion_discount: Decimal) -> Decimal {
    round_money((subtotal + shipping_fee - promotion_discount).max(Decimal::ZERO))
}

/// Compare two monetary amounts within tolerance
pub fn money_eq(a: f64, b: f64) -> bool {
    (to_decimal(a) - to_decimal(b)).abs() < MONEY_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discounted_unit_price() {
        assert_eq!(to_f64(discounted_unit_price(50_000.0, 10.0)), 45_000.0);
        assert_eq!(to_f64(discounted_unit_price(30_000.0, 0.0)), 30_000.0);
        assert_eq!(to_f64(discounted_unit_price(10.0, 100.0)), 0.0);
        // 33.33% of 9.99 = 3.3297 -> 6.6603 -> 6.66
        assert_eq!(to_f64(discounted_unit_price(9.99, 33.33)), 6.66);
    }

    #[test]
    fn test_line_total_includes_toppings_per_unit() {
        let total = line_total(Decimal::from(45_000), Decimal::from(5_000), 2);
        assert_eq!(to_f64(total), 100_000.0);
    }

    #[test]
    fn test_order_total_clamps_at_zero() {
        let total = order_total(Decimal::from(10), Decimal::from(5), Decimal::from(100));
        assert_eq!(total, Decimal::ZERO);
        let total = order_total(Decimal::from(130_000), Decimal::from(20_000), Decimal::ZERO);
        assert_eq!(to_f64(total), 150_000.0);
    }

    #[test]
    fn test_money_eq_tolerance() {
        assert!(money_eq(5000.0, 5000.004));
        assert!(money_eq(0.1 + 0.2, 0.3));
        assert!(!money_eq(5000.0, 5000.02));
        assert!(!money_eq(5000.0, 4999.0));
    }

    #[test]
    fn test_validation_helpers() {
        assert!(validate_quantity(1, 1).is_ok());
        assert!(matches!(
            validate_quantity(1, 0),
            Err(OrderError::InvalidQuantity { food_id: 1, quantity: 0 })
        ));
        assert!(validate_quantity(1, MAX_QUANTITY + 1).is_err());
        assert!(validate_discount_percent(100.0).is_ok());
        assert!(validate_discount_percent(-0.5).is_err());
        assert!(validate_discount_percent(f64::NAN).is_err());
        assert!(validate_price(f64::INFINITY, "price").is_err());
        assert!(validate_price(-1.0, "price").is_err());
    }
}
