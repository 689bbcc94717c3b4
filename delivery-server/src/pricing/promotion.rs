//! Promotion code validation and redemption
//!
//! Validity is always evaluated against a fresh read; `use_code*` re-checks
//! inside the write transaction that bumps `number_of_used`.

use super::money::{round_money, to_decimal, to_f64};
use crate::orders::OrderError;
use crate::storage::PromotionRepository;
use crate::utils::SharedClock;
use redb::WriteTransaction;
use rust_decimal::prelude::*;
use shared::models::{Promotion, PromotionType, PromotionValue};

/// Amounts a promotion can apply to
///
/// `subtotal` is also the value checked against `min_order_value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderAmounts {
    pub subtotal: f64,
    pub shipping_fee: f64,
}

impl OrderAmounts {
    pub fn new(subtotal: f64, shipping_fee: f64) -> Self {
        Self {
            subtotal,
            shipping_fee,
        }
    }
}

impl From<f64> for OrderAmounts {
    fn from(subtotal: f64) -> Self {
        Self::new(subtotal, 0.0)
    }
}

/// Result of validating a code
#[derive(Debug, Clone, PartialEq)]
pub struct PromotionCheck {
    pub valid: bool,
    pub reason: Option<String>,
    pub promotion: Option<Promotion>,
    pub discount: f64,
}

impl PromotionCheck {
    fn invalid(reason: impl Into<String>, promotion: Option<Promotion>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
            promotion,
            discount: 0.0,
        }
    }
}

/// Discount a promotion yields right now, or the reason it does not apply
pub fn evaluate(promotion: &Promotion, amounts: OrderAmounts, now: i64) -> Result<Decimal, String> {
    if !promotion.is_active {
        return Err("Promotion is not active".to_string());
    }
    if now < promotion.starts_at {
        return Err("Promotion has not started yet".to_string());
    }
    if !promotion.is_within_window(now) {
        return Err("Promotion has expired".to_string());
    }
    if promotion.is_exhausted() {
        return Err("Promotion usage limit reached".to_string());
    }
    let subtotal = to_decimal(amounts.subtotal);
    let min_order_value = to_decimal(promotion.min_order_value);
    if subtotal < min_order_value {
        return Err(format!(
            "Order value must be at least {}",
            promotion.min_order_value
        ));
    }

    let base = match promotion.promotion_type {
        PromotionType::FoodDiscount => subtotal,
        PromotionType::ShippingDiscount => to_decimal(amounts.shipping_fee),
    }
    .max(Decimal::ZERO);

    let raw = match promotion.discount {
        PromotionValue::Percent(p) => base * to_decimal(p.clamp(0.0, 100.0)) / Decimal::ONE_HUNDRED,
        PromotionValue::Amount(a) => to_decimal(a.max(0.0)),
    };
    let mut discount = raw.min(base);
    if let Some(max) = promotion.max_discount_amount {
        discount = discount.min(to_decimal(max.max(0.0)));
    }
    Ok(round_money(discount))
}

#[derive(Debug, Clone)]
pub struct PromotionValidator {
    repo: PromotionRepository,
    clock: SharedClock,
}

impl PromotionValidator {
    pub fn new(repo: PromotionRepository, clock: SharedClock) -> Self {
        Self { repo, clock }
    }

    /// Check a code without redeeming it
    pub fn validate(
        &self,
        code: &str,
        amounts: impl Into<OrderAmounts>,
    ) -> Result<PromotionCheck, OrderError> {
        let amounts = amounts.into();
        let Some(promotion) = self.repo.find_by_code(code)? else {
            return Ok(PromotionCheck::invalid("Promotion code not found", None));
        };
        match evaluate(&promotion, amounts, self.clock.now_millis()) {
            Ok(discount) => Ok(PromotionCheck {
                valid: true,
                reason: None,
                promotion: Some(promotion),
                discount: to_f64(discount),
            }),
            Err(reason) => Ok(PromotionCheck::invalid(reason, Some(promotion))),
        }
    }

    /// Redeem a code in its own transaction
    pub fn use_code(
        &self,
        code: &str,
        amounts: impl Into<OrderAmounts>,
    ) -> Result<Promotion, OrderError> {
        let txn = self.repo.storage().begin_write()?;
        let (promotion, _) = self.use_code_txn(&txn, code, amounts.into())?;
        txn.commit().map_err(crate::storage::StorageError::from)?;
        Ok(promotion)
    }

    /// Re-check and redeem inside the caller's transaction
    ///
    /// Fails if the code stopped being valid since it was last checked.
    pub fn use_code_txn(
        &self,
        txn: &WriteTransaction,
        code: &str,
        amounts: OrderAmounts,
    ) -> Result<(Promotion, Decimal), OrderError> {
        let promotion = self
            .repo
            .find_by_code_txn(txn, code)?
            .ok_or_else(|| OrderError::PromotionNotFound(code.to_string()))?;
        let discount = evaluate(&promotion, amounts, self.clock.now_millis()).map_err(|reason| {
            OrderError::PromotionInvalid {
                code: promotion.code.clone(),
                reason,
            }
        })?;
        let updated = self.repo.increment_usage_txn(txn, &promotion)?;
        tracing::debug!(
            promotion_id = updated.id,
            number_of_used = updated.number_of_used,
            "Promotion redeemed"
        );
        Ok((updated, discount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use crate::utils::ManualClock;
    use std::sync::Arc;

    const NOW: i64 = 1_700_000_000_000;

    fn promo(code: &str, discount: PromotionValue) -> Promotion {
        Promotion {
            id: 1,
            code: code.to_string(),
            promotion_type: PromotionType::FoodDiscount,
            discount,
            min_order_value: 0.0,
            max_discount_amount: None,
            starts_at: NOW - 1_000,
            ends_at: NOW + 1_000,
            number_of_used: 0,
            max_usage: None,
            is_active: true,
        }
    }

    fn amounts(subtotal: f64) -> OrderAmounts {
        OrderAmounts::new(subtotal, 20_000.0)
    }

    fn validator(promotions: &[Promotion]) -> (PromotionValidator, PromotionRepository) {
        let storage = Storage::open_in_memory().unwrap();
        let repo = PromotionRepository::new(storage);
        for p in promotions {
            repo.upsert(p).unwrap();
        }
        let clock: SharedClock = Arc::new(ManualClock::new(NOW));
        (PromotionValidator::new(repo.clone(), clock), repo)
    }

    #[test]
    fn test_percent_discount_is_capped() {
        let mut p = promo("SALE20", PromotionValue::Percent(20.0));
        p.max_discount_amount = Some(20_000.0);
        let discount = evaluate(&p, amounts(150_000.0), NOW).unwrap();
        assert_eq!(to_f64(discount), 20_000.0);

        let discount = evaluate(&p, amounts(50_000.0), NOW).unwrap();
        assert_eq!(to_f64(discount), 10_000.0);
    }

    #[test]
    fn test_amount_discount_never_exceeds_base() {
        let p = promo("FLAT", PromotionValue::Amount(80_000.0));
        let discount = evaluate(&p, amounts(50_000.0), NOW).unwrap();
        assert_eq!(to_f64(discount), 50_000.0);
    }

    #[test]
    fn test_shipping_discount_uses_shipping_fee() {
        let mut p = promo("FREESHIP", PromotionValue::Percent(100.0));
        p.promotion_type = PromotionType::ShippingDiscount;
        let discount = evaluate(&p, amounts(150_000.0), NOW).unwrap();
        assert_eq!(to_f64(discount), 20_000.0);
    }

    #[test]
    fn test_rejection_reasons() {
        let base = promo("X", PromotionValue::Percent(10.0));

        let mut p = base.clone();
        p.is_active = false;
        assert_eq!(evaluate(&p, amounts(1.0), NOW).unwrap_err(), "Promotion is not active");

        let mut p = base.clone();
        p.starts_at = NOW + 1;
        assert!(evaluate(&p, amounts(1.0), NOW).unwrap_err().contains("not started"));

        let mut p = base.clone();
        p.ends_at = NOW - 1;
        assert!(evaluate(&p, amounts(1.0), NOW).unwrap_err().contains("expired"));

        let mut p = base.clone();
        p.max_usage = Some(3);
        p.number_of_used = 3;
        assert!(evaluate(&p, amounts(1.0), NOW).unwrap_err().contains("limit"));

        let mut p = base;
        p.min_order_value = 100_000.0;
        assert!(evaluate(&p, amounts(99_999.0), NOW).unwrap_err().contains("at least"));
        assert!(evaluate(&p, amounts(100_000.0), NOW).is_ok());
    }

    #[test]
    fn test_validate_unknown_code() {
        let (validator, _) = validator(&[]);
        let check = validator.validate("NOPE", 10_000.0).unwrap();
        assert!(!check.valid);
        assert!(check.promotion.is_none());
        assert_eq!(check.discount, 0.0);
    }

    #[test]
    fn test_validate_is_case_insensitive_and_read_only() {
        let mut p = promo("SALE20", PromotionValue::Percent(20.0));
        p.max_discount_amount = Some(20_000.0);
        let (validator, repo) = validator(&[p]);

        let check = validator.validate("sale20", 150_000.0).unwrap();
        assert!(check.valid);
        assert_eq!(check.discount, 20_000.0);
        assert_eq!(repo.get(1).unwrap().unwrap().number_of_used, 0);
    }

    #[test]
    fn test_use_code_increments_until_exhausted() {
        let mut p = promo("ONCE", PromotionValue::Amount(5_000.0));
        p.max_usage = Some(1);
        let (validator, repo) = validator(&[p]);

        let used = validator.use_code("ONCE", 50_000.0).unwrap();
        assert_eq!(used.number_of_used, 1);
        assert_eq!(repo.get(1).unwrap().unwrap().number_of_used, 1);

        let err = validator.use_code("ONCE", 50_000.0).unwrap_err();
        assert!(matches!(err, OrderError::PromotionInvalid { .. }));
        assert_eq!(repo.get(1).unwrap().unwrap().number_of_used, 1);
    }
}
