//! Shipping fee, fee split and delivery-time constraints

use super::money::{round_money, to_decimal};
use crate::geo::RouteEstimate;
use crate::orders::OrderError;
use rust_decimal::prelude::*;
use shared::models::DeliveryType;

/// System-wide delivery pricing and constraints
#[derive(Debug, Clone)]
pub struct FeeConfig {
    /// Fee covering the first `base_distance_km`
    pub base_fee: f64,
    pub base_distance_km: f64,
    /// Charged per started km beyond the base distance
    pub per_km_fee: f64,
    /// Shipper's share of the shipping fee, percent
    pub shipper_share_percent: f64,
    /// Inclusive distance cap at creation time
    pub max_distance_km: f64,
    /// Cap for an ASAP estimate
    pub max_delivery_minutes: i64,
    /// How far ahead a scheduled order may target
    pub max_schedule_ahead_minutes: i64,
    /// Kitchen time added on top of travel time
    pub preparation_minutes: i64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            base_fee: 15_000.0,
            base_distance_km: 2.0,
            per_km_fee: 5_000.0,
            shipper_share_percent: 80.0,
            max_distance_km: 20.0,
            max_delivery_minutes: 120,
            max_schedule_ahead_minutes: 7 * 24 * 60,
            preparation_minutes: 15,
        }
    }
}

/// Shipping fee and its split
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShippingQuote {
    pub distance_km: Decimal,
    pub shipping_fee: Decimal,
    pub shipper_earnings: Decimal,
    pub platform_fee: Decimal,
}

/// When the order is expected at the door
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryEstimate {
    pub minutes: i64,
    /// Absolute target (Unix millis)
    pub estimated_at: i64,
}

#[derive(Debug, Clone)]
pub struct FeeCalculator {
    config: FeeConfig,
}

impl FeeCalculator {
    pub fn new(config: FeeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeeConfig {
        &self.config
    }

    /// Distance rounded to 0.01 km, rejected when above the cap
    ///
    /// A distance exactly equal to the cap is accepted.
    pub fn check_distance(&self, distance_km: f64) -> Result<Decimal, OrderError> {
        if !distance_km.is_finite() || distance_km < 0.0 {
            return Err(OrderError::Validation(format!(
                "delivery distance must be a non-negative number, got {}",
                distance_km
            )));
        }
        let distance = round_money(to_decimal(distance_km));
        let max = round_money(to_decimal(self.config.max_distance_km));
        if distance > max {
            return Err(OrderError::DistanceExceeded {
                distance_km: distance.to_f64().unwrap_or(distance_km),
                max_km: self.config.max_distance_km,
            });
        }
        Ok(distance)
    }

    /// Shipping fee for a distance plus the shipper/platform split
    ///
    /// fee = base_fee + ceil(distance - base_distance) * per_km_fee
    pub fn quote(&self, distance_km: f64) -> Result<ShippingQuote, OrderError> {
        let distance = self.check_distance(distance_km)?;
        let base_distance = to_decimal(self.config.base_distance_km);
        let extra_km = (distance - base_distance).max(Decimal::ZERO).ceil();
        let shipping_fee =
            round_money(to_decimal(self.config.base_fee) + extra_km * to_decimal(self.config.per_km_fee));

        let share = to_decimal(self.config.shipper_share_percent.clamp(0.0, 100.0));
        let shipper_earnings = round_money(shipping_fee * share / Decimal::ONE_HUNDRED);
        let platform_fee = shipping_fee - shipper_earnings;

        Ok(ShippingQuote {
            distance_km: distance,
            shipping_fee,
            shipper_earnings,
            platform_fee,
        })
    }

    /// Estimated delivery time for ASAP orders, validated target for
    /// scheduled ones
    pub fn estimate_delivery(
        &self,
        route: &RouteEstimate,
        delivery_type: DeliveryType,
        requested_delivery_time: Option<i64>,
        now: i64,
    ) -> Result<DeliveryEstimate, OrderError> {
        let (minutes, earliest) = self.lead_time(route.duration_seconds, now)?;

        match delivery_type {
            DeliveryType::Asap => {
                if minutes > self.config.max_delivery_minutes {
                    return Err(OrderError::DeliveryTimeExceeded {
                        minutes,
                        max_minutes: self.config.max_delivery_minutes,
                    });
                }
                Ok(DeliveryEstimate {
                    minutes,
                    estimated_at: earliest,
                })
            }
            DeliveryType::Scheduled => {
                let requested = requested_delivery_time.ok_or_else(|| {
                    OrderError::Validation(
                        "requested_delivery_time is required for scheduled delivery".to_string(),
                    )
                })?;
                if requested < earliest {
                    return Err(OrderError::ScheduleOutOfRange(format!(
                        "requested time {} is earlier than the earliest possible delivery {}",
                        shared::util::format_millis(requested),
                        shared::util::format_millis(earliest)
                    )));
                }
                let latest = now.saturating_add(
                    self.config.max_schedule_ahead_minutes.saturating_mul(60_000),
                );
                if requested > latest {
                    return Err(OrderError::ScheduleOutOfRange(format!(
                        "requested time {} is more than {} minutes ahead",
                        shared::util::format_millis(requested),
                        self.config.max_schedule_ahead_minutes
                    )));
                }
                let ahead_ms = requested - now;
                Ok(DeliveryEstimate {
                    minutes: (ahead_ms + 59_999) / 60_000,
                    estimated_at: requested,
                })
            }
        }
    }

    /// Travel plus preparation minutes, and the earliest arrival time
    ///
    /// Durations too large to express as a timestamp are reported as
    /// `DeliveryTimeExceeded` rather than wrapping.
    fn lead_time(&self, duration_seconds: f64, now: i64) -> Result<(i64, i64), OrderError> {
        let travel_minutes = if duration_seconds.is_finite() {
            // saturating cast
            (duration_seconds.max(0.0) / 60.0).ceil() as i64
        } else {
            i64::MAX
        };
        let exceeded = || OrderError::DeliveryTimeExceeded {
            minutes: travel_minutes.saturating_add(self.config.preparation_minutes),
            max_minutes: self.config.max_delivery_minutes,
        };
        let minutes = travel_minutes
            .checked_add(self.config.preparation_minutes)
            .ok_or_else(exceeded)?;
        let earliest = minutes
            .checked_mul(60_000)
            .and_then(|ms| now.checked_add(ms))
            .ok_or_else(exceeded)?;
        Ok((minutes, earliest))
    }
}
