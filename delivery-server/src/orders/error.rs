use crate::storage::StorageError;
use shared::error::{AppError, ErrorCode};
use shared::models::OrderStatus;
use thiserror::Error;

/// Order subsystem errors
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Order must contain at least one item")]
    EmptyOrder,

    #[error("Invalid quantity for food {food_id}: {quantity}")]
    InvalidQuantity { food_id: i64, quantity: i32 },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Restaurant not found: {0}")]
    RestaurantNotFound(i64),

    #[error("Address not found: {0}")]
    AddressNotFound(i64),

    #[error("Food not found: {0}")]
    FoodNotFound(i64),

    #[error("Topping {topping_id} not found for food {food_id}")]
    ToppingNotFound { food_id: i64, topping_id: i64 },

    #[error("Order not found: {0}")]
    OrderNotFound(i64),

    #[error("Promotion not found: {0}")]
    PromotionNotFound(String),

    #[error("Checkout not found: {0}")]
    CheckoutNotFound(i64),

    #[error("No pending assignment for order {0}")]
    AssignmentNotFound(i64),

    #[error("Food is not available: {0}")]
    FoodUnavailable(String),

    #[error("Topping is not available: {0}")]
    ToppingUnavailable(String),

    #[error("Topping {topping_id} price mismatch: submitted {submitted}, current {current}")]
    ToppingPriceMismatch {
        topping_id: i64,
        submitted: f64,
        current: f64,
    },

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Delivery distance {distance_km} km exceeds maximum of {max_km} km")]
    DistanceExceeded { distance_km: f64, max_km: f64 },

    #[error("Estimated delivery time {minutes} min exceeds maximum of {max_minutes} min")]
    DeliveryTimeExceeded { minutes: i64, max_minutes: i64 },

    #[error("Requested delivery time is out of range: {0}")]
    ScheduleOutOfRange(String),

    #[error("Promotion {code} is not valid: {reason}")]
    PromotionInvalid { code: String, reason: String },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Order {0} already has a shipper assigned")]
    ShipperAlreadyAssigned(i64),

    #[error("Checkout {0} is already finished")]
    CheckoutFinished(i64),

    #[error("Payment method not supported: {0}")]
    PaymentMethod(String),

    #[error("Payment gateway error: {0}")]
    Payment(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type OrderResult<T> = Result<T, OrderError>;

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        let message = err.to_string();
        match err {
            OrderError::Storage(e) => {
                tracing::error!(error = %e, "Storage error occurred");
                AppError::with_message(ErrorCode::DatabaseError, message)
            }
            OrderError::EmptyOrder => AppError::with_message(ErrorCode::OrderEmpty, message),
            OrderError::InvalidQuantity { food_id, quantity } => {
                AppError::with_message(ErrorCode::InvalidQuantity, message)
                    .with_detail("food_id", food_id)
                    .with_detail("quantity", quantity)
            }
            OrderError::Validation(_) => AppError::with_message(ErrorCode::ValidationFailed, message),
            OrderError::UserNotFound(id) => {
                AppError::with_message(ErrorCode::UserNotFound, message).with_detail("user_id", id)
            }
            OrderError::RestaurantNotFound(id) => {
                AppError::with_message(ErrorCode::RestaurantNotFound, message)
                    .with_detail("restaurant_id", id)
            }
            OrderError::AddressNotFound(id) => {
                AppError::with_message(ErrorCode::AddressNotFound, message)
                    .with_detail("address_id", id)
            }
            OrderError::FoodNotFound(id) => {
                AppError::with_message(ErrorCode::FoodNotFound, message).with_detail("food_id", id)
            }
            OrderError::ToppingNotFound { food_id, topping_id } => {
                AppError::with_message(ErrorCode::ToppingNotFound, message)
                    .with_detail("food_id", food_id)
                    .with_detail("topping_id", topping_id)
            }
            OrderError::OrderNotFound(id) => {
                AppError::with_message(ErrorCode::OrderNotFound, message).with_detail("order_id", id)
            }
            OrderError::PromotionNotFound(code) => {
                AppError::with_message(ErrorCode::PromotionNotFound, message)
                    .with_detail("code", code)
            }
            OrderError::CheckoutNotFound(id) => {
                AppError::with_message(ErrorCode::CheckoutNotFound, message)
                    .with_detail("checkout_id", id)
            }
            OrderError::AssignmentNotFound(id) => {
                AppError::with_message(ErrorCode::AssignmentNotFound, message)
                    .with_detail("order_id", id)
            }
            OrderError::FoodUnavailable(_) => {
                AppError::with_message(ErrorCode::FoodUnavailable, message)
            }
            OrderError::ToppingUnavailable(_) => {
                AppError::with_message(ErrorCode::ToppingUnavailable, message)
            }
            OrderError::ToppingPriceMismatch {
                topping_id,
                submitted,
                current,
            } => AppError::with_message(ErrorCode::ToppingPriceMismatch, message)
                .with_detail("topping_id", topping_id)
                .with_detail("submitted", submitted)
                .with_detail("current", current),
            OrderError::InvalidCoordinates(_) => {
                AppError::with_message(ErrorCode::InvalidCoordinates, message)
            }
            OrderError::DistanceExceeded {
                distance_km,
                max_km,
            } => AppError::with_message(ErrorCode::DistanceExceeded, message)
                .with_detail("distance_km", distance_km)
                .with_detail("max_km", max_km),
            OrderError::DeliveryTimeExceeded {
                minutes,
                max_minutes,
            } => AppError::with_message(ErrorCode::DeliveryTimeExceeded, message)
                .with_detail("minutes", minutes)
                .with_detail("max_minutes", max_minutes),
            OrderError::ScheduleOutOfRange(_) => {
                AppError::with_message(ErrorCode::ScheduleOutOfRange, message)
            }
            OrderError::PromotionInvalid { code, reason } => {
                AppError::with_message(ErrorCode::PromotionInvalid, message)
                    .with_detail("code", code)
                    .with_detail("reason", reason)
            }
            OrderError::InvalidTransition { from, to } => {
                AppError::with_message(ErrorCode::InvalidStatusTransition, message)
                    .with_detail("from", from.as_str())
                    .with_detail("to", to.as_str())
            }
            OrderError::Forbidden(_) => AppError::with_message(ErrorCode::PermissionDenied, message),
            OrderError::ShipperAlreadyAssigned(id) => {
                AppError::with_message(ErrorCode::ShipperAlreadyAssigned, message)
                    .with_detail("order_id", id)
            }
            OrderError::CheckoutFinished(id) => {
                AppError::with_message(ErrorCode::CheckoutAlreadyFinished, message)
                    .with_detail("checkout_id", id)
            }
            OrderError::PaymentMethod(_) => {
                AppError::with_message(ErrorCode::PaymentInvalidMethod, message)
            }
            OrderError::Payment(_) => AppError::with_message(ErrorCode::PaymentFailed, message),
            OrderError::Internal(_) => AppError::with_message(ErrorCode::InternalError, message),
        }
    }
}
