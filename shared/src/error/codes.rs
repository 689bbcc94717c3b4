//! Unified error codes for the delivery backend
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 2xxx: Permission errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Catalog errors (food, topping, restaurant, address)
//! - 7xxx: Promotion errors
//! - 8xxx: Delivery errors (distance, schedule, shipper assignment)
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,

    // ==================== 4xxx: Order ====================
    OrderNotFound = 4001,
    OrderEmpty = 4002,
    InvalidStatusTransition = 4003,
    InvalidQuantity = 4004,
    UserNotFound = 4005,

    // ==================== 5xxx: Payment ====================
    PaymentFailed = 5001,
    PaymentInvalidMethod = 5002,
    CheckoutNotFound = 5003,
    CheckoutAlreadyFinished = 5004,

    // ==================== 6xxx: Catalog ====================
    RestaurantNotFound = 6001,
    FoodNotFound = 6002,
    FoodUnavailable = 6003,
    ToppingNotFound = 6004,
    ToppingUnavailable = 6005,
    ToppingPriceMismatch = 6006,
    AddressNotFound = 6101,
    InvalidCoordinates = 6102,

    // ==================== 7xxx: Promotion ====================
    PromotionNotFound = 7001,
    PromotionInvalid = 7002,

    // ==================== 8xxx: Delivery ====================
    DistanceExceeded = 8001,
    DeliveryTimeExceeded = 8002,
    ScheduleOutOfRange = 8003,
    ShipperAlreadyAssigned = 8004,
    AssignmentNotFound = 8005,

    // ==================== 9xxx: System ====================
    InternalError = 9001,
    DatabaseError = 9002,
    NetworkError = 9003,
    ConfigError = 9005,
}

impl ErrorCode {
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderEmpty => "Order must contain at least one item",
            ErrorCode::InvalidStatusTransition => "Order status transition is not allowed",
            ErrorCode::InvalidQuantity => "Invalid item quantity",
            ErrorCode::UserNotFound => "User not found",

            // Payment
            ErrorCode::PaymentFailed => "Payment processing failed",
            ErrorCode::PaymentInvalidMethod => "Invalid payment method",
            ErrorCode::CheckoutNotFound => "Checkout not found",
            ErrorCode::CheckoutAlreadyFinished => "Checkout is already finished",

            // Catalog
            ErrorCode::RestaurantNotFound => "Restaurant not found",
            ErrorCode::FoodNotFound => "Food not found",
            ErrorCode::FoodUnavailable => "Food is not available",
            ErrorCode::ToppingNotFound => "Topping not found",
            ErrorCode::ToppingUnavailable => "Topping is not available",
            ErrorCode::ToppingPriceMismatch => "Topping price does not match",
            ErrorCode::AddressNotFound => "Address not found",
            ErrorCode::InvalidCoordinates => "Invalid coordinates",

            // Promotion
            ErrorCode::PromotionNotFound => "Promotion not found",
            ErrorCode::PromotionInvalid => "Promotion cannot be applied",

            // Delivery
            ErrorCode::DistanceExceeded => "Delivery distance exceeds the maximum",
            ErrorCode::DeliveryTimeExceeded => "Delivery time exceeds the maximum",
            ErrorCode::ScheduleOutOfRange => "Requested delivery time is out of range",
            ErrorCode::ShipperAlreadyAssigned => "A shipper is already assigned",
            ErrorCode::AssignmentNotFound => "Pending assignment not found",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::ConfigError => "Configuration error",
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error returned when converting an unknown u16 into an [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            8 => Ok(ErrorCode::ValueOutOfRange),

            2001 => Ok(ErrorCode::PermissionDenied),

            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderEmpty),
            4003 => Ok(ErrorCode::InvalidStatusTransition),
            4004 => Ok(ErrorCode::InvalidQuantity),
            4005 => Ok(ErrorCode::UserNotFound),

            5001 => Ok(ErrorCode::PaymentFailed),
            5002 => Ok(ErrorCode::PaymentInvalidMethod),
            5003 => Ok(ErrorCode::CheckoutNotFound),
            5004 => Ok(ErrorCode::CheckoutAlreadyFinished),

            6001 => Ok(ErrorCode::RestaurantNotFound),
            6002 => Ok(ErrorCode::FoodNotFound),
            6003 => Ok(ErrorCode::FoodUnavailable),
            6004 => Ok(ErrorCode::ToppingNotFound),
            6005 => Ok(ErrorCode::ToppingUnavailable),
            6006 => Ok(ErrorCode::ToppingPriceMismatch),
            6101 => Ok(ErrorCode::AddressNotFound),
            6102 => Ok(ErrorCode::InvalidCoordinates),

            7001 => Ok(ErrorCode::PromotionNotFound),
            7002 => Ok(ErrorCode::PromotionInvalid),

            8001 => Ok(ErrorCode::DistanceExceeded),
            8002 => Ok(ErrorCode::DeliveryTimeExceeded),
            8003 => Ok(ErrorCode::ScheduleOutOfRange),
            8004 => Ok(ErrorCode::ShipperAlreadyAssigned),
            8005 => Ok(ErrorCode::AssignmentNotFound),

            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::NetworkError),
            9005 => Ok(ErrorCode::ConfigError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
