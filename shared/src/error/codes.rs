//! Unified error codes for the delivery platform
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Tracking errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Coupon errors
//! - 7xxx: Delivery errors
//! - 8xxx: Account errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values so that mobile clients can
/// switch on them without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    Success = 0,
    Unknown = 1,
    ValidationFailed = 2,
    NotFound = 3,
    AlreadyExists = 4,
    InvalidRequest = 5,

    // ==================== 1xxx: Auth ====================
    NotAuthenticated = 1001,
    TokenExpired = 1003,
    TokenInvalid = 1004,

    // ==================== 2xxx: Permission ====================
    PermissionDenied = 2001,
    RoleRequired = 2002,

    // ==================== 3xxx: Tracking ====================
    /// Delivery is not accepting location pings
    TrackingUnavailable = 3001,
    /// Latitude/longitude outside the valid range
    InvalidCoordinates = 3002,

    // ==================== 4xxx: Order ====================
    OrderNotFound = 4001,
    /// Requested status change is not a legal transition
    InvalidTransition = 4002,
    OrderNotCancellable = 4003,
    OrderAlreadyPaid = 4004,
    /// Only delivered orders can be rated
    OrderNotDelivered = 4005,
    AlreadyRated = 4006,
    ItemUnavailable = 4007,
    MenuItemNotFound = 4008,
    EmptyCart = 4009,
    AddressNotFound = 4010,
    RestaurantNotFound = 4011,
    /// Cancelled or refunded order
    OrderClosed = 4012,

    // ==================== 5xxx: Payment ====================
    PaymentNotFound = 5001,
    PaymentFailed = 5002,
    PaymentMethodInvalid = 5003,
    PaymentNotRefundable = 5004,
    /// Upstream payment gateway answered with an error
    GatewayError = 5005,

    // ==================== 6xxx: Coupon ====================
    CouponNotFound = 6001,
    CouponInvalid = 6002,
    CouponMinimumNotMet = 6003,
    CouponUsageExceeded = 6004,

    // ==================== 7xxx: Delivery ====================
    DeliveryNotFound = 7001,
    /// Another driver accepted first
    DeliveryAlreadyTaken = 7002,
    DeliveryInvalidTransition = 7003,
    DeliveryTerminal = 7004,
    DriverOffline = 7005,
    NotAssignedDriver = 7006,
    DeliveryNotAvailable = 7007,

    // ==================== 8xxx: Account ====================
    UserNotFound = 8001,

    // ==================== 9xxx: System ====================
    InternalError = 9001,
    DatabaseError = 9002,
    ConfigError = 9003,
    /// Upstream call did not answer in time
    Timeout = 9004,
}

impl ErrorCode {
    /// Numeric value of the code
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Default message for the code
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Unknown => "Unknown error",
            Self::ValidationFailed => "Validation failed",
            Self::NotFound => "Resource not found",
            Self::AlreadyExists => "Resource already exists",
            Self::InvalidRequest => "Invalid request",

            Self::NotAuthenticated => "Authentication required",
            Self::TokenExpired => "Token expired",
            Self::TokenInvalid => "Invalid token",

            Self::PermissionDenied => "Permission denied",
            Self::RoleRequired => "Role required",

            Self::TrackingUnavailable => "Delivery is not trackable",
            Self::InvalidCoordinates => "Invalid coordinates",

            Self::OrderNotFound => "Order not found",
            Self::InvalidTransition => "Invalid status transition",
            Self::OrderNotCancellable => "Order can no longer be cancelled",
            Self::OrderAlreadyPaid => "Order already paid",
            Self::OrderNotDelivered => "Order has not been delivered",
            Self::AlreadyRated => "Order already rated",
            Self::ItemUnavailable => "Menu item unavailable",
            Self::MenuItemNotFound => "Menu item not found",
            Self::EmptyCart => "Cart is empty",
            Self::AddressNotFound => "Address not found",
            Self::RestaurantNotFound => "Restaurant not found",
            Self::OrderClosed => "Order is closed",

            Self::PaymentNotFound => "Payment not found",
            Self::PaymentFailed => "Payment failed",
            Self::PaymentMethodInvalid => "Invalid payment method",
            Self::PaymentNotRefundable => "Payment cannot be refunded",
            Self::GatewayError => "Payment gateway error",

            Self::CouponNotFound => "Coupon not found",
            Self::CouponInvalid => "Coupon is not valid",
            Self::CouponMinimumNotMet => "Order below coupon minimum",
            Self::CouponUsageExceeded => "Coupon usage limit reached",

            Self::DeliveryNotFound => "Delivery not found",
            Self::DeliveryAlreadyTaken => "Delivery already taken",
            Self::DeliveryInvalidTransition => "Invalid delivery status transition",
            Self::DeliveryTerminal => "Delivery already finished",
            Self::DriverOffline => "Driver is offline",
            Self::NotAssignedDriver => "Delivery is assigned to another driver",
            Self::DeliveryNotAvailable => "Delivery is not available",

            Self::UserNotFound => "User not found",

            Self::InternalError => "Internal server error",
            Self::DatabaseError => "Database error",
            Self::ConfigError => "Configuration error",
            Self::Timeout => "Upstream timeout",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
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
        let code = match value {
            0 => Self::Success,
            1 => Self::Unknown,
            2 => Self::ValidationFailed,
            3 => Self::NotFound,
            4 => Self::AlreadyExists,
            5 => Self::InvalidRequest,

            1001 => Self::NotAuthenticated,
            1003 => Self::TokenExpired,
            1004 => Self::TokenInvalid,

            2001 => Self::PermissionDenied,
            2002 => Self::RoleRequired,

            3001 => Self::TrackingUnavailable,
            3002 => Self::InvalidCoordinates,

            4001 => Self::OrderNotFound,
            4002 => Self::InvalidTransition,
            4003 => Self::OrderNotCancellable,
            4004 => Self::OrderAlreadyPaid,
            4005 => Self::OrderNotDelivered,
            4006 => Self::AlreadyRated,
            4007 => Self::ItemUnavailable,
            4008 => Self::MenuItemNotFound,
            4009 => Self::EmptyCart,
            4010 => Self::AddressNotFound,
            4011 => Self::RestaurantNotFound,
            4012 => Self::OrderClosed,

            5001 => Self::PaymentNotFound,
            5002 => Self::PaymentFailed,
            5003 => Self::PaymentMethodInvalid,
            5004 => Self::PaymentNotRefundable,
            5005 => Self::GatewayError,

            6001 => Self::CouponNotFound,
            6002 => Self::CouponInvalid,
            6003 => Self::CouponMinimumNotMet,
            6004 => Self::CouponUsageExceeded,

            7001 => Self::DeliveryNotFound,
            7002 => Self::DeliveryAlreadyTaken,
            7003 => Self::DeliveryInvalidTransition,
            7004 => Self::DeliveryTerminal,
            7005 => Self::DriverOffline,
            7006 => Self::NotAssignedDriver,
            7007 => Self::DeliveryNotAvailable,

            8001 => Self::UserNotFound,

            9001 => Self::InternalError,
            9002 => Self::DatabaseError,
            9003 => Self::ConfigError,
            9004 => Self::Timeout,

            _ => return Err(InvalidErrorCode(value)),
        };
        Ok(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::InvalidTransition.code(), 4002);
        assert_eq!(ErrorCode::DeliveryAlreadyTaken.code(), 7002);
        assert_eq!(ErrorCode::Timeout.code(), 9004);
    }

    #[test]
    fn test_try_from_roundtrips_every_variant() {
        for code in [
            ErrorCode::ValidationFailed,
            ErrorCode::TokenInvalid,
            ErrorCode::InvalidCoordinates,
            ErrorCode::RestaurantNotFound,
            ErrorCode::OrderClosed,
            ErrorCode::GatewayError,
            ErrorCode::CouponUsageExceeded,
            ErrorCode::DeliveryNotAvailable,
            ErrorCode::UserNotFound,
            ErrorCode::ConfigError,
        ] {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(4999), Err(InvalidErrorCode(4999)));
        assert_eq!(InvalidErrorCode(42).to_string(), "invalid error code: 42");
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&ErrorCode::DeliveryAlreadyTaken).unwrap();
        assert_eq!(json, "7002");
        let code: ErrorCode = serde_json::from_str("4001").unwrap();
        assert_eq!(code, ErrorCode::OrderNotFound);
        assert!(serde_json::from_str::<ErrorCode>("12345").is_err());
    }
}
