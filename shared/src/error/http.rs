//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            Self::NotFound
            | Self::OrderNotFound
            | Self::MenuItemNotFound
            | Self::AddressNotFound
            | Self::RestaurantNotFound
            | Self::PaymentNotFound
            | Self::CouponNotFound
            | Self::DeliveryNotFound
            | Self::UserNotFound => StatusCode::NOT_FOUND,

            Self::AlreadyExists
            | Self::InvalidTransition
            | Self::OrderNotCancellable
            | Self::OrderAlreadyPaid
            | Self::OrderClosed
            | Self::AlreadyRated
            | Self::PaymentNotRefundable
            | Self::DeliveryAlreadyTaken
            | Self::DeliveryInvalidTransition
            | Self::DeliveryTerminal
            | Self::TrackingUnavailable => StatusCode::CONFLICT,

            Self::NotAuthenticated | Self::TokenExpired | Self::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }

            Self::PermissionDenied
            | Self::RoleRequired
            | Self::DriverOffline
            | Self::NotAssignedDriver => StatusCode::FORBIDDEN,

            Self::ItemUnavailable
            | Self::OrderNotDelivered
            | Self::CouponInvalid
            | Self::CouponMinimumNotMet
            | Self::CouponUsageExceeded
            | Self::DeliveryNotAvailable
            | Self::PaymentMethodInvalid => StatusCode::UNPROCESSABLE_ENTITY,

            Self::ValidationFailed
            | Self::InvalidRequest
            | Self::EmptyCart
            | Self::InvalidCoordinates => StatusCode::BAD_REQUEST,

            Self::PaymentFailed | Self::GatewayError => StatusCode::BAD_GATEWAY,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,

            Self::Unknown | Self::InternalError | Self::DatabaseError | Self::ConfigError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(ErrorCode::OrderNotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::DeliveryAlreadyTaken.http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ErrorCode::ItemUnavailable.http_status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ErrorCode::DriverOffline.http_status(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::Timeout.http_status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
