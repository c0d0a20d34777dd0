//! Order lifecycle
//!
//! - [`state_machine`] - legal transitions, pure
//! - [`service`] - placement, actor-driven transitions, ratings, tracking
//!
//! Every read-check-write runs inside one redb write transaction; the
//! notifications a committed transition produced are returned to the caller
//! and delivered after the commit.

pub mod service;
pub mod state_machine;

use shared::error::{AppError, ErrorCode};
use shared::order::OrderStatus;
use thiserror::Error;

use crate::pricing::{CouponRejection, PricingError};
use crate::storage::StorageError;

pub use service::{
    CouponQuote, OrderService, OrderTracking, PlaceOrder, PlacedOrder, RateOrder,
    DEFAULT_CLIENT_CANCEL_REASON,
};
pub use state_machine::{InvalidTransition, Transition};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order {0} not found")]
    NotFound(i64),

    #[error("Restaurant {0} not found")]
    RestaurantNotFound(i64),

    #[error("Address {0} not found")]
    AddressNotFound(i64),

    #[error("Coupon {0} not found")]
    CouponNotFound(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("Order can no longer be cancelled")]
    NotCancellable(OrderStatus),

    #[error("Only delivered orders can be rated")]
    NotDelivered(OrderStatus),

    #[error("Order already rated")]
    AlreadyRated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Coupon(#[from] CouponRejection),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        let message = err.to_string();
        match err {
            OrderError::NotFound(id) => {
                AppError::with_message(ErrorCode::OrderNotFound, message).with_detail("order_id", id)
            }
            OrderError::RestaurantNotFound(_) => {
                AppError::with_message(ErrorCode::RestaurantNotFound, message)
            }
            OrderError::AddressNotFound(_) => {
                AppError::with_message(ErrorCode::AddressNotFound, message)
            }
            OrderError::CouponNotFound(_) => AppError::with_message(ErrorCode::CouponNotFound, message),
            OrderError::InvalidTransition(e) => {
                AppError::with_message(ErrorCode::InvalidTransition, message)
                    .with_detail("current_status", e.from.as_str())
                    .with_detail("requested_status", e.to.as_str())
            }
            OrderError::NotCancellable(status) => {
                AppError::with_message(ErrorCode::OrderNotCancellable, message)
                    .with_detail("current_status", status.as_str())
            }
            OrderError::NotDelivered(status) => {
                AppError::with_message(ErrorCode::OrderNotDelivered, message)
                    .with_detail("current_status", status.as_str())
            }
            OrderError::AlreadyRated => AppError::with_message(ErrorCode::AlreadyRated, message),
            OrderError::Forbidden(msg) => AppError::forbidden(msg),
            OrderError::Validation(msg) => AppError::validation(msg),
            OrderError::Coupon(e) => e.into(),
            OrderError::Pricing(e) => e.into(),
            OrderError::Storage(e) => e.into(),
        }
    }
}
