//! Payment Reconciliation
//!
//! - [`gateway`] - [`PaymentGateway`] trait and wire types
//! - [`freemopay`] - reqwest client for the Freemopay v2 API
//! - [`service`] - initiate, reconcile (webhook and poll), refund
//!
//! Gateway I/O never happens inside a write transaction. The service writes
//! the pending payment, calls the gateway under a timeout, then records the
//! outcome in a second transaction.

pub mod freemopay;
pub mod gateway;
pub mod service;

use std::str::FromStr;

use shared::error::{AppError, ErrorCode};
use shared::order::{OrderStatus, PaymentMethod};
use shared::payment::PaymentState;
use thiserror::Error;

use crate::orders::OrderError;
use crate::storage::StorageError;

pub use freemopay::FreemopayClient;
pub use gateway::{CollectRequest, CollectResponse, GatewayError, GatewayStatus, PaymentGateway};
pub use service::{InitiatePayment, PaymentService, Reconciled};

/// What to do when a callback's reference differs from the stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MismatchPolicy {
    /// Log and reconcile by payment id
    #[default]
    Warn,
    /// Log and ignore the callback
    Reject,
}

impl FromStr for MismatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown mismatch policy: {other}")),
        }
    }
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment {0} not found")]
    NotFound(String),

    #[error("Order {0} not found")]
    OrderNotFound(i64),

    #[error("Order is already paid")]
    AlreadyPaid,

    #[error("Order is {0}, payments are closed")]
    OrderClosed(OrderStatus),

    #[error("{0} is not a mobile-money method")]
    InvalidMethod(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("Only completed payments can be refunded")]
    NotRefundable(PaymentState),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PaymentError {
    pub(crate) fn invalid_method(method: PaymentMethod) -> Self {
        Self::InvalidMethod(method.as_str())
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        let message = err.to_string();
        match err {
            PaymentError::NotFound(_) => AppError::with_message(ErrorCode::PaymentNotFound, message),
            PaymentError::OrderNotFound(id) => {
                AppError::with_message(ErrorCode::OrderNotFound, message).with_detail("order_id", id)
            }
            PaymentError::AlreadyPaid => AppError::with_message(ErrorCode::OrderAlreadyPaid, message),
            PaymentError::OrderClosed(status) => AppError::with_message(ErrorCode::OrderClosed, message)
                .with_detail("current_status", status.as_str()),
            PaymentError::InvalidMethod(_) => {
                AppError::with_message(ErrorCode::PaymentMethodInvalid, message)
            }
            PaymentError::Validation(msg) => AppError::validation(msg),
            PaymentError::NotRefundable(status) => {
                AppError::with_message(ErrorCode::PaymentNotRefundable, message)
                    .with_detail("current_status", status.as_str())
            }
            PaymentError::Forbidden(msg) => AppError::forbidden(msg),
            PaymentError::Order(e) => e.into(),
            PaymentError::Storage(e) => e.into(),
        }
    }
}
