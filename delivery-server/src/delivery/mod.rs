//! Delivery Dispatch Engine
//!
//! - [`state`] - delivery status rules and order checkpoints
//! - [`earnings`] - pluggable driver earnings policies
//! - [`dispatcher`] - eligibility, first-accept-wins assignment, driver
//!   status updates
//!
//! Delivery checkpoints push the order forward (delivery → order only).

pub mod dispatcher;
pub mod earnings;
pub mod state;

use shared::delivery::DeliveryStatus;
use shared::error::{AppError, ErrorCode};
use shared::order::OrderStatus;
use thiserror::Error;

use crate::orders::OrderError;
use crate::storage::StorageError;

pub use dispatcher::{AvailableDelivery, Dispatcher, DriverOrderView, DriverStats, StatusUpdate};
pub use earnings::{
    DistanceBased, EarningsKind, EarningsPolicy, EarningsSummary, FeeShare, FlatRate,
};
pub use state::InvalidDeliveryTransition;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Delivery {0} not found")]
    NotFound(i64),

    #[error("Order {0} not found")]
    OrderNotFound(i64),

    #[error("Driver {0} not found")]
    DriverNotFound(i64),

    #[error("This order has already been taken")]
    AlreadyTaken,

    #[error("Order is {0} and can no longer be delivered")]
    OrderClosed(OrderStatus),

    #[error("You are offline")]
    DriverOffline,

    #[error("Only drivers can do this")]
    NotDriver,

    #[error("Delivery is not assigned to you")]
    NotAssignedDriver,

    #[error(transparent)]
    Transition(#[from] InvalidDeliveryTransition),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DispatchError {
    fn current_status(&self) -> Option<DeliveryStatus> {
        match self {
            Self::Transition(InvalidDeliveryTransition::Terminal(s)) => Some(*s),
            Self::Transition(InvalidDeliveryTransition::Backward { from, .. }) => Some(*from),
            _ => None,
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        let message = err.to_string();
        let current = err.current_status();
        let app = match err {
            DispatchError::NotFound(id) => {
                AppError::with_message(ErrorCode::DeliveryNotFound, message)
                    .with_detail("delivery_id", id)
            }
            DispatchError::OrderNotFound(id) => {
                AppError::with_message(ErrorCode::OrderNotFound, message).with_detail("order_id", id)
            }
            DispatchError::DriverNotFound(_) => {
                AppError::with_message(ErrorCode::UserNotFound, message)
            }
            DispatchError::AlreadyTaken => {
                AppError::with_message(ErrorCode::DeliveryAlreadyTaken, message)
            }
            DispatchError::OrderClosed(status) => {
                AppError::with_message(ErrorCode::DeliveryNotAvailable, message)
                    .with_detail("order_status", status.as_str())
            }
            DispatchError::DriverOffline => AppError::with_message(ErrorCode::DriverOffline, message),
            DispatchError::NotDriver => AppError::with_message(ErrorCode::RoleRequired, message),
            DispatchError::NotAssignedDriver => {
                AppError::with_message(ErrorCode::NotAssignedDriver, message)
            }
            DispatchError::Transition(InvalidDeliveryTransition::Terminal(_)) => {
                AppError::with_message(ErrorCode::DeliveryTerminal, message)
            }
            DispatchError::Transition(_) => {
                AppError::with_message(ErrorCode::DeliveryInvalidTransition, message)
            }
            DispatchError::Order(e) => e.into(),
            DispatchError::Storage(e) => e.into(),
        };
        match current {
            Some(status) => app.with_detail("current_status", status.as_str()),
            None => app,
        }
    }
}
