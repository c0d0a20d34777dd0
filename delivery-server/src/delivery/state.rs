//! Delivery status rules
//!
//! ```text
//! searching → assigned → going_to_restaurant → at_restaurant → picked_up
//!           → on_the_way → arrived → delivered
//! any non-terminal ──→ failed
//! ```
//!
//! Drivers may skip forward but never move back. `searching → assigned`
//! only happens through acceptance.

use shared::delivery::DeliveryStatus;
use shared::order::OrderStatus;

use crate::orders::Transition;

/// Rejected delivery status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidDeliveryTransition {
    #[error("Delivery is already {0}")]
    Terminal(DeliveryStatus),

    #[error("Cannot move delivery from {from} to {to}")]
    Backward {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    #[error("Drivers cannot set status {0}")]
    NotDriverSettable(DeliveryStatus),
}

/// Validate a driver-reported status change
pub fn validate(
    from: DeliveryStatus,
    to: DeliveryStatus,
) -> Result<Transition, InvalidDeliveryTransition> {
    if matches!(to, DeliveryStatus::Searching | DeliveryStatus::Assigned) {
        return Err(InvalidDeliveryTransition::NotDriverSettable(to));
    }
    if from.is_terminal() {
        return if from == to {
            Ok(Transition::Unchanged)
        } else {
            Err(InvalidDeliveryTransition::Terminal(from))
        };
    }
    if from == to {
        return Ok(Transition::Unchanged);
    }
    if to == DeliveryStatus::Failed {
        return Ok(Transition::Changed);
    }
    match (from.rank(), to.rank()) {
        (Some(current), Some(target)) if target > current => Ok(Transition::Changed),
        _ => Err(InvalidDeliveryTransition::Backward { from, to }),
    }
}

/// Order status a delivery checkpoint pushes the order to
pub fn order_checkpoint(status: DeliveryStatus) -> Option<OrderStatus> {
    match status {
        DeliveryStatus::PickedUp => Some(OrderStatus::PickedUp),
        DeliveryStatus::OnTheWay => Some(OrderStatus::OnTheWay),
        DeliveryStatus::Delivered => Some(OrderStatus::Delivered),
        _ => None,
    }
}
