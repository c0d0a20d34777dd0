//! Order State Machine
//!
//! ```text
//! pending → confirmed → preparing → ready → picked_up → on_the_way → delivered
//!    └──────────┴───────────┴─────────┴──→ cancelled | refunded
//! ```
//!
//! Regular transitions move exactly one step along the main sequence.
//! Checkpoints reported by the dispatch engine use [`force_advance`], which
//! may skip forward but never moves back.

use shared::order::OrderStatus;

/// Outcome of a legal transition request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Status changes; a notification follows the commit
    Changed,
    /// Already at the target (or past it, for forced advances)
    Unchanged,
}

/// Rejected transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Cannot move order from {from} to {to}")]
pub struct InvalidTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// States from which an order may still be cancelled or refunded
pub fn is_cancellable(status: OrderStatus) -> bool {
    matches!(
        status,
        OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Preparing | OrderStatus::Ready
    )
}

/// The single legal forward step from `status`, if any
pub fn next_status(status: OrderStatus) -> Option<OrderStatus> {
    let rank = status.rank()?;
    OrderStatus::SEQUENCE.get(rank + 1).copied()
}

/// Validate a regular transition
pub fn validate(from: OrderStatus, to: OrderStatus) -> Result<Transition, InvalidTransition> {
    if from == to {
        return Ok(Transition::Unchanged);
    }
    let legal = match to {
        OrderStatus::Cancelled | OrderStatus::Refunded => is_cancellable(from),
        _ => next_status(from) == Some(to),
    };
    if legal {
        Ok(Transition::Changed)
    } else {
        Err(InvalidTransition { from, to })
    }
}

/// Validate a checkpoint-driven advance along the main sequence
///
/// Side-branch targets fall back to [`validate`].
pub fn validate_forced(from: OrderStatus, to: OrderStatus) -> Result<Transition, InvalidTransition> {
    let Some(target_rank) = to.rank() else {
        return validate(from, to);
    };
    match from.rank() {
        None => Err(InvalidTransition { from, to }),
        Some(current) if current >= target_rank => Ok(Transition::Unchanged),
        Some(_) => Ok(Transition::Changed),
    }
}
