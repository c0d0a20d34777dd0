//! HTTP API
//!
//! Every handler returns the [`ApiResponse`](shared::error::ApiResponse)
//! envelope. Handlers commit through a service first and only then hand
//! the returned notifications to the notifier.
//!
//! - [`health`] - liveness
//! - [`webhooks`] - payment gateway callbacks
//! - [`orders`] - client order placement and lifecycle
//! - [`coupons`] - coupon pre-validation
//! - [`payments`] - mobile-money payments
//! - [`deliveries`] - client view of the driver position
//! - [`driver`] - driver app
//! - [`restaurants`] - restaurant order management
//! - [`notifications`] - notification inbox
//! - [`profile`] - push token registration

pub mod coupons;
pub mod deliveries;
pub mod driver;
pub mod health;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod profile;
pub mod restaurants;
pub mod webhooks;

pub use crate::utils::{ApiResponse, AppResult};
