//! Shared types for the delivery platform
//!
//! Domain entities (orders, deliveries, payments, catalog), the unified
//! error envelope and small utilities used by the server and its tests.

pub mod delivery;
pub mod error;
pub mod models;
pub mod order;
pub mod payment;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};
