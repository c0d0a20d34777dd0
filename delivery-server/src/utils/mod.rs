//! Utilities
//!
//! - [`AppError`] / [`ApiResponse`] - error and response envelope (from `shared::error`)
//! - [`logger`] - tracing subscriber setup
//! - [`validation`] - request validation helpers

pub mod logger;
pub mod validation;

pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCode};
