//! Delivery Server - food-delivery marketplace backend
//!
//! # Modules
//!
//! ```text
//! delivery-server/src/
//! ├── core/          # config, state, server
//! ├── auth/          # JWT verification, role guards
//! ├── storage/       # redb tables
//! ├── pricing/       # coupon evaluation, order pricing
//! ├── orders/        # order state machine and service
//! ├── delivery/      # dispatch, delivery status, earnings
//! ├── payments/      # mobile-money gateway and reconciliation
//! ├── tracking.rs    # driver positions
//! ├── notify/        # post-commit notifications
//! ├── catalog.rs     # JSON catalog import
//! ├── api/           # HTTP routes and handlers
//! └── utils/         # logging, validation
//! ```

pub mod api;
pub mod auth;
pub mod catalog;
pub mod core;
pub mod delivery;
pub mod notify;
pub mod orders;
pub mod payments;
pub mod pricing;
pub mod storage;
pub mod tracking;
pub mod utils;

use axum::{Router, extract::DefaultBodyLimit, middleware};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use auth::{CurrentUser, JwtService};
pub use crate::core::{Config, Server, ServerState};
pub use storage::Storage;
pub use utils::{ApiResponse, AppError, AppResult, ErrorCode};

pub use utils::logger::{init_logger, init_logger_with_file};

// Security logging macro
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($key = $value),*
        );
    };
}

/// HTTP access log
async fn log_request(
    request: http::Request<axum::body::Body>,
    next: middleware::Next,
) -> http::Response<axum::body::Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = std::time::Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        target: "http_access",
        "{} {} {} {}ms",
        method,
        uri,
        response.status(),
        started.elapsed().as_millis()
    );
    response
}

/// Routes without state
pub fn routes() -> Router<ServerState> {
    Router::<ServerState>::new()
        .merge(api::health::router())
        .merge(api::webhooks::router())
        .merge(api::orders::router())
        .merge(api::coupons::router())
        .merge(api::payments::router())
        .merge(api::deliveries::router())
        .merge(api::driver::router())
        .merge(api::restaurants::router())
        .merge(api::notifications::router())
        .merge(api::profile::router())
}

/// Request bodies are small JSON documents
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Full application: routes, state, CORS, tracing, access log
pub fn build_app(state: ServerState) -> Router {
    routes()
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(log_request))
}
