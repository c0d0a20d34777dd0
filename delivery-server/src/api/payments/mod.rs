//! Payment API
//!
//! | Path | Method | Role |
//! |------|--------|------|
//! | /api/payments/initiate-mobile | POST | client |
//! | /api/payments/{id}/status | GET | client |
//! | /api/payments/{id}/refund | POST | restaurant owner, admin |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/payments", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/initiate-mobile", post(handler::initiate_mobile))
        .route("/{id}/status", get(handler::status))
        .route("/{id}/refund", post(handler::refund))
}
