//! Driver app API
//!
//! | Path | Method |
//! |------|--------|
//! | /api/driver/toggle-online | POST |
//! | /api/driver/available-orders | GET |
//! | /api/driver/orders/{id} | GET |
//! | /api/driver/orders/{id}/accept | POST |
//! | /api/driver/orders/{id}/reject | POST |
//! | /api/driver/deliveries | GET |
//! | /api/driver/deliveries/{id}/update-status | POST |
//! | /api/driver/deliveries/{id}/proof | POST |
//! | /api/driver/location | POST |
//! | /api/driver/earnings | GET |
//! | /api/driver/stats | GET |
//!
//! Every route requires the driver role.

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/driver", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/toggle-online", post(handler::toggle_online))
        .route("/available-orders", get(handler::available_orders))
        .route("/orders/{id}", get(handler::order_detail))
        .route("/orders/{id}/accept", post(handler::accept))
        .route("/orders/{id}/reject", post(handler::reject))
        .route("/deliveries", get(handler::history))
        .route("/deliveries/{id}/update-status", post(handler::update_status))
        .route("/deliveries/{id}/proof", post(handler::upload_proof))
        .route("/location", post(handler::location))
        .route("/earnings", get(handler::earnings))
        .route("/stats", get(handler::stats))
}
