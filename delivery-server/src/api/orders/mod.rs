//! Client order API
//!
//! | Path | Method | Role |
//! |------|--------|------|
//! | /api/orders | GET, POST | client |
//! | /api/orders/{id} | GET | client |
//! | /api/orders/{id}/cancel | POST | client |
//! | /api/orders/{id}/rate | POST | client |
//! | /api/orders/{id}/track | GET | client |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/cancel", post(handler::cancel))
        .route("/{id}/rate", post(handler::rate))
        .route("/{id}/track", get(handler::track))
}
