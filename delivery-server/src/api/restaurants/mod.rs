//! Restaurant order management
//!
//! | Path | Method | Role |
//! |------|--------|------|
//! | /api/restaurants/{rid}/orders | GET | owner, admin |
//! | /api/restaurants/{rid}/orders/{id}/status | POST | owner, admin |
//!
//! Ownership is checked by the order service.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use shared::models::UserRole;
use shared::order::{Order, OrderStatus};

use crate::auth::{CurrentUser, require_role};
use crate::core::ServerState;
use crate::utils::validation::{MAX_NOTE_LEN, validate_optional_text};
use crate::utils::{ApiResponse, AppResult};

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/restaurants/{rid}/orders", get(list_orders))
        .route("/api/restaurants/{rid}/orders/{id}/status", post(update_status))
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

/// GET /api/restaurants/{rid}/orders
async fn list_orders(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(restaurant_id): Path<i64>,
    Query(filter): Query<OrderFilter>,
) -> AppResult<ApiResponse<Vec<Order>>> {
    require_role(&user, &[UserRole::Restaurant, UserRole::Admin])?;
    let orders = state
        .orders
        .list_for_restaurant(&user, restaurant_id, filter.status)?;
    Ok(ApiResponse::success(orders))
}

/// POST /api/restaurants/{rid}/orders/{id}/status
async fn update_status(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path((restaurant_id, order_id)): Path<(i64, i64)>,
    Json(req): Json<UpdateStatusRequest>,
) -> AppResult<ApiResponse<Order>> {
    require_role(&user, &[UserRole::Restaurant, UserRole::Admin])?;
    validate_optional_text(req.reason.as_deref(), "reason", MAX_NOTE_LEN)?;

    let (order, messages) = state.orders.update_by_restaurant(
        &user,
        restaurant_id,
        order_id,
        req.status,
        req.reason,
    )?;
    state.notifier.deliver(messages).await;
    Ok(ApiResponse::success(order))
}
