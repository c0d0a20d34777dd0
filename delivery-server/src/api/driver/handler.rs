//! Driver handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use shared::delivery::{Delivery, Position};
use shared::models::UserRole;
use validator::Validate;

use crate::auth::{CurrentUser, require_role};
use crate::core::ServerState;
use crate::delivery::{AvailableDelivery, DriverOrderView, DriverStats, EarningsSummary, StatusUpdate};
use crate::tracking::Ping;
use crate::utils::validation::{
    MAX_NOTE_LEN, MAX_URL_LEN, validate_optional_text, validate_request, validate_required_text,
};
use crate::utils::{ApiResponse, AppResult};

fn require_driver(user: &CurrentUser) -> AppResult<()> {
    require_role(user, &[UserRole::Driver])
}

#[derive(Debug, Serialize)]
pub struct OnlineStatus {
    pub is_online: bool,
}

#[derive(Debug, Deserialize)]
pub struct ProofRequest {
    pub proof_url: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LocationRequest {
    #[validate(range(min = -90.0, max = 90.0, message = "must be between -90 and 90"))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "must be between -180 and 180"))]
    pub longitude: f64,
    #[serde(default)]
    pub delivery_id: Option<i64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub recorded_at: Option<i64>,
}

impl LocationRequest {
    fn ping(&self) -> Ping {
        Ping {
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy: self.accuracy,
            speed: self.speed,
            heading: self.heading,
            recorded_at: self.recorded_at,
        }
    }
}

/// POST /api/driver/toggle-online
pub async fn toggle_online(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<OnlineStatus>> {
    require_driver(&user)?;
    let is_online = state.dispatcher.toggle_online(user.id)?;
    Ok(ApiResponse::success(OnlineStatus { is_online }))
}

/// GET /api/driver/available-orders
pub async fn available_orders(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<Vec<AvailableDelivery>>> {
    require_driver(&user)?;
    Ok(ApiResponse::success(state.dispatcher.available(user.id)?))
}

/// GET /api/driver/orders/{id}
pub async fn order_detail(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(order_id): Path<i64>,
) -> AppResult<ApiResponse<DriverOrderView>> {
    require_driver(&user)?;
    Ok(ApiResponse::success(state.dispatcher.order_detail(user.id, order_id)?))
}

/// POST /api/driver/orders/{id}/accept
pub async fn accept(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(order_id): Path<i64>,
) -> AppResult<ApiResponse<Delivery>> {
    require_driver(&user)?;
    let (delivery, messages) = state.dispatcher.accept(user.id, order_id)?;
    state.notifier.deliver(messages).await;
    Ok(ApiResponse::success_with_message("Delivery accepted", delivery))
}

/// POST /api/driver/orders/{id}/reject
pub async fn reject(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(order_id): Path<i64>,
) -> AppResult<ApiResponse<()>> {
    require_driver(&user)?;
    state.dispatcher.reject(user.id, order_id);
    Ok(ApiResponse::ok())
}

/// GET /api/driver/deliveries
pub async fn history(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<Vec<Delivery>>> {
    require_driver(&user)?;
    Ok(ApiResponse::success(state.dispatcher.history(user.id)?))
}

/// POST /api/driver/deliveries/{id}/update-status
pub async fn update_status(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(delivery_id): Path<i64>,
    Json(req): Json<StatusUpdate>,
) -> AppResult<ApiResponse<Delivery>> {
    require_driver(&user)?;
    validate_optional_text(req.reason.as_deref(), "reason", MAX_NOTE_LEN)?;

    let (delivery, messages) = state.dispatcher.update_status(user.id, delivery_id, req)?;
    if delivery.status.is_terminal() {
        state.tracker.forget(delivery_id);
    }
    state.notifier.deliver(messages).await;
    Ok(ApiResponse::success(delivery))
}

/// POST /api/driver/deliveries/{id}/proof
pub async fn upload_proof(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(delivery_id): Path<i64>,
    Json(req): Json<ProofRequest>,
) -> AppResult<ApiResponse<Delivery>> {
    require_driver(&user)?;
    validate_required_text(&req.proof_url, "proof_url", MAX_URL_LEN)?;
    let delivery = state
        .dispatcher
        .upload_proof(user.id, delivery_id, req.proof_url)?;
    Ok(ApiResponse::success(delivery))
}

/// POST /api/driver/location
///
/// With a `delivery_id` the ping is appended to that delivery's track,
/// otherwise only the driver's last position moves.
pub async fn location(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(req): Json<LocationRequest>,
) -> AppResult<ApiResponse<Position>> {
    require_driver(&user)?;
    validate_request(&req)?;

    let position = match req.delivery_id {
        Some(delivery_id) => {
            let location = state.tracker.record(delivery_id, user.id, req.ping())?;
            Position::from(&location)
        }
        None => state.tracker.update_driver_position(user.id, req.ping())?,
    };
    Ok(ApiResponse::success(position))
}

/// GET /api/driver/earnings
pub async fn earnings(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<EarningsSummary>> {
    require_driver(&user)?;
    Ok(ApiResponse::success(state.dispatcher.earnings(user.id)?))
}

/// GET /api/driver/stats
pub async fn stats(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<DriverStats>> {
    require_driver(&user)?;
    Ok(ApiResponse::success(state.dispatcher.stats(user.id)?))
}
