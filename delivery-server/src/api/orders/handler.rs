//! Client order handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use shared::delivery::Delivery;
use shared::models::UserRole;
use shared::order::{Order, PaymentMethod};
use shared::payment::Payment;
use validator::Validate;

use crate::auth::{CurrentUser, require_role};
use crate::core::ServerState;
use crate::orders::{OrderTracking, PlaceOrder, PlacedOrder, RateOrder};
use crate::pricing::CartLine;
use crate::utils::validation::{
    MAX_INSTRUCTIONS_LEN, MAX_NOTE_LEN, validate_optional_text, validate_request,
};
use crate::utils::{ApiResponse, AppResult};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub restaurant_id: i64,
    pub address_id: i64,
    #[validate(length(min = 1, message = "must contain at least one item"))]
    pub items: Vec<CartLine>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

impl From<CreateOrderRequest> for PlaceOrder {
    fn from(req: CreateOrderRequest) -> Self {
        Self {
            restaurant_id: req.restaurant_id,
            address_id: req.address_id,
            items: req.items,
            payment_method: req.payment_method,
            coupon_code: req.coupon_code.filter(|c| !c.trim().is_empty()),
            special_instructions: req.special_instructions,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RateRequest {
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    pub restaurant_rating: u8,
    #[serde(default)]
    pub restaurant_comment: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    pub driver_rating: Option<u8>,
    #[serde(default)]
    pub driver_comment: Option<String>,
}

/// Order with its delivery and payment attempts
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub delivery: Option<Delivery>,
    pub payments: Vec<Payment>,
}

/// GET /api/orders
pub async fn list(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<Vec<Order>>> {
    require_role(&user, &[UserRole::Client])?;
    Ok(ApiResponse::success(state.orders.list_for_client(user.id)?))
}

/// POST /api/orders
pub async fn create(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(req): Json<CreateOrderRequest>,
) -> AppResult<ApiResponse<PlacedOrder>> {
    require_role(&user, &[UserRole::Client])?;
    validate_request(&req)?;
    validate_optional_text(
        req.special_instructions.as_deref(),
        "special_instructions",
        MAX_INSTRUCTIONS_LEN,
    )?;
    for line in &req.items {
        validate_optional_text(
            line.special_instructions.as_deref(),
            "items.special_instructions",
            MAX_NOTE_LEN,
        )?;
    }

    let placed = state.orders.place(user.id, req.into())?;
    Ok(ApiResponse::success_with_message("Order placed", placed))
}

/// GET /api/orders/{id}
pub async fn get_by_id(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<OrderDetail>> {
    require_role(&user, &[UserRole::Client])?;
    let order = state.orders.get_for_client(user.id, id)?;
    let delivery = state.storage.delivery_for_order(id)?;
    let payments = state.storage.payments_for_order(id)?;
    Ok(ApiResponse::success(OrderDetail {
        order,
        delivery,
        payments,
    }))
}

/// POST /api/orders/{id}/cancel
pub async fn cancel(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    body: Option<Json<CancelRequest>>,
) -> AppResult<ApiResponse<Order>> {
    require_role(&user, &[UserRole::Client])?;
    let req = body.map(|Json(r)| r).unwrap_or_default();
    validate_optional_text(req.reason.as_deref(), "reason", MAX_NOTE_LEN)?;

    let (order, messages) = state.orders.cancel_by_client(user.id, id, req.reason)?;
    state.notifier.deliver(messages).await;
    Ok(ApiResponse::success_with_message("Order cancelled", order))
}

/// POST /api/orders/{id}/rate
pub async fn rate(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<RateRequest>,
) -> AppResult<ApiResponse<()>> {
    require_role(&user, &[UserRole::Client])?;
    validate_request(&req)?;
    validate_optional_text(req.restaurant_comment.as_deref(), "restaurant_comment", MAX_NOTE_LEN)?;
    validate_optional_text(req.driver_comment.as_deref(), "driver_comment", MAX_NOTE_LEN)?;

    state.orders.rate(
        user.id,
        id,
        RateOrder {
            restaurant_rating: req.restaurant_rating,
            restaurant_comment: req.restaurant_comment,
            driver_rating: req.driver_rating,
            driver_comment: req.driver_comment,
        },
    )?;
    Ok(ApiResponse::ok())
}

/// GET /api/orders/{id}/track
pub async fn track(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<OrderTracking>> {
    require_role(&user, &[UserRole::Client])?;
    Ok(ApiResponse::success(state.orders.track(user.id, id, &state.tracker)?))
}
