//! Payment handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use shared::models::UserRole;
use shared::order::PaymentMethod;
use shared::payment::Payment;

use crate::auth::{CurrentUser, require_role};
use crate::core::ServerState;
use crate::payments::InitiatePayment;
use crate::security_log;
use crate::utils::validation::validate_phone;
use crate::utils::{ApiResponse, AppResult};

#[derive(Debug, Deserialize)]
pub struct InitiateMobileRequest {
    pub order_id: i64,
    pub phone: String,
    pub payment_method: PaymentMethod,
}

/// POST /api/payments/initiate-mobile
///
/// A gateway failure still answers 200 with the payment in `failed`.
pub async fn initiate_mobile(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(req): Json<InitiateMobileRequest>,
) -> AppResult<ApiResponse<Payment>> {
    require_role(&user, &[UserRole::Client])?;
    let phone = req.phone.trim().replace(' ', "");
    validate_phone(&phone)?;

    let payment = state
        .payments
        .initiate(
            user.id,
            InitiatePayment {
                order_id: req.order_id,
                phone,
                payment_method: req.payment_method,
            },
        )
        .await?;
    Ok(ApiResponse::success(payment))
}

/// GET /api/payments/{id}/status
///
/// Polls the gateway while the payment is pending.
pub async fn status(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<Payment>> {
    require_role(&user, &[UserRole::Client])?;
    let reconciled = state.payments.poll(user.id, id).await?;
    state.notifier.deliver(reconciled.messages).await;
    Ok(ApiResponse::success(reconciled.payment))
}

/// POST /api/payments/{id}/refund
pub async fn refund(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<Payment>> {
    require_role(&user, &[UserRole::Restaurant, UserRole::Admin])?;
    let reconciled = state.payments.refund(&user, id)?;
    security_log!(
        "INFO",
        "payment_refunded",
        payment_id = id,
        user_id = user.id,
        amount = reconciled.payment.amount.to_string()
    );
    state.notifier.deliver(reconciled.messages).await;
    Ok(ApiResponse::success_with_message("Payment refunded", reconciled.payment))
}
