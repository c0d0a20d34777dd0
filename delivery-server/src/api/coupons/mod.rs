//! Coupon pre-validation
//!
//! | Path | Method | Role |
//! |------|--------|------|
//! | /api/coupons/validate | POST | client |

use axum::{Json, Router, extract::State, routing::post};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::models::UserRole;
use validator::Validate;

use crate::auth::{CurrentUser, require_role};
use crate::core::ServerState;
use crate::orders::CouponQuote;
use crate::utils::validation::validate_request;
use crate::utils::{ApiResponse, AppResult};

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/coupons/validate", post(validate))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ValidateCouponRequest {
    #[validate(length(min = 1, max = 50, message = "must be 1-50 characters"))]
    pub code: String,
    pub restaurant_id: i64,
    pub subtotal: Decimal,
}

async fn validate(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(req): Json<ValidateCouponRequest>,
) -> AppResult<ApiResponse<CouponQuote>> {
    require_role(&user, &[UserRole::Client])?;
    validate_request(&req)?;
    let quote = state
        .orders
        .quote_coupon(user.id, &req.code, req.restaurant_id, req.subtotal)?;
    Ok(ApiResponse::success(quote))
}
