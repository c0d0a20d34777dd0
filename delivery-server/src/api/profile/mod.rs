//! Push token registration
//!
//! | Path | Method |
//! |------|--------|
//! | /api/profile/push-token | POST, DELETE |

use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;
use shared::error::ErrorCode;
use shared::util::now_millis;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::notify::PushNotifier;
use crate::utils::{ApiResponse, AppError, AppResult};

pub fn router() -> Router<ServerState> {
    Router::new().route(
        "/api/profile/push-token",
        post(register).delete(unregister),
    )
}

#[derive(Debug, Deserialize)]
pub struct PushTokenRequest {
    pub token: String,
}

fn user_not_found(id: i64) -> AppError {
    AppError::with_message(ErrorCode::UserNotFound, format!("User {id} not found"))
}

/// POST /api/profile/push-token
async fn register(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(req): Json<PushTokenRequest>,
) -> AppResult<ApiResponse<()>> {
    let token = req.token.trim();
    if !PushNotifier::is_valid_token(token) {
        return Err(AppError::validation("Invalid Expo push token"));
    }
    if !state
        .storage
        .set_push_token(user.id, Some(token.to_string()), now_millis())?
    {
        return Err(user_not_found(user.id));
    }
    tracing::info!(user_id = user.id, "Push token registered");
    Ok(ApiResponse::ok())
}

/// DELETE /api/profile/push-token
async fn unregister(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<()>> {
    if !state.storage.set_push_token(user.id, None, now_millis())? {
        return Err(user_not_found(user.id));
    }
    Ok(ApiResponse::ok())
}
