//! Notification inbox
//!
//! | Path | Method |
//! |------|--------|
//! | /api/notifications | GET |
//! | /api/notifications/{id}/read | POST |
//! | /api/notifications/read-all | POST |

use axum::{
    Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use shared::models::Notification;
use shared::util::now_millis;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::utils::{ApiResponse, AppError, AppResult};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 200;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/notifications", get(list))
        .route("/api/notifications/read-all", post(read_all))
        .route("/api/notifications/{id}/read", post(read))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ReadAll {
    pub updated: usize,
}

/// GET /api/notifications - newest first
async fn list(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Vec<Notification>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Ok(ApiResponse::success(
        state.storage.list_notifications(user.id, limit)?,
    ))
}

/// POST /api/notifications/{id}/read
async fn read(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<()>> {
    if !state.storage.mark_notification_read(user.id, id, now_millis())? {
        return Err(AppError::not_found(format!("Notification {id}")));
    }
    Ok(ApiResponse::ok())
}

/// POST /api/notifications/read-all
async fn read_all(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<ReadAll>> {
    let updated = state.storage.mark_all_read(user.id, now_millis())?;
    Ok(ApiResponse::success(ReadAll { updated }))
}
