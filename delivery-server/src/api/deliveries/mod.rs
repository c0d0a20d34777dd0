//! Client view of a delivery
//!
//! | Path | Method | Role |
//! |------|--------|------|
//! | /api/deliveries/{id}/driver-location | GET | client |

use axum::{
    Router,
    extract::{Path, State},
    routing::get,
};
use shared::models::UserRole;

use crate::auth::{CurrentUser, require_role};
use crate::core::ServerState;
use crate::tracking::DriverLocationView;
use crate::utils::{ApiResponse, AppResult};

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/deliveries/{id}/driver-location", get(driver_location))
}

async fn driver_location(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<DriverLocationView>> {
    require_role(&user, &[UserRole::Client])?;
    Ok(ApiResponse::success(
        state.tracker.driver_location_for_client(user.id, id)?,
    ))
}
