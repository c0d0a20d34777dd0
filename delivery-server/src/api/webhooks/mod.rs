//! Payment gateway callbacks
//!
//! The gateway retries anything that is not a 2xx, so the endpoint always
//! acknowledges. Malformed bodies and reconciliation failures are logged.

use axum::{Router, body::Bytes, extract::State, routing::post};
use shared::payment::GatewayCallback;

use crate::core::ServerState;
use crate::utils::ApiResponse;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/webhooks/freemopay", post(freemopay))
}

/// POST /api/webhooks/freemopay
///
/// Takes raw bytes: a `Json` extractor answers 4xx on its own.
async fn freemopay(State(state): State<ServerState>, body: Bytes) -> ApiResponse<()> {
    let callback: GatewayCallback = match serde_json::from_slice(&body) {
        Ok(cb) => cb,
        Err(e) => {
            tracing::warn!(error = %e, bytes = body.len(), "Ignoring malformed payment callback");
            return ApiResponse::ok();
        }
    };

    tracing::info!(
        external_id = %callback.external_id,
        reference = %callback.reference,
        status = %callback.status,
        "Payment callback received"
    );

    match state.payments.reconcile(&callback) {
        Ok(reconciled) => {
            state.notifier.deliver(reconciled.messages).await;
        }
        Err(e) => {
            tracing::warn!(
                external_id = %callback.external_id,
                error = %e,
                "Payment callback not applied"
            );
        }
    }
    ApiResponse::ok()
}
