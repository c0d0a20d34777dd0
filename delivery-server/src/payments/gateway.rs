//! Mobile-money gateway seam

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Gateway status string for a settled payment
pub const STATUS_SUCCESS: &str = "SUCCESS";
/// Gateway status string for a failed payment
pub const STATUS_FAILED: &str = "FAILED";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway unreachable: {0}")]
    Transport(String),

    #[error("Gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected gateway response: {0}")]
    Decode(String),

    #[error("Gateway did not answer within {0} ms")]
    Timeout(u64),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        let code = match err {
            GatewayError::Timeout(_) => ErrorCode::Timeout,
            _ => ErrorCode::GatewayError,
        };
        AppError::with_message(code, err.to_string())
    }
}

/// Collection request sent to the gateway
#[derive(Debug, Clone)]
pub struct CollectRequest {
    pub payer: String,
    pub amount: Decimal,
    pub external_id: String,
    pub callback_url: String,
}

/// Gateway answer to a collection request
#[derive(Debug, Clone)]
pub struct CollectResponse {
    pub reference: String,
    pub status: String,
    pub raw: Value,
}

/// Gateway-side status of a collection
#[derive(Debug, Clone)]
pub struct GatewayStatus {
    pub status: String,
    pub reason: Option<String>,
    pub raw: Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate(&self, request: CollectRequest) -> Result<CollectResponse, GatewayError>;

    async fn status(&self, reference: &str) -> Result<GatewayStatus, GatewayError>;
}
