//! Freemopay v2 client
//!
//! `POST {base}/api/v2/payment` starts a collection, `GET
//! {base}/api/v2/payment/{reference}` reads its status. Both use HTTP Basic
//! auth with the application key and secret.

use async_trait::async_trait;
use rust_decimal::prelude::*;
use serde::Serialize;
use serde_json::Value;

use super::gateway::{CollectRequest, CollectResponse, GatewayError, GatewayStatus, PaymentGateway};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentBody<'a> {
    payer: &'a str,
    amount: i64,
    external_id: &'a str,
    callback: &'a str,
}

#[derive(Clone)]
pub struct FreemopayClient {
    http: reqwest::Client,
    base_url: String,
    app_key: String,
    secret_key: String,
}

impl std::fmt::Debug for FreemopayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreemopayClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl FreemopayClient {
    pub fn new(
        base_url: impl Into<String>,
        app_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            app_key: app_key.into(),
            secret_key: secret_key.into(),
        }
    }

    fn payment_url(&self) -> String {
        format!("{}/api/v2/payment", self.base_url)
    }

    async fn read(response: reqwest::Response) -> Result<Value, GatewayError> {
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        if status.is_success() {
            return Ok(body);
        }
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Payment gateway error")
            .to_string();
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

fn field(body: &Value, key: &str) -> Result<String, GatewayError> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GatewayError::Decode(format!("missing `{key}`")))
}

#[async_trait]
impl PaymentGateway for FreemopayClient {
    async fn initiate(&self, request: CollectRequest) -> Result<CollectResponse, GatewayError> {
        let body = PaymentBody {
            payer: &request.payer,
            amount: request.amount.trunc().to_i64().unwrap_or(0),
            external_id: &request.external_id,
            callback: &request.callback_url,
        };
        let response = self
            .http
            .post(self.payment_url())
            .basic_auth(&self.app_key, Some(&self.secret_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let raw = Self::read(response).await?;
        tracing::debug!(external_id = %request.external_id, "Freemopay collection started");
        Ok(CollectResponse {
            reference: field(&raw, "reference")?,
            status: field(&raw, "status")?,
            raw,
        })
    }

    async fn status(&self, reference: &str) -> Result<GatewayStatus, GatewayError> {
        let response = self
            .http
            .get(format!("{}/{}", self.payment_url(), reference))
            .basic_auth(&self.app_key, Some(&self.secret_key))
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let raw = Self::read(response).await?;
        Ok(GatewayStatus {
            status: field(&raw, "status")?,
            reason: raw
                .get("reason")
                .or_else(|| raw.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string),
            raw,
        })
    }
}
