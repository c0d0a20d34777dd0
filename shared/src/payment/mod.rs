//! Payment types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::order::PaymentMethod;

pub const CURRENCY_XAF: &str = "XAF";

/// Payment status: `pending → processing → completed | failed | refunded`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

impl PaymentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Refunded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub user_id: i64,
    pub amount: Decimal,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentState,
    pub phone_number: String,
    /// Gateway-side reference, known once initiation succeeded
    #[serde(default)]
    pub transaction_reference: Option<String>,
    /// Raw gateway payload of the last meaningful answer
    #[serde(default)]
    pub provider_response: Option<Value>,
    #[serde(default)]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub last_poll_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Payment {
    /// Identifier sent to the gateway as `externalId`
    pub fn external_id(&self) -> String {
        self.id.to_string()
    }
}

/// Webhook body posted by the mobile-money gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayCallback {
    pub status: String,
    pub reference: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(rename = "externalId")]
    pub external_id: String,
    #[serde(default)]
    pub message: Option<String>,
}
