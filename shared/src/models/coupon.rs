//! Coupon Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponKind {
    /// `value` is a percentage of the subtotal
    Percentage,
    /// `value` is an absolute amount
    FixedAmount,
    /// Waives the restaurant delivery fee, `value` is ignored
    FreeDelivery,
}

/// Discount code
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Coupon {
    pub id: i64,
    /// Stored upper-case, see [`Coupon::normalize_code`]
    pub code: String,
    #[serde(rename = "type")]
    pub kind: CouponKind,
    #[serde(default)]
    pub value: Decimal,
    #[serde(default)]
    pub minimum_order: Decimal,
    #[serde(default)]
    pub maximum_discount: Option<Decimal>,
    #[serde(default)]
    pub usage_limit: Option<u32>,
    #[serde(default)]
    pub usage_count: u32,
    #[serde(default)]
    pub per_user_limit: Option<u32>,
    #[serde(default)]
    pub starts_at: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub is_active: bool,
}

impl Coupon {
    pub fn normalize_code(code: &str) -> String {
        code.trim().to_uppercase()
    }

    pub fn has_started(&self, now: i64) -> bool {
        self.starts_at.is_none_or(|s| s <= now)
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|e| e < now)
    }

    pub fn is_exhausted(&self) -> bool {
        self.usage_limit.is_some_and(|limit| self.usage_count >= limit)
    }

    /// Time window and global counters only; per-user limits and the
    /// minimum order are checked by the pricing layer.
    pub fn is_valid(&self, now: i64) -> bool {
        self.is_active && self.has_started(now) && !self.is_expired(now) && !self.is_exhausted()
    }
}
