//! Order types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order lifecycle status
///
/// Main sequence: `pending → confirmed → preparing → ready → picked_up →
/// on_the_way → delivered`. `cancelled` and `refunded` are side branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    Ready,
    PickedUp,
    OnTheWay,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// The main sequence in order
    pub const SEQUENCE: [OrderStatus; 7] = [
        Self::Pending,
        Self::Confirmed,
        Self::Preparing,
        Self::Ready,
        Self::PickedUp,
        Self::OnTheWay,
        Self::Delivered,
    ];

    /// Position on the main sequence, `None` for side branches
    pub fn rank(&self) -> Option<usize> {
        Self::SEQUENCE.iter().position(|s| s == self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Refunded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::PickedUp => "picked_up",
            Self::OnTheWay => "on_the_way",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    MtnMomo,
    OrangeMoney,
}

impl PaymentMethod {
    pub fn is_mobile_money(&self) -> bool {
        matches!(self, Self::MtnMomo | Self::OrangeMoney)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::MtnMomo => "mtn_momo",
            Self::OrangeMoney => "orange_money",
        }
    }
}

/// Payment state mirrored on the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// Immutable line snapshot captured when the order is placed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
    pub menu_item_id: i64,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: i64,
    pub order_number: String,
    pub client_id: i64,
    pub restaurant_id: i64,
    pub address_id: i64,
    #[serde(default)]
    pub coupon_id: Option<i64>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    pub status: OrderStatus,
    pub items: Vec<OrderLine>,
    pub subtotal: Decimal,
    /// Restaurant fee at order time, before any waiver
    pub delivery_fee: Decimal,
    /// Set when a free-delivery coupon waived the fee
    #[serde(default)]
    pub delivery_fee_waived: bool,
    pub discount: Decimal,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub special_instructions: Option<String>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    pub estimated_delivery: i64,
    #[serde(default)]
    pub delivered_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    /// Fee actually paid by the client
    pub fn charged_delivery_fee(&self) -> Decimal {
        if self.delivery_fee_waived {
            Decimal::ZERO
        } else {
            self.delivery_fee
        }
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingKind {
    Restaurant,
    Driver,
}

impl RatingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restaurant => "restaurant",
            Self::Driver => "driver",
        }
    }
}

/// Post-delivery rating, unique per (order, author, kind)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rating {
    pub id: i64,
    pub order_id: i64,
    pub user_id: i64,
    pub kind: RatingKind,
    /// Restaurant id or driver id depending on `kind`
    pub target_id: i64,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_follows_main_sequence() {
        assert_eq!(OrderStatus::Pending.rank(), Some(0));
        assert_eq!(OrderStatus::Delivered.rank(), Some(6));
        assert_eq!(OrderStatus::Cancelled.rank(), None);
        assert_eq!(OrderStatus::Refunded.rank(), None);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&OrderStatus::OnTheWay).unwrap();
        assert_eq!(json, "\"on_the_way\"");
        let m: PaymentMethod = serde_json::from_str("\"mtn_momo\"").unwrap();
        assert!(m.is_mobile_money());
        assert!(!PaymentMethod::Cash.is_mobile_money());
    }
}
