//! Restaurant and menu models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::GeoPoint;

fn default_delivery_fee() -> Decimal {
    Decimal::from(500)
}

fn default_minimum_order() -> Decimal {
    Decimal::from(1000)
}

fn default_time_min() -> u32 {
    20
}

fn default_time_max() -> u32 {
    40
}

fn default_true() -> bool {
    true
}

/// Restaurant entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    /// User owning the restaurant (role `restaurant`)
    pub owner_id: i64,
    pub location: GeoPoint,
    #[serde(default = "default_delivery_fee")]
    pub delivery_fee: Decimal,
    #[serde(default = "default_minimum_order")]
    pub minimum_order: Decimal,
    /// Delivery time window in minutes
    #[serde(default = "default_time_min")]
    pub delivery_time_min: u32,
    #[serde(default = "default_time_max")]
    pub delivery_time_max: u32,
    #[serde(default = "default_true")]
    pub is_open: bool,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub rating_count: u32,
}

/// Menu item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuItem {
    pub id: i64,
    pub restaurant_id: i64,
    pub name: String,
    pub price: Decimal,
    /// Promotional price, wins over `price` when present
    #[serde(default)]
    pub discount_price: Option<Decimal>,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

impl MenuItem {
    pub fn effective_price(&self) -> Decimal {
        self.discount_price.unwrap_or(self.price)
    }
}
