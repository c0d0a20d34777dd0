//! Delivery types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::GeoPoint;

/// Delivery lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Searching,
    Assigned,
    GoingToRestaurant,
    AtRestaurant,
    PickedUp,
    OnTheWay,
    Arrived,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub const SEQUENCE: [DeliveryStatus; 8] = [
        Self::Searching,
        Self::Assigned,
        Self::GoingToRestaurant,
        Self::AtRestaurant,
        Self::PickedUp,
        Self::OnTheWay,
        Self::Arrived,
        Self::Delivered,
    ];

    /// Position on the main sequence, `None` for `failed`
    pub fn rank(&self) -> Option<usize> {
        Self::SEQUENCE.iter().position(|s| s == self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Searching => "searching",
            Self::Assigned => "assigned",
            Self::GoingToRestaurant => "going_to_restaurant",
            Self::AtRestaurant => "at_restaurant",
            Self::PickedUp => "picked_up",
            Self::OnTheWay => "on_the_way",
            Self::Arrived => "arrived",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fulfilment record, one per order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Delivery {
    pub id: i64,
    pub order_id: i64,
    /// Set iff status is past `searching`
    #[serde(default)]
    pub driver_id: Option<i64>,
    pub status: DeliveryStatus,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub delivery_address: String,
    pub distance_km: f64,
    pub estimated_minutes: u32,
    #[serde(default)]
    pub proof_photo: Option<String>,
    #[serde(default)]
    pub assigned_at: Option<i64>,
    #[serde(default)]
    pub picked_up_at: Option<i64>,
    #[serde(default)]
    pub delivered_at: Option<i64>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub driver_earnings: Option<Decimal>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One GPS ping, append-only
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryLocation {
    pub delivery_id: i64,
    pub driver_id: i64,
    pub seq: u64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    pub recorded_at: i64,
}

/// Latest known position of a delivery
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: i64,
}

impl From<&DeliveryLocation> for Position {
    fn from(loc: &DeliveryLocation) -> Self {
        Self {
            latitude: loc.latitude,
            longitude: loc.longitude,
            recorded_at: loc.recorded_at,
        }
    }
}
