//! User Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::GeoPoint;

/// Marketplace role carried in the access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Client,
    Driver,
    Restaurant,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Driver => "driver",
            Self::Restaurant => "restaurant",
            Self::Admin => "admin",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Self::Client),
            "driver" => Ok(Self::Driver),
            "restaurant" => Ok(Self::Restaurant),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// User entity (clients, drivers, restaurant owners)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub role: UserRole,
    /// Drivers only: accepting new deliveries
    #[serde(default)]
    pub is_online: bool,
    /// Last known position (denormalized from the latest ping)
    #[serde(default)]
    pub current_position: Option<GeoPoint>,
    #[serde(default)]
    pub push_token: Option<String>,
    #[serde(default)]
    pub wallet_balance: Decimal,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub rating_count: u32,
    #[serde(default)]
    pub updated_at: i64,
}

impl User {
    pub fn is_driver(&self) -> bool {
        self.role == UserRole::Driver
    }
}
