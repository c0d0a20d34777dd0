//! Address Model

use serde::{Deserialize, Serialize};

use super::GeoPoint;

/// Client delivery address
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub id: i64,
    pub user_id: i64,
    pub label: String,
    pub address: String,
    #[serde(default)]
    pub address_details: Option<String>,
    pub location: GeoPoint,
}
