//! Catalog and account models
//!
//! Shared between delivery-server and the mobile apps (via API).
//! All IDs are `i64` snowflakes, all timestamps epoch milliseconds.

pub mod address;
pub mod coupon;
pub mod notification;
pub mod restaurant;
pub mod user;

use serde::{Deserialize, Serialize};

pub use address::*;
pub use coupon::*;
pub use notification::*;
pub use restaurant::*;
pub use user::*;

/// WGS84 coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        crate::util::haversine_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}
