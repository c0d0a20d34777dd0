//! Catalog import
//!
//! Users, restaurants, menus, addresses and coupons are managed outside this
//! service. A JSON snapshot can be loaded at startup (`CATALOG_FILE`); every
//! record is upserted by id (coupons by code) in one write transaction.

use std::path::Path;

use serde::Deserialize;
use shared::models::{Address, Coupon, MenuItem, Restaurant, User};
use thiserror::Error;

use crate::storage::{Storage, StorageError};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Cannot read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Menu item {item_id} references unknown restaurant {restaurant_id}")]
    UnknownRestaurant { item_id: i64, restaurant_id: i64 },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub restaurants: Vec<Restaurant>,
    #[serde(default)]
    pub menu_items: Vec<MenuItem>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub coupons: Vec<Coupon>,
}

/// Record counts written by an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub users: usize,
    pub restaurants: usize,
    pub menu_items: usize,
    pub addresses: usize,
    pub coupons: usize,
}

pub fn import_file(storage: &Storage, path: impl AsRef<Path>) -> Result<ImportSummary, CatalogError> {
    let bytes = std::fs::read(path.as_ref())?;
    let snapshot: CatalogSnapshot = serde_json::from_slice(&bytes)?;
    import(storage, &snapshot)
}

pub fn import(storage: &Storage, snapshot: &CatalogSnapshot) -> Result<ImportSummary, CatalogError> {
    let txn = storage.begin_write()?;
    for user in &snapshot.users {
        storage.put_user_txn(&txn, user)?;
    }
    for restaurant in &snapshot.restaurants {
        storage.put_restaurant_txn(&txn, restaurant)?;
    }
    for item in &snapshot.menu_items {
        if storage.get_restaurant_txn(&txn, item.restaurant_id)?.is_none() {
            return Err(CatalogError::UnknownRestaurant {
                item_id: item.id,
                restaurant_id: item.restaurant_id,
            });
        }
        storage.put_menu_item_txn(&txn, item)?;
    }
    for address in &snapshot.addresses {
        storage.put_address_txn(&txn, address)?;
    }
    for coupon in &snapshot.coupons {
        let mut coupon = coupon.clone();
        coupon.code = Coupon::normalize_code(&coupon.code);
        // keep the live usage counter when re-importing
        if let Some(existing) = storage.get_coupon_txn(&txn, &coupon.code)? {
            coupon.usage_count = coupon.usage_count.max(existing.usage_count);
        }
        storage.put_coupon_txn(&txn, &coupon)?;
    }
    Storage::commit(txn)?;

    let summary = ImportSummary {
        users: snapshot.users.len(),
        restaurants: snapshot.restaurants.len(),
        menu_items: snapshot.menu_items.len(),
        addresses: snapshot.addresses.len(),
        coupons: snapshot.coupons.len(),
    };
    tracing::info!(?summary, "Catalog imported");
    Ok(summary)
}
