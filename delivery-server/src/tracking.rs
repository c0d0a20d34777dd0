//! Location Tracking Store
//!
//! GPS pings are appended to redb under `(delivery_id, seq)`. The latest
//! position per delivery and per driver is mirrored in [`DashMap`] caches so
//! the client-facing reads do not touch the database on the hot path.
//!
//! Cache entries carry a version taken inside the write transaction (the
//! ping's `seq` per delivery, a tracker-wide stamp per driver). redb
//! serializes writers, so versions follow commit order and an entry is only
//! ever replaced by a newer one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use shared::delivery::{DeliveryLocation, DeliveryStatus, Position};
use shared::error::{AppError, ErrorCode};
use shared::models::GeoPoint;
use shared::util::now_millis;
use thiserror::Error;

use crate::storage::{Storage, StorageError};

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("Delivery {0} not found")]
    DeliveryNotFound(i64),

    #[error("Delivery is not assigned to you")]
    NotAssignedDriver,

    #[error("Delivery is already {0}")]
    DeliveryTerminal(DeliveryStatus),

    #[error("Invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<TrackingError> for AppError {
    fn from(err: TrackingError) -> Self {
        let message = err.to_string();
        match err {
            TrackingError::DeliveryNotFound(id) => {
                AppError::with_message(ErrorCode::DeliveryNotFound, message)
                    .with_detail("delivery_id", id)
            }
            TrackingError::NotAssignedDriver => {
                AppError::with_message(ErrorCode::NotAssignedDriver, message)
            }
            TrackingError::DeliveryTerminal(status) => {
                AppError::with_message(ErrorCode::DeliveryTerminal, message)
                    .with_detail("current_status", status.as_str())
            }
            TrackingError::InvalidCoordinates { .. } => {
                AppError::with_message(ErrorCode::InvalidCoordinates, message)
            }
            TrackingError::Storage(e) => e.into(),
        }
    }
}

/// One incoming GPS ping
#[derive(Debug, Clone, Copy)]
pub struct Ping {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    /// Device timestamp, server time when absent
    pub recorded_at: Option<i64>,
}

impl Ping {
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            speed: None,
            heading: None,
            recorded_at: None,
        }
    }

    fn validate(&self) -> Result<(), TrackingError> {
        let point = GeoPoint::new(self.latitude, self.longitude);
        if self.latitude.is_finite() && self.longitude.is_finite() && point.is_valid() {
            Ok(())
        } else {
            Err(TrackingError::InvalidCoordinates {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

/// Driver position as shown to the client who owns the order
#[derive(Debug, Clone, Serialize)]
pub struct DriverLocationView {
    pub delivery_id: i64,
    pub driver_id: Option<i64>,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub position: Option<Position>,
    pub status: DeliveryStatus,
    pub updated_at: i64,
}

/// Cached position with the version it was written at
type Versioned = (u64, Position);

/// Keep the entry with the highest version
fn cache_newer(map: &DashMap<i64, Versioned>, key: i64, version: u64, position: Position) {
    match map.entry(key) {
        Entry::Occupied(mut entry) => {
            if entry.get().0 < version {
                entry.insert((version, position));
            }
        }
        Entry::Vacant(entry) => {
            entry.insert((version, position));
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocationTracker {
    storage: Storage,
    by_delivery: Arc<DashMap<i64, Versioned>>,
    by_driver: Arc<DashMap<i64, Versioned>>,
    driver_stamp: Arc<AtomicU64>,
}

impl LocationTracker {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            by_delivery: Arc::new(DashMap::new()),
            by_driver: Arc::new(DashMap::new()),
            driver_stamp: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Append a ping for an active delivery assigned to `driver_id`
    ///
    /// Also refreshes the driver's cached position on the user record.
    pub fn record(
        &self,
        delivery_id: i64,
        driver_id: i64,
        ping: Ping,
    ) -> Result<DeliveryLocation, TrackingError> {
        ping.validate()?;
        let recorded_at = ping.recorded_at.unwrap_or_else(now_millis);

        let txn = self.storage.begin_write()?;
        let delivery = self
            .storage
            .get_delivery_txn(&txn, delivery_id)?
            .ok_or(TrackingError::DeliveryNotFound(delivery_id))?;
        if delivery.driver_id != Some(driver_id) {
            return Err(TrackingError::NotAssignedDriver);
        }
        if delivery.status.is_terminal() {
            return Err(TrackingError::DeliveryTerminal(delivery.status));
        }

        let mut location = DeliveryLocation {
            delivery_id,
            driver_id,
            seq: 0,
            latitude: ping.latitude,
            longitude: ping.longitude,
            accuracy: ping.accuracy,
            speed: ping.speed,
            heading: ping.heading,
            recorded_at,
        };
        self.storage.append_location_txn(&txn, &mut location)?;
        let stamp = self.store_driver_position(&txn, driver_id, &ping)?;
        Storage::commit(txn)?;

        let position = Position::from(&location);
        cache_newer(&self.by_delivery, delivery_id, location.seq, position);
        cache_newer(&self.by_driver, driver_id, stamp, position);

        tracing::trace!(delivery_id, driver_id, seq = location.seq, "Location recorded");
        Ok(location)
    }

    /// Position update without an active delivery
    pub fn update_driver_position(&self, driver_id: i64, ping: Ping) -> Result<Position, TrackingError> {
        ping.validate()?;
        let txn = self.storage.begin_write()?;
        let stamp = self.store_driver_position(&txn, driver_id, &ping)?;
        Storage::commit(txn)?;

        let position = Position {
            latitude: ping.latitude,
            longitude: ping.longitude,
            recorded_at: ping.recorded_at.unwrap_or_else(now_millis),
        };
        cache_newer(&self.by_driver, driver_id, stamp, position);
        Ok(position)
    }

    /// Write the driver's position; returns the cache stamp for this write
    fn store_driver_position(
        &self,
        txn: &redb::WriteTransaction,
        driver_id: i64,
        ping: &Ping,
    ) -> Result<u64, TrackingError> {
        if let Some(mut driver) = self.storage.get_user_txn(txn, driver_id)? {
            driver.current_position = Some(GeoPoint::new(ping.latitude, ping.longitude));
            driver.updated_at = now_millis();
            self.storage.put_user_txn(txn, &driver)?;
        }
        Ok(self.driver_stamp.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Most recent ping of a delivery
    pub fn latest(&self, delivery_id: i64) -> Result<Option<Position>, TrackingError> {
        if let Some(entry) = self.by_delivery.get(&delivery_id) {
            return Ok(Some(entry.1));
        }
        let Some(location) = self.storage.latest_location(delivery_id)? else {
            return Ok(None);
        };
        let position = Position::from(&location);
        cache_newer(&self.by_delivery, delivery_id, location.seq, position);
        Ok(Some(position))
    }

    /// Last known position of a driver, cache first
    pub fn driver_position(&self, driver_id: i64) -> Result<Option<Position>, TrackingError> {
        if let Some(entry) = self.by_driver.get(&driver_id) {
            return Ok(Some(entry.1));
        }
        let user = self.storage.get_user(driver_id)?;
        Ok(user.and_then(|u| {
            u.current_position.map(|p| Position {
                latitude: p.latitude,
                longitude: p.longitude,
                recorded_at: u.updated_at,
            })
        }))
    }

    /// Driver position for the client owning the delivery's order
    ///
    /// Other users see the delivery as not found.
    pub fn driver_location_for_client(
        &self,
        client_id: i64,
        delivery_id: i64,
    ) -> Result<DriverLocationView, TrackingError> {
        let delivery = self
            .storage
            .get_delivery(delivery_id)?
            .ok_or(TrackingError::DeliveryNotFound(delivery_id))?;
        let owned = self
            .storage
            .get_order(delivery.order_id)?
            .is_some_and(|o| o.client_id == client_id);
        if !owned {
            return Err(TrackingError::DeliveryNotFound(delivery_id));
        }

        let driver = match delivery.driver_id {
            Some(id) => self.storage.get_user(id)?,
            None => None,
        };
        let position = match delivery.driver_id {
            Some(id) => self.driver_position(id)?,
            None => None,
        };

        Ok(DriverLocationView {
            delivery_id,
            driver_id: delivery.driver_id,
            driver_name: driver.as_ref().map(|d| d.name.clone()),
            driver_phone: driver.map(|d| d.phone),
            position,
            status: delivery.status,
            updated_at: delivery.updated_at,
        })
    }

    /// Drop cached positions of a finished delivery
    pub fn forget(&self, delivery_id: i64) {
        self.by_delivery.remove(&delivery_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::delivery::Delivery;
    use shared::models::{User, UserRole};
    use shared::order::{Order, OrderStatus, PaymentMethod, PaymentStatus};

    const DRIVER: i64 = 5;
    const CLIENT: i64 = 7;

    fn setup(status: DeliveryStatus, driver: Option<i64>) -> (Storage, LocationTracker) {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .put_user(&User {
                id: DRIVER,
                name: "Paul".into(),
                phone: "670000000".into(),
                role: UserRole::Driver,
                is_online: true,
                current_position: None,
                push_token: None,
                wallet_balance: Decimal::ZERO,
                rating: 0.0,
                rating_count: 0,
                updated_at: 0,
            })
            .unwrap();

        let txn = storage.begin_write().unwrap();
        storage
            .insert_order_txn(
                &txn,
                &Order {
                    id: 100,
                    order_number: "RD-0000000000001".into(),
                    client_id: CLIENT,
                    restaurant_id: 1,
                    address_id: 2,
                    coupon_id: None,
                    coupon_code: None,
                    status: OrderStatus::Ready,
                    items: vec![],
                    subtotal: Decimal::ZERO,
                    delivery_fee: Decimal::ZERO,
                    delivery_fee_waived: false,
                    discount: Decimal::ZERO,
                    total: Decimal::ZERO,
                    payment_method: PaymentMethod::Cash,
                    payment_status: PaymentStatus::Pending,
                    special_instructions: None,
                    cancellation_reason: None,
                    estimated_delivery: 0,
                    delivered_at: None,
                    created_at: 0,
                    updated_at: 0,
                },
            )
            .unwrap();
        storage
            .insert_delivery_txn(
                &txn,
                &Delivery {
                    id: 200,
                    order_id: 100,
                    driver_id: driver,
                    status,
                    pickup: GeoPoint::new(4.05, 9.70),
                    dropoff: GeoPoint::new(4.06, 9.71),
                    delivery_address: "Akwa".into(),
                    distance_km: 1.5,
                    estimated_minutes: 4,
                    proof_photo: None,
                    assigned_at: None,
                    picked_up_at: None,
                    delivered_at: None,
                    failure_reason: None,
                    driver_earnings: None,
                    created_at: 0,
                    updated_at: 0,
                },
            )
            .unwrap();
        Storage::commit(txn).unwrap();
        let tracker = LocationTracker::new(storage.clone());
        (storage, tracker)
    }

    #[test]
    fn pings_are_sequenced_and_cached() {
        let (storage, tracker) = setup(DeliveryStatus::OnTheWay, Some(DRIVER));
        let first = tracker.record(200, DRIVER, Ping::at(4.051, 9.701)).unwrap();
        let second = tracker.record(200, DRIVER, Ping::at(4.052, 9.702)).unwrap();
        assert_eq!(first.seq + 1, second.seq);

        let latest = tracker.latest(200).unwrap().unwrap();
        assert_eq!(latest.latitude, 4.052);
        assert_eq!(storage.locations(200).unwrap().len(), 2);

        let driver = storage.get_user(DRIVER).unwrap().unwrap();
        assert_eq!(driver.current_position, Some(GeoPoint::new(4.052, 9.702)));
    }

    #[test]
    fn latest_falls_back_to_storage() {
        let (storage, tracker) = setup(DeliveryStatus::OnTheWay, Some(DRIVER));
        tracker.record(200, DRIVER, Ping::at(4.051, 9.701)).unwrap();
        let fresh = LocationTracker::new(storage);
        assert_eq!(fresh.latest(200).unwrap().unwrap().longitude, 9.701);
        assert!(fresh.latest(999).unwrap().is_none());
    }

    #[test]
    fn concurrent_pings_leave_newest_in_cache() {
        let (storage, tracker) = setup(DeliveryStatus::OnTheWay, Some(DRIVER));
        for round in 0..50 {
            std::thread::scope(|scope| {
                for t in 0..4 {
                    let tracker = tracker.clone();
                    scope.spawn(move || {
                        let lat = 4.0 + f64::from(round * 4 + t) / 10_000.0;
                        tracker.record(200, DRIVER, Ping::at(lat, 9.7)).unwrap();
                    });
                }
            });
            let stored = storage.latest_location(200).unwrap().unwrap();
            let cached = tracker.latest(200).unwrap().unwrap();
            assert_eq!(cached.latitude, stored.latitude, "round {round}");

            let driver = storage.get_user(DRIVER).unwrap().unwrap();
            let position = tracker.driver_position(DRIVER).unwrap().unwrap();
            assert_eq!(
                Some(GeoPoint::new(position.latitude, position.longitude)),
                driver.current_position,
                "round {round}"
            );
        }
        assert_eq!(storage.locations(200).unwrap().len(), 200);
    }

    #[test]
    fn rejects_foreign_driver_and_bad_coordinates() {
        let (_, tracker) = setup(DeliveryStatus::OnTheWay, Some(DRIVER));
        assert!(matches!(
            tracker.record(200, 6, Ping::at(4.0, 9.0)),
            Err(TrackingError::NotAssignedDriver)
        ));
        assert!(matches!(
            tracker.record(200, DRIVER, Ping::at(91.0, 9.0)),
            Err(TrackingError::InvalidCoordinates { .. })
        ));
        assert!(matches!(
            tracker.record(200, DRIVER, Ping::at(4.0, -181.0)),
            Err(TrackingError::InvalidCoordinates { .. })
        ));
    }

    #[test]
    fn terminal_delivery_rejects_pings() {
        let (_, tracker) = setup(DeliveryStatus::Delivered, Some(DRIVER));
        assert!(matches!(
            tracker.record(200, DRIVER, Ping::at(4.0, 9.0)),
            Err(TrackingError::DeliveryTerminal(DeliveryStatus::Delivered))
        ));
    }

    #[test]
    fn client_view_is_owner_only() {
        let (_, tracker) = setup(DeliveryStatus::OnTheWay, Some(DRIVER));
        tracker.update_driver_position(DRIVER, Ping::at(4.055, 9.705)).unwrap();

        let view = tracker.driver_location_for_client(CLIENT, 200).unwrap();
        assert_eq!(view.driver_id, Some(DRIVER));
        assert_eq!(view.driver_name.as_deref(), Some("Paul"));
        assert_eq!(view.position.unwrap().latitude, 4.055);
        assert_eq!(view.status, DeliveryStatus::OnTheWay);

        assert!(matches!(
            tracker.driver_location_for_client(8, 200),
            Err(TrackingError::DeliveryNotFound(200))
        ));
    }
}
