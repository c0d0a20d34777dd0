//! Dispatcher
//!
//! Every check-then-write below runs in one redb write transaction. Write
//! transactions are serialized, so of two drivers accepting the same
//! delivery exactly one sees `searching`.

use std::sync::Arc;

use redb::WriteTransaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::delivery::{Delivery, DeliveryStatus};
use shared::models::{GeoPoint, User, UserRole};
use shared::order::{Order, OrderStatus};
use shared::util::now_millis;

use super::earnings::{self, EarningsPolicy, EarningsSummary};
use super::state::{self, order_checkpoint};
use super::DispatchError;
use crate::notify::{PushMessage, templates};
use crate::orders::Transition;
use crate::orders::service::apply_forced;
use crate::storage::Storage;

/// How many searching deliveries a driver sees at once
pub const AVAILABLE_LIMIT: usize = 10;

/// Driver-reported status change
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: DeliveryStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

impl StatusUpdate {
    pub fn to(status: DeliveryStatus) -> Self {
        Self {
            status,
            reason: None,
        }
    }
}

/// A delivery waiting for a driver, with its order
#[derive(Debug, Clone, Serialize)]
pub struct AvailableDelivery {
    pub delivery: Delivery,
    pub order: Order,
    pub restaurant_name: Option<String>,
}

/// An order as a driver sees it: the offer or the job in progress
#[derive(Debug, Clone, Serialize)]
pub struct DriverOrderView {
    #[serde(flatten)]
    pub order: Order,
    pub delivery: Delivery,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub delivery_address: Option<String>,
    pub restaurant_name: Option<String>,
    pub restaurant_location: Option<GeoPoint>,
}

/// Dashboard counters of the driver app
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverStats {
    pub total_deliveries: u32,
    pub today_deliveries: u32,
    pub today_earnings: Decimal,
    pub total_earnings: Decimal,
    pub rating: f64,
    pub rating_count: u32,
    pub is_online: bool,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    storage: Storage,
    earnings: Arc<dyn EarningsPolicy>,
}

impl Dispatcher {
    pub fn new(storage: Storage, earnings: Arc<dyn EarningsPolicy>) -> Self {
        Self { storage, earnings }
    }

    fn driver_txn(&self, txn: &WriteTransaction, driver_id: i64) -> Result<User, DispatchError> {
        let driver = self
            .storage
            .get_user_txn(txn, driver_id)?
            .ok_or(DispatchError::DriverNotFound(driver_id))?;
        if driver.role != UserRole::Driver {
            return Err(DispatchError::NotDriver);
        }
        Ok(driver)
    }

    /// Flip the driver's online flag, returning the new value
    pub fn toggle_online(&self, driver_id: i64) -> Result<bool, DispatchError> {
        let txn = self.storage.begin_write()?;
        let mut driver = self.driver_txn(&txn, driver_id)?;
        driver.is_online = !driver.is_online;
        driver.updated_at = now_millis();
        self.storage.put_user_txn(&txn, &driver)?;
        Storage::commit(txn)?;

        tracing::info!(driver_id, is_online = driver.is_online, "Driver availability changed");
        Ok(driver.is_online)
    }

    /// Searching deliveries whose order is ready, newest first
    pub fn available(&self, driver_id: i64) -> Result<Vec<AvailableDelivery>, DispatchError> {
        let driver = self
            .storage
            .get_user(driver_id)?
            .ok_or(DispatchError::DriverNotFound(driver_id))?;
        if driver.role != UserRole::Driver {
            return Err(DispatchError::NotDriver);
        }
        if !driver.is_online {
            return Err(DispatchError::DriverOffline);
        }

        let mut result = Vec::new();
        for delivery in self.storage.searching_deliveries()? {
            if result.len() == AVAILABLE_LIMIT {
                break;
            }
            let Some(order) = self.storage.get_order(delivery.order_id)? else {
                continue;
            };
            if order.status != OrderStatus::Ready {
                continue;
            }
            let restaurant_name = self
                .storage
                .get_restaurant(order.restaurant_id)?
                .map(|r| r.name);
            result.push(AvailableDelivery {
                delivery,
                order,
                restaurant_name,
            });
        }
        Ok(result)
    }

    /// Claim the delivery of `order_id`; the first driver wins
    pub fn accept(
        &self,
        driver_id: i64,
        order_id: i64,
    ) -> Result<(Delivery, Vec<PushMessage>), DispatchError> {
        let now = now_millis();
        let txn = self.storage.begin_write()?;

        let driver = self.driver_txn(&txn, driver_id)?;
        if !driver.is_online {
            return Err(DispatchError::DriverOffline);
        }
        let order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or(DispatchError::OrderNotFound(order_id))?;
        if matches!(order.status, OrderStatus::Cancelled | OrderStatus::Refunded) {
            return Err(DispatchError::OrderClosed(order.status));
        }
        let mut delivery = self
            .storage
            .delivery_for_order_txn(&txn, order_id)?
            .ok_or(DispatchError::OrderNotFound(order_id))?;
        if delivery.status != DeliveryStatus::Searching {
            tracing::info!(
                driver_id,
                order_id,
                status = %delivery.status,
                "Accept lost, delivery already taken"
            );
            return Err(DispatchError::AlreadyTaken);
        }

        delivery.driver_id = Some(driver_id);
        delivery.status = DeliveryStatus::Assigned;
        delivery.assigned_at = Some(now);
        delivery.updated_at = now;
        self.storage.put_delivery_txn(&txn, &delivery)?;
        Storage::commit(txn)?;

        tracing::info!(driver_id, order_id, delivery_id = delivery.id, "Delivery assigned");

        let mut messages = vec![templates::driver_assigned(&order)];
        messages.extend(templates::driver_checkpoint(
            driver_id,
            delivery.id,
            order_id,
            DeliveryStatus::Assigned,
        ));
        Ok((delivery, messages))
    }

    /// Declining an offer changes nothing; the delivery stays listed
    pub fn reject(&self, driver_id: i64, order_id: i64) {
        tracing::info!(driver_id, order_id, "Driver declined order");
    }

    /// Driver checkpoint on an assigned delivery
    ///
    /// `picked_up`, `on_the_way` and `delivered` force the order forward.
    /// `delivered` also books the driver's earnings.
    pub fn update_status(
        &self,
        driver_id: i64,
        delivery_id: i64,
        update: StatusUpdate,
    ) -> Result<(Delivery, Vec<PushMessage>), DispatchError> {
        let now = now_millis();
        let target = update.status;
        let txn = self.storage.begin_write()?;

        let mut delivery = self
            .storage
            .get_delivery_txn(&txn, delivery_id)?
            .ok_or(DispatchError::NotFound(delivery_id))?;
        if delivery.driver_id != Some(driver_id) {
            return Err(DispatchError::NotAssignedDriver);
        }
        if state::validate(delivery.status, target)? == Transition::Unchanged {
            return Ok((delivery, Vec::new()));
        }

        let mut order = self
            .storage
            .get_order_txn(&txn, delivery.order_id)?
            .ok_or(DispatchError::OrderNotFound(delivery.order_id))?;
        if matches!(order.status, OrderStatus::Cancelled | OrderStatus::Refunded)
            && target != DeliveryStatus::Failed
        {
            return Err(DispatchError::OrderClosed(order.status));
        }

        let from = delivery.status;
        delivery.status = target;
        delivery.updated_at = now;
        match target {
            DeliveryStatus::PickedUp => delivery.picked_up_at = Some(now),
            DeliveryStatus::Delivered => delivery.delivered_at = Some(now),
            DeliveryStatus::Failed => delivery.failure_reason = update.reason,
            _ => {}
        }

        let mut messages = Vec::new();
        if let Some(order_target) = order_checkpoint(target) {
            let before = order.status;
            messages.extend(apply_forced(&mut order, order_target, now)?);
            if order.status != before {
                self.storage.put_order_txn(&txn, &order)?;
            }
        }

        if target == DeliveryStatus::Delivered {
            let amount = self.earnings.earnings(&delivery, &order);
            delivery.driver_earnings = Some(amount);
            let mut driver = self.driver_txn(&txn, driver_id)?;
            driver.wallet_balance += amount;
            driver.updated_at = now;
            self.storage.put_user_txn(&txn, &driver)?;
            tracing::info!(driver_id, delivery_id, earnings = %amount, "Driver earnings booked");
        }

        self.storage.put_delivery_txn(&txn, &delivery)?;
        Storage::commit(txn)?;

        tracing::info!(
            driver_id,
            delivery_id,
            from = %from,
            to = %target,
            "Delivery status changed"
        );
        messages.extend(templates::driver_checkpoint(
            driver_id,
            delivery_id,
            order.id,
            target,
        ));
        Ok((delivery, messages))
    }

    /// Attach a proof-of-delivery photo reference
    pub fn upload_proof(
        &self,
        driver_id: i64,
        delivery_id: i64,
        reference: String,
    ) -> Result<Delivery, DispatchError> {
        let txn = self.storage.begin_write()?;
        let mut delivery = self
            .storage
            .get_delivery_txn(&txn, delivery_id)?
            .ok_or(DispatchError::NotFound(delivery_id))?;
        if delivery.driver_id != Some(driver_id) {
            return Err(DispatchError::NotAssignedDriver);
        }
        delivery.proof_photo = Some(reference);
        delivery.updated_at = now_millis();
        self.storage.put_delivery_txn(&txn, &delivery)?;
        Storage::commit(txn)?;
        Ok(delivery)
    }

    /// All deliveries of a driver, newest first
    pub fn history(&self, driver_id: i64) -> Result<Vec<Delivery>, DispatchError> {
        Ok(self.storage.driver_deliveries(driver_id)?)
    }

    /// Order detail for its assigned driver, or for any driver while the
    /// order is ready and still unclaimed
    pub fn order_detail(&self, driver_id: i64, order_id: i64) -> Result<DriverOrderView, DispatchError> {
        let order = self
            .storage
            .get_order(order_id)?
            .ok_or(DispatchError::OrderNotFound(order_id))?;
        let delivery = self
            .storage
            .delivery_for_order(order_id)?
            .ok_or(DispatchError::OrderNotFound(order_id))?;

        let assigned = delivery.driver_id == Some(driver_id);
        let offered =
            order.status == OrderStatus::Ready && delivery.status == DeliveryStatus::Searching;
        if !assigned && !offered {
            return Err(DispatchError::NotAssignedDriver);
        }

        let client = self.storage.get_user(order.client_id)?;
        let address = self.storage.get_address(order.address_id)?;
        let restaurant = self.storage.get_restaurant(order.restaurant_id)?;
        Ok(DriverOrderView {
            client_name: client.as_ref().map(|c| c.name.clone()),
            client_phone: client.map(|c| c.phone),
            delivery_address: address.map(|a| a.address),
            restaurant_name: restaurant.as_ref().map(|r| r.name.clone()),
            restaurant_location: restaurant.map(|r| r.location),
            order,
            delivery,
        })
    }

    pub fn stats(&self, driver_id: i64) -> Result<DriverStats, DispatchError> {
        let driver = self
            .storage
            .get_user(driver_id)?
            .ok_or(DispatchError::DriverNotFound(driver_id))?;
        let deliveries = self.storage.driver_deliveries(driver_id)?;
        let summary = earnings::summarize(&deliveries, driver.wallet_balance, chrono::Utc::now());
        Ok(DriverStats {
            total_deliveries: summary.delivered_count,
            today_deliveries: summary.delivered_today,
            today_earnings: summary.today,
            total_earnings: summary.total,
            rating: driver.rating,
            rating_count: driver.rating_count,
            is_online: driver.is_online,
        })
    }

    pub fn earnings(&self, driver_id: i64) -> Result<EarningsSummary, DispatchError> {
        let driver = self
            .storage
            .get_user(driver_id)?
            .ok_or(DispatchError::DriverNotFound(driver_id))?;
        let deliveries = self.storage.driver_deliveries(driver_id)?;
        Ok(earnings::summarize(
            &deliveries,
            driver.wallet_balance,
            chrono::Utc::now(),
        ))
    }
}
