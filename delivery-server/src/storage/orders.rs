//! Orders, deliveries and GPS pings

use redb::{ReadableDatabase, ReadableTable, WriteTransaction};
use shared::delivery::{Delivery, DeliveryLocation, DeliveryStatus};
use shared::order::Order;

use super::*;

impl Storage {
    // ========== Orders ==========

    /// Insert a new order and its indexes
    ///
    /// Fails with `Duplicate` when the order number is already taken.
    pub fn insert_order_txn(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        {
            let mut numbers = txn.open_table(ORDER_NUMBERS_TABLE)?;
            if numbers.get(order.order_number.as_str())?.is_some() {
                return Err(StorageError::Duplicate(format!(
                    "order number {}",
                    order.order_number
                )));
            }
            numbers.insert(order.order_number.as_str(), order.id)?;
        }
        {
            let mut by_client = txn.open_table(CLIENT_ORDERS_TABLE)?;
            by_client.insert((order.client_id, order.id), ())?;
            let mut by_restaurant = txn.open_table(RESTAURANT_ORDERS_TABLE)?;
            by_restaurant.insert((order.restaurant_id, order.id), ())?;
        }
        store_txn(txn, ORDERS_TABLE, order.id, order)
    }

    pub fn put_order_txn(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        store_txn(txn, ORDERS_TABLE, order.id, order)
    }

    pub fn get_order(&self, id: i64) -> StorageResult<Option<Order>> {
        load(self.db(), ORDERS_TABLE, id)
    }

    pub fn get_order_txn(&self, txn: &WriteTransaction, id: i64) -> StorageResult<Option<Order>> {
        load_txn(txn, ORDERS_TABLE, id)
    }

    /// Orders of a client, newest first
    pub fn list_client_orders(&self, client_id: i64) -> StorageResult<Vec<Order>> {
        self.list_indexed_orders(CLIENT_ORDERS_TABLE, client_id)
    }

    /// Orders of a restaurant, newest first
    pub fn list_restaurant_orders(&self, restaurant_id: i64) -> StorageResult<Vec<Order>> {
        self.list_indexed_orders(RESTAURANT_ORDERS_TABLE, restaurant_id)
    }

    fn list_indexed_orders(
        &self,
        index: TableDefinition<(i64, i64), ()>,
        owner: i64,
    ) -> StorageResult<Vec<Order>> {
        let read_txn = self.db().begin_read()?;
        let index = read_txn.open_table(index)?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;

        let mut result = Vec::new();
        for id in index_ids(&index, owner)? {
            if let Some(order) = get_json(&orders, id)? {
                result.push(order);
            }
        }
        Ok(result)
    }

    // ========== Deliveries ==========

    /// Insert the delivery of an order (one per order)
    pub fn insert_delivery_txn(
        &self,
        txn: &WriteTransaction,
        delivery: &Delivery,
    ) -> StorageResult<()> {
        {
            let mut by_order = txn.open_table(DELIVERY_BY_ORDER_TABLE)?;
            if by_order.get(delivery.order_id)?.is_some() {
                return Err(StorageError::Duplicate(format!(
                    "delivery for order {}",
                    delivery.order_id
                )));
            }
            by_order.insert(delivery.order_id, delivery.id)?;
        }
        self.put_delivery_txn(txn, delivery)
    }

    /// Persist a delivery and keep the searching / driver indexes in sync
    pub fn put_delivery_txn(&self, txn: &WriteTransaction, delivery: &Delivery) -> StorageResult<()> {
        {
            let mut searching = txn.open_table(SEARCHING_DELIVERIES_TABLE)?;
            if delivery.status == DeliveryStatus::Searching {
                searching.insert(delivery.id, ())?;
            } else {
                searching.remove(delivery.id)?;
            }
        }
        if let Some(driver_id) = delivery.driver_id {
            let mut by_driver = txn.open_table(DRIVER_DELIVERIES_TABLE)?;
            by_driver.insert((driver_id, delivery.id), ())?;
        }
        store_txn(txn, DELIVERIES_TABLE, delivery.id, delivery)
    }

    pub fn get_delivery(&self, id: i64) -> StorageResult<Option<Delivery>> {
        load(self.db(), DELIVERIES_TABLE, id)
    }

    pub fn get_delivery_txn(
        &self,
        txn: &WriteTransaction,
        id: i64,
    ) -> StorageResult<Option<Delivery>> {
        load_txn(txn, DELIVERIES_TABLE, id)
    }

    pub fn delivery_for_order(&self, order_id: i64) -> StorageResult<Option<Delivery>> {
        let read_txn = self.db().begin_read()?;
        let by_order = read_txn.open_table(DELIVERY_BY_ORDER_TABLE)?;
        let Some(id) = by_order.get(order_id)?.map(|g| g.value()) else {
            return Ok(None);
        };
        let deliveries = read_txn.open_table(DELIVERIES_TABLE)?;
        get_json(&deliveries, id)
    }

    pub fn delivery_for_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: i64,
    ) -> StorageResult<Option<Delivery>> {
        let id = {
            let by_order = txn.open_table(DELIVERY_BY_ORDER_TABLE)?;
            by_order.get(order_id)?.map(|g| g.value())
        };
        match id {
            Some(id) => self.get_delivery_txn(txn, id),
            None => Ok(None),
        }
    }

    /// Deliveries still waiting for a driver, newest first
    pub fn searching_deliveries(&self) -> StorageResult<Vec<Delivery>> {
        let read_txn = self.db().begin_read()?;
        let searching = read_txn.open_table(SEARCHING_DELIVERIES_TABLE)?;
        let deliveries = read_txn.open_table(DELIVERIES_TABLE)?;

        let mut result = Vec::new();
        for entry in searching.iter()?.rev() {
            let (key, _) = entry?;
            if let Some(delivery) = get_json(&deliveries, key.value())? {
                result.push(delivery);
            }
        }
        Ok(result)
    }

    /// Deliveries ever assigned to a driver, newest first
    pub fn driver_deliveries(&self, driver_id: i64) -> StorageResult<Vec<Delivery>> {
        let read_txn = self.db().begin_read()?;
        let index = read_txn.open_table(DRIVER_DELIVERIES_TABLE)?;
        let deliveries = read_txn.open_table(DELIVERIES_TABLE)?;

        let mut result = Vec::new();
        for id in index_ids(&index, driver_id)? {
            if let Some(delivery) = get_json(&deliveries, id)? {
                result.push(delivery);
            }
        }
        Ok(result)
    }

    // ========== Locations ==========

    /// Append a ping, assigning the next per-delivery sequence number
    pub fn append_location_txn(
        &self,
        txn: &WriteTransaction,
        location: &mut DeliveryLocation,
    ) -> StorageResult<u64> {
        let mut table = txn.open_table(LOCATIONS_TABLE)?;
        let last = table
            .range((location.delivery_id, 0)..=(location.delivery_id, u64::MAX))?
            .next_back()
            .transpose()?
            .map(|(key, _)| key.value().1);
        let seq = last.map_or(0, |s| s + 1);
        location.seq = seq;

        let bytes = serde_json::to_vec(location)?;
        table.insert((location.delivery_id, seq), bytes.as_slice())?;
        Ok(seq)
    }

    pub fn latest_location(&self, delivery_id: i64) -> StorageResult<Option<DeliveryLocation>> {
        let read_txn = self.db().begin_read()?;
        let table = read_txn.open_table(LOCATIONS_TABLE)?;
        let last = table
            .range((delivery_id, 0)..=(delivery_id, u64::MAX))?
            .next_back()
            .transpose()?;
        match last {
            Some((_, value)) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Full ping history of a delivery, oldest first
    pub fn locations(&self, delivery_id: i64) -> StorageResult<Vec<DeliveryLocation>> {
        let read_txn = self.db().begin_read()?;
        let table = read_txn.open_table(LOCATIONS_TABLE)?;
        let mut result = Vec::new();
        for entry in table.range((delivery_id, 0)..=(delivery_id, u64::MAX))? {
            let (_, value) = entry?;
            result.push(decode(value.value())?);
        }
        Ok(result)
    }
}
