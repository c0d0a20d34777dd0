//! redb-based storage layer
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `users` | `user_id` | `User` | Accounts, driver online flag and position |
//! | `restaurants` | `restaurant_id` | `Restaurant` | Catalog |
//! | `menu_items` | `item_id` | `MenuItem` | Catalog |
//! | `addresses` | `address_id` | `Address` | Client addresses |
//! | `coupons` | `code` | `Coupon` | Discount codes (upper-case) |
//! | `coupon_redemptions` | `(code, user_id)` | `u32` | Per-user usage |
//! | `orders` | `order_id` | `Order` | Orders with line snapshot |
//! | `order_numbers` | `order_number` | `order_id` | Uniqueness of order numbers |
//! | `client_orders` | `(client_id, order_id)` | `()` | Index |
//! | `restaurant_orders` | `(restaurant_id, order_id)` | `()` | Index |
//! | `deliveries` | `delivery_id` | `Delivery` | Fulfilment records |
//! | `delivery_by_order` | `order_id` | `delivery_id` | 1:1 link |
//! | `searching_deliveries` | `delivery_id` | `()` | Deliveries waiting for a driver |
//! | `driver_deliveries` | `(driver_id, delivery_id)` | `()` | Index |
//! | `delivery_locations` | `(delivery_id, seq)` | `DeliveryLocation` | GPS pings (append-only) |
//! | `payments` | `payment_id` | `Payment` | Payment attempts |
//! | `payment_references` | `reference` | `payment_id` | Gateway reference lookup |
//! | `order_payments` | `(order_id, payment_id)` | `()` | Index |
//! | `ratings` | `(order_id, user_id, kind)` | `Rating` | One rating per kind |
//! | `notifications` | `(user_id, notification_id)` | `Notification` | Inbox |
//!
//! # Concurrency
//!
//! redb serializes write transactions. Every read-check-write sequence on an
//! order, delivery, payment or coupon runs inside a single write transaction,
//! which is what makes driver assignment first-accept-wins and coupon usage
//! increments lossless. Readers use MVCC read transactions and never block
//! writers.

mod catalog;
mod orders;
mod payments;

use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub(crate) type JsonTable = TableDefinition<'static, i64, &'static [u8]>;

const USERS_TABLE: JsonTable = TableDefinition::new("users");
const RESTAURANTS_TABLE: JsonTable = TableDefinition::new("restaurants");
const MENU_ITEMS_TABLE: JsonTable = TableDefinition::new("menu_items");
const ADDRESSES_TABLE: JsonTable = TableDefinition::new("addresses");
const COUPONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("coupons");
const COUPON_REDEMPTIONS_TABLE: TableDefinition<(&str, i64), u32> =
    TableDefinition::new("coupon_redemptions");

const ORDERS_TABLE: JsonTable = TableDefinition::new("orders");
const ORDER_NUMBERS_TABLE: TableDefinition<&str, i64> = TableDefinition::new("order_numbers");
const CLIENT_ORDERS_TABLE: TableDefinition<(i64, i64), ()> = TableDefinition::new("client_orders");
const RESTAURANT_ORDERS_TABLE: TableDefinition<(i64, i64), ()> =
    TableDefinition::new("restaurant_orders");

const DELIVERIES_TABLE: JsonTable = TableDefinition::new("deliveries");
const DELIVERY_BY_ORDER_TABLE: TableDefinition<i64, i64> = TableDefinition::new("delivery_by_order");
const SEARCHING_DELIVERIES_TABLE: TableDefinition<i64, ()> =
    TableDefinition::new("searching_deliveries");
const DRIVER_DELIVERIES_TABLE: TableDefinition<(i64, i64), ()> =
    TableDefinition::new("driver_deliveries");
const LOCATIONS_TABLE: TableDefinition<(i64, u64), &[u8]> =
    TableDefinition::new("delivery_locations");

const PAYMENTS_TABLE: JsonTable = TableDefinition::new("payments");
const PAYMENT_REFERENCES_TABLE: TableDefinition<&str, i64> =
    TableDefinition::new("payment_references");
const ORDER_PAYMENTS_TABLE: TableDefinition<(i64, i64), ()> = TableDefinition::new("order_payments");

const RATINGS_TABLE: TableDefinition<(i64, i64, &str), &[u8]> = TableDefinition::new("ratings");
const NOTIFICATIONS_TABLE: TableDefinition<(i64, i64), &[u8]> =
    TableDefinition::new("notifications");

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Record missing: {0}")]
    Missing(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for shared::error::AppError {
    fn from(err: StorageError) -> Self {
        tracing::error!(error = %err, "Storage error occurred");
        shared::error::AppError::database(err.to_string())
    }
}

/// Marketplace storage backed by redb
#[derive(Clone)]
pub struct Storage {
    db: Arc<Database>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

impl Storage {
    /// Open or create the database at the given path
    ///
    /// redb commits with `Durability::Immediate`: once `commit()` returns the
    /// transaction survives a crash.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS_TABLE)?;
            let _ = write_txn.open_table(RESTAURANTS_TABLE)?;
            let _ = write_txn.open_table(MENU_ITEMS_TABLE)?;
            let _ = write_txn.open_table(ADDRESSES_TABLE)?;
            let _ = write_txn.open_table(COUPONS_TABLE)?;
            let _ = write_txn.open_table(COUPON_REDEMPTIONS_TABLE)?;
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(ORDER_NUMBERS_TABLE)?;
            let _ = write_txn.open_table(CLIENT_ORDERS_TABLE)?;
            let _ = write_txn.open_table(RESTAURANT_ORDERS_TABLE)?;
            let _ = write_txn.open_table(DELIVERIES_TABLE)?;
            let _ = write_txn.open_table(DELIVERY_BY_ORDER_TABLE)?;
            let _ = write_txn.open_table(SEARCHING_DELIVERIES_TABLE)?;
            let _ = write_txn.open_table(DRIVER_DELIVERIES_TABLE)?;
            let _ = write_txn.open_table(LOCATIONS_TABLE)?;
            let _ = write_txn.open_table(PAYMENTS_TABLE)?;
            let _ = write_txn.open_table(PAYMENT_REFERENCES_TABLE)?;
            let _ = write_txn.open_table(ORDER_PAYMENTS_TABLE)?;
            let _ = write_txn.open_table(RATINGS_TABLE)?;
            let _ = write_txn.open_table(NOTIFICATIONS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    ///
    /// Blocks until any other write transaction has committed or aborted.
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    /// Commit a write transaction
    pub fn commit(txn: WriteTransaction) -> StorageResult<()> {
        txn.commit()?;
        Ok(())
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }
}

// ========== JSON table helpers ==========

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

pub(crate) fn get_json<T, Tbl>(table: &Tbl, id: i64) -> StorageResult<Option<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<i64, &'static [u8]>,
{
    match table.get(id)? {
        Some(value) => Ok(Some(decode(value.value())?)),
        None => Ok(None),
    }
}

pub(crate) fn load<T: DeserializeOwned>(db: &Database, def: JsonTable, id: i64) -> StorageResult<Option<T>> {
    use redb::ReadableDatabase;
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(def)?;
    get_json(&table, id)
}

pub(crate) fn load_txn<T: DeserializeOwned>(
    txn: &WriteTransaction,
    def: JsonTable,
    id: i64,
) -> StorageResult<Option<T>> {
    let table = txn.open_table(def)?;
    get_json(&table, id)
}

pub(crate) fn store_txn<T: Serialize>(
    txn: &WriteTransaction,
    def: JsonTable,
    id: i64,
    value: &T,
) -> StorageResult<()> {
    let mut table = txn.open_table(def)?;
    let bytes = serde_json::to_vec(value)?;
    table.insert(id, bytes.as_slice())?;
    Ok(())
}

/// Ids from a `(owner, id)` index, newest first (snowflake ids are time-ordered)
pub(crate) fn index_ids<Tbl>(table: &Tbl, owner: i64) -> StorageResult<Vec<i64>>
where
    Tbl: ReadableTable<(i64, i64), ()>,
{
    let mut ids = Vec::new();
    for entry in table.range((owner, i64::MIN)..=(owner, i64::MAX))?.rev() {
        let (key, _) = entry?;
        ids.push(key.value().1);
    }
    Ok(ids)
}
