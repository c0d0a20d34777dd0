//! Users, restaurants, menu items, addresses and coupons

use redb::{ReadableDatabase, ReadableTable, WriteTransaction};
use shared::models::{Address, Coupon, MenuItem, Restaurant, User};

use super::*;

impl Storage {
    // ========== Users ==========

    pub fn put_user(&self, user: &User) -> StorageResult<()> {
        let txn = self.begin_write()?;
        self.put_user_txn(&txn, user)?;
        Self::commit(txn)
    }

    pub fn put_user_txn(&self, txn: &WriteTransaction, user: &User) -> StorageResult<()> {
        store_txn(txn, USERS_TABLE, user.id, user)
    }

    pub fn get_user(&self, id: i64) -> StorageResult<Option<User>> {
        load(self.db(), USERS_TABLE, id)
    }

    pub fn get_user_txn(&self, txn: &WriteTransaction, id: i64) -> StorageResult<Option<User>> {
        load_txn(txn, USERS_TABLE, id)
    }

    /// Register or clear a user's push token; `false` if the user is unknown
    pub fn set_push_token(&self, user_id: i64, token: Option<String>, now: i64) -> StorageResult<bool> {
        let txn = self.begin_write()?;
        let Some(mut user) = self.get_user_txn(&txn, user_id)? else {
            return Ok(false);
        };
        user.push_token = token;
        user.updated_at = now;
        self.put_user_txn(&txn, &user)?;
        Self::commit(txn)?;
        Ok(true)
    }

    // ========== Restaurants & menu ==========

    pub fn put_restaurant(&self, restaurant: &Restaurant) -> StorageResult<()> {
        let txn = self.begin_write()?;
        store_txn(&txn, RESTAURANTS_TABLE, restaurant.id, restaurant)?;
        Self::commit(txn)
    }

    pub fn put_restaurant_txn(
        &self,
        txn: &WriteTransaction,
        restaurant: &Restaurant,
    ) -> StorageResult<()> {
        store_txn(txn, RESTAURANTS_TABLE, restaurant.id, restaurant)
    }

    pub fn get_restaurant(&self, id: i64) -> StorageResult<Option<Restaurant>> {
        load(self.db(), RESTAURANTS_TABLE, id)
    }

    pub fn get_restaurant_txn(
        &self,
        txn: &WriteTransaction,
        id: i64,
    ) -> StorageResult<Option<Restaurant>> {
        load_txn(txn, RESTAURANTS_TABLE, id)
    }

    pub fn put_menu_item(&self, item: &MenuItem) -> StorageResult<()> {
        let txn = self.begin_write()?;
        self.put_menu_item_txn(&txn, item)?;
        Self::commit(txn)
    }

    pub fn put_menu_item_txn(&self, txn: &WriteTransaction, item: &MenuItem) -> StorageResult<()> {
        store_txn(txn, MENU_ITEMS_TABLE, item.id, item)
    }

    pub fn get_menu_item_txn(
        &self,
        txn: &WriteTransaction,
        id: i64,
    ) -> StorageResult<Option<MenuItem>> {
        load_txn(txn, MENU_ITEMS_TABLE, id)
    }

    // ========== Addresses ==========

    pub fn put_address(&self, address: &Address) -> StorageResult<()> {
        let txn = self.begin_write()?;
        self.put_address_txn(&txn, address)?;
        Self::commit(txn)
    }

    pub fn put_address_txn(&self, txn: &WriteTransaction, address: &Address) -> StorageResult<()> {
        store_txn(txn, ADDRESSES_TABLE, address.id, address)
    }

    pub fn get_address(&self, id: i64) -> StorageResult<Option<Address>> {
        load(self.db(), ADDRESSES_TABLE, id)
    }

    pub fn get_address_txn(
        &self,
        txn: &WriteTransaction,
        id: i64,
    ) -> StorageResult<Option<Address>> {
        load_txn(txn, ADDRESSES_TABLE, id)
    }

    // ========== Coupons ==========

    pub fn put_coupon(&self, coupon: &Coupon) -> StorageResult<()> {
        let txn = self.begin_write()?;
        self.put_coupon_txn(&txn, coupon)?;
        Self::commit(txn)
    }

    pub fn put_coupon_txn(&self, txn: &WriteTransaction, coupon: &Coupon) -> StorageResult<()> {
        let code = Coupon::normalize_code(&coupon.code);
        let mut table = txn.open_table(COUPONS_TABLE)?;
        let bytes = serde_json::to_vec(coupon)?;
        table.insert(code.as_str(), bytes.as_slice())?;
        Ok(())
    }

    pub fn get_coupon(&self, code: &str) -> StorageResult<Option<Coupon>> {
        let code = Coupon::normalize_code(code);
        let read_txn = self.db().begin_read()?;
        let table = read_txn.open_table(COUPONS_TABLE)?;
        match table.get(code.as_str())? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_coupon_txn(
        &self,
        txn: &WriteTransaction,
        code: &str,
    ) -> StorageResult<Option<Coupon>> {
        let code = Coupon::normalize_code(code);
        let table = txn.open_table(COUPONS_TABLE)?;
        match table.get(code.as_str())? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// How many orders `user_id` placed with this coupon
    pub fn coupon_redemptions(&self, code: &str, user_id: i64) -> StorageResult<u32> {
        let code = Coupon::normalize_code(code);
        let read_txn = self.db().begin_read()?;
        let table = read_txn.open_table(COUPON_REDEMPTIONS_TABLE)?;
        Ok(table
            .get((code.as_str(), user_id))?
            .map(|g| g.value())
            .unwrap_or(0))
    }

    pub fn coupon_redemptions_txn(
        &self,
        txn: &WriteTransaction,
        code: &str,
        user_id: i64,
    ) -> StorageResult<u32> {
        let code = Coupon::normalize_code(code);
        let table = txn.open_table(COUPON_REDEMPTIONS_TABLE)?;
        Ok(table
            .get((code.as_str(), user_id))?
            .map(|g| g.value())
            .unwrap_or(0))
    }

    /// Increment both the global and the per-user usage counters
    pub fn redeem_coupon_txn(
        &self,
        txn: &WriteTransaction,
        code: &str,
        user_id: i64,
    ) -> StorageResult<Coupon> {
        let mut coupon = self
            .get_coupon_txn(txn, code)?
            .ok_or_else(|| StorageError::Missing(format!("coupon {code}")))?;
        coupon.usage_count += 1;
        self.put_coupon_txn(txn, &coupon)?;

        let normalized = Coupon::normalize_code(code);
        let mut table = txn.open_table(COUPON_REDEMPTIONS_TABLE)?;
        let current = table
            .get((normalized.as_str(), user_id))?
            .map(|g| g.value())
            .unwrap_or(0);
        table.insert((normalized.as_str(), user_id), current + 1)?;
        Ok(coupon)
    }
}
