//! Payments, ratings and the notification inbox

use redb::{ReadableDatabase, ReadableTable, WriteTransaction};
use shared::models::Notification;
use shared::order::{Rating, RatingKind};
use shared::payment::Payment;

use super::*;

impl Storage {
    // ========== Payments ==========

    /// Persist a payment, indexing it by order and by gateway reference
    pub fn put_payment_txn(&self, txn: &WriteTransaction, payment: &Payment) -> StorageResult<()> {
        {
            let mut by_order = txn.open_table(ORDER_PAYMENTS_TABLE)?;
            by_order.insert((payment.order_id, payment.id), ())?;
        }
        if let Some(reference) = payment.transaction_reference.as_deref() {
            let mut references = txn.open_table(PAYMENT_REFERENCES_TABLE)?;
            references.insert(reference, payment.id)?;
        }
        store_txn(txn, PAYMENTS_TABLE, payment.id, payment)
    }

    pub fn get_payment(&self, id: i64) -> StorageResult<Option<Payment>> {
        load(self.db(), PAYMENTS_TABLE, id)
    }

    pub fn get_payment_txn(&self, txn: &WriteTransaction, id: i64) -> StorageResult<Option<Payment>> {
        load_txn(txn, PAYMENTS_TABLE, id)
    }

    pub fn payment_by_reference_txn(
        &self,
        txn: &WriteTransaction,
        reference: &str,
    ) -> StorageResult<Option<Payment>> {
        let id = {
            let references = txn.open_table(PAYMENT_REFERENCES_TABLE)?;
            references.get(reference)?.map(|g| g.value())
        };
        match id {
            Some(id) => self.get_payment_txn(txn, id),
            None => Ok(None),
        }
    }

    /// All payment attempts of an order, newest first
    pub fn payments_for_order(&self, order_id: i64) -> StorageResult<Vec<Payment>> {
        let read_txn = self.db().begin_read()?;
        let index = read_txn.open_table(ORDER_PAYMENTS_TABLE)?;
        let payments = read_txn.open_table(PAYMENTS_TABLE)?;

        let mut result = Vec::new();
        for id in index_ids(&index, order_id)? {
            if let Some(payment) = get_json(&payments, id)? {
                result.push(payment);
            }
        }
        Ok(result)
    }

    // ========== Ratings ==========

    pub fn rating_exists_txn(
        &self,
        txn: &WriteTransaction,
        order_id: i64,
        user_id: i64,
        kind: RatingKind,
    ) -> StorageResult<bool> {
        let table = txn.open_table(RATINGS_TABLE)?;
        Ok(table.get((order_id, user_id, kind.as_str()))?.is_some())
    }

    pub fn insert_rating_txn(&self, txn: &WriteTransaction, rating: &Rating) -> StorageResult<()> {
        let key = (rating.order_id, rating.user_id, rating.kind.as_str());
        let mut table = txn.open_table(RATINGS_TABLE)?;
        if table.get(key)?.is_some() {
            return Err(StorageError::Duplicate(format!(
                "{} rating for order {}",
                rating.kind.as_str(),
                rating.order_id
            )));
        }
        let bytes = serde_json::to_vec(rating)?;
        table.insert(key, bytes.as_slice())?;
        Ok(())
    }

    // ========== Notifications ==========

    pub fn insert_notification(&self, notification: &Notification) -> StorageResult<()> {
        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(NOTIFICATIONS_TABLE)?;
            let bytes = serde_json::to_vec(notification)?;
            table.insert((notification.user_id, notification.id), bytes.as_slice())?;
        }
        Self::commit(txn)
    }

    /// Inbox of a user, newest first
    pub fn list_notifications(&self, user_id: i64, limit: usize) -> StorageResult<Vec<Notification>> {
        let read_txn = self.db().begin_read()?;
        let table = read_txn.open_table(NOTIFICATIONS_TABLE)?;
        let mut result = Vec::new();
        for entry in table
            .range((user_id, i64::MIN)..=(user_id, i64::MAX))?
            .rev()
            .take(limit)
        {
            let (_, value) = entry?;
            result.push(decode(value.value())?);
        }
        Ok(result)
    }

    /// Mark one notification as read. Returns false if it does not exist.
    pub fn mark_notification_read(&self, user_id: i64, id: i64, now: i64) -> StorageResult<bool> {
        let txn = self.begin_write()?;
        let found = {
            let mut table = txn.open_table(NOTIFICATIONS_TABLE)?;
            let existing: Option<Notification> = match table.get((user_id, id))? {
                Some(value) => Some(decode(value.value())?),
                None => None,
            };
            match existing {
                Some(mut notification) => {
                    if notification.read_at.is_none() {
                        notification.read_at = Some(now);
                        let bytes = serde_json::to_vec(&notification)?;
                        table.insert((user_id, id), bytes.as_slice())?;
                    }
                    true
                }
                None => false,
            }
        };
        Self::commit(txn)?;
        Ok(found)
    }

    /// Mark every unread notification of a user as read, returning how many changed
    pub fn mark_all_read(&self, user_id: i64, now: i64) -> StorageResult<usize> {
        let txn = self.begin_write()?;
        let changed = {
            let mut table = txn.open_table(NOTIFICATIONS_TABLE)?;
            let mut unread: Vec<Notification> = Vec::new();
            for entry in table.range((user_id, i64::MIN)..=(user_id, i64::MAX))? {
                let (_, value) = entry?;
                let notification: Notification = decode(value.value())?;
                if !notification.is_read() {
                    unread.push(notification);
                }
            }
            for notification in &mut unread {
                notification.read_at = Some(now);
                let bytes = serde_json::to_vec(&*notification)?;
                table.insert((user_id, notification.id), bytes.as_slice())?;
            }
            unread.len()
        };
        Self::commit(txn)?;
        Ok(changed)
    }
}
