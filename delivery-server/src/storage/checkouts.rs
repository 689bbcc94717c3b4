//! Checkout (payment session) repository

use super::{
    CHECKOUTS_BY_ORDER_TABLE, CHECKOUTS_TABLE, Storage, StorageResult, allocate_id_txn, decode,
    encode, insert_new,
};
use redb::{ReadableTable, WriteTransaction};
use shared::models::Checkout;

#[derive(Debug, Clone)]
pub struct CheckoutRepository {
    storage: Storage,
}

impl CheckoutRepository {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn get(&self, checkout_id: i64) -> StorageResult<Option<Checkout>> {
        let read_txn = self.storage.begin_read()?;
        let table = read_txn.open_table(CHECKOUTS_TABLE)?;
        match table.get(checkout_id)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn list_for_order(&self, order_id: i64) -> StorageResult<Vec<Checkout>> {
        let read_txn = self.storage.begin_read()?;
        let index = read_txn.open_table(CHECKOUTS_BY_ORDER_TABLE)?;
        let table = read_txn.open_table(CHECKOUTS_TABLE)?;
        let mut result = Vec::new();
        for entry in index.range((order_id, i64::MIN)..=(order_id, i64::MAX))? {
            let (key, _) = entry?;
            let (_, checkout_id) = key.value();
            if let Some(guard) = table.get(checkout_id)? {
                result.push(decode(guard.value())?);
            }
        }
        Ok(result)
    }

    pub fn get_txn(
        &self,
        txn: &WriteTransaction,
        checkout_id: i64,
    ) -> StorageResult<Option<Checkout>> {
        let table = txn.open_table(CHECKOUTS_TABLE)?;
        match table.get(checkout_id)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn list_for_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: i64,
    ) -> StorageResult<Vec<Checkout>> {
        let ids: Vec<i64> = {
            let index = txn.open_table(CHECKOUTS_BY_ORDER_TABLE)?;
            index
                .range((order_id, i64::MIN)..=(order_id, i64::MAX))?
                .map(|r| r.map(|(k, _)| k.value().1))
                .collect::<Result<_, _>>()?
        };
        let table = txn.open_table(CHECKOUTS_TABLE)?;
        let mut result = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(guard) = table.get(id)? {
                result.push(decode(guard.value())?);
            }
        }
        Ok(result)
    }

    /// Draw a checkout id that no stored checkout uses yet
    pub fn next_id_txn(&self, txn: &WriteTransaction) -> StorageResult<i64> {
        allocate_id_txn(txn, CHECKOUTS_TABLE)
    }

    /// Insert a new checkout; fails with `DuplicateKey` if the id is taken
    pub fn insert_txn(&self, txn: &WriteTransaction, checkout: &Checkout) -> StorageResult<()> {
        {
            let mut table = txn.open_table(CHECKOUTS_TABLE)?;
            let value = encode(checkout)?;
            insert_new(&mut table, "checkouts", checkout.id, &value)?;
        }
        let mut index = txn.open_table(CHECKOUTS_BY_ORDER_TABLE)?;
        index.insert((checkout.order_id, checkout.id), ())?;
        Ok(())
    }

    /// Overwrite an existing checkout row
    pub fn put_txn(&self, txn: &WriteTransaction, checkout: &Checkout) -> StorageResult<()> {
        {
            let mut table = txn.open_table(CHECKOUTS_TABLE)?;
            let value = encode(checkout)?;
            table.insert(checkout.id, value.as_slice())?;
        }
        let mut index = txn.open_table(CHECKOUTS_BY_ORDER_TABLE)?;
        index.insert((checkout.order_id, checkout.id), ())?;
        Ok(())
    }

    pub fn put(&self, checkout: &Checkout) -> StorageResult<()> {
        let txn = self.storage.begin_write()?;
        self.put_txn(&txn, checkout)?;
        txn.commit()?;
        Ok(())
    }

    /// Remove every checkout of an order; returns how many were removed
    pub fn delete_for_order_txn(&self, txn: &WriteTransaction, order_id: i64) -> StorageResult<usize> {
        let keys: Vec<(i64, i64)> = {
            let index = txn.open_table(CHECKOUTS_BY_ORDER_TABLE)?;
            index
                .range((order_id, i64::MIN)..=(order_id, i64::MAX))?
                .map(|r| r.map(|(k, _)| k.value()))
                .collect::<Result<_, _>>()?
        };
        let mut index = txn.open_table(CHECKOUTS_BY_ORDER_TABLE)?;
        let mut table = txn.open_table(CHECKOUTS_TABLE)?;
        for key in &keys {
            index.remove(*key)?;
            table.remove(key.1)?;
        }
        Ok(keys.len())
    }
}
