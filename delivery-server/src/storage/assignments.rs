//! Pending shipper assignment repository
//!
//! Keyed by order id, so the table itself enforces at most one live
//! assignment per order.

use super::{ASSIGNMENTS_TABLE, Storage, StorageResult, decode, encode};
use redb::{ReadableTable, WriteTransaction};
use shared::models::PendingShipperAssignment;

#[derive(Debug, Clone)]
pub struct AssignmentRepository {
    storage: Storage,
}

impl AssignmentRepository {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn get(&self, order_id: i64) -> StorageResult<Option<PendingShipperAssignment>> {
        let read_txn = self.storage.begin_read()?;
        let table = read_txn.open_table(ASSIGNMENTS_TABLE)?;
        match table.get(order_id)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Every live assignment, unordered
    pub fn all(&self) -> StorageResult<Vec<PendingShipperAssignment>> {
        let read_txn = self.storage.begin_read()?;
        let table = read_txn.open_table(ASSIGNMENTS_TABLE)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (_key, value) = entry?;
            result.push(decode(value.value())?);
        }
        Ok(result)
    }

    pub fn get_txn(
        &self,
        txn: &WriteTransaction,
        order_id: i64,
    ) -> StorageResult<Option<PendingShipperAssignment>> {
        let table = txn.open_table(ASSIGNMENTS_TABLE)?;
        match table.get(order_id)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Insert or overwrite the assignment for its order
    pub fn put_txn(
        &self,
        txn: &WriteTransaction,
        assignment: &PendingShipperAssignment,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(ASSIGNMENTS_TABLE)?;
        let value = encode(assignment)?;
        table.insert(assignment.order_id, value.as_slice())?;
        Ok(())
    }

    /// Remove the assignment for an order; returns whether one existed
    pub fn remove_txn(&self, txn: &WriteTransaction, order_id: i64) -> StorageResult<bool> {
        let mut table = txn.open_table(ASSIGNMENTS_TABLE)?;
        Ok(table.remove(order_id)?.is_some())
    }
}
