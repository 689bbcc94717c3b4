//! Order aggregate repository (orders, details, shipping details, status index)

use super::{
    ORDER_DETAILS_TABLE, ORDERS_BY_STATUS_TABLE, ORDERS_TABLE, SHIPPING_DETAILS_TABLE, Storage,
    StorageResult, allocate_id_txn, decode, encode, insert_new,
};
use redb::{ReadableTable, WriteTransaction};
use shared::models::{Order, OrderDetail, OrderStatus, OrderWithDetails, ShippingDetail};

#[derive(Debug, Clone)]
pub struct OrderRepository {
    storage: Storage,
}

impl OrderRepository {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    // ========== Reads ==========

    pub fn get(&self, order_id: i64) -> StorageResult<Option<Order>> {
        let read_txn = self.storage.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Details of an order in line order
    pub fn details(&self, order_id: i64) -> StorageResult<Vec<OrderDetail>> {
        let read_txn = self.storage.begin_read()?;
        let table = read_txn.open_table(ORDER_DETAILS_TABLE)?;
        let mut details = Vec::new();
        for result in table.range((order_id, 0u32)..=(order_id, u32::MAX))? {
            let (_key, value) = result?;
            details.push(decode(value.value())?);
        }
        Ok(details)
    }

    pub fn get_with_details(&self, order_id: i64) -> StorageResult<Option<OrderWithDetails>> {
        let Some(order) = self.get(order_id)? else {
            return Ok(None);
        };
        let details = self.details(order_id)?;
        let shipping = self.get_shipping(order_id)?;
        Ok(Some(OrderWithDetails {
            order,
            details,
            shipping,
        }))
    }

    pub fn get_shipping(&self, order_id: i64) -> StorageResult<Option<ShippingDetail>> {
        let read_txn = self.storage.begin_read()?;
        let table = read_txn.open_table(SHIPPING_DETAILS_TABLE)?;
        match table.get(order_id)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Orders in `status`, oldest first
    pub fn list_by_status(&self, status: OrderStatus) -> StorageResult<Vec<Order>> {
        self.find_by_status_created_before(status, i64::MAX)
    }

    /// Orders in `status` created strictly before `before`, oldest first
    pub fn find_by_status_created_before(
        &self,
        status: OrderStatus,
        before: i64,
    ) -> StorageResult<Vec<Order>> {
        let read_txn = self.storage.begin_read()?;
        let index = read_txn.open_table(ORDERS_BY_STATUS_TABLE)?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;

        let key = status.as_str();
        let mut result = Vec::new();
        for entry in index.range((key, i64::MIN, i64::MIN)..(key, before, i64::MIN))? {
            let (k, _) = entry?;
            let (_, _, order_id) = k.value();
            if let Some(guard) = orders.get(order_id)? {
                result.push(decode(guard.value())?);
            }
        }
        Ok(result)
    }

    pub fn count(&self) -> StorageResult<u64> {
        use redb::ReadableTableMetadata;
        let read_txn = self.storage.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        Ok(table.len()?)
    }

    // ========== Transactional ==========

    /// Fresh read inside a write transaction (read-modify-write point)
    pub fn get_txn(&self, txn: &WriteTransaction, order_id: i64) -> StorageResult<Option<Order>> {
        let table = txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_shipping_txn(
        &self,
        txn: &WriteTransaction,
        order_id: i64,
    ) -> StorageResult<Option<ShippingDetail>> {
        let table = txn.open_table(SHIPPING_DETAILS_TABLE)?;
        match table.get(order_id)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Draw an order id that no stored order uses yet
    pub fn next_id_txn(&self, txn: &WriteTransaction) -> StorageResult<i64> {
        allocate_id_txn(txn, ORDERS_TABLE)
    }

    /// Insert a new order together with all of its detail rows
    ///
    /// Fails with `DuplicateKey` if the id is taken; the caller's
    /// transaction must then be dropped.
    pub fn insert_txn(
        &self,
        txn: &WriteTransaction,
        order: &Order,
        details: &[OrderDetail],
    ) -> StorageResult<()> {
        {
            let mut table = txn.open_table(ORDERS_TABLE)?;
            let value = encode(order)?;
            insert_new(&mut table, "orders", order.id, &value)?;
        }
        {
            let mut table = txn.open_table(ORDER_DETAILS_TABLE)?;
            for detail in details {
                let value = encode(detail)?;
                table.insert((order.id, detail.line_no), value.as_slice())?;
            }
        }
        let mut index = txn.open_table(ORDERS_BY_STATUS_TABLE)?;
        index.insert((order.status.as_str(), order.created_at, order.id), ())?;
        Ok(())
    }

    /// Persist an updated order row, moving its status index entry
    pub fn update_txn(
        &self,
        txn: &WriteTransaction,
        previous_status: OrderStatus,
        order: &Order,
    ) -> StorageResult<()> {
        {
            let mut table = txn.open_table(ORDERS_TABLE)?;
            let value = encode(order)?;
            table.insert(order.id, value.as_slice())?;
        }
        if previous_status != order.status {
            let mut index = txn.open_table(ORDERS_BY_STATUS_TABLE)?;
            index.remove((previous_status.as_str(), order.created_at, order.id))?;
            index.insert((order.status.as_str(), order.created_at, order.id), ())?;
        }
        Ok(())
    }

    pub fn insert_shipping_txn(
        &self,
        txn: &WriteTransaction,
        shipping: &ShippingDetail,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(SHIPPING_DETAILS_TABLE)?;
        let value = encode(shipping)?;
        table.insert(shipping.order_id, value.as_slice())?;
        Ok(())
    }

    /// Remove an order, its details, shipping detail and index entry
    pub fn delete_txn(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        {
            let mut table = txn.open_table(ORDERS_TABLE)?;
            table.remove(order.id)?;
        }
        {
            let mut table = txn.open_table(ORDER_DETAILS_TABLE)?;
            let keys: Vec<(i64, u32)> = table
                .range((order.id, 0u32)..=(order.id, u32::MAX))?
                .map(|r| r.map(|(k, _)| k.value()))
                .collect::<Result<_, _>>()?;
            for key in keys {
                table.remove(key)?;
            }
        }
        {
            let mut table = txn.open_table(SHIPPING_DETAILS_TABLE)?;
            table.remove(order.id)?;
        }
        let mut index = txn.open_table(ORDERS_BY_STATUS_TABLE)?;
        index.remove((order.status.as_str(), order.created_at, order.id))?;
        Ok(())
    }
}
