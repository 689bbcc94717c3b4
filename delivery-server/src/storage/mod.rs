//! redb-based persistence for the order subsystem
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` | Order root rows |
//! | `order_details` | `(order_id, line_no)` | `OrderDetail` | Immutable line items |
//! | `orders_by_status` | `(status, created_at, order_id)` | `()` | Sweep index |
//! | `shipping_details` | `order_id` | `ShippingDetail` | Durable shipper assignment |
//! | `pending_assignments` | `order_id` | `PendingShipperAssignment` | Shipper queue (one per order) |
//! | `promotions` | `promotion_id` | `Promotion` | Promotion codes |
//! | `promotion_codes` | `CODE` | `promotion_id` | Case-insensitive code lookup |
//! | `checkouts` | `checkout_id` | `Checkout` | Payment sessions |
//! | `checkouts_by_order` | `(order_id, checkout_id)` | `()` | Checkout lookup |
//! | `addresses` | `address_id` | `Address` | Delivery / pickup addresses |
//! | `addresses_temporary` | `(created_at, address_id)` | `()` | GC index |
//! | `users`, `restaurants`, `foods`, `toppings` | id | entity | Catalog |
//! | `toppings_by_food` | `(food_id, topping_id)` | `()` | Topping lookup |
//! | `notifications` | `notification_id` | `Notification` | User notifications |
//! | `notifications_by_user` | `(user_id, notification_id)` | `()` | Inbox lookup |
//!
//! # Concurrency
//!
//! redb admits one write transaction at a time. Every read-modify-write
//! (status transitions, promotion usage increments, queue updates) runs
//! inside a write transaction, which makes it the serialization point.
//! Never hold a write transaction across an `.await`.

mod addresses;
mod assignments;
mod catalog;
mod checkouts;
mod notifications;
mod orders;
mod promotions;

pub use addresses::AddressRepository;
pub use assignments::AssignmentRepository;
pub use catalog::CatalogRepository;
pub use checkouts::CheckoutRepository;
pub use notifications::NotificationRepository;
pub use orders::OrderRepository;
pub use promotions::PromotionRepository;

#[cfg(test)]
pub(crate) use orders::tests as orders_tests;

use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition, TableHandle,
    WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub(crate) const ORDERS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("orders");
pub(crate) const ORDER_DETAILS_TABLE: TableDefinition<(i64, u32), &[u8]> =
    TableDefinition::new("order_details");
pub(crate) const ORDERS_BY_STATUS_TABLE: TableDefinition<(&str, i64, i64), ()> =
    TableDefinition::new("orders_by_status");
pub(crate) const SHIPPING_DETAILS_TABLE: TableDefinition<i64, &[u8]> =
    TableDefinition::new("shipping_details");
pub(crate) const ASSIGNMENTS_TABLE: TableDefinition<i64, &[u8]> =
    TableDefinition::new("pending_assignments");
pub(crate) const PROMOTIONS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("promotions");
pub(crate) const PROMOTION_CODES_TABLE: TableDefinition<&str, i64> =
    TableDefinition::new("promotion_codes");
pub(crate) const CHECKOUTS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("checkouts");
pub(crate) const CHECKOUTS_BY_ORDER_TABLE: TableDefinition<(i64, i64), ()> =
    TableDefinition::new("checkouts_by_order");
pub(crate) const ADDRESSES_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("addresses");
pub(crate) const TEMP_ADDRESSES_TABLE: TableDefinition<(i64, i64), ()> =
    TableDefinition::new("addresses_temporary");
pub(crate) const USERS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("users");
pub(crate) const RESTAURANTS_TABLE: TableDefinition<i64, &[u8]> =
    TableDefinition::new("restaurants");
pub(crate) const FOODS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("foods");
pub(crate) const TOPPINGS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("toppings");
pub(crate) const TOPPINGS_BY_FOOD_TABLE: TableDefinition<(i64, i64), ()> =
    TableDefinition::new("toppings_by_food");
pub(crate) const NOTIFICATIONS_TABLE: TableDefinition<i64, &[u8]> =
    TableDefinition::new("notifications");
pub(crate) const NOTIFICATIONS_BY_USER_TABLE: TableDefinition<(i64, i64), ()> =
    TableDefinition::new("notifications_by_user");

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

    #[error("Row {id} already exists in {table}")]
    DuplicateKey { table: String, id: i64 },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Shared handle to the embedded database
///
/// Cheap to clone; repositories each hold a clone.
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
    /// redb commits with `Durability::Immediate` by default: once `commit()`
    /// returns the write is on disk, and a crash never exposes a partial
    /// order.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            // Create all tables if they don't exist
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(ORDER_DETAILS_TABLE)?;
            let _ = write_txn.open_table(ORDERS_BY_STATUS_TABLE)?;
            let _ = write_txn.open_table(SHIPPING_DETAILS_TABLE)?;
            let _ = write_txn.open_table(ASSIGNMENTS_TABLE)?;
            let _ = write_txn.open_table(PROMOTIONS_TABLE)?;
            let _ = write_txn.open_table(PROMOTION_CODES_TABLE)?;
            let _ = write_txn.open_table(CHECKOUTS_TABLE)?;
            let _ = write_txn.open_table(CHECKOUTS_BY_ORDER_TABLE)?;
            let _ = write_txn.open_table(ADDRESSES_TABLE)?;
            let _ = write_txn.open_table(TEMP_ADDRESSES_TABLE)?;
            let _ = write_txn.open_table(USERS_TABLE)?;
            let _ = write_txn.open_table(RESTAURANTS_TABLE)?;
            let _ = write_txn.open_table(FOODS_TABLE)?;
            let _ = write_txn.open_table(TOPPINGS_TABLE)?;
            let _ = write_txn.open_table(TOPPINGS_BY_FOOD_TABLE)?;
            let _ = write_txn.open_table(NOTIFICATIONS_TABLE)?;
            let _ = write_txn.open_table(NOTIFICATIONS_BY_USER_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> StorageResult<ReadTransaction> {
        Ok(self.db.begin_read()?)
    }
}

/// Snowflake draws before giving up on a free id
const ID_ALLOCATION_ATTEMPTS: usize = 8;

/// Draw a snowflake id that is not yet a key of `definition`
///
/// Runs inside the caller's write transaction, so the id stays free until
/// that transaction commits.
pub(crate) fn allocate_id_txn(
    txn: &WriteTransaction,
    definition: TableDefinition<'_, i64, &'static [u8]>,
) -> StorageResult<i64> {
    let table = txn.open_table(definition)?;
    let mut id = shared::util::snowflake_id();
    for _ in 0..ID_ALLOCATION_ATTEMPTS {
        if table.get(id)?.is_none() {
            return Ok(id);
        }
        tracing::debug!(table = definition.name(), id, "Snowflake id collision, drawing again");
        id = shared::util::snowflake_id();
    }
    Err(StorageError::DuplicateKey {
        table: definition.name().to_string(),
        id,
    })
}

/// Insert a new row, refusing to overwrite an existing one
pub(crate) fn insert_new(
    table: &mut redb::Table<'_, i64, &'static [u8]>,
    table_name: &str,
    id: i64,
    value: &[u8],
) -> StorageResult<()> {
    if table.get(id)?.is_some() {
        return Err(StorageError::DuplicateKey {
            table: table_name.to_string(),
            id,
        });
    }
    table.insert(id, value)?;
    Ok(())
}

pub(crate) fn encode<T: Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}
