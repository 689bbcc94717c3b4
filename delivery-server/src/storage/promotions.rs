//! Promotion repository
//!
//! Usage counters are only ever incremented inside a write transaction,
//! so concurrent redemptions of the same code cannot lose updates.

use super::{PROMOTION_CODES_TABLE, PROMOTIONS_TABLE, Storage, StorageResult, decode, encode};
use redb::{ReadableTable, WriteTransaction};
use shared::models::Promotion;

#[derive(Debug, Clone)]
pub struct PromotionRepository {
    storage: Storage,
}

/// Codes are matched case-insensitively
pub(crate) fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

impl PromotionRepository {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn upsert(&self, promotion: &Promotion) -> StorageResult<()> {
        let txn = self.storage.begin_write()?;
        {
            let mut table = txn.open_table(PROMOTIONS_TABLE)?;
            let value = encode(promotion)?;
            table.insert(promotion.id, value.as_slice())?;
            let mut codes = txn.open_table(PROMOTION_CODES_TABLE)?;
            codes.insert(normalize_code(&promotion.code).as_str(), promotion.id)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get(&self, id: i64) -> StorageResult<Option<Promotion>> {
        let read_txn = self.storage.begin_read()?;
        let table = read_txn.open_table(PROMOTIONS_TABLE)?;
        match table.get(id)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn find_by_code(&self, code: &str) -> StorageResult<Option<Promotion>> {
        let read_txn = self.storage.begin_read()?;
        let codes = read_txn.open_table(PROMOTION_CODES_TABLE)?;
        let Some(id) = codes.get(normalize_code(code).as_str())?.map(|g| g.value()) else {
            return Ok(None);
        };
        let table = read_txn.open_table(PROMOTIONS_TABLE)?;
        match table.get(id)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Fresh read of a code inside a write transaction
    pub fn find_by_code_txn(
        &self,
        txn: &WriteTransaction,
        code: &str,
    ) -> StorageResult<Option<Promotion>> {
        let codes = txn.open_table(PROMOTION_CODES_TABLE)?;
        let Some(id) = codes.get(normalize_code(code).as_str())?.map(|g| g.value()) else {
            return Ok(None);
        };
        let table = txn.open_table(PROMOTIONS_TABLE)?;
        match table.get(id)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Increment `number_of_used` and return the updated promotion
    pub fn increment_usage_txn(
        &self,
        txn: &WriteTransaction,
        promotion: &Promotion,
    ) -> StorageResult<Promotion> {
        let mut updated = promotion.clone();
        updated.number_of_used = updated.number_of_used.saturating_add(1);
        let mut table = txn.open_table(PROMOTIONS_TABLE)?;
        let value = encode(&updated)?;
        table.insert(updated.id, value.as_slice())?;
        Ok(updated)
    }
}
