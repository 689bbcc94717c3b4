//! Address repository with a creation-time index over temporary addresses

use super::{ADDRESSES_TABLE, Storage, StorageResult, TEMP_ADDRESSES_TABLE, decode, encode};
use redb::{ReadableTable, WriteTransaction};
use shared::models::Address;

#[derive(Debug, Clone)]
pub struct AddressRepository {
    storage: Storage,
}

impl AddressRepository {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn upsert(&self, address: &Address) -> StorageResult<()> {
        let txn = self.storage.begin_write()?;
        {
            let mut table = txn.open_table(ADDRESSES_TABLE)?;
            let previous: Option<Address> = match table.get(address.id)? {
                Some(guard) => Some(decode(guard.value())?),
                None => None,
            };
            let value = encode(address)?;
            table.insert(address.id, value.as_slice())?;

            let mut temp = txn.open_table(TEMP_ADDRESSES_TABLE)?;
            if let Some(prev) = previous
                && prev.is_temporary
            {
                temp.remove((prev.created_at, prev.id))?;
            }
            if address.is_temporary {
                temp.insert((address.created_at, address.id), ())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get(&self, address_id: i64) -> StorageResult<Option<Address>> {
        let read_txn = self.storage.begin_read()?;
        let table = read_txn.open_table(ADDRESSES_TABLE)?;
        match table.get(address_id)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Temporary addresses created strictly before `before`
    pub fn find_temporary_created_before(&self, before: i64) -> StorageResult<Vec<Address>> {
        let read_txn = self.storage.begin_read()?;
        let index = read_txn.open_table(TEMP_ADDRESSES_TABLE)?;
        let table = read_txn.open_table(ADDRESSES_TABLE)?;
        let mut result = Vec::new();
        for entry in index.range((i64::MIN, i64::MIN)..(before, i64::MIN))? {
            let (key, _) = entry?;
            let (_, id) = key.value();
            if let Some(guard) = table.get(id)? {
                result.push(decode(guard.value())?);
            }
        }
        Ok(result)
    }

    /// Delete a temporary address if it is still temporary and older than
    /// `before`; returns whether a row was removed
    pub fn delete_temporary_txn(
        &self,
        txn: &WriteTransaction,
        address_id: i64,
        before: i64,
    ) -> StorageResult<bool> {
        let mut table = txn.open_table(ADDRESSES_TABLE)?;
        let current: Option<Address> = match table.get(address_id)? {
            Some(guard) => Some(decode(guard.value())?),
            None => None,
        };
        let Some(address) = current else {
            return Ok(false);
        };
        if !address.is_temporary || address.created_at >= before {
            return Ok(false);
        }
        table.remove(address_id)?;
        let mut index = txn.open_table(TEMP_ADDRESSES_TABLE)?;
        index.remove((address.created_at, address.id))?;
        Ok(true)
    }
}
