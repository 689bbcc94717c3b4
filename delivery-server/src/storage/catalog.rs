//! Catalog repository (users, restaurants, foods, toppings)
//!
//! The order subsystem only reads these; the upserts exist for seeding and
//! for the catalog owners outside this crate.

use super::{
    FOODS_TABLE, RESTAURANTS_TABLE, Storage, StorageResult, TOPPINGS_BY_FOOD_TABLE, TOPPINGS_TABLE,
    USERS_TABLE, decode, encode,
};
use redb::{ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::models::{Food, Restaurant, Topping, User};

#[derive(Debug, Clone)]
pub struct CatalogRepository {
    storage: Storage,
}

impl CatalogRepository {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    fn get_entity<T: DeserializeOwned>(
        &self,
        def: TableDefinition<'static, i64, &'static [u8]>,
        id: i64,
    ) -> StorageResult<Option<T>> {
        let read_txn = self.storage.begin_read()?;
        let table = read_txn.open_table(def)?;
        match table.get(id)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    fn put_entity<T: Serialize>(
        &self,
        def: TableDefinition<'static, i64, &'static [u8]>,
        id: i64,
        entity: &T,
    ) -> StorageResult<()> {
        let txn = self.storage.begin_write()?;
        {
            let mut table = txn.open_table(def)?;
            let value = encode(entity)?;
            table.insert(id, value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_user(&self, id: i64) -> StorageResult<Option<User>> {
        self.get_entity(USERS_TABLE, id)
    }

    pub fn get_restaurant(&self, id: i64) -> StorageResult<Option<Restaurant>> {
        self.get_entity(RESTAURANTS_TABLE, id)
    }

    pub fn get_food(&self, id: i64) -> StorageResult<Option<Food>> {
        self.get_entity(FOODS_TABLE, id)
    }

    pub fn get_topping(&self, id: i64) -> StorageResult<Option<Topping>> {
        self.get_entity(TOPPINGS_TABLE, id)
    }

    /// Toppings that belong to a food
    pub fn toppings_for_food(&self, food_id: i64) -> StorageResult<Vec<Topping>> {
        let read_txn = self.storage.begin_read()?;
        let index = read_txn.open_table(TOPPINGS_BY_FOOD_TABLE)?;
        let table = read_txn.open_table(TOPPINGS_TABLE)?;
        let mut result = Vec::new();
        for entry in index.range((food_id, i64::MIN)..=(food_id, i64::MAX))? {
            let (key, _) = entry?;
            if let Some(guard) = table.get(key.value().1)? {
                result.push(decode(guard.value())?);
            }
        }
        Ok(result)
    }

    pub fn upsert_user(&self, user: &User) -> StorageResult<()> {
        self.put_entity(USERS_TABLE, user.id, user)
    }

    pub fn upsert_restaurant(&self, restaurant: &Restaurant) -> StorageResult<()> {
        self.put_entity(RESTAURANTS_TABLE, restaurant.id, restaurant)
    }

    pub fn upsert_food(&self, food: &Food) -> StorageResult<()> {
        self.put_entity(FOODS_TABLE, food.id, food)
    }

    pub fn upsert_topping(&self, topping: &Topping) -> StorageResult<()> {
        let txn = self.storage.begin_write()?;
        {
            let mut table = txn.open_table(TOPPINGS_TABLE)?;
            if let Some(guard) = table.get(topping.id)? {
                let previous: Topping = decode(guard.value())?;
                drop(guard);
                let mut index = txn.open_table(TOPPINGS_BY_FOOD_TABLE)?;
                index.remove((previous.food_id, previous.id))?;
            }
            let value = encode(topping)?;
            table.insert(topping.id, value.as_slice())?;
            let mut index = txn.open_table(TOPPINGS_BY_FOOD_TABLE)?;
            index.insert((topping.food_id, topping.id), ())?;
        }
        txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topping(id: i64, food_id: i64) -> Topping {
        Topping {
            id,
            food_id,
            name: format!("Topping {id}"),
            price: 5_000.0,
            is_available: true,
        }
    }

    #[test]
    fn test_toppings_follow_their_food() {
        let repo = CatalogRepository::new(Storage::open_in_memory().unwrap());
        repo.upsert_topping(&topping(1, 10)).unwrap();
        repo.upsert_topping(&topping(2, 10)).unwrap();
        repo.upsert_topping(&topping(3, 11)).unwrap();

        let ids: Vec<i64> = repo.toppings_for_food(10).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2]);

        // Moving a topping to another food updates the index
        repo.upsert_topping(&topping(2, 11)).unwrap();
        let ids: Vec<i64> = repo.toppings_for_food(11).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(repo.toppings_for_food(10).unwrap().len(), 1);
    }

    #[test]
    fn test_entities_roundtrip() {
        let repo = CatalogRepository::new(Storage::open_in_memory().unwrap());
        let food = Food {
            id: 5,
            restaurant_id: 1,
            name: "Bun Bo".into(),
            price: 50_000.0,
            discount_percent: 10.0,
            is_available: true,
        };
        repo.upsert_food(&food).unwrap();
        assert_eq!(repo.get_food(5).unwrap(), Some(food));
        assert!(repo.get_user(5).unwrap().is_none());
    }
}
