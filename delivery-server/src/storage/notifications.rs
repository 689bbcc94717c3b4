//! Notification repository

use super::{
    NOTIFICATIONS_BY_USER_TABLE, NOTIFICATIONS_TABLE, Storage, StorageResult, allocate_id_txn,
    decode, encode, insert_new,
};
use redb::{ReadableTable, WriteTransaction};
use shared::models::Notification;

#[derive(Debug, Clone)]
pub struct NotificationRepository {
    storage: Storage,
}

impl NotificationRepository {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Store a new notification under a freshly drawn id
    pub fn create(&self, mut notification: Notification) -> StorageResult<Notification> {
        let txn = self.storage.begin_write()?;
        notification.id = allocate_id_txn(&txn, NOTIFICATIONS_TABLE)?;
        self.insert_txn(&txn, &notification)?;
        txn.commit()?;
        Ok(notification)
    }

    pub fn insert_txn(
        &self,
        txn: &WriteTransaction,
        notification: &Notification,
    ) -> StorageResult<()> {
        {
            let mut table = txn.open_table(NOTIFICATIONS_TABLE)?;
            let value = encode(notification)?;
            insert_new(&mut table, "notifications", notification.id, &value)?;
        }
        let mut index = txn.open_table(NOTIFICATIONS_BY_USER_TABLE)?;
        index.insert((notification.user_id, notification.id), ())?;
        Ok(())
    }

    /// A user's notifications, oldest first
    pub fn list_for_user(&self, user_id: i64) -> StorageResult<Vec<Notification>> {
        let read_txn = self.storage.begin_read()?;
        let index = read_txn.open_table(NOTIFICATIONS_BY_USER_TABLE)?;
        let table = read_txn.open_table(NOTIFICATIONS_TABLE)?;
        let mut result: Vec<Notification> = Vec::new();
        for entry in index.range((user_id, i64::MIN)..=(user_id, i64::MAX))? {
            let (key, _) = entry?;
            if let Some(guard) = table.get(key.value().1)? {
                result.push(decode(guard.value())?);
            }
        }
        result.sort_by_key(|n| (n.created_at, n.id));
        Ok(result)
    }

    /// Mark one notification read; returns false if it does not exist
    pub fn mark_read(&self, notification_id: i64) -> StorageResult<bool> {
        let txn = self.storage.begin_write()?;
        let found = {
            let mut table = txn.open_table(NOTIFICATIONS_TABLE)?;
            let current: Option<Notification> = match table.get(notification_id)? {
                Some(guard) => Some(decode(guard.value())?),
                None => None,
            };
            match current {
                Some(mut n) => {
                    n.is_read = true;
                    let value = encode(&n)?;
                    table.insert(notification_id, value.as_slice())?;
                    true
                }
                None => false,
            }
        };
        txn.commit()?;
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use shared::models::NotificationType;

    fn sample(id: i64, user_id: i64, content: &str) -> Notification {
        Notification {
            id,
            user_id,
            content: content.into(),
            notification_type: NotificationType::OrderStatus,
            order_id: None,
            is_read: false,
            created_at: 1_000,
        }
    }

    #[test]
    fn test_insert_refuses_taken_id() {
        let repo = NotificationRepository::new(Storage::open_in_memory().unwrap());
        let txn = repo.storage.begin_write().unwrap();
        repo.insert_txn(&txn, &sample(9, 1, "first")).unwrap();
        txn.commit().unwrap();

        let txn = repo.storage.begin_write().unwrap();
        let err = repo.insert_txn(&txn, &sample(9, 2, "second")).unwrap_err();
        assert!(matches!(err, StorageError::DuplicateKey { id: 9, .. }));
        drop(txn);

        assert_eq!(repo.list_for_user(1).unwrap()[0].content, "first");
        assert!(repo.list_for_user(2).unwrap().is_empty());
    }

    #[test]
    fn test_create_draws_distinct_ids() {
        let repo = NotificationRepository::new(Storage::open_in_memory().unwrap());
        let a = repo.create(sample(0, 1, "a")).unwrap();
        let b = repo.create(sample(0, 1, "b")).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(repo.list_for_user(1).unwrap().len(), 2);
    }
}
