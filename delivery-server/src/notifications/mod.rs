//! User-facing notifications (best-effort)

use crate::storage::NotificationRepository;
use crate::utils::SharedClock;
use shared::models::{Notification, NotificationType};

#[derive(Debug, Clone)]
pub struct NotificationService {
    repo: NotificationRepository,
    clock: SharedClock,
}

impl NotificationService {
    pub fn new(repo: NotificationRepository, clock: SharedClock) -> Self {
        Self { repo, clock }
    }

    /// Persist a notification; failures are logged and swallowed
    pub fn notify(
        &self,
        user_id: i64,
        content: impl Into<String>,
        notification_type: NotificationType,
        order_id: Option<i64>,
    ) -> Option<Notification> {
        let notification = Notification {
            id: 0,
            user_id,
            content: content.into(),
            notification_type,
            order_id,
            is_read: false,
            created_at: self.clock.now_millis(),
        };
        match self.repo.create(notification) {
            Ok(notification) => Some(notification),
            Err(e) => {
                tracing::warn!(
                    user_id,
                    order_id = ?order_id,
                    error = %e,
                    "Failed to create notification"
                );
                None
            }
        }
    }

    pub fn list_for_user(&self, user_id: i64) -> Vec<Notification> {
        self.repo.list_for_user(user_id).unwrap_or_else(|e| {
            tracing::warn!(user_id, error = %e, "Failed to list notifications");
            Vec::new()
        })
    }

    pub fn mark_read(&self, notification_id: i64) -> bool {
        self.repo.mark_read(notification_id).unwrap_or_else(|e| {
            tracing::warn!(notification_id, error = %e, "Failed to mark notification read");
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use crate::utils::ManualClock;
    use std::sync::Arc;

    #[test]
    fn test_notify_and_read_back() {
        let storage = Storage::open_in_memory().unwrap();
        let service = NotificationService::new(
            NotificationRepository::new(storage),
            Arc::new(ManualClock::new(42)),
        );

        let created = service
            .notify(7, "Order #1 was confirmed", NotificationType::OrderStatus, Some(1))
            .unwrap();
        assert_eq!(created.created_at, 42);
        service.notify(8, "other user", NotificationType::OrderStatus, None);

        let inbox = service.list_for_user(7);
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].content, "Order #1 was confirmed");
        assert!(!inbox[0].is_read);

        assert!(service.mark_read(created.id));
        assert!(service.list_for_user(7)[0].is_read);
        assert!(!service.mark_read(-1));
    }
}
