use quad_result::Result;

use crate::ReferenceDb;
use crate::{Notification, NotificationFilter};

use super::AbstractNotifications;

#[async_trait]
impl AbstractNotifications for ReferenceDb {
    /// Insert a new notification into the database
    async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        let mut notifications = self.notifications.lock().await;
        if notifications.contains_key(&notification.id) {
            Err(create_database_error!("insert", "notifications"))
        } else {
            notifications.insert(notification.id.to_string(), notification.clone());
            Ok(())
        }
    }

    /// Fetch a notification by its id
    async fn fetch_notification(&self, id: &str) -> Result<Notification> {
        let notifications = self.notifications.lock().await;
        notifications
            .get(id)
            .cloned()
            .ok_or_else(|| create_error!(NotFound))
    }

    /// Fetch a user's notifications, newest first
    async fn fetch_notifications(
        &self,
        user_id: &str,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>> {
        let notifications = self.notifications.lock().await;
        let mut notifications: Vec<Notification> = notifications
            .values()
            .filter(|notification| notification.user_id == user_id)
            .filter(|notification| match &filter.kind {
                Some(kind) => &notification.kind == kind,
                None => true,
            })
            .filter(|notification| !filter.unread_only || !notification.is_read)
            .cloned()
            .collect();

        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    /// Flip a single notification to read
    async fn mark_notification_read(&self, id: &str) -> Result<()> {
        let mut notifications = self.notifications.lock().await;
        let notification = notifications
            .get_mut(id)
            .ok_or_else(|| create_error!(NotFound))?;

        notification.is_read = true;
        Ok(())
    }

    /// Flip all of a user's notifications to read, returning how many changed
    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64> {
        let mut notifications = self.notifications.lock().await;
        let mut count = 0;

        for notification in notifications.values_mut() {
            if notification.user_id == user_id && !notification.is_read {
                notification.is_read = true;
                count += 1;
            }
        }

        Ok(count)
    }

    /// Count a user's unread notifications
    async fn count_unread_notifications(&self, user_id: &str) -> Result<u64> {
        let notifications = self.notifications.lock().await;
        Ok(notifications
            .values()
            .filter(|notification| notification.user_id == user_id && !notification.is_read)
            .count() as u64)
    }

    /// Delete a notification from the database
    async fn delete_notification(&self, id: &str) -> Result<()> {
        let mut notifications = self.notifications.lock().await;
        notifications
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| create_error!(NotFound))
    }
}
