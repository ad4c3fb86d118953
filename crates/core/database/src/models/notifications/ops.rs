use quad_result::Result;

use crate::{Notification, NotificationFilter};

#[cfg(feature = "mongodb")]
mod mongodb;
mod reference;

#[async_trait]
pub trait AbstractNotifications: Sync + Send {
    /// Insert a new notification into the database
    async fn insert_notification(&self, notification: &Notification) -> Result<()>;

    /// Fetch a notification by its id
    async fn fetch_notification(&self, id: &str) -> Result<Notification>;

    /// Fetch a user's notifications, newest first
    async fn fetch_notifications(
        &self,
        user_id: &str,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>>;

    /// Flip a single notification to read
    async fn mark_notification_read(&self, id: &str) -> Result<()>;

    /// Flip all of a user's notifications to read, returning how many changed
    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64>;

    /// Count a user's unread notifications
    async fn count_unread_notifications(&self, user_id: &str) -> Result<u64>;

    /// Delete a notification from the database
    async fn delete_notification(&self, id: &str) -> Result<()>;
}
