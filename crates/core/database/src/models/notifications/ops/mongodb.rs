use ::mongodb::options::FindOptions;
use bson::to_bson;
use quad_result::Result;

use crate::MongoDb;
use crate::{Notification, NotificationFilter};

use super::AbstractNotifications;

static COL: &str = "notifications";

#[async_trait]
impl AbstractNotifications for MongoDb {
    /// Insert a new notification into the database
    async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        query!(self, insert_one, COL, &notification).map(|_| ())
    }

    /// Fetch a notification by its id
    async fn fetch_notification(&self, id: &str) -> Result<Notification> {
        query!(self, find_one_by_id, COL, id)?.ok_or_else(|| create_error!(NotFound))
    }

    /// Fetch a user's notifications, newest first
    async fn fetch_notifications(
        &self,
        user_id: &str,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>> {
        let mut query = doc! {
            "userId": user_id
        };

        if let Some(kind) = &filter.kind {
            query.insert(
                "type",
                to_bson(kind).map_err(|_| create_database_error!("to_bson", "type"))?,
            );
        }

        if filter.unread_only {
            query.insert("isRead", doc! { "$ne": true });
        }

        query!(
            self,
            find_with_options,
            COL,
            query,
            FindOptions::builder()
                .sort(doc! {
                    "createdAt": -1,
                    "_id": -1
                })
                .build()
        )
    }

    /// Flip a single notification to read
    async fn mark_notification_read(&self, id: &str) -> Result<()> {
        self.col::<Notification>(COL)
            .update_one(
                doc! {
                    "_id": id
                },
                doc! {
                    "$set": {
                        "isRead": true
                    }
                },
            )
            .await
            .map(|_| ())
            .map_err(|_| create_database_error!("update_one", COL))
    }

    /// Flip all of a user's notifications to read, returning how many changed
    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64> {
        self.col::<Notification>(COL)
            .update_many(
                doc! {
                    "userId": user_id,
                    "isRead": {
                        "$ne": true
                    }
                },
                doc! {
                    "$set": {
                        "isRead": true
                    }
                },
            )
            .await
            .map(|result| result.modified_count)
            .map_err(|_| create_database_error!("update_many", COL))
    }

    /// Count a user's unread notifications
    async fn count_unread_notifications(&self, user_id: &str) -> Result<u64> {
        query!(
            self,
            count_documents,
            COL,
            doc! {
                "userId": user_id,
                "isRead": {
                    "$ne": true
                }
            }
        )
    }

    /// Delete a notification from the database
    async fn delete_notification(&self, id: &str) -> Result<()> {
        query!(self, delete_one_by_id, COL, id).map(|_| ())
    }
}
