use std::collections::HashMap;

use iso8601_timestamp::Timestamp;
use quad_config::config;
use quad_result::Result;
use ulid::Ulid;

use crate::events::client::Event;
use crate::{Database, User};

auto_derived!(
    /// What caused a notification
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum NotificationKind {
        Comment,
        Reply,
        Like,
        NewFollower,
        NewPost,
        System,
        Announcement,
    }

    /// Entry in a user's notification inbox
    #[serde(rename_all = "camelCase")]
    pub struct Notification {
        /// Unique id
        #[serde(rename = "_id")]
        pub id: String,
        /// Id of the user this notification belongs to
        pub user_id: String,
        /// What caused this notification
        #[serde(rename = "type")]
        pub kind: NotificationKind,
        /// Id of the user who triggered it, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        pub sender_id: Option<String>,
        /// Human readable summary
        pub content: String,
        /// Id of the post, comment or conversation this refers to
        #[serde(skip_serializing_if = "Option::is_none")]
        pub related_id: Option<String>,
        /// Whether the user has seen this notification
        #[serde(skip_serializing_if = "crate::if_false", default)]
        pub is_read: bool,
        /// Time at which this notification was created
        pub created_at: Timestamp,
    }

    /// Inbox entry with private message notifications collapsed per conversation
    #[serde(rename_all = "camelCase")]
    pub struct NotificationGroup {
        #[serde(flatten)]
        pub notification: Notification,
        /// Number of notifications collapsed into this entry
        pub aggregated_count: u64,
        /// How many of those are unread
        pub aggregated_unread: u64,
    }
);

/// Query options for fetching notifications
#[derive(Debug, Default, Clone)]
pub struct NotificationFilter {
    pub kind: Option<NotificationKind>,
    pub unread_only: bool,
}

/// Shorten text to at most `limit` characters, appending an ellipsis if cut
pub fn truncate_preview(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let mut preview: String = text.chars().take(limit).collect();
        preview.push('…');
        preview
    }
}

impl Notification {
    /// Create a new notification and deliver it to the recipient's open sessions
    pub async fn create(
        db: &Database,
        kind: NotificationKind,
        user_id: &str,
        sender_id: Option<String>,
        content: String,
        related_id: Option<String>,
    ) -> Result<Notification> {
        let notification = Notification {
            id: Ulid::new().to_string(),
            user_id: user_id.to_string(),
            kind,
            sender_id,
            content,
            related_id,
            is_read: false,
            created_at: Timestamp::now_utc(),
        };

        db.insert_notification(&notification).await?;

        Event::NotificationNew {
            notification: notification.clone(),
        }
        .private(user_id);

        Ok(notification)
    }

    /// Notify a user that someone commented on their post
    pub async fn comment(
        db: &Database,
        sender: &User,
        recipient_id: &str,
        post_id: &str,
        excerpt: &str,
    ) -> Result<Option<Notification>> {
        if sender.id == recipient_id {
            return Ok(None);
        }

        let limit = config().await.features.limits.content_preview_length;
        let content = format!(
            "{} commented on your post: {}",
            sender.display_name(),
            truncate_preview(excerpt, limit)
        );

        Notification::create(
            db,
            NotificationKind::Comment,
            recipient_id,
            Some(sender.id.to_string()),
            content,
            Some(post_id.to_string()),
        )
        .await
        .map(Some)
    }

    /// Notify a user that someone replied to their comment
    pub async fn reply(
        db: &Database,
        sender: &User,
        recipient_id: &str,
        comment_id: &str,
        excerpt: &str,
    ) -> Result<Option<Notification>> {
        if sender.id == recipient_id {
            return Ok(None);
        }

        let limit = config().await.features.limits.content_preview_length;
        let content = format!(
            "{} replied to your comment: {}",
            sender.display_name(),
            truncate_preview(excerpt, limit)
        );

        Notification::create(
            db,
            NotificationKind::Reply,
            recipient_id,
            Some(sender.id.to_string()),
            content,
            Some(comment_id.to_string()),
        )
        .await
        .map(Some)
    }

    /// Notify a user that someone liked their post
    pub async fn like(
        db: &Database,
        sender: &User,
        recipient_id: &str,
        post_id: &str,
    ) -> Result<Option<Notification>> {
        if sender.id == recipient_id {
            return Ok(None);
        }

        let content = format!("{} liked your post", sender.display_name());

        Notification::create(
            db,
            NotificationKind::Like,
            recipient_id,
            Some(sender.id.to_string()),
            content,
            Some(post_id.to_string()),
        )
        .await
        .map(Some)
    }

    /// Notify a user that they gained a follower
    pub async fn new_follower(
        db: &Database,
        follower: &User,
        recipient_id: &str,
    ) -> Result<Option<Notification>> {
        if follower.id == recipient_id {
            return Ok(None);
        }

        let content = format!("{} started following you", follower.display_name());

        Notification::create(
            db,
            NotificationKind::NewFollower,
            recipient_id,
            Some(follower.id.to_string()),
            content,
            None,
        )
        .await
        .map(Some)
    }

    /// Fan a new post out to everyone following its author
    ///
    /// Follower inboxes are filled on a best effort basis, a failure for
    /// one follower does not stop delivery to the rest.
    pub async fn notify_new_post(
        db: &Database,
        author: &User,
        post_id: &str,
        title: &str,
    ) -> Result<usize> {
        let follower_ids = db.fetch_follower_ids(&author.id).await?;
        let content = format!("{} published a new post: {}", author.display_name(), title);

        let mut delivered = 0;
        for follower_id in follower_ids {
            match Notification::create(
                db,
                NotificationKind::NewPost,
                &follower_id,
                Some(author.id.to_string()),
                content.clone(),
                Some(post_id.to_string()),
            )
            .await
            {
                Ok(_) => delivered += 1,
                Err(err) => {
                    error!("Failed to notify follower {follower_id} about new post: {err:?}")
                }
            }
        }

        Event::PostNew {
            post_id: post_id.to_string(),
            author_id: author.id.to_string(),
            title: title.to_string(),
        }
        .global();

        Ok(delivered)
    }

    /// Broadcast a site wide announcement to all open sessions
    pub fn announce(announcement_id: &str, title: &str) {
        Event::AnnouncementNew {
            announcement_id: announcement_id.to_string(),
            title: title.to_string(),
        }
        .global();
    }

    /// Whether this notification stands in for a private message
    pub fn is_private_message(&self) -> bool {
        matches!(self.kind, NotificationKind::System) && self.related_id.is_some()
    }

    /// Mark a notification as read on behalf of a user
    pub async fn mark_read(
        db: &Database,
        notification_id: &str,
        user_id: &str,
    ) -> Result<Notification> {
        let mut notification = db.fetch_notification(notification_id).await?;
        if notification.user_id != user_id {
            return Err(create_error!(Forbidden));
        }

        if !notification.is_read {
            db.mark_notification_read(notification_id).await?;
            notification.is_read = true;

            let unread_count = db.count_unread_notifications(user_id).await?;
            Event::NotificationUnreadCountUpdated { unread_count }.private(user_id);
        }

        Ok(notification)
    }

    /// Mark all of a user's notifications as read, returning how many changed
    pub async fn mark_all_read(db: &Database, user_id: &str) -> Result<u64> {
        let count = db.mark_all_notifications_read(user_id).await?;

        if count > 0 {
            let unread_count = db.count_unread_notifications(user_id).await?;
            Event::NotificationUnreadCountUpdated { unread_count }.private(user_id);
        }

        Ok(count)
    }

    /// Delete a notification on behalf of a user
    pub async fn remove(db: &Database, notification_id: &str, user_id: &str) -> Result<()> {
        let notification = db.fetch_notification(notification_id).await?;
        if notification.user_id != user_id {
            return Err(create_error!(Forbidden));
        }

        db.delete_notification(notification_id).await
    }

    /// Page through a user's inbox, newest first
    ///
    /// Private message notifications belonging to the same conversation
    /// collapse into a single group which keeps the latest entry's content.
    pub async fn list(
        db: &Database,
        user_id: &str,
        page: usize,
        limit: usize,
    ) -> Result<Vec<NotificationGroup>> {
        let notifications = db
            .fetch_notifications(user_id, &NotificationFilter::default())
            .await?;

        let mut groups: Vec<NotificationGroup> = Vec::new();
        let mut by_conversation: HashMap<String, usize> = HashMap::new();

        for notification in notifications {
            let unread = u64::from(!notification.is_read);

            if notification.is_private_message() {
                if let Some(related_id) = notification.related_id.clone() {
                    if let Some(&index) = by_conversation.get(&related_id) {
                        groups[index].aggregated_count += 1;
                        groups[index].aggregated_unread += unread;
                        continue;
                    }

                    by_conversation.insert(related_id, groups.len());
                }
            }

            groups.push(NotificationGroup {
                notification,
                aggregated_count: 1,
                aggregated_unread: unread,
            });
        }

        Ok(groups
            .into_iter()
            .skip(page.max(1).saturating_sub(1) * limit)
            .take(limit)
            .collect())
    }
}
