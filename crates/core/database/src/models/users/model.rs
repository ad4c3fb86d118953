use iso8601_timestamp::Timestamp;
use quad_result::Result;
use ulid::Ulid;

use crate::{Database, Notification};

auto_derived!(
    /// Forum member mirrored into the realtime store
    #[serde(rename_all = "camelCase")]
    pub struct User {
        /// Unique id
        #[serde(rename = "_id")]
        pub id: String,
        /// Unique username
        pub username: String,
        /// Display name shown in place of the username if set
        #[serde(skip_serializing_if = "Option::is_none")]
        pub nickname: Option<String>,
        /// Avatar attachment id
        #[serde(skip_serializing_if = "Option::is_none")]
        pub avatar: Option<String>,
        /// Ids of users following this user
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        pub followers: Vec<String>,
        /// Time at which this user registered
        pub created_at: Timestamp,
    }
);

impl User {
    /// Create a new user
    pub async fn create(db: &Database, username: &str) -> Result<User> {
        let user = User {
            id: Ulid::new().to_string(),
            username: username.to_string(),
            nickname: None,
            avatar: None,
            followers: vec![],
            created_at: Timestamp::now_utc(),
        };

        db.insert_user(&user).await?;
        Ok(user)
    }

    /// Name shown to other users
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.username)
    }

    /// Record that another user started following this user
    ///
    /// The follower notification is delivered on a best effort basis,
    /// the follow itself is never rolled back.
    pub async fn add_follower(&self, db: &Database, follower: &User) -> Result<()> {
        db.add_follower(&self.id, &follower.id).await?;

        if let Err(err) = Notification::new_follower(db, follower, &self.id).await {
            error!("Failed to create follower notification: {err:?}");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{NotificationFilter, NotificationKind, User};

    #[async_std::test]
    async fn crud() {
        database_test!(|db| async move {
            let user = User::create(&db, "aurelia").await.unwrap();

            let fetched = db.fetch_user(&user.id).await.unwrap();
            assert_eq!(user, fetched);
            assert_eq!(fetched.display_name(), "aurelia");

            let users = db.fetch_users(&[user.id.clone()]).await.unwrap();
            assert_eq!(users.len(), 1);
        });
    }

    #[async_std::test]
    async fn followers_receive_a_notification() {
        database_test!(|db| async move {
            let author = User::create(&db, "poet").await.unwrap();
            let reader = User::create(&db, "reader").await.unwrap();

            author.add_follower(&db, &reader).await.unwrap();

            let follower_ids = db.fetch_follower_ids(&author.id).await.unwrap();
            assert_eq!(follower_ids, vec![reader.id.clone()]);

            let notifications = db
                .fetch_notifications(&author.id, &NotificationFilter::default())
                .await
                .unwrap();
            assert_eq!(notifications.len(), 1);
            assert_eq!(notifications[0].kind, NotificationKind::NewFollower);
            assert_eq!(notifications[0].sender_id, Some(reader.id.clone()));
        });
    }
}
