use quad_result::Result;

use crate::User;

#[cfg(feature = "mongodb")]
mod mongodb;
mod reference;

#[async_trait]
pub trait AbstractUsers: Sync + Send {
    /// Insert a new user into the database
    async fn insert_user(&self, user: &User) -> Result<()>;

    /// Fetch a user from the database
    async fn fetch_user(&self, id: &str) -> Result<User>;

    /// Fetch multiple users by their ids
    async fn fetch_users(&self, ids: &[String]) -> Result<Vec<User>>;

    /// Add a follower to a user
    async fn add_follower(&self, id: &str, follower_id: &str) -> Result<()>;

    /// Fetch the ids of everyone following a user
    async fn fetch_follower_ids(&self, id: &str) -> Result<Vec<String>>;
}
