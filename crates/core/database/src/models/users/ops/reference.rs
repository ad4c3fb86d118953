use quad_result::Result;

use crate::ReferenceDb;
use crate::User;

use super::AbstractUsers;

#[async_trait]
impl AbstractUsers for ReferenceDb {
    /// Insert a new user into the database
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut users = self.users.lock().await;
        if users.contains_key(&user.id) {
            Err(create_database_error!("insert", "users"))
        } else {
            users.insert(user.id.to_string(), user.clone());
            Ok(())
        }
    }

    /// Fetch a user from the database
    async fn fetch_user(&self, id: &str) -> Result<User> {
        let users = self.users.lock().await;
        users
            .get(id)
            .cloned()
            .ok_or_else(|| create_error!(NotFound))
    }

    /// Fetch multiple users by their ids
    async fn fetch_users(&self, ids: &[String]) -> Result<Vec<User>> {
        let users = self.users.lock().await;
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    /// Add a follower to a user
    async fn add_follower(&self, id: &str, follower_id: &str) -> Result<()> {
        let mut users = self.users.lock().await;
        let user = users.get_mut(id).ok_or_else(|| create_error!(NotFound))?;

        if !user.followers.iter().any(|entry| entry == follower_id) {
            user.followers.push(follower_id.to_string());
        }

        Ok(())
    }

    /// Fetch the ids of everyone following a user
    async fn fetch_follower_ids(&self, id: &str) -> Result<Vec<String>> {
        Ok(self.fetch_user(id).await?.followers)
    }
}
