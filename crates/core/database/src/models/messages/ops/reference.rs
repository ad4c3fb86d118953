use iso8601_timestamp::Timestamp;
use quad_result::Result;

use crate::Message;
use crate::ReferenceDb;

use super::AbstractMessages;

#[async_trait]
impl AbstractMessages for ReferenceDb {
    /// Insert a new message into the database
    async fn insert_message(&self, message: &Message) -> Result<()> {
        let mut messages = self.messages.lock().await;
        if messages.contains_key(&message.id) {
            Err(create_database_error!("insert", "messages"))
        } else {
            messages.insert(message.id.to_string(), message.clone());
            Ok(())
        }
    }

    /// Fetch a message by its id
    async fn fetch_message(&self, id: &str) -> Result<Message> {
        let messages = self.messages.lock().await;
        messages
            .get(id)
            .cloned()
            .ok_or_else(|| create_error!(NotFound))
    }

    /// Fetch a page of a conversation's messages, newest first,
    /// skipping retracted ones
    async fn fetch_messages(
        &self,
        conversation_id: &str,
        page: usize,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let messages = self.messages.lock().await;
        let mut messages: Vec<Message> = messages
            .values()
            .filter(|message| message.conversation_id == conversation_id && !message.is_deleted)
            .cloned()
            .collect();

        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(messages
            .into_iter()
            .skip(page.max(1).saturating_sub(1) * limit)
            .take(limit)
            .collect())
    }

    /// Count a conversation's messages, skipping retracted ones
    async fn count_messages(&self, conversation_id: &str) -> Result<u64> {
        let messages = self.messages.lock().await;
        Ok(messages
            .values()
            .filter(|message| message.conversation_id == conversation_id && !message.is_deleted)
            .count() as u64)
    }

    /// Flag a message as retracted by its sender
    async fn mark_message_deleted(&self, id: &str) -> Result<()> {
        let mut messages = self.messages.lock().await;
        let message = messages.get_mut(id).ok_or_else(|| create_error!(NotFound))?;

        message.is_deleted = true;
        Ok(())
    }

    /// Count messages a user has not read yet within a conversation
    async fn count_unread_messages(
        &self,
        conversation_id: &str,
        user_id: &str,
        after: Option<Timestamp>,
    ) -> Result<u64> {
        let messages = self.messages.lock().await;
        Ok(messages
            .values()
            .filter(|message| {
                message.conversation_id == conversation_id
                    && message.sender_id != user_id
                    && !message.is_deleted
                    && after.map_or(true, |at| message.created_at > at)
            })
            .count() as u64)
    }
}
