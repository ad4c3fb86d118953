use iso8601_timestamp::Timestamp;
use quad_result::Result;

use crate::Message;

#[cfg(feature = "mongodb")]
mod mongodb;
mod reference;

#[async_trait]
pub trait AbstractMessages: Sync + Send {
    /// Insert a new message into the database
    async fn insert_message(&self, message: &Message) -> Result<()>;

    /// Fetch a message by its id
    async fn fetch_message(&self, id: &str) -> Result<Message>;

    /// Fetch a page of a conversation's messages, newest first,
    /// skipping retracted ones
    async fn fetch_messages(
        &self,
        conversation_id: &str,
        page: usize,
        limit: usize,
    ) -> Result<Vec<Message>>;

    /// Count a conversation's messages, skipping retracted ones
    async fn count_messages(&self, conversation_id: &str) -> Result<u64>;

    /// Flag a message as retracted by its sender
    async fn mark_message_deleted(&self, id: &str) -> Result<()>;

    /// Count messages a user has not read yet within a conversation
    ///
    /// Only messages sent by the other side after `after` count,
    /// or all of them if the user never opened the conversation.
    async fn count_unread_messages(
        &self,
        conversation_id: &str,
        user_id: &str,
        after: Option<Timestamp>,
    ) -> Result<u64>;
}
