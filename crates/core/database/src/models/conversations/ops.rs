use iso8601_timestamp::Timestamp;
use quad_result::Result;

use crate::{Conversation, ConversationParticipant};

#[cfg(feature = "mongodb")]
mod mongodb;
mod reference;

#[async_trait]
pub trait AbstractConversations: Sync + Send {
    /// Insert a new conversation and the read state rows for its recipients
    async fn insert_conversation(&self, conversation: &Conversation) -> Result<()>;

    /// Fetch a conversation by its id
    async fn fetch_conversation(&self, id: &str) -> Result<Conversation>;

    /// Find the direct conversation between two users, if one exists
    async fn find_direct_conversation(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Option<Conversation>>;

    /// Fetch a page of a user's conversations, most recently active first
    async fn fetch_conversations(
        &self,
        user_id: &str,
        page: usize,
        limit: usize,
    ) -> Result<Vec<Conversation>>;

    /// Move a conversation to the top of the sidebar
    async fn bump_conversation(&self, id: &str, at: Timestamp) -> Result<()>;

    /// Fetch a user's read state within a conversation
    async fn fetch_participant(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<ConversationParticipant>;

    /// Fetch a user's read state across all their conversations
    async fn fetch_participations(&self, user_id: &str) -> Result<Vec<ConversationParticipant>>;

    /// Move a user's read marker within a conversation
    async fn set_last_read(&self, conversation_id: &str, user_id: &str, at: Timestamp)
        -> Result<()>;
}
