use iso8601_timestamp::Timestamp;
use quad_result::Result;

use crate::ReferenceDb;
use crate::{Conversation, ConversationParticipant, ParticipantKey};

use super::AbstractConversations;

#[async_trait]
impl AbstractConversations for ReferenceDb {
    /// Insert a new conversation and the read state rows for its recipients
    async fn insert_conversation(&self, conversation: &Conversation) -> Result<()> {
        let mut conversations = self.conversations.lock().await;
        if conversations.contains_key(&conversation.id) {
            return Err(create_database_error!("insert", "conversations"));
        }

        conversations.insert(conversation.id.to_string(), conversation.clone());

        let mut participants = self.conversation_participants.lock().await;
        for recipient in &conversation.recipients {
            let key = ParticipantKey {
                conversation: conversation.id.to_string(),
                user: recipient.to_string(),
            };

            participants.insert(
                key.clone(),
                ConversationParticipant {
                    id: key,
                    last_read_at: None,
                },
            );
        }

        Ok(())
    }

    /// Fetch a conversation by its id
    async fn fetch_conversation(&self, id: &str) -> Result<Conversation> {
        let conversations = self.conversations.lock().await;
        conversations
            .get(id)
            .cloned()
            .ok_or_else(|| create_error!(NotFound))
    }

    /// Find the direct conversation between two users, if one exists
    async fn find_direct_conversation(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Option<Conversation>> {
        let conversations = self.conversations.lock().await;
        Ok(conversations
            .values()
            .find(|conversation| {
                matches!(conversation.kind, crate::ConversationKind::Direct)
                    && conversation.is_participant(user_a)
                    && conversation.is_participant(user_b)
            })
            .cloned())
    }

    /// Fetch a page of a user's conversations, most recently active first
    async fn fetch_conversations(
        &self,
        user_id: &str,
        page: usize,
        limit: usize,
    ) -> Result<Vec<Conversation>> {
        let conversations = self.conversations.lock().await;
        let mut conversations: Vec<Conversation> = conversations
            .values()
            .filter(|conversation| conversation.is_participant(user_id))
            .cloned()
            .collect();

        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(conversations
            .into_iter()
            .skip(page.max(1).saturating_sub(1) * limit)
            .take(limit)
            .collect())
    }

    /// Move a conversation to the top of the sidebar
    async fn bump_conversation(&self, id: &str, at: Timestamp) -> Result<()> {
        let mut conversations = self.conversations.lock().await;
        let conversation = conversations
            .get_mut(id)
            .ok_or_else(|| create_error!(NotFound))?;

        conversation.updated_at = at;
        Ok(())
    }

    /// Fetch a user's read state within a conversation
    async fn fetch_participant(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<ConversationParticipant> {
        let participants = self.conversation_participants.lock().await;
        participants
            .get(&ParticipantKey {
                conversation: conversation_id.to_string(),
                user: user_id.to_string(),
            })
            .cloned()
            .ok_or_else(|| create_error!(NotFound))
    }

    /// Fetch a user's read state across all their conversations
    async fn fetch_participations(&self, user_id: &str) -> Result<Vec<ConversationParticipant>> {
        let participants = self.conversation_participants.lock().await;
        Ok(participants
            .values()
            .filter(|participant| participant.id.user == user_id)
            .cloned()
            .collect())
    }

    /// Move a user's read marker within a conversation
    async fn set_last_read(
        &self,
        conversation_id: &str,
        user_id: &str,
        at: Timestamp,
    ) -> Result<()> {
        let key = ParticipantKey {
            conversation: conversation_id.to_string(),
            user: user_id.to_string(),
        };

        let mut participants = self.conversation_participants.lock().await;
        participants
            .entry(key.clone())
            .or_insert_with(|| ConversationParticipant {
                id: key,
                last_read_at: None,
            })
            .last_read_at = Some(at);

        Ok(())
    }
}
