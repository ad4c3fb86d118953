use ::mongodb::options::{FindOptions, UpdateOptions};
use bson::to_bson;
use iso8601_timestamp::Timestamp;
use quad_result::Result;

use crate::MongoDb;
use crate::{Conversation, ConversationParticipant, ParticipantKey};

use super::AbstractConversations;

static COL: &str = "conversations";
static COL_PARTICIPANTS: &str = "conversation_participants";

#[async_trait]
impl AbstractConversations for MongoDb {
    /// Insert a new conversation and the read state rows for its recipients
    async fn insert_conversation(&self, conversation: &Conversation) -> Result<()> {
        query!(self, insert_one, COL, &conversation)?;

        for recipient in &conversation.recipients {
            let participant = ConversationParticipant {
                id: ParticipantKey {
                    conversation: conversation.id.to_string(),
                    user: recipient.to_string(),
                },
                last_read_at: None,
            };

            query!(self, insert_one, COL_PARTICIPANTS, &participant)?;
        }

        Ok(())
    }

    /// Fetch a conversation by its id
    async fn fetch_conversation(&self, id: &str) -> Result<Conversation> {
        query!(self, find_one_by_id, COL, id)?.ok_or_else(|| create_error!(NotFound))
    }

    /// Find the direct conversation between two users, if one exists
    async fn find_direct_conversation(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Option<Conversation>> {
        query!(
            self,
            find_one,
            COL,
            doc! {
                "type": "DIRECT",
                "recipients": {
                    "$all": [user_a, user_b]
                }
            }
        )
    }

    /// Fetch a page of a user's conversations, most recently active first
    async fn fetch_conversations(
        &self,
        user_id: &str,
        page: usize,
        limit: usize,
    ) -> Result<Vec<Conversation>> {
        let skip = page.max(1).saturating_sub(1) * limit;

        query!(
            self,
            find_with_options,
            COL,
            doc! {
                "recipients": user_id
            },
            FindOptions::builder()
                .sort(doc! {
                    "updatedAt": -1,
                    "_id": -1
                })
                .skip(skip as u64)
                .limit(limit as i64)
                .build()
        )
    }

    /// Move a conversation to the top of the sidebar
    async fn bump_conversation(&self, id: &str, at: Timestamp) -> Result<()> {
        self.col::<Conversation>(COL)
            .update_one(
                doc! {
                    "_id": id
                },
                doc! {
                    "$set": {
                        "updatedAt": to_bson(&at)
                            .map_err(|_| create_database_error!("to_bson", "timestamp"))?
                    }
                },
            )
            .await
            .map(|_| ())
            .map_err(|_| create_database_error!("update_one", COL))
    }

    /// Fetch a user's read state within a conversation
    async fn fetch_participant(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<ConversationParticipant> {
        query!(
            self,
            find_one,
            COL_PARTICIPANTS,
            doc! {
                "_id.conversation": conversation_id,
                "_id.user": user_id
            }
        )?
        .ok_or_else(|| create_error!(NotFound))
    }

    /// Fetch a user's read state across all their conversations
    async fn fetch_participations(&self, user_id: &str) -> Result<Vec<ConversationParticipant>> {
        query!(
            self,
            find,
            COL_PARTICIPANTS,
            doc! {
                "_id.user": user_id
            }
        )
    }

    /// Move a user's read marker within a conversation
    async fn set_last_read(
        &self,
        conversation_id: &str,
        user_id: &str,
        at: Timestamp,
    ) -> Result<()> {
        self.col::<ConversationParticipant>(COL_PARTICIPANTS)
            .update_one(
                doc! {
                    "_id.conversation": conversation_id,
                    "_id.user": user_id
                },
                doc! {
                    "$set": {
                        "lastReadAt": to_bson(&at)
                            .map_err(|_| create_database_error!("to_bson", "timestamp"))?
                    }
                },
            )
            .with_options(UpdateOptions::builder().upsert(true).build())
            .await
            .map(|_| ())
            .map_err(|_| create_database_error!("update_one", COL_PARTICIPANTS))
    }
}
