use ::mongodb::options::FindOptions;
use bson::to_bson;
use iso8601_timestamp::Timestamp;
use quad_result::Result;

use crate::Message;
use crate::MongoDb;

use super::AbstractMessages;

static COL: &str = "messages";

#[async_trait]
impl AbstractMessages for MongoDb {
    /// Insert a new message into the database
    async fn insert_message(&self, message: &Message) -> Result<()> {
        query!(self, insert_one, COL, &message).map(|_| ())
    }

    /// Fetch a message by its id
    async fn fetch_message(&self, id: &str) -> Result<Message> {
        query!(self, find_one_by_id, COL, id)?.ok_or_else(|| create_error!(NotFound))
    }

    /// Fetch a page of a conversation's messages, newest first,
    /// skipping retracted ones
    async fn fetch_messages(
        &self,
        conversation_id: &str,
        page: usize,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let skip = page.max(1).saturating_sub(1) * limit;

        query!(
            self,
            find_with_options,
            COL,
            doc! {
                "conversationId": conversation_id,
                "isDeleted": {
                    "$ne": true
                }
            },
            FindOptions::builder()
                .sort(doc! {
                    "createdAt": -1,
                    "_id": -1
                })
                .skip(skip as u64)
                .limit(limit as i64)
                .build()
        )
    }

    /// Count a conversation's messages, skipping retracted ones
    async fn count_messages(&self, conversation_id: &str) -> Result<u64> {
        query!(
            self,
            count_documents,
            COL,
            doc! {
                "conversationId": conversation_id,
                "isDeleted": {
                    "$ne": true
                }
            }
        )
    }

    /// Flag a message as retracted by its sender
    async fn mark_message_deleted(&self, id: &str) -> Result<()> {
        self.col::<Message>(COL)
            .update_one(
                doc! {
                    "_id": id
                },
                doc! {
                    "$set": {
                        "isDeleted": true
                    }
                },
            )
            .await
            .map(|_| ())
            .map_err(|_| create_database_error!("update_one", COL))
    }

    /// Count messages a user has not read yet within a conversation
    async fn count_unread_messages(
        &self,
        conversation_id: &str,
        user_id: &str,
        after: Option<Timestamp>,
    ) -> Result<u64> {
        let mut query = doc! {
            "conversationId": conversation_id,
            "senderId": {
                "$ne": user_id
            },
            "isDeleted": {
                "$ne": true
            }
        };

        if let Some(at) = after {
            query.insert(
                "createdAt",
                doc! {
                    "$gt": to_bson(&at).map_err(|_| create_database_error!("to_bson", "timestamp"))?
                },
            );
        }

        query!(self, count_documents, COL, query)
    }
}
