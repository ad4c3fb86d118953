use iso8601_timestamp::Timestamp;
use quad_result::Result;
use ulid::Ulid;

use crate::events::client::Event;
use crate::{Database, Message, User};

auto_derived!(
    /// Kind of conversation
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum ConversationKind {
        Direct,
    }

    /// Private conversation between two users
    #[serde(rename_all = "camelCase")]
    pub struct Conversation {
        /// Unique id
        #[serde(rename = "_id")]
        pub id: String,
        /// Kind of conversation
        #[serde(rename = "type")]
        pub kind: ConversationKind,
        /// Ids of both participants
        pub recipients: Vec<String>,
        /// Time at which this conversation was opened
        pub created_at: Timestamp,
        /// Time of the last message sent in this conversation
        pub updated_at: Timestamp,
    }

    /// Composite key tying a user to a conversation
    #[derive(Hash)]
    pub struct ParticipantKey {
        pub conversation: String,
        pub user: String,
    }

    /// Per user read state within a conversation
    #[serde(rename_all = "camelCase")]
    pub struct ConversationParticipant {
        #[serde(rename = "_id")]
        pub id: ParticipantKey,
        /// Time up to which this user has read the conversation
        #[serde(skip_serializing_if = "Option::is_none")]
        pub last_read_at: Option<Timestamp>,
    }

    /// Conversation as shown in a user's sidebar
    #[serde(rename_all = "camelCase")]
    pub struct ConversationEntry {
        #[serde(flatten)]
        pub conversation: Conversation,
        /// The other participant
        pub other_user: User,
        /// Most recent message, if any was sent yet
        #[serde(skip_serializing_if = "Option::is_none")]
        pub last_message: Option<Message>,
        /// Time up to which the requesting user has read the conversation
        #[serde(skip_serializing_if = "Option::is_none")]
        pub last_read_at: Option<Timestamp>,
        /// Number of messages the requesting user has not read yet
        pub unread_count: u64,
    }
);

impl Conversation {
    /// Open a direct conversation between two users, reusing the existing
    /// one if the pair has talked before
    pub async fn open(db: &Database, requester: &User, counterpart_id: &str) -> Result<Conversation> {
        if requester.id == counterpart_id {
            return Err(create_error!(InvalidArgument {
                reason: "Cannot start a conversation with yourself.".to_string()
            }));
        }

        db.fetch_user(counterpart_id).await?;

        if let Some(existing) = db
            .find_direct_conversation(&requester.id, counterpart_id)
            .await?
        {
            return Ok(existing);
        }

        let now = Timestamp::now_utc();
        let conversation = Conversation {
            id: Ulid::new().to_string(),
            kind: ConversationKind::Direct,
            recipients: vec![requester.id.to_string(), counterpart_id.to_string()],
            created_at: now,
            updated_at: now,
        };

        db.insert_conversation(&conversation).await?;
        Ok(conversation)
    }

    /// Whether a user takes part in this conversation
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.recipients.iter().any(|recipient| recipient == user_id)
    }

    /// The other participant from a given user's point of view
    pub fn counterpart(&self, user_id: &str) -> Option<&str> {
        self.recipients
            .iter()
            .find(|recipient| *recipient != user_id)
            .map(String::as_str)
    }

    /// Move a user's read marker to the present
    pub async fn mark_read(db: &Database, conversation_id: &str, user_id: &str) -> Result<()> {
        let conversation = db.fetch_conversation(conversation_id).await?;
        if !conversation.is_participant(user_id) {
            return Err(create_error!(Forbidden));
        }

        db.set_last_read(conversation_id, user_id, Timestamp::now_utc())
            .await
    }

    /// Number of unread messages across all of a user's conversations
    pub async fn unread_total(db: &Database, user_id: &str) -> Result<u64> {
        let mut total = 0;
        for participant in db.fetch_participations(user_id).await? {
            total += db
                .count_unread_messages(
                    &participant.id.conversation,
                    user_id,
                    participant.last_read_at,
                )
                .await?;
        }

        Ok(total)
    }

    /// Tell the other participant that a user is writing a message
    pub async fn typing(db: &Database, conversation_id: &str, user_id: &str) -> Result<()> {
        let conversation = db.fetch_conversation(conversation_id).await?;
        if !conversation.is_participant(user_id) {
            return Err(create_error!(Forbidden));
        }

        if let Some(other_id) = conversation.counterpart(user_id) {
            Event::ChatUserTyping {
                conversation_id: conversation.id.to_string(),
                user_id: user_id.to_string(),
            }
            .private(other_id);
        }

        Ok(())
    }

    /// Page through a user's conversations, most recently active first
    pub async fn list(
        db: &Database,
        user_id: &str,
        page: usize,
        limit: usize,
    ) -> Result<Vec<ConversationEntry>> {
        let conversations = db.fetch_conversations(user_id, page, limit).await?;

        let mut entries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let Some(other_id) = conversation.counterpart(user_id) else {
                continue;
            };

            let other_user = db.fetch_user(other_id).await?;
            let last_message = db
                .fetch_messages(&conversation.id, 1, 1)
                .await?
                .into_iter()
                .next();

            let participant = db.fetch_participant(&conversation.id, user_id).await?;
            let unread_count = db
                .count_unread_messages(&conversation.id, user_id, participant.last_read_at)
                .await?;

            entries.push(ConversationEntry {
                conversation,
                other_user,
                last_message,
                last_read_at: participant.last_read_at,
                unread_count,
            });
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use iso8601_timestamp::{Duration, Timestamp};
    use quad_result::ErrorType;
    use serial_test::serial;

    use crate::{Conversation, ConversationKind, User};

    #[async_std::test]
    async fn open_is_idempotent() {
        database_test!(|db| async move {
            let alice = User::create(&db, "alice").await.unwrap();
            let bob = User::create(&db, "bob").await.unwrap();

            let first = Conversation::open(&db, &alice, &bob.id).await.unwrap();
            assert_eq!(first.kind, ConversationKind::Direct);
            assert!(first.is_participant(&alice.id));
            assert_eq!(first.counterpart(&alice.id), Some(bob.id.as_str()));

            // opening from either side lands in the same conversation
            let second = Conversation::open(&db, &bob, &alice.id).await.unwrap();
            assert_eq!(first.id, second.id);

            assert_eq!(
                db.fetch_conversations(&alice.id, 1, 10).await.unwrap().len(),
                1
            );
        });
    }

    #[async_std::test]
    async fn cannot_talk_to_yourself() {
        database_test!(|db| async move {
            let alice = User::create(&db, "alice").await.unwrap();

            let error = Conversation::open(&db, &alice, &alice.id).await.unwrap_err();
            assert!(matches!(
                error.error_type,
                ErrorType::InvalidArgument { .. }
            ));
        });
    }

    #[async_std::test]
    async fn counterpart_must_exist() {
        database_test!(|db| async move {
            let alice = User::create(&db, "alice").await.unwrap();

            let error = Conversation::open(&db, &alice, "missing").await.unwrap_err();
            assert!(matches!(error.error_type, ErrorType::NotFound));
        });
    }

    #[async_std::test]
    async fn read_marker_is_guarded_and_persisted() {
        database_test!(|db| async move {
            let alice = User::create(&db, "alice").await.unwrap();
            let bob = User::create(&db, "bob").await.unwrap();
            let eve = User::create(&db, "eve").await.unwrap();

            let conversation = Conversation::open(&db, &alice, &bob.id).await.unwrap();

            let error = Conversation::mark_read(&db, &conversation.id, &eve.id)
                .await
                .unwrap_err();
            assert!(matches!(error.error_type, ErrorType::Forbidden));

            let before = db
                .fetch_participant(&conversation.id, &alice.id)
                .await
                .unwrap();
            assert!(before.last_read_at.is_none());

            Conversation::mark_read(&db, &conversation.id, &alice.id)
                .await
                .unwrap();

            let after = db
                .fetch_participant(&conversation.id, &alice.id)
                .await
                .unwrap();
            assert!(after.last_read_at.is_some());
        });
    }

    #[async_std::test]
    async fn sidebar_orders_by_activity() {
        database_test!(|db| async move {
            let alice = User::create(&db, "alice").await.unwrap();
            let bob = User::create(&db, "bob").await.unwrap();
            let carol = User::create(&db, "carol").await.unwrap();

            let with_bob = Conversation::open(&db, &alice, &bob.id).await.unwrap();
            let with_carol = Conversation::open(&db, &alice, &carol.id).await.unwrap();

            db.bump_conversation(&with_bob.id, Timestamp::now_utc() + Duration::minutes(5))
                .await
                .unwrap();

            let entries = Conversation::list(&db, &alice.id, 1, 10).await.unwrap();
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0].conversation.id, with_bob.id);
            assert_eq!(entries[0].other_user.username, "bob");
            assert_eq!(entries[1].conversation.id, with_carol.id);
            assert!(entries[0].last_message.is_none());
            assert_eq!(entries[0].unread_count, 0);
        });
    }

    #[async_std::test]
    #[serial]
    async fn typing_reaches_the_counterpart() {
        database_test!(|db| async move {
            let alice = User::create(&db, "alice").await.unwrap();
            let bob = User::create(&db, "bob").await.unwrap();
            let eve = User::create(&db, "eve").await.unwrap();

            let conversation = Conversation::open(&db, &alice, &bob.id).await.unwrap();

            let (sender, receiver) = async_channel::bounded(64);
            let (_, handle) = quad_presence::register(&bob.id, sender);

            Conversation::typing(&db, &conversation.id, &alice.id)
                .await
                .unwrap();

            let payload: serde_json::Value =
                serde_json::from_str(&receiver.recv().await.unwrap()).unwrap();
            assert_eq!(payload["type"], "chat:user_typing");
            assert_eq!(payload["conversationId"], conversation.id.as_str());
            assert_eq!(payload["userId"], alice.id.as_str());

            let error = Conversation::typing(&db, &conversation.id, &eve.id)
                .await
                .unwrap_err();
            assert!(matches!(error.error_type, ErrorType::Forbidden));
            assert!(receiver.is_empty());

            quad_presence::deregister(&handle);
        });
    }
}
