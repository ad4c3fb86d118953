use iso8601_timestamp::Timestamp;
use quad_config::config;
use quad_result::Result;
use ulid::Ulid;

use crate::events::client::Event;
use crate::{truncate_preview, Conversation, Database, Notification, NotificationKind};

auto_derived!(
    /// Message sent within a private conversation
    #[serde(rename_all = "camelCase")]
    pub struct Message {
        /// Unique id
        #[serde(rename = "_id")]
        pub id: String,
        /// Id of the conversation this message was sent in
        pub conversation_id: String,
        /// Id of the user who sent it
        pub sender_id: String,
        /// Message body
        pub content: String,
        /// Whether the sender retracted this message
        #[serde(skip_serializing_if = "crate::if_false", default)]
        pub is_deleted: bool,
        /// Time at which this message was sent
        pub created_at: Timestamp,
    }
);

impl Message {
    /// Send a message into a conversation
    ///
    /// The message itself and the counterpart's inbox notification are
    /// persisted, then the counterpart's open sessions are pushed the new
    /// message and their updated unread total. Push failures never fail
    /// the send.
    pub async fn send(
        db: &Database,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<Message> {
        let config = config().await;

        let content = content.trim();
        if content.is_empty() {
            return Err(create_error!(InvalidArgument {
                reason: "Message content cannot be empty.".to_string()
            }));
        }

        if content.chars().count() > config.features.limits.message_length {
            return Err(create_error!(InvalidArgument {
                reason: "Message content is too long.".to_string()
            }));
        }

        let conversation = db.fetch_conversation(conversation_id).await?;
        if !conversation.is_participant(sender_id) {
            return Err(create_error!(Forbidden));
        }

        let message = Message {
            id: Ulid::new().to_string(),
            conversation_id: conversation.id.to_string(),
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            is_deleted: false,
            created_at: Timestamp::now_utc(),
        };

        db.insert_message(&message).await?;
        db.bump_conversation(&conversation.id, message.created_at)
            .await?;

        if let Some(other_id) = conversation.counterpart(sender_id) {
            let preview = truncate_preview(content, config.features.limits.content_preview_length);
            if let Err(err) = Notification::create(
                db,
                NotificationKind::System,
                other_id,
                Some(sender_id.to_string()),
                preview,
                Some(conversation.id.to_string()),
            )
            .await
            {
                error!("Failed to create message notification: {err:?}");
            }

            if quad_presence::is_online(other_id) {
                Event::ChatMessageCreated {
                    conversation_id: conversation.id.to_string(),
                    message: message.clone(),
                }
                .private(other_id);

                match Conversation::unread_total(db, other_id).await {
                    Ok(unread_count) => {
                        Event::ChatUnreadCount { unread_count }.private(other_id)
                    }
                    Err(err) => error!("Failed to count unread messages: {err:?}"),
                }
            }
        }

        Ok(message)
    }

    /// Page through a conversation's history on behalf of a user
    ///
    /// Pages start from the most recent messages, ordered oldest first
    /// within each page. Viewing the history moves the read marker, so
    /// this also returns the total message count for the pager.
    pub async fn list(
        db: &Database,
        conversation_id: &str,
        user_id: &str,
        page: usize,
        limit: usize,
    ) -> Result<(Vec<Message>, u64)> {
        let conversation = db.fetch_conversation(conversation_id).await?;
        if !conversation.is_participant(user_id) {
            return Err(create_error!(Forbidden));
        }

        let mut messages = db.fetch_messages(conversation_id, page, limit).await?;
        messages.reverse();

        let total = db.count_messages(conversation_id).await?;
        db.set_last_read(conversation_id, user_id, Timestamp::now_utc())
            .await?;

        Ok((messages, total))
    }

    /// Retract a message the user sent earlier
    pub async fn remove(db: &Database, message_id: &str, user_id: &str) -> Result<()> {
        let message = db.fetch_message(message_id).await?;
        if message.sender_id != user_id {
            return Err(create_error!(Forbidden));
        }

        if message.is_deleted {
            return Err(create_error!(BadRequest {
                reason: "Message has already been deleted.".to_string()
            }));
        }

        db.mark_message_deleted(message_id).await
    }
}

#[cfg(test)]
mod tests {
    use quad_result::ErrorType;
    use serial_test::serial;

    use crate::{Conversation, Message, NotificationFilter, User};

    #[async_std::test]
    #[serial]
    async fn sending_to_an_offline_counterpart_only_persists() {
        database_test!(|db| async move {
            let alice = User::create(&db, "alice").await.unwrap();
            let bob = User::create(&db, "bob").await.unwrap();
            let conversation = Conversation::open(&db, &alice, &bob.id).await.unwrap();

            let (sender, receiver) = async_channel::bounded(64);
            let (_, handle) = quad_presence::register(&alice.id, sender);

            Message::send(&db, &conversation.id, &alice.id, "hi")
                .await
                .unwrap();

            assert_eq!(Conversation::unread_total(&db, &bob.id).await.unwrap(), 1);
            assert_eq!(db.count_unread_notifications(&bob.id).await.unwrap(), 1);

            let inbox = db
                .fetch_notifications(&bob.id, &NotificationFilter::default())
                .await
                .unwrap();
            assert!(inbox[0].is_private_message());
            assert_eq!(inbox[0].content, "hi");

            // nothing is echoed back to the sender's sessions
            assert!(receiver.is_empty());

            let (messages, total) = Message::list(&db, &conversation.id, &bob.id, 1, 50)
                .await
                .unwrap();
            assert_eq!(total, 1);
            assert_eq!(messages[0].content, "hi");

            // viewing the history moved the read marker
            assert_eq!(Conversation::unread_total(&db, &bob.id).await.unwrap(), 0);

            quad_presence::deregister(&handle);
        });
    }

    #[async_std::test]
    #[serial]
    async fn sending_to_an_online_counterpart_pushes_events() {
        database_test!(|db| async move {
            let alice = User::create(&db, "alice").await.unwrap();
            let bob = User::create(&db, "bob").await.unwrap();
            let conversation = Conversation::open(&db, &alice, &bob.id).await.unwrap();

            let (sender, receiver) = async_channel::bounded(64);
            let (_, handle) = quad_presence::register(&bob.id, sender);

            let message = Message::send(&db, &conversation.id, &alice.id, "hello there")
                .await
                .unwrap();

            let mut kinds = vec![];
            for _ in 0..3 {
                let payload: serde_json::Value =
                    serde_json::from_str(&receiver.recv().await.unwrap()).unwrap();
                kinds.push(payload["type"].as_str().unwrap().to_string());

                if payload["type"] == "chat:message_created" {
                    assert_eq!(payload["conversationId"], conversation.id.as_str());
                    assert_eq!(payload["message"]["_id"], message.id.as_str());
                    assert_eq!(payload["message"]["content"], "hello there");
                }

                if payload["type"] == "chat:unread_count" {
                    assert_eq!(payload["unreadCount"], 1);
                }
            }

            assert_eq!(
                kinds,
                vec![
                    "notification:new",
                    "chat:message_created",
                    "chat:unread_count"
                ]
            );

            quad_presence::deregister(&handle);
        });
    }

    #[async_std::test]
    async fn outsiders_cannot_send() {
        database_test!(|db| async move {
            let alice = User::create(&db, "alice").await.unwrap();
            let bob = User::create(&db, "bob").await.unwrap();
            let eve = User::create(&db, "eve").await.unwrap();
            let conversation = Conversation::open(&db, &alice, &bob.id).await.unwrap();

            let error = Message::send(&db, &conversation.id, &eve.id, "let me in")
                .await
                .unwrap_err();
            assert!(matches!(error.error_type, ErrorType::Forbidden));
            assert_eq!(db.count_messages(&conversation.id).await.unwrap(), 0);
        });
    }

    #[async_std::test]
    async fn content_is_validated() {
        database_test!(|db| async move {
            let alice = User::create(&db, "alice").await.unwrap();
            let bob = User::create(&db, "bob").await.unwrap();
            let conversation = Conversation::open(&db, &alice, &bob.id).await.unwrap();

            for content in ["", "   "] {
                let error = Message::send(&db, &conversation.id, &alice.id, content)
                    .await
                    .unwrap_err();
                assert!(matches!(
                    error.error_type,
                    ErrorType::InvalidArgument { .. }
                ));
            }

            let error = Message::send(&db, &conversation.id, &alice.id, &"x".repeat(2001))
                .await
                .unwrap_err();
            assert!(matches!(
                error.error_type,
                ErrorType::InvalidArgument { .. }
            ));

            Message::send(&db, &conversation.id, &alice.id, &"x".repeat(2000))
                .await
                .unwrap();
        });
    }

    #[async_std::test]
    async fn retraction_is_guarded() {
        database_test!(|db| async move {
            let alice = User::create(&db, "alice").await.unwrap();
            let bob = User::create(&db, "bob").await.unwrap();
            let conversation = Conversation::open(&db, &alice, &bob.id).await.unwrap();

            let message = Message::send(&db, &conversation.id, &alice.id, "oops")
                .await
                .unwrap();
            assert_eq!(Conversation::unread_total(&db, &bob.id).await.unwrap(), 1);

            let error = Message::remove(&db, &message.id, &bob.id).await.unwrap_err();
            assert!(matches!(error.error_type, ErrorType::Forbidden));

            Message::remove(&db, &message.id, &alice.id).await.unwrap();

            let error = Message::remove(&db, &message.id, &alice.id)
                .await
                .unwrap_err();
            assert!(matches!(error.error_type, ErrorType::BadRequest { .. }));

            // retracted messages disappear from history and unread counts
            let (messages, total) = Message::list(&db, &conversation.id, &bob.id, 1, 50)
                .await
                .unwrap();
            assert!(messages.is_empty());
            assert_eq!(total, 0);
            assert_eq!(Conversation::unread_total(&db, &bob.id).await.unwrap(), 0);
        });
    }

    #[async_std::test]
    async fn history_pages_from_the_most_recent() {
        database_test!(|db| async move {
            let alice = User::create(&db, "alice").await.unwrap();
            let bob = User::create(&db, "bob").await.unwrap();
            let conversation = Conversation::open(&db, &alice, &bob.id).await.unwrap();

            for content in ["one", "two", "three", "four", "five"] {
                Message::send(&db, &conversation.id, &alice.id, content)
                    .await
                    .unwrap();
            }

            let (page, total) = Message::list(&db, &conversation.id, &bob.id, 1, 2)
                .await
                .unwrap();
            assert_eq!(total, 5);
            let contents: Vec<&str> = page.iter().map(|m| m.content.as_str()).collect();
            assert_eq!(contents, vec!["four", "five"]);

            let (page, _) = Message::list(&db, &conversation.id, &bob.id, 3, 2)
                .await
                .unwrap();
            let contents: Vec<&str> = page.iter().map(|m| m.content.as_str()).collect();
            assert_eq!(contents, vec!["one"]);
        });
    }
}
