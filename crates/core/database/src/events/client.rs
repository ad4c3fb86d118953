use iso8601_timestamp::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{Message, Notification};

/// Events pushed to connected clients
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum Event {
    /// Liveness probe response
    #[serde(rename = "pong")]
    Pong { timestamp: Timestamp },

    /// A notification just landed in the user's inbox
    #[serde(rename = "notification:new")]
    NotificationNew { notification: Notification },

    /// The user's unread notification badge changed
    #[serde(rename = "notification:unread_count_updated", rename_all = "camelCase")]
    NotificationUnreadCountUpdated { unread_count: u64 },

    /// Acknowledgement that a notification was marked read
    #[serde(rename = "notification:read_success", rename_all = "camelCase")]
    NotificationReadSuccess { notification_id: String, is_read: bool },

    /// Acknowledgement that the whole inbox was marked read
    #[serde(rename = "notification:all_read_success")]
    NotificationAllReadSuccess { count: u64 },

    /// Current unread notification badge, sent on request and on connect
    #[serde(rename = "notification:unread_count", rename_all = "camelCase")]
    NotificationUnreadCount { unread_count: u64 },

    /// Echo of a message the session itself just sent
    #[serde(rename = "chat:message_sent", rename_all = "camelCase")]
    ChatMessageSent {
        conversation_id: String,
        message: Message,
    },

    /// A message arrived in one of the user's conversations
    #[serde(rename = "chat:message_created", rename_all = "camelCase")]
    ChatMessageCreated {
        conversation_id: String,
        message: Message,
    },

    /// The user's unread message badge changed
    #[serde(rename = "chat:unread_count", rename_all = "camelCase")]
    ChatUnreadCount { unread_count: u64 },

    /// The other participant is writing a message
    #[serde(rename = "chat:user_typing", rename_all = "camelCase")]
    ChatUserTyping {
        conversation_id: String,
        user_id: String,
    },

    /// How many users are online right now
    #[serde(rename = "system:online_count", rename_all = "camelCase")]
    SystemOnlineCount {
        online_users: usize,
        timestamp: Timestamp,
    },

    /// Someone the user follows published a post
    #[serde(rename = "post:new", rename_all = "camelCase")]
    PostNew {
        post_id: String,
        author_id: String,
        title: String,
    },

    /// A site wide announcement went out
    #[serde(rename = "announcement:new", rename_all = "camelCase")]
    AnnouncementNew {
        announcement_id: String,
        title: String,
    },

    /// Something went wrong handling a client message
    #[serde(rename = "error")]
    Error { message: String },
}

impl Event {
    /// Deliver this event to one user's open sessions
    pub fn private(self, user_id: &str) {
        #[cfg(debug_assertions)]
        info!("Publishing event to {user_id}: {self:?}");

        match serde_json::to_string(&self) {
            Ok(payload) => {
                quad_presence::publish(user_id, payload);
            }
            Err(err) => error!("Failed to serialise event: {err:?}"),
        }
    }

    /// Deliver this event to every open session
    pub fn global(self) {
        #[cfg(debug_assertions)]
        info!("Publishing global event: {self:?}");

        match serde_json::to_string(&self) {
            Ok(payload) => {
                quad_presence::publish_all(payload);
            }
            Err(err) => error!("Failed to serialise event: {err:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Event;

    #[test]
    fn events_use_the_wire_naming() {
        let payload = serde_json::to_value(Event::ChatUnreadCount { unread_count: 3 }).unwrap();
        assert_eq!(payload["type"], "chat:unread_count");
        assert_eq!(payload["unreadCount"], 3);

        let payload = serde_json::to_value(Event::ChatUserTyping {
            conversation_id: "conversation".to_string(),
            user_id: "user".to_string(),
        })
        .unwrap();
        assert_eq!(payload["type"], "chat:user_typing");
        assert_eq!(payload["conversationId"], "conversation");
    }
}
