use serde::{Deserialize, Serialize};

/// Messages received from connected clients
#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Present a session token, used when the socket connected without one
    #[serde(rename = "authenticate")]
    Authenticate { token: String },

    /// Liveness probe
    #[serde(rename = "ping")]
    Ping,

    /// Send a message into a conversation
    #[serde(rename = "chat:send_message", rename_all = "camelCase")]
    SendMessage {
        conversation_id: String,
        content: String,
    },

    /// Move the read marker of a conversation to the present
    #[serde(rename = "chat:mark_read", rename_all = "camelCase")]
    MarkConversationRead { conversation_id: String },

    /// Tell the other participant the user is writing
    #[serde(rename = "chat:typing", rename_all = "camelCase")]
    Typing { conversation_id: String },

    /// Mark a single notification as read
    #[serde(rename = "notification:mark_read", rename_all = "camelCase")]
    MarkNotificationRead { notification_id: String },

    /// Mark the whole inbox as read
    #[serde(rename = "notification:mark_all_read")]
    MarkAllNotificationsRead,

    /// Ask for the current unread notification badge
    #[serde(rename = "notification:unread_count")]
    RequestUnreadCount,
}

#[cfg(test)]
mod tests {
    use super::ClientMessage;

    #[test]
    fn client_messages_parse_from_the_wire() {
        let message: ClientMessage =
            serde_json::from_str(r#"{"type":"chat:send_message","conversationId":"c1","content":"hi"}"#)
                .unwrap();
        assert!(matches!(
            message,
            ClientMessage::SendMessage { conversation_id, content }
                if conversation_id == "c1" && content == "hi"
        ));

        let message: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(message, ClientMessage::Ping));

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"unknown"}"#).is_err());
    }
}
