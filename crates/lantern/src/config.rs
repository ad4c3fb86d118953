use async_tungstenite::tungstenite::{handshake, Message};
use futures::channel::oneshot::Sender;
use quad_result::{create_error, Result};
use serde::{Deserialize, Serialize};

/// Enumeration of supported protocol formats
#[derive(Debug)]
pub enum ProtocolFormat {
    Json,
    Msgpack,
}

/// User-provided protocol configuration
#[derive(Debug)]
pub struct ProtocolConfiguration {
    format: ProtocolFormat,
    session_token: Option<String>,
}

impl ProtocolConfiguration {
    /// Decode some WebSocket message into a T: Deserialize using the client's specified protocol format
    pub fn decode<'a, T: Deserialize<'a>>(&self, msg: &'a Message) -> Result<T> {
        match self.format {
            ProtocolFormat::Json => {
                if let Message::Text(text) = msg {
                    serde_json::from_str(text).map_err(|_| create_error!(InternalError))
                } else {
                    Err(create_error!(InternalError))
                }
            }
            ProtocolFormat::Msgpack => {
                if let Message::Binary(buf) = msg {
                    rmp_serde::from_slice(buf).map_err(|_| create_error!(InternalError))
                } else {
                    Err(create_error!(InternalError))
                }
            }
        }
    }

    /// Encode T: Serialize into a WebSocket message using the client's specified protocol format
    pub fn encode<T: Serialize>(&self, data: &T) -> Message {
        match self.format {
            ProtocolFormat::Json => {
                Message::Text(serde_json::to_string(data).expect("Failed to serialise (as json)."))
            }
            ProtocolFormat::Msgpack => Message::Binary(
                rmp_serde::to_vec_named(data).expect("Failed to serialise (as msgpack)."),
            ),
        }
    }

    /// Set the current session token
    pub fn set_session_token(&mut self, token: String) {
        self.session_token.replace(token);
    }

    /// Get the current session token
    pub fn get_session_token(&self) -> &Option<String> {
        &self.session_token
    }

    /// Get the protocol format specified
    pub fn get_protocol_format(&self) -> &ProtocolFormat {
        &self.format
    }
}

/// Object holding one side of a channel for receiving the parsed information
pub struct WebsocketHandshakeCallback {
    sender: Sender<ProtocolConfiguration>,
}

impl WebsocketHandshakeCallback {
    /// Create a callback using a given sender
    pub fn from(sender: Sender<ProtocolConfiguration>) -> Self {
        Self { sender }
    }
}

impl handshake::server::Callback for WebsocketHandshakeCallback {
    /// Handle request to create a new WebSocket connection
    fn on_request(
        self,
        request: &handshake::server::Request,
        response: handshake::server::Response,
    ) -> Result<handshake::server::Response, handshake::server::ErrorResponse> {
        // Take and parse query parameters from the URI.
        let query = request.uri().query().unwrap_or_default();
        let params = querystring::querify(query);

        // Set default values for the protocol.
        let mut format = ProtocolFormat::Json;
        let mut session_token = None;

        // Parse and map parameters from key-value to known variables.
        for (key, value) in params {
            match key {
                "format" => match value {
                    "json" => format = ProtocolFormat::Json,
                    "msgpack" => format = ProtocolFormat::Msgpack,
                    _ => {}
                },
                "token" => session_token = Some(value.into()),
                _ => {}
            }
        }

        // A bearer token in the headers takes precedence over the query.
        if let Some(token) = request
            .headers()
            .get("Authorization")
            .and_then(|header| header.to_str().ok())
            .and_then(|header| header.strip_prefix("Bearer "))
        {
            session_token = Some(token.into());
        }

        // Send configuration information back from this callback.
        // We have to use a channel as this function does not borrow mutably.
        if self
            .sender
            .send(ProtocolConfiguration {
                format,
                session_token,
            })
            .is_ok()
        {
            Ok(response)
        } else {
            Err(handshake::server::ErrorResponse::new(None))
        }
    }
}

#[cfg(test)]
mod tests {
    use async_tungstenite::tungstenite::Message;
    use quad_database::events::{client::Event, server::ClientMessage};

    use super::{ProtocolConfiguration, ProtocolFormat};

    #[test]
    fn encodes_and_decodes_json() {
        let config = ProtocolConfiguration {
            format: ProtocolFormat::Json,
            session_token: None,
        };

        let message = config.encode(&Event::ChatUnreadCount { unread_count: 2 });
        match &message {
            Message::Text(text) => assert!(text.contains("chat:unread_count")),
            _ => panic!("expected a text frame"),
        }

        let event: Event = config.decode(&message).unwrap();
        assert!(matches!(event, Event::ChatUnreadCount { unread_count: 2 }));
    }

    #[test]
    fn encodes_and_decodes_msgpack() {
        let config = ProtocolConfiguration {
            format: ProtocolFormat::Msgpack,
            session_token: None,
        };

        let message = config.encode(&ClientMessage::Typing {
            conversation_id: "01AAA".to_string(),
        });
        assert!(matches!(message, Message::Binary(_)));

        let payload: ClientMessage = config.decode(&message).unwrap();
        match payload {
            ClientMessage::Typing { conversation_id } => assert_eq!(conversation_id, "01AAA"),
            _ => panic!("expected a typing payload"),
        }
    }

    #[test]
    fn rejects_frames_in_the_wrong_format() {
        let config = ProtocolConfiguration {
            format: ProtocolFormat::Json,
            session_token: None,
        };

        assert!(config
            .decode::<ClientMessage>(&Message::Binary(vec![0x80]))
            .is_err());
    }
}
