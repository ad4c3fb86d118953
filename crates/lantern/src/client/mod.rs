use std::net::SocketAddr;

use async_std::{net::TcpStream, sync::Mutex};
use async_tungstenite::WebSocketStream;
use futures::{
    channel::oneshot,
    join,
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt, TryStreamExt,
};
use iso8601_timestamp::Timestamp;
use quad_config::report_internal_error;
use quad_database::{
    events::{client::Event, server::ClientMessage},
    Conversation, Database,
};

use crate::{
    client::{subscriber::client_subscriber, worker::client_worker},
    config::WebsocketHandshakeCallback,
};

mod subscriber;
mod worker;

pub type WsReader = SplitStream<WebSocketStream<TcpStream>>;
pub type WsWriter = SplitSink<WebSocketStream<TcpStream>, async_tungstenite::tungstenite::Message>;

/// Start a new WebSocket client worker given access to the database,
/// the relevant TCP stream and the remote address of the client.
pub async fn client(db: &'static Database, stream: TcpStream, addr: SocketAddr) {
    // Upgrade the TCP connection to a WebSocket connection.
    // In this process, we also parse any additional parameters given.
    // e.g. wss://example.com?format=json&token=...
    let (sender, receiver) = oneshot::channel();
    let Ok(ws) = async_tungstenite::accept_hdr_async_with_config(
        stream,
        WebsocketHandshakeCallback::from(sender),
        None,
    )
    .await
    else {
        return;
    };

    // Verify we've received a valid config, otherwise we should just drop the connection.
    let Ok(mut config) = receiver.await else {
        return;
    };

    info!(
        "User {addr:?} provided protocol configuration (format = {:?})",
        config.get_protocol_format()
    );

    // Split the socket for simultaneously read and write.
    let (mut write, mut read) = ws.split();

    // If the user has not provided authentication, request information.
    if config.get_session_token().is_none() {
        while let Ok(Some(message)) = read.try_next().await {
            if let Ok(ClientMessage::Authenticate { token }) = config.decode(&message) {
                config.set_session_token(token);
                break;
            }
        }
    }

    // Try to authenticate the user. A failed check drops the connection
    // without an error payload, the disconnect itself is the signal.
    let Some(token) = config.get_session_token().as_ref() else {
        return;
    };

    let settings = quad_config::config().await;
    let Ok(claims) = quad_auth::verify(&settings.api.security.jwt_secret, token) else {
        info!("User {addr:?} failed the token check.");
        return;
    };

    let user_id = claims.sub;
    info!("User {addr:?} authenticated as {user_id}");

    // Catch the session up with its unread badges before subscribing.
    let unread_notifications =
        match report_internal_error!(db.count_unread_notifications(&user_id).await) {
            Ok(count) => count,
            Err(_) => return,
        };

    let unread_messages =
        match report_internal_error!(Conversation::unread_total(db, &user_id).await) {
            Ok(count) => count,
            Err(_) => return,
        };

    if report_internal_error!(
        write
            .send(config.encode(&Event::NotificationUnreadCount {
                unread_count: unread_notifications,
            }))
            .await
    )
    .is_err()
    {
        return;
    }

    if report_internal_error!(
        write
            .send(config.encode(&Event::ChatUnreadCount {
                unread_count: unread_messages,
            }))
            .await
    )
    .is_err()
    {
        return;
    }

    // Create the presence session.
    let (sender, receiver) = async_channel::bounded(quad_presence::CHANNEL_CAPACITY);
    let (first_session, handle) = quad_presence::register(&user_id, sender);

    // If this was the first session, everyone learns the new online count.
    if first_session {
        Event::SystemOnlineCount {
            online_users: quad_presence::online_count(),
            timestamp: Timestamp::now_utc(),
        }
        .global();
    }

    {
        let write = Mutex::new(write);
        let (cancel_1, cancelled_1) = async_channel::bounded(1);
        let (cancel_2, cancelled_2) = async_channel::bounded(1);

        join!(
            async {
                client_subscriber(&write, cancelled_1, &config, receiver).await;
                cancel_2.send(()).await.ok();
            },
            async {
                client_worker(read, &write, cancelled_2, &config, db, &handle).await;
                cancel_1.send(()).await.ok();
            }
        );
    }

    // Clean up the presence session.
    let last_session = quad_presence::deregister(&handle);

    // If this was the last session, everyone learns the new online count.
    if last_session {
        Event::SystemOnlineCount {
            online_users: quad_presence::online_count(),
            timestamp: Timestamp::now_utc(),
        }
        .global();
    }

    info!("User {addr:?} disconnected.");
}
