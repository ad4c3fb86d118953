use async_channel::Receiver;
use async_std::sync::Mutex;
use futures::{pin_mut, select, FutureExt, SinkExt, TryStreamExt};
use iso8601_timestamp::Timestamp;
use quad_database::{
    events::{client::Event, server::ClientMessage},
    Conversation, Database, Message, Notification,
};
use quad_presence::ConnectionHandle;
use sentry::Level;

use super::{WsReader, WsWriter};
use crate::config::ProtocolConfiguration;

/// Incoming message handling
pub async fn client_worker(
    mut read: WsReader,
    write: &Mutex<WsWriter>,
    cancelled: Receiver<()>,
    config: &ProtocolConfiguration,
    db: &'static Database,
    handle: &ConnectionHandle,
) {
    let user_id = handle.user_id();

    loop {
        let read = read.try_next().fuse();
        let cancelled = cancelled.recv().fuse();
        pin_mut!(read, cancelled);

        select! {
            _ = cancelled => { return; },
            msg = read => {
                let msg = match msg {
                    Ok(Some(msg)) => msg,
                    Ok(None) => {
                        warn!("Received a None message!");
                        sentry::capture_message("Received a None message!", Level::Warning);
                        return;
                    }
                    Err(e) => {
                        use async_tungstenite::tungstenite::Error;
                        if !matches!(e, Error::AlreadyClosed | Error::ConnectionClosed) {
                            let err = format!("Error while reading an event: {e:?}");
                            warn!("{}", err);
                            sentry::capture_message(&err, Level::Warning);
                        }

                        return;
                    }
                };

                let Ok(payload) = config.decode(&msg) else {
                    continue;
                };

                match payload {
                    ClientMessage::Ping => {
                        // Pings are what keep this connection clear of the
                        // stale-connection sweeper.
                        handle.touch();

                        write
                            .lock()
                            .await
                            .send(config.encode(&Event::Pong {
                                timestamp: Timestamp::now_utc(),
                            }))
                            .await
                            .ok();
                    }
                    ClientMessage::SendMessage {
                        conversation_id,
                        content,
                    } => match Message::send(db, &conversation_id, user_id, &content).await {
                        Ok(message) => {
                            write
                                .lock()
                                .await
                                .send(config.encode(&Event::ChatMessageSent {
                                    conversation_id,
                                    message,
                                }))
                                .await
                                .ok();
                        }
                        Err(err) => send_error(write, config, err.to_string()).await,
                    },
                    ClientMessage::MarkConversationRead { conversation_id } => {
                        match Conversation::mark_read(db, &conversation_id, user_id).await {
                            Ok(()) => match Conversation::unread_total(db, user_id).await {
                                Ok(unread_count) => {
                                    write
                                        .lock()
                                        .await
                                        .send(config.encode(&Event::ChatUnreadCount {
                                            unread_count,
                                        }))
                                        .await
                                        .ok();
                                }
                                Err(err) => send_error(write, config, err.to_string()).await,
                            },
                            Err(err) => send_error(write, config, err.to_string()).await,
                        }
                    }
                    ClientMessage::Typing { conversation_id } => {
                        // Typing indicators are advisory, failures are not
                        // reported back.
                        if let Err(err) = Conversation::typing(db, &conversation_id, user_id).await
                        {
                            debug!("Dropping typing indicator: {err:?}");
                        }
                    }
                    ClientMessage::MarkNotificationRead { notification_id } => {
                        match Notification::mark_read(db, &notification_id, user_id).await {
                            Ok(notification) => {
                                write
                                    .lock()
                                    .await
                                    .send(config.encode(&Event::NotificationReadSuccess {
                                        notification_id: notification.id,
                                        is_read: notification.is_read,
                                    }))
                                    .await
                                    .ok();
                            }
                            Err(err) => send_error(write, config, err.to_string()).await,
                        }
                    }
                    ClientMessage::MarkAllNotificationsRead => {
                        match Notification::mark_all_read(db, user_id).await {
                            Ok(count) => {
                                write
                                    .lock()
                                    .await
                                    .send(config.encode(&Event::NotificationAllReadSuccess {
                                        count,
                                    }))
                                    .await
                                    .ok();
                            }
                            Err(err) => send_error(write, config, err.to_string()).await,
                        }
                    }
                    ClientMessage::RequestUnreadCount => {
                        match db.count_unread_notifications(user_id).await {
                            Ok(unread_count) => {
                                write
                                    .lock()
                                    .await
                                    .send(config.encode(&Event::NotificationUnreadCount {
                                        unread_count,
                                    }))
                                    .await
                                    .ok();
                            }
                            Err(err) => send_error(write, config, err.to_string()).await,
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Report a failed action back to the connection that requested it
async fn send_error(write: &Mutex<WsWriter>, config: &ProtocolConfiguration, message: String) {
    write
        .lock()
        .await
        .send(config.encode(&Event::Error { message }))
        .await
        .ok();
}
