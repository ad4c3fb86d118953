use async_channel::Receiver;
use async_std::sync::Mutex;
use futures::{pin_mut, select, FutureExt, SinkExt};
use quad_database::events::client::Event;
use sentry::Level;

use super::WsWriter;
use crate::config::ProtocolConfiguration;

/// Event subscriber loop
///
/// Forwards payloads queued onto this connection by the presence
/// registry, re-encoded into the client's chosen protocol format. The
/// queue closing means the session was evicted.
pub async fn client_subscriber(
    write: &Mutex<WsWriter>,
    cancelled: Receiver<()>,
    config: &ProtocolConfiguration,
    events: Receiver<String>,
) {
    loop {
        let event = events.recv().fuse();
        let cancelled = cancelled.recv().fuse();
        pin_mut!(event, cancelled);

        select! {
            _ = cancelled => { return; },
            event = event => {
                let Ok(payload) = event else {
                    // Queue is closed, the stale-connection sweeper got here first.
                    return;
                };

                let event = match serde_json::from_str::<Event>(&payload) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!("Failed to deserialise an event: {err:?}");
                        continue;
                    }
                };

                let result = write.lock().await.send(config.encode(&event)).await;
                if let Err(e) = result {
                    use async_tungstenite::tungstenite::Error;
                    if !matches!(e, Error::AlreadyClosed | Error::ConnectionClosed) {
                        let err = format!("Error while sending an event: {e:?}");
                        warn!("{}", err);
                        sentry::capture_message(&err, Level::Warning);
                    }

                    return;
                }
            }
        }
    }
}
