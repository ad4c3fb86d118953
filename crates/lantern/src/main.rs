use async_std::{net::TcpListener, task};

#[macro_use]
extern crate log;

pub mod config;

mod client;
mod database;
mod heartbeat;

#[async_std::main]
async fn main() {
    // Configure requirements for Lantern.
    let settings = quad_config::config().await;
    let _sentry = quad_config::setup_logging(&settings.sentry.dsn);
    quad_config::init().await;
    database::connect().await;

    // Evict silent connections in the background.
    task::spawn(heartbeat::worker());

    // Setup a TCP listener to accept WebSocket connections on.
    // By default, we bind to port 9470 on all interfaces.
    let bind = &settings.hosts.events;
    info!("Listening on host {bind}");
    let try_socket = TcpListener::bind(bind).await;
    let listener = try_socket.expect("Failed to bind");

    // Start accepting new connections and spawn a client for each connection.
    while let Ok((stream, addr)) = listener.accept().await {
        task::spawn(client::client(database::get_db(), stream, addr));
    }
}
