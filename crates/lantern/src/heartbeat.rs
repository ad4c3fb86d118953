use std::time::Duration;

use async_std::task;
use iso8601_timestamp::Timestamp;
use quad_database::events::client::Event;

/// Periodically evict connections whose clients have gone silent
///
/// Runs for the lifetime of the process. Whenever a sweep evicts at
/// least one connection, the fresh online count is broadcast so
/// clients converge on the same number.
pub async fn worker() {
    let config = quad_config::config().await;
    let interval = Duration::from_secs(config.events.heartbeat_interval);
    let timeout = Duration::from_secs(config.events.heartbeat_timeout);

    loop {
        task::sleep(interval).await;

        let evicted = quad_presence::sweep_stale(timeout);
        if !evicted.is_empty() {
            info!("Evicted {} stale connections.", evicted.len());

            Event::SystemOnlineCount {
                online_users: quad_presence::online_count(),
                timestamp: Timestamp::now_utc(),
            }
            .global();
        }
    }
}
