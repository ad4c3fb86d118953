#[macro_use]
extern crate log;

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_channel::{Sender, TrySendError};
use once_cell::sync::Lazy;

mod operations;
use operations::{
    RegistryMap, __add_to_set, __get_all_members, __get_set_members, __get_set_size,
    __remove_from_set,
};

/// Capacity of each connection's push buffer; events beyond this are
/// dropped for that connection rather than awaited
pub static CHANNEL_CAPACITY: usize = 64;

static REGISTRY: Lazy<Mutex<RegistryMap>> = Lazy::new(Default::default);
static NEXT_SESSION_ID: AtomicU32 = AtomicU32::new(1);
static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

fn registry() -> MutexGuard<'static, RegistryMap> {
    REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}

fn now_millis() -> u64 {
    EPOCH.elapsed().as_millis() as u64
}

/// Live connection registered for a user
///
/// Cheap to clone; all clones refer to the same session.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    session_id: u32,
    user_id: String,
    sender: Sender<String>,
    last_seen: AtomicU64,
    deregistered: AtomicBool,
}

impl ConnectionHandle {
    pub fn session_id(&self) -> u32 {
        self.inner.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    /// Refresh the liveness clock
    ///
    /// Only the handshake and an explicit keep-alive ping refresh it;
    /// regular traffic does not count as liveness.
    pub fn touch(&self) {
        self.inner.last_seen.store(now_millis(), Ordering::Relaxed);
    }

    /// Time since the last handshake or keep-alive ping
    pub fn idle_for(&self) -> Duration {
        let last_seen = self.inner.last_seen.load(Ordering::Relaxed);
        Duration::from_millis(now_millis().saturating_sub(last_seen))
    }

    /// Queue a payload for delivery on this connection; best-effort
    pub fn push(&self, payload: String) -> bool {
        match self.inner.sender.try_send(payload) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Push buffer full for session {} of {}, dropping event.",
                    self.session_id(),
                    self.user_id()
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Stop accepting pushes and wake the owning connection for teardown
    pub fn close(&self) {
        self.inner.sender.close();
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, age: Duration) {
        self.inner.last_seen.store(
            now_millis().saturating_sub(age.as_millis() as u64),
            Ordering::Relaxed,
        );
    }
}

/// Register a new connection for a user, seeding its liveness clock;
/// returns whether this brought the user online and the created handle
pub fn register(user_id: &str, sender: Sender<String>) -> (bool, ConnectionHandle) {
    let session_id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);

    let handle = ConnectionHandle {
        inner: Arc::new(HandleInner {
            session_id,
            user_id: user_id.to_string(),
            sender,
            last_seen: AtomicU64::new(now_millis()),
            deregistered: AtomicBool::new(false),
        }),
    };

    let mut map = registry();
    let was_empty = __get_set_size(&map, user_id) == 0;
    __add_to_set(&mut map, user_id, handle.clone());

    info!("Created session for {user_id}, assigned them a session ID of {session_id}.");
    (was_empty, handle)
}

/// Remove a connection from the registry; returns whether the user just
/// went offline
///
/// Idempotent: teardown and a stale sweep may race to deregister the
/// same handle, only the first call has any effect.
pub fn deregister(handle: &ConnectionHandle) -> bool {
    if handle.inner.deregistered.swap(true, Ordering::SeqCst) {
        return false;
    }

    let went_offline = __remove_from_set(&mut registry(), handle.user_id(), handle.session_id());
    if went_offline {
        info!("User ID {} just went offline.", handle.user_id());
    }

    went_offline
}

/// Check whether a given user ID is online
pub fn is_online(user_id: &str) -> bool {
    __get_set_size(&registry(), user_id) > 0
}

/// Number of distinct users currently online
pub fn online_count() -> usize {
    registry().len()
}

/// Snapshot of a user's live connections
pub fn handles_for(user_id: &str) -> Vec<ConnectionHandle> {
    __get_set_members(&registry(), user_id)
}

/// Queue a payload to every connection of one user; best-effort,
/// returns how many connections accepted it
pub fn publish(user_id: &str, payload: String) -> usize {
    let handles = __get_set_members(&registry(), user_id);

    let mut delivered = 0;
    for handle in handles {
        if handle.push(payload.clone()) {
            delivered += 1;
        }
    }

    delivered
}

/// Queue a payload to every connection of every online user
pub fn publish_all(payload: String) -> usize {
    let handles = __get_all_members(&registry());

    let mut delivered = 0;
    for handle in handles {
        if handle.push(payload.clone()) {
            delivered += 1;
        }
    }

    delivered
}

/// Evict every connection that has been idle for at least `timeout`
///
/// Eviction closes the connection's push channel to wake its owner and
/// then runs the usual deregistration path, so racing with normal
/// teardown is harmless.
pub fn sweep_stale(timeout: Duration) -> Vec<ConnectionHandle> {
    let stale: Vec<ConnectionHandle> = __get_all_members(&registry())
        .into_iter()
        .filter(|handle| handle.idle_for() >= timeout)
        .collect();

    for handle in &stale {
        handle.close();
        deregister(handle);
        info!(
            "Evicted stale session {} of {}.",
            handle.session_id(),
            handle.user_id()
        );
    }

    stale
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_channel::Receiver;
    use rand::Rng;
    use serial_test::serial;

    fn channel() -> (Sender<String>, Receiver<String>) {
        async_channel::bounded(CHANNEL_CAPACITY)
    }

    fn random_user() -> String {
        rand::thread_rng().gen::<u32>().to_string()
    }

    #[test]
    #[serial]
    fn it_works() {
        // Clear out anything left behind by other tests:
        sweep_stale(Duration::ZERO);

        let user_id = random_user();
        let other_id = random_user();

        // Create a session
        let (sender, receiver) = channel();
        let (first_session, handle) = register(&user_id, sender);
        assert!(first_session);
        assert!(is_online(&user_id));
        assert_eq!(online_count(), 1);

        // Create a few more sessions
        let (sender, second_receiver) = channel();
        let (first_session, second_handle) = register(&user_id, sender);
        assert!(!first_session);
        assert_ne!(handle.session_id(), second_handle.session_id());
        assert_eq!(handles_for(&user_id).len(), 2);

        let (sender, _other_receiver) = channel();
        let (first_session, other_handle) = register(&other_id, sender);
        assert!(first_session);
        assert_eq!(online_count(), 2);

        // Fan a payload out to every session of one user
        assert_eq!(publish(&user_id, "hello".to_string()), 2);
        assert_eq!(receiver.try_recv().unwrap(), "hello");
        assert_eq!(second_receiver.try_recv().unwrap(), "hello");

        // Remove sessions one by one
        assert!(!deregister(&handle));
        assert!(is_online(&user_id));

        assert!(deregister(&second_handle));
        assert!(!is_online(&user_id));
        assert!(handles_for(&user_id).is_empty());

        assert!(deregister(&other_handle));
        assert_eq!(online_count(), 0);
    }

    #[test]
    #[serial]
    fn deregister_is_idempotent() {
        sweep_stale(Duration::ZERO);

        let user_id = random_user();
        let (sender, _receiver) = channel();
        let (_, handle) = register(&user_id, sender);

        assert!(deregister(&handle));
        assert!(!deregister(&handle));
        assert!(!is_online(&user_id));
        assert_eq!(online_count(), 0);
    }

    #[test]
    #[serial]
    fn sweep_evicts_only_stale_sessions() {
        sweep_stale(Duration::ZERO);

        let user_id = random_user();
        let other_id = random_user();

        let (sender, receiver) = channel();
        let (_, stale_handle) = register(&user_id, sender);
        stale_handle.backdate(Duration::from_secs(90));

        let (sender, _receiver) = channel();
        let (_, live_handle) = register(&other_id, sender);

        let evicted = sweep_stale(Duration::from_secs(60));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].session_id(), stale_handle.session_id());

        // The stale user went offline and their channel woke up closed
        assert!(!is_online(&user_id));
        assert!(receiver.try_recv().is_err());
        assert!(receiver.is_closed());

        // The live user was untouched
        assert!(is_online(&other_id));
        deregister(&live_handle);
    }

    #[test]
    #[serial]
    fn eviction_racing_teardown_is_harmless() {
        sweep_stale(Duration::ZERO);

        let user_id = random_user();
        let (sender, _receiver) = channel();
        let (_, handle) = register(&user_id, sender);
        handle.backdate(Duration::from_secs(90));

        let evicted = sweep_stale(Duration::from_secs(60));
        assert_eq!(evicted.len(), 1);

        // Normal teardown arrives late and finds nothing left to do
        assert!(!deregister(&handle));
        assert!(!is_online(&user_id));
    }

    #[test]
    #[serial]
    fn publish_is_best_effort() {
        sweep_stale(Duration::ZERO);

        let user_id = random_user();

        // A session whose receiver has gone away entirely
        let (sender, receiver) = channel();
        let (_, dead_handle) = register(&user_id, sender);
        drop(receiver);

        // A session whose buffer is completely full
        let (sender, _full_receiver) = channel();
        let (_, full_handle) = register(&user_id, sender);
        while full_handle.push("filler".to_string()) {}

        assert_eq!(publish(&user_id, "dropped".to_string()), 0);

        // Neither failure deregisters anything on its own
        assert!(is_online(&user_id));

        deregister(&dead_handle);
        deregister(&full_handle);
    }
}
