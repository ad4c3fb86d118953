use std::collections::HashMap;

use crate::ConnectionHandle;

pub type RegistryMap = HashMap<String, Vec<ConnectionHandle>>;

/// Add a handle to a user's session set
pub fn __add_to_set(map: &mut RegistryMap, user_id: &str, handle: ConnectionHandle) {
    map.entry(user_id.to_string()).or_default().push(handle);
}

/// Remove a handle from a user's session set, dropping the set entirely
/// once it empties; returns whether it emptied
pub fn __remove_from_set(map: &mut RegistryMap, user_id: &str, session_id: u32) -> bool {
    if let Some(handles) = map.get_mut(user_id) {
        handles.retain(|handle| handle.session_id() != session_id);

        if handles.is_empty() {
            map.remove(user_id);
            return true;
        }
    }

    false
}

/// Number of handles in a user's session set
pub fn __get_set_size(map: &RegistryMap, user_id: &str) -> usize {
    map.get(user_id)
        .map(|handles| handles.len())
        .unwrap_or_default()
}

/// Snapshot of a user's session set
pub fn __get_set_members(map: &RegistryMap, user_id: &str) -> Vec<ConnectionHandle> {
    map.get(user_id).cloned().unwrap_or_default()
}

/// Snapshot of every session set in the registry
pub fn __get_all_members(map: &RegistryMap) -> Vec<ConnectionHandle> {
    map.values().flatten().cloned().collect()
}
