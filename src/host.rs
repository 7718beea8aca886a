use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Role embedded in a participant's access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Participant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Participant => "participant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// HostStore
// ---------------------------------------------------------------------------

/// Outcome of [`HostStore::compare_and_insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostClaim {
    /// This call created the record.
    Inserted,
    /// A record already existed; carries the recorded host identity.
    Existing(String),
}

/// Room → host identity mapping.
///
/// Records are created once per room and only ever removed by `delete`.
/// The in-process implementation is [`MemoryHostStore`]; a shared backend
/// can be dropped in behind the same interface.
pub trait HostStore: Send + Sync {
    fn get(&self, room: &str) -> Option<String>;

    /// Insert `room → identity` only if `room` has no record yet. The check
    /// and the insert happen atomically.
    fn compare_and_insert(&self, room: &str, identity: &str) -> HostClaim;

    fn delete(&self, room: &str) -> Option<String>;

    /// Number of rooms with a recorded host.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local host map. Not persisted and not shared between instances.
#[derive(Debug, Default)]
pub struct MemoryHostStore {
    hosts: DashMap<String, String>,
}

impl MemoryHostStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HostStore for MemoryHostStore {
    fn get(&self, room: &str) -> Option<String> {
        self.hosts.get(room).map(|entry| entry.value().clone())
    }

    fn compare_and_insert(&self, room: &str, identity: &str) -> HostClaim {
        // The entry guard holds the shard lock across check and insert.
        match self.hosts.entry(room.to_string()) {
            Entry::Occupied(existing) => HostClaim::Existing(existing.get().clone()),
            Entry::Vacant(slot) => {
                slot.insert(identity.to_string());
                HostClaim::Inserted
            }
        }
    }

    fn delete(&self, room: &str) -> Option<String> {
        self.hosts.remove(room).map(|(_, identity)| identity)
    }

    fn len(&self) -> usize {
        self.hosts.len()
    }
}

// ---------------------------------------------------------------------------
// Election
// ---------------------------------------------------------------------------

/// First-writer-wins host election.
///
/// The first identity to ask for a room becomes its host; that same identity
/// keeps `host` on every later request, everybody else is a `participant`.
pub fn elect(store: &dyn HostStore, room: &str, identity: &str) -> Role {
    let role = match store.compare_and_insert(room, identity) {
        HostClaim::Inserted => Role::Host,
        HostClaim::Existing(host) if host == identity => Role::Host,
        HostClaim::Existing(_) => Role::Participant,
    };
    debug!(room, identity, role = role.as_str(), "role elected");
    role
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_requester_becomes_host() {
        let store = MemoryHostStore::new();
        assert_eq!(elect(&store, "alpha", "u1"), Role::Host);
        assert_eq!(store.get("alpha").as_deref(), Some("u1"));
    }

    #[test]
    fn same_identity_reclaims_host() {
        let store = MemoryHostStore::new();
        elect(&store, "alpha", "u1");
        assert_eq!(elect(&store, "alpha", "u1"), Role::Host);
        assert_eq!(elect(&store, "alpha", "u1"), Role::Host);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn other_identity_is_participant_and_record_unchanged() {
        let store = MemoryHostStore::new();
        elect(&store, "alpha", "u1");
        assert_eq!(elect(&store, "alpha", "u2"), Role::Participant);
        assert_eq!(store.get("alpha").as_deref(), Some("u1"));
    }

    #[test]
    fn rooms_are_independent() {
        let store = MemoryHostStore::new();
        assert_eq!(elect(&store, "alpha", "u1"), Role::Host);
        assert_eq!(elect(&store, "beta", "u2"), Role::Host);
        assert_eq!(elect(&store, "beta", "u1"), Role::Participant);
    }

    #[test]
    fn delete_resets_election() {
        let store = MemoryHostStore::new();
        elect(&store, "alpha", "u1");
        assert_eq!(store.delete("alpha").as_deref(), Some("u1"));
        assert!(store.is_empty());
        assert_eq!(elect(&store, "alpha", "u2"), Role::Host);
    }

    #[test]
    fn compare_and_insert_reports_existing_host() {
        let store = MemoryHostStore::new();
        assert_eq!(store.compare_and_insert("alpha", "u1"), HostClaim::Inserted);
        assert_eq!(
            store.compare_and_insert("alpha", "u2"),
            HostClaim::Existing("u1".into())
        );
    }

    #[test]
    fn concurrent_first_requests_elect_exactly_one_host() {
        let store = Arc::new(MemoryHostStore::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || elect(store.as_ref(), "race", &format!("user-{i}")))
            })
            .collect();

        let roles: Vec<Role> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let hosts = roles.iter().filter(|r| **r == Role::Host).count();

        assert_eq!(hosts, 1);
        assert!(store.get("race").is_some());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Host).unwrap(), "\"host\"");
        assert_eq!(Role::Participant.to_string(), "participant");
    }
}
