//! Session attribute holding each session's live credentials.
//!
//! The real session container belongs to the web layer; this module defines
//! the contract the credential layer needs from it and an in-memory
//! implementation used by the binary and tests.

use crate::live::LiveCredentialSet;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Session-scoped storage of one [`LiveCredentialSet`] per session id.
///
/// Read and written both by request handling and by background tasks.
pub trait SessionStore: Send + Sync {
    fn get(&self, session_id: &str) -> Option<Arc<LiveCredentialSet>>;

    /// Replaces the live credentials attribute of the session.
    fn put(&self, session_id: &str, credentials: Arc<LiveCredentialSet>);

    fn remove(&self, session_id: &str) -> Option<Arc<LiveCredentialSet>>;

    /// Atomically merges `fresh` into the session's live credentials.
    ///
    /// An existing set of the same user absorbs `fresh` and keeps its own
    /// entries. A missing set, or one belonging to another user, is replaced
    /// by `fresh`. Returns the set now stored.
    fn merge(&self, session_id: &str, fresh: LiveCredentialSet) -> Arc<LiveCredentialSet>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Arc<LiveCredentialSet>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, session_id: &str) -> Option<Arc<LiveCredentialSet>> {
        self.sessions.get(session_id).map(|entry| Arc::clone(entry.value()))
    }

    fn put(&self, session_id: &str, credentials: Arc<LiveCredentialSet>) {
        self.sessions.insert(session_id.to_string(), credentials);
    }

    fn remove(&self, session_id: &str) -> Option<Arc<LiveCredentialSet>> {
        self.sessions.remove(session_id).map(|(_, set)| set)
    }

    fn merge(&self, session_id: &str, fresh: LiveCredentialSet) -> Arc<LiveCredentialSet> {
        // The entry guard is held across absorb and insert
        match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(mut slot) => match slot.get().absorb(&fresh) {
                Ok(adopted) => {
                    debug!(session_id, adopted, "Merged live credentials into session");
                    Arc::clone(slot.get())
                }
                Err(e) => {
                    warn!(session_id, error = %e, "Session holds another user's credentials, replacing");
                    let fresh = Arc::new(fresh);
                    slot.insert(Arc::clone(&fresh));
                    fresh
                }
            },
            Entry::Vacant(slot) => {
                let fresh = Arc::new(fresh);
                slot.insert(Arc::clone(&fresh));
                fresh
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credentials;

    #[test]
    fn test_put_get_remove() {
        let sessions = InMemorySessionStore::new();
        assert!(sessions.get("s1").is_none());

        let set = Arc::new(LiveCredentialSet::new("alice"));
        set.cache_if_allowed(1, Credentials::basic("u", "p"));
        sessions.put("s1", Arc::clone(&set));

        let stored = sessions.get("s1").unwrap();
        assert!(Arc::ptr_eq(&stored, &set));
        assert_eq!(sessions.len(), 1);

        assert!(sessions.remove("s1").is_some());
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_put_replaces_attribute() {
        let sessions = InMemorySessionStore::new();
        sessions.put("s1", Arc::new(LiveCredentialSet::new("alice")));

        let replacement = Arc::new(LiveCredentialSet::new("alice"));
        replacement.cache_if_allowed(9, Credentials::basic("u", "p"));
        sessions.put("s1", replacement);

        assert!(sessions.get("s1").unwrap().has_credentials(9));
    }

    #[test]
    fn test_merge_keeps_existing_entries() {
        let sessions = InMemorySessionStore::new();
        let existing = Arc::new(LiveCredentialSet::new("alice"));
        existing.cache_if_allowed(1, Credentials::basic("typed", "pw0"));
        sessions.put("s1", Arc::clone(&existing));

        let fresh = LiveCredentialSet::new("alice");
        fresh.cache_if_allowed(1, Credentials::basic("alice", "pw"));
        fresh.cache_if_allowed(2, Credentials::basic("alice", "pw"));

        let merged = sessions.merge("s1", fresh);
        assert!(Arc::ptr_eq(&merged, &existing));
        assert_eq!(merged.get_credentials(1), Some(Credentials::basic("typed", "pw0")));
        assert!(merged.has_credentials(2));
    }

    #[test]
    fn test_merge_into_missing_or_foreign_session() {
        let sessions = InMemorySessionStore::new();

        let fresh = LiveCredentialSet::new("alice");
        fresh.cache_if_allowed(2, Credentials::basic("alice", "pw"));
        sessions.merge("s1", fresh);
        assert!(sessions.get("s1").unwrap().has_credentials(2));

        sessions.put("s2", Arc::new(LiveCredentialSet::new("bob")));
        let fresh = LiveCredentialSet::new("alice");
        fresh.cache_if_allowed(3, Credentials::basic("alice", "pw"));
        let merged = sessions.merge("s2", fresh);
        assert_eq!(merged.user(), "alice");
        assert_eq!(sessions.get("s2").unwrap().server_ids(), vec![3]);
    }

    #[test]
    fn test_concurrent_merges_lose_nothing() {
        let sessions = Arc::new(InMemorySessionStore::new());

        let handles: Vec<_> = (0..8)
            .map(|id| {
                let sessions = Arc::clone(&sessions);
                std::thread::spawn(move || {
                    let fresh = LiveCredentialSet::new("alice");
                    fresh.cache_if_allowed(id, Credentials::basic("alice", "pw"));
                    sessions.merge("s1", fresh);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(sessions.get("s1").unwrap().server_ids(), (0..8).collect::<Vec<_>>());
    }
}
