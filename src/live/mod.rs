//! Session-scoped live credentials.
//!
//! A [`LiveCredentialSet`] holds the credentials a user supplied (or that
//! auto-connect validated) during one login session. It never touches disk
//! and only admits kinds that are safe to keep in memory.
//!
//! The set is shared between the request path and the background
//! auto-connect task, so every operation takes `&self` and the entries live
//! in a concurrent map.

use crate::credentials::{Credentials, ServerId};
use crate::error::CacheError;
use dashmap::DashMap;
use tracing::debug;


/// Result of [`LiveCredentialSet::cache_if_allowed`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheOutcome {
    Cached,
    /// The credential kind may not be cached; the set is unchanged.
    Discarded,
}

/// Per-user, per-session map of server id to credentials.
#[derive(Debug)]
pub struct LiveCredentialSet {
    user: String,
    entries: DashMap<ServerId, Credentials>,
}

impl LiveCredentialSet {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            entries: DashMap::new(),
        }
    }

    /// Username the set belongs to.
    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn get_credentials(&self, server_id: ServerId) -> Option<Credentials> {
        self.entries.get(&server_id).map(|entry| entry.value().clone())
    }

    pub fn has_credentials(&self, server_id: ServerId) -> bool {
        self.entries.contains_key(&server_id)
    }

    /// Caches `credentials` for `server_id` when their kind is cacheable.
    ///
    /// Replaces any previous entry for the server.
    pub fn cache_if_allowed(&self, server_id: ServerId, credentials: Credentials) -> CacheOutcome {
        if !credentials.is_cacheable() {
            debug!(
                user = %self.user,
                server_id,
                protocol = %credentials.protocol(),
                "Discarded non-cacheable credentials"
            );
            return CacheOutcome::Discarded;
        }

        self.entries.insert(server_id, credentials);
        CacheOutcome::Cached
    }

    pub fn uncache(&self, server_id: ServerId) -> Option<Credentials> {
        self.entries.remove(&server_id).map(|(_, creds)| creds)
    }

    /// Copies every entry of `other` whose server is not already present.
    ///
    /// Entries already in `self` are never overwritten. Returns the number
    /// of entries adopted.
    pub fn absorb(&self, other: &LiveCredentialSet) -> Result<usize, CacheError> {
        if self.user != other.user {
            return Err(CacheError::UserMismatch {
                expected: self.user.clone(),
                actual: other.user.clone(),
            });
        }

        if std::ptr::eq(self, other) {
            return Ok(0);
        }

        // Never hold shard guards of both sets at once
        let incoming: Vec<(ServerId, Credentials)> = other
            .entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut adopted = 0;
        for (server_id, credentials) in incoming {
            if let dashmap::mapref::entry::Entry::Vacant(slot) = self.entries.entry(server_id) {
                slot.insert(credentials);
                adopted += 1;
            }
        }

        debug!(user = %self.user, adopted, "Absorbed live credentials");
        Ok(adopted)
    }

    /// Server ids with cached credentials, ascending.
    pub fn server_ids(&self) -> Vec<ServerId> {
        let mut ids: Vec<ServerId> = self.entries.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
