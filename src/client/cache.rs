//! Local username ↔ identity cache.
//!
//! Identities never change once the relay assigns them, so entries are
//! write-once and never go stale. The reverse map lets drained messages be
//! attributed to a sender name without scanning.

use log::warn;
use std::collections::HashMap;

use crate::common::messages::UserId;

#[derive(Debug, Default, Clone)]
pub struct IdentityCache {
    by_name: HashMap<String, UserId>,
    by_id: HashMap<UserId, String>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `username -> id` unless the name is already cached.
    ///
    /// Returns the identity that is cached afterwards, which is the earlier
    /// one if the key was already populated.
    pub fn insert(&mut self, username: &str, id: UserId) -> UserId {
        if let Some(&existing) = self.by_name.get(username) {
            if existing != id {
                warn!(
                    "⚠️  Ignoring identity {} for '{}', already cached as {}",
                    id, username, existing
                );
            }
            return existing;
        }
        self.by_name.insert(username.to_string(), id);
        self.by_id.insert(id, username.to_string());
        id
    }

    pub fn id_of(&self, username: &str) -> Option<UserId> {
        self.by_name.get(username).copied()
    }

    pub fn name_of(&self, id: UserId) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.by_name.contains_key(username)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
