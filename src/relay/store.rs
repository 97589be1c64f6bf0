//! # Relay Store - Directory and Message Queues
//!
//! The store owns the two pieces of relay state:
//! - the **directory**, mapping usernames to identities (1:1, append-only)
//! - one FIFO **queue** of undelivered messages per identity
//!
//! Both live behind their own lock. Registration checks and inserts under a
//! single write guard, so two racing registrations of one name produce
//! exactly one identity. Queue pushes and pops each hold the queue lock for
//! the whole operation, so a message is never lost or handed out twice.

use log::debug;
use std::collections::{HashMap, VecDeque};
use tokio::sync::{Mutex, RwLock};

use crate::common::messages::UserId;

/// Longest accepted username, in bytes.
pub const MAX_USERNAME_LEN: usize = 64;

/// Outcome of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The name was free and now maps to this new identity.
    Created(UserId),
    /// The name was already taken. The existing identity is deliberately not returned.
    AlreadyExists,
}

/// A message waiting in its recipient's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub body: String,
}

#[derive(Debug, Default)]
struct Directory {
    ids: HashMap<String, UserId>,
    names: HashMap<UserId, String>,
    last_id: u64,
}

/// Authoritative relay state.
#[derive(Debug, Default)]
pub struct RelayStore {
    directory: RwLock<Directory>,
    queues: Mutex<HashMap<UserId, VecDeque<QueuedMessage>>>,
}

impl RelayStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `username`, creating a fresh identity if the name is unseen.
    pub async fn register(&self, username: &str) -> Registration {
        let mut directory = self.directory.write().await;
        if directory.ids.contains_key(username) {
            return Registration::AlreadyExists;
        }

        directory.last_id += 1;
        let id = UserId(directory.last_id);
        directory.ids.insert(username.to_string(), id);
        directory.names.insert(id, username.to_string());
        drop(directory);

        self.queues.lock().await.entry(id).or_default();
        debug!("📇 Directory entry created: '{}' -> {}", username, id);
        Registration::Created(id)
    }

    pub async fn lookup(&self, username: &str) -> Option<UserId> {
        self.directory.read().await.ids.get(username).copied()
    }

    pub async fn is_registered(&self, id: UserId) -> bool {
        self.directory.read().await.names.contains_key(&id)
    }

    /// Snapshot of all registered usernames, sorted.
    pub async fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.directory.read().await.ids.keys().cloned().collect();
        names.sort();
        names
    }

    /// Append a message to the recipient's queue.
    ///
    /// Returns the recipient's queue depth after the push.
    pub async fn enqueue(&self, message: QueuedMessage) -> usize {
        let mut queues = self.queues.lock().await;
        let queue = queues.entry(message.recipient_id).or_default();
        queue.push_back(message);
        queue.len()
    }

    /// Remove and return the oldest message for `recipient`.
    pub async fn pop(&self, recipient: UserId) -> Option<QueuedMessage> {
        self.queues
            .lock()
            .await
            .get_mut(&recipient)
            .and_then(VecDeque::pop_front)
    }

    pub async fn queue_depth(&self, recipient: UserId) -> usize {
        self.queues
            .lock()
            .await
            .get(&recipient)
            .map_or(0, VecDeque::len)
    }
}

/// Check that a username can be stored and later addressed from the console.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("username must not be empty".to_string());
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(format!(
            "username is longer than {} bytes",
            MAX_USERNAME_LEN
        ));
    }
    if username.chars().any(char::is_whitespace) {
        return Err("username must not contain whitespace".to_string());
    }
    Ok(())
}
