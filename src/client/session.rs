//! # Chat Session - Protocol Driver
//!
//! Drives the chat protocol for one user on top of a [`RelayTransport`]:
//!
//! 1. **Resolve self**: `register`, falling back to `get_user_id` when the
//!    name is taken, so a returning user reclaims their identity
//! 2. **Refresh peers**: `get_user_list`, drop our own name, resolve every
//!    name not yet cached
//! 3. **Drain**: `get` until the relay says "no messages", naming each
//!    sender through the reverse cache
//! 4. **Send**: to a member of the last refreshed peer set
//!
//! Every operation is a sequence of single request/reply round trips; the
//! session never has two requests in flight.

use log::{debug, info};
use std::collections::BTreeSet;

use crate::client::cache::IdentityCache;
use crate::client::client::RelayTransport;
use crate::common::error::{ChatError, Result};
use crate::common::messages::{Delivery, Payload, Reply, Request, UserId, USER_EXISTS};

/// A drained message with its sender resolved to a username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub sender: String,
    pub body: String,
}

/// Client-side protocol state for one user.
pub struct ChatSession<T> {
    transport: T,
    cache: IdentityCache,
    peers: BTreeSet<String>,
}

impl<T: RelayTransport> ChatSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            cache: IdentityCache::new(),
            peers: BTreeSet::new(),
        }
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// Peers seen by the most recent [`refresh_peers`](Self::refresh_peers).
    pub fn peers(&self) -> &BTreeSet<String> {
        &self.peers
    }

    /// Obtain our own identity, registering `username` if needed.
    ///
    /// Any failure is a [`ChatError::IdentityResolution`]: the session cannot
    /// continue without an identity.
    pub async fn resolve_self(&mut self, username: &str) -> Result<UserId> {
        if let Some(id) = self.cache.id_of(username) {
            return Ok(id);
        }

        let identity_error = |reason: String| ChatError::IdentityResolution {
            username: username.to_string(),
            reason,
        };

        let register = Request::Register {
            username: username.to_string(),
        };
        let id = match self.transport.request(register).await {
            Ok(Reply::Success(Payload::Identity(id))) => {
                info!("👤 Registered as '{}' ({})", username, id);
                id
            }
            Ok(Reply::Conflict(reason)) if reason == USER_EXISTS => {
                debug!("'{}' already registered, looking it up", username);
                let id = self
                    .lookup(username)
                    .await
                    .map_err(|e| identity_error(e.to_string()))?;
                info!("👤 Reclaimed existing identity {} for '{}'", id, username);
                id
            }
            Ok(Reply::Error(message)) => return Err(identity_error(message)),
            Ok(other) => return Err(identity_error(format!("unexpected reply {:?}", other))),
            Err(e) => return Err(identity_error(e.to_string())),
        };

        Ok(self.cache.insert(username, id))
    }

    /// Identity of a peer that is expected to be registered already.
    ///
    /// There is no register fallback; failure is a [`ChatError::PeerLookup`].
    pub async fn resolve_peer(&mut self, username: &str) -> Result<UserId> {
        if let Some(id) = self.cache.id_of(username) {
            return Ok(id);
        }

        let id = self
            .lookup(username)
            .await
            .map_err(|e| ChatError::PeerLookup {
                username: username.to_string(),
                reason: e.to_string(),
            })?;
        debug!("Resolved peer '{}' -> {}", username, id);
        Ok(self.cache.insert(username, id))
    }

    /// Fetch the directory listing and cache every new peer.
    ///
    /// Returns the peer names (our own excluded) in sorted order.
    pub async fn refresh_peers(&mut self, self_username: &str) -> Result<Vec<String>> {
        let names = match self.transport.request(Request::GetUserList).await? {
            Reply::Listing(names) => names,
            Reply::Error(message) => return Err(ChatError::Relay(message)),
            other => {
                return Err(ChatError::UnexpectedReply {
                    action: "get_user_list",
                    reply: format!("{:?}", other),
                })
            }
        };

        let peers: BTreeSet<String> = names
            .into_iter()
            .filter(|name| name != self_username)
            .collect();

        for peer in &peers {
            if !self.cache.contains(peer) {
                self.resolve_peer(peer).await?;
            }
        }

        self.peers = peers;
        Ok(self.peers.iter().cloned().collect())
    }

    /// Pull every queued message for `self_id`.
    ///
    /// Each message is passed to `on_message` as soon as it is popped, so a
    /// failure later in the drain does not lose earlier messages. Returns the
    /// number of messages delivered.
    pub async fn drain<F>(&mut self, self_id: UserId, mut on_message: F) -> Result<usize>
    where
        F: FnMut(ReceivedMessage),
    {
        let mut delivered = 0;
        loop {
            match self.transport.request(Request::Get { user_id: self_id }).await? {
                Reply::Empty => break,
                Reply::Success(Payload::Delivery(Delivery { sender_id, message })) => {
                    let sender = self
                        .cache
                        .name_of(sender_id)
                        .ok_or(ChatError::UnknownSender(sender_id))?
                        .to_string();
                    delivered += 1;
                    on_message(ReceivedMessage {
                        sender,
                        body: message,
                    });
                }
                Reply::Error(message) => return Err(ChatError::Relay(message)),
                other => {
                    return Err(ChatError::UnexpectedReply {
                        action: "get",
                        reply: format!("{:?}", other),
                    })
                }
            }
        }

        if delivered > 0 {
            debug!("📬 Drained {} message(s) for {}", delivered, self_id);
        }
        Ok(delivered)
    }

    /// Convenience wrapper around [`drain`](Self::drain) collecting the messages.
    pub async fn drain_all(&mut self, self_id: UserId) -> Result<Vec<ReceivedMessage>> {
        let mut messages = Vec::new();
        self.drain(self_id, |message| messages.push(message)).await?;
        Ok(messages)
    }

    /// Send `text` to a peer from the last refreshed peer set.
    pub async fn send(&mut self, self_id: UserId, target_username: &str, text: &str) -> Result<()> {
        if !self.peers.contains(target_username) {
            return Err(ChatError::NotAPeer(target_username.to_string()));
        }
        let target_id = self.resolve_peer(target_username).await?;

        let request = Request::Send {
            user_id: self_id,
            target_user_id: target_id,
            message: text.to_string(),
        };
        match self.transport.request(request).await? {
            Reply::Success(_) => {
                debug!("📨 Sent message to '{}' ({})", target_username, target_id);
                Ok(())
            }
            Reply::Error(message) => Err(ChatError::Relay(message)),
            other => Err(ChatError::UnexpectedReply {
                action: "send",
                reply: format!("{:?}", other),
            }),
        }
    }

    /// `get_user_id` without touching the cache.
    async fn lookup(&mut self, username: &str) -> Result<UserId> {
        let request = Request::GetUserId {
            username: username.to_string(),
        };
        match self.transport.request(request).await? {
            Reply::Success(Payload::Identity(id)) => Ok(id),
            Reply::Error(message) => Err(ChatError::Relay(message)),
            other => Err(ChatError::UnexpectedReply {
                action: "get_user_id",
                reply: format!("{:?}", other),
            }),
        }
    }
}
