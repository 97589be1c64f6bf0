//! # Relay Service - Request Dispatch
//!
//! Maps each decoded [`Request`] to a [`Reply`] against the [`RelayStore`].
//! The service knows nothing about sockets; the UDP server in
//! [`server`](super::server) feeds it, and tests can drive it directly.

use log::{debug, info, warn};
use std::sync::Arc;

use crate::common::messages::{Delivery, Payload, Reply, Request, UserId, SEND_ACK, USER_EXISTS};
use crate::relay::metrics::RelayMetrics;
use crate::relay::store::{validate_username, QueuedMessage, Registration, RelayStore};

/// Answers the five protocol actions.
#[derive(Debug, Clone)]
pub struct RelayService {
    store: Arc<RelayStore>,
    metrics: RelayMetrics,
}

impl RelayService {
    pub fn new(store: Arc<RelayStore>, metrics: RelayMetrics) -> Self {
        Self { store, metrics }
    }

    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Execute one request.
    pub async fn handle(&self, request: Request) -> Reply {
        self.metrics.increment_requests();

        let reply = match request {
            Request::Register { username } => self.register(&username).await,
            Request::GetUserId { username } => self.get_user_id(&username).await,
            Request::GetUserList => Reply::Listing(self.store.usernames().await),
            Request::Send {
                user_id,
                target_user_id,
                message,
            } => self.send(user_id, target_user_id, message).await,
            Request::Get { user_id } => self.get(user_id).await,
        };

        if reply.is_error() {
            self.metrics.increment_errors();
        }
        reply
    }

    /// Account for a request that never decoded.
    pub fn reject_malformed(&self, diagnostic: String) -> Reply {
        self.metrics.increment_requests();
        self.metrics.increment_errors();
        Reply::Error(diagnostic)
    }

    async fn register(&self, username: &str) -> Reply {
        if let Err(reason) = validate_username(username) {
            warn!("⚠️  Rejected registration of {:?}: {}", username, reason);
            return Reply::Error(reason);
        }

        match self.store.register(username).await {
            Registration::Created(id) => {
                self.metrics.increment_registrations();
                info!("👤 Registered '{}' as {}", username, id);
                Reply::Success(Payload::Identity(id))
            }
            Registration::AlreadyExists => {
                debug!("'{}' is already registered", username);
                Reply::Conflict(USER_EXISTS.to_string())
            }
        }
    }

    async fn get_user_id(&self, username: &str) -> Reply {
        match self.store.lookup(username).await {
            Some(id) => Reply::Success(Payload::Identity(id)),
            None => Reply::Error(format!("unknown username '{}'", username)),
        }
    }

    async fn send(&self, sender: UserId, recipient: UserId, body: String) -> Reply {
        if !self.store.is_registered(sender).await {
            return Reply::Error(format!("unknown user_id {}", sender.0));
        }
        if !self.store.is_registered(recipient).await {
            return Reply::Error(format!("unknown target_user_id {}", recipient.0));
        }

        let depth = self
            .store
            .enqueue(QueuedMessage {
                sender_id: sender,
                recipient_id: recipient,
                body,
            })
            .await;
        self.metrics.increment_queued();
        debug!(
            "📨 Queued message {} -> {} (queue depth {})",
            sender, recipient, depth
        );
        Reply::Success(Payload::Ack(SEND_ACK.to_string()))
    }

    async fn get(&self, recipient: UserId) -> Reply {
        if !self.store.is_registered(recipient).await {
            return Reply::Error(format!("unknown user_id {}", recipient.0));
        }

        match self.store.pop(recipient).await {
            Some(queued) => {
                self.metrics.increment_delivered();
                debug!("📬 Delivered message {} -> {}", queued.sender_id, recipient);
                Reply::Success(Payload::Delivery(Delivery {
                    sender_id: queued.sender_id,
                    message: queued.body,
                }))
            }
            None => Reply::Empty,
        }
    }
}
