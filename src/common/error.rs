//! Error types for the chat protocol.
//!
//! The variants follow the protocol's error taxonomy. Use
//! [`ChatError::is_fatal`] to decide whether a session can keep going.

use thiserror::Error;

use super::messages::UserId;

/// Errors raised by the client session and the datagram layer.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Socket level failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding a request failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Message would not fit into a single datagram.
    #[error("Message too large: {size} bytes (max: {max} bytes)")]
    Oversize { size: usize, max: usize },

    /// No reply arrived within the retry budget.
    #[error("No reply to '{action}' after {attempts} attempt(s)")]
    Timeout {
        action: &'static str,
        attempts: u32,
    },

    /// The relay (or the reply decoder) reported `status: error`.
    #[error("Relay error: {0}")]
    Relay(String),

    /// The relay answered with a reply shape that makes no sense for the request.
    #[error("Unexpected reply to '{action}': {reply}")]
    UnexpectedReply { action: &'static str, reply: String },

    /// Could not obtain our own identity.
    #[error("Couldn't get user id for '{username}': {reason}")]
    IdentityResolution { username: String, reason: String },

    /// Could not resolve a peer that the directory listed.
    #[error("Couldn't get user id for peer '{username}': {reason}")]
    PeerLookup { username: String, reason: String },

    /// A drained message came from an identity that was never resolved.
    #[error("No cached username for sender {0}")]
    UnknownSender(UserId),

    /// Send target is not in the last refreshed peer set.
    #[error("Target user '{0}' is not in active user list")]
    NotAPeer(String),
}

impl ChatError {
    /// Whether the session cannot continue after this error.
    ///
    /// Identity failures and cache invariant violations are fatal; transport
    /// problems and relay errors for individual lookups or sends are not.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ChatError::IdentityResolution { .. }
                | ChatError::PeerLookup { .. }
                | ChatError::UnknownSender(_)
        )
    }
}

/// Result type for chat operations.
pub type Result<T> = std::result::Result<T, ChatError>;
