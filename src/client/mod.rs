//! # Client Components
//!
//! The client is split into layers:
//!
//! ## Relay Client ([`client`])
//! The timeout-bounded, retrying request/response primitive over UDP.
//!
//! ## Chat Session ([`session`])
//! The protocol driver: identity resolution, peer discovery, drain and send,
//! backed by the write-once [`cache`].
//!
//! ## Console ([`console`])
//! The interactive command loop used by the `client` binary.

pub mod cache;
pub mod client;
pub mod console;
pub mod session;

// Re-export for convenience
pub use client::{ClientConfig, RelayClient, RelayTransport};
pub use console::Console;
pub use session::{ChatSession, ReceivedMessage};
