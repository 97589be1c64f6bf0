//! # Relay Components
//!
//! The relay is the directory and queue service every client talks to.
//!
//! ## Store ([`store`])
//! Owns the username directory and the per-identity message queues.
//!
//! ## Service ([`service`])
//! Turns protocol requests into replies against the store.
//!
//! ## Server ([`server`])
//! UDP front end: decoding, per-datagram tasks, retransmission replay
//! ([`replay`]) and periodic statistics ([`metrics`]).

pub mod metrics;
pub mod replay;
pub mod server;
pub mod service;
pub mod store;

pub use metrics::RelayMetrics;
pub use server::{RelayConfig, RelayServer};
pub use service::RelayService;
pub use store::RelayStore;
