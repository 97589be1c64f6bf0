//! # Common Components
//!
//! Shared utilities and data structures used by both relay and client components.
//!
//! ## Modules
//!
//! - [`messages`]: Request and reply definitions for the chat protocol
//! - [`connection`]: UDP datagram abstraction
//! - [`config`]: Configuration parsing utilities
//! - [`error`]: Error taxonomy shared by every layer

pub mod config;
pub mod connection;
pub mod error;
pub mod messages;

pub use error::{ChatError, Result};
pub use messages::{Delivery, Payload, Reply, ReplyFrame, Request, RequestFrame, UserId};
