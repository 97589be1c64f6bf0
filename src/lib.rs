pub mod client;
pub mod common;
pub mod relay;

pub use common::messages::{Reply, Request, UserId};
pub use common::{ChatError, Result};
