//! # Configuration Utilities
//!
//! Shared configuration structures and parsing utilities used by both
//! the relay and the client.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;

/// Load a TOML configuration file and deserialize it into the specified type.
///
/// # Arguments
/// - `path`: Path to the TOML configuration file
///
/// # Returns
/// - `Ok(T)`: Successfully loaded and parsed configuration
/// - `Err`: File I/O or parsing error
///
/// # Example
/// ```ignore
/// let config: RelayConfig = load_config("config/relay.toml")?;
/// ```
pub fn load_config<T>(path: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)?;
    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// A host/port pair as written in config files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Hostname or IP address (e.g., "127.0.0.1")
    pub host: String,
    /// UDP port
    pub port: u16,
}

impl Endpoint {
    /// `host:port`, ready for socket calls.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
