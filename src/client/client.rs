//! # Relay Client
//!
//! The request/response primitive every protocol operation is built on:
//! send one request datagram, wait for the matching reply datagram.
//!
//! ## Reliability
//!
//! UDP gives no delivery guarantee, so each request is:
//! - bounded by a per-attempt timeout
//! - retried with exponential backoff up to `max_attempts`
//! - tagged with a random `request_id` that stays the same across retries,
//!   which lets the relay answer a retransmitted `register`/`send`/`get`
//!   from its replay cache instead of executing it twice
//!
//! Replies echoing a different `request_id` belong to an abandoned request
//! and are skipped. Listings are bare arrays and carry no `request_id`, so
//! one is only taken as the answer to a `get_user_list`. A reply that fails
//! to decode is surfaced as a synthetic [`Reply::Error`].

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::common::config::Endpoint;
use crate::common::connection::{ensure_fits, DatagramSocket};
use crate::common::error::{ChatError, Result};
use crate::common::messages::{Reply, ReplyFrame, Request, RequestFrame};

/// Anything that can carry one request to the relay and bring back its reply.
///
/// [`RelayClient`] is the UDP implementation; tests plug in an in-process
/// relay.
#[allow(async_fn_in_trait)]
pub trait RelayTransport {
    /// Send `request` and wait for its reply.
    async fn request(&mut self, request: Request) -> Result<Reply>;
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Client configuration loaded from a TOML file.
///
/// # Example TOML
///
/// ```toml
/// [client]
/// host = "127.0.0.1"
/// port = 9001
/// username = "alice"
///
/// [relay]
/// host = "127.0.0.1"
/// port = 9000
///
/// [requests]
/// timeout_ms = 2000
/// max_attempts = 3
/// retry_backoff_ms = 250
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Local bind address and the username to chat as
    pub client: ClientInfo,
    /// Where the relay listens
    pub relay: Endpoint,
    /// Timeout and retry settings
    #[serde(default)]
    pub requests: RequestConfig,
}

/// Local socket and identity settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Address to bind the client socket to
    pub host: String,
    /// Port to bind; 0 picks an ephemeral port
    pub port: u16,
    /// Username to register or reclaim
    pub username: String,
}

impl ClientInfo {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Per-request timeout and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// How long to wait for a reply before retransmitting (milliseconds)
    pub timeout_ms: u64,
    /// Total attempts per request, including the first one
    pub max_attempts: u32,
    /// Delay before the first retransmission; doubles for every further one (milliseconds)
    pub retry_backoff_ms: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            max_attempts: 3,
            retry_backoff_ms: 250,
        }
    }
}

impl RequestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay to wait before `attempt` (2 for the first retry).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(2).min(10);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(1u64 << doublings))
    }
}

// ============================================================================
// UDP CLIENT
// ============================================================================

/// UDP implementation of [`RelayTransport`].
pub struct RelayClient {
    socket: DatagramSocket,
    policy: RequestConfig,
}

impl RelayClient {
    /// Bind the local socket from `config` and point it at the relay.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        Self::connect_to(
            &config.client.address(),
            &config.relay.address(),
            config.requests.clone(),
        )
        .await
    }

    pub async fn connect_to(local: &str, relay: &str, policy: RequestConfig) -> Result<Self> {
        let socket = DatagramSocket::bind(local).await?;
        socket.connect(relay).await?;
        info!(
            "📡 Client socket {} talking to relay at {}",
            socket.local_addr()?,
            relay
        );
        Ok(Self { socket, policy })
    }

    /// Read datagrams until one answers `request_id`.
    async fn await_reply(&mut self, request_id: u64, expects_listing: bool) -> io::Result<Reply> {
        loop {
            let frame = ReplyFrame::from_bytes(self.socket.recv().await?);
            let stale = match frame.request_id {
                Some(id) => id != request_id,
                None => !expects_listing && matches!(frame.reply, Reply::Listing(_)),
            };
            if !stale {
                return Ok(frame.reply);
            }
            debug!("Skipping stale reply {:?} (request {:?})", frame.reply, frame.request_id);
        }
    }
}

impl RelayTransport for RelayClient {
    async fn request(&mut self, request: Request) -> Result<Reply> {
        let action = request.action();
        let expects_listing = matches!(request, Request::GetUserList);
        let request_id: u64 = rand::random();
        let bytes = RequestFrame::with_id(request_id, request).to_bytes()?;
        ensure_fits(&bytes)?;

        self.socket.discard_pending();

        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = self.policy.backoff(attempt);
                warn!(
                    "🔄 Retry attempt {}/{} for '{}' in {:?}",
                    attempt, max_attempts, action, delay
                );
                sleep(delay).await;
            }

            debug!("📤 '{}' request {} (attempt {})", action, request_id, attempt);
            if let Err(e) = self.socket.send(&bytes).await {
                if is_refused(&e) {
                    warn!("Relay unreachable while sending '{}': {}", action, e);
                    continue;
                }
                return Err(e);
            }

            match timeout(self.policy.timeout(), self.await_reply(request_id, expects_listing)).await {
                Ok(Ok(reply)) => return Ok(reply),
                Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    warn!("Relay unreachable while waiting for '{}': {}", action, e);
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    warn!(
                        "⏱️  '{}' timed out after {:?} (attempt {}/{})",
                        action,
                        self.policy.timeout(),
                        attempt,
                        max_attempts
                    );
                }
            }
        }

        Err(ChatError::Timeout {
            action,
            attempts: max_attempts,
        })
    }
}

fn is_refused(error: &ChatError) -> bool {
    matches!(error, ChatError::Io(e) if e.kind() == io::ErrorKind::ConnectionRefused)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_retry() {
        let policy = RequestConfig {
            timeout_ms: 100,
            max_attempts: 4,
            retry_backoff_ms: 50,
        };
        assert_eq!(policy.backoff(2), Duration::from_millis(50));
        assert_eq!(policy.backoff(3), Duration::from_millis(100));
        assert_eq!(policy.backoff(4), Duration::from_millis(200));
    }

    #[test]
    fn request_section_is_optional() {
        let config: ClientConfig = toml::from_str(
            r#"
            [client]
            host = "127.0.0.1"
            port = 0
            username = "alice"

            [relay]
            host = "127.0.0.1"
            port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(config.requests.max_attempts, 3);
        assert_eq!(config.client.address(), "127.0.0.1:0");
    }

    #[tokio::test]
    async fn silent_relay_times_out_after_all_attempts() {
        // A bound socket that never answers.
        let silent = DatagramSocket::bind("127.0.0.1:0").await.unwrap();
        let relay = silent.local_addr().unwrap().to_string();

        let policy = RequestConfig {
            timeout_ms: 30,
            max_attempts: 2,
            retry_backoff_ms: 10,
        };
        let mut client = RelayClient::connect_to("127.0.0.1:0", &relay, policy)
            .await
            .unwrap();

        let err = client.request(Request::GetUserList).await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::Timeout {
                action: "get_user_list",
                attempts: 2
            }
        ));
    }
}
