//! # Relay Server - UDP Front End
//!
//! Receives request datagrams, hands each one to its own tokio task, and
//! sends exactly one reply datagram back to the sender.
//!
//! ## Request Flow
//!
//! ```text
//! Client -> Relay   {"action": "...", "request_id": N, ...}
//! Relay:  decode -> replay cache hit? -> RelayService::handle -> remember reply
//! Relay  -> Client  {"value": ...} | {"status_msg": ...} | {"status": "error", ...} | [...]
//! ```
//!
//! Undecodable datagrams are answered with an error reply carrying the
//! decoder's diagnostic. The relay never initiates contact with a client.

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::common::connection::{DatagramSender, DatagramSocket};
use crate::common::error::Result;
use crate::common::messages::{ReplyFrame, RequestFrame};
use crate::relay::metrics::RelayMetrics;
use crate::relay::replay::ReplayCache;
use crate::relay::service::RelayService;
use crate::relay::store::RelayStore;

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Relay configuration loaded from a TOML file.
///
/// # Example TOML
///
/// ```toml
/// [relay]
/// address = "127.0.0.1:9000"
/// replay_cache_size = 1024
/// stats_interval_secs = 60
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub relay: RelayInfo,
}

/// Listening address and tuning knobs for the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayInfo {
    /// UDP address to bind (e.g., "0.0.0.0:9000")
    pub address: String,
    /// How many recent mutating replies to remember for retransmissions
    #[serde(default = "default_replay_cache_size")]
    pub replay_cache_size: usize,
    /// How often to log relay statistics; 0 disables the log line
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_replay_cache_size() -> usize {
    1024
}

fn default_stats_interval_secs() -> u64 {
    60
}

impl RelayConfig {
    /// Configuration listening on `address` with default tuning.
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            relay: RelayInfo {
                address: address.into(),
                replay_cache_size: default_replay_cache_size(),
                stats_interval_secs: default_stats_interval_secs(),
            },
        }
    }
}

// ============================================================================
// RELAY SERVER
// ============================================================================

/// The relay process: one UDP socket in front of a [`RelayService`].
pub struct RelayServer {
    socket: DatagramSocket,
    service: RelayService,
    replay: Arc<Mutex<ReplayCache>>,
    stats_interval_secs: u64,
}

impl RelayServer {
    /// Bind the relay socket. Nothing is served until [`run`](Self::run).
    pub async fn bind(config: &RelayConfig) -> Result<Self> {
        let socket = DatagramSocket::bind(config.relay.address.as_str()).await?;
        let service = RelayService::new(Arc::new(RelayStore::new()), RelayMetrics::new());

        Ok(Self {
            socket,
            service,
            replay: Arc::new(Mutex::new(ReplayCache::new(config.relay.replay_cache_size))),
            stats_interval_secs: config.relay.stats_interval_secs,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn service(&self) -> &RelayService {
        &self.service
    }

    /// Serve requests forever.
    pub async fn run(mut self) -> Result<()> {
        info!("🚀 Relay listening on {}", self.local_addr()?);

        let stats_enabled = self.stats_interval_secs > 0;
        let mut stats_timer =
            tokio::time::interval(Duration::from_secs(self.stats_interval_secs.max(1)));
        // The first tick completes immediately.
        stats_timer.tick().await;

        let sender = self.socket.sender();

        loop {
            tokio::select! {
                received = self.socket.recv_from() => match received {
                    Ok((data, from)) => {
                        let service = self.service.clone();
                        let replay = Arc::clone(&self.replay);
                        let sender = sender.clone();
                        tokio::spawn(async move {
                            handle_datagram(service, replay, sender, data, from).await;
                        });
                    }
                    Err(e) => warn!("⚠️  Receive error: {}", e),
                },
                _ = stats_timer.tick(), if stats_enabled => self.log_stats(),
            }
        }
    }

    fn log_stats(&self) {
        let stats = self.service.metrics().snapshot();
        info!(
            "📊 requests={} errors={} registrations={} queued={} delivered={} pending={} replays={}",
            stats.requests,
            stats.errors,
            stats.registrations,
            stats.messages_queued,
            stats.messages_delivered,
            stats.pending(),
            stats.replays
        );
    }
}

/// Decode, execute (or replay) and answer a single request datagram.
async fn handle_datagram(
    service: RelayService,
    replay: Arc<Mutex<ReplayCache>>,
    sender: DatagramSender,
    data: Vec<u8>,
    from: SocketAddr,
) {
    let (request_id, reply) = match RequestFrame::from_bytes(&data) {
        Err(diagnostic) => {
            warn!("⚠️  Bad request from {}: {}", from, diagnostic);
            (None, service.reject_malformed(diagnostic))
        }
        Ok(RequestFrame {
            request_id,
            request,
        }) => {
            let action = request.action();
            let replay_key = request_id.filter(|_| request.is_mutating());

            if let Some(id) = replay_key {
                let cached = replay.lock().await.get(from, id).cloned();
                if let Some(cached) = cached {
                    service.metrics().increment_replays();
                    info!(
                        "🔁 Replaying reply to '{}' request {} from {}",
                        action, id, from
                    );
                    send_reply(&sender, ReplyFrame::new(request_id, cached), from).await;
                    return;
                }
            }

            debug!("📥 '{}' from {}", action, from);
            let reply = service.handle(request).await;

            if let Some(id) = replay_key {
                replay.lock().await.insert(from, id, reply.clone());
            }
            (request_id, reply)
        }
    };

    send_reply(&sender, ReplyFrame::new(request_id, reply), from).await;
}

async fn send_reply(sender: &DatagramSender, frame: ReplyFrame, to: SocketAddr) {
    match frame.to_bytes() {
        Ok(bytes) => {
            if let Err(e) = sender.send_to(&bytes, to).await {
                error!("❌ Failed to send reply to {}: {}", to, e);
            }
        }
        Err(e) => error!("❌ Failed to encode reply for {}: {}", to, e),
    }
}
