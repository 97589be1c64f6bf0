//! # UDP Datagram Abstraction
//!
//! Thin wrapper around a tokio [`UdpSocket`] for the chat protocol.
//!
//! ## Wire Protocol
//!
//! There is no framing: one JSON message is one datagram.
//! ```text
//! [N bytes: JSON message data]   (N <= MAX_DATAGRAM_SIZE)
//! ```
//!
//! The transport may drop, duplicate or reorder datagrams. Recovering from
//! that is the job of the request layer above this one.

use log::{debug, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{ToSocketAddrs, UdpSocket};

use super::error::{ChatError, Result};

/// Largest UDP payload that fits in a single IPv4 datagram.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// A bound UDP socket that sends and receives whole protocol messages.
pub struct DatagramSocket {
    socket: Arc<UdpSocket>,
    buf: Vec<u8>,
}

/// Cloneable send half of a [`DatagramSocket`], handed to worker tasks.
#[derive(Clone)]
pub struct DatagramSender {
    socket: Arc<UdpSocket>,
}

impl DatagramSender {
    /// Send one message to `target`.
    pub async fn send_to(&self, data: &[u8], target: SocketAddr) -> Result<()> {
        ensure_fits(data)?;
        self.socket.send_to(data, target).await?;
        Ok(())
    }
}

impl DatagramSocket {
    /// Bind a socket on `address` (use port 0 for an ephemeral port).
    pub async fn bind<A: ToSocketAddrs>(address: A) -> Result<Self> {
        let socket = UdpSocket::bind(address).await?;
        Ok(Self {
            socket: Arc::new(socket),
            buf: vec![0u8; MAX_DATAGRAM_SIZE],
        })
    }

    /// Restrict this socket to a single remote peer.
    ///
    /// After connecting, [`send`](Self::send) targets the peer and
    /// [`recv`](Self::recv) drops datagrams from anyone else.
    pub async fn connect<A: ToSocketAddrs>(&self, address: A) -> Result<()> {
        self.socket.connect(address).await?;
        Ok(())
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Send one message to the connected peer.
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        ensure_fits(data)?;
        self.socket.send(data).await?;
        Ok(())
    }

    /// Send one message to `target`.
    pub async fn send_to(&self, data: &[u8], target: SocketAddr) -> Result<()> {
        ensure_fits(data)?;
        self.socket.send_to(data, target).await?;
        Ok(())
    }

    /// Wait for the next datagram from the connected peer.
    pub async fn recv(&mut self) -> io::Result<&[u8]> {
        let len = self.socket.recv(&mut self.buf).await?;
        Ok(&self.buf[..len])
    }

    /// Wait for the next datagram from anyone.
    pub async fn recv_from(&mut self) -> io::Result<(Vec<u8>, SocketAddr)> {
        let (len, from) = self.socket.recv_from(&mut self.buf).await?;
        Ok((self.buf[..len].to_vec(), from))
    }

    /// Throw away every datagram already waiting in the receive buffer.
    ///
    /// Returns how many were dropped. Used before a new request so a late
    /// reply to an abandoned request cannot be mistaken for the new answer.
    pub fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        loop {
            match self.socket.try_recv(&mut self.buf) {
                Ok(_) => dropped += 1,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    // ICMP errors surface here on some platforms; they carry no reply.
                    debug!("Ignoring socket error while discarding stale datagrams: {}", e);
                    break;
                }
            }
        }
        if dropped > 0 {
            warn!("🗑️  Discarded {} stale datagram(s)", dropped);
        }
        dropped
    }

    /// A send handle sharing this socket.
    pub fn sender(&self) -> DatagramSender {
        DatagramSender {
            socket: Arc::clone(&self.socket),
        }
    }
}

/// Reject payloads that cannot travel in a single datagram.
pub fn ensure_fits(data: &[u8]) -> Result<()> {
    if data.len() > MAX_DATAGRAM_SIZE {
        return Err(ChatError::Oversize {
            size: data.len(),
            max: MAX_DATAGRAM_SIZE,
        });
    }
    Ok(())
}
