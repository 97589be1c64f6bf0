//! Replay cache for retransmitted requests.
//!
//! Clients retry a request with the same `request_id` when a reply is lost.
//! For mutating actions (`register`, `send`, `get`) the relay must not run
//! the request a second time, so it answers the retry with the reply it
//! already produced. Entries are keyed by client address and request id and
//! evicted oldest first once the cache is full.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;

use crate::common::messages::Reply;

type ReplayKey = (SocketAddr, u64);

/// Bounded map of recently answered requests.
#[derive(Debug)]
pub struct ReplayCache {
    capacity: usize,
    replies: HashMap<ReplayKey, Reply>,
    order: VecDeque<ReplayKey>,
}

impl ReplayCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            replies: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Reply previously sent for this request, if still remembered.
    pub fn get(&self, from: SocketAddr, request_id: u64) -> Option<&Reply> {
        self.replies.get(&(from, request_id))
    }

    /// Remember the reply for a request.
    pub fn insert(&mut self, from: SocketAddr, request_id: u64, reply: Reply) {
        if self.capacity == 0 {
            return;
        }
        let key = (from, request_id);
        if self.replies.insert(key, reply).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.replies.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.replies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }
}
