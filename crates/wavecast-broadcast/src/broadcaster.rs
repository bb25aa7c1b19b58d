// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The in-memory multicast bus from one encoder to many HTTP listeners
//! (§4.6, §3 "Broadcaster").
//!
//! `Broadcast` never blocks on a slow consumer: a client whose channel is
//! full is evicted rather than allowed to back up the encoder. A bounded
//! ring of the most recently broadcast chunks lets a client that attaches
//! mid-stream start hearing audio immediately instead of waiting for the
//! next encoder output.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::warn;

/// Per-client channel depth. Chosen generously enough that a client reading
/// at real-time speed never fills it under normal network jitter.
pub const CLIENT_CHANNEL_CAPACITY: usize = 64;
/// Cap on the warm-start ring buffer, in bytes.
pub const RECENT_BUFFER_CAP_BYTES: usize = 32 * 1024;

/// A handle returned by [`Broadcaster::add_client`]; pass it back to
/// [`Broadcaster::remove_client`] to detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

struct RecentBuffer {
    chunks: VecDeque<Bytes>,
    total_bytes: usize,
}

impl RecentBuffer {
    fn new() -> Self {
        Self { chunks: VecDeque::new(), total_bytes: 0 }
    }

    fn push(&mut self, chunk: Bytes) {
        self.total_bytes += chunk.len();
        self.chunks.push_back(chunk);
        while self.total_bytes > RECENT_BUFFER_CAP_BYTES {
            let Some(evicted) = self.chunks.pop_front() else { break };
            self.total_bytes -= evicted.len();
        }
    }

    fn snapshot(&self) -> Vec<Bytes> {
        self.chunks.iter().cloned().collect()
    }
}

struct State {
    clients: HashMap<u64, mpsc::Sender<Bytes>>,
    recent: RecentBuffer,
    closed: bool,
}

/// Multicasts encoded byte chunks to many HTTP listeners.
pub struct Broadcaster {
    state: Mutex<State>,
    next_id: AtomicU64,
    dropped: AtomicU64,
}

impl Broadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                clients: HashMap::new(),
                recent: RecentBuffer::new(),
                closed: false,
            }),
            next_id: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Registers a new listener, returning its id and the receiving half of
    /// its bounded channel. Returns `None` if the broadcaster is closed.
    #[allow(clippy::significant_drop_tightening)]
    pub fn add_client(&self) -> Option<(ClientId, mpsc::Receiver<Bytes>)> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if state.closed {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CLIENT_CHANNEL_CAPACITY);
        state.clients.insert(id, tx);
        Some((ClientId(id), rx))
    }

    /// Detaches a listener. Idempotent: removing an already-removed or
    /// never-registered id is a no-op. Dropping the sender closes the
    /// client's channel exactly once.
    pub fn remove_client(&self, id: ClientId) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.clients.remove(&id.0);
    }

    /// Pushes `chunk` into the warm-start ring and enqueues it, non-blocking,
    /// to every registered client. A client whose channel is full is a slow
    /// consumer: it is evicted (its channel closes when its sender is
    /// dropped) rather than allowed to block the broadcast.
    #[allow(clippy::significant_drop_tightening)]
    pub fn broadcast(&self, chunk: Bytes) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if state.closed {
            return;
        }
        state.recent.push(chunk.clone());

        let mut slow = Vec::new();
        for (&id, tx) in &state.clients {
            match tx.try_send(chunk.clone()) {
                Ok(()) => {},
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(client_id = id, "slow consumer, evicting");
                    slow.push(id);
                },
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    slow.push(id);
                },
            }
        }
        for id in slow {
            state.clients.remove(&id);
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// The chunks currently held in the warm-start ring, oldest first — for
    /// a newly attached client to play audibly before the next encoder
    /// output arrives.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Bytes> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).recent.snapshot()
    }

    /// Closes every client channel exactly once and marks the broadcaster
    /// closed; subsequent `add_client`/`broadcast` calls are no-ops.
    #[allow(clippy::significant_drop_tightening)]
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if state.closed {
            return;
        }
        state.closed = true;
        state.clients.clear();
    }

    /// Number of currently attached listeners.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clients.len()
    }

    /// Total listeners evicted as slow consumers (or whose channel was
    /// already closed) since this broadcaster was created.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}
