// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The bounded handoff between callers (the tee fan-out) and an encoder
//! subprocess's stdin, decoupled so a stalled or restarting subprocess never
//! blocks the live audio path.
//!
//! `PipeSink::write` always returns immediately: a full queue increments a
//! drop counter and logs once rather than blocking the caller. A background
//! drain task owns the actual stdin handle and swaps it out across
//! subprocess restarts without the writer side ever being aware.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::warn;

use crate::header_collector::HeaderCollector;

const QUEUE_CAPACITY: usize = 256;
/// `OggS`, the four-byte Ogg page capture pattern the drain loop resyncs on
/// after a reprime.
const CAPTURE_PATTERN: &[u8; 4] = b"OggS";

/// The live handoff point between the tee fan-out and one encoder's stdin.
///
/// Cloning is cheap; all clones share the same queue and drop counter.
#[derive(Clone)]
pub struct PipeSink {
    tx: mpsc::Sender<Bytes>,
    dropped: Arc<AtomicU64>,
    logged_drop_once: Arc<std::sync::atomic::AtomicBool>,
    current_stdin: Arc<Mutex<Option<ChildStdin>>>,
    reprime: Arc<Notify>,
    headers: Arc<HeaderCollector>,
}

impl PipeSink {
    /// Builds a new sink and spawns its drain task. `headers` is shared with
    /// the header collector observing the same live Ogg byte stream, so the
    /// drain task can replay cached header pages on reprime.
    #[must_use]
    pub fn new(headers: Arc<HeaderCollector>) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let sink = Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
            logged_drop_once: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            current_stdin: Arc::new(Mutex::new(None)),
            reprime: Arc::new(Notify::new()),
            headers,
        };
        tokio::spawn(sink.clone().drain_loop(rx));
        sink
    }

    /// Copies `bytes` into the queue, non-blocking. On a full queue, the
    /// chunk is dropped and the drop counter advances; the first such drop
    /// per sink lifetime is logged, subsequent ones are silent.
    pub fn write(&self, bytes: Bytes) {
        if self.tx.try_send(bytes).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            if !self.logged_drop_once.swap(true, Ordering::Relaxed) {
                warn!("pipe sink queue full, dropping chunks to the encoder");
            }
        }
    }

    /// Total chunks dropped since this sink was created.
    #[must_use]
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Installs a freshly spawned subprocess's stdin as the active writer
    /// and schedules a header reprime before the next forwarded byte.
    pub async fn set_stdin(&self, stdin: ChildStdin) {
        *self.current_stdin.lock().await = Some(stdin);
        self.reprime.notify_one();
    }

    /// Drops the active stdin (e.g. after a write failure) so the
    /// supervise-loop's next spawn starts from a clean slate.
    pub async fn clear_stdin(&self) {
        *self.current_stdin.lock().await = None;
    }

    async fn drain_loop(self, mut rx: mpsc::Receiver<Bytes>) {
        let mut resyncing = false;
        let mut scan_tail: Vec<u8> = Vec::new();

        loop {
            tokio::select! {
                biased;
                () = self.reprime.notified() => {
                    self.do_reprime().await;
                    resyncing = true;
                    scan_tail.clear();
                }
                chunk = rx.recv() => {
                    let Some(chunk) = chunk else { return };
                    let to_write = if resyncing {
                        match resync(&mut scan_tail, &chunk) {
                            Some(from) => {
                                resyncing = false;
                                chunk.slice(from..)
                            }
                            None => continue,
                        }
                    } else {
                        chunk
                    };
                    self.forward(&to_write).await;
                }
            }
        }
    }

    async fn do_reprime(&self) {
        let header_bytes = self.headers.cached_pages();
        if header_bytes.is_empty() {
            return;
        }
        self.forward(&header_bytes).await;
    }

    async fn forward(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut guard = self.current_stdin.lock().await;
        let Some(stdin) = guard.as_mut() else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        if let Err(err) = stdin.write_all(bytes).await {
            warn!(error = %err, "encoder stdin write failed, dropping connection");
            *guard = None;
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Scans `chunk` (with `tail` carrying up to 3 bytes from the previous
/// chunk, for a capture pattern that may straddle a chunk boundary) for the
/// next `"OggS"` occurrence, returning the offset within `chunk` to resume
/// forwarding from, or `None` if no match was found (the whole chunk is
/// discarded and `tail` is updated for the next call).
fn resync(tail: &mut Vec<u8>, chunk: &[u8]) -> Option<usize> {
    let mut haystack = tail.clone();
    haystack.extend_from_slice(chunk);
    if let Some(pos) = haystack.windows(4).position(|w| w == CAPTURE_PATTERN) {
        let offset_in_chunk = pos as isize - tail.len() as isize;
        tail.clear();
        return Some(offset_in_chunk.max(0) as usize);
    }
    let keep = chunk.len().min(3);
    *tail = chunk[chunk.len() - keep..].to_vec();
    None
}
