// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The bounded handoff between the playlist driver and the shared WebRTC
//! audio track (§4.7 "Sample writer"). The track itself lives outside this
//! crate's scope — out of scope per §1, "the WebRTC ICE/DTLS/SRTP stack (a
//! library providing `AudioTrack.WriteSample(payload, duration)`)" — so this
//! module only defines the capability the drain task needs and the
//! decoupling queue in front of it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::warn;

const QUEUE_CAPACITY: usize = 256;

/// The capability the sample writer drains into: one outgoing media track,
/// shared by every attached WHEP peer.
#[async_trait]
pub trait AudioSampleSink: Send + Sync {
    /// Writes one encoded media sample with its playback duration. An error
    /// here means the underlying track write failed (e.g. no peers
    /// attached yet); it is logged, not propagated, by the drain task.
    async fn write_sample(&self, payload: Bytes, duration: Duration) -> Result<(), String>;
}

/// Decouples the playlist driver (which must never block on a slow or
/// absent downstream) from the sink's own write latency.
#[derive(Clone)]
pub struct SampleWriter {
    tx: mpsc::Sender<(Bytes, Duration)>,
    dropped: Arc<AtomicU64>,
    logged_drop_once: Arc<AtomicBool>,
}

impl SampleWriter {
    /// Spawns the drain task that forwards queued samples to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn AudioSampleSink>) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let writer = Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
            logged_drop_once: Arc::new(AtomicBool::new(false)),
        };
        tokio::spawn(drain_loop(rx, sink));
        writer
    }

    /// Enqueues `payload`/`duration`, non-blocking. A full queue drops the
    /// sample and advances the drop counter; the first drop is logged, the
    /// rest are silent.
    pub fn write(&self, payload: Bytes, duration: Duration) {
        if self.tx.try_send((payload, duration)).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            if !self.logged_drop_once.swap(true, Ordering::Relaxed) {
                warn!("sample writer queue full, dropping audio samples to WebRTC track");
            }
        }
    }

    /// Total samples dropped since this writer was created.
    #[must_use]
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

async fn drain_loop(mut rx: mpsc::Receiver<(Bytes, Duration)>, sink: Arc<dyn AudioSampleSink>) {
    let mut logged_write_error_once = false;
    while let Some((payload, duration)) = rx.recv().await {
        if let Err(err) = sink.write_sample(payload, duration).await {
            if !logged_write_error_once {
                logged_write_error_once = true;
                warn!(error = %err, "WebRTC sample write failed");
            }
        }
    }
}
