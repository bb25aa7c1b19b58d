// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Lifecycle management for one encoder subprocess: spawn, supervise,
//! restart with backoff, and feed it a well-formed Ogg-Opus byte stream
//! through a [`PipeSink`].
//!
//! Common to both the MP3 and HLS transcoders (§4.5 of the design): only the
//! argument vector and the meaning of the subprocess's stdout differ.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::{Notify, RwLock};
use tracing::{info, warn};

use crate::header_collector::HeaderCollector;
use crate::pipe_sink::PipeSink;

/// Initial subprocess restart backoff.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
/// Ceiling the exponential backoff never exceeds.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);
/// Read buffer size for a captured encoder stdout (MP3 pipeline only).
const STDOUT_READ_CHUNK: usize = 16 * 1024;

#[derive(Debug, Error)]
pub enum TranscoderError {
    #[error("encoder binary not found at '{0}'")]
    BinaryNotFound(String),
    #[error("failed to spawn encoder subprocess: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Receives each chunk of a captured encoder stdout, in order (MP3 feeds
/// this straight into the [`Broadcaster`](wavecast_broadcast) — this crate
/// has no dependency on it, so the sink is a plain callback).
pub type StdoutSink = Arc<dyn Fn(Bytes) + Send + Sync>;

/// What to launch and how to recognize it failed to launch at all.
pub struct EncoderSpec {
    pub binary: String,
    pub args: Vec<String>,
    /// When set, the subprocess's stdout is piped and each chunk read from
    /// it is forwarded to this sink (the MP3 pipeline's encoded bytes). The
    /// HLS pipeline writes to disk instead and leaves this `None`.
    pub on_stdout: Option<StdoutSink>,
}

/// A supervised encoder subprocess. Construction spawns the supervise-loop;
/// dropping the last clone does not stop it — call [`Streamer::close`].
#[derive(Clone)]
pub struct Streamer {
    inner: Arc<Inner>,
}

struct Inner {
    pipe_sink: PipeSink,
    headers: Arc<HeaderCollector>,
    closed: Arc<std::sync::atomic::AtomicBool>,
    generation: AtomicU64,
    restart_requested: Notify,
    current_child: RwLock<Option<Child>>,
}

impl Streamer {
    /// Spawns the first subprocess and the supervise-loop. Fails only if the
    /// encoder binary cannot be located at all — every other failure mode
    /// (crash, non-zero exit, spawn error after the first attempt) is
    /// handled by the supervise-loop's backoff/retry.
    pub async fn start(spec: EncoderSpec) -> Result<Self, TranscoderError> {
        if which(&spec.binary).is_none() {
            return Err(TranscoderError::BinaryNotFound(spec.binary));
        }

        let headers = Arc::new(HeaderCollector::new());
        let pipe_sink = PipeSink::new(headers.clone());
        let inner = Arc::new(Inner {
            pipe_sink,
            headers,
            closed: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            generation: AtomicU64::new(0),
            restart_requested: Notify::new(),
            current_child: RwLock::new(None),
        });

        tokio::spawn(supervise_loop(inner.clone(), spec));
        Ok(Self { inner })
    }

    /// Feeds `bytes` to the encoder's stdin (via the pipe sink) and to the
    /// header collector observing the same stream.
    pub fn write(&self, bytes: Bytes) {
        self.inner.headers.observe(&bytes);
        self.inner.pipe_sink.write(bytes);
    }

    /// Total chunks dropped by the pipe sink since this streamer started.
    #[must_use]
    pub fn drop_count(&self) -> u64 {
        self.inner.pipe_sink.drop_count()
    }

    /// Kills the current subprocess; the supervise-loop observes the exit
    /// and spawns a replacement through the normal backoff path.
    pub async fn restart(&self) {
        info!("transcoder restart requested");
        let mut guard = self.inner.current_child.write().await;
        if let Some(child) = guard.as_mut() {
            let _ = child.start_kill();
        }
        self.inner.restart_requested.notify_one();
    }

    /// Terminates the subprocess and stops the supervise-loop. Idempotent.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut guard = self.inner.current_child.write().await;
        if let Some(child) = guard.as_mut() {
            let _ = child.start_kill();
        }
        self.inner.restart_requested.notify_one();
    }

    /// The bitstream generation, incremented on each spawn; useful to
    /// callers (e.g. tests) that need to observe a restart took effect.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }
}

async fn supervise_loop(inner: Arc<Inner>, spec: EncoderSpec) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        if inner.closed.load(Ordering::SeqCst) {
            return;
        }

        match spawn(&spec).await {
            Ok(mut child) => {
                backoff = INITIAL_BACKOFF;
                inner.generation.fetch_add(1, Ordering::SeqCst);
                if let Some(stdin) = child.stdin.take() {
                    inner.pipe_sink.set_stdin(stdin).await;
                }
                if let (Some(stdout), Some(sink)) = (child.stdout.take(), spec.on_stdout.clone()) {
                    tokio::spawn(forward_stdout(stdout, sink));
                }
                *inner.current_child.write().await = Some(child);

                wait_for_exit_or_restart(&inner).await;
                inner.pipe_sink.clear_stdin().await;
            },
            Err(err) => {
                warn!(error = %err, backoff = ?backoff, "failed to spawn encoder subprocess, retrying");
            },
        }

        if inner.closed.load(Ordering::SeqCst) {
            return;
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

async fn wait_for_exit_or_restart(inner: &Arc<Inner>) {
    loop {
        let mut guard = inner.current_child.write().await;
        let Some(child) = guard.as_mut() else { return };
        tokio::select! {
            status = child.wait() => {
                match status {
                    Ok(status) if status.success() => info!("encoder subprocess exited cleanly"),
                    Ok(status) => warn!(?status, "encoder subprocess exited abnormally, restarting"),
                    Err(err) => warn!(error = %err, "failed to wait on encoder subprocess"),
                }
                *guard = None;
                return;
            }
            () = inner.restart_requested.notified() => {
                continue;
            }
        }
    }
}

async fn spawn(spec: &EncoderSpec) -> Result<Child, std::io::Error> {
    let stdout_mode = if spec.on_stdout.is_some() { Stdio::piped() } else { Stdio::null() };
    Command::new(&spec.binary)
        .args(&spec.args)
        .stdin(Stdio::piped())
        .stdout(stdout_mode)
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
}

/// Reads `stdout` to completion, forwarding each chunk to `sink` in order.
/// Ends silently on EOF or read error — the supervise-loop's own exit
/// handling is what notices the encoder died.
async fn forward_stdout(mut stdout: tokio::process::ChildStdout, sink: StdoutSink) {
    let mut buf = BytesMut::with_capacity(STDOUT_READ_CHUNK);
    loop {
        buf.resize(STDOUT_READ_CHUNK, 0);
        match stdout.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => sink(Bytes::copy_from_slice(&buf[..n])),
        }
    }
}

/// A minimal `PATH`-based binary lookup, avoiding a dependency on the `which`
/// crate for a single startup check.
fn which(binary: &str) -> Option<std::path::PathBuf> {
    let path = std::path::Path::new(binary);
    if path.is_absolute() || binary.contains('/') {
        return path.is_file().then(|| path.to_path_buf());
    }
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths).map(|dir| dir.join(binary)).find(|p| p.is_file())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_fails_fast_when_binary_missing() {
        let spec =
            EncoderSpec {
            binary: "definitely-not-a-real-encoder-binary".into(),
            args: vec![],
            on_stdout: None,
        };
        let result = Streamer::start(spec).await;
        assert!(matches!(result, Err(TranscoderError::BinaryNotFound(_))));
    }

    #[tokio::test]
    async fn starts_and_closes_with_a_real_binary() {
        let spec = EncoderSpec { binary: "cat".into(), args: vec![], on_stdout: None };
        let Ok(streamer) = Streamer::start(spec).await else {
            // `cat` isn't guaranteed present on every CI image; skip rather than fail.
            return;
        };
        streamer.write(Bytes::from_static(b"hello"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        streamer.close().await;
        streamer.close().await; // idempotent
    }
}
