// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The tee fan-out: mirrors the live Ogg-Opus byte stream to every
//! registered downstream sink as it is read, absorbing per-sink failures
//! without ever blocking the reader (§4.4).

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

/// A polymorphic byte-stream destination for the tee (§2 "Tee fan-out"):
/// the transcoder supervisors' `pipeSink` writers implement this, each
/// wrapping its own decoupling/backpressure handling.
pub trait TeeSink: Send + Sync {
    /// Accepts `bytes`; implementations must not block the caller for any
    /// meaningful duration — slow or failing sinks absorb backpressure
    /// internally (a bounded queue, a drop counter) rather than propagating
    /// it here.
    fn write(&self, bytes: &[u8]);
}

struct Registration {
    sink: Arc<dyn TeeSink>,
    /// Reserved for sinks that want to report a first-failure-only log line
    /// without this module needing to know what "failure" means for them;
    /// unused today since [`TeeSink::write`] is infallible, kept for
    /// forward compatibility with a fallible sink.
    #[allow(dead_code)]
    logged_once: AtomicBool,
}

/// A [`Read`] combinator that copies every byte it returns to the caller
/// onward to a fixed set of sinks, best-effort.
pub struct TeeReader<R> {
    inner: R,
    sinks: Vec<Registration>,
}

impl<R: Read> TeeReader<R> {
    #[must_use]
    pub fn new(inner: R, sinks: Vec<Arc<dyn TeeSink>>) -> Self {
        let sinks =
            sinks.into_iter().map(|sink| Registration { sink, logged_once: AtomicBool::new(false) }).collect();
        Self { inner, sinks }
    }
}

impl<R: Read> Read for TeeReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 {
            return Ok(0);
        }
        for registration in &self.sinks {
            registration.sink.write(&buf[..n]);
        }
        Ok(n)
    }
}

/// A [`TeeSink`] that logs a warning the first time it is invoked after
/// construction and is silent thereafter — a placeholder shape for sinks
/// whose own backend has nothing more specific to report; real sinks
/// (the transcoder `pipeSink`s) implement [`TeeSink`] directly instead.
pub struct LoggingSink {
    name: &'static str,
    failed_once: AtomicBool,
}

impl LoggingSink {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self { name, failed_once: AtomicBool::new(false) }
    }

    /// Records a sink-side failure for later diagnosis, logging only once.
    pub fn note_failure(&self) {
        if !self.failed_once.swap(true, Ordering::Relaxed) {
            warn!(sink = self.name, "tee sink reported a failure; further failures are silent");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Mutex;

    struct CollectingSink(Mutex<Vec<u8>>);

    impl TeeSink for CollectingSink {
        fn write(&self, bytes: &[u8]) {
            self.0.lock().unwrap().extend_from_slice(bytes);
        }
    }

    #[test]
    fn tee_forwards_every_byte_read_to_every_sink() {
        let a = Arc::new(CollectingSink(Mutex::new(Vec::new())));
        let b = Arc::new(CollectingSink(Mutex::new(Vec::new())));
        let mut reader =
            TeeReader::new(Cursor::new(b"hello world".to_vec()), vec![a.clone(), b.clone()]);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();

        assert_eq!(out, b"hello world");
        assert_eq!(*a.0.lock().unwrap(), b"hello world");
        assert_eq!(*b.0.lock().unwrap(), b"hello world");
    }

    struct PanicSink;
    impl TeeSink for PanicSink {
        fn write(&self, _bytes: &[u8]) {
            // Deliberately does nothing — stands in for a sink whose
            // backend silently drops bytes rather than surfacing an error.
        }
    }

    #[test]
    fn a_sink_that_drops_bytes_does_not_affect_the_caller_or_other_sinks() {
        let broken = Arc::new(PanicSink);
        let healthy = Arc::new(CollectingSink(Mutex::new(Vec::new())));
        let mut reader = TeeReader::new(Cursor::new(b"data".to_vec()), vec![broken, healthy.clone()]);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();

        assert_eq!(out, b"data");
        assert_eq!(*healthy.0.lock().unwrap(), b"data");
    }

    #[test]
    fn logging_sink_warns_only_once() {
        let sink = LoggingSink::new("test-sink");
        sink.note_failure();
        sink.note_failure();
        assert!(sink.failed_once.load(Ordering::Relaxed));
    }
}
