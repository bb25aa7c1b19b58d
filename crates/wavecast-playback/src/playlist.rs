// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The playlist driver (§4.3): loads the catalog once, then loops forever
//! over its tracks, pacing packet emission at real time, advancing the
//! shared cursor, and writing each packet into the WebRTC sample writer.
//! The tee fan-out sits transparently underneath, mirroring the raw Ogg
//! bytes as the reader pulls them through.

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use bytes::Bytes;
use rand::Rng;
use tokio::sync::Notify;
use tracing::{info, warn};
use wavecast_core::{parse_flexible_duration, Cursor, Track, WavecastError};
use wavecast_ogg::{seek_to_granule, OggOpusReader, PrimedSource, SeekState};

use crate::catalog::Catalog;
use crate::sample_writer::SampleWriter;
use crate::tee::{TeeReader, TeeSink};

/// Opus granule positions are always expressed on a virtual 48kHz clock
/// (RFC 7845 §4), independent of the stream's actual encoded sample rate.
const GRANULE_CLOCK_HZ: f64 = 48_000.0;

/// Resume-offset selection, evaluated in priority order (§4.3): a random
/// offset takes precedence over a fixed one, which takes precedence over
/// starting at zero.
#[derive(Debug, Clone, Default)]
pub enum ResumePolicy {
    #[default]
    Zero,
    Fixed(Duration),
    RandomUpTo(Duration),
}

impl ResumePolicy {
    /// Builds a policy from the two raw config strings (`RANDOM_TIMESTAMP`,
    /// `RESUME_TIMESTAMP`), each parsed per §4.3's flexible-duration rule.
    /// An unparseable non-empty value is treated as absent rather than a
    /// startup error — resuming at zero is always a safe fallback.
    #[must_use]
    pub fn from_config(random_timestamp: Option<&str>, resume_timestamp: Option<&str>) -> Self {
        if let Some(bound) = random_timestamp.and_then(parse_flexible_duration) {
            return Self::RandomUpTo(bound);
        }
        if let Some(fixed) = resume_timestamp.and_then(parse_flexible_duration) {
            return Self::Fixed(fixed);
        }
        Self::Zero
    }

    /// Resolves one concrete offset; a random bound is re-rolled on every
    /// call, so each track start picks a fresh offset.
    fn resolve(&self) -> Duration {
        match self {
            Self::Zero => Duration::ZERO,
            Self::Fixed(d) => *d,
            Self::RandomUpTo(bound) => {
                if bound.is_zero() {
                    return Duration::ZERO;
                }
                let secs = rand::thread_rng().gen_range(0.0..=bound.as_secs_f64());
                Duration::from_secs_f64(secs)
            },
        }
    }
}

struct Inner {
    cursor: Arc<Cursor>,
    sample_writer: SampleWriter,
    tee_sinks: Vec<Arc<dyn TeeSink>>,
    resume_policy: ResumePolicy,
    catalog: OnceLock<Catalog>,
    now_playing: std::sync::RwLock<Track>,
    running: AtomicBool,
    stopped: AtomicBool,
    done: Notify,
}

/// Owns the autoplay loop: one Ogg-Opus track after another, forever, at
/// real time, writing into the shared cursor and sample writer.
#[derive(Clone)]
pub struct PlaylistDriver {
    inner: Arc<Inner>,
}

impl PlaylistDriver {
    #[must_use]
    pub fn new(
        cursor: Arc<Cursor>,
        sample_writer: SampleWriter,
        tee_sinks: Vec<Arc<dyn TeeSink>>,
        resume_policy: ResumePolicy,
    ) -> Self {
        let inner = Arc::new(Inner {
            cursor,
            sample_writer,
            tee_sinks,
            resume_policy,
            catalog: OnceLock::new(),
            now_playing: std::sync::RwLock::new(Track::new(PathBuf::new(), Some("-".to_string()), &[])),
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            done: Notify::new(),
        });
        Self { inner }
    }

    /// Scans `media_dir` on first call and starts the autoplay loop.
    /// Idempotent while already running: a subsequent call is a no-op.
    pub async fn start_autoplay(&self, media_dir: PathBuf) -> Result<(), WavecastError> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if self.inner.catalog.get().is_none() {
            let scan_result = tokio::task::spawn_blocking(move || Catalog::scan(&media_dir))
                .await
                .map_err(|err| WavecastError::Runtime(err.to_string()))?;
            match scan_result {
                Ok(catalog) => {
                    let _ = self.inner.catalog.set(catalog);
                },
                Err(err) => {
                    self.inner.running.store(false, Ordering::SeqCst);
                    return Err(err);
                },
            }
        }
        self.inner.stopped.store(false, Ordering::SeqCst);
        tokio::spawn(run_loop(self.inner.clone()));
        Ok(())
    }

    /// Stops the current loop (one-shot stop signal), waits up to 5s for it
    /// to observe the signal and exit, then starts a fresh loop over the
    /// same catalog (§3 invariant 2).
    pub async fn restart(&self) {
        info!("playlist driver restart requested");
        let wait = self.inner.done.notified();
        self.inner.stopped.store(true, Ordering::SeqCst);
        if self.inner.running.load(Ordering::SeqCst) {
            let _ = tokio::time::timeout(Duration::from_secs(5), wait).await;
        }
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.stopped.store(false, Ordering::SeqCst);
        tokio::spawn(run_loop(self.inner.clone()));
        self.inner.running.store(true, Ordering::SeqCst);
    }

    /// Total audio packets dropped into the sample writer's bounded queue
    /// since this driver was created.
    #[must_use]
    pub fn drop_count(&self) -> u64 {
        self.inner.sample_writer.drop_count()
    }

    /// The currently playing track's metadata, for the status endpoint.
    /// Title is never blank and artists is never absent (§4.9).
    #[must_use]
    pub fn now_playing(&self) -> Track {
        #[allow(clippy::unwrap_used)]
        self.inner.now_playing.read().unwrap().clone()
    }
}

async fn run_loop(inner: Arc<Inner>) {
    inner.running.store(true, Ordering::SeqCst);
    let Some(catalog) = inner.catalog.get() else {
        inner.running.store(false, Ordering::SeqCst);
        inner.done.notify_waiters();
        return;
    };

    let mut index = 0usize;
    loop {
        if inner.stopped.load(Ordering::SeqCst) {
            break;
        }
        let track = catalog.track_at(index).clone();
        publish_now_playing(&inner, &track);

        let blocking_inner = inner.clone();
        let blocking_track = track.clone();
        let result =
            tokio::task::spawn_blocking(move || play_track(&blocking_inner, &blocking_track)).await;

        match result {
            Ok(Ok(())) => {},
            Ok(Err(err)) => {
                warn!(track = %track.path.display(), error = %err, "track read failed, resuming in 1s");
                tokio::time::sleep(Duration::from_secs(1)).await;
            },
            Err(join_err) => {
                warn!(error = %join_err, "playlist blocking task panicked, resuming in 1s");
                tokio::time::sleep(Duration::from_secs(1)).await;
            },
        }

        if inner.stopped.load(Ordering::SeqCst) {
            break;
        }
        index = index.wrapping_add(1);
    }

    inner.running.store(false, Ordering::SeqCst);
    inner.done.notify_waiters();
}

fn publish_now_playing(inner: &Inner, track: &Track) {
    #[allow(clippy::unwrap_used)]
    let mut guard = inner.now_playing.write().unwrap();
    *guard = track.clone();
}

/// Plays one track start-to-finish at real time. Runs on a blocking-pool
/// thread: every operation here (file IO, Ogg parsing, pacing sleep) is
/// synchronous by design, since the sample writer and tee sinks are
/// themselves non-blocking.
fn play_track(inner: &Inner, track: &Track) -> Result<(), WavecastError> {
    let resume = inner.resume_policy.resolve();
    let (source, seek_state) = open_track_source(&track.path, resume)?;
    let tee_source = TeeReader::new(source, inner.tee_sinks.clone());
    let mut reader = OggOpusReader::new(tee_source);
    if let Some(state) = seek_state {
        reader.set_seek_state(state);
    }

    let mut next_send = Instant::now();
    loop {
        if inner.stopped.load(Ordering::SeqCst) {
            return Ok(());
        }
        let packet = reader.next_packet().map_err(|err| WavecastError::Codec(err.to_string()))?;
        let Some(packet) = packet else { return Ok(()) };

        #[allow(clippy::cast_precision_loss)]
        let duration = Duration::from_secs_f64(packet.duration_samples as f64 / GRANULE_CLOCK_HZ);

        inner.sample_writer.write(Bytes::from(packet.payload), duration);
        inner.cursor.advance(duration);

        next_send += duration;
        let now = Instant::now();
        if next_send > now {
            std::thread::sleep(next_send - now);
        } else {
            next_send = now;
        }
    }
}

/// Opens `path`, optionally fast-forwarding to `resume` via a granule-level
/// seek (§4.2 "Forward seek"). A zero resume offset skips the seek
/// machinery entirely and reads from the start of the file.
fn open_track_source(
    path: &Path,
    resume: Duration,
) -> Result<(PrimedSource<BufReader<File>>, Option<SeekState>), WavecastError> {
    if resume.is_zero() {
        let file = File::open(path).map_err(WavecastError::Io)?;
        return Ok((PrimedSource::unprimed(BufReader::new(file)), None));
    }

    let probe_file = File::open(path).map_err(WavecastError::Io)?;
    let mut probe_reader = OggOpusReader::new(BufReader::new(probe_file));
    probe_reader.next_packet().map_err(|err| WavecastError::Codec(err.to_string()))?;
    let head = probe_reader
        .opus_head()
        .ok_or_else(|| WavecastError::Codec("track is missing an OpusHead packet".to_string()))?;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let resume_samples = (resume.as_secs_f64() * GRANULE_CLOCK_HZ).round() as u64;
    let target_granule = resume_samples.saturating_add(u64::from(head.pre_skip));

    let scan_file = File::open(path).map_err(WavecastError::Io)?;
    let seek_result = seek_to_granule(BufReader::new(scan_file), target_granule)
        .map_err(|err| WavecastError::Codec(err.to_string()))?;

    let mut data_file = File::open(path).map_err(WavecastError::Io)?;
    data_file.seek(SeekFrom::Start(seek_result.byte_offset)).map_err(WavecastError::Io)?;

    Ok((
        PrimedSource::new(seek_result.header_pages, BufReader::new(data_file)),
        Some(seek_result.seek_state),
    ))
}
