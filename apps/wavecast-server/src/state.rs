// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Engine wiring (§2, §9 "process-global broadcast state"): constructs the
//! cursor, playlist driver, tee-fed transcoder pair, broadcaster, HLS store,
//! and WHEP plumbing once at startup, then hands the assembled [`AppState`]
//! to the HTTP layer and the cursor-stall watchdog.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tracing::warn;
use wavecast_broadcast::{Broadcaster, HlsStore};
use wavecast_core::{Cursor, WavecastError};
use wavecast_playback::{PlaylistDriver, ResumePolicy, SampleWriter, TeeSink};
use wavecast_rtc::{RtcConfig, SessionRegistry, SharedAudioTrack};
use wavecast_transcode::{encoder_args, hls_monitor, EncoderSpec, Streamer};
use webrtc::api::media_engine::MIME_TYPE_OPUS;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use crate::config::Config;
use crate::viewer::ViewerTracker;

const MP3_BITRATE_KBPS: u32 = 128;
const HLS_BITRATE_KBPS: u32 = 192;
const SAMPLE_RATE_HZ: u32 = 48_000;
const HLS_SEGMENT_SECONDS: u32 = 6;

/// Adapts a [`Streamer`] so the tee fan-out can write straight into its
/// stdin pipeline without either side knowing about the other's shape.
struct StreamerTeeSink(Streamer);

impl TeeSink for StreamerTeeSink {
    fn write(&self, bytes: &[u8]) {
        self.0.write(Bytes::copy_from_slice(bytes));
    }
}

/// Everything the HTTP layer and the watchdog need: the shared cursor, the
/// playlist driver, both transcoders, the broadcaster, the HLS store, and
/// the WHEP session/track pair. One instance exists per process.
pub struct AppState {
    pub cursor: Arc<Cursor>,
    pub playlist: PlaylistDriver,
    pub broadcaster: Arc<Broadcaster>,
    pub hls_store: Arc<HlsStore>,
    pub mp3_streamer: Streamer,
    pub hls_streamer: Streamer,
    pub sessions: Arc<SessionRegistry>,
    pub shared_track: Arc<SharedAudioTrack>,
    pub rtc_config: RtcConfig,
    pub viewer: Arc<ViewerTracker>,
    pub config: Config,
    pub started_at: Instant,
    pub started_at_epoch: u64,
}

impl AppState {
    /// Builds the engine and starts autoplay. Fails only on conditions
    /// §7 classifies as fatal-at-start: an unreadable/empty media
    /// directory, or the encoder binary missing entirely.
    pub async fn build(config: Config) -> Result<Arc<Self>, WavecastError> {
        let cursor = Arc::new(Cursor::new());

        let capability = RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            clock_rate: SAMPLE_RATE_HZ,
            channels: 2,
            sdp_fmtp_line: "minptime=10;useinbandfec=1;maxaveragebitrate=192000".to_owned(),
            rtcp_feedback: vec![],
        };
        let track = Arc::new(TrackLocalStaticSample::new(
            capability,
            "audio".to_owned(),
            "wavecast".to_owned(),
        ));
        let shared_track = Arc::new(SharedAudioTrack::new(track));
        let sample_writer = SampleWriter::new(shared_track.clone());

        let broadcaster = Arc::new(Broadcaster::new());
        let hls_store =
            Arc::new(HlsStore::new(PathBuf::from(&config.hls_output_dir)).map_err(WavecastError::Io)?);

        let broadcast_sink = broadcaster.clone();
        let mp3_spec = EncoderSpec {
            binary: config.ffmpeg_bin.clone(),
            args: encoder_args::mp3_args(MP3_BITRATE_KBPS, SAMPLE_RATE_HZ, None),
            on_stdout: Some(Arc::new(move |chunk: Bytes| broadcast_sink.broadcast(chunk))),
        };
        let mp3_streamer =
            Streamer::start(mp3_spec).await.map_err(|err| WavecastError::Transcoder(err.to_string()))?;

        let hls_spec = EncoderSpec {
            binary: config.ffmpeg_bin.clone(),
            args: encoder_args::hls_args(
                hls_store.root(),
                HLS_BITRATE_KBPS,
                SAMPLE_RATE_HZ,
                HLS_SEGMENT_SECONDS,
                config.ffmpeg_loglevel_hls.as_deref(),
            ),
            on_stdout: None,
        };
        let hls_streamer =
            Streamer::start(hls_spec).await.map_err(|err| WavecastError::Transcoder(err.to_string()))?;
        hls_monitor::spawn(hls_streamer.clone(), hls_store.root().join("live.m3u8"));

        let tee_sinks: Vec<Arc<dyn TeeSink>> = vec![
            Arc::new(StreamerTeeSink(mp3_streamer.clone())),
            Arc::new(StreamerTeeSink(hls_streamer.clone())),
        ];

        let resume_policy =
            ResumePolicy::from_config(config.random_timestamp.as_deref(), config.resume_timestamp.as_deref());
        let playlist = PlaylistDriver::new(cursor.clone(), sample_writer, tee_sinks, resume_policy);
        playlist.start_autoplay(PathBuf::from(&config.media_dir)).await?;

        let sessions = Arc::new(SessionRegistry::new());
        let rtc_config = config.build_rtc_config().await;
        let viewer = Arc::new(ViewerTracker::new(config.viewer_hash_salt.clone()));

        let started_at_epoch =
            SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);

        Ok(Arc::new(Self {
            cursor,
            playlist,
            broadcaster,
            hls_store,
            mp3_streamer,
            hls_streamer,
            sessions,
            shared_track,
            rtc_config,
            viewer,
            config,
            started_at: Instant::now(),
            started_at_epoch,
        }))
    }
}

/// Spawns the cursor-stall watchdog (§4.8): ticks at `max(1s, stall/2)` and,
/// once the cursor has been observed unchanged for `stall` without a restart
/// in the preceding `stall` interval, restarts the playlist driver and both
/// transcoders. A zero `CURSOR_STALL_TIMEOUT` disables the watchdog.
pub fn spawn_stall_watchdog(state: Arc<AppState>) {
    let stall = state.config.cursor_stall_timeout();
    if stall.is_zero() {
        return;
    }

    tokio::spawn(async move {
        let tick = stall.checked_div(2).unwrap_or(stall).max(Duration::from_secs(1));
        let mut last_position = state.cursor.position();
        let mut last_change = Instant::now();
        let mut last_restart = Instant::now().checked_sub(stall).unwrap_or_else(Instant::now);

        loop {
            tokio::time::sleep(tick).await;

            let position = state.cursor.position();
            let now = Instant::now();
            if position != last_position {
                last_position = position;
                last_change = now;
                continue;
            }

            let stalled_for = now.duration_since(last_change);
            if stalled_for < stall || now.duration_since(last_restart) < stall {
                continue;
            }

            warn!(
                stalled_for = ?stalled_for,
                hls_drops = state.hls_streamer.drop_count(),
                mp3_drops = state.mp3_streamer.drop_count(),
                webrtc_drops = state.playlist.drop_count(),
                "cursor stalled, restarting playlist and transcoders"
            );
            state.playlist.restart().await;
            state.mp3_streamer.restart().await;
            state.hls_streamer.restart().await;
            last_restart = now;
            last_change = now;
        }
    });
}
