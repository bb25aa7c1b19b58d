// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The shared outgoing Opus track every WHEP peer attaches to (§4.7
//! "Sample writer"), implementing [`wavecast_playback::AudioSampleSink`] so
//! the playlist driver's drain task can write straight into it without
//! knowing anything about WebRTC.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use wavecast_playback::AudioSampleSink;
use webrtc::media::Sample;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Wraps the single [`TrackLocalStaticSample`] shared by every attached
/// WHEP peer. There is exactly one of these per process — every `add_track`
/// call on a new peer connection clones the `Arc`, not the track.
pub struct SharedAudioTrack {
    track: std::sync::Arc<TrackLocalStaticSample>,
}

impl SharedAudioTrack {
    #[must_use]
    pub fn new(track: std::sync::Arc<TrackLocalStaticSample>) -> Self {
        Self { track }
    }

    #[must_use]
    pub fn handle(&self) -> std::sync::Arc<TrackLocalStaticSample> {
        self.track.clone()
    }
}

#[async_trait]
impl AudioSampleSink for SharedAudioTrack {
    /// Writes one encoded Opus payload to every peer currently subscribed
    /// to the track. `write_sample` on a track with no receivers yet
    /// returns `Ok(())` in the underlying crate (there is simply nowhere to
    /// send), so an empty-room broadcast is not an error here.
    async fn write_sample(&self, payload: Bytes, duration: Duration) -> Result<(), String> {
        let sample = Sample { data: payload, duration, ..Sample::default() };
        self.track.write_sample(&sample).await.map_err(|err| err.to_string())?;
        debug!(bytes = sample.data.len(), ?duration, "wrote sample to shared audio track");
        Ok(())
    }
}
