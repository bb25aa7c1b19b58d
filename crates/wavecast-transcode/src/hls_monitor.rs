// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The HLS-specific health check that the plain MP3 pipeline doesn't need:
//! a stale playlist file (the encoder stopped writing segments without its
//! process actually exiting) and a safety ceiling on subprocess uptime to
//! avoid the encoder's internal timestamp accounting wrapping around.

use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};

use tracing::warn;

use crate::supervisor::Streamer;

/// Interval between playlist-staleness checks.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(10);
/// A playlist untouched for this long, while the encoder has run at least as
/// long, is considered stalled.
pub const STALE_THRESHOLD: Duration = Duration::from_secs(45);
/// Minimum subprocess uptime before staleness is judged meaningful (avoids
/// restarting an encoder that simply hasn't written its first segment yet).
pub const MIN_UPTIME_BEFORE_STALE_CHECK: Duration = Duration::from_secs(45);
/// Forced restart ceiling regardless of playlist health.
pub const UPTIME_CEILING: Duration = Duration::from_secs(8 * 60 * 60);

/// Spawns the monitor loop; it runs until the process exits (there is no
/// explicit stop — it's tied to the HLS streamer's own lifetime via the
/// `Streamer` handle it holds, and restarting a closed streamer is a no-op).
pub fn spawn(streamer: Streamer, playlist_path: PathBuf) {
    tokio::spawn(async move {
        let mut encoder_started_at = Instant::now();
        let mut last_generation = streamer.generation();
        loop {
            tokio::time::sleep(CHECK_INTERVAL).await;

            let generation = streamer.generation();
            if generation != last_generation {
                last_generation = generation;
                encoder_started_at = Instant::now();
            }

            let uptime = encoder_started_at.elapsed();

            if uptime >= UPTIME_CEILING {
                warn!(?uptime, "HLS encoder uptime ceiling reached, forcing restart");
                streamer.restart().await;
                continue;
            }

            if uptime < MIN_UPTIME_BEFORE_STALE_CHECK {
                continue;
            }

            match playlist_age(&playlist_path) {
                Some(age) if age >= STALE_THRESHOLD => {
                    warn!(?age, "HLS playlist stale, restarting encoder");
                    streamer.restart().await;
                },
                Some(_) | None => {},
            }
        }
    });
}

fn playlist_age(path: &std::path::Path) -> Option<Duration> {
    let metadata = std::fs::metadata(path).ok()?;
    let modified = metadata.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}
