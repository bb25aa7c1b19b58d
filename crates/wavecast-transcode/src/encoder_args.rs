// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Argument vectors for the external audio encoder binary (§9: "the
//! integration contract is: stdin receives a well-formed Ogg-Opus byte
//! stream ... stdout (MP3) or filesystem (HLS) carries the output").
//!
//! The encoder itself is an interface boundary — any binary accepting these
//! flags works (ffmpeg is the reference implementation assumed by the
//! default [`FFMPEG_BIN`](crate::DEFAULT_ENCODER_BIN) constant).

use std::path::Path;

/// Default location of the encoder binary, overridden by `FFMPEG_BIN`.
pub const DEFAULT_ENCODER_BIN: &str = "ffmpeg";

/// Builds the argument vector for the Opus-on-stdin, MP3-on-stdout pipeline.
#[must_use]
pub fn mp3_args(bitrate_kbps: u32, sample_rate: u32, loglevel: Option<&str>) -> Vec<String> {
    let mut args = base_input_args(loglevel);
    args.extend(
        [
            "-vn",
            "-acodec",
            "libmp3lame",
            "-b:a",
        ]
        .map(str::to_string),
    );
    args.push(format!("{bitrate_kbps}k"));
    args.push("-ar".into());
    args.push(sample_rate.to_string());
    args.push("-ac".into());
    args.push("2".into());
    args.push("-f".into());
    args.push("mp3".into());
    args.push("pipe:1".into());
    args
}

/// Builds the argument vector for the Opus-on-stdin, fMP4/HLS-on-disk
/// pipeline. `output_dir` is a unique per-run directory (the caller is
/// responsible for creating it and for choosing a fresh one on restart so a
/// dying encoder's partial segments never shadow the new one's).
#[must_use]
pub fn hls_args(
    output_dir: &Path,
    bitrate_kbps: u32,
    sample_rate: u32,
    segment_seconds: u32,
    loglevel: Option<&str>,
) -> Vec<String> {
    let mut args = base_input_args(loglevel);
    args.extend(
        [
            "-vn",
            "-acodec",
            "aac",
        ]
        .map(str::to_string),
    );
    args.push("-b:a".into());
    args.push(format!("{bitrate_kbps}k"));
    args.push("-ar".into());
    args.push(sample_rate.to_string());
    args.push("-ac".into());
    args.push("2".into());
    args.push("-f".into());
    args.push("hls".into());
    args.push("-hls_time".into());
    args.push(segment_seconds.to_string());
    args.push("-hls_segment_type".into());
    args.push("fmp4".into());
    args.push("-hls_flags".into());
    args.push("delete_segments+independent_segments".into());
    args.push("-hls_fmp4_init_filename".into());
    args.push("init.mp4".into());
    args.push("-hls_segment_filename".into());
    args.push(output_dir.join("segment_%09d.m4s").to_string_lossy().into_owned());
    args.push(output_dir.join("live.m3u8").to_string_lossy().into_owned());
    args
}

fn base_input_args(loglevel: Option<&str>) -> Vec<String> {
    let mut args = vec!["-hide_banner".to_string(), "-loglevel".to_string()];
    args.push(loglevel.unwrap_or("warning").to_string());
    args.push("-f".into());
    args.push("ogg".into());
    args.push("-i".into());
    args.push("pipe:0".into());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mp3_args_target_128kbps_stereo_48k() {
        let args = mp3_args(128, 48000, None);
        assert!(args.contains(&"128k".to_string()));
        assert!(args.windows(2).any(|w| w == ["-ar".to_string(), "48000".to_string()]));
        assert_eq!(args.last().unwrap(), "pipe:1");
    }

    #[test]
    fn hls_args_use_fmp4_segment_type() {
        let dir = Path::new("/tmp/wavecast-hls-test");
        let args = hls_args(dir, 192, 48000, 6, Some("error"));
        assert!(args.contains(&"fmp4".to_string()));
        assert!(args.contains(&"192k".to_string()));
        assert!(args.last().unwrap().ends_with("live.m3u8"));
    }
}
