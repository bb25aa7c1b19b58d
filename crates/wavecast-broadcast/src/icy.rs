// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Pure helpers for the legacy Icecast/ICY surface (§4.6): the response
//! header set for the continuous MP3 stream, and the one-line `.m3u`
//! playlist body. Kept independent of any HTTP framework so the app layer
//! can map these straight onto whatever header map type it uses.

/// ICY metadata describing the stream, surfaced as response headers.
#[derive(Debug, Clone)]
pub struct IcyMetadata {
    pub station_name: String,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    pub channels: u8,
}

/// `(header name, value)` pairs for the ICY response, in a stable order.
#[must_use]
pub fn icy_headers(meta: &IcyMetadata) -> Vec<(&'static str, String)> {
    vec![
        ("content-type", "audio/mpeg".to_string()),
        ("icy-name", meta.station_name.clone()),
        ("icy-br", meta.bitrate_kbps.to_string()),
        ("icy-pub", "0".to_string()),
        (
            "ice-audio-info",
            format!(
                "ice-samplerate={};ice-bitrate={};ice-channels={}",
                meta.sample_rate, meta.bitrate_kbps, meta.channels
            ),
        ),
        ("cache-control", "no-cache, no-store".to_string()),
    ]
}

/// The body of the `.m3u` playlist response: a single-entry playlist
/// pointing listeners at `stream_url`.
#[must_use]
pub fn m3u_playlist(station_name: &str, stream_url: &str) -> String {
    format!("#EXTM3U\n#EXTINF:-1,{station_name}\n{stream_url}\n")
}

/// Computes the absolute stream URL from forwarded-proto/host headers when
/// present (reverse-proxy deployments), falling back to the request's own
/// host and TLS state.
#[must_use]
pub fn absolute_stream_url(
    forwarded_proto: Option<&str>,
    forwarded_host: Option<&str>,
    request_host: &str,
    request_is_tls: bool,
    path: &str,
) -> String {
    let scheme = forwarded_proto
        .map(str::to_string)
        .unwrap_or_else(|| if request_is_tls { "https".to_string() } else { "http".to_string() });
    let host = forwarded_host.unwrap_or(request_host);
    format!("{scheme}://{host}{path}")
}
