// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Encoded-byte fan-out to HTTP listeners.
//!
//! ## Modules
//!
//! - [`broadcaster`]: the MP3/Icecast multicast bus with warm-start buffer
//!   and slow-consumer eviction
//! - [`hls_store`]: safe on-disk access to the HLS output directory
//! - [`icy`]: pure ICY header / `.m3u` helpers for the legacy MP3 endpoint

pub mod broadcaster;
pub mod hls_store;
pub mod icy;

pub use broadcaster::{Broadcaster, ClientId, CLIENT_CHANNEL_CAPACITY, RECENT_BUFFER_CAP_BYTES};
pub use hls_store::{cache_control_for, content_type_for, HlsStore};
pub use icy::{absolute_stream_url, icy_headers, m3u_playlist, IcyMetadata};
