// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The playback layer: the media catalog, the tee fan-out that mirrors the
//! live byte stream to downstream transcoders, the bounded sample writer
//! feeding the shared WebRTC track, and the playlist driver that ties them
//! together into one always-on, paced playback loop (§4.2-§4.4, §4.7
//! "Sample writer").

pub mod catalog;
pub mod playlist;
pub mod sample_writer;
pub mod tee;

pub use catalog::Catalog;
pub use playlist::{PlaylistDriver, ResumePolicy};
pub use sample_writer::{AudioSampleSink, SampleWriter};
pub use tee::{LoggingSink, TeeReader, TeeSink};
