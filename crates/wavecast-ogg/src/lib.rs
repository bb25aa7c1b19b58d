// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Ogg-Opus container parsing.
//!
//! ## Modules
//!
//! - [`page`]: raw Ogg page framing (capture pattern, granule, segment
//!   table, payload)
//! - [`reader`]: packet reconstruction across page/segment boundaries,
//!   `OpusHead`/`OpusTags` detection, and per-packet duration assignment
//! - [`seek`]: forward seek by granule position, skipping whole pages
//!   without ever decoding a packet
//! - [`source`]: replays cached header pages ahead of a post-seek byte
//!   range so every consumer sees one well-formed stream

pub mod page;
pub mod reader;
pub mod seek;
pub mod source;

pub use page::{OggPage, PageError};
pub use reader::{
    is_opus_head, is_opus_tags, parse_opus_tags, OggOpusReader, OpusComments, OpusHead, OpusPacket,
    ReaderError, SeekState,
};
pub use seek::{seek_to_granule, SeekError, SeekResult};
pub use source::PrimedSource;
