// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Observes the live Ogg byte stream headed for one encoder and caches the
//! raw `OpusHead`/`OpusTags` page bytes, so a freshly (re)started encoder
//! can be re-primed with a well-formed stream start without rewinding the
//! source file.

use std::sync::Mutex;

use bytes::Bytes;
use wavecast_ogg::page::read_page;
use wavecast_ogg::reader::{is_opus_head, is_opus_tags};

struct State {
    /// Bytes observed but not yet resolved into a complete page.
    buffer: Vec<u8>,
    opus_head_page: Option<Vec<u8>>,
    opus_tags_page: Option<Vec<u8>>,
}

/// Caches the current bitstream's header pages from a live byte stream.
///
/// One instance is owned per transcoder supervisor, fed the same bytes as
/// its `PipeSink`: each encoder needs its own reprime bytes since it may
/// restart independently of the others.
pub struct HeaderCollector {
    state: Mutex<State>,
}

impl HeaderCollector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                buffer: Vec::new(),
                opus_head_page: None,
                opus_tags_page: None,
            }),
        }
    }

    /// Feeds more live stream bytes to the collector. Complete pages are
    /// parsed out of the accumulated buffer as soon as they're available;
    /// an `OpusHead`/`OpusTags` page is cached verbatim (header, segment
    /// table, and payload). A beginning-of-stream page resets the cache — a
    /// new logical bitstream (e.g. after the playlist driver restarted) has
    /// begun and the old header no longer applies.
    #[allow(clippy::significant_drop_tightening)]
    pub fn observe(&self, bytes: &[u8]) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.buffer.extend_from_slice(bytes);

        loop {
            let mut cursor = std::io::Cursor::new(state.buffer.as_slice());
            match read_page(&mut cursor) {
                Ok(Some(page)) => {
                    let consumed = usize::try_from(cursor.position()).unwrap_or(0);
                    if page.is_bos() {
                        state.opus_head_page = None;
                        state.opus_tags_page = None;
                    }
                    if page.segments.iter().any(|s| is_opus_head(s)) {
                        state.opus_head_page = Some(page.raw.clone());
                    } else if page.segments.iter().any(|s| is_opus_tags(s)) {
                        state.opus_tags_page = Some(page.raw.clone());
                    }
                    state.buffer.drain(..consumed);
                },
                // Not enough bytes yet for a whole page, or the buffer is
                // empty; wait for the next `observe` call either way.
                Ok(None) | Err(_) => break,
            }
        }
    }

    /// The cached header pages (`OpusHead` then `OpusTags`, when both have
    /// been observed), concatenated verbatim and ready to be written ahead
    /// of audio to a fresh encoder.
    #[must_use]
    pub fn cached_pages(&self) -> Bytes {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut out = Vec::new();
        if let Some(head) = &state.opus_head_page {
            out.extend_from_slice(head);
        }
        if let Some(tags) = &state.opus_tags_page {
            out.extend_from_slice(tags);
        }
        Bytes::from(out)
    }
}

impl Default for HeaderCollector {
    fn default() -> Self {
        Self::new()
    }
}
