// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Forward seek by granule position.
//!
//! Seeking never decodes a single packet. It walks page headers only,
//! advancing the underlying reader by each page's exact byte length until it
//! finds the first page whose granule position has reached the target, then
//! reports that page's byte offset so the caller can re-open the stream
//! from there. Along the way it also caches the two header pages
//! (`OpusHead`, `OpusTags`) so a post-seek reader — or a freshly (re)started
//! transcoder — can be re-primed without rewinding the file.

use std::io::{Read, Seek, SeekFrom};

use thiserror::Error;

use crate::page::{read_page_header, PageError};
use crate::reader::{is_opus_head, is_opus_tags, SeekState};

#[derive(Debug, Error)]
pub enum SeekError {
    #[error("Ogg page error: {0}")]
    Page(#[from] PageError),
    #[error("I/O error while seeking: {0}")]
    Io(#[from] std::io::Error),
    #[error("target granule position lies beyond the end of the stream")]
    BeyondEnd,
}

/// The outcome of a successful forward seek.
pub struct SeekResult {
    /// Byte offset of the first page whose granule position is at or past
    /// the target; the caller reopens/repositions the source here.
    pub byte_offset: u64,
    /// Raw bytes of the cached header pages (`OpusHead` then `OpusTags`),
    /// to be replayed ahead of audio so a fresh reader or transcoder sees a
    /// well-formed Ogg-Opus stream from its own point of view.
    pub header_pages: Vec<u8>,
    /// Granule-delta accounting state to prime an [`crate::reader::OggOpusReader`]
    /// resuming from `byte_offset`.
    pub seek_state: SeekState,
}

/// Scans `r` from its current position (expected to be the start of the
/// stream) for the first page at or beyond `target_granule`, without
/// reconstructing any audio packets.
pub fn seek_to_granule<R: Read + Seek>(
    mut r: R,
    target_granule: u64,
) -> Result<SeekResult, SeekError> {
    let mut header_pages = Vec::new();
    let mut header_done = false;
    let mut offset: u64 = 0;

    loop {
        let page_start = offset;
        let header = match read_page_header(&mut r)? {
            Some(header) => header,
            None => return Err(SeekError::BeyondEnd),
        };
        let payload_len = header.total_payload as u64;
        offset += header.header_bytes.len() as u64 + payload_len;

        if !header_done {
            // Header pages (OpusHead/OpusTags) need their payload read and
            // cached verbatim so a post-seek reader can be re-primed.
            let mut payload = vec![0u8; header.total_payload];
            r.read_exact(&mut payload)?;

            let mut segments = Vec::with_capacity(header.segment_table.len());
            let mut seg_offset = 0usize;
            for &len in &header.segment_table {
                let len = len as usize;
                segments.push(&payload[seg_offset..seg_offset + len]);
                seg_offset += len;
            }

            header_pages.extend_from_slice(&header.header_bytes);
            header_pages.extend_from_slice(&payload);

            if segments.iter().any(|s| is_opus_tags(s) || is_opus_head(s)) {
                // Header pages each carry exactly one packet; once we've
                // seen the OpusTags payload the header is complete.
                if segments.iter().any(|s| is_opus_tags(s)) {
                    header_done = true;
                }
                continue;
            }
            // A non-header page appearing before OpusTags would indicate a
            // malformed stream; treat the first audio-looking page as the
            // header/audio boundary defensively.
            header_done = true;
        } else if header.granule < target_granule {
            // Fast path: this page is neither a header page nor the landing
            // page, so skip its payload with a byte-offset seek instead of
            // reading it into memory.
            r.seek(SeekFrom::Current(payload_len as i64))?;
        }

        if header.granule >= target_granule {
            r.seek(SeekFrom::Start(page_start))?;
            return Ok(SeekResult {
                byte_offset: page_start,
                header_pages,
                seek_state: SeekState {
                    prev_granule: prev_granule_before(page_start, header.granule, target_granule),
                },
            });
        }
    }
}

/// The reader resumes granule-delta accounting as though the previous page
/// ended exactly at the landed-on page's granule minus its own delta isn't
/// knowable without re-reading it; using the page's own granule as the
/// starting `prev_granule` means the first page read after the seek
/// contributes a zero delta and falls back to the fixed-duration estimate,
/// which is the documented behavior for any page whose true prior granule
/// is unknown.
fn prev_granule_before(_page_start: u64, landed_granule: u64, _target_granule: u64) -> u64 {
    landed_granule
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn opus_head_packet() -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(b"OpusHead");
        p.push(1);
        p.push(2);
        p.extend_from_slice(&0u16.to_le_bytes());
        p.extend_from_slice(&48000u32.to_le_bytes());
        p.extend_from_slice(&0i16.to_le_bytes());
        p.push(0);
        p
    }

    fn opus_tags_packet() -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(b"OpusTags");
        p.extend_from_slice(&0u32.to_le_bytes());
        p.extend_from_slice(&0u32.to_le_bytes());
        p
    }

    fn build_page(granule: u64, sequence: u32, header_type: u8, segments: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(crate::page::CAPTURE_PATTERN);
        out.push(0);
        out.push(header_type);
        out.extend_from_slice(&granule.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&sequence.to_le_bytes());
        out.extend_from_slice(&[0u8; 4]);
        out.push(segments.len() as u8);
        for s in segments {
            out.push(s.len() as u8);
        }
        for s in segments {
            out.extend_from_slice(s);
        }
        out
    }

    fn sample_stream() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(build_page(0, 0, crate::page::HEADER_TYPE_BOS, &[&opus_head_packet()]));
        bytes.extend(build_page(0, 1, 0, &[&opus_tags_packet()]));
        bytes.extend(build_page(960, 2, 0, &[&[1, 2, 3]]));
        bytes.extend(build_page(1920, 3, 0, &[&[4, 5, 6]]));
        bytes.extend(build_page(2880, 4, 0, &[&[7, 8, 9]]));
        bytes
    }

    #[test]
    fn finds_first_page_at_or_past_target() {
        let bytes = sample_stream();
        let result = seek_to_granule(Cursor::new(bytes.clone()), 1920).unwrap();
        assert_eq!(result.byte_offset as usize, bytes.len() - 2 * (27 + 1 + 3));
        assert_eq!(result.seek_state.prev_granule, 1920);
    }

    #[test]
    fn caches_header_pages() {
        let bytes = sample_stream();
        let result = seek_to_granule(Cursor::new(bytes), 960).unwrap();
        assert!(result.header_pages.windows(8).any(|w| w == b"OpusHead"));
        assert!(result.header_pages.windows(8).any(|w| w == b"OpusTags"));
    }

    #[test]
    fn target_beyond_end_is_an_error() {
        let bytes = sample_stream();
        assert!(matches!(seek_to_granule(Cursor::new(bytes), 999_999), Err(SeekError::BeyondEnd)));
    }

    #[test]
    fn target_at_zero_lands_on_first_audio_page() {
        let bytes = sample_stream();
        let result = seek_to_granule(Cursor::new(bytes), 0).unwrap();
        assert_eq!(result.seek_state.prev_granule, 960);
    }

    /// A `Read + Seek` wrapper that records every byte actually handed back
    /// through `read`, as opposed to skipped over via `seek`.
    struct TrackingReader {
        inner: Cursor<Vec<u8>>,
        bytes_read: usize,
    }

    impl Read for TrackingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.inner.read(buf)?;
            self.bytes_read += n;
            Ok(n)
        }
    }

    impl Seek for TrackingReader {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn discarded_audio_pages_are_skipped_without_reading_their_payload() {
        let bytes = sample_stream();
        let reader = TrackingReader { inner: Cursor::new(bytes.clone()), bytes_read: 0 };
        let result = seek_to_granule(reader, 2880).unwrap();
        assert_eq!(result.seek_state.prev_granule, 2880);

        // `seek_to_granule` takes its reader by value, so re-run it wrapped
        // in a cell we can still inspect afterwards.
        let tracked = std::rc::Rc::new(std::cell::RefCell::new(TrackingReader {
            inner: Cursor::new(bytes.clone()),
            bytes_read: 0,
        }));

        struct Shared(std::rc::Rc<std::cell::RefCell<TrackingReader>>);
        impl Read for Shared {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                self.0.borrow_mut().read(buf)
            }
        }
        impl Seek for Shared {
            fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
                self.0.borrow_mut().seek(pos)
            }
        }

        seek_to_granule(Shared(tracked.clone()), 2880).unwrap();
        let bytes_read = tracked.borrow().bytes_read;
        // The discarded audio pages (granule 960, 1920) each carry a 3-byte
        // payload that must never be read — only their 28-byte headers
        // (27 + 1-entry segment table) plus the two cached header pages'
        // full bytes should come through `read`.
        assert!(bytes_read < bytes.len(), "payload of discarded pages must be skipped, not read");
    }
}
