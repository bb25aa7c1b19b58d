// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Packet reconstruction and per-packet duration assignment for an
//! Ogg-Opus bitstream, built on top of [`crate::page`].
//!
//! An Opus packet may span several Ogg segments and, when a segment is
//! exactly 255 bytes (the lacing continuation marker), several pages. This
//! reader folds that segmentation away and hands callers whole packets with
//! a duration derived from the enclosing page's granule position, per
//! RFC 7845 §4.

use std::io::Read;

use thiserror::Error;

use crate::page::{read_page, OggPage, PageError};

/// Default packet duration used when a page's granule accounting leaves no
/// other way to apportion duration across its packets (e.g. a page with a
/// granule of zero, as the header pages have).
pub const FALLBACK_PACKET_DURATION_MS: u64 = 20;

const OPUS_HEAD_MAGIC: &[u8; 8] = b"OpusHead";
const OPUS_TAGS_MAGIC: &[u8; 8] = b"OpusTags";

/// Errors produced while reconstructing Opus packets.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("Ogg page error: {0}")]
    Page(#[from] PageError),
    #[error("OpusHead packet is truncated or malformed")]
    MalformedOpusHead,
}

/// Parsed fields from the mandatory `OpusHead` packet (RFC 7845 §5.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpusHead {
    pub channel_count: u8,
    pub pre_skip: u16,
    pub input_sample_rate: u32,
    pub output_gain: i16,
    pub channel_mapping_family: u8,
}

/// Parses the fixed-layout fields of an `OpusHead` packet.
pub fn parse_opus_head(packet: &[u8]) -> Result<OpusHead, ReaderError> {
    if packet.len() < 19 || &packet[0..8] != OPUS_HEAD_MAGIC {
        return Err(ReaderError::MalformedOpusHead);
    }
    Ok(OpusHead {
        channel_count: packet[9],
        pre_skip: u16::from_le_bytes([packet[10], packet[11]]),
        input_sample_rate: u32::from_le_bytes([packet[12], packet[13], packet[14], packet[15]]),
        output_gain: i16::from_le_bytes([packet[16], packet[17]]),
        channel_mapping_family: packet[18],
    })
}

/// True if `packet` begins with the `OpusHead` magic.
#[must_use]
pub fn is_opus_head(packet: &[u8]) -> bool {
    packet.len() >= 8 && &packet[0..8] == OPUS_HEAD_MAGIC
}

/// True if `packet` begins with the `OpusTags` magic.
#[must_use]
pub fn is_opus_tags(packet: &[u8]) -> bool {
    packet.len() >= 8 && &packet[0..8] == OPUS_TAGS_MAGIC
}

/// The vendor string and `KEY=VALUE` user comments carried by an `OpusTags`
/// packet (RFC 7845 §5.2).
#[derive(Debug, Clone, Default)]
pub struct OpusComments {
    pub vendor: String,
    pub comments: Vec<(String, String)>,
}

impl OpusComments {
    /// All values for a comment key, case-insensitively, in declaration
    /// order (a tag may legally repeat, e.g. multiple `ARTIST` comments).
    #[must_use]
    pub fn values(&self, key: &str) -> Vec<String> {
        self.comments
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.clone())
            .collect()
    }
}

/// Parses vendor string and user comments out of an `OpusTags` packet.
/// Malformed length prefixes are treated as "no more comments" rather than
/// an error, matching the reader's tolerant, skip-on-parse-failure stance
/// for metadata (audio framing itself remains strict).
pub fn parse_opus_tags(packet: &[u8]) -> OpusComments {
    let mut comments = OpusComments::default();
    if packet.len() < 12 || &packet[0..8] != OPUS_TAGS_MAGIC {
        return comments;
    }
    let mut pos = 8;
    let Some(vendor_len) = read_u32_le(packet, pos) else { return comments };
    pos += 4;
    let vendor_len = vendor_len as usize;
    let Some(vendor_bytes) = packet.get(pos..pos + vendor_len) else { return comments };
    comments.vendor = String::from_utf8_lossy(vendor_bytes).into_owned();
    pos += vendor_len;

    let Some(count) = read_u32_le(packet, pos) else { return comments };
    pos += 4;
    for _ in 0..count {
        let Some(len) = read_u32_le(packet, pos) else { break };
        pos += 4;
        let len = len as usize;
        let Some(bytes) = packet.get(pos..pos + len) else { break };
        pos += len;
        let text = String::from_utf8_lossy(bytes);
        if let Some((key, value)) = text.split_once('=') {
            comments.comments.push((key.to_string(), value.to_string()));
        }
    }
    comments
}

fn read_u32_le(packet: &[u8], pos: usize) -> Option<u32> {
    let bytes = packet.get(pos..pos + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// A reconstructed Opus audio packet with its assigned playback duration.
#[derive(Debug, Clone)]
pub struct OpusPacket {
    pub payload: Vec<u8>,
    pub duration_samples: u64,
    pub granule: u64,
}

/// State needed to resume packet reconstruction mid-stream, e.g. after a
/// forward seek has fast-skipped to a later page.
#[derive(Debug, Clone, Copy)]
pub struct SeekState {
    pub prev_granule: u64,
}

/// Reconstructs Opus packets (and their durations) from a raw Ogg-Opus byte
/// stream.
///
/// Two header packets (`OpusHead`, then `OpusTags`) are recognized and
/// surfaced via [`OggOpusReader::opus_head`] rather than being handed back
/// as audio via [`OggOpusReader::next_packet`]; every later packet is
/// treated as audio and assigned a duration.
pub struct OggOpusReader<R> {
    inner: R,
    opus_head: Option<OpusHead>,
    opus_tags: Option<Vec<u8>>,
    seen_tags: bool,
    /// Segments of the audio packet currently being assembled, carried
    /// across page boundaries when a page ends mid-packet.
    carry: Vec<u8>,
    prev_granule: u64,
    queue: std::collections::VecDeque<OpusPacket>,
}

impl<R: Read> OggOpusReader<R> {
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            opus_head: None,
            opus_tags: None,
            seen_tags: false,
            carry: Vec::new(),
            prev_granule: 0,
            queue: std::collections::VecDeque::new(),
        }
    }

    /// The parsed `OpusHead`, once the header page has been consumed.
    #[must_use]
    pub fn opus_head(&self) -> Option<OpusHead> {
        self.opus_head
    }

    /// The raw `OpusTags` packet, once its page has been consumed.
    #[must_use]
    pub fn opus_tags(&self) -> Option<&[u8]> {
        self.opus_tags.as_deref()
    }

    /// Primes the reader's granule-delta accounting after a forward seek,
    /// so the first page read post-seek computes a sane duration instead of
    /// treating the jump as elapsed playback.
    pub fn set_seek_state(&mut self, state: SeekState) {
        self.prev_granule = state.prev_granule;
        self.carry.clear();
    }

    /// Returns the next reconstructed audio packet, pulling and processing
    /// additional Ogg pages as needed. Returns `Ok(None)` at clean
    /// end-of-stream.
    pub fn next_packet(&mut self) -> Result<Option<OpusPacket>, ReaderError> {
        loop {
            if let Some(packet) = self.queue.pop_front() {
                return Ok(Some(packet));
            }
            match read_page(&mut self.inner)? {
                Some(page) => self.consume_page(page)?,
                None => return Ok(None),
            }
        }
    }

    /// Splits a page's segments into complete packets (joining 255-byte
    /// lacing continuations, including ones that began on a prior page),
    /// classifies header packets, and assigns each resulting audio packet a
    /// duration from the page's granule delta.
    fn consume_page(&mut self, page: OggPage) -> Result<(), ReaderError> {
        let mut audio_packets: Vec<Vec<u8>> = Vec::new();
        let mut current = std::mem::take(&mut self.carry);

        let n_segments = page.segment_table.len();
        for (i, &seg_len) in page.segment_table.iter().enumerate() {
            current.extend_from_slice(&page.segments[i]);
            let terminates = seg_len < 255;
            let is_last_segment = i + 1 == n_segments;
            if terminates {
                let packet = std::mem::take(&mut current);
                self.classify_packet(packet, &mut audio_packets)?;
            } else if is_last_segment {
                // Page ends mid-packet (continues on next page); carry it.
                self.carry = current;
                current = Vec::new();
            }
        }

        if audio_packets.is_empty() {
            return Ok(());
        }

        let duration_per_packet = self.apportion_duration(page.granule, audio_packets.len());
        let mut remaining_granule = page.granule;
        for (idx, payload) in audio_packets.into_iter().enumerate() {
            let is_last = idx + 1 == duration_per_packet.len();
            let duration = duration_per_packet[idx];
            let granule = if is_last { remaining_granule } else { self.prev_granule.saturating_add(duration) };
            remaining_granule = granule;
            self.prev_granule = granule;
            self.queue.push_back(OpusPacket { payload, duration_samples: duration, granule });
        }
        Ok(())
    }

    fn classify_packet(&mut self, packet: Vec<u8>, audio_packets: &mut Vec<Vec<u8>>) -> Result<(), ReaderError> {
        if self.opus_head.is_none() {
            self.opus_head = Some(parse_opus_head(&packet)?);
            return Ok(());
        }
        if !self.seen_tags {
            self.seen_tags = true;
            self.opus_tags = Some(packet);
            return Ok(());
        }
        audio_packets.push(packet);
    }

    /// Splits the granule delta for this page evenly across `count`
    /// packets, at 48 kHz granule-per-sample resolution; the last packet
    /// absorbs whatever remainder integer division leaves behind so the sum
    /// always equals the page's full delta.
    fn apportion_duration(&self, page_granule: u64, count: usize) -> Vec<u64> {
        if count == 0 {
            return Vec::new();
        }
        let delta = page_granule.saturating_sub(self.prev_granule);
        if delta == 0 {
            // Header pages (granule 0) and degenerate pages fall back to a
            // fixed 20ms/packet assumption at 48kHz.
            let fallback = FALLBACK_PACKET_DURATION_MS * 48;
            return vec![fallback; count];
        }
        let per_packet = delta / count as u64;
        let remainder = delta - per_packet * count as u64;
        let mut out = vec![per_packet; count];
        if let Some(last) = out.last_mut() {
            *last += remainder;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opus_head_packet(sample_rate: u32, pre_skip: u16, channels: u8) -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(OPUS_HEAD_MAGIC);
        p.push(1); // version
        p.push(channels);
        p.extend_from_slice(&pre_skip.to_le_bytes());
        p.extend_from_slice(&sample_rate.to_le_bytes());
        p.extend_from_slice(&0i16.to_le_bytes()); // output gain
        p.push(0); // channel mapping family
        p
    }

    fn opus_tags_packet() -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(OPUS_TAGS_MAGIC);
        p.extend_from_slice(&0u32.to_le_bytes()); // vendor string length
        p.extend_from_slice(&0u32.to_le_bytes()); // comment count
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

    #[test]
    fn parses_opus_head_fields() {
        let head = parse_opus_head(&opus_head_packet(48000, 312, 2)).unwrap();
        assert_eq!(head.input_sample_rate, 48000);
        assert_eq!(head.pre_skip, 312);
        assert_eq!(head.channel_count, 2);
    }

    #[test]
    fn reader_skips_header_packets_and_surfaces_opus_head() {
        let mut bytes = Vec::new();
        bytes.extend(build_page(0, 0, crate::page::HEADER_TYPE_BOS, &[&opus_head_packet(48000, 0, 2)]));
        bytes.extend(build_page(0, 1, 0, &[&opus_tags_packet()]));
        bytes.extend(build_page(960, 2, 0, &[&[1, 2, 3]]));

        let mut reader = OggOpusReader::new(std::io::Cursor::new(bytes));
        let packet = reader.next_packet().unwrap().unwrap();
        assert_eq!(packet.payload, vec![1, 2, 3]);
        assert_eq!(packet.duration_samples, 960);
        assert_eq!(packet.granule, 960);
        assert_eq!(reader.opus_head().unwrap().input_sample_rate, 48000);
        assert!(reader.next_packet().unwrap().is_none());
    }

    #[test]
    fn duration_split_evenly_with_remainder_on_last_packet() {
        let mut bytes = Vec::new();
        bytes.extend(build_page(0, 0, crate::page::HEADER_TYPE_BOS, &[&opus_head_packet(48000, 0, 2)]));
        bytes.extend(build_page(0, 1, 0, &[&opus_tags_packet()]));
        // Page granule delta of 1000 split across 3 packets: 333, 333, 334.
        bytes.extend(build_page(1000, 2, 0, &[&[1], &[2], &[3]]));

        let mut reader = OggOpusReader::new(std::io::Cursor::new(bytes));
        let p1 = reader.next_packet().unwrap().unwrap();
        let p2 = reader.next_packet().unwrap().unwrap();
        let p3 = reader.next_packet().unwrap().unwrap();
        assert_eq!(p1.duration_samples, 333);
        assert_eq!(p2.duration_samples, 333);
        assert_eq!(p3.duration_samples, 334);
        assert_eq!(p3.granule, 1000);
    }

    #[test]
    fn lacing_continuation_joins_segments_across_pages() {
        let segment_255 = vec![7u8; 255];
        let mut bytes = Vec::new();
        bytes.extend(build_page(0, 0, crate::page::HEADER_TYPE_BOS, &[&opus_head_packet(48000, 0, 2)]));
        bytes.extend(build_page(0, 1, 0, &[&opus_tags_packet()]));
        bytes.extend(build_page(0, 2, 0, &[&segment_255]));
        bytes.extend(build_page(960, 3, 0, &[&[9, 9]]));

        let mut reader = OggOpusReader::new(std::io::Cursor::new(bytes));
        let packet = reader.next_packet().unwrap().unwrap();
        assert_eq!(packet.payload.len(), 257);
        assert_eq!(&packet.payload[255..], &[9, 9]);
    }

    #[test]
    fn parses_opus_tags_comments() {
        let mut p = Vec::new();
        p.extend_from_slice(OPUS_TAGS_MAGIC);
        p.extend_from_slice(&6u32.to_le_bytes());
        p.extend_from_slice(b"vendor");
        p.extend_from_slice(&2u32.to_le_bytes());
        let c1 = b"ARTIST=alice feat. bob";
        p.extend_from_slice(&(c1.len() as u32).to_le_bytes());
        p.extend_from_slice(c1);
        let c2 = b"TITLE=Song Name";
        p.extend_from_slice(&(c2.len() as u32).to_le_bytes());
        p.extend_from_slice(c2);

        let comments = parse_opus_tags(&p);
        assert_eq!(comments.vendor, "vendor");
        assert_eq!(comments.values("artist"), vec!["alice feat. bob"]);
        assert_eq!(comments.values("TITLE"), vec!["Song Name"]);
    }

    #[test]
    fn is_opus_head_and_tags_detection() {
        assert!(is_opus_head(&opus_head_packet(48000, 0, 2)));
        assert!(is_opus_tags(&opus_tags_packet()));
        assert!(!is_opus_head(&opus_tags_packet()));
    }
}
