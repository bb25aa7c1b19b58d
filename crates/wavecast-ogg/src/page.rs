// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Ogg page parsing — the transport layer beneath Opus packet reconstruction.
//!
//! An Ogg page is a 27-byte header, a segment table, and the concatenated
//! segment payloads. This module only understands pages; packet
//! reconstruction (segments joined across pages into Opus packets) lives in
//! [`crate::reader`].

use std::io::{self, Read};

use thiserror::Error;

/// The 4-byte Ogg capture pattern every page begins with.
pub const CAPTURE_PATTERN: &[u8; 4] = b"OggS";

/// Set in a page's `header_type` byte when the page begins a logical
/// bitstream (beginning-of-stream).
pub const HEADER_TYPE_BOS: u8 = 0x02;

/// Errors produced while parsing Ogg page framing.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("invalid Ogg capture pattern")]
    InvalidCapturePattern,
    #[error("truncated Ogg page")]
    Truncated,
    #[error("I/O error reading Ogg page: {0}")]
    Io(#[from] io::Error),
}

/// A single parsed Ogg page.
#[derive(Debug, Clone)]
pub struct OggPage {
    pub granule: u64,
    pub serial: u32,
    pub sequence: u32,
    pub header_type: u8,
    /// Complete segment table entries (each 0..=255), in order.
    pub segment_table: Vec<u8>,
    /// The page's payload, still split along segment boundaries.
    pub segments: Vec<Vec<u8>>,
    /// The entire page, header through payload, verbatim — used to re-prime
    /// a fresh transcoder with cached header pages.
    pub raw: Vec<u8>,
}

impl OggPage {
    /// Total byte length of this page as it appeared on the wire.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.raw.len()
    }

    /// True if this page opens a new logical bitstream.
    #[must_use]
    pub fn is_bos(&self) -> bool {
        self.header_type & HEADER_TYPE_BOS != 0
    }
}

/// A page's header and segment table, parsed without touching its payload —
/// the fast-path shape used to skip a page's audio bytes with a byte-offset
/// seek instead of reading them into memory.
#[derive(Debug, Clone)]
pub struct PageHeader {
    pub granule: u64,
    pub serial: u32,
    pub sequence: u32,
    pub header_type: u8,
    /// Complete segment table entries (each 0..=255), in order.
    pub segment_table: Vec<u8>,
    /// Sum of the segment table, i.e. the payload's byte length.
    pub total_payload: usize,
    /// The 27-byte fixed header followed by the segment table, verbatim.
    pub header_bytes: Vec<u8>,
}

impl PageHeader {
    /// True if this page opens a new logical bitstream.
    #[must_use]
    pub fn is_bos(&self) -> bool {
        self.header_type & HEADER_TYPE_BOS != 0
    }
}

/// Reads a page's header and segment table from `r`, leaving the payload
/// unread on the stream. The caller is responsible for either reading or
/// seeking past `total_payload` bytes before parsing the next page.
///
/// Returns `Ok(None)` on a clean end-of-stream (zero bytes read where a page
/// was expected). Any other truncation, or an invalid capture pattern, is a
/// [`PageError`] — per the reader's failure semantics this always means
/// "treat as end-of-track", never a process-fatal condition.
pub fn read_page_header<R: Read>(r: &mut R) -> Result<Option<PageHeader>, PageError> {
    let mut header = [0u8; 27];
    let n = read_fill(r, &mut header)?;
    if n == 0 {
        return Ok(None);
    }
    if n < header.len() {
        return Err(PageError::Truncated);
    }
    if &header[0..4] != CAPTURE_PATTERN {
        return Err(PageError::InvalidCapturePattern);
    }

    let header_type = header[5];
    let granule = u64::from_le_bytes([
        header[6], header[7], header[8], header[9], header[10], header[11], header[12],
        header[13],
    ]);
    let serial = u32::from_le_bytes([header[14], header[15], header[16], header[17]]);
    let sequence = u32::from_le_bytes([header[18], header[19], header[20], header[21]]);
    let page_segments = header[26] as usize;

    let mut segment_table = vec![0u8; page_segments];
    if read_fill(r, &mut segment_table)? < page_segments {
        return Err(PageError::Truncated);
    }

    let total_payload: usize = segment_table.iter().map(|&b| b as usize).sum();

    let mut header_bytes = Vec::with_capacity(27 + page_segments);
    header_bytes.extend_from_slice(&header);
    header_bytes.extend_from_slice(&segment_table);

    Ok(Some(PageHeader { granule, serial, sequence, header_type, segment_table, total_payload, header_bytes }))
}

/// Reads and parses a single Ogg page, including its payload, from `r`.
///
/// See [`read_page_header`] for the end-of-stream/truncation semantics.
pub fn read_page<R: Read>(r: &mut R) -> Result<Option<OggPage>, PageError> {
    let header = match read_page_header(r)? {
        Some(header) => header,
        None => return Ok(None),
    };

    let mut payload = vec![0u8; header.total_payload];
    if read_fill(r, &mut payload)? < header.total_payload {
        return Err(PageError::Truncated);
    }

    let mut segments = Vec::with_capacity(header.segment_table.len());
    let mut offset = 0usize;
    for &len in &header.segment_table {
        let len = len as usize;
        segments.push(payload[offset..offset + len].to_vec());
        offset += len;
    }

    let mut raw = Vec::with_capacity(header.header_bytes.len() + header.total_payload);
    raw.extend_from_slice(&header.header_bytes);
    raw.extend_from_slice(&payload);

    Ok(Some(OggPage {
        granule: header.granule,
        serial: header.serial,
        sequence: header.sequence,
        header_type: header.header_type,
        segment_table: header.segment_table,
        segments,
        raw,
    }))
}

/// Reads until `buf` is full or the source is exhausted, returning the
/// number of bytes actually read (like a short `read_exact` that tolerates
/// clean EOF at the very start).
fn read_fill<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match r.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_page(granule: u64, serial: u32, sequence: u32, header_type: u8, segments: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(CAPTURE_PATTERN);
        out.push(0); // version
        out.push(header_type);
        out.extend_from_slice(&granule.to_le_bytes());
        out.extend_from_slice(&serial.to_le_bytes());
        out.extend_from_slice(&sequence.to_le_bytes());
        out.extend_from_slice(&[0u8; 4]); // crc, unchecked by the reader
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
    fn parses_single_segment_page() {
        let bytes = build_page(960, 42, 0, HEADER_TYPE_BOS, &[b"hello"]);
        let mut cursor = std::io::Cursor::new(bytes);
        let page = read_page(&mut cursor).unwrap().unwrap();
        assert_eq!(page.granule, 960);
        assert_eq!(page.serial, 42);
        assert!(page.is_bos());
        assert_eq!(page.segments, vec![b"hello".to_vec()]);
    }

    #[test]
    fn rejects_bad_capture_pattern() {
        let mut bytes = build_page(0, 1, 0, 0, &[b"x"]);
        bytes[0] = b'X';
        let mut cursor = std::io::Cursor::new(bytes);
        assert!(matches!(read_page(&mut cursor), Err(PageError::InvalidCapturePattern)));
    }

    #[test]
    fn truncated_page_is_an_error() {
        let bytes = build_page(0, 1, 0, 0, &[b"hello world"]);
        let mut cursor = std::io::Cursor::new(&bytes[..bytes.len() - 3]);
        assert!(matches!(read_page(&mut cursor), Err(PageError::Truncated)));
    }

    #[test]
    fn clean_eof_returns_none() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        assert!(read_page(&mut cursor).unwrap().is_none());
    }
}
