// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! A [`Read`] combinator that replays cached Ogg-Opus header pages ahead of
//! a post-seek byte range, so that every consumer of a seeked track — the
//! tee fan-out feeding transcoders, and the in-process packet reader
//! driving the cursor and WebRTC sample writer — observes the exact same
//! well-formed byte stream from the same starting point.

use std::io::{self, Read};

/// Concatenates cached header bytes with the remainder of an inner reader,
/// as a single logical byte stream.
pub struct PrimedSource<R> {
    header_pages: io::Cursor<Vec<u8>>,
    inner: R,
    header_exhausted: bool,
}

impl<R: Read> PrimedSource<R> {
    /// `header_pages` are replayed first, verbatim; `inner` is expected to
    /// already be positioned at the seek target (the first page at or past
    /// the target granule) and is read through to its own end after that.
    #[must_use]
    pub fn new(header_pages: Vec<u8>, inner: R) -> Self {
        Self { header_pages: io::Cursor::new(header_pages), inner, header_exhausted: false }
    }

    /// A source with no header priming — every byte comes from `inner`.
    /// Used for the common case of reading a track from its start.
    #[must_use]
    pub fn unprimed(inner: R) -> Self {
        Self::new(Vec::new(), inner)
    }
}

impl<R: Read> Read for PrimedSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.header_exhausted {
            let n = self.header_pages.read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            self.header_exhausted = true;
        }
        self.inner.read(buf)
    }
}
