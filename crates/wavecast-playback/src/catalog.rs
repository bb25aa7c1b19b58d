// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The media catalog: a one-time, non-recursive scan of `MEDIA_DIR` for
//! `.opus` files, with title/artist metadata extracted from each file's
//! `OpusTags` packet (§2 "Media catalog", §3 "Track metadata").
//!
//! The catalog is read once at startup and is immutable for the process
//! lifetime — it is not re-scanned while the server runs.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use wavecast_core::{Track, WavecastError};
use wavecast_ogg::OggOpusReader;

/// An immutable, ordered list of tracks discovered under the media
/// directory at startup. Iteration order is directory-enumeration order —
/// whatever order the platform's `read_dir` yields, stably filtered but
/// never re-sorted.
#[derive(Debug, Clone)]
pub struct Catalog {
    tracks: Vec<Track>,
}

impl Catalog {
    /// Scans `dir` non-recursively for `.opus` files (case-insensitive
    /// extension match), reading each one's `OpusTags` packet for
    /// `TITLE`/`ARTIST` metadata. Fails if `dir` cannot be read or if no
    /// `.opus` files are found — an empty catalog is a fatal startup
    /// condition (§4.3: "Load the catalog; if empty, fail immediately").
    pub fn scan(dir: &Path) -> Result<Self, WavecastError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|err| WavecastError::Configuration(format!("cannot read media directory {}: {err}", dir.display())))?;

        let paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("opus"))
            })
            .collect();

        if paths.is_empty() {
            return Err(WavecastError::Configuration(format!(
                "no .opus files found in media directory {}",
                dir.display()
            )));
        }

        let tracks = paths.into_iter().map(|path| read_track_metadata(&path)).collect();
        Ok(Self { tracks })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// The track at `index`, wrapping modulo the catalog length so the
    /// playlist driver can index monotonically and loop forever.
    #[must_use]
    pub fn track_at(&self, index: usize) -> &Track {
        #[allow(clippy::unwrap_used)]
        let idx = index % self.tracks.len();
        self.tracks.get(idx).unwrap()
    }
}

/// Reads `path`'s `OpusTags` packet for `TITLE`/`ARTIST` comments. A file
/// that can't be parsed still gets a catalog entry — metadata falls back to
/// the filename and an empty artist list rather than failing the whole scan,
/// since one corrupt file shouldn't take the station off the air.
fn read_track_metadata(path: &Path) -> Track {
    match File::open(path).map(BufReader::new) {
        Ok(file) => {
            let mut reader = OggOpusReader::new(file);
            // The first call to `next_packet` consumes OpusHead and OpusTags
            // internally before it can return (or hit EOF); either outcome
            // leaves `opus_tags()` populated if the file has one.
            let _ = reader.next_packet();
            let title = reader.opus_tags().map(wavecast_ogg::parse_opus_tags).and_then(|tags| {
                let values = tags.values("TITLE");
                values.into_iter().next()
            });
            let artists = reader
                .opus_tags()
                .map(wavecast_ogg::parse_opus_tags)
                .map(|tags| tags.values("ARTIST"))
                .unwrap_or_default();
            Track::new(path.to_path_buf(), title, &artists)
        },
        Err(_) => Track::new(path.to_path_buf(), None, &[]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn opus_tags_packet(comments: &[(&str, &str)]) -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(b"OpusTags");
        p.extend_from_slice(&6u32.to_le_bytes());
        p.extend_from_slice(b"vendor");
        p.extend_from_slice(&(comments.len() as u32).to_le_bytes());
        for (k, v) in comments {
            let entry = format!("{k}={v}");
            p.extend_from_slice(&(entry.len() as u32).to_le_bytes());
            p.extend_from_slice(entry.as_bytes());
        }
        p
    }

    fn build_page(granule: u64, sequence: u32, header_type: u8, segments: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"OggS");
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

    fn write_opus_file(dir: &Path, name: &str, comments: &[(&str, &str)]) -> PathBuf {
        let mut bytes = Vec::new();
        bytes.extend(build_page(0, 0, 0x02, &[&opus_head_packet()]));
        bytes.extend(build_page(0, 1, 0, &[&opus_tags_packet(comments)]));
        bytes.extend(build_page(960, 2, 0, &[&[1, 2, 3]]));
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn scan_finds_opus_files_and_extracts_metadata() {
        let dir = tempfile::tempdir().unwrap();
        write_opus_file(dir.path(), "b.opus", &[("TITLE", "Second"), ("ARTIST", "carol")]);
        write_opus_file(dir.path(), "a.opus", &[("TITLE", "First"), ("ARTIST", "alice feat. bob")]);
        std::fs::write(dir.path().join("not-audio.txt"), b"ignore me").unwrap();

        let catalog = Catalog::scan(dir.path()).unwrap();
        assert_eq!(catalog.len(), 2);

        // Enumeration order is whatever the platform's `read_dir` yields, so
        // the scan must not impose its own ordering — match tracks by title
        // rather than asserting a position.
        let first = (0..catalog.len()).map(|i| catalog.track_at(i)).find(|t| t.title == "First").unwrap();
        assert_eq!(first.artist_list, vec!["alice", "bob"]);
        let second = (0..catalog.len()).map(|i| catalog.track_at(i)).find(|t| t.title == "Second").unwrap();
        assert_eq!(second.artist_list, vec!["carol"]);
    }

    #[test]
    fn scan_does_not_reorder_what_read_dir_yields() {
        let dir = tempfile::tempdir().unwrap();
        let path_a = write_opus_file(dir.path(), "z_track.opus", &[("TITLE", "Z")]);
        let path_b = write_opus_file(dir.path(), "a_track.opus", &[("TITLE", "A")]);

        let enumeration_order: Vec<PathBuf> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("opus")))
            .collect();

        let catalog = Catalog::scan(dir.path()).unwrap();
        let catalog_order: Vec<PathBuf> = (0..catalog.len()).map(|i| catalog.track_at(i).path.clone()).collect();
        assert_eq!(catalog_order, enumeration_order);
        assert!(catalog_order.contains(&path_a));
        assert!(catalog_order.contains(&path_b));
    }

    #[test]
    fn track_at_wraps_modulo_catalog_length() {
        let dir = tempfile::tempdir().unwrap();
        write_opus_file(dir.path(), "only.opus", &[]);
        let catalog = Catalog::scan(dir.path()).unwrap();
        assert_eq!(catalog.track_at(0).path, catalog.track_at(5).path);
    }

    #[test]
    fn empty_directory_is_a_fatal_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Catalog::scan(dir.path()).is_err());
    }

    #[test]
    fn missing_title_falls_back_to_filename() {
        let dir = tempfile::tempdir().unwrap();
        write_opus_file(dir.path(), "untitled_track.opus", &[]);
        let catalog = Catalog::scan(dir.path()).unwrap();
        assert_eq!(catalog.track_at(0).title, "untitled_track");
        assert!(catalog.track_at(0).artist_list.is_empty());
    }
}
