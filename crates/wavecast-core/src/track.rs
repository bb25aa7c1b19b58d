// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Track metadata shared between the catalog, playlist driver, and status
//! endpoint.

use std::path::{Path, PathBuf};

/// A fixed set of separators used to split a multi-artist `ARTIST` tag.
/// Order matters: longer, more specific separators are tried first so that
/// e.g. `" feat. "` is not partially consumed by a later, shorter pattern.
const ARTIST_SEPARATORS: &[&str] =
    &[" feat. ", " ft. ", " featuring ", ";", " & ", "/", " x "];

/// Metadata for a single track in the catalog.
///
/// `title` falls back to the filename without extension when no `TITLE`
/// comment is present. `artist_list` is never `null`/absent in the JSON
/// sense — an empty `Vec` represents "no artists known".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub path: PathBuf,
    pub title: String,
    pub artist_list: Vec<String>,
}

impl Track {
    /// Builds a track from a path and the raw `TITLE`/`ARTIST` comment
    /// values parsed out of `OpusTags` (each may be absent or repeated).
    #[must_use]
    pub fn new(path: PathBuf, title: Option<String>, artists: &[String]) -> Self {
        let title = title.unwrap_or_else(|| title_from_filename(&path));
        let artist_list = split_artists(artists);
        Self { path, title, artist_list }
    }
}

/// Falls back to the filename without its extension.
fn title_from_filename(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Splits one or more raw `ARTIST` comment values on the fixed separator
/// set, trims whitespace, drops empties, and deduplicates while preserving
/// first-seen order.
#[must_use]
pub fn split_artists(raw: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for value in raw {
        for piece in split_on_any(value, ARTIST_SEPARATORS) {
            let trimmed = piece.trim();
            if trimmed.is_empty() {
                continue;
            }
            if seen.insert(trimmed.to_string()) {
                out.push(trimmed.to_string());
            }
        }
    }
    out
}

/// Splits `s` on whichever separator occurs earliest in the remaining text,
/// ties (two separators starting at the same position) broken in favor of
/// the longer match, so a separator occurring before another one in the raw
/// tag is never swallowed into the same chunk as a later, higher-priority
/// separator.
fn split_on_any<'a>(s: &'a str, separators: &[&str]) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut rest = s;
    loop {
        let next = separators
            .iter()
            .filter_map(|sep| rest.find(sep).map(|idx| (idx, sep.len())))
            .min_by_key(|&(idx, len)| (idx, std::cmp::Reverse(len)));
        match next {
            Some((idx, len)) => {
                pieces.push(&rest[..idx]);
                rest = &rest[idx + len..];
            },
            None => break,
        }
    }
    pieces.push(rest);
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_falls_back_to_filename_stem() {
        let t = Track::new(PathBuf::from("/media/song.opus"), None, &[]);
        assert_eq!(t.title, "song");
        assert!(t.artist_list.is_empty());
    }

    #[test]
    fn artist_list_splits_trims_and_dedupes() {
        let raw = vec!["alice feat. bob".to_string(), "carol".to_string(), "alice".to_string()];
        let artists = split_artists(&raw);
        assert_eq!(artists, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn artist_list_handles_all_separators() {
        let raw = vec!["a ft. b; c & d/e x f".to_string()];
        let artists = split_artists(&raw);
        assert_eq!(artists, vec!["a", "b", "c", "d", "e", "f"]);
    }

    #[test]
    fn empty_artist_tag_yields_empty_list() {
        assert!(split_artists(&[]).is_empty());
        assert!(split_artists(&[String::new()]).is_empty());
    }

    #[test]
    fn earlier_lower_priority_separator_is_not_swallowed_by_a_later_higher_priority_one() {
        let raw = vec!["alice & bob feat. carol".to_string()];
        let artists = split_artists(&raw);
        assert_eq!(artists, vec!["alice", "bob", "carol"]);
    }
}
