// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Safe filesystem access to the HLS output directory the transcoder
//! supervisor writes into and the HTTP layer serves from concurrently
//! (§5: "atomic renames ... avoid mid-read corruption"; §6: per-file
//! content types and cache policy).

use std::path::{Component, Path, PathBuf};

/// Directory layout the HLS encoder writes: an init segment, media
/// segments, and a playlist, all under one per-process root that is wiped
/// and recreated at startup (§6 "Persistent state").
pub struct HlsStore {
    root: PathBuf,
}

impl HlsStore {
    /// Wipes and recreates `root` so a prior run's segments never leak into
    /// a fresh process's playlist.
    pub fn new(root: PathBuf) -> std::io::Result<Self> {
        if root.exists() {
            std::fs::remove_dir_all(&root)?;
        }
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a request sub-path (e.g. from `/api/hls/{rest}`) to a file
    /// under [`root`](Self::root), rejecting any path containing a parent-dir
    /// component. Returns `None` rather than a canonicalized path since HLS
    /// segment files are written and renamed into place by the encoder and
    /// may not exist at resolution time (the caller does the final
    /// existence check when it opens the file).
    #[must_use]
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let requested = Path::new(request_path.trim_start_matches('/'));
        if requested.components().any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return None;
        }
        if requested.is_absolute() {
            return None;
        }
        Some(self.root.join(requested))
    }
}

/// Content-Type for a served HLS artifact, per file extension (§6).
#[must_use]
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("m4s") => "video/iso.segment",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// `Cache-Control` for a served HLS artifact: playlists are never cached
/// (they change every segment interval); segments use the configurable
/// override, defaulting to a short, revalidate-friendly value since segment
/// filenames aren't content-addressed.
#[must_use]
pub fn cache_control_for(path: &Path, segment_cache_control: &str) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("m3u8") => "no-store, max-age=0".to_string(),
        _ => segment_cache_control.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_rejects_parent_dir_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = HlsStore::new(dir.path().join("hls")).unwrap();
        assert!(store.resolve("../../etc/passwd").is_none());
        assert!(store.resolve("segments/../../../etc/passwd").is_none());
    }

    #[test]
    fn resolve_joins_relative_paths_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = HlsStore::new(dir.path().join("hls")).unwrap();
        let resolved = store.resolve("segments/segment_000000001.m4s").unwrap();
        assert!(resolved.starts_with(store.root()));
    }

    #[test]
    fn content_type_mapping_matches_spec() {
        assert_eq!(content_type_for(Path::new("live.m3u8")), "application/vnd.apple.mpegurl");
        assert_eq!(content_type_for(Path::new("segment_1.m4s")), "video/iso.segment");
        assert_eq!(content_type_for(Path::new("init.mp4")), "video/mp4");
    }

    #[test]
    fn playlists_are_never_cached() {
        assert_eq!(cache_control_for(Path::new("live.m3u8"), "max-age=30"), "no-store, max-age=0");
        assert_eq!(cache_control_for(Path::new("segment.m4s"), "max-age=30"), "max-age=30");
    }

    #[test]
    fn new_wipes_prior_run_contents() {
        let dir = tempfile::tempdir().unwrap();
        let hls_root = dir.path().join("hls");
        std::fs::create_dir_all(&hls_root).unwrap();
        std::fs::write(hls_root.join("stale.m3u8"), b"stale").unwrap();

        let store = HlsStore::new(hls_root.clone()).unwrap();
        assert!(!store.root().join("stale.m3u8").exists());
    }
}
