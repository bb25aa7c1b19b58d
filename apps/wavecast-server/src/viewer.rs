// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The pluggable viewer tracker (§3 "Viewer entry (external)"): the engine
//! itself only consumes a `TrackConnection(protocol, request) -> cancel`
//! capability; this module is that capability's one concrete, swappable
//! implementation — a salted-hash-keyed, TTL-expiring connection count per
//! protocol, with no engine-internal dependency on it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewerProtocol {
    Hls,
    Icecast,
}

struct Entry {
    last_seen: Instant,
    ttl: Duration,
}

#[derive(Default)]
struct State {
    entries: HashMap<(ViewerProtocol, String), Entry>,
}

/// Counts active viewers per protocol from hashed remote addresses, each
/// entry expiring `ttl` after its last observed request.
pub struct ViewerTracker {
    salt: String,
    state: Mutex<State>,
}

impl ViewerTracker {
    #[must_use]
    pub fn new(salt: String) -> Self {
        Self { salt, state: Mutex::new(State::default()) }
    }

    fn hash_addr(&self, remote_addr: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(remote_addr.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Records a connection/request from `remote_addr` under `protocol`,
    /// extending its TTL window.
    pub fn track(&self, protocol: ViewerProtocol, remote_addr: &str, ttl: Duration) {
        let key = (protocol, self.hash_addr(remote_addr));
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.entries.insert(key, Entry { last_seen: Instant::now(), ttl });
    }

    /// Active viewer count for `protocol`: entries whose TTL window has not
    /// yet elapsed since their last tracked request. Expired entries are
    /// pruned as a side effect.
    pub fn active_count(&self, protocol: ViewerProtocol) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.entries.retain(|_, entry| now.duration_since(entry.last_seen) < entry.ttl);
        state.entries.keys().filter(|(p, _)| *p == protocol).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_distinct_addresses_per_protocol() {
        let tracker = ViewerTracker::new("salt".to_string());
        tracker.track(ViewerProtocol::Hls, "1.2.3.4", Duration::from_secs(30));
        tracker.track(ViewerProtocol::Hls, "5.6.7.8", Duration::from_secs(30));
        tracker.track(ViewerProtocol::Icecast, "1.2.3.4", Duration::from_secs(30));
        assert_eq!(tracker.active_count(ViewerProtocol::Hls), 2);
        assert_eq!(tracker.active_count(ViewerProtocol::Icecast), 1);
    }

    #[test]
    fn expired_entries_are_not_counted() {
        let tracker = ViewerTracker::new("salt".to_string());
        tracker.track(ViewerProtocol::Icecast, "1.2.3.4", Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(tracker.active_count(ViewerProtocol::Icecast), 0);
    }

    #[test]
    fn hashing_is_stable_for_the_same_address_and_salt() {
        let tracker = ViewerTracker::new("salt".to_string());
        assert_eq!(tracker.hash_addr("1.2.3.4"), tracker.hash_addr("1.2.3.4"));
    }
}
