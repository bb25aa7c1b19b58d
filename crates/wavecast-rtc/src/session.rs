// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The registry of active WHEP sessions, whose count is exactly the
//! `listenerCount` the status endpoint reports (§4.9: "the count of
//! registered WHEP sessions").

use std::collections::HashSet;
use std::sync::Mutex;

use uuid::Uuid;

/// Tracks which WHEP session ids are currently attached. A session is
/// added only once negotiation fully succeeds (§4.7 "session id is not
/// added until success") and removed exactly once, on ICE failure/closure.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashSet<Uuid>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a fresh session id. Not yet registered — call [`Self::confirm`]
    /// once negotiation succeeds.
    #[must_use]
    pub fn new_session_id(&self) -> Uuid {
        Uuid::new_v4()
    }

    /// Registers `id` as an active listener.
    pub fn confirm(&self, id: Uuid) {
        #[allow(clippy::unwrap_used)]
        self.sessions.lock().unwrap().insert(id);
    }

    /// Removes `id`. Idempotent: removing an unregistered or
    /// already-removed id is a no-op.
    pub fn remove(&self, id: Uuid) {
        #[allow(clippy::unwrap_used)]
        self.sessions.lock().unwrap().remove(&id);
    }

    /// The number of currently attached WHEP sessions.
    #[must_use]
    pub fn count(&self) -> usize {
        #[allow(clippy::unwrap_used)]
        self.sessions.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_and_remove_track_count() {
        let registry = SessionRegistry::new();
        let id = registry.new_session_id();
        assert_eq!(registry.count(), 0);
        registry.confirm(id);
        assert_eq!(registry.count(), 1);
        registry.remove(id);
        assert_eq!(registry.count(), 0);
        registry.remove(id);
        assert_eq!(registry.count(), 0);
    }
}
