// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The shared, wall-clock-anchored play-position cursor.
//!
//! Exactly one [`Cursor`] exists per process, for the process's lifetime; it
//! never rewinds. The playlist driver advances it as packets are emitted,
//! the status endpoint and watchdog read it, and it never blocks for longer
//! than a single lock acquisition.

use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

/// An atomic snapshot of the cursor's state.
#[derive(Debug, Clone, Copy)]
pub struct CursorSnapshot {
    pub started_at: Instant,
    pub position: Duration,
    pub wallclock: SystemTime,
}

struct State {
    started_at: Instant,
    started_at_wall: SystemTime,
    position: Duration,
}

/// Monotonic, wall-clock-anchored play-position counter.
///
/// All operations are O(1) under a single short-held lock. `Advance` with a
/// non-positive duration is a no-op; `position` never decreases.
pub struct Cursor {
    state: Mutex<State>,
}

impl Cursor {
    /// Creates a new cursor anchored at the current instant.
    #[must_use]
    pub fn new() -> Self {
        let now = Instant::now();
        let now_wall = SystemTime::now();
        Self {
            state: Mutex::new(State {
                started_at: now,
                started_at_wall: now_wall,
                position: Duration::ZERO,
            }),
        }
    }

    /// Advances the cursor's position by `delta`, returning the new position.
    ///
    /// A zero or negative-equivalent `delta` (i.e. `Duration::ZERO`) is a
    /// no-op; `Duration` cannot represent negative values so callers that
    /// compute a possibly-negative delta must clamp to zero before calling.
    pub fn advance(&self, delta: Duration) -> Duration {
        if delta.is_zero() {
            #[allow(clippy::unwrap_used)]
            let state = self.state.lock().unwrap();
            return state.position;
        }
        #[allow(clippy::unwrap_used)]
        let mut state = self.state.lock().unwrap();
        state.position += delta;
        state.position
    }

    /// Returns the current play position.
    #[must_use]
    pub fn position(&self) -> Duration {
        #[allow(clippy::unwrap_used)]
        let state = self.state.lock().unwrap();
        state.position
    }

    /// Returns the instant the cursor was created.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        #[allow(clippy::unwrap_used)]
        let state = self.state.lock().unwrap();
        state.started_at
    }

    /// Returns the wall-clock time the cursor was created.
    #[must_use]
    pub fn started_at_wall(&self) -> SystemTime {
        #[allow(clippy::unwrap_used)]
        let state = self.state.lock().unwrap();
        state.started_at_wall
    }

    /// Atomically captures `{started_at, position, wallclock}`.
    #[must_use]
    pub fn snapshot(&self) -> CursorSnapshot {
        #[allow(clippy::unwrap_used)]
        let state = self.state.lock().unwrap();
        CursorSnapshot {
            started_at: state.started_at,
            position: state.position,
            wallclock: state.started_at_wall + state.position,
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_is_monotonic_and_sums() {
        let cursor = Cursor::new();
        let mut total = Duration::ZERO;
        for ms in [10, 20, 0, 5, 100] {
            let d = Duration::from_millis(ms);
            total += d;
            let pos = cursor.advance(d);
            assert_eq!(pos, total);
        }
        assert_eq!(cursor.position(), total);
    }

    #[test]
    fn zero_advance_is_noop() {
        let cursor = Cursor::new();
        cursor.advance(Duration::from_millis(50));
        let before = cursor.position();
        let after = cursor.advance(Duration::ZERO);
        assert_eq!(before, after);
    }

    #[test]
    fn snapshot_wallclock_tracks_started_at_plus_position() {
        let cursor = Cursor::new();
        cursor.advance(Duration::from_millis(250));
        let snap = cursor.snapshot();
        assert_eq!(snap.position, Duration::from_millis(250));
        assert_eq!(snap.wallclock, cursor.started_at_wall() + snap.position);
    }
}
