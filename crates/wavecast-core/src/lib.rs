// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Wavecast Core - fundamental types shared across the broadcast engine.
//!
//! ## Modules
//!
//! - [`cursor`]: the monotonic, wall-clock-anchored play-position counter
//! - [`track`]: track metadata (title/artist extraction) shared by the
//!   catalog and the status endpoint
//! - [`error`]: the crate-wide error enum and `Result` alias
//! - [`duration`]: flexible human-readable-or-seconds duration parsing

pub mod cursor;
pub mod duration;
pub mod error;
pub mod track;

pub use cursor::{Cursor, CursorSnapshot};
pub use duration::parse_flexible_duration;
pub use error::{Result, WavecastError};
pub use track::Track;
