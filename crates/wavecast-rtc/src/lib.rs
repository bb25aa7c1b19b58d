// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! WHEP negotiation and the single shared outgoing Opus track every
//! listening peer attaches to (§1, §4.7, §6). The playlist driver's drain
//! task writes samples into [`SharedAudioTrack`] without knowing anything
//! about WebRTC; the HTTP layer calls [`negotiate::negotiate`] per
//! `POST /api/whep` and [`session::SessionRegistry`] backs the listener
//! count the status endpoint reports.

pub mod config;
pub mod negotiate;
pub mod session;
pub mod track;

pub use config::{NatCandidateType, NetworkType, RtcConfig};
pub use negotiate::{negotiate, Negotiated, WhepError};
pub use session::SessionRegistry;
pub use track::SharedAudioTrack;
