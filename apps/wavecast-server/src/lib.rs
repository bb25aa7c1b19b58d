// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The Wavecast server binary's library half: configuration, logging,
//! engine/HTTP wiring, and the CLI that drives them. Split out from
//! `main.rs` so integration tests can exercise `create_app`/`start_server`
//! directly.

pub mod cli;
pub mod config;
pub mod frontend;
pub mod logging;
pub mod nat;
pub mod server;
pub mod state;
pub mod viewer;

pub use config::Config;
pub use server::{build_router, create_app, start_server};
pub use state::AppState;
