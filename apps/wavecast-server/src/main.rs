// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

use clap::Parser;

mod cli;
mod config;
mod frontend;
mod logging;
mod nat;
mod server;
mod state;
mod viewer;

#[tokio::main]
async fn main() {
    // Required before any TLS operations (axum-server/rustls).
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = cli::Cli::parse();
    cli::handle_command(&cli, logging::init_logging).await;
}
