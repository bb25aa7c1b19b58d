// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured logging setup (§4.11, ambient): a console layer, an optional
//! file layer, each with its own level filter. No OpenTelemetry exporter and
//! no tokio-console hook — the distilled spec names neither, and this
//! engine has no metrics backend to feed one.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::Config;

type DynLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn parse_level(level: &str, field: &str) -> tracing::Level {
    level.parse().unwrap_or_else(|_| {
        eprintln!("invalid log level {level:?} for {field}, defaulting to info");
        tracing::Level::INFO
    })
}

fn env_filter_or_level(default_level: tracing::Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.as_str()))
}

fn make_console_layer(console_level: tracing::Level) -> DynLayer {
    tracing_subscriber::fmt::layer().with_filter(env_filter_or_level(console_level)).boxed()
}

fn make_file_layer(
    non_blocking: tracing_appender::non_blocking::NonBlocking,
    file_level: tracing::Level,
    json: bool,
) -> DynLayer {
    if json {
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .json()
            .with_filter(env_filter_or_level(file_level))
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_filter(env_filter_or_level(file_level))
            .boxed()
    }
}

/// Builds and installs the global tracing subscriber from `config`.
///
/// # Errors
///
/// Returns an error if file logging is enabled but its parent directory
/// cannot be created.
pub fn init_logging(
    config: &Config,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, Box<dyn std::error::Error>> {
    let console_enabled = config.log_console_enable.unwrap_or(true);
    let mut guard = None;
    let mut layers: Vec<DynLayer> = Vec::new();

    if config.log_file_enable {
        let log_path = std::path::Path::new(&config.log_file_path);
        let log_dir = log_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
        let log_filename = log_path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("wavecast.log"));

        std::fs::create_dir_all(log_dir)
            .map_err(|err| format!("failed to create log directory {}: {err}", log_dir.display()))?;

        let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
        let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(file_guard);

        let file_level = parse_level(&config.log_file_level, "LOG_FILE_LEVEL");
        let json = config.log_file_format.eq_ignore_ascii_case("json");
        layers.push(make_file_layer(non_blocking, file_level, json));
    }

    if console_enabled {
        let console_level = parse_level(&config.log_console_level, "LOG_CONSOLE_LEVEL");
        layers.push(make_console_layer(console_level));
    }

    if !console_enabled && !config.log_file_enable {
        layers.push(make_console_layer(tracing::Level::INFO));
        eprintln!("both console and file logging are disabled, falling back to console logging");
    }

    tracing_subscriber::registry().with(layers).init();

    Ok(guard)
}
