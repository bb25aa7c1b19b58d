// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Exercises the layered configuration loader (§4.12) end to end: defaults,
//! a TOML file, and environment overrides, in that precedence order.

use std::io::Write;
use std::sync::Mutex;

use wavecast_server::config;

// `Env::raw()` reads the real process environment, so tests that set env
// vars must not run concurrently with each other.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn with_clean_env<T>(keys: &[&str], f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    for key in keys {
        std::env::remove_var(key);
    }
    let result = f();
    for key in keys {
        std::env::remove_var(key);
    }
    result
}

#[test]
fn loading_a_missing_config_file_reports_it_and_falls_back_to_defaults() {
    with_clean_env(&["STATION_NAME"], || {
        let result = config::load("does-not-exist.toml").expect("defaults alone must load");
        assert!(result.file_missing.is_some());
        assert_eq!(result.config.station_name, "Wavecast Radio");
        assert_eq!(result.config.http_address, "0.0.0.0:8080");
    });
}

#[test]
fn a_toml_file_overrides_defaults_but_not_environment_variables() {
    with_clean_env(&["STATION_NAME"], || {
        let mut file = tempfile::NamedTempFile::new().expect("temp config file");
        writeln!(file, r#"station_name = "From TOML""#).expect("write toml");
        writeln!(file, r#"stream_name = "TOML Stream""#).expect("write toml");

        let result = config::load(file.path().to_str().expect("utf8 path")).expect("load with toml file");
        assert!(result.file_missing.is_none());
        assert_eq!(result.config.station_name, "From TOML");

        std::env::set_var("STATION_NAME", "From Env");
        let result = config::load(file.path().to_str().expect("utf8 path")).expect("load with env override");
        assert_eq!(result.config.station_name, "From Env");
        // Env didn't touch this field, so the TOML value still applies.
        assert_eq!(result.config.stream_name, "TOML Stream");
    });
}

#[test]
fn mismatched_ssl_key_and_cert_fail_validation() {
    with_clean_env(&["SSL_KEY", "SSL_CERT"], || {
        std::env::set_var("SSL_KEY", "key.pem");
        let result = config::load("does-not-exist.toml");
        assert!(result.is_err());
    });
}

#[test]
fn redirect_enabled_without_a_port_fails_validation() {
    with_clean_env(&["ENABLE_HTTP_REDIRECT", "HTTPS_REDIRECT_PORT"], || {
        std::env::set_var("ENABLE_HTTP_REDIRECT", "true");
        let result = config::load("does-not-exist.toml");
        assert!(result.is_err());
    });
}

#[test]
fn generated_default_config_round_trips_through_the_loader() {
    let generated = config::generate_default().expect("serialize defaults");
    let mut file = tempfile::NamedTempFile::new().expect("temp config file");
    file.write_all(generated.as_bytes()).expect("write generated config");

    let result =
        config::load(file.path().to_str().expect("utf8 path")).expect("the generated config must itself load");
    assert!(result.file_missing.is_none());
}
