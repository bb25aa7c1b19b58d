// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Layered configuration (§4.12): built-in defaults, an optional TOML file,
//! then environment variables, in that precedence order — the same provider
//! order the engine's config loader uses, but with a flat field set so the
//! documented environment contract (§6) maps onto struct fields one-to-one
//! rather than through a nested double-underscore scheme.

use std::net::SocketAddr;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use wavecast_core::parse_flexible_duration;
use wavecast_rtc::{NatCandidateType, NetworkType, RtcConfig};

fn default_http_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_media_dir() -> String {
    "media".to_string()
}

fn default_hls_output_dir() -> String {
    "hls".to_string()
}

fn default_hls_segment_cache_control() -> String {
    "max-age=6".to_string()
}

fn default_ffmpeg_bin() -> String {
    wavecast_transcode::DEFAULT_ENCODER_BIN.to_string()
}

fn default_station_name() -> String {
    "Wavecast Radio".to_string()
}

fn default_stream_name() -> String {
    "Wavecast Stream".to_string()
}

fn default_stun_servers() -> String {
    "stun:stun.l.google.com:19302".to_string()
}

fn default_nat_ice_candidate_type() -> String {
    "host".to_string()
}

fn default_cursor_stall_timeout() -> String {
    "10s".to_string()
}

fn default_viewer_ttl() -> String {
    "30s".to_string()
}

fn default_log_console_level() -> String {
    "info".to_string()
}

fn default_log_file_level() -> String {
    "info".to_string()
}

fn default_log_file_path() -> String {
    "wavecast.log".to_string()
}

fn default_log_file_format() -> String {
    "text".to_string()
}

/// Root configuration, one field per recognized environment variable in §6
/// plus a small set of ambient logging fields not named in the distilled
/// spec's table (per §4.11, the ambient stack is carried regardless of what
/// the distillation's Non-goals scope out).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(default = "default_http_address")]
    pub http_address: String,
    pub ssl_key: Option<String>,
    pub ssl_cert: Option<String>,
    pub enable_http_redirect: bool,
    pub https_redirect_port: Option<u16>,

    #[serde(default = "default_media_dir")]
    pub media_dir: String,
    #[serde(default = "default_hls_output_dir")]
    pub hls_output_dir: String,
    #[serde(default = "default_hls_segment_cache_control")]
    pub hls_segment_cache_control: String,
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: String,
    #[serde(default)]
    pub ffmpeg_loglevel_hls: Option<String>,

    pub resume_timestamp: Option<String>,
    pub random_timestamp: Option<String>,

    #[serde(default = "default_station_name")]
    pub station_name: String,
    #[serde(default = "default_stream_name")]
    pub stream_name: String,

    #[serde(default = "default_stun_servers")]
    pub stun_servers: String,
    pub nat_1_to_1_ip: Option<String>,
    pub include_public_ip_in_nat_1_to_1_ip: bool,
    #[serde(default = "default_nat_ice_candidate_type")]
    pub nat_ice_candidate_type: String,
    pub udp_mux_port: Option<u16>,
    pub udp_mux_port_whep: Option<u16>,
    pub tcp_mux_address: Option<String>,
    pub tcp_mux_force: bool,
    pub interface_filter: Option<String>,
    pub network_types: Option<String>,
    pub include_loopback_candidate: bool,
    pub append_candidate: Option<String>,

    #[serde(default = "default_cursor_stall_timeout")]
    pub cursor_stall_timeout: String,

    #[serde(default = "default_viewer_ttl")]
    pub viewer_ttl_hls: String,
    #[serde(default = "default_viewer_ttl")]
    pub viewer_ttl_icecast: String,
    pub viewer_hash_salt: String,

    pub disable_status: bool,
    pub disable_frontend: bool,
    pub debug_print_offer: bool,
    pub debug_print_answer: bool,

    pub log_console_enable: Option<bool>,
    pub log_file_enable: bool,
    #[serde(default = "default_log_console_level")]
    pub log_console_level: String,
    #[serde(default = "default_log_file_level")]
    pub log_file_level: String,
    #[serde(default = "default_log_file_path")]
    pub log_file_path: String,
    #[serde(default = "default_log_file_format")]
    pub log_file_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_address: default_http_address(),
            ssl_key: None,
            ssl_cert: None,
            enable_http_redirect: false,
            https_redirect_port: None,
            media_dir: default_media_dir(),
            hls_output_dir: default_hls_output_dir(),
            hls_segment_cache_control: default_hls_segment_cache_control(),
            ffmpeg_bin: default_ffmpeg_bin(),
            ffmpeg_loglevel_hls: None,
            resume_timestamp: None,
            random_timestamp: None,
            station_name: default_station_name(),
            stream_name: default_stream_name(),
            stun_servers: default_stun_servers(),
            nat_1_to_1_ip: None,
            include_public_ip_in_nat_1_to_1_ip: false,
            nat_ice_candidate_type: default_nat_ice_candidate_type(),
            udp_mux_port: None,
            udp_mux_port_whep: None,
            tcp_mux_address: None,
            tcp_mux_force: false,
            interface_filter: None,
            network_types: None,
            include_loopback_candidate: false,
            append_candidate: None,
            cursor_stall_timeout: default_cursor_stall_timeout(),
            viewer_ttl_hls: default_viewer_ttl(),
            viewer_ttl_icecast: default_viewer_ttl(),
            viewer_hash_salt: String::new(),
            disable_status: false,
            disable_frontend: false,
            debug_print_offer: false,
            debug_print_answer: false,
            log_console_enable: None,
            log_file_enable: false,
            log_console_level: default_log_console_level(),
            log_file_level: default_log_file_level(),
            log_file_path: default_log_file_path(),
            log_file_format: default_log_file_format(),
        }
    }
}

#[derive(Debug)]
pub struct ConfigLoadResult {
    pub config: Config,
    pub file_missing: Option<String>,
}

/// Loads configuration from defaults, an optional TOML file, then the
/// process environment (highest precedence), validates it, and returns the
/// result alongside whether the requested config file was absent.
///
/// # Errors
///
/// Returns an error if the TOML file is malformed, an environment variable
/// holds a value of the wrong shape for its field, or [`validate`] rejects
/// the resulting configuration.
pub fn load(config_path: &str) -> Result<ConfigLoadResult, Box<figment::Error>> {
    let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

    let mut file_missing = None;
    if std::path::Path::new(config_path).exists() {
        figment = figment.merge(Toml::file(config_path));
    } else {
        file_missing = Some(config_path.to_string());
    }

    let config: Config = figment.merge(Env::raw()).extract().map_err(Box::new)?;
    validate(&config).map_err(|msg| Box::new(figment::Error::from(msg)))?;

    Ok(ConfigLoadResult { config, file_missing })
}

/// Structural validation beyond what serde/figment enforce on their own
/// (§4.12: "a structurally invalid config ... is a fatal-at-start
/// condition").
fn validate(config: &Config) -> Result<(), String> {
    if config.ssl_key.is_some() != config.ssl_cert.is_some() {
        return Err("SSL_KEY and SSL_CERT must both be set to enable HTTPS, or both left unset".to_string());
    }
    if config.enable_http_redirect && config.https_redirect_port.is_none() {
        return Err("ENABLE_HTTP_REDIRECT is set but HTTPS_REDIRECT_PORT is missing".to_string());
    }
    Ok(())
}

impl Config {
    #[must_use]
    pub fn tls_enabled(&self) -> bool {
        self.ssl_key.is_some() && self.ssl_cert.is_some()
    }

    /// Resolves the cursor-stall watchdog threshold; a zero duration (or an
    /// unparseable one) disables the watchdog per §4.8.
    #[must_use]
    pub fn cursor_stall_timeout(&self) -> Duration {
        parse_flexible_duration(&self.cursor_stall_timeout).unwrap_or(Duration::ZERO)
    }

    #[must_use]
    pub fn viewer_ttl_hls(&self) -> Duration {
        parse_flexible_duration(&self.viewer_ttl_hls).unwrap_or(Duration::from_secs(30))
    }

    #[must_use]
    pub fn viewer_ttl_icecast(&self) -> Duration {
        parse_flexible_duration(&self.viewer_ttl_icecast).unwrap_or(Duration::from_secs(30))
    }

    /// Builds the WHEP/ICE transport configuration consumed by
    /// [`wavecast_rtc::negotiate`] from this flat config's raw string
    /// fields, resolving the optional public-IP STUN lookup first.
    pub async fn build_rtc_config(&self) -> RtcConfig {
        let stun_servers = split_pipe_list(&self.stun_servers);

        let mut nat_1_to_1_ips = self.nat_1_to_1_ip.as_deref().map(split_pipe_list).unwrap_or_default();
        if self.include_public_ip_in_nat_1_to_1_ip {
            if let Some(server) = stun_servers.first() {
                match crate::nat::resolve_public_ip(server).await {
                    Some(ip) => nat_1_to_1_ips.push(ip.to_string()),
                    None => {
                        tracing::warn!(
                            stun_server = %server,
                            "could not resolve public IP via STUN for INCLUDE_PUBLIC_IP_IN_NAT_1_TO_1_IP"
                        );
                    },
                }
            } else {
                tracing::warn!(
                    "INCLUDE_PUBLIC_IP_IN_NAT_1_TO_1_IP is set but no STUN_SERVERS are configured"
                );
            }
        }

        let nat_ice_candidate_type = match self.nat_ice_candidate_type.to_ascii_lowercase().as_str() {
            "srflx" | "server-reflexive" | "serverreflexive" => NatCandidateType::ServerReflexive,
            _ => NatCandidateType::Host,
        };

        let tcp_mux_address = self.tcp_mux_address.as_deref().and_then(|addr| {
            addr.parse::<SocketAddr>()
                .inspect_err(|err| tracing::warn!(%addr, error = %err, "invalid TCP_MUX_ADDRESS, ignoring"))
                .ok()
        });

        let network_types = self
            .network_types
            .as_deref()
            .map(split_pipe_list)
            .unwrap_or_default()
            .iter()
            .filter_map(|t| match t.to_ascii_lowercase().as_str() {
                "udp4" => Some(NetworkType::Udp4),
                "udp6" => Some(NetworkType::Udp6),
                "tcp4" => Some(NetworkType::Tcp4),
                "tcp6" => Some(NetworkType::Tcp6),
                other => {
                    tracing::warn!(network_type = %other, "unrecognized NETWORK_TYPES entry, ignoring");
                    None
                },
            })
            .collect();

        RtcConfig {
            stun_servers,
            nat_1_to_1_ips,
            nat_ice_candidate_type,
            udp_mux_port: self.udp_mux_port,
            udp_mux_port_whep: self.udp_mux_port_whep,
            tcp_mux_address,
            tcp_mux_force: self.tcp_mux_force,
            interface_filter: self.interface_filter.clone(),
            network_types,
            include_loopback_candidate: self.include_loopback_candidate,
            append_candidate: self.append_candidate.clone(),
        }
    }
}

fn split_pipe_list(raw: &str) -> Vec<String> {
    raw.split('|').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

/// Generates the default configuration as a pretty-printed TOML string, for
/// the `config default` CLI command.
///
/// # Errors
///
/// Returns an error if the default configuration cannot be serialized,
/// which would indicate a programming error in this module.
pub fn generate_default() -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&Config::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn ssl_key_without_cert_is_rejected() {
        let mut config = Config::default();
        config.ssl_key = Some("key.pem".to_string());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn redirect_enabled_without_port_is_rejected() {
        let mut config = Config::default();
        config.enable_http_redirect = true;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn split_pipe_list_trims_and_drops_empties() {
        assert_eq!(
            split_pipe_list(" stun:a.example |stun:b.example|| "),
            vec!["stun:a.example".to_string(), "stun:b.example".to_string()]
        );
    }

    #[test]
    fn tls_enabled_requires_both_fields() {
        let mut config = Config::default();
        assert!(!config.tls_enabled());
        config.ssl_key = Some("k".to_string());
        config.ssl_cert = Some("c".to_string());
        assert!(config.tls_enabled());
    }
}
