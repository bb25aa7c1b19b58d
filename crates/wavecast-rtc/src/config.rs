// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Transport-shaping settings for the WHEP setting engine (§6 env table:
//! `STUN_SERVERS`, `NAT_1_TO_1_IP`, `INCLUDE_PUBLIC_IP_IN_NAT_1_TO_1_IP`,
//! `NAT_ICE_CANDIDATE_TYPE`, `UDP_MUX_PORT`, `UDP_MUX_PORT_WHEP`,
//! `TCP_MUX_ADDRESS`, `TCP_MUX_FORCE`, `INTERFACE_FILTER`, `NETWORK_TYPES`,
//! `INCLUDE_LOOPBACK_CANDIDATE`, `APPEND_CANDIDATE`). Parsing those env vars
//! into this type is the app layer's job; this crate only consumes the
//! typed result.

use std::net::SocketAddr;

/// The ICE candidate type a 1:1 NAT-mapped IP should be advertised as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NatCandidateType {
    #[default]
    Host,
    ServerReflexive,
}

/// Which network types ICE is allowed to gather candidates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkType {
    Udp4,
    Udp6,
    Tcp4,
    Tcp6,
}

/// WHEP/ICE transport configuration, built by the app layer from the
/// process environment and handed to [`crate::whep::negotiate`].
#[derive(Debug, Clone, Default)]
pub struct RtcConfig {
    /// STUN server URIs (e.g. `stun:stun.l.google.com:19302`).
    pub stun_servers: Vec<String>,
    /// IPs to advertise in place of the host's real address (1:1 NAT).
    pub nat_1_to_1_ips: Vec<String>,
    pub nat_ice_candidate_type: NatCandidateType,
    /// Single UDP port all ICE traffic is muxed onto; `None` lets each
    /// peer connection use an ephemeral port.
    pub udp_mux_port: Option<u16>,
    /// Separate UDP mux port reserved for WHEP connections specifically.
    pub udp_mux_port_whep: Option<u16>,
    /// Local address to bind a single shared ICE-TCP listener to.
    pub tcp_mux_address: Option<SocketAddr>,
    /// When set (with `tcp_mux_address`), disallow UDP candidates entirely.
    pub tcp_mux_force: bool,
    /// Substring filter restricting which network interfaces ICE binds to.
    pub interface_filter: Option<String>,
    pub network_types: Vec<NetworkType>,
    pub include_loopback_candidate: bool,
    /// Extra ICE candidate line appended to the SDP answer, if configured.
    pub append_candidate: Option<String>,
}
