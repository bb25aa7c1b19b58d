// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! WHEP offer/answer negotiation (§4.7): one `POST /api/whep` body is an SDP
//! offer, the response is the final SDP answer after non-trickle ICE
//! gathering completes. There is exactly one outgoing track, shared by every
//! peer that negotiates successfully.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate_type::RTCIceCandidateType;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};
use webrtc::track::track_local::TrackLocal;

use crate::config::{NatCandidateType, NetworkType as WavecastNetworkType, RtcConfig};
use crate::session::SessionRegistry;
use crate::track::SharedAudioTrack;

/// Opus payload type advertised to every WHEP peer (§4.7: fixed PT 111).
const OPUS_PAYLOAD_TYPE: u8 = 111;
const OPUS_CLOCK_RATE: u32 = 48_000;
const OPUS_CHANNELS: u16 = 2;
const OPUS_FMTP: &str = "minptime=10;useinbandfec=1;maxaveragebitrate=192000";

/// Time budget for ICE gathering to finish before giving up on a negotiation.
const GATHERING_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum WhepError {
    #[error("invalid SDP offer: {0}")]
    InvalidOffer(String),
    #[error("failed to build peer connection: {0}")]
    PeerConnection(String),
    #[error("ICE gathering did not complete within {0:?}")]
    GatheringTimeout(Duration),
    #[error("local description missing after gathering completed")]
    MissingLocalDescription,
}

/// The outcome of a successful negotiation: the session id to hand back to
/// the client (so a later `DELETE` can remove it) and the final SDP answer.
pub struct Negotiated {
    pub session_id: Uuid,
    pub answer_sdp: String,
}

/// Runs one full WHEP negotiation: builds a fresh peer connection for this
/// viewer, attaches it to the shared outgoing track, sets the remote
/// description from `offer_sdp`, and waits for non-trickle ICE gathering to
/// complete before returning the final answer (§4.7 "the response is the
/// complete, final SDP — no trickle ICE").
pub async fn negotiate(
    offer_sdp: String,
    rtc_config: &RtcConfig,
    shared_track: &SharedAudioTrack,
    sessions: Arc<SessionRegistry>,
) -> Result<Negotiated, WhepError> {
    warn_unsupported_mux(rtc_config);

    let mut media_engine = MediaEngine::default();
    media_engine
        .register_codec(
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: webrtc::api::media_engine::MIME_TYPE_OPUS.to_owned(),
                    clock_rate: OPUS_CLOCK_RATE,
                    channels: OPUS_CHANNELS,
                    sdp_fmtp_line: OPUS_FMTP.to_owned(),
                    rtcp_feedback: vec![],
                },
                payload_type: OPUS_PAYLOAD_TYPE,
                ..Default::default()
            },
            RTPCodecType::Audio,
        )
        .map_err(|err| WhepError::PeerConnection(err.to_string()))?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)
        .map_err(|err| WhepError::PeerConnection(err.to_string()))?;

    let setting_engine = build_setting_engine(rtc_config);

    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .with_setting_engine(setting_engine)
        .build();

    let ice_servers = rtc_config
        .stun_servers
        .iter()
        .map(|url| RTCIceServer { urls: vec![url.clone()], ..Default::default() })
        .collect();
    let config = RTCConfiguration { ice_servers, ..Default::default() };

    let peer_connection = Arc::new(
        api.new_peer_connection(config)
            .await
            .map_err(|err| WhepError::PeerConnection(err.to_string()))?,
    );

    let session_id = sessions.new_session_id();
    {
        let sessions = sessions.clone();
        peer_connection.on_peer_connection_state_change(Box::new(move |state| {
            let sessions = sessions.clone();
            Box::pin(async move {
                match state {
                    RTCPeerConnectionState::Failed
                    | RTCPeerConnectionState::Closed
                    | RTCPeerConnectionState::Disconnected => {
                        sessions.remove(session_id);
                        info!(%session_id, ?state, "WHEP session ended");
                    },
                    _ => debug!(%session_id, ?state, "WHEP peer connection state changed"),
                }
            })
        }));
    }

    peer_connection
        .add_track(shared_track.handle() as Arc<dyn TrackLocal + Send + Sync>)
        .await
        .map_err(|err| WhepError::PeerConnection(err.to_string()))?;

    let offer = RTCSessionDescription::offer(offer_sdp)
        .map_err(|err| WhepError::InvalidOffer(err.to_string()))?;
    peer_connection
        .set_remote_description(offer)
        .await
        .map_err(|err| WhepError::PeerConnection(err.to_string()))?;

    let answer = peer_connection
        .create_answer(None)
        .await
        .map_err(|err| WhepError::PeerConnection(err.to_string()))?;
    let mut gather_complete = peer_connection.gathering_complete_promise().await;
    peer_connection
        .set_local_description(answer)
        .await
        .map_err(|err| WhepError::PeerConnection(err.to_string()))?;

    if tokio::time::timeout(GATHERING_TIMEOUT, gather_complete.recv()).await.is_err() {
        return Err(WhepError::GatheringTimeout(GATHERING_TIMEOUT));
    }

    let local_description = peer_connection
        .local_description()
        .await
        .ok_or(WhepError::MissingLocalDescription)?;

    let mut answer_sdp = local_description.sdp;
    if let Some(candidate) = &rtc_config.append_candidate {
        answer_sdp = append_candidate_line(&answer_sdp, candidate);
    }

    sessions.confirm(session_id);
    info!(%session_id, "WHEP session negotiated");

    Ok(Negotiated { session_id, answer_sdp })
}

fn build_setting_engine(config: &RtcConfig) -> SettingEngine {
    let mut setting_engine = SettingEngine::default();

    if !config.nat_1_to_1_ips.is_empty() {
        let candidate_type = match config.nat_ice_candidate_type {
            NatCandidateType::Host => RTCIceCandidateType::Host,
            NatCandidateType::ServerReflexive => RTCIceCandidateType::Srflx,
        };
        setting_engine.set_nat_1to1_ips(config.nat_1_to_1_ips.clone(), candidate_type);
    }

    if let Some(filter) = config.interface_filter.clone() {
        setting_engine.set_interface_filter(Box::new(move |iface: &str| iface.contains(&filter)));
    }

    if !config.network_types.is_empty() {
        let types = config.network_types.iter().map(|t| match t {
            WavecastNetworkType::Udp4 => webrtc::ice::network_type::NetworkType::Udp4,
            WavecastNetworkType::Udp6 => webrtc::ice::network_type::NetworkType::Udp6,
            WavecastNetworkType::Tcp4 => webrtc::ice::network_type::NetworkType::Tcp4,
            WavecastNetworkType::Tcp6 => webrtc::ice::network_type::NetworkType::Tcp6,
        });
        setting_engine.set_network_types(types.collect());
    }

    setting_engine
}

/// `webrtc-rs` does not implement ICE UDP/TCP muxing (the upstream crate's
/// `SettingEngine` carries only commented-out hooks for it as of the pinned
/// version) — configuring these has no effect beyond this warning.
fn warn_unsupported_mux(config: &RtcConfig) {
    if config.udp_mux_port.is_some()
        || config.udp_mux_port_whep.is_some()
        || config.tcp_mux_address.is_some()
    {
        warn!(
            "UDP/TCP ICE mux ports are configured but the webrtc crate does not support \
             muxing; each peer connection will use its own ephemeral port"
        );
    }
}

/// Appends a preconfigured ICE candidate as an extra `a=candidate` line
/// under the first media section, mirroring what a TURN/relay sidecar would
/// otherwise contribute via trickle ICE.
fn append_candidate_line(sdp: &str, candidate: &str) -> String {
    let line = if let Some(rest) = candidate.strip_prefix("candidate:") {
        format!("a=candidate:{rest}")
    } else {
        format!("a={candidate}")
    };

    let mut out = String::with_capacity(sdp.len() + line.len() + 1);
    let mut inserted = false;
    for segment in sdp.split_inclusive('\n') {
        out.push_str(segment);
        if !inserted && segment.trim_start().starts_with("m=audio") {
            // insertion happens after the next line is appended, see below
        }
        if !inserted && segment.trim_start().starts_with("a=mid") {
            out.push_str(&line);
            out.push('\n');
            inserted = true;
        }
    }
    if !inserted {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_candidate_inserts_after_mid_line() {
        let sdp = "v=0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\na=mid:0\na=sendonly\n";
        let out = append_candidate_line(sdp, "candidate:1 1 udp 2130706431 1.2.3.4 5000 typ host");
        assert!(out.contains("a=candidate:1 1 udp"));
        let mid_pos = out.find("a=mid:0").unwrap();
        let candidate_pos = out.find("a=candidate:1").unwrap();
        assert!(candidate_pos > mid_pos);
    }

    #[test]
    fn append_candidate_falls_back_to_end_when_no_mid_line() {
        let sdp = "v=0\r\ns=-\r\n";
        let out = append_candidate_line(sdp, "candidate:1 1 udp 2130706431 1.2.3.4 5000 typ host");
        assert!(out.trim_end().ends_with("typ host"));
    }
}
