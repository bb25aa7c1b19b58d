// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Resolves the host's publicly visible address with a single STUN binding
//! request, for `INCLUDE_PUBLIC_IP_IN_NAT_1_TO_1_IP` (§6). Best-effort: a
//! timeout or malformed response is logged and the caller falls back to
//! whatever `NAT_1_TO_1_IP` entries were configured explicitly.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use webrtc::stun::agent::TransactionId;
use webrtc::stun::client::ClientBuilder;
use webrtc::stun::message::{Message, BINDING_REQUEST};
use webrtc::stun::xoraddr::XORMappedAddress;

const STUN_TIMEOUT: Duration = Duration::from_secs(5);

/// Issues one STUN binding request against `stun_server` (a `stun:host:port`
/// or bare `host:port` URI) and returns the XOR-mapped address the server
/// observed, or `None` if anything along the way failed.
pub async fn resolve_public_ip(stun_server: &str) -> Option<IpAddr> {
    let target = stun_server.strip_prefix("stun:").unwrap_or(stun_server);

    match tokio::time::timeout(STUN_TIMEOUT, query(target)).await {
        Ok(Ok(addr)) => Some(addr),
        Ok(Err(err)) => {
            tracing::warn!(stun_server = %stun_server, error = %err, "STUN binding request failed");
            None
        },
        Err(_) => {
            tracing::warn!(stun_server = %stun_server, "STUN binding request timed out");
            None
        },
    }
}

async fn query(target: &str) -> Result<IpAddr, String> {
    let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(|err| err.to_string())?;
    socket.connect(target).await.map_err(|err| err.to_string())?;

    let (handler_tx, mut handler_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut client = ClientBuilder::new().with_conn(Arc::new(socket)).build().map_err(|err| err.to_string())?;

    let mut msg = Message::new();
    msg.build(&[Box::new(TransactionId::default()), Box::new(BINDING_REQUEST)]).map_err(|err| err.to_string())?;

    client.send(&msg, Some(Arc::new(handler_tx))).await.map_err(|err| err.to_string())?;

    let event = handler_rx.recv().await.ok_or_else(|| "STUN client closed with no response".to_string())?;
    let response = event.event_body.map_err(|err| err.to_string())?;

    let mut xor_addr = XORMappedAddress::default();
    xor_addr.get_from(&response).map_err(|err| err.to_string())?;

    let _ = client.close().await;
    Ok(xor_addr.ip)
}
