//! Voice relay: a single UDP task that validates the 12-byte
//! voice header and fans each datagram out to every other known client
//! address, verbatim. Grounded in
//! `other_examples/eea05dd9_Duocast-TSOD__server-media-voice_forwarder.rs.rs`'s
//! `recv_from`/registry/fan-out shape, adapted from its own framing to this
//! server's fixed 12-byte header.

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::shutdown::ShutdownHandle;

const HEADER_LEN: usize = 12;
const VOICE_PACKET_TYPE: u32 = 1;
const MAX_DATAGRAM_LEN: usize = 4096 + HEADER_LEN;

/// Maps a client's low 32 bits of avatar uid to its last-known address.
/// Deliberately its own lock (`DashMap`), independent of `WorldMutex` and
/// the session outbound queues — the voice relay never touches either.
#[derive(Debug, Default)]
struct VoiceRegistry {
    by_avatar_uid_low: DashMap<u32, SocketAddr>,
}

impl VoiceRegistry {
    fn observe(&self, avatar_uid_low: u32, addr: SocketAddr) {
        self.by_avatar_uid_low.insert(avatar_uid_low, addr);
    }

    fn other_addrs(&self, sender_uid_low: u32) -> Vec<SocketAddr> {
        self.by_avatar_uid_low
            .iter()
            .filter(|entry| *entry.key() != sender_uid_low)
            .map(|entry| *entry.value())
            .collect()
    }
}

/// Reads the fixed 12-byte header (`packet_type`, `client_avatar_uid_low`,
/// `seq_num`); a packet that's too short or carries an unknown
/// `packet_type` is silently dropped.
fn parse_header(datagram: &[u8]) -> Option<(u32, u32)> {
    if datagram.len() < HEADER_LEN {
        return None;
    }
    let packet_type = u32::from_le_bytes(datagram[0..4].try_into().ok()?);
    if packet_type != VOICE_PACKET_TYPE {
        return None;
    }
    let avatar_uid_low = u32::from_le_bytes(datagram[4..8].try_into().ok()?);
    let seq_num = u32::from_le_bytes(datagram[8..12].try_into().ok()?);
    Some((avatar_uid_low, seq_num))
}

/// Binds the voice socket. Split out from [`serve`] for the same reason as
/// [`crate::listener::bind`]: a bind failure must surface as a startup
/// error, not be lost inside a spawned task.
pub async fn bind(port: u16) -> std::io::Result<UdpSocket> {
    UdpSocket::bind(("0.0.0.0", port)).await
}

/// Relays voice datagrams on an already-bound `socket` until `shutdown`
/// fires. Lossless delivery isn't a goal here, so a `send_to` failure for
/// one recipient is logged and the loop moves on.
pub async fn serve(socket: Arc<UdpSocket>, mut shutdown: ShutdownHandle) {
    let registry = VoiceRegistry::default();
    let mut buf = vec![0u8; MAX_DATAGRAM_LEN];

    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => {
                return;
            }
            received = socket.recv_from(&mut buf) => {
                let (len, sender_addr) = match received {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "voice socket recv error");
                        continue;
                    }
                };
                let datagram = &buf[..len];
                let Some((avatar_uid_low, seq_num)) = parse_header(datagram) else {
                    debug!(%sender_addr, "dropped malformed voice packet");
                    continue;
                };
                registry.observe(avatar_uid_low, sender_addr);

                for addr in registry.other_addrs(avatar_uid_low) {
                    if let Err(e) = socket.send_to(datagram, addr).await {
                        warn!(%addr, error = %e, "voice relay send failed");
                    }
                }
                let _ = seq_num; // forwarded verbatim inside `datagram`; the server never inspects it.
            }
        }
    }
}
