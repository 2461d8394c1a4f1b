//! Session registry: the set of currently-connected sessions, keyed by
//! avatar uid, that the tick loop and voice relay
//! need to reach every connected client's outbound queue. Uses `DashMap`
//! like the resource registry (spec §5 "Resource registry has its own
//! finer-grained lock"); this is a third, independent lock, never nested
//! under `WorldMutex` or `SessionOutboundMutex`.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use world_common::ids::Uid;
use world_common::wire::Clientbound;

use crate::outbound::{OutboundQueue, QueuedPacket};

#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<Uid, Arc<OutboundQueue>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn insert(&self, avatar_uid: Uid, outbound: Arc<OutboundQueue>) {
        self.sessions.insert(avatar_uid, outbound);
    }

    pub fn remove(&self, avatar_uid: Uid) {
        self.sessions.remove(&avatar_uid);
    }

    pub fn connected_count(&self) -> usize {
        self.sessions.len()
    }

    /// Enqueues `packet` onto every connected session's outbound queue. A
    /// session whose queue rejects the push (critical overflow) latches
    /// `OutboundQueue`'s `overloaded` flag, which that session's own
    /// read/write loop observes on its next `pop` and closes the connection
    /// with `Overloaded` (spec §4.E/§7); the tick loop does not remove
    /// sessions itself (spec §5 lock-ordering: it only ever acquires
    /// `SessionOutboundMutex`-equivalent locks), it just logs here.
    pub fn broadcast(&self, packet: QueuedPacket) {
        for entry in self.sessions.iter() {
            if entry.value().push(packet.clone()).is_err() {
                debug!(avatar_uid = %entry.key(), "outbound queue overloaded, session will be closed");
            }
        }
    }

    pub fn broadcast_batch(&self, packets: &[QueuedPacket]) {
        for entry in self.sessions.iter() {
            for packet in packets {
                if entry.value().push(packet.clone()).is_err() {
                    debug!(avatar_uid = %entry.key(), "outbound queue overloaded, session will be closed");
                }
            }
        }
    }

    pub fn broadcast_time_sync(&self, server_time: f64) {
        self.broadcast(QueuedPacket::Critical(Clientbound::TimeSyncMessage {
            server_time,
        }));
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_reaches_every_registered_session() {
        let registry = SessionRegistry::new();
        let a = Arc::new(OutboundQueue::new(8, 8));
        let b = Arc::new(OutboundQueue::new(8, 8));
        registry.insert(Uid::from_raw(1), a.clone());
        registry.insert(Uid::from_raw(2), b.clone());
        registry.broadcast_time_sync(1.5);
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn removed_session_stops_receiving() {
        let registry = SessionRegistry::new();
        let a = Arc::new(OutboundQueue::new(8, 8));
        registry.insert(Uid::from_raw(1), a.clone());
        registry.remove(Uid::from_raw(1));
        registry.broadcast_time_sync(1.0);
        assert_eq!(a.len(), 0);
        assert_eq!(registry.connected_count(), 0);
    }
}
