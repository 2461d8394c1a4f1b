//! Per-session outbound queue: a bounded FIFO
//! that never drops creates/destroys/full-updates/time-syncs ("critical"
//! packets), but evicts the oldest transform update ("droppable") under
//! backpressure. Built on a plain `std::sync::Mutex<VecDeque<_>>` guarded
//! deque plus a `tokio::sync::Notify`, since nothing in this queue's own
//! critical section ever awaits — consistent with spec §5's "no I/O or
//! blocking calls inside a held lock" discipline applied to this finer
//! lock too.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;

use world_common::wire::Clientbound;

use crate::error::SessionError;

#[derive(Debug, Clone)]
pub enum QueuedPacket {
    Critical(Clientbound),
    Droppable(Clientbound),
}

impl QueuedPacket {
    pub fn into_inner(self) -> Clientbound {
        match self {
            QueuedPacket::Critical(m) | QueuedPacket::Droppable(m) => m,
        }
    }
}

#[derive(Debug)]
pub struct OutboundQueue {
    inner: Mutex<VecDeque<QueuedPacket>>,
    notify: Notify,
    /// Latched once a critical push is rejected for exceeding
    /// `max_critical`; [`pop`](Self::pop) surfaces this to the session task
    /// so the session actually gets closed with `Overloaded` (spec §4.E /
    /// §7), rather than the rejection being discarded by whichever caller
    /// happened to be broadcasting at the time.
    overloaded: AtomicBool,
    max_droppable: usize,
    max_critical: usize,
}

impl OutboundQueue {
    pub fn new(max_droppable: usize, max_critical: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            overloaded: AtomicBool::new(false),
            max_droppable,
            max_critical,
        }
    }

    /// Pushes a packet. Droppable packets evict the oldest droppable entry
    /// once the droppable bound is hit; critical packets are rejected with
    /// [`SessionError::Overloaded`] once the critical bound is hit, which
    /// latches `overloaded` so the next [`pop`](Self::pop) terminates the
    /// session.
    pub fn push(&self, packet: QueuedPacket) -> Result<(), SessionError> {
        let mut queue = self.inner.lock().expect("outbound queue poisoned");
        match &packet {
            QueuedPacket::Droppable(_) => {
                let droppable_count = queue
                    .iter()
                    .filter(|p| matches!(p, QueuedPacket::Droppable(_)))
                    .count();
                if droppable_count >= self.max_droppable {
                    if let Some(pos) = queue.iter().position(|p| matches!(p, QueuedPacket::Droppable(_))) {
                        queue.remove(pos);
                    }
                }
                queue.push_back(packet);
            }
            QueuedPacket::Critical(_) => {
                let critical_count = queue
                    .iter()
                    .filter(|p| matches!(p, QueuedPacket::Critical(_)))
                    .count();
                if critical_count >= self.max_critical {
                    drop(queue);
                    self.overloaded.store(true, Ordering::SeqCst);
                    self.notify.notify_one();
                    return Err(SessionError::Overloaded);
                }
                queue.push_back(packet);
            }
        }
        drop(queue);
        self.notify.notify_one();
        Ok(())
    }

    /// Waits for and pops the next packet in FIFO order, or returns
    /// `Err(Overloaded)` once a push has been rejected for exceeding the
    /// critical bound, so the session's read/write loop closes the
    /// connection instead of silently dropping the packet that overflowed.
    pub async fn pop(&self) -> Result<QueuedPacket, SessionError> {
        loop {
            {
                let mut queue = self.inner.lock().expect("outbound queue poisoned");
                if let Some(packet) = queue.pop_front() {
                    return Ok(packet);
                }
            }
            if self.overloaded.load(Ordering::SeqCst) {
                return Err(SessionError::Overloaded);
            }
            self.notify.notified().await;
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use world_common::ids::Uid;

    fn destroy(uid: u64) -> Clientbound {
        Clientbound::ObjectDestroyed {
            uid: Uid::from_raw(uid),
        }
    }

    fn transform(uid: u64) -> Clientbound {
        Clientbound::ObjectTransformUpdate {
            uid: Uid::from_raw(uid),
            pos: world_common::geom::Vec3::new(0.0, 0.0, 0.0),
            axis: world_common::geom::Vec3::new(0.0, 1.0, 0.0),
            angle: 0.0,
        }
    }

    #[test]
    fn droppable_overflow_evicts_oldest_droppable() {
        let queue = OutboundQueue::new(2, 10);
        queue.push(QueuedPacket::Droppable(transform(1))).unwrap();
        queue.push(QueuedPacket::Droppable(transform(2))).unwrap();
        queue.push(QueuedPacket::Droppable(transform(3))).unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn critical_never_evicted_by_droppable_pressure() {
        let queue = OutboundQueue::new(1, 10);
        queue.push(QueuedPacket::Critical(destroy(1))).unwrap();
        queue.push(QueuedPacket::Droppable(transform(2))).unwrap();
        queue.push(QueuedPacket::Droppable(transform(3))).unwrap();
        assert_eq!(queue.len(), 2); // 1 critical + 1 droppable (bound 1)
    }

    #[test]
    fn critical_overflow_is_overloaded() {
        let queue = OutboundQueue::new(10, 1);
        queue.push(QueuedPacket::Critical(destroy(1))).unwrap();
        let err = queue.push(QueuedPacket::Critical(destroy(2)));
        assert!(matches!(err, Err(SessionError::Overloaded)));
    }

    #[tokio::test]
    async fn pop_is_fifo() {
        let queue = OutboundQueue::new(10, 10);
        queue.push(QueuedPacket::Critical(destroy(1))).unwrap();
        queue.push(QueuedPacket::Critical(destroy(2))).unwrap();
        let first = queue.pop().await.unwrap().into_inner();
        assert_eq!(first, destroy(1));
    }

    #[tokio::test]
    async fn pop_surfaces_overload_after_rejected_push() {
        let queue = OutboundQueue::new(10, 1);
        queue.push(QueuedPacket::Critical(destroy(1))).unwrap();
        assert!(queue.push(QueuedPacket::Critical(destroy(2))).is_err());

        let first = queue.pop().await.unwrap().into_inner();
        assert_eq!(first, destroy(1));
        assert!(matches!(queue.pop().await, Err(SessionError::Overloaded)));
    }
}
