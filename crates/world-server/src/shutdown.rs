//! Cooperative shutdown signal shared by the listener, tick loop, voice
//! relay and every session task, so a single SIGTERM/Ctrl-C drains all of
//! them. Built on `tokio::sync::watch` rather than
//! `tokio_util::sync::CancellationToken` so the crate doesn't need to pull
//! in tokio-util's `rt` feature just for this.

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    rx: watch::Receiver<bool>,
}

impl ShutdownHandle {
    pub fn is_shutting_down(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been signalled. Safe to call repeatedly;
    /// once the watched value is `true` it resolves immediately every time.
    pub async fn wait(&mut self) {
        if self.is_shutting_down() {
            return;
        }
        let _ = self.rx.changed().await;
    }
}

pub fn channel() -> (watch::Sender<bool>, ShutdownHandle) {
    let (tx, rx) = watch::channel(false);
    (tx, ShutdownHandle { rx })
}

pub fn signal(tx: &watch::Sender<bool>) {
    let _ = tx.send(true);
}
