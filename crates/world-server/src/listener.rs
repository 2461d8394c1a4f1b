//! Stream listener: accepts TCP connections and spawns a
//! session worker per connection. Grounded in
//! `crates/replicate/server/src/chad/mod.rs`'s
//! `chad::launch_webtransport_server` accept loop, generalized from
//! accepting WebTransport sessions to plain TCP streams.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::registry::SessionRegistry;
use crate::resources::ResourceRegistry;
use crate::session::{self, SessionConfig};
use crate::shutdown::ShutdownHandle;
use crate::world::WorldHandle;

/// Binds the listening socket. Split out from [`serve`] so a bind failure
/// (wrong port, permission denied) surfaces to `main` as a startup error
/// instead of
/// being swallowed inside a spawned task.
pub async fn bind(port: u16) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(%port, "stream listener bound");
    Ok(listener)
}

/// Accepts connections on an already-bound `listener` until `shutdown`
/// fires. A transient accept error is logged and the loop continues; it
/// never terminates the listener.
pub async fn serve(
    listener: TcpListener,
    world: WorldHandle,
    sessions: Arc<SessionRegistry>,
    resources: Arc<ResourceRegistry>,
    config: SessionConfig,
    mut shutdown: ShutdownHandle,
) -> std::io::Result<()> {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => {
                info!("listener shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer_addr)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            warn!(%peer_addr, error = %e, "failed to set TCP_NODELAY");
                        }
                        tokio::spawn(session::run_session(
                            stream,
                            peer_addr,
                            world.clone(),
                            sessions.clone(),
                            resources.clone(),
                            config.clone(),
                            shutdown.clone(),
                        ));
                    }
                    Err(e) => {
                        error!(error = %e, "transient accept error");
                    }
                }
            }
        }
    }
}
