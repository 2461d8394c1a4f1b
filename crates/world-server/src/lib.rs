//! Authoritative server for a persistent, multi-user 3D world: the world
//! model, durable store, resource registry, session workers, listener,
//! tick loop, voice relay and ingestion adapter are wired together by
//! [`run`], the library entry point `main.rs` delegates to. Mirrors the
//! split between a thin binary and a `pub async fn main` library entry
//! point `replicate-server` uses.

pub mod args;
pub mod error;
mod ingestion;
mod listener;
mod outbound;
mod registry;
mod resources;
mod selftest;
mod session;
mod shutdown;
mod store;
mod tick;
mod voice;
mod world;

use std::sync::Arc;

use eyre::WrapErr;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub use args::Args;

use ingestion::DemoBeaconAdapter;
use registry::SessionRegistry;
use resources::ResourceRegistry;
use session::SessionConfig;
use store::SnapshotStore;
use world::{bootstrap_parcels, World, WorldHandle};

/// Process exit codes: 0 normal shutdown, 1 startup/config
/// error, 2 unrecoverable runtime error.
pub const EXIT_OK: i32 = 0;
pub const EXIT_STARTUP_ERROR: i32 = 1;
pub const EXIT_RUNTIME_ERROR: i32 = 2;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Library entry point. Returns the process exit code rather than
/// propagating an error all the way to `main`, since different failures
/// map to different exit codes (startup vs. runtime).
pub async fn run(args: Args) -> eyre::Result<i32> {
    init_tracing();

    if args.test {
        info!("running internal self-tests");
        return Ok(if selftest::run() { EXIT_OK } else { EXIT_STARTUP_ERROR });
    }

    let resource_dir = args
        .src_resource_dir
        .clone()
        .unwrap_or_else(|| args.state_dir.join("server_resources"));
    tokio::fs::create_dir_all(&resource_dir)
        .await
        .wrap_err("failed to create resource directory")
        .map_err(|e| startup_failure(e))?;

    let store = SnapshotStore::new(&args.state_dir);
    let loaded = store
        .load()
        .await
        .wrap_err("failed to load world snapshot")
        .map_err(|e| startup_failure(e))?;

    let (world, resources) = match loaded {
        Some(snapshot) => {
            info!("loaded world snapshot from {}", args.state_dir.display());
            let resources = ResourceRegistry::load_from_snapshot(resource_dir, snapshot.resources.clone());
            (World::from_snapshot(snapshot), resources)
        }
        None => {
            info!("no snapshot found, bootstrapping a fresh world");
            let mut world = World::new();
            for parcel in bootstrap_parcels() {
                world.seed_parcel(parcel);
            }
            (world, ResourceRegistry::new(resource_dir))
        }
    };

    let world: WorldHandle = Arc::new(tokio::sync::Mutex::new(world));
    let resources = Arc::new(resources);
    let sessions = Arc::new(SessionRegistry::new());

    let tcp_listener = listener::bind(args.port)
        .await
        .wrap_err("failed to bind stream listener")
        .map_err(startup_failure)?;
    let voice_socket = voice::bind(args.voice_port)
        .await
        .wrap_err("failed to bind voice socket")
        .map_err(startup_failure)?;

    let (shutdown_tx, shutdown_rx) = shutdown::channel();

    let session_config = SessionConfig::default();

    let listener_task = tokio::spawn(listener::serve(
        tcp_listener,
        world.clone(),
        sessions.clone(),
        resources.clone(),
        session_config,
        shutdown_rx.clone(),
    ));
    let voice_task = tokio::spawn(voice::serve(Arc::new(voice_socket), shutdown_rx.clone()));
    let tick_task = tokio::spawn(tick::run(
        world.clone(),
        sessions.clone(),
        resources.clone(),
        store,
        shutdown_rx.clone(),
    ));

    let system_user = {
        let mut world = world.lock().await;
        world.seed_user("ingestion", "", "ingestion@localhost")
    };
    let ingestion_task = tokio::spawn(ingestion::run(
        Box::new(DemoBeaconAdapter::new(system_user)),
        std::time::Duration::from_secs(30),
        world.clone(),
        shutdown_rx.clone(),
    ));

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, draining");
    shutdown::signal(&shutdown_tx);

    let _ = tokio::join!(listener_task, tick_task, ingestion_task);
    voice_task.abort();

    Ok(EXIT_OK)
}

fn startup_failure(e: eyre::Report) -> eyre::Report {
    warn!(error = %e, "startup failed");
    e
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
