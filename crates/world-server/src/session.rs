//! Per-client session worker: `AwaitingHello -> AwaitingAuth ->
//! Ready -> Closing`. A single task drives the whole state machine,
//! cooperatively interleaving inbound reads and outbound queue drains with
//! `tokio::select!` rather than splitting into two OS tasks. The outbound
//! queue and world mutex already give the two halves everything they'd
//! share, so a second task buys no extra concurrency here, only bookkeeping
//! (see DESIGN.md).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, info, instrument, warn};

use world_common::ids::{Uid, UserId};
use world_common::model::{AvatarPatch, ObjectPatch, Rotation};
use world_common::wire::{
    AvatarPatchWire, Clientbound, ObjectCreateFields, ObjectPatchWire, Serverbound, WireCodec,
    HELLO_MAGIC, PROTOCOL_VERSION,
};

use crate::error::SessionError;
use crate::outbound::{OutboundQueue, QueuedPacket};
use crate::registry::SessionRegistry;
use crate::resources::ResourceRegistry;
use crate::shutdown::ShutdownHandle;
use crate::world::{ObjectCreateRequest, WorldHandle};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub idle_timeout: Duration,
    pub max_droppable_queue: usize,
    pub max_critical_queue: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60),
            max_droppable_queue: 256,
            max_critical_queue: 4096,
        }
    }
}

/// Entry point spawned by the listener per accepted connection. Never
/// panics or propagates: every failure mode is logged and the socket is
/// simply dropped, so a session-local error never reaches the tick loop or
/// any other session.
#[instrument(skip_all, fields(peer = %peer_addr))]
pub async fn run_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    world: WorldHandle,
    sessions: Arc<SessionRegistry>,
    resources: Arc<ResourceRegistry>,
    config: SessionConfig,
    mut shutdown: ShutdownHandle,
) {
    let outcome = run_session_inner(stream, &world, &sessions, &resources, &config, &mut shutdown).await;
    match outcome {
        Ok(RunOutcome::NeverAuthenticated) => {
            debug!("session closed before authentication");
        }
        Ok(RunOutcome::Authenticated { avatar_uid }) => {
            info!(%avatar_uid, "session closed cleanly");
            sessions.remove(avatar_uid);
            close_avatar(&world, avatar_uid).await;
        }
        Err((SessionError::ShutdownRequested, Some(avatar_uid))) => {
            debug!(%avatar_uid, "session closed for shutdown");
            sessions.remove(avatar_uid);
            close_avatar(&world, avatar_uid).await;
        }
        Err((err, Some(avatar_uid))) => {
            warn!(%avatar_uid, error = %err, "session terminated with error");
            sessions.remove(avatar_uid);
            close_avatar(&world, avatar_uid).await;
        }
        Err((err, None)) => {
            debug!(error = %err, "session terminated before authentication");
        }
    }
}

enum RunOutcome {
    NeverAuthenticated,
    Authenticated { avatar_uid: Uid },
}

/// Marks the avatar `Dead` so the tick loop broadcasts its destruction and
/// reaps it, then drops this session's subscriptions.
async fn close_avatar(world: &WorldHandle, avatar_uid: Uid) {
    let mut world = world.lock().await;
    let _ = world.apply_avatar_destroy(avatar_uid);
}

async fn run_session_inner(
    stream: TcpStream,
    world: &WorldHandle,
    sessions: &Arc<SessionRegistry>,
    resources: &Arc<ResourceRegistry>,
    config: &SessionConfig,
    shutdown: &mut ShutdownHandle,
) -> Result<RunOutcome, (SessionError, Option<Uid>)> {
    let mut framed = Framed::new(stream, WireCodec);

    await_hello(&mut framed, config.idle_timeout)
        .await
        .map_err(|e| (e, None))?;
    framed
        .send(Clientbound::HelloResponse)
        .await
        .map_err(|e| (SessionError::from(e), None))?;

    let (user_id, avatar_uid) = await_auth(&mut framed, world, config.idle_timeout)
        .await
        .map_err(|e| (e, None))?;
    framed
        .send(Clientbound::AuthResponse { avatar_uid })
        .await
        .map_err(|e| (SessionError::from(e), Some(avatar_uid)))?;

    let outbound = Arc::new(OutboundQueue::new(
        config.max_droppable_queue,
        config.max_critical_queue,
    ));
    sessions.insert(avatar_uid, outbound.clone());

    // Catch the new subscriber up on everything already `Alive`: the tick
    // loop only ever broadcasts what's currently dirty, so without this a
    // session connecting into a settled world would see nothing until the
    // next mutation (spec §2/§4.E, scenario S4).
    let subscribe_result = {
        let packets = world.lock().await.alive_snapshot_packets(avatar_uid);
        let mut result = Ok(());
        for packet in packets {
            if let Err(e) = outbound.push(QueuedPacket::Critical(packet)) {
                result = Err(e);
                break;
            }
        }
        result
    };

    let result = match subscribe_result {
        Ok(()) => {
            ready_loop(
                &mut framed,
                world,
                resources,
                &outbound,
                user_id,
                avatar_uid,
                config.idle_timeout,
                shutdown,
            )
            .await
        }
        Err(e) => Err(e),
    };

    if let Err(err) = &result {
        if let Some(kind) = err.wire_kind() {
            let reason = err.to_string();
            let _ = framed
                .send(Clientbound::ErrorMessage { kind, reason })
                .await;
        }
    }

    result
        .map(|()| RunOutcome::Authenticated { avatar_uid })
        .map_err(|e| (e, Some(avatar_uid)))
}

type ClientFramed = Framed<TcpStream, WireCodec>;

async fn await_hello(framed: &mut ClientFramed, idle_timeout: Duration) -> Result<(), SessionError> {
    let msg = read_with_timeout(framed, idle_timeout).await?;
    match msg {
        Serverbound::HelloRequest {
            magic,
            protocol_version,
        } => {
            if magic != HELLO_MAGIC {
                return Err(SessionError::ProtocolVersionMismatch(format!(
                    "bad magic: expected {HELLO_MAGIC:#x}, got {magic:#x}"
                )));
            }
            if protocol_version != PROTOCOL_VERSION {
                return Err(SessionError::ProtocolVersionMismatch(format!(
                    "unsupported protocol version {protocol_version}, server supports {PROTOCOL_VERSION}"
                )));
            }
            Ok(())
        }
        _ => Err(SessionError::ProtocolVersionMismatch(
            "expected hello as first message".into(),
        )),
    }
}

async fn await_auth(
    framed: &mut ClientFramed,
    world: &WorldHandle,
    idle_timeout: Duration,
) -> Result<(UserId, Uid), SessionError> {
    let msg = read_with_timeout(framed, idle_timeout).await?;
    let (username, password) = match msg {
        Serverbound::AuthRequest { username, password } => (username, password),
        _ => return Err(SessionError::AuthFailed),
    };

    let mut world = world.lock().await;
    let user = world
        .user_by_name(&username)
        .filter(|u| u.password_hash_with_salt.verify(&password))
        .ok_or(SessionError::AuthFailed)?;
    let user_id = user.id;
    let avatar_uid = world.apply_avatar_create(
        user_id,
        username,
        String::new(),
        world_common::geom::Vec3::new(0.0, 0.0, 0.0),
        Rotation::default(),
    );
    Ok((user_id, avatar_uid))
}

async fn read_with_timeout(
    framed: &mut ClientFramed,
    idle_timeout: Duration,
) -> Result<Serverbound, SessionError> {
    match tokio::time::timeout(idle_timeout, framed.next()).await {
        Err(_elapsed) => Err(SessionError::IdleTimeout),
        Ok(None) => Err(SessionError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "client disconnected",
        ))),
        Ok(Some(Err(e))) => Err(SessionError::Malformed(e)),
        Ok(Some(Ok(msg))) => Ok(msg),
    }
}

#[allow(clippy::too_many_arguments)]
async fn ready_loop(
    framed: &mut ClientFramed,
    world: &WorldHandle,
    resources: &Arc<ResourceRegistry>,
    outbound: &Arc<OutboundQueue>,
    user_id: UserId,
    avatar_uid: Uid,
    idle_timeout: Duration,
    shutdown: &mut ShutdownHandle,
) -> Result<(), SessionError> {
    let _ = resources; // reserved: resource transfer messages aren't part of the wire table (out of scope beyond path lookups), kept for future wiring.
    loop {
        tokio::select! {
            biased;

            _ = shutdown.wait() => {
                return Err(SessionError::ShutdownRequested);
            }

            packet = outbound.pop() => {
                framed.send(packet?.into_inner()).await?;
            }

            msg = tokio::time::timeout(idle_timeout, framed.next()) => {
                let msg = match msg {
                    Err(_elapsed) => return Err(SessionError::IdleTimeout),
                    Ok(None) => return Ok(()),
                    Ok(Some(Err(e))) => return Err(SessionError::Malformed(e)),
                    Ok(Some(Ok(msg))) => msg,
                };
                handle_inbound(msg, world, outbound, user_id, avatar_uid).await?;
            }
        }
    }
}

async fn handle_inbound(
    msg: Serverbound,
    world: &WorldHandle,
    outbound: &Arc<OutboundQueue>,
    user_id: UserId,
    avatar_uid: Uid,
) -> Result<(), SessionError> {
    match msg {
        Serverbound::HelloRequest { .. } | Serverbound::AuthRequest { .. } => {
            debug!("ignoring out-of-order handshake message after Ready");
            Ok(())
        }
        Serverbound::Keepalive => {
            world.lock().await.touch_avatar_activity(avatar_uid);
            Ok(())
        }
        Serverbound::ObjectCreateRequest(fields) => {
            let mut world = world.lock().await;
            world.touch_avatar_activity(avatar_uid);
            world
                .apply_object_create(create_request(user_id, fields))
                .map(|_uid| ())
                .map_err(|e| e.into())
        }
        Serverbound::ObjectUpdateRequest { uid, patch } => {
            let mut world = world.lock().await;
            world.touch_avatar_activity(avatar_uid);
            match world.check_object_mutation_permission(uid, user_id) {
                Ok(()) => {
                    let result = world.apply_object_update(uid, object_patch(patch));
                    send_on_failure(outbound, result)
                }
                Err(e) => send_on_failure(outbound, Err(e)),
            }
        }
        Serverbound::ObjectDestroyRequest { uid } => {
            let mut world = world.lock().await;
            world.touch_avatar_activity(avatar_uid);
            match world.check_object_mutation_permission(uid, user_id) {
                Ok(()) => {
                    let result = world.apply_object_destroy(uid);
                    send_on_failure(outbound, result)
                }
                Err(e) => send_on_failure(outbound, Err(e)),
            }
        }
        Serverbound::AvatarUpdateRequest { patch } => {
            let mut world = world.lock().await;
            world.touch_avatar_activity(avatar_uid);
            let result = world.apply_avatar_update(avatar_uid, avatar_patch(patch));
            send_on_failure(outbound, result)
        }
    }
}

/// `NotFound`/`PermissionDenied` send an error packet but never close the
/// session; everything else is surfaced so the caller closes.
fn send_on_failure<E>(outbound: &Arc<OutboundQueue>, result: Result<(), E>) -> Result<(), SessionError>
where
    SessionError: From<E>,
{
    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            let err: SessionError = e.into();
            if let Some(kind) = err.wire_kind() {
                let reason = err.to_string();
                let _ = outbound.push(QueuedPacket::Critical(Clientbound::ErrorMessage {
                    kind,
                    reason,
                }));
            }
            Ok(())
        }
    }
}

fn create_request(owner: UserId, fields: ObjectCreateFields) -> ObjectCreateRequest {
    ObjectCreateRequest {
        uid_hint: None,
        owner_user_id: owner,
        kind: fields.kind,
        transform: fields.transform,
        model_url: fields.model_url,
        materials: fields.materials,
        voxel_group: fields.voxel_group,
        content: fields.content,
    }
}

fn object_patch(wire: ObjectPatchWire) -> ObjectPatch {
    ObjectPatch {
        transform: wire.transform,
        model_url: wire.model_url,
        materials: wire.materials,
        voxel_group: wire.voxel_group,
        content: wire.content,
    }
}

fn avatar_patch(wire: AvatarPatchWire) -> AvatarPatch {
    AvatarPatch {
        pos: wire.pos,
        rotation: wire.rotation,
        selected_object_uid: wire.selected_object_uid,
    }
}
