use bytes::BytesMut;

use crate::geom::Vec3;
use crate::ids::{ParcelId, Uid};
use crate::limits::*;
use crate::model::{Avatar, Material, Object, Parcel, Rotation, Transform, Voxel};

use super::entity_codec::*;
use super::error::{Malformed, ReadErr};
use super::kind::{cb, sb};
use super::reader::ByteReader;
use super::writer::ByteWriter;

/// The subset of [`Object`] fields a client supplies when creating one;
/// `uid`, `owner_user_id` and `lifecycle_state` are assigned by the world
/// model.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectCreateFields {
    pub kind: crate::model::ObjectType,
    pub transform: Transform,
    pub model_url: String,
    pub materials: Vec<Material>,
    pub voxel_group: Option<Vec<Voxel>>,
    pub content: String,
}

/// Error kinds that can be reported back to a client over the wire (the
/// subset of spec §7's taxonomy that's meaningful for the client to see;
/// `PersistenceFailure`/`ShutdownRequested` are server-internal).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum WireErrorKind {
    Malformed,
    ProtocolVersionMismatch,
    AuthFailed,
    PermissionDenied,
    NotFound,
    Overloaded,
    IdleTimeout,
}

impl WireErrorKind {
    fn to_wire(self) -> u32 {
        match self {
            WireErrorKind::Malformed => 0,
            WireErrorKind::ProtocolVersionMismatch => 1,
            WireErrorKind::AuthFailed => 2,
            WireErrorKind::PermissionDenied => 3,
            WireErrorKind::NotFound => 4,
            WireErrorKind::Overloaded => 5,
            WireErrorKind::IdleTimeout => 6,
        }
    }

    fn from_wire(v: u32) -> Option<Self> {
        Some(match v {
            0 => WireErrorKind::Malformed,
            1 => WireErrorKind::ProtocolVersionMismatch,
            2 => WireErrorKind::AuthFailed,
            3 => WireErrorKind::PermissionDenied,
            4 => WireErrorKind::NotFound,
            5 => WireErrorKind::Overloaded,
            6 => WireErrorKind::IdleTimeout,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectPatchWire {
    pub transform: Option<Transform>,
    pub model_url: Option<String>,
    pub materials: Option<Vec<Material>>,
    /// `Some(None)` clears voxelization; `Some(Some(..))` replaces it;
    /// `None` leaves it untouched. Matches [`crate::model::ObjectPatch`].
    pub voxel_group: Option<Option<Vec<Voxel>>>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AvatarPatchWire {
    pub pos: Option<Vec3<f64>>,
    pub rotation: Option<Rotation>,
    pub selected_object_uid: Option<Uid>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Serverbound {
    HelloRequest { magic: u32, protocol_version: u32 },
    AuthRequest { username: String, password: String },
    ObjectCreateRequest(ObjectCreateFields),
    ObjectUpdateRequest { uid: Uid, patch: ObjectPatchWire },
    ObjectDestroyRequest { uid: Uid },
    AvatarUpdateRequest { patch: AvatarPatchWire },
    Keepalive,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clientbound {
    HelloResponse,
    AuthResponse { avatar_uid: Uid },
    ErrorMessage { kind: WireErrorKind, reason: String },
    ObjectCreated(Object),
    ObjectFullUpdate(Object),
    ObjectTransformUpdate {
        uid: Uid,
        pos: Vec3<f64>,
        axis: Vec3<f32>,
        angle: f32,
    },
    ObjectDestroyed { uid: Uid },
    AvatarCreated {
        uid: Uid,
        name: String,
        model_url: String,
        pos: Vec3<f64>,
        rotation: Rotation,
    },
    AvatarFullUpdate(Avatar),
    AvatarTransformUpdate {
        uid: Uid,
        pos: Vec3<f64>,
        rotation: Rotation,
    },
    AvatarDestroyed { uid: Uid },
    ParcelCreated(Parcel),
    ParcelFullUpdate(Parcel),
    ParcelDestroyed { id: ParcelId },
    TimeSyncMessage { server_time: f64 },
}

fn write_object_create_fields(w: &mut ByteWriter, f: &ObjectCreateFields) {
    w.u32(f.kind.to_wire());
    write_transform(w, &f.transform);
    w.string(&f.model_url);
    w.vec(&f.materials, write_material);
    w.bool(f.voxel_group.is_some());
    if let Some(voxels) = &f.voxel_group {
        w.vec(voxels, write_voxel);
    }
    w.string(&f.content);
}

fn read_object_create_fields(r: &mut ByteReader) -> Result<ObjectCreateFields, ReadErr> {
    let kind = crate::model::ObjectType::from_wire(r.u32()?)
        .ok_or_else(|| ReadErr::Malformed(Malformed::UnknownEntityType(0)))?;
    let transform = read_transform(r)?;
    let model_url = r.string(MAX_URL_LEN)?;
    let materials = r.vec(MAX_MATERIALS, read_material)?;
    let has_voxels = r.bool()?;
    let voxel_group = if has_voxels {
        Some(r.vec(MAX_VOXELS, read_voxel)?)
    } else {
        None
    };
    let content = r.string(MAX_CONTENT_LEN)?;
    Ok(ObjectCreateFields {
        kind,
        transform,
        model_url,
        materials,
        voxel_group,
        content,
    })
}

fn write_object_patch(w: &mut ByteWriter, p: &ObjectPatchWire) {
    w.bool(p.transform.is_some());
    if let Some(t) = &p.transform {
        write_transform(w, t);
    }
    w.bool(p.model_url.is_some());
    if let Some(u) = &p.model_url {
        w.string(u);
    }
    w.bool(p.materials.is_some());
    if let Some(m) = &p.materials {
        w.vec(m, write_material);
    }
    w.bool(p.voxel_group.is_some());
    if let Some(vg) = &p.voxel_group {
        w.bool(vg.is_some());
        if let Some(voxels) = vg {
            w.vec(voxels, write_voxel);
        }
    }
    w.bool(p.content.is_some());
    if let Some(c) = &p.content {
        w.string(c);
    }
}

fn read_object_patch(r: &mut ByteReader) -> Result<ObjectPatchWire, ReadErr> {
    let transform = if r.bool()? { Some(read_transform(r)?) } else { None };
    let model_url = if r.bool()? { Some(r.string(MAX_URL_LEN)?) } else { None };
    let materials = if r.bool()? {
        Some(r.vec(MAX_MATERIALS, read_material)?)
    } else {
        None
    };
    let voxel_group = if r.bool()? {
        if r.bool()? {
            Some(Some(r.vec(MAX_VOXELS, read_voxel)?))
        } else {
            Some(None)
        }
    } else {
        None
    };
    let content = if r.bool()? { Some(r.string(MAX_CONTENT_LEN)?) } else { None };
    Ok(ObjectPatchWire {
        transform,
        model_url,
        materials,
        voxel_group,
        content,
    })
}

fn write_avatar_patch(w: &mut ByteWriter, p: &AvatarPatchWire) {
    w.bool(p.pos.is_some());
    if let Some(pos) = p.pos {
        w.vec3_f64(pos);
    }
    w.bool(p.rotation.is_some());
    if let Some(rot) = p.rotation {
        w.vec3_f32(rot.axis);
        w.f32(rot.angle);
    }
    w.bool(p.selected_object_uid.is_some());
    if let Some(uid) = p.selected_object_uid {
        w.u64(uid.raw());
    }
}

fn read_avatar_patch(r: &mut ByteReader) -> Result<AvatarPatchWire, ReadErr> {
    let pos = if r.bool()? { Some(r.vec3_f64()?) } else { None };
    let rotation = if r.bool()? {
        Some(Rotation {
            axis: r.vec3_f32()?,
            angle: r.f32()?,
        })
    } else {
        None
    };
    let selected_object_uid = if r.bool()? {
        Some(Uid::from_raw(r.u64()?))
    } else {
        None
    };
    Ok(AvatarPatchWire {
        pos,
        rotation,
        selected_object_uid,
    })
}

impl Serverbound {
    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        let mut w = ByteWriter::new(buf);
        match self {
            Serverbound::HelloRequest { magic, protocol_version } => {
                w.u32(sb::HELLO_REQUEST);
                w.u32(*magic);
                w.u32(*protocol_version);
            }
            Serverbound::AuthRequest { username, password } => {
                w.u32(sb::AUTH_REQUEST);
                w.string(username);
                w.string(password);
            }
            Serverbound::ObjectCreateRequest(fields) => {
                w.u32(sb::OBJECT_CREATE_REQUEST);
                write_object_create_fields(&mut w, fields);
            }
            Serverbound::ObjectUpdateRequest { uid, patch } => {
                w.u32(sb::OBJECT_UPDATE_REQUEST);
                w.u64(uid.raw());
                write_object_patch(&mut w, patch);
            }
            Serverbound::ObjectDestroyRequest { uid } => {
                w.u32(sb::OBJECT_DESTROY_REQUEST);
                w.u64(uid.raw());
            }
            Serverbound::AvatarUpdateRequest { patch } => {
                w.u32(sb::AVATAR_UPDATE_REQUEST);
                write_avatar_patch(&mut w, patch);
            }
            Serverbound::Keepalive => {
                w.u32(sb::KEEPALIVE);
            }
        }
    }

    pub(crate) fn decode(src: &[u8]) -> Result<(Self, usize), ReadErr> {
        let mut r = ByteReader::new(src);
        let kind = r.u32()?;
        let msg = match kind {
            sb::HELLO_REQUEST => Serverbound::HelloRequest {
                magic: r.u32()?,
                protocol_version: r.u32()?,
            },
            sb::AUTH_REQUEST => Serverbound::AuthRequest {
                username: r.string(MAX_NAME_LEN)?,
                password: r.string(MAX_PASSWORD_LEN)?,
            },
            sb::OBJECT_CREATE_REQUEST => {
                Serverbound::ObjectCreateRequest(read_object_create_fields(&mut r)?)
            }
            sb::OBJECT_UPDATE_REQUEST => Serverbound::ObjectUpdateRequest {
                uid: Uid::from_raw(r.u64()?),
                patch: read_object_patch(&mut r)?,
            },
            sb::OBJECT_DESTROY_REQUEST => Serverbound::ObjectDestroyRequest {
                uid: Uid::from_raw(r.u64()?),
            },
            sb::AVATAR_UPDATE_REQUEST => Serverbound::AvatarUpdateRequest {
                patch: read_avatar_patch(&mut r)?,
            },
            sb::KEEPALIVE => Serverbound::Keepalive,
            other => return Err(ReadErr::Malformed(Malformed::UnknownKind(other))),
        };
        Ok((msg, r.consumed()))
    }
}

impl Clientbound {
    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        let mut w = ByteWriter::new(buf);
        match self {
            Clientbound::HelloResponse => {
                w.u32(cb::HELLO_RESPONSE);
            }
            Clientbound::AuthResponse { avatar_uid } => {
                w.u32(cb::AUTH_RESPONSE);
                w.u64(avatar_uid.raw());
            }
            Clientbound::ErrorMessage { kind, reason } => {
                w.u32(cb::ERROR_MESSAGE);
                w.u32(kind.to_wire());
                w.string(reason);
            }
            Clientbound::ObjectCreated(o) => {
                w.u32(cb::OBJECT_CREATED);
                write_object(&mut w, o);
            }
            Clientbound::ObjectFullUpdate(o) => {
                w.u32(cb::OBJECT_FULL_UPDATE);
                write_object(&mut w, o);
            }
            Clientbound::ObjectTransformUpdate { uid, pos, axis, angle } => {
                w.u32(cb::OBJECT_TRANSFORM_UPDATE);
                w.u64(uid.raw());
                w.vec3_f64(*pos);
                w.vec3_f32(*axis);
                w.f32(*angle);
            }
            Clientbound::ObjectDestroyed { uid } => {
                w.u32(cb::OBJECT_DESTROYED);
                w.u64(uid.raw());
            }
            Clientbound::AvatarCreated { uid, name, model_url, pos, rotation } => {
                w.u32(cb::AVATAR_CREATED);
                w.u64(uid.raw());
                w.string(name);
                w.string(model_url);
                w.vec3_f64(*pos);
                w.vec3_f32(rotation.axis);
                w.f32(rotation.angle);
            }
            Clientbound::AvatarFullUpdate(a) => {
                w.u32(cb::AVATAR_FULL_UPDATE);
                write_avatar(&mut w, a);
            }
            Clientbound::AvatarTransformUpdate { uid, pos, rotation } => {
                w.u32(cb::AVATAR_TRANSFORM_UPDATE);
                w.u64(uid.raw());
                w.vec3_f64(*pos);
                w.vec3_f32(rotation.axis);
                w.f32(rotation.angle);
            }
            Clientbound::AvatarDestroyed { uid } => {
                w.u32(cb::AVATAR_DESTROYED);
                w.u64(uid.raw());
            }
            Clientbound::ParcelCreated(p) => {
                w.u32(cb::PARCEL_CREATED);
                write_parcel(&mut w, p);
            }
            Clientbound::ParcelFullUpdate(p) => {
                w.u32(cb::PARCEL_FULL_UPDATE);
                write_parcel(&mut w, p);
            }
            Clientbound::ParcelDestroyed { id } => {
                w.u32(cb::PARCEL_DESTROYED);
                w.u64(id.raw());
            }
            Clientbound::TimeSyncMessage { server_time } => {
                w.u32(cb::TIME_SYNC);
                w.f64(*server_time);
            }
        }
    }

    pub(crate) fn decode(src: &[u8]) -> Result<(Self, usize), ReadErr> {
        let mut r = ByteReader::new(src);
        let kind = r.u32()?;
        let msg = match kind {
            cb::HELLO_RESPONSE => Clientbound::HelloResponse,
            cb::AUTH_RESPONSE => Clientbound::AuthResponse {
                avatar_uid: Uid::from_raw(r.u64()?),
            },
            cb::ERROR_MESSAGE => {
                let kind = WireErrorKind::from_wire(r.u32()?)
                    .ok_or_else(|| ReadErr::Malformed(Malformed::UnknownKind(0)))?;
                let reason = r.string(MAX_ERROR_REASON_LEN)?;
                Clientbound::ErrorMessage { kind, reason }
            }
            cb::OBJECT_CREATED => Clientbound::ObjectCreated(read_object(&mut r)?),
            cb::OBJECT_FULL_UPDATE => Clientbound::ObjectFullUpdate(read_object(&mut r)?),
            cb::OBJECT_TRANSFORM_UPDATE => Clientbound::ObjectTransformUpdate {
                uid: Uid::from_raw(r.u64()?),
                pos: r.vec3_f64()?,
                axis: r.vec3_f32()?,
                angle: r.f32()?,
            },
            cb::OBJECT_DESTROYED => Clientbound::ObjectDestroyed {
                uid: Uid::from_raw(r.u64()?),
            },
            cb::AVATAR_CREATED => Clientbound::AvatarCreated {
                uid: Uid::from_raw(r.u64()?),
                name: r.string(MAX_NAME_LEN)?,
                model_url: r.string(MAX_URL_LEN)?,
                pos: r.vec3_f64()?,
                rotation: Rotation {
                    axis: r.vec3_f32()?,
                    angle: r.f32()?,
                },
            },
            cb::AVATAR_FULL_UPDATE => Clientbound::AvatarFullUpdate(read_avatar(&mut r)?),
            cb::AVATAR_TRANSFORM_UPDATE => Clientbound::AvatarTransformUpdate {
                uid: Uid::from_raw(r.u64()?),
                pos: r.vec3_f64()?,
                rotation: Rotation {
                    axis: r.vec3_f32()?,
                    angle: r.f32()?,
                },
            },
            cb::AVATAR_DESTROYED => Clientbound::AvatarDestroyed {
                uid: Uid::from_raw(r.u64()?),
            },
            cb::PARCEL_CREATED => Clientbound::ParcelCreated(read_parcel(&mut r)?),
            cb::PARCEL_FULL_UPDATE => Clientbound::ParcelFullUpdate(read_parcel(&mut r)?),
            cb::PARCEL_DESTROYED => Clientbound::ParcelDestroyed {
                id: ParcelId::from_raw(r.u64()?),
            },
            cb::TIME_SYNC => Clientbound::TimeSyncMessage {
                server_time: r.f64()?,
            },
            other => return Err(ReadErr::Malformed(Malformed::UnknownKind(other))),
        };
        Ok((msg, r.consumed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LifecycleState, ObjectType};

    fn sample_fields() -> ObjectCreateFields {
        ObjectCreateFields {
            kind: ObjectType::Generic,
            transform: Transform {
                pos: Vec3::new(1.0, 2.0, 3.0),
                axis: Vec3::new(0.0, 1.0, 0.0),
                angle: 0.0,
                scale: Vec3::new(1.0, 1.0, 1.0),
            },
            model_url: "m.glb".into(),
            materials: vec![],
            voxel_group: None,
            content: String::new(),
        }
    }

    #[test]
    fn serverbound_round_trip_object_create() {
        let msg = Serverbound::ObjectCreateRequest(sample_fields());
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        let (decoded, consumed) = Serverbound::decode(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(decoded, msg);
    }

    #[test]
    fn serverbound_round_trip_hello_and_auth() {
        for msg in [
            Serverbound::HelloRequest {
                magic: 0xdead_beef,
                protocol_version: 3,
            },
            Serverbound::AuthRequest {
                username: "alice".into(),
                password: "hunter2".into(),
            },
            Serverbound::Keepalive,
        ] {
            let mut buf = BytesMut::new();
            msg.encode(&mut buf);
            let (decoded, consumed) = Serverbound::decode(&buf).unwrap();
            assert_eq!(consumed, buf.len());
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn clientbound_round_trip_object_created() {
        let obj = Object {
            uid: Uid::from_raw(7),
            kind: ObjectType::Generic,
            owner_user_id: crate::ids::UserId::from_raw(1),
            created_time: 123.5,
            transform: sample_fields().transform,
            model_url: "m.glb".into(),
            materials: vec![Material {
                colour_rgb: Vec3::new(1.0, 0.0, 0.0),
                colour_texture_url: "t.png".into(),
                roughness: 0.5,
                metallic: 0.1,
                opacity: 1.0,
                tex_matrix: crate::model::TexMatrix::default(),
            }],
            voxel_group: Some(vec![Voxel {
                pos: Vec3::new(1, 2, 3),
                material_index: 0,
            }]),
            content: "hello".into(),
            lifecycle_state: LifecycleState::JustCreated,
            from_remote_other_dirty: false,
            from_remote_transform_dirty: false,
        };
        let msg = Clientbound::ObjectCreated(obj.clone());
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        let (decoded, consumed) = Clientbound::decode(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        match decoded {
            Clientbound::ObjectCreated(got) => assert_eq!(got, obj),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_rejects_string_over_max_len() {
        let mut buf = BytesMut::new();
        let mut w = ByteWriter::new(&mut buf);
        w.u32(sb::AUTH_REQUEST);
        // username length field lies about a huge length with no data behind it
        w.u32(MAX_NAME_LEN + 1);
        let err = Serverbound::decode(&buf).unwrap_err();
        assert!(matches!(
            err,
            ReadErr::Malformed(Malformed::StringTooLong { .. })
        ));
    }

    #[test]
    fn decode_unknown_kind_is_malformed() {
        let mut buf = BytesMut::new();
        let mut w = ByteWriter::new(&mut buf);
        w.u32(999);
        let err = Serverbound::decode(&buf).unwrap_err();
        assert!(matches!(err, ReadErr::Malformed(Malformed::UnknownKind(999))));
    }

    #[test]
    fn decode_partial_buffer_needs_more() {
        let msg = Serverbound::ObjectDestroyRequest { uid: Uid::from_raw(5) };
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        let truncated = &buf[..buf.len() - 1];
        let err = Serverbound::decode(truncated).unwrap_err();
        assert_eq!(err, ReadErr::NeedMore);
    }
}
