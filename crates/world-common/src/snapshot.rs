//! On-disk snapshot format. Independent from the stream wire
//! protocol's framing, though it reuses the same little-endian primitive
//! encoding and the `entity_codec` full-record helpers. Versioned per entity
//! kind so old snapshot files keep loading as the schema grows: "unknown
//! future versions fail the load with a versioned error; older versions are
//! accepted with default-valued new fields".
//!
//! Avatars are session state, not world state, and are never persisted.

use bytes::BytesMut;

use crate::ids::UserId;
use crate::limits::{MAX_EMAIL_LEN, MAX_NAME_LEN};
use crate::model::{Object, Parcel, PasswordHash, Resource, ResourceState, User};
use crate::wire::entity_codec::{
    read_object, read_parcel, read_resource, write_object, write_parcel, write_resource,
};
use crate::wire::reader::ByteReader;
use crate::wire::writer::ByteWriter;
use crate::wire::{Malformed, ReadErr, WireError};

const FILE_MAGIC: u32 = 0x5753_4e50; // "WSNP"

const USER_VERSION: u32 = 1;
const OBJECT_VERSION: u32 = 1;
const PARCEL_VERSION: u32 = 1;
/// Resource format has seen one schema change: version 0 predates
/// `owner_user_id` (every resource on disk was implicitly unowned).
const RESOURCE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    pub uid_high_water: u64,
    pub parcel_id_high_water: u64,
    pub user_id_high_water: u64,
    pub users: Vec<User>,
    pub objects: Vec<Object>,
    pub parcels: Vec<Parcel>,
    pub resources: Vec<Resource>,
}

fn write_user(w: &mut ByteWriter, u: &User) {
    w.u64(u.id.raw());
    w.string(&u.name);
    w.bytes(&u.password_hash_with_salt.salt);
    w.bytes(&u.password_hash_with_salt.digest);
    w.string(&u.email);
    w.f64(u.created_time);
}

fn read_user(r: &mut ByteReader) -> Result<User, ReadErr> {
    let id = UserId::from_raw(r.u64()?);
    let name = r.string(MAX_NAME_LEN)?;
    let salt: [u8; 16] = r.bytes_exact(16)?.try_into().unwrap();
    let digest: [u8; 32] = r.bytes_exact(32)?.try_into().unwrap();
    let email = r.string(MAX_EMAIL_LEN)?;
    let created_time = r.f64()?;
    Ok(User {
        id,
        name,
        password_hash_with_salt: PasswordHash { salt, digest },
        email,
        created_time,
    })
}

/// Resource records additionally carry `owner_user_id` as of version 1;
/// version 0 records are read with `UserId::INVALID` filled in.
fn read_resource_record(r: &mut ByteReader, version: u32) -> Result<Resource, ReadErr> {
    if version >= 1 {
        return read_resource(r);
    }
    let url = r.string(crate::limits::MAX_URL_LEN)?;
    let local_path = r.string(crate::limits::MAX_URL_LEN)?;
    let state = ResourceState::from_wire(r.u32()?)
        .ok_or_else(|| ReadErr::Malformed(Malformed::UnknownResourceState(0)))?;
    Ok(Resource {
        url,
        local_path,
        owner_user_id: UserId::INVALID,
        state,
    })
}

pub fn encode(snapshot: &WorldSnapshot) -> BytesMut {
    let mut buf = BytesMut::new();
    let mut w = ByteWriter::new(&mut buf);
    w.u32(FILE_MAGIC);
    w.u64(snapshot.uid_high_water);
    w.u64(snapshot.parcel_id_high_water);
    w.u64(snapshot.user_id_high_water);

    w.u32(snapshot.users.len() as u32);
    for user in &snapshot.users {
        w.u32(USER_VERSION);
        write_user(&mut w, user);
    }

    w.u32(snapshot.objects.len() as u32);
    for obj in &snapshot.objects {
        w.u32(OBJECT_VERSION);
        write_object(&mut w, obj);
    }

    w.u32(snapshot.parcels.len() as u32);
    for parcel in &snapshot.parcels {
        w.u32(PARCEL_VERSION);
        write_parcel(&mut w, parcel);
    }

    w.u32(snapshot.resources.len() as u32);
    for resource in &snapshot.resources {
        w.u32(RESOURCE_VERSION);
        write_resource(&mut w, resource);
    }

    buf
}

fn reject_if_future(version: u32, max_supported: u32) -> Result<(), WireError> {
    if version > max_supported {
        return Err(Malformed::UnsupportedSnapshotVersion {
            found: version,
            max_supported,
        }
        .into());
    }
    Ok(())
}

pub fn decode(src: &[u8]) -> Result<WorldSnapshot, WireError> {
    let mut r = ByteReader::new(src);
    let magic = match r.u32() {
        Ok(v) => v,
        Err(_) => return Err(Malformed::BadMagic.into()),
    };
    if magic != FILE_MAGIC {
        return Err(Malformed::BadMagic.into());
    }
    let uid_high_water = r.u64().map_err(to_wire_err)?;
    let parcel_id_high_water = r.u64().map_err(to_wire_err)?;
    let user_id_high_water = r.u64().map_err(to_wire_err)?;

    let user_count = r.u32().map_err(to_wire_err)?;
    let mut users = Vec::with_capacity(user_count.min(4096) as usize);
    for _ in 0..user_count {
        let version = r.u32().map_err(to_wire_err)?;
        reject_if_future(version, USER_VERSION)?;
        users.push(read_user(&mut r).map_err(to_wire_err)?);
    }

    let object_count = r.u32().map_err(to_wire_err)?;
    let mut objects = Vec::with_capacity(object_count.min(4096) as usize);
    for _ in 0..object_count {
        let version = r.u32().map_err(to_wire_err)?;
        reject_if_future(version, OBJECT_VERSION)?;
        objects.push(read_object(&mut r).map_err(to_wire_err)?);
    }

    let parcel_count = r.u32().map_err(to_wire_err)?;
    let mut parcels = Vec::with_capacity(parcel_count.min(4096) as usize);
    for _ in 0..parcel_count {
        let version = r.u32().map_err(to_wire_err)?;
        reject_if_future(version, PARCEL_VERSION)?;
        parcels.push(read_parcel(&mut r).map_err(to_wire_err)?);
    }

    let resource_count = r.u32().map_err(to_wire_err)?;
    let mut resources = Vec::with_capacity(resource_count.min(4096) as usize);
    for _ in 0..resource_count {
        let version = r.u32().map_err(to_wire_err)?;
        reject_if_future(version, RESOURCE_VERSION)?;
        resources.push(read_resource_record(&mut r, version).map_err(to_wire_err)?);
    }

    Ok(WorldSnapshot {
        uid_high_water,
        parcel_id_high_water,
        user_id_high_water,
        users,
        objects,
        parcels,
        resources,
    })
}

/// A truncated snapshot file (`NeedMore`) is just as fatal as a malformed
/// one here: unlike the stream protocol there's no "wait for more bytes",
/// the file is everything we'll ever get.
fn to_wire_err(e: ReadErr) -> WireError {
    match e {
        ReadErr::NeedMore => Malformed::BadMagic.into(),
        ReadErr::Malformed(m) => WireError::Malformed(m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Vec2;
    use crate::ids::ParcelId;
    use crate::model::LifecycleState;

    fn sample_user() -> User {
        User {
            id: UserId::from_raw(1),
            name: "alice".into(),
            password_hash_with_salt: PasswordHash::new("pw", [3u8; 16]),
            email: "alice@example.com".into(),
            created_time: 10.0,
        }
    }

    fn sample_parcel() -> Parcel {
        Parcel {
            id: ParcelId::from_raw(1),
            owner_user_id: UserId::from_raw(1),
            admin_user_ids: vec![],
            writer_user_ids: vec![],
            all_writeable: false,
            verts: [
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ],
            zbounds: (0.0, 1.0),
            created_time: 0.0,
            description: "town square".into(),
            lifecycle_state: LifecycleState::Alive,
        }
    }

    fn sample_resource() -> Resource {
        Resource {
            url: "abc123".into(),
            local_path: "/data/resources/abc123".into(),
            owner_user_id: UserId::from_raw(1),
            state: ResourceState::Present,
        }
    }

    #[test]
    fn snapshot_round_trips_users_parcels_and_resources() {
        let snap = WorldSnapshot {
            uid_high_water: 42,
            parcel_id_high_water: 3,
            user_id_high_water: 1,
            users: vec![sample_user()],
            objects: vec![],
            parcels: vec![sample_parcel()],
            resources: vec![sample_resource()],
        };
        let bytes = encode(&snap);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, snap);
    }

    #[test]
    fn object_round_trips_with_materials_and_voxels() {
        use crate::geom::Vec3;
        use crate::ids::Uid;
        use crate::model::{Material, ObjectType, TexMatrix, Transform, Voxel};
        let obj = Object {
            uid: Uid::from_raw(99),
            kind: ObjectType::VoxelGroup,
            owner_user_id: UserId::from_raw(1),
            created_time: 5.0,
            transform: Transform {
                pos: Vec3::new(1.0, 2.0, 3.0),
                axis: Vec3::new(0.0, 1.0, 0.0),
                angle: 0.0,
                scale: Vec3::new(1.0, 1.0, 1.0),
            },
            model_url: String::new(),
            materials: vec![Material {
                colour_rgb: Vec3::new(1.0, 1.0, 1.0),
                colour_texture_url: String::new(),
                roughness: 1.0,
                metallic: 0.0,
                opacity: 1.0,
                tex_matrix: TexMatrix::default(),
            }],
            voxel_group: Some(vec![Voxel {
                pos: Vec3::new(0, 0, 0),
                material_index: 0,
            }]),
            content: String::new(),
            lifecycle_state: LifecycleState::Alive,
            from_remote_other_dirty: false,
            from_remote_transform_dirty: false,
        };
        let snap = WorldSnapshot {
            uid_high_water: 99,
            parcel_id_high_water: 0,
            user_id_high_water: 1,
            users: vec![],
            objects: vec![obj.clone()],
            parcels: vec![],
            resources: vec![],
        };
        let decoded = decode(&encode(&snap)).unwrap();
        assert_eq!(decoded.objects, vec![obj]);
    }

    #[test]
    fn legacy_resource_without_owner_field_defaults_to_invalid_owner() {
        let mut buf = BytesMut::new();
        {
            let mut w = ByteWriter::new(&mut buf);
            w.u32(FILE_MAGIC);
            w.u64(0);
            w.u64(0);
            w.u64(0);
            w.u32(0); // users
            w.u32(0); // objects
            w.u32(0); // parcels
            w.u32(1); // resources
            w.u32(0); // legacy version, no owner_user_id on the wire
            w.string("legacy-url");
            w.string("/data/legacy-url");
            w.u32(ResourceState::Present.to_wire());
        }
        let decoded = decode(&buf).unwrap();
        assert_eq!(decoded.resources.len(), 1);
        assert_eq!(decoded.resources[0].owner_user_id, UserId::INVALID);
        assert_eq!(decoded.resources[0].url, "legacy-url");
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&0xdead_beefu32.to_le_bytes());
        let err = decode(&buf).unwrap_err();
        assert!(matches!(err, WireError::Malformed(Malformed::BadMagic)));
    }

    #[test]
    fn future_resource_version_is_rejected() {
        let mut buf = BytesMut::new();
        {
            let mut w = ByteWriter::new(&mut buf);
            w.u32(FILE_MAGIC);
            w.u64(0);
            w.u64(0);
            w.u64(0);
            w.u32(0);
            w.u32(0);
            w.u32(0);
            w.u32(1);
            w.u32(RESOURCE_VERSION + 1);
        }
        let err = decode(&buf).unwrap_err();
        assert!(matches!(
            err,
            WireError::Malformed(Malformed::UnsupportedSnapshotVersion { .. })
        ));
    }
}
