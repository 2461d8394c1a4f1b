//! The in-memory world model: five entity maps, two
//! dirty-from-remote sets, the identifier allocators and the
//! `changed_since_last_checkpoint` flag, all reachable only through `&mut
//! World`. Callers take the single `WorldMutex` (here a
//! `tokio::sync::Mutex<World>`) and call these methods, never touching the
//! maps directly.

mod bootstrap;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;

use world_common::geom::Vec2;
use world_common::ids::{IdAllocator, ParcelId, Uid, UserId};
use world_common::model::{
    Avatar, AvatarPatch, LifecycleState, Object, ObjectPatch, Parcel, Rotation, User,
};
use world_common::snapshot::WorldSnapshot;
use world_common::wire::Clientbound;

use crate::error::{SessionError, WorldError};

pub use bootstrap::bootstrap_parcels;

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Everything a session supplies when creating an object; `uid_hint` is
/// `Some` only for the ingestion adapter path, which supplies its own
/// stable identifier. Create fails if that uid is already taken.
#[derive(Debug, Clone)]
pub struct ObjectCreateRequest {
    pub uid_hint: Option<u64>,
    pub owner_user_id: UserId,
    pub kind: world_common::model::ObjectType,
    pub transform: world_common::model::Transform,
    pub model_url: String,
    pub materials: Vec<world_common::model::Material>,
    pub voxel_group: Option<Vec<world_common::model::Voxel>>,
    pub content: String,
}

#[derive(Debug, Default)]
pub struct World {
    pub objects: HashMap<Uid, Object>,
    pub avatars: HashMap<Uid, Avatar>,
    pub parcels: HashMap<ParcelId, Parcel>,
    pub users: HashMap<UserId, User>,

    dirty_objects: HashSet<Uid>,
    dirty_avatars: HashSet<Uid>,
    dirty_parcels: HashSet<ParcelId>,

    /// Uids that went `JustCreated -> Dead` without an intervening tick, so
    /// the tick loop must still emit the create packet before the destroy
    /// packet.
    objects_created_and_destroyed: HashSet<Uid>,
    avatars_created_and_destroyed: HashSet<Uid>,
    parcels_created_and_destroyed: HashSet<ParcelId>,

    uid_alloc: IdAllocator,
    parcel_id_alloc: IdAllocator,
    user_id_alloc: IdAllocator,

    changed_since_last_checkpoint: bool,
}

/// Shared handle around the world mutex; cloning is cheap (an `Arc` bump).
pub type WorldHandle = Arc<Mutex<World>>;

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrates a `World` from a loaded snapshot. Avatars are
    /// session state and are never part of a snapshot (world-common's
    /// snapshot doc comment), so the returned world always starts with an
    /// empty avatar map.
    pub fn from_snapshot(snapshot: WorldSnapshot) -> Self {
        let mut world = World::new();
        world.uid_alloc = IdAllocator::resume_from(snapshot.uid_high_water);
        world.parcel_id_alloc = IdAllocator::resume_from(snapshot.parcel_id_high_water);
        world.user_id_alloc = IdAllocator::resume_from(snapshot.user_id_high_water);
        for user in snapshot.users {
            world.users.insert(user.id, user);
        }
        for object in snapshot.objects {
            world.objects.insert(object.uid, object);
        }
        for parcel in snapshot.parcels {
            world.parcels.insert(parcel.id, parcel);
        }
        world
    }

    /// Builds the snapshot-shaped view of persisted world state. Resources
    /// live in their own registry, so the
    /// caller (the tick loop's checkpoint step) splices them in separately.
    pub fn snapshot_without_resources(&self) -> WorldSnapshot {
        WorldSnapshot {
            uid_high_water: self.uid_alloc.high_water(),
            parcel_id_high_water: self.parcel_id_alloc.high_water(),
            user_id_high_water: self.user_id_alloc.high_water(),
            users: self.users.values().cloned().collect(),
            objects: self.objects.values().cloned().collect(),
            parcels: self.parcels.values().cloned().collect(),
            resources: Vec::new(),
        }
    }

    pub fn changed_since_last_checkpoint(&self) -> bool {
        self.changed_since_last_checkpoint
    }

    pub fn clear_changed_flag(&mut self) {
        self.changed_since_last_checkpoint = false;
    }

    pub fn user_by_name(&self, name: &str) -> Option<&User> {
        self.users.values().find(|u| u.name == name)
    }

    /// Seeds a user directly; used by bootstrap data and the `--test`
    /// self-test harness. Not reachable from any wire message: the auth
    /// flow only ever looks users up, never creates them over the wire.
    /// User provisioning is an external/admin concern.
    pub fn seed_user(&mut self, name: &str, password: &str, email: &str) -> UserId {
        use rand::RngCore;
        let id = UserId::from_raw(self.user_id_alloc.alloc());
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let user = User {
            id,
            name: name.to_string(),
            password_hash_with_salt: world_common::model::PasswordHash::new(password, salt),
            email: email.to_string(),
            created_time: now_secs(),
        };
        self.users.insert(id, user);
        id
    }

    pub fn seed_parcel(&mut self, parcel: Parcel) {
        self.parcel_id_alloc.observe(parcel.id.raw());
        self.parcels.insert(parcel.id, parcel);
    }

    // ---- Objects ----

    pub fn apply_object_create(&mut self, req: ObjectCreateRequest) -> Result<Uid, WorldError> {
        let uid = match req.uid_hint {
            Some(raw) => {
                let uid = Uid::from_raw(raw);
                if self.objects.contains_key(&uid) {
                    return Err(WorldError::AlreadyExists(uid));
                }
                self.uid_alloc.observe(raw);
                uid
            }
            None => Uid::from_raw(self.uid_alloc.alloc()),
        };
        let object = Object {
            uid,
            kind: req.kind,
            owner_user_id: req.owner_user_id,
            created_time: now_secs(),
            transform: req.transform,
            model_url: req.model_url,
            materials: req.materials,
            voxel_group: req.voxel_group,
            content: req.content,
            lifecycle_state: LifecycleState::JustCreated,
            from_remote_other_dirty: true,
            from_remote_transform_dirty: false,
        };
        self.objects.insert(uid, object);
        self.dirty_objects.insert(uid);
        self.changed_since_last_checkpoint = true;
        Ok(uid)
    }

    pub fn apply_object_update(&mut self, uid: Uid, patch: ObjectPatch) -> Result<(), WorldError> {
        let object = self
            .objects
            .get_mut(&uid)
            .ok_or(WorldError::ObjectNotFound(uid))?;
        if object.lifecycle_state == LifecycleState::Dead {
            return Err(WorldError::ObjectNotFound(uid));
        }
        let transform_only = patch.is_transform_only();
        if let Some(t) = patch.transform {
            object.transform = t;
        }
        if let Some(url) = patch.model_url {
            object.model_url = url;
        }
        if let Some(materials) = patch.materials {
            object.materials = materials;
        }
        if let Some(voxels) = patch.voxel_group {
            object.voxel_group = voxels;
        }
        if let Some(content) = patch.content {
            object.content = content;
        }
        if transform_only {
            object.from_remote_transform_dirty = true;
        } else {
            object.from_remote_other_dirty = true;
        }
        self.dirty_objects.insert(uid);
        self.changed_since_last_checkpoint = true;
        Ok(())
    }

    pub fn apply_object_destroy(&mut self, uid: Uid) -> Result<(), WorldError> {
        let object = self
            .objects
            .get_mut(&uid)
            .ok_or(WorldError::ObjectNotFound(uid))?;
        if object.lifecycle_state == LifecycleState::Dead {
            return Err(WorldError::ObjectNotFound(uid));
        }
        if object.lifecycle_state == LifecycleState::JustCreated {
            self.objects_created_and_destroyed.insert(uid);
        }
        object.lifecycle_state = LifecycleState::Dead;
        object.from_remote_other_dirty = true;
        self.dirty_objects.insert(uid);
        self.changed_since_last_checkpoint = true;
        Ok(())
    }

    /// Drains the dirty-object set. The per-entity boolean flags are
    /// cleared by the tick loop once it has actually emitted the
    /// corresponding packet, see `crate::tick`.
    pub fn drain_dirty_objects(&mut self) -> Vec<Uid> {
        self.dirty_objects.drain().collect()
    }

    pub fn take_created_and_destroyed_object(&mut self, uid: Uid) -> bool {
        self.objects_created_and_destroyed.remove(&uid)
    }

    pub fn remove_dead_object(&mut self, uid: Uid) {
        self.objects.remove(&uid);
    }

    // ---- Avatars (mirrors the object pattern above) ----

    pub fn apply_avatar_create(
        &mut self,
        user_id: UserId,
        name: String,
        model_url: String,
        pos: world_common::geom::Vec3<f64>,
        rotation: Rotation,
    ) -> Uid {
        let uid = Uid::from_raw(self.uid_alloc.alloc());
        let avatar = Avatar {
            uid,
            user_id,
            name,
            model_url,
            pos,
            rotation,
            selected_object_uid: Uid::INVALID,
            other_dirty: true,
            transform_dirty: false,
            lifecycle_state: LifecycleState::JustCreated,
            last_activity: now_secs(),
        };
        self.avatars.insert(uid, avatar);
        self.dirty_avatars.insert(uid);
        uid
    }

    pub fn apply_avatar_update(&mut self, uid: Uid, patch: AvatarPatch) -> Result<(), WorldError> {
        let avatar = self
            .avatars
            .get_mut(&uid)
            .ok_or(WorldError::AvatarNotFound(uid))?;
        if avatar.lifecycle_state == LifecycleState::Dead {
            return Err(WorldError::AvatarNotFound(uid));
        }
        let transform_only = patch.is_transform_only();
        if let Some(pos) = patch.pos {
            avatar.pos = pos;
        }
        if let Some(rotation) = patch.rotation {
            avatar.rotation = rotation;
        }
        if let Some(selected) = patch.selected_object_uid {
            avatar.selected_object_uid = selected;
        }
        if transform_only {
            avatar.transform_dirty = true;
        } else {
            avatar.other_dirty = true;
        }
        avatar.last_activity = now_secs();
        self.dirty_avatars.insert(uid);
        Ok(())
    }

    pub fn apply_avatar_destroy(&mut self, uid: Uid) -> Result<(), WorldError> {
        let avatar = self
            .avatars
            .get_mut(&uid)
            .ok_or(WorldError::AvatarNotFound(uid))?;
        if avatar.lifecycle_state == LifecycleState::Dead {
            return Err(WorldError::AvatarNotFound(uid));
        }
        if avatar.lifecycle_state == LifecycleState::JustCreated {
            self.avatars_created_and_destroyed.insert(uid);
        }
        avatar.lifecycle_state = LifecycleState::Dead;
        avatar.other_dirty = true;
        self.dirty_avatars.insert(uid);
        Ok(())
    }

    pub fn drain_dirty_avatars(&mut self) -> Vec<Uid> {
        self.dirty_avatars.drain().collect()
    }

    pub fn take_created_and_destroyed_avatar(&mut self, uid: Uid) -> bool {
        self.avatars_created_and_destroyed.remove(&uid)
    }

    pub fn remove_dead_avatar(&mut self, uid: Uid) {
        self.avatars.remove(&uid);
    }

    pub fn touch_avatar_activity(&mut self, uid: Uid) {
        if let Some(avatar) = self.avatars.get_mut(&uid) {
            avatar.last_activity = now_secs();
        }
    }

    // ---- Parcels ----

    pub fn apply_parcel_create(&mut self, mut parcel: Parcel) -> ParcelId {
        let id = ParcelId::from_raw(self.parcel_id_alloc.alloc());
        parcel.id = id;
        parcel.lifecycle_state = LifecycleState::JustCreated;
        self.parcels.insert(id, parcel);
        self.dirty_parcels.insert(id);
        self.changed_since_last_checkpoint = true;
        id
    }

    pub fn apply_parcel_destroy(&mut self, id: ParcelId) -> Result<(), WorldError> {
        let parcel = self
            .parcels
            .get_mut(&id)
            .ok_or(WorldError::ParcelNotFound(id))?;
        if parcel.lifecycle_state == LifecycleState::Dead {
            return Err(WorldError::ParcelNotFound(id));
        }
        if parcel.lifecycle_state == LifecycleState::JustCreated {
            self.parcels_created_and_destroyed.insert(id);
        }
        parcel.lifecycle_state = LifecycleState::Dead;
        self.dirty_parcels.insert(id);
        self.changed_since_last_checkpoint = true;
        Ok(())
    }

    pub fn drain_dirty_parcels(&mut self) -> Vec<ParcelId> {
        self.dirty_parcels.drain().collect()
    }

    pub fn take_created_and_destroyed_parcel(&mut self, id: ParcelId) -> bool {
        self.parcels_created_and_destroyed.remove(&id)
    }

    pub fn remove_dead_parcel(&mut self, id: ParcelId) {
        self.parcels.remove(&id);
    }

    // ---- Permissions ----

    /// An object may be mutated by its owner, by an admin/writer of a
    /// parcel whose footprint contains it, or by anyone if that parcel is
    /// `all_writeable`. This is the single rule both direct object edits
    /// and parcel-mediated edits go through.
    pub fn check_object_mutation_permission(
        &self,
        uid: Uid,
        user: UserId,
    ) -> Result<(), SessionError> {
        let object = self
            .objects
            .get(&uid)
            .filter(|o| o.lifecycle_state != LifecycleState::Dead)
            .ok_or(WorldError::ObjectNotFound(uid))?;
        if object.owner_user_id == user {
            return Ok(());
        }
        let ground_pos = Vec2::new(object.transform.pos.x, object.transform.pos.y);
        let governing_parcel = self.parcels.values().find(|p| {
            p.lifecycle_state != LifecycleState::Dead && p.contains_point(ground_pos)
        });
        match governing_parcel {
            Some(parcel) if parcel.can_write(user) => Ok(()),
            _ => Err(SessionError::PermissionDenied),
        }
    }

    /// The `*Created` packets a newly-subscribed session needs to catch up
    /// on everything already `Alive`: the tick loop only ever broadcasts
    /// entities that are *currently dirty*, so without this a session
    /// connecting after the world has settled would see nothing until the
    /// next mutation (spec §2/§4.E's subscribe contract, scenario S4).
    /// `exclude_avatar` is the subscriber's own just-created avatar, which
    /// it already knows about from the auth response and will otherwise
    /// learn about redundantly via the normal dirty-avatar broadcast.
    pub fn alive_snapshot_packets(&self, exclude_avatar: Uid) -> Vec<Clientbound> {
        let mut packets = Vec::new();
        for object in self.objects.values() {
            if object.lifecycle_state == LifecycleState::Alive {
                packets.push(Clientbound::ObjectCreated(object.clone()));
            }
        }
        for avatar in self.avatars.values() {
            if avatar.lifecycle_state == LifecycleState::Alive && avatar.uid != exclude_avatar {
                packets.push(Clientbound::AvatarCreated {
                    uid: avatar.uid,
                    name: avatar.name.clone(),
                    model_url: avatar.model_url.clone(),
                    pos: avatar.pos,
                    rotation: avatar.rotation,
                });
            }
        }
        for parcel in self.parcels.values() {
            if parcel.lifecycle_state == LifecycleState::Alive {
                packets.push(Clientbound::ParcelCreated(parcel.clone()));
            }
        }
        packets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use world_common::geom::Vec3;
    use world_common::model::{ObjectType, Transform};

    fn sample_create(owner: UserId) -> ObjectCreateRequest {
        ObjectCreateRequest {
            uid_hint: None,
            owner_user_id: owner,
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
    fn create_marks_dirty_and_just_created() {
        let mut world = World::new();
        let owner = UserId::from_raw(1);
        let uid = world.apply_object_create(sample_create(owner)).unwrap();
        assert_eq!(world.objects[&uid].lifecycle_state, LifecycleState::JustCreated);
        assert_eq!(world.drain_dirty_objects(), vec![uid]);
        assert!(world.drain_dirty_objects().is_empty());
    }

    #[test]
    fn destroy_unknown_uid_is_not_found() {
        let mut world = World::new();
        let err = world.apply_object_destroy(Uid::from_raw(999));
        assert!(matches!(err, Err(WorldError::ObjectNotFound(_))));
    }

    #[test]
    fn destroy_dead_object_is_not_found_not_resurrected() {
        let mut world = World::new();
        let owner = UserId::from_raw(1);
        let uid = world.apply_object_create(sample_create(owner)).unwrap();
        world.apply_object_destroy(uid).unwrap();
        let err = world.apply_object_update(
            uid,
            ObjectPatch {
                content: Some("x".into()),
                ..Default::default()
            },
        );
        assert!(matches!(err, Err(WorldError::ObjectNotFound(_))));
    }

    #[test]
    fn create_then_destroy_same_tick_is_tracked() {
        let mut world = World::new();
        let owner = UserId::from_raw(1);
        let uid = world.apply_object_create(sample_create(owner)).unwrap();
        world.apply_object_destroy(uid).unwrap();
        assert!(world.take_created_and_destroyed_object(uid));
        assert!(!world.take_created_and_destroyed_object(uid));
    }

    #[test]
    fn ingestion_supplied_uid_collision_fails() {
        let mut world = World::new();
        let owner = UserId::from_raw(1);
        let mut req = sample_create(owner);
        req.uid_hint = Some(42);
        world.apply_object_create(req.clone()).unwrap();
        let err = world.apply_object_create(req);
        assert!(matches!(err, Err(WorldError::AlreadyExists(_))));
    }

    #[test]
    fn owner_can_mutate_without_parcel() {
        let mut world = World::new();
        let owner = UserId::from_raw(1);
        let uid = world.apply_object_create(sample_create(owner)).unwrap();
        assert!(world.check_object_mutation_permission(uid, owner).is_ok());
    }

    #[test]
    fn non_owner_without_parcel_role_is_denied() {
        let mut world = World::new();
        let owner = UserId::from_raw(1);
        let stranger = UserId::from_raw(2);
        let uid = world.apply_object_create(sample_create(owner)).unwrap();
        let err = world.check_object_mutation_permission(uid, stranger);
        assert!(matches!(err, Err(SessionError::PermissionDenied)));
    }

    #[test]
    fn all_writeable_parcel_grants_any_user() {
        let mut world = World::new();
        let owner = UserId::from_raw(1);
        let stranger = UserId::from_raw(2);
        let uid = world.apply_object_create(sample_create(owner)).unwrap();
        let parcel = Parcel {
            id: ParcelId::INVALID,
            owner_user_id: owner,
            admin_user_ids: vec![],
            writer_user_ids: vec![],
            all_writeable: true,
            verts: [
                Vec2::new(-10.0, -10.0),
                Vec2::new(10.0, -10.0),
                Vec2::new(10.0, 10.0),
                Vec2::new(-10.0, 10.0),
            ],
            zbounds: (-5.0, 5.0),
            created_time: 0.0,
            description: String::new(),
            lifecycle_state: LifecycleState::Alive,
        };
        world.seed_parcel(parcel);
        assert!(world.check_object_mutation_permission(uid, stranger).is_ok());
    }

    #[test]
    fn alive_snapshot_excludes_just_created_and_dead() {
        let mut world = World::new();
        let owner = UserId::from_raw(1);
        let alive_uid = world.apply_object_create(sample_create(owner)).unwrap();
        world.drain_dirty_objects(); // settles alive_uid into Alive

        let just_created_uid = world.apply_object_create(sample_create(owner)).unwrap();

        let dead_uid = world.apply_object_create(sample_create(owner)).unwrap();
        world.drain_dirty_objects();
        world.apply_object_destroy(dead_uid).unwrap();

        let avatar = world.apply_avatar_create(
            owner,
            "a".into(),
            String::new(),
            Vec3::new(0.0, 0.0, 0.0),
            Rotation::default(),
        );

        let packets = world.alive_snapshot_packets(avatar);
        let alive_uids: Vec<Uid> = packets
            .iter()
            .filter_map(|p| match p {
                Clientbound::ObjectCreated(o) => Some(o.uid),
                _ => None,
            })
            .collect();
        assert_eq!(alive_uids, vec![alive_uid]);
        assert!(alive_uids.iter().all(|u| *u != just_created_uid && *u != dead_uid));
    }
}
