use crate::geom::{Vec3};
use crate::ids::{Uid, UserId};
use crate::model::lifecycle::LifecycleState;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ObjectType {
    Generic,
    VoxelGroup,
    Hypercard,
}

impl ObjectType {
    pub(crate) fn to_wire(self) -> u32 {
        match self {
            ObjectType::Generic => 0,
            ObjectType::VoxelGroup => 1,
            ObjectType::Hypercard => 2,
        }
    }

    pub(crate) fn from_wire(v: u32) -> Option<Self> {
        match v {
            0 => Some(ObjectType::Generic),
            1 => Some(ObjectType::VoxelGroup),
            2 => Some(ObjectType::Hypercard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexMatrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
}

impl Default for TexMatrix {
    fn default() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub colour_rgb: Vec3<f32>,
    pub colour_texture_url: String,
    pub roughness: f32,
    pub metallic: f32,
    pub opacity: f32,
    pub tex_matrix: TexMatrix,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub pos: Vec3<f64>,
    pub axis: Vec3<f32>,
    pub angle: f32,
    pub scale: Vec3<f32>,
}

/// One voxel: a grid position plus an index into [`Object::materials`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voxel {
    pub pos: Vec3<i32>,
    pub material_index: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub uid: Uid,
    pub kind: ObjectType,
    pub owner_user_id: UserId,
    pub created_time: f64,
    pub transform: Transform,
    pub model_url: String,
    pub materials: Vec<Material>,
    pub voxel_group: Option<Vec<Voxel>>,
    pub content: String,
    pub lifecycle_state: LifecycleState,
    pub from_remote_other_dirty: bool,
    pub from_remote_transform_dirty: bool,
}

impl Object {
    /// Invariant 4: materials count equals the highest material index
    /// referenced by voxels (if voxelized) or by the mesh (we don't inspect
    /// mesh contents server-side, so this only validates the voxelized
    /// case, which is the case the server itself can check).
    pub fn materials_cover_voxels(&self) -> bool {
        match &self.voxel_group {
            None => true,
            Some(voxels) => voxels
                .iter()
                .all(|v| (v.material_index as usize) < self.materials.len()),
        }
    }

    /// Convention used by the ingestion adapter to make upserts
    /// idempotent: a stable external id is stashed as a prefix of `content`.
    pub fn external_id_prefix(kind: &str, id: &str) -> String {
        format!("{kind} id: {id}")
    }

    pub fn external_id(&self) -> Option<&str> {
        self.content.split(" id: ").nth(1)
    }
}

/// Fields a client or the ingestion adapter may change via
/// `apply_object_update`. `None` means "leave unchanged".
#[derive(Debug, Clone, Default)]
pub struct ObjectPatch {
    pub transform: Option<Transform>,
    pub model_url: Option<String>,
    pub materials: Option<Vec<Material>>,
    pub voxel_group: Option<Option<Vec<Voxel>>>,
    pub content: Option<String>,
}

impl ObjectPatch {
    /// Invariant 3: a patch that only touches the transform emits a
    /// transform-delta; anything else emits a full update.
    pub fn is_transform_only(&self) -> bool {
        self.transform.is_some()
            && self.model_url.is_none()
            && self.materials.is_none()
            && self.voxel_group.is_none()
            && self.content.is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.transform.is_none()
            && self.model_url.is_none()
            && self.materials.is_none()
            && self.voxel_group.is_none()
            && self.content.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_object() -> Object {
        Object {
            uid: Uid::from_raw(1),
            kind: ObjectType::Generic,
            owner_user_id: UserId::from_raw(1),
            created_time: 0.0,
            transform: Transform {
                pos: Vec3::new(0.0, 0.0, 0.0),
                axis: Vec3::new(0.0, 1.0, 0.0),
                angle: 0.0,
                scale: Vec3::new(1.0, 1.0, 1.0),
            },
            model_url: "m.glb".into(),
            materials: vec![],
            voxel_group: None,
            content: String::new(),
            lifecycle_state: LifecycleState::JustCreated,
            from_remote_other_dirty: true,
            from_remote_transform_dirty: false,
        }
    }

    #[test]
    fn patch_transform_only_detection() {
        let mut patch = ObjectPatch::default();
        assert!(patch.is_empty());
        patch.transform = Some(sample_object().transform);
        assert!(patch.is_transform_only());
        patch.content = Some("hi".into());
        assert!(!patch.is_transform_only());
    }

    #[test]
    fn materials_cover_voxels_checks_index_bound() {
        let mut obj = sample_object();
        obj.voxel_group = Some(vec![Voxel {
            pos: Vec3::new(0, 0, 0),
            material_index: 0,
        }]);
        assert!(!obj.materials_cover_voxels());
        obj.materials.push(Material {
            colour_rgb: Vec3::new(1.0, 1.0, 1.0),
            colour_texture_url: String::new(),
            roughness: 0.5,
            metallic: 0.0,
            opacity: 1.0,
            tex_matrix: TexMatrix::default(),
        });
        assert!(obj.materials_cover_voxels());
    }

    #[test]
    fn external_id_prefix_roundtrips() {
        let prefix = Object::external_id_prefix("cv", "123");
        let mut obj = sample_object();
        obj.content = prefix;
        assert_eq!(obj.external_id(), Some("123"));
    }
}
