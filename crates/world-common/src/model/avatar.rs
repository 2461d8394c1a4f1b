use crate::geom::Vec3;
use crate::ids::{Uid, UserId};
use crate::model::lifecycle::LifecycleState;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotation {
    pub axis: Vec3<f32>,
    pub angle: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Avatar {
    pub uid: Uid,
    /// The account this session belongs to; used for permission checks
    ///, distinct from the avatar's own [`Uid`].
    pub user_id: UserId,
    pub name: String,
    pub model_url: String,
    pub pos: Vec3<f64>,
    pub rotation: Rotation,
    pub selected_object_uid: Uid,
    pub other_dirty: bool,
    pub transform_dirty: bool,
    pub lifecycle_state: LifecycleState,
    /// Wall-clock seconds (server monotonic clock) the session last
    /// produced traffic; used by the idle-timeout check.
    pub last_activity: f64,
}

#[derive(Debug, Clone, Default)]
pub struct AvatarPatch {
    pub pos: Option<Vec3<f64>>,
    pub rotation: Option<Rotation>,
    pub selected_object_uid: Option<Uid>,
}

impl AvatarPatch {
    pub fn is_transform_only(&self) -> bool {
        (self.pos.is_some() || self.rotation.is_some()) && self.selected_object_uid.is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.pos.is_none() && self.rotation.is_none() && self.selected_object_uid.is_none()
    }
}
