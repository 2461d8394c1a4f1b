mod avatar;
mod lifecycle;
mod object;
mod parcel;
mod resource;
mod user;

pub use avatar::{Avatar, AvatarPatch, Rotation};
pub use lifecycle::LifecycleState;
pub use object::{Material, Object, ObjectPatch, ObjectType, TexMatrix, Transform, Voxel};
pub use parcel::Parcel;
pub use resource::{Resource, ResourceState};
pub use user::{PasswordHash, User};
