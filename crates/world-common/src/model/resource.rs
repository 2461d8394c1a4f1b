use crate::ids::UserId;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ResourceState {
    NotPresent,
    Transferring,
    Present,
}

impl ResourceState {
    pub(crate) fn to_wire(self) -> u32 {
        match self {
            ResourceState::NotPresent => 0,
            ResourceState::Transferring => 1,
            ResourceState::Present => 2,
        }
    }

    pub(crate) fn from_wire(v: u32) -> Option<Self> {
        match v {
            0 => Some(ResourceState::NotPresent),
            1 => Some(ResourceState::Transferring),
            2 => Some(ResourceState::Present),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub url: String,
    pub local_path: String,
    pub owner_user_id: UserId,
    pub state: ResourceState,
}
