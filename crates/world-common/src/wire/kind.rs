//! The `u32` message-kind tags from spec §4.A's table. Kept as plain
//! constants (rather than a derive-friendly enum-with-discriminant) because
//! serverbound and clientbound kinds share the same numeric space in the
//! original protocol table and we decode the direction-appropriate enum
//! separately in `messages.rs`.

pub(crate) mod sb {
    pub const HELLO_REQUEST: u32 = 0;
    pub const AUTH_REQUEST: u32 = 1;
    pub const OBJECT_CREATE_REQUEST: u32 = 2;
    pub const OBJECT_UPDATE_REQUEST: u32 = 3;
    pub const OBJECT_DESTROY_REQUEST: u32 = 4;
    pub const AVATAR_UPDATE_REQUEST: u32 = 5;
    pub const KEEPALIVE: u32 = 6;
}

pub(crate) mod cb {
    pub const HELLO_RESPONSE: u32 = 0;
    pub const AUTH_RESPONSE: u32 = 1;
    pub const ERROR_MESSAGE: u32 = 2;
    pub const OBJECT_CREATED: u32 = 3;
    pub const OBJECT_FULL_UPDATE: u32 = 4;
    pub const OBJECT_TRANSFORM_UPDATE: u32 = 5;
    pub const OBJECT_DESTROYED: u32 = 6;
    pub const AVATAR_CREATED: u32 = 7;
    pub const AVATAR_FULL_UPDATE: u32 = 8;
    pub const AVATAR_TRANSFORM_UPDATE: u32 = 9;
    pub const AVATAR_DESTROYED: u32 = 10;
    pub const PARCEL_CREATED: u32 = 11;
    pub const PARCEL_FULL_UPDATE: u32 = 12;
    pub const PARCEL_DESTROYED: u32 = 13;
    pub const TIME_SYNC: u32 = 14;
}

/// Magic number expected at the start of the handshake (spec §4.E
/// `AwaitingHello`).
pub const HELLO_MAGIC: u32 = 0x5753_5256; // "WSRV" in ASCII, read little-endian
pub const PROTOCOL_VERSION: u32 = 1;
