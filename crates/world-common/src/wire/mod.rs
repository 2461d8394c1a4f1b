mod codec;
pub(crate) mod entity_codec;
mod error;
mod kind;
mod messages;
pub(crate) mod reader;
pub(crate) mod writer;

pub use codec::WireCodec;
pub use error::{Malformed, ReadErr, WireError};
pub use kind::{HELLO_MAGIC, PROTOCOL_VERSION};
pub use messages::{
    AvatarPatchWire, Clientbound, ObjectCreateFields, ObjectPatchWire, Serverbound, WireErrorKind,
};
