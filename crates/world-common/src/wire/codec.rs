use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::error::{ReadErr, WireError};
use super::messages::{Clientbound, Serverbound};

/// Frames a raw `TcpStream` into a message-oriented `Stream + Sink` without
/// an outer length prefix: each message is self-delimiting because its kind
/// tag determines how many further fixed/length-prefixed fields follow.
/// Used as `tokio_util::codec::Framed<TcpStream, WireCodec>`.
///
/// A single `WireCodec` implements `Decoder` for the serverbound direction
/// and `Encoder<Clientbound>` for the clientbound direction; the listener
/// side therefore decodes `Serverbound` and encodes `Clientbound`, while a
/// hypothetical client would do the reverse. Client-side is an external
/// collaborator, out of scope here.
#[derive(Debug, Default, Clone, Copy)]
pub struct WireCodec;

impl Decoder for WireCodec {
    type Item = Serverbound;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match Serverbound::decode(src) {
            Ok((msg, consumed)) => {
                src.advance(consumed);
                Ok(Some(msg))
            }
            Err(ReadErr::NeedMore) => Ok(None),
            Err(ReadErr::Malformed(m)) => Err(WireError::Malformed(m)),
        }
    }
}

impl Encoder<Clientbound> for WireCodec {
    type Error = WireError;

    fn encode(&mut self, item: Clientbound, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Uid;

    #[test]
    fn decoder_waits_for_full_frame_before_consuming() {
        let mut codec = WireCodec;
        let msg = Serverbound::ObjectDestroyRequest { uid: Uid::from_raw(9) };
        let mut full = BytesMut::new();
        msg.encode(&mut full);

        let mut partial = BytesMut::from(&full[..full.len() - 2]);
        assert!(codec.decode(&mut partial).unwrap().is_none());
        assert_eq!(partial.len(), full.len() - 2, "partial buffer must be untouched");

        partial.extend_from_slice(&full[full.len() - 2..]);
        let decoded = codec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(decoded, msg);
        assert!(partial.is_empty());
    }

    #[test]
    fn decoder_surfaces_malformed_without_panicking() {
        let mut codec = WireCodec;
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&9999u32.to_le_bytes());
        assert!(codec.decode(&mut buf).is_err());
    }
}
