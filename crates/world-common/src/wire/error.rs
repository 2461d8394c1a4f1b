/// Decode-side failures. `NeedMore` is not a real error: it tells the
/// [`tokio_util::codec::Decoder`] impl that the buffer doesn't yet contain a
/// full frame, and it should return `Ok(None)` without consuming anything.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum ReadErr {
    NeedMore,
    Malformed(Malformed),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum Malformed {
    #[error("string field exceeded maximum length {max} (got {got})")]
    StringTooLong { max: u32, got: u32 },
    #[error("vector field exceeded maximum count {max} (got {got})")]
    VecTooLong { max: u32, got: u32 },
    #[error("string field was not valid utf-8")]
    InvalidUtf8,
    #[error("unknown message kind {0}")]
    UnknownKind(u32),
    #[error("unknown entity type tag {0}")]
    UnknownEntityType(u32),
    #[error("unknown lifecycle state tag {0}")]
    UnknownLifecycleState(u32),
    #[error("unknown resource state tag {0}")]
    UnknownResourceState(u32),
    #[error("snapshot format version {found} is newer than the highest supported version {max_supported}")]
    UnsupportedSnapshotVersion { found: u32, max_supported: u32 },
    #[error("snapshot file had an invalid magic number")]
    BadMagic,
}

/// Top-level wire error surfaced to callers (corresponds to spec §7's
/// `Malformed` error kind for the stream protocol).
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error(transparent)]
    Malformed(#[from] Malformed),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ReadErr> for WireError {
    fn from(e: ReadErr) -> Self {
        match e {
            ReadErr::NeedMore => {
                unreachable!("NeedMore must be intercepted by the Decoder before conversion")
            }
            ReadErr::Malformed(m) => WireError::Malformed(m),
        }
    }
}
