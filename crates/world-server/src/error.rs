//! Closed error taxonomies (`WorldError`, `SessionError`). Top-level
//! startup/runtime failures are reported with `eyre`/`color-eyre` from
//! `main`; these two enums cover the fallible operations library code
//! actually needs to branch on.

use world_common::wire::WireErrorKind;
use world_common::{ParcelId, Uid};

#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("object {0} not found")]
    ObjectNotFound(Uid),
    #[error("avatar {0} not found")]
    AvatarNotFound(Uid),
    #[error("parcel {0} not found")]
    ParcelNotFound(ParcelId),
    #[error("uid {0} already exists")]
    AlreadyExists(Uid),
}

/// Errors a session task can hit while servicing one client connection.
/// Every variant maps to a point in the session state machine; see
/// [`SessionError::wire_kind`] for which ones get an `ErrorMessage` packet
/// before the connection closes.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Malformed(#[from] world_common::wire::WireError),
    #[error("protocol version mismatch: {0}")]
    ProtocolVersionMismatch(String),
    #[error("authentication failed")]
    AuthFailed,
    #[error("permission denied")]
    PermissionDenied,
    #[error(transparent)]
    NotFound(#[from] WorldError),
    #[error("outbound queue overloaded")]
    Overloaded,
    #[error("idle timeout")]
    IdleTimeout,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("shutdown requested")]
    ShutdownRequested,
}

impl SessionError {
    /// The client-visible error kind to send before closing, if any.
    /// `Io`/`ShutdownRequested` have no well-formed socket to write to (or
    /// nothing useful to say) and are handled by just closing.
    pub fn wire_kind(&self) -> Option<WireErrorKind> {
        match self {
            SessionError::Malformed(_) => Some(WireErrorKind::Malformed),
            SessionError::ProtocolVersionMismatch(_) => {
                Some(WireErrorKind::ProtocolVersionMismatch)
            }
            SessionError::AuthFailed => Some(WireErrorKind::AuthFailed),
            SessionError::PermissionDenied => Some(WireErrorKind::PermissionDenied),
            SessionError::NotFound(_) => Some(WireErrorKind::NotFound),
            SessionError::Overloaded => Some(WireErrorKind::Overloaded),
            SessionError::IdleTimeout => Some(WireErrorKind::IdleTimeout),
            SessionError::Io(_) | SessionError::ShutdownRequested => None,
        }
    }
}
