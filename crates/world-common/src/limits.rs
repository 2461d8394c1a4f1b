//! Per-field maximums enforced by the wire decoder (spec §4.A contract:
//! "decoders must fail with `Malformed` when a string length exceeds a
//! per-field maximum").

pub const MAX_URL_LEN: u32 = 20_000;
pub const MAX_NAME_LEN: u32 = 10_000;
pub const MAX_CONTENT_LEN: u32 = 20_000;
pub const MAX_DESCRIPTION_LEN: u32 = 10_000;
pub const MAX_PASSWORD_LEN: u32 = 1_000;
pub const MAX_EMAIL_LEN: u32 = 1_000;
pub const MAX_ERROR_REASON_LEN: u32 = 2_000;

pub const MAX_MATERIALS: u32 = 4_096;
pub const MAX_VOXELS: u32 = 1_000_000;
pub const MAX_ROLE_USERS: u32 = 10_000;

/// Largest voice payload accepted; generous bound against memory abuse since
/// the server never interprets the payload.
pub const MAX_VOICE_PAYLOAD_LEN: usize = 4_096;
