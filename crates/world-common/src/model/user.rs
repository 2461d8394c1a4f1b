use crate::ids::UserId;

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub password_hash_with_salt: PasswordHash,
    pub email: String,
    pub created_time: f64,
}

/// A salted SHA-256 password hash: `sha256(salt || password)`. `sha2` is
/// already part of this example pack's ecosystem stack (see
/// `valence_network`'s dependency on it for its own auth handshake); we
/// reuse it here rather than hand-rolling a digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    pub salt: [u8; 16],
    pub digest: [u8; 32],
}

impl PasswordHash {
    pub fn new(password: &str, salt: [u8; 16]) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(password.as_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        Self { salt, digest }
    }

    /// Constant-time comparison: always walks every byte of both digests
    /// regardless of where they first differ, so password verification
    /// timing doesn't leak how many leading bytes matched.
    pub fn verify(&self, password: &str) -> bool {
        let candidate = Self::new(password, self.salt);
        let mut diff = 0u8;
        for (a, b) in self.digest.iter().zip(candidate.digest.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_correct_password_rejects_wrong() {
        let hash = PasswordHash::new("correct horse", [7u8; 16]);
        assert!(hash.verify("correct horse"));
        assert!(!hash.verify("wrong"));
    }

    #[test]
    fn same_password_different_salt_differs() {
        let a = PasswordHash::new("pw", [1u8; 16]);
        let b = PasswordHash::new("pw", [2u8; 16]);
        assert_ne!(a.digest, b.digest);
    }
}
