//! Durable checkpoint store: snapshot-only, no journal. Writes
//! the whole world to a temp file then renames it over the canonical path
//! so a crash mid-write never corrupts the previous good snapshot. Loads
//! on startup; a missing file yields an empty world plus bootstrap parcels
//!.

use std::path::{Path, PathBuf};

use world_common::snapshot::{self, WorldSnapshot};
use world_common::wire::WireError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot was malformed: {0}")]
    Malformed(#[from] WireError),
}

/// Owns the path to `server_state.bin`.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join("server_state.bin"),
        }
    }

    /// `None` means no snapshot file exists yet, so the caller should start
    /// from an empty world.
    pub async fn load(&self) -> Result<Option<WorldSnapshot>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(snapshot::decode(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes `snapshot` to a sibling `.tmp` file and atomically renames it
    /// over the canonical path, so a crash mid-write never corrupts the
    /// previous good snapshot. Callers (the tick loop) are responsible for
    /// not clearing `changed_since_last_checkpoint` on failure.
    pub async fn save(&self, snapshot: &WorldSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = self.path.with_extension("bin.tmp");
        let bytes = snapshot::encode(snapshot);
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use world_common::model::{LifecycleState, User};

    fn sample_snapshot() -> WorldSnapshot {
        WorldSnapshot {
            uid_high_water: 5,
            parcel_id_high_water: 1,
            user_id_high_water: 1,
            users: vec![User {
                id: world_common::ids::UserId::from_raw(1),
                name: "alice".into(),
                password_hash_with_salt: world_common::model::PasswordHash::new("pw", [1u8; 16]),
                email: "alice@example.com".into(),
                created_time: 1.0,
            }],
            objects: vec![],
            parcels: vec![],
            resources: vec![],
        }
    }

    #[tokio::test]
    async fn load_missing_file_returns_none() {
        let dir = tempdir();
        let store = SnapshotStore::new(dir.path());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempdir();
        let store = SnapshotStore::new(dir.path());
        let snap = sample_snapshot();
        store.save(&snap).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, snap);
    }

    #[tokio::test]
    async fn save_leaves_no_tmp_file_behind() {
        let dir = tempdir();
        let store = SnapshotStore::new(dir.path());
        store.save(&sample_snapshot()).await.unwrap();
        let tmp = store.path.with_extension("bin.tmp");
        assert!(!tmp.exists());
    }

    #[tokio::test]
    async fn malformed_snapshot_file_is_rejected() {
        let dir = tempdir();
        let store = SnapshotStore::new(dir.path());
        tokio::fs::write(&store.path, b"not a snapshot").await.unwrap();
        assert!(matches!(store.load().await, Err(StoreError::Malformed(_))));
    }

    fn tempdir() -> TempDir {
        TempDir::new()
    }

    /// Minimal scoped-temp-directory helper: `replicate-server` doesn't pull
    /// in `tempfile`, and this module's needs are small enough not to
    /// justify adding the dependency.
    struct TempDir(PathBuf);

    impl TempDir {
        fn new() -> Self {
            let mut path = std::env::temp_dir();
            let unique = format!(
                "world-server-test-{}-{}",
                std::process::id(),
                std::ptr::addr_of!(path) as usize
            );
            path.push(unique);
            std::fs::create_dir_all(&path).unwrap();
            Self(path)
        }

        fn path(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }
}
