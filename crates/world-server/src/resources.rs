//! Resource registry: maps content URLs to local file paths
//! and tracks upload/presence state. Deliberately its own `dashmap::DashMap`
//! rather than living inside `World`'s mutex, so it stays independently
//! lockable and finer-grained than the coarse world mutex, the same way
//! `crates/replicate/server/src/instance/manager.rs` keeps its own
//! `InstanceManager` state in a `DashMap` independent of any other lock.

use std::path::{Path, PathBuf};

use dashmap::DashMap;

use world_common::ids::UserId;
use world_common::model::{Resource, ResourceState};

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("resource {0} not found")]
    NotFound(String),
    #[error("resource {0} is not present (transfer not yet complete)")]
    NotPresent(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Thread-safe `url -> Resource` map plus the directory it stores blobs
/// under. `path_for_url` is pure/deterministic: the URL is already assumed
/// to be content-addressed, so hashing isn't needed and the local path is
/// just the directory joined with the URL, sanitized to a single path
/// component.
#[derive(Debug)]
pub struct ResourceRegistry {
    resources: DashMap<String, Resource>,
    resource_dir: PathBuf,
}

impl ResourceRegistry {
    pub fn new(resource_dir: PathBuf) -> Self {
        Self {
            resources: DashMap::new(),
            resource_dir,
        }
    }

    pub fn load_from_snapshot(resource_dir: PathBuf, resources: Vec<Resource>) -> Self {
        let registry = Self::new(resource_dir);
        for resource in resources {
            registry.resources.insert(resource.url.clone(), resource);
        }
        registry
    }

    pub fn snapshot(&self) -> Vec<Resource> {
        self.resources.iter().map(|r| r.value().clone()).collect()
    }

    /// Deterministic local path for a content URL; collision-free as long
    /// as the URL is itself content-addressed.
    pub fn path_for_url(&self, url: &str) -> PathBuf {
        let sanitized: String = url
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.resource_dir.join(sanitized)
    }

    pub fn get(&self, url: &str) -> Option<Resource> {
        self.resources.get(url).map(|r| r.value().clone())
    }

    /// Registers an upload in progress; idempotent, an upsert into the
    /// registry rather than an insert-or-fail.
    pub fn begin_transfer(&self, url: &str, owner_user_id: UserId) {
        self.resources
            .entry(url.to_string())
            .and_modify(|r| r.state = ResourceState::Transferring)
            .or_insert_with(|| Resource {
                url: url.to_string(),
                local_path: self.path_for_url(url).to_string_lossy().into_owned(),
                owner_user_id,
                state: ResourceState::Transferring,
            });
    }

    /// Idempotent: copying the same local file to the same URL's resource
    /// path twice just overwrites the destination and leaves state
    /// `Present`.
    pub fn copy_local_file_to_resource_dir(
        &self,
        local_path: &Path,
        url: &str,
        owner_user_id: UserId,
    ) -> Result<(), ResourceError> {
        let dest = self.path_for_url(url);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(local_path, &dest)?;
        self.resources.insert(
            url.to_string(),
            Resource {
                url: url.to_string(),
                local_path: dest.to_string_lossy().into_owned(),
                owner_user_id,
                state: ResourceState::Present,
            },
        );
        Ok(())
    }

    /// Marks a transfer as failed, reverting the resource from
    /// `Transferring` back to `NotPresent`.
    pub fn fail_transfer(&self, url: &str) {
        if let Some(mut entry) = self.resources.get_mut(url) {
            entry.state = ResourceState::NotPresent;
        }
    }

    /// Download requests only succeed for `Present` resources.
    pub fn request_download(&self, url: &str) -> Result<PathBuf, ResourceError> {
        let resource = self
            .resources
            .get(url)
            .ok_or_else(|| ResourceError::NotFound(url.to_string()))?;
        if resource.state != ResourceState::Present {
            return Err(ResourceError::NotPresent(url.to_string()));
        }
        Ok(PathBuf::from(&resource.local_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_for_url_is_deterministic() {
        let registry = ResourceRegistry::new(PathBuf::from("/tmp/resources"));
        assert_eq!(
            registry.path_for_url("abc123"),
            registry.path_for_url("abc123")
        );
    }

    #[test]
    fn download_fails_until_present() {
        let registry = ResourceRegistry::new(PathBuf::from("/tmp/resources"));
        registry.begin_transfer("abc123", UserId::from_raw(1));
        assert!(matches!(
            registry.request_download("abc123"),
            Err(ResourceError::NotPresent(_))
        ));
    }

    #[test]
    fn unknown_url_download_not_found() {
        let registry = ResourceRegistry::new(PathBuf::from("/tmp/resources"));
        assert!(matches!(
            registry.request_download("nope"),
            Err(ResourceError::NotFound(_))
        ));
    }

    #[test]
    fn failed_transfer_reverts_to_not_present() {
        let registry = ResourceRegistry::new(PathBuf::from("/tmp/resources"));
        registry.begin_transfer("abc123", UserId::from_raw(1));
        registry.fail_transfer("abc123");
        assert_eq!(registry.get("abc123").unwrap().state, ResourceState::NotPresent);
    }
}
