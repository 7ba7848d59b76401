use std::path::{Path, PathBuf};

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::CoreError;
use crate::types::WorkspaceHandle;

/// Creates and disposes of per-request directories under a data-store root.
///
/// A workspace's id is the final path segment of its directory, and its name
/// always begins with the owning adapter's display name followed by a random
/// suffix, so two concurrent requests for the same language never collide.
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn create(&self, adapter_name: &str) -> Result<WorkspaceHandle, CoreError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| CoreError::WorkspaceCreate {
                root: self.root.clone(),
                source,
            })?;

        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(10)
            .map(char::from)
            .collect();
        let dir_name = format!("{adapter_name}-{suffix}");
        let path = self.root.join(&dir_name);

        tokio::fs::create_dir(&path)
            .await
            .map_err(|source| CoreError::WorkspaceCreate {
                root: path.clone(),
                source,
            })?;
        set_mode_0775(&path).await?;

        let id = path
            .file_name()
            .and_then(|s| s.to_str())
            .expect("just-created path has a final segment")
            .to_string();

        Ok(WorkspaceHandle { id, path })
    }

    pub async fn dispose(&self, handle: &WorkspaceHandle) -> Result<(), CoreError> {
        if !handle.path.starts_with(&self.root) {
            return Err(CoreError::WorkspaceDispose {
                path: handle.path.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "refusing to remove a path outside the data-store root",
                ),
            });
        }
        match tokio::fs::remove_dir_all(&handle.path).await {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CoreError::WorkspaceDispose {
                path: handle.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(unix)]
async fn set_mode_0775(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(0o775);
    tokio::fs::set_permissions(path, perms)
        .await
        .map_err(|source| CoreError::WorkspaceCreate {
            root: path.to_path_buf(),
            source,
        })
}

#[cfg(not(unix))]
async fn set_mode_0775(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_assigns_id_from_final_segment() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let handle = manager.create("c11").await.unwrap();
        assert!(handle.path.starts_with(root.path()));
        assert_eq!(handle.path.file_name().unwrap().to_str().unwrap(), handle.id);
        assert!(handle.id.starts_with("c11-"));
        manager.dispose(&handle).await.unwrap();
        assert!(!handle.path.exists());
    }

    #[tokio::test]
    async fn concurrent_creates_never_collide() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let a = manager.create("bash").await.unwrap();
        let b = manager.create("bash").await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn dispose_refuses_paths_outside_root() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let outside = WorkspaceHandle {
            id: "evil".into(),
            path: PathBuf::from("/etc"),
        };
        assert!(manager.dispose(&outside).await.is_err());
    }
}
