//! Sandbox initializer: probes container support once at startup and either
//! publishes an immutable [`SandboxProfile`] or leaves sandboxing disabled.
//!
//! A failure here is never fatal: the dispatcher falls through to the direct
//! runner unconditionally when no profile was published, matching the
//! original container library's behavior of logging and continuing rather
//! than aborting startup over an unavailable sandbox backend.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::warn;

use crate::types::{MountSpec, SandboxProfile};

static SANDBOX_PROFILE: OnceCell<SandboxProfile> = OnceCell::const_new();

#[derive(Debug, Deserialize)]
struct SandboxConfigFile {
    rootfs: PathBuf,
    cgroup_parent: String,
    #[serde(default)]
    mounts: Vec<MountConfig>,
}

#[derive(Debug, Deserialize)]
struct MountConfig {
    source: PathBuf,
    target: PathBuf,
    #[serde(default)]
    read_only: bool,
}

/// Ensures the container state directory exists, loads `config_path`, and
/// publishes the resulting [`SandboxProfile`] exactly once. Returns `true` if
/// sandboxing is now available.
pub async fn init(state_dir: &Path, config_path: &Path) -> bool {
    match try_init(state_dir, config_path).await {
        Ok(profile) => {
            let _ = SANDBOX_PROFILE.set(profile);
            true
        }
        Err(reason) => {
            warn!(%reason, "sandbox initialization failed, falling back to direct execution");
            false
        }
    }
}

async fn try_init(state_dir: &Path, config_path: &Path) -> Result<SandboxProfile, String> {
    ensure_state_dir(state_dir)
        .await
        .map_err(|e| format!("state dir `{}`: {e}", state_dir.display()))?;

    let raw = tokio::fs::read_to_string(config_path)
        .await
        .map_err(|e| format!("reading `{}`: {e}", config_path.display()))?;
    let parsed: SandboxConfigFile =
        serde_json::from_str(&raw).map_err(|e| format!("parsing `{}`: {e}", config_path.display()))?;

    Ok(SandboxProfile {
        rootfs: parsed.rootfs,
        cgroup_parent: parsed.cgroup_parent,
        mounts: parsed
            .mounts
            .into_iter()
            .map(|m| MountSpec {
                source: m.source,
                target: m.target,
                read_only: m.read_only,
            })
            .collect(),
    })
}

#[cfg(unix)]
async fn ensure_state_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::create_dir_all(path).await?;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700)).await
}

#[cfg(not(unix))]
async fn ensure_state_dir(path: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(path).await
}

/// Returns the published profile, if sandboxing initialized successfully.
pub fn profile() -> Option<&'static SandboxProfile> {
    SANDBOX_PROFILE.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_config_disables_sandbox_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let ok = init(dir.path(), &dir.path().join("does-not-exist.json")).await;
        assert!(!ok);
    }
}
