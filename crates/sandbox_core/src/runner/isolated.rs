use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::warn;

use crate::error::CoreError;
use crate::types::{RunOutcome, SandboxProfile};

use super::direct::run_command;
use super::Runner;

/// Runs the child chrooted into an overlay-mounted workspace and attached to
/// a per-request cgroup.
///
/// This gives the child its own filesystem view (via `chroot`, inside its
/// own mount namespace so it can't alter the host's mount table) and lets
/// the host enforce resource limits by cgroup membership. It does **not**
/// reproduce a full OCI container: there is no PID, network, user, or UTS
/// namespace, and no `pivot_root` — `chroot` is weaker than `pivot_root`
/// (a process with `CAP_SYS_ADMIN` can in principle escape it) but it is a
/// real, functioning isolation primitive rather than a no-op, which is what
/// this runner had before. See `DESIGN.md` for the scope decision.
///
/// Every acquired resource (overlay mount, `-work` scratch dir, cgroup leaf)
/// is torn down in strict LIFO order on every exit path, including partial
/// setup failure — see [`ContainerGuard`].
pub struct IsolatedRunner {
    profile: SandboxProfile,
    max_output_bytes: usize,
}

impl IsolatedRunner {
    pub fn new(profile: SandboxProfile) -> Self {
        Self {
            profile,
            max_output_bytes: 1024 * 1024,
        }
    }
}

/// Holds the resources acquired for one isolated invocation and releases them
/// in reverse acquisition order when dropped, regardless of how the guard's
/// scope is exited.
struct ContainerGuard {
    id: String,
    upperdir: PathBuf,
    workdir_scratch: PathBuf,
    cgroup_dir: PathBuf,
    mounted: bool,
}

impl ContainerGuard {
    fn acquire(profile: &SandboxProfile, workdir: &Path) -> Result<Self, CoreError> {
        let id = workdir
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| CoreError::SandboxSetup {
                reason: "workspace path has no final segment".into(),
            })?
            .to_string();

        let upperdir = workdir.to_path_buf();
        let scratch = PathBuf::from(format!("{}-work", workdir.display()));
        std::fs::create_dir_all(&scratch).map_err(|source| CoreError::WorkspaceCreate {
            root: scratch.clone(),
            source,
        })?;

        mount_overlay(&profile.rootfs, &upperdir, &scratch)?;

        let cgroup_dir = match create_cgroup(&profile.cgroup_parent, &id) {
            Ok(dir) => dir,
            Err(err) => {
                let _ = unmount_overlay(&upperdir);
                let _ = std::fs::remove_dir_all(&scratch);
                return Err(err);
            }
        };

        Ok(Self {
            id,
            upperdir,
            workdir_scratch: scratch,
            cgroup_dir,
            mounted: true,
        })
    }

    fn container_id(&self) -> &str {
        &self.id
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if let Err(err) = remove_cgroup(&self.cgroup_dir) {
            warn!(container_id = %self.id, "failed to remove cgroup: {err}");
        }
        if self.mounted {
            if let Err(err) = unmount_overlay(&self.upperdir) {
                warn!(container_id = %self.id, "failed to unmount overlay: {err}");
            }
        }
        if let Err(err) = std::fs::remove_dir_all(&self.workdir_scratch) {
            warn!(container_id = %self.id, "failed to remove scratch dir: {err}");
        }
    }
}

#[cfg(target_os = "linux")]
fn mount_overlay(rootfs: &Path, upperdir: &Path, workdir: &Path) -> Result<(), CoreError> {
    use nix::mount::{mount, MsFlags};
    let opts = format!(
        "lowerdir={},upperdir={},workdir={}",
        rootfs.display(),
        upperdir.display(),
        workdir.display()
    );
    mount(
        Some("overlay"),
        upperdir,
        Some("overlay"),
        MsFlags::empty(),
        Some(opts.as_str()),
    )
    .map_err(|errno| CoreError::SandboxSetup {
        reason: format!("overlay mount failed: {errno}"),
    })
}

#[cfg(target_os = "linux")]
fn unmount_overlay(upperdir: &Path) -> Result<(), CoreError> {
    use nix::mount::{umount, MntFlags};
    umount(upperdir)
        .or_else(|_| nix::mount::umount2(upperdir, MntFlags::MNT_DETACH))
        .map_err(|errno| CoreError::SandboxSetup {
            reason: format!("overlay unmount failed: {errno}"),
        })
}

#[cfg(not(target_os = "linux"))]
fn mount_overlay(_rootfs: &Path, _upperdir: &Path, _workdir: &Path) -> Result<(), CoreError> {
    Err(CoreError::SandboxSetup {
        reason: "overlay sandboxing is only implemented on linux".into(),
    })
}

#[cfg(not(target_os = "linux"))]
fn unmount_overlay(_upperdir: &Path) -> Result<(), CoreError> {
    Ok(())
}

/// Creates the per-request cgroup leaf directory. On cgroup v2, a plain
/// `mkdir` under the delegated parent is enough — the kernel populates
/// `cgroup.procs` and the controller files automatically.
#[cfg(target_os = "linux")]
fn create_cgroup(parent: &str, id: &str) -> Result<PathBuf, CoreError> {
    let dir = PathBuf::from(format!("{parent}/{id}"));
    std::fs::create_dir_all(&dir).map_err(|source| CoreError::SandboxSetup {
        reason: format!("failed to create cgroup `{}`: {source}", dir.display()),
    })?;
    Ok(dir)
}

#[cfg(target_os = "linux")]
fn attach_cgroup(dir: &Path, pid: u32) -> Result<(), CoreError> {
    let procs = dir.join("cgroup.procs");
    std::fs::write(&procs, pid.to_string()).map_err(|source| CoreError::SandboxSetup {
        reason: format!("failed to attach pid {pid} to `{}`: {source}", procs.display()),
    })
}

#[cfg(target_os = "linux")]
fn remove_cgroup(dir: &Path) -> std::io::Result<()> {
    // Fails harmlessly if the kernel hasn't finished reaping the last
    // process out of the cgroup yet; the caller only logs a warning.
    std::fs::remove_dir(dir)
}

#[cfg(not(target_os = "linux"))]
fn create_cgroup(_parent: &str, _id: &str) -> Result<PathBuf, CoreError> {
    Err(CoreError::SandboxSetup {
        reason: "cgroup sandboxing is only implemented on linux".into(),
    })
}

#[cfg(not(target_os = "linux"))]
fn attach_cgroup(_dir: &Path, _pid: u32) -> Result<(), CoreError> {
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn remove_cgroup(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl Runner for IsolatedRunner {
    async fn run(
        &self,
        name: &str,
        args: &[String],
        workdir: &Path,
        stdin: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<RunOutcome, CoreError> {
        let start = Instant::now();
        let guard = ContainerGuard::acquire(&self.profile, workdir)?;

        let timeout_secs = timeout.as_secs().max(1);
        let mut wrapped_args = vec!["-k".to_string(), "1".to_string(), timeout_secs.to_string(), name.to_string()];
        wrapped_args.extend(args.iter().cloned());

        let root = CString::new(path_bytes(&guard.upperdir)).map_err(|_| CoreError::SandboxSetup {
            reason: "workspace path contains a NUL byte".into(),
        })?;

        let mut command = Command::new("timeout");
        command
            .args(&wrapped_args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        #[cfg(target_os = "linux")]
        unsafe {
            use std::os::unix::process::CommandExt;
            command.pre_exec(move || {
                if libc::setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                // Give this child its own mount namespace so chroot can't be
                // undone and no mount it makes afterward leaks to the host.
                if libc::unshare(libc::CLONE_NEWNS) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                if libc::chroot(root.as_ptr()) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                if libc::chdir(c"/".as_ptr()) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let cgroup_dir = guard.cgroup_dir.clone();
        let container_id = guard.container_id().to_string();
        let on_spawn: Option<Box<dyn FnOnce(u32) -> Result<(), CoreError> + Send>> =
            Some(Box::new(move |pid| attach_cgroup(&cgroup_dir, pid)));

        tracing::debug!(container_id = %container_id, "isolated run starting");

        let mut outcome = run_command(
            command,
            Path::new("timeout"),
            stdin,
            self.max_output_bytes,
            timeout + Duration::from_secs(2),
            on_spawn,
        )
        .await?;

        // `timeout` exits 124 when it had to kill the child; fold that into
        // the same timed_out signal the direct runner produces natively.
        if outcome.exit_code == Some(124) {
            outcome.timed_out = true;
        }
        outcome.duration = start.elapsed();
        Ok(outcome)
    }
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}
