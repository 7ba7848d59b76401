use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::CoreError;
use crate::process::{capture_stream, spawn_with_retry};
use crate::types::RunOutcome;

use super::Runner;

/// Runs the child directly on the host, in its own process group so a
/// timeout can be delivered to the whole tree rather than just the immediate
/// child (a shell adapter's `bash -c` would otherwise survive its parent).
pub struct DirectRunner {
    max_output_bytes: usize,
}

impl DirectRunner {
    pub fn new(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }
}

impl Default for DirectRunner {
    fn default() -> Self {
        Self::new(1024 * 1024)
    }
}

#[async_trait]
impl Runner for DirectRunner {
    async fn run(
        &self,
        name: &str,
        args: &[String],
        workdir: &Path,
        stdin: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<RunOutcome, CoreError> {
        let binary = Path::new(name);
        let mut command = Command::new(name);
        command
            .args(args)
            .current_dir(workdir)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        unsafe {
            use std::os::unix::process::CommandExt;
            command.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        run_command(command, binary, stdin, self.max_output_bytes, timeout, None).await
    }
}

/// Spawns `command`, feeds `stdin`, and races the child's completion against
/// `timeout`. On timeout the whole process group is sent `SIGKILL` and the
/// function then joins the still-running wait/capture task rather than
/// abandoning it, so the reap always happens and whatever partial
/// stdout/stderr the child produced before being killed is still returned.
///
/// `on_spawn`, if given, runs with the child's pid once it is known and
/// before stdin is written — the isolated runner uses this to attach the
/// freshly spawned process to its cgroup.
pub(crate) async fn run_command(
    mut command: Command,
    binary: &Path,
    stdin: Option<&[u8]>,
    max_output_bytes: usize,
    timeout: Duration,
    on_spawn: Option<Box<dyn FnOnce(u32) -> Result<(), CoreError> + Send>>,
) -> Result<RunOutcome, CoreError> {
    let mut child = spawn_with_retry(&mut command, binary)?;
    let pid = child.id();

    if let Some(callback) = on_spawn {
        if let Some(pid) = pid {
            callback(pid)?;
        }
    }

    if let Some(bytes) = stdin {
        if let Some(mut sin) = child.stdin.take() {
            sin.write_all(bytes).await.map_err(CoreError::CaptureIo)?;
        }
    } else {
        child.stdin.take();
    }

    let stdout = child.stdout.take().expect("stdout piped");
    let stderr = child.stderr.take().expect("stderr piped");

    let start = Instant::now();
    let wait_task = tokio::spawn(async move {
        let stdout_task = tokio::spawn(capture_stream(stdout, max_output_bytes));
        let stderr_task = tokio::spawn(capture_stream(stderr, max_output_bytes));
        let status = child.wait().await;
        let stdout = stdout_task.await;
        let stderr = stderr_task.await;
        (status, stdout, stderr)
    });
    tokio::pin!(wait_task);

    tokio::select! {
        joined = &mut wait_task => {
            let (status, stdout, stderr) = joined.map_err(CoreError::Join)?;
            let status = status.map_err(|source| CoreError::Wait { source })?;
            let stdout = stdout.map_err(CoreError::Join)?.map_err(CoreError::CaptureIo)?;
            let stderr = stderr.map_err(CoreError::Join)?.map_err(CoreError::CaptureIo)?;
            Ok(RunOutcome {
                stdout,
                stderr,
                timed_out: false,
                duration: start.elapsed(),
                exit_code: status.code(),
            })
        }
        _ = tokio::time::sleep(timeout) => {
            if let Some(pid) = pid {
                unsafe {
                    libc::kill(-(pid as i32), libc::SIGKILL);
                }
            }
            // The process group is dead or dying; join rather than drop the
            // wait task so the child is still reaped and whatever it wrote
            // before being killed is still surfaced instead of discarded.
            let (status, stdout, stderr) = wait_task.await.map_err(CoreError::Join)?;
            let stdout = stdout.map_err(CoreError::Join)?.map_err(CoreError::CaptureIo)?;
            let stderr = stderr.map_err(CoreError::Join)?.map_err(CoreError::CaptureIo)?;
            Ok(RunOutcome {
                stdout,
                stderr,
                timed_out: true,
                duration: start.elapsed(),
                exit_code: status.ok().and_then(|s| s.code()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timeout_surfaces_partial_output_instead_of_empty() {
        let runner = DirectRunner::default();
        let dir = tempfile::tempdir().unwrap();
        let args = vec![
            "-c".to_string(),
            "printf partial; sleep 5".to_string(),
        ];
        let outcome = runner
            .run("bash", &args, dir.path(), None, Duration::from_millis(200))
            .await
            .unwrap();
        assert!(outcome.timed_out);
        assert_eq!(outcome.stdout, b"partial");
    }
}
