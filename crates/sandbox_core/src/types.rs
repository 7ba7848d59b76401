use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::oneshot;

/// A queued unit of work: a language tag, the caller's source text, and the
/// single-use channel the dispatcher replies on.
///
/// Invariant: exactly one [`RunResult`] is ever sent down `reply`, whether the
/// request succeeds, fails, or times out.
pub struct Request {
    pub lang: String,
    pub code: String,
    pub reply: oneshot::Sender<RunResult>,
}

/// The outcome of one compile+run cycle, mirroring the four captured streams
/// plus the command line and wall-clock time the external RPC surface reports.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    /// The argv actually executed for the run phase (empty if the run phase
    /// never started).
    pub cmd: Vec<String>,
    /// Populated only for genuine adapter/workspace/sandbox failures — never
    /// for ordinary compiler diagnostics (see `c_error`).
    pub error: String,
    pub time: Duration,
    pub compile_output: String,
    pub compile_error: String,
    pub program_output: String,
    pub program_error: String,
}

impl RunResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Default::default()
        }
    }
}

/// A registered compiler/interpreter, as reported by `List`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CompilerInfo {
    pub name: String,
    pub version: String,
}

/// A live workspace directory handed to a runner.
pub struct WorkspaceHandle {
    pub id: String,
    pub path: PathBuf,
}

/// Describes the sandbox environment available once [`crate::sandbox_init`]
/// has probed it successfully. Immutable after construction.
#[derive(Debug, Clone)]
pub struct SandboxProfile {
    pub rootfs: PathBuf,
    pub cgroup_parent: String,
    pub mounts: Vec<MountSpec>,
}

#[derive(Debug, Clone)]
pub struct MountSpec {
    pub source: PathBuf,
    pub target: PathBuf,
    pub read_only: bool,
}

/// What a [`crate::runner::Runner`] reports back for one invocation.
pub struct RunOutcome {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
    pub duration: Duration,
    pub exit_code: Option<i32>,
}
