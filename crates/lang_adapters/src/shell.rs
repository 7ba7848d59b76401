use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sandbox_core::{capture::truncate_default, Adapter, CoreError, Runner, RunResult};

use crate::toolchain::Toolchain;

const RUN_TIMEOUT: Duration = Duration::from_secs(3);

/// Runs a shell fragment through `bash -c`. No build phase: the source is
/// written to `prog.sh` purely for auditing, the actual invocation passes the
/// code directly as `bash`'s `-c` argument.
pub struct ShellAdapter {
    toolchain: Toolchain,
}

impl ShellAdapter {
    pub fn new() -> Self {
        Self {
            toolchain: Toolchain::new("bash"),
        }
    }
}

impl Default for ShellAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for ShellAdapter {
    fn name(&self) -> &str {
        "bash"
    }

    fn version(&self) -> &str {
        self.toolchain.version()
    }

    async fn init(&self) -> Result<(), CoreError> {
        self.toolchain.init().await
    }

    async fn compile(&self, code: &str, workspace: &Path, runner: &dyn Runner) -> RunResult {
        let script_path = workspace.join("prog.sh");
        if let Err(err) = tokio::fs::write(&script_path, code).await {
            return RunResult::failed(format!("failed to write source: {err}"));
        }

        let args = vec!["-c".to_string(), code.to_string()];
        let outcome = runner.run("bash", &args, workspace, None, RUN_TIMEOUT).await;

        match outcome {
            Ok(outcome) if outcome.timed_out => RunResult {
                cmd: std::iter::once("bash".to_string()).chain(args).collect(),
                time: outcome.duration,
                error: format!("program killed after {:?}", RUN_TIMEOUT),
                ..Default::default()
            },
            Ok(outcome) => RunResult {
                cmd: std::iter::once("bash".to_string()).chain(args).collect(),
                time: outcome.duration,
                program_output: truncate_default(&String::from_utf8_lossy(&outcome.stdout)),
                program_error: truncate_default(&String::from_utf8_lossy(&outcome.stderr)),
                ..Default::default()
            },
            Err(err) => RunResult::failed(format!("bash: {err}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandbox_core::RunOutcome;

    struct FakeRunner;

    #[async_trait]
    impl Runner for FakeRunner {
        async fn run(
            &self,
            _name: &str,
            _args: &[String],
            _workdir: &Path,
            _stdin: Option<&[u8]>,
            _timeout: Duration,
        ) -> Result<RunOutcome, sandbox_core::CoreError> {
            Ok(RunOutcome {
                stdout: b"/tmp/store/bash-abc123\n".to_vec(),
                stderr: Vec::new(),
                timed_out: false,
                duration: Duration::from_millis(1),
                exit_code: Some(0),
            })
        }
    }

    #[tokio::test]
    async fn runs_fragment_and_captures_stdout_path() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = ShellAdapter::new();
        let result = adapter.compile("pwd\nuname -a\n", dir.path(), &FakeRunner).await;
        assert!(result.program_output.contains("/tmp/store"));
        assert!(result.error.is_empty());
        assert!(dir.path().join("prog.sh").exists());
    }
}
