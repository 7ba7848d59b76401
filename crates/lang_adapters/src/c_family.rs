use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sandbox_core::{capture::truncate_default, Adapter, Runner, RunResult};
use tracing::warn;

use crate::has_c_entry_point;
use crate::toolchain::Toolchain;

const RUN_TIMEOUT: Duration = Duration::from_secs(3);

const COMMON_FLAGS: &[&str] = &[
    "-Wextra",
    "-Wall",
    "-Wno-unused",
    "-pedantic",
    "-Wfloat-equal",
    "-Wshadow",
    "-lm",
    "-Wfatal-errors",
    "-fsanitize=alignment,undefined",
];

const C89_PRELUDE: &str = r#"
#define _XOPEN_SOURCE 9001
#define __USE_XOPEN
#include <assert.h>
#include <ctype.h>
#include <errno.h>
#include <float.h>
#include <limits.h>
#include <locale.h>
#include <math.h>
#include <setjmp.h>
#include <signal.h>
#include <stdarg.h>
#include <stddef.h>
#include <stdio.h>
#include <stdlib.h>
#include <string.h>
#include <time.h>

#line 1
"#;

const C99_PRELUDE: &str = r#"
#define _XOPEN_SOURCE 9001
#define __USE_XOPEN
#include <assert.h>
#include <complex.h>
#include <ctype.h>
#include <errno.h>
#include <fenv.h>
#include <float.h>
#include <inttypes.h>
#include <limits.h>
#include <locale.h>
#include <math.h>
#include <setjmp.h>
#include <signal.h>
#include <stdarg.h>
#include <stdbool.h>
#include <stddef.h>
#include <stdint.h>
#include <stdio.h>
#include <stdlib.h>
#include <string.h>
#include <tgmath.h>
#include <time.h>
#include <wchar.h>
#include <wctype.h>

#line 1
"#;

const C11_PRELUDE: &str = r#"
#define _XOPEN_SOURCE 9001
#define __USE_XOPEN
#include <assert.h>
#include <complex.h>
#include <ctype.h>
#include <errno.h>
#include <fenv.h>
#include <float.h>
#include <inttypes.h>
#include <limits.h>
#include <locale.h>
#include <math.h>
#include <setjmp.h>
#include <signal.h>
#include <stdalign.h>
#include <stdarg.h>
#include <stdatomic.h>
#include <stdbool.h>
#include <stddef.h>
#include <stdint.h>
#include <stdio.h>
#include <stdlib.h>
#include <stdnoreturn.h>
#include <string.h>
#include <tgmath.h>
#if __STDC_NO_THREADS__ != 1
#include <threads.h>
#endif
#include <time.h>
#include <uchar.h>
#include <wchar.h>
#include <wctype.h>
#include <unistd.h>
#include <sys/types.h>

#line 1
"#;

/// Shared compile/run logic for every C dialect adapter: only the dialect
/// flag, prelude body, and display name differ between C89/C99/C11.
struct CFamily {
    display_name: String,
    toolchain: Toolchain,
    std_flag: &'static str,
    prelude: &'static str,
}

impl CFamily {
    async fn compile(&self, code: &str, workspace: &Path, runner: &dyn Runner) -> RunResult {
        // Only the user's own source is persisted; the prelude is prepended
        // in-memory for the compiler but never written to disk.
        let source_path = workspace.join("prog.c");
        if let Err(err) = tokio::fs::write(&source_path, code).await {
            return RunResult::failed(format!("failed to write source: {err}"));
        }

        let mut options: Vec<String> = COMMON_FLAGS.iter().map(|s| s.to_string()).collect();
        options.push(self.std_flag.to_string());

        let full_source = format!("{}{}", self.prelude, code);
        let has_main = has_c_entry_point(code);

        if !has_main {
            let mut args = options.clone();
            args.extend(["-xc".into(), "-o".into(), "./prog.o".into(), "-c".into(), "-".into()]);
            let cmd = format!("gcc {}", args.join(" "));

            let outcome = runner
                .run("gcc", &args, workspace, Some(full_source.as_bytes()), RUN_TIMEOUT)
                .await;

            return match outcome {
                Ok(outcome) => {
                    let stdout = String::from_utf8_lossy(&outcome.stdout).into_owned();
                    let stderr = String::from_utf8_lossy(&outcome.stderr).into_owned();
                    RunResult {
                        cmd: args,
                        time: outcome.duration,
                        compile_output: truncate_default(&stdout),
                        compile_error: truncate_default(&stderr),
                        ..Default::default()
                    }
                }
                Err(err) => {
                    let mut result = RunResult::failed(format!("gcc: {err}"));
                    result.cmd = vec![cmd];
                    result
                }
            };
        }

        let mut args = options;
        args.extend(["-xc".into(), "-o".into(), "./prog".into(), "-".into()]);

        let compile_outcome = runner
            .run("gcc", &args, workspace, Some(full_source.as_bytes()), RUN_TIMEOUT)
            .await;
        let compile_outcome = match compile_outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                let mut result = RunResult::failed(format!("gcc: {err}"));
                result.cmd = args;
                return result;
            }
        };

        let compile_output = truncate_default(&String::from_utf8_lossy(&compile_outcome.stdout));
        let compile_error = truncate_default(&String::from_utf8_lossy(&compile_outcome.stderr));

        if compile_outcome.exit_code.unwrap_or(1) != 0 {
            return RunResult {
                cmd: args,
                time: compile_outcome.duration,
                compile_output,
                compile_error,
                ..Default::default()
            };
        }

        let run_outcome = runner.run("./prog", &[], workspace, None, RUN_TIMEOUT).await;

        let (program_output, program_error, error, run_duration) = match run_outcome {
            Ok(outcome) if outcome.timed_out => (
                String::new(),
                String::new(),
                format!("program killed after {:?}", RUN_TIMEOUT),
                outcome.duration,
            ),
            Ok(outcome) => (
                truncate_default(&String::from_utf8_lossy(&outcome.stdout)),
                truncate_default(&String::from_utf8_lossy(&outcome.stderr)),
                String::new(),
                outcome.duration,
            ),
            Err(err) => {
                warn!(%err, "program run failed");
                (String::new(), String::new(), format!("./prog: {err}"), Duration::default())
            }
        };

        RunResult {
            cmd: args,
            time: compile_outcome.duration + run_duration,
            compile_output,
            compile_error,
            program_output,
            program_error,
            error,
            ..Default::default()
        }
    }
}

macro_rules! c_dialect_adapter {
    ($adapter:ident, $display:expr, $std_flag:expr, $prelude:expr) => {
        pub struct $adapter {
            inner: CFamily,
        }

        impl $adapter {
            pub fn new() -> Self {
                Self {
                    inner: CFamily {
                        display_name: $display.to_string(),
                        toolchain: Toolchain::new("gcc"),
                        std_flag: $std_flag,
                        prelude: $prelude,
                    },
                }
            }
        }

        impl Default for $adapter {
            fn default() -> Self {
                Self::new()
            }
        }

        #[async_trait]
        impl Adapter for $adapter {
            fn name(&self) -> &str {
                &self.inner.display_name
            }

            fn version(&self) -> &str {
                self.inner.toolchain.version()
            }

            async fn init(&self) -> Result<(), sandbox_core::CoreError> {
                self.inner.toolchain.init().await
            }

            async fn compile(&self, code: &str, workspace: &Path, runner: &dyn Runner) -> RunResult {
                self.inner.compile(code, workspace, runner).await
            }
        }
    };
}

c_dialect_adapter!(C89Adapter, "c89", "-std=c89", C89_PRELUDE);
c_dialect_adapter!(C99Adapter, "c99", "-std=c99", C99_PRELUDE);
c_dialect_adapter!(C11Adapter, "c11", "-std=c11", C11_PRELUDE);

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sandbox_core::RunOutcome;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct ScriptedRunner {
        calls: AtomicUsize,
        responses: Vec<(i32, &'static str, &'static str)>,
    }

    #[async_trait]
    impl Runner for ScriptedRunner {
        async fn run(
            &self,
            _name: &str,
            _args: &[String],
            _workdir: &Path,
            _stdin: Option<&[u8]>,
            _timeout: Duration,
        ) -> Result<RunOutcome, sandbox_core::CoreError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            let (code, stdout, stderr) = self.responses[i];
            Ok(RunOutcome {
                stdout: stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
                timed_out: false,
                duration: Duration::from_millis(1),
                exit_code: Some(code),
            })
        }
    }

    #[tokio::test]
    async fn no_main_compiles_object_only_and_reports_no_error() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = C11Adapter::new();
        let runner = ScriptedRunner {
            calls: AtomicUsize::new(0),
            responses: vec![(0, "", "")],
        };
        let result = adapter.compile("int add(int a,int b){return a+b;}", dir.path(), &runner).await;
        assert!(result.error.is_empty());
        assert!(result.cmd.contains(&"-c".to_string()));
    }

    #[tokio::test]
    async fn main_runs_program_and_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = C11Adapter::new();
        let runner = ScriptedRunner {
            calls: AtomicUsize::new(0),
            responses: vec![(0, "", ""), (0, "hello\n", "")],
        };
        let result = adapter
            .compile("int main(void){puts(\"hello\");return 0;}", dir.path(), &runner)
            .await;
        assert_eq!(result.program_output, "hello\n");
        assert!(result.error.is_empty());
    }

    #[tokio::test]
    async fn compile_failure_populates_c_error_not_error_field() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = C11Adapter::new();
        let runner = ScriptedRunner {
            calls: AtomicUsize::new(0),
            responses: vec![(1, "", "prog.c:1:1: error: expected ';'")],
        };
        let result = adapter.compile("int main(void) {", dir.path(), &runner).await;
        assert!(result.error.is_empty());
        assert!(result.compile_error.contains("error"));
    }
}
