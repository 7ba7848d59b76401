mod direct;
mod isolated;

pub use direct::DirectRunner;
pub use isolated::IsolatedRunner;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::types::RunOutcome;

/// A place to execute one program invocation and capture its output.
///
/// `run` spawns `name` with `args` inside `workdir`, feeding `stdin` (if any)
/// and enforcing `timeout`. Implementations never leave a zombie child behind:
/// every exit path — success, non-zero exit, or timeout — reaps the process.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(
        &self,
        name: &str,
        args: &[String],
        workdir: &Path,
        stdin: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<RunOutcome, CoreError>;
}
