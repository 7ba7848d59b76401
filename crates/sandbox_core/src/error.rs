use std::{path::PathBuf, time::Duration};

use thiserror::Error;

/// Errors raised while preparing a workspace or invoking a runner.
///
/// These map onto the seven error categories a [`crate::dispatcher::Dispatcher`]
/// turns into `Result` fields: adapters translate a `CoreError` into the
/// language-specific diagnostic fields (`c_error`/`p_error`) rather than letting
/// it reach the caller verbatim.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Language not supported.")]
    UnknownAdapter,

    #[error("failed to create workspace under `{root}`: {source}")]
    WorkspaceCreate {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove workspace `{path}`: {source}")]
    WorkspaceDispose {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("binary `{binary}` could not be spawned: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for child process: {source}")]
    Wait {
        #[source]
        source: std::io::Error,
    },

    #[error("program killed after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("failed to capture child output: {0}")]
    CaptureIo(#[from] std::io::Error),

    #[error("failed to join output-capture task: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("sandbox setup failed: {reason}")]
    SandboxSetup { reason: String },

    #[error("source normalization failed: {reason}")]
    SourceNormalization { reason: String },
}
