//! Core of a sandboxed code-execution service: per-request workspaces, a
//! single-worker dispatcher, pluggable runners (direct or isolated), output
//! capture with independent per-stream truncation, and the sandbox
//! initializer that probes container support at startup.
//!
//! Language adapters (C family, shell, Go-style) live in the sibling
//! `lang_adapters` crate and depend on the [`Adapter`] trait and [`Runner`]
//! abstraction defined here.

pub mod capture;
pub mod dispatcher;
pub mod error;
mod process;
pub mod reexec;
pub mod runner;
pub mod sandbox_init;
pub mod types;
pub mod workspace;

pub use dispatcher::Dispatcher;
pub use error::CoreError;
pub use runner::Runner;
pub use types::{CompilerInfo, MountSpec, Request, RunOutcome, RunResult, SandboxProfile, WorkspaceHandle};

use async_trait::async_trait;
use std::path::Path;

/// A registered language: turns source text into a captured [`RunResult`].
///
/// Implementations live in `lang_adapters`; `sandbox_core` only needs the
/// trait shape so the dispatcher can hold adapters as trait objects.
///
/// `init` is called once per adapter instance before it is registered with a
/// [`Dispatcher`] (locating its toolchain on `PATH` and probing its version);
/// an adapter whose `init` fails is simply never registered, so a missing
/// toolchain downgrades to "unavailable" rather than crashing the service.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Canonical display name, e.g. `"c11"`, `"bash"`, `"go"`.
    fn name(&self) -> &str;
    fn version(&self) -> &str;

    /// Locates the underlying toolchain and caches its version string.
    async fn init(&self) -> Result<(), CoreError>;

    /// Compiles (if applicable) and runs `code` inside `workspace`, using
    /// `runner` for all process execution.
    async fn compile(
        &self,
        code: &str,
        workspace: &Path,
        runner: &dyn Runner,
    ) -> RunResult;
}
