//! Single-worker request dispatcher.
//!
//! One `tokio::sync::mpsc` channel feeds a single consuming task, so adapters
//! never run concurrently with each other — matching the "one worker,
//! sequential processing" requirement. Each queued [`Request`] carries its own
//! one-shot reply channel; the worker sends exactly one [`RunResult`] per
//! request, whether it succeeds, fails, or times out.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::{mpsc, oneshot, Notify};
use tracing::{info_span, warn, Instrument};

use crate::error::CoreError;
use crate::runner::Runner;
use crate::types::{CompilerInfo, Request, RunResult};
use crate::workspace::WorkspaceManager;
use crate::Adapter;

const QUEUE_DEPTH: usize = 64;

type Registry = RwLock<HashMap<String, Arc<dyn Adapter>>>;

pub struct Dispatcher {
    sender: mpsc::Sender<Request>,
    registry: Arc<Registry>,
    shutdown: Arc<Notify>,
}

impl Dispatcher {
    /// Spawns the worker task and returns a handle for submitting requests.
    /// `runner` is chosen once by the caller (direct or isolated) based on
    /// whether the sandbox initializer published a profile.
    /// `adapters` pairs each adapter with every tag it should answer to
    /// (case-insensitive); list the adapter's own name plus any aliases, e.g.
    /// `(vec!["c11".into(), "c".into()], c11_adapter)`.
    pub fn spawn(
        workspace_root: impl Into<std::path::PathBuf>,
        runner: Arc<dyn Runner>,
        adapters: Vec<(Vec<String>, Arc<dyn Adapter>)>,
    ) -> Self {
        let mut registry = HashMap::new();
        for (tags, adapter) in adapters {
            for tag in tags {
                registry.insert(tag.to_ascii_lowercase(), adapter.clone());
            }
        }
        let registry = Arc::new(RwLock::new(registry));

        let (sender, mut receiver) = mpsc::channel::<Request>(QUEUE_DEPTH);
        let worker_registry = registry.clone();
        let workspaces = WorkspaceManager::new(workspace_root.into());
        let shutdown = Arc::new(Notify::new());
        let worker_shutdown = shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = receiver.recv() => {
                        let Some(request) = received else { break; };
                        let span = info_span!("compile_request", lang = %request.lang);
                        let result = handle_request(&request, &worker_registry, &workspaces, runner.as_ref())
                            .instrument(span)
                            .await;
                        if request.reply.send(result).is_err() {
                            warn!("caller dropped before receiving a reply");
                        }
                    }
                    _ = worker_shutdown.notified() => break,
                }
            }
        });

        Self { sender, registry, shutdown }
    }

    /// Registers an adapter under every tag listed (case-insensitive),
    /// overwriting any adapter already holding one of those tags. Available
    /// after `spawn()`, unlike the adapters supplied at construction time.
    pub fn register(&self, tags: Vec<String>, adapter: Arc<dyn Adapter>) {
        let mut registry = self.registry.write().expect("registry lock poisoned");
        for tag in tags {
            registry.insert(tag.to_ascii_lowercase(), adapter.clone());
        }
    }

    /// Signals the worker loop to stop accepting new requests. Any request
    /// already queued ahead of the shutdown signal is still drained and
    /// replied to; `submit` calls made after `stop` fail with an error result
    /// rather than hanging, since the channel send itself still succeeds up
    /// to `QUEUE_DEPTH` but nothing will ever consume it.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }

    pub async fn submit(&self, lang: String, code: String) -> RunResult {
        let (reply, rx) = oneshot::channel();
        let request = Request { lang, code, reply };
        if self.sender.send(request).await.is_err() {
            return RunResult::failed("dispatcher worker is no longer running");
        }
        rx.await
            .unwrap_or_else(|_| RunResult::failed("dispatcher dropped the reply channel"))
    }

    pub fn list(&self) -> Vec<CompilerInfo> {
        let registry = self.registry.read().expect("registry lock poisoned");
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for adapter in registry.values() {
            if seen.insert(adapter.name().to_string()) {
                out.push(CompilerInfo {
                    name: adapter.name().to_string(),
                    version: adapter.version().to_string(),
                });
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

async fn handle_request(
    request: &Request,
    registry: &Registry,
    workspaces: &WorkspaceManager,
    runner: &dyn Runner,
) -> RunResult {
    let tag = request.lang.to_ascii_lowercase();
    let adapter = {
        let registry = registry.read().expect("registry lock poisoned");
        registry.get(&tag).cloned()
    };
    let Some(adapter) = adapter else {
        tracing::debug!(tag = %request.lang, "no adapter registered for this language tag");
        return RunResult::failed(CoreError::UnknownAdapter.to_string());
    };

    let handle = match workspaces.create(adapter.name()).await {
        Ok(handle) => handle,
        Err(err) => return RunResult::failed(err.to_string()),
    };

    let result = adapter.compile(&request.code, &handle.path, runner).await;

    if let Err(err) = workspaces.dispose(&handle).await {
        warn!(%err, workspace = %handle.id, "failed to dispose workspace");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::DirectRunner;
    use crate::CoreError;
    use async_trait::async_trait;
    use std::path::Path;

    struct EchoAdapter;

    #[async_trait]
    impl Adapter for EchoAdapter {
        fn name(&self) -> &str {
            "echo"
        }
        fn version(&self) -> &str {
            "1.0"
        }
        async fn init(&self) -> Result<(), CoreError> {
            Ok(())
        }
        async fn compile(&self, code: &str, _workspace: &Path, _runner: &dyn Runner) -> RunResult {
            RunResult {
                program_output: code.to_string(),
                ..Default::default()
            }
        }
    }

    #[tokio::test]
    async fn unknown_language_reports_as_error_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::spawn(dir.path(), Arc::new(DirectRunner::default()), vec![]);
        let result = dispatcher.submit("nonexistent".into(), "code".into()).await;
        assert_eq!(result.error, "Language not supported.");
    }

    #[tokio::test]
    async fn register_adds_an_adapter_after_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::spawn(dir.path(), Arc::new(DirectRunner::default()), vec![]);
        let unknown = dispatcher.submit("echo".into(), "hi".into()).await;
        assert_eq!(unknown.error, "Language not supported.");

        dispatcher.register(vec!["echo".into()], Arc::new(EchoAdapter));
        let known = dispatcher.submit("echo".into(), "hi".into()).await;
        assert_eq!(known.program_output, "hi");
    }

    #[tokio::test]
    async fn stop_drains_queued_requests_then_ends_the_worker() {
        let dir = tempfile::tempdir().unwrap();
        let adapter: Arc<dyn Adapter> = Arc::new(EchoAdapter);
        let dispatcher = Dispatcher::spawn(
            dir.path(),
            Arc::new(DirectRunner::default()),
            vec![(vec!["echo".into()], adapter)],
        );
        let result = dispatcher.submit("echo".into(), "still served".into()).await;
        assert_eq!(result.program_output, "still served");

        dispatcher.stop();
        // Give the worker a moment to observe the shutdown notification.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let after_stop = dispatcher.submit("echo".into(), "too late".into()).await;
        assert_eq!(after_stop.error, "dispatcher worker is no longer running");
    }

    #[tokio::test]
    async fn registered_adapter_runs_and_disposes_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let adapter: Arc<dyn Adapter> = Arc::new(EchoAdapter);
        let dispatcher = Dispatcher::spawn(
            dir.path(),
            Arc::new(DirectRunner::default()),
            vec![(vec!["echo".into()], adapter)],
        );
        let result = dispatcher.submit("ECHO".into(), "hi".into()).await;
        assert_eq!(result.program_output, "hi");
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_deduplicates_aliases_of_the_same_adapter() {
        let dir = tempfile::tempdir().unwrap();
        let adapter: Arc<dyn Adapter> = Arc::new(EchoAdapter);
        let dispatcher = Dispatcher::spawn(
            dir.path(),
            Arc::new(DirectRunner::default()),
            vec![(vec!["echo".into(), "e".into()], adapter)],
        );
        assert_eq!(dispatcher.list().len(), 1);
    }
}
