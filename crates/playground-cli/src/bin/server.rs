//! Server entry point.
//!
//! Startup order is load-bearing: the container re-exec check must run
//! before anything else touches the process (see
//! `sandbox_core::reexec::maybe_enter_init_role`), so it is the first
//! statement of `main`, ahead of tracing, config parsing, and the Tokio
//! runtime itself.

use std::sync::Arc;

use clap::Parser;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lang_adapters::{C11Adapter, C89Adapter, C99Adapter, GoStyleAdapter, ShellAdapter};
use playground_cli::config::ServerConfig;
use sandbox_core::runner::{DirectRunner, IsolatedRunner};
use sandbox_core::{sandbox_init, Adapter, Dispatcher, Runner};
use wire::{read_frame, write_frame, CompileReply, ListReply, RpcReply, RpcRequest};

fn main() {
    sandbox_core::reexec::maybe_enter_init_role();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::parse();

    let runtime = tokio::runtime::Runtime::new().expect("failed to start tokio runtime");
    runtime.block_on(run(config));
}

async fn run(config: ServerConfig) {
    if let Err(err) = ensure_workspace_root(&config.workspace_root).await {
        error!(%err, path = %config.workspace_root.display(), "workspace root is not usable");
        std::process::exit(1);
    }

    let sandboxed = sandbox_init::init(&config.state_dir, &config.sandbox_config).await;
    let runner: Arc<dyn Runner> = match sandbox_init::profile() {
        Some(profile) if sandboxed => {
            info!("sandboxing enabled, isolated runner selected");
            Arc::new(IsolatedRunner::new(profile.clone()))
        }
        _ => {
            info!("sandboxing unavailable, falling back to direct runner");
            Arc::new(DirectRunner::default())
        }
    };

    let adapters = registered_adapters().await;
    if adapters.is_empty() {
        error!("no adapter initialized successfully, nothing to serve");
        std::process::exit(1);
    }
    let dispatcher = Arc::new(Dispatcher::spawn(config.workspace_root.clone(), runner, adapters));

    let listener = match TcpListener::bind(config.bind).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, addr = %config.bind, "failed to bind listener");
            std::process::exit(1);
        }
    };
    info!(addr = %config.bind, "listening");

    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%err, "accept failed");
                continue;
            }
        };
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            if let Err(err) = serve_connection(socket, dispatcher).await {
                warn!(%peer, %err, "connection ended with error");
            }
        });
    }
}

/// Ensures `path` exists and is a directory, creating it (and its parents)
/// if it doesn't exist yet. Fails if `path` exists but is something else
/// (a file, a socket, ...), rather than letting a later per-request
/// `create_dir` fail confusingly deep inside a workspace creation call.
async fn ensure_workspace_root(path: &std::path::Path) -> std::io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "workspace root exists and is not a directory",
        )),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tokio::fs::create_dir_all(path).await
        }
        Err(err) => Err(err),
    }
}

/// Constructs every known adapter, initializes it against the host's
/// toolchains, and registers the ones that succeed. An adapter whose
/// toolchain is missing is simply skipped rather than failing startup.
async fn registered_adapters() -> Vec<(Vec<String>, Arc<dyn Adapter>)> {
    let candidates: Vec<(Vec<&str>, Arc<dyn Adapter>)> = vec![
        (vec!["c89"], Arc::new(C89Adapter::new())),
        (vec!["c99"], Arc::new(C99Adapter::new())),
        (vec!["c11", "c"], Arc::new(C11Adapter::new())),
        (vec!["bash", "sh"], Arc::new(ShellAdapter::new())),
        (vec!["go"], Arc::new(GoStyleAdapter::new())),
    ];

    let mut registered = Vec::new();
    for (tags, adapter) in candidates {
        match adapter.init().await {
            Ok(()) => {
                info!(name = adapter.name(), version = adapter.version(), "adapter ready");
                registered.push((tags.into_iter().map(String::from).collect(), adapter));
            }
            Err(err) => {
                warn!(name = adapter.name(), %err, "adapter unavailable, not registering");
            }
        }
    }
    registered
}

async fn serve_connection(
    mut socket: TcpStream,
    dispatcher: Arc<Dispatcher>,
) -> Result<(), wire::FrameError> {
    loop {
        let Some(request) = read_frame::<_, RpcRequest>(&mut socket).await? else {
            return Ok(());
        };

        let reply = match request {
            RpcRequest::Compile(args) => {
                let result = dispatcher.submit(args.lang, args.code).await;
                RpcReply::Compile(CompileReply::from(result))
            }
            RpcRequest::List => RpcReply::List(ListReply::from(dispatcher.list())),
        };

        write_frame(&mut socket, &reply).await?;
    }
}
