//! Server-side configuration: a handful of CLI flags plus the on-disk
//! workspace/sandbox-config paths the service needs at startup.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Flags accepted by the `playground-server` binary.
///
/// Mirrors the original service's fixed listen address, generalized into
/// overridable flags rather than a compiled-in constant.
#[derive(Debug, Parser)]
#[command(name = "playground-server")]
#[command(about = "Sandboxed compile/run RPC service")]
pub struct ServerConfig {
    /// Address the RPC listener binds to.
    #[arg(long, default_value = "127.0.0.1:1234")]
    pub bind: SocketAddr,

    /// Root directory under which per-request workspaces are created.
    #[arg(long, default_value = "store")]
    pub workspace_root: PathBuf,

    /// Directory holding container runtime state (created on startup).
    #[arg(long, default_value = "state")]
    pub state_dir: PathBuf,

    /// Path to the sandbox profile file (rootfs/cgroup/mounts); sandboxing is
    /// disabled and the direct runner is used if this file is absent or
    /// invalid.
    #[arg(long, default_value = "libcontainer.json")]
    pub sandbox_config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_address_and_paths() {
        let config = ServerConfig::parse_from(["playground-server"]);
        assert_eq!(config.bind, "127.0.0.1:1234".parse::<SocketAddr>().unwrap());
        assert_eq!(config.workspace_root, PathBuf::from("store"));
        assert_eq!(config.sandbox_config, PathBuf::from("libcontainer.json"));
    }

    #[test]
    fn bind_flag_overrides_the_default_address() {
        let config = ServerConfig::parse_from(["playground-server", "--bind", "0.0.0.0:9000"]);
        assert_eq!(config.bind, "0.0.0.0:9000".parse::<SocketAddr>().unwrap());
    }
}
