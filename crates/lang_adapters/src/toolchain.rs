use std::sync::OnceLock;

use sandbox_core::CoreError;

/// Locates `binary_name` on `PATH` and captures the first line of
/// `<binary> --version`, caching the result for the adapter's lifetime.
///
/// Mirrors the teacher-language adapters' `Init`/`Version` split: `init`
/// resolves the toolchain once and fails loudly if it's missing; `version`
/// is then a cheap read of the cached string.
pub(crate) struct Toolchain {
    binary_name: &'static str,
    version: OnceLock<String>,
}

impl Toolchain {
    pub(crate) const fn new(binary_name: &'static str) -> Self {
        Self {
            binary_name,
            version: OnceLock::new(),
        }
    }

    pub(crate) async fn init(&self) -> Result<(), CoreError> {
        let path = which::which(self.binary_name).map_err(|err| CoreError::SandboxSetup {
            reason: format!("{} not found on PATH: {err}", self.binary_name),
        })?;

        let output = tokio::process::Command::new(&path)
            .arg("--version")
            .output()
            .await
            .map_err(|source| CoreError::Spawn { binary: path, source })?;

        let first_line = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or("unknown")
            .to_string();
        let _ = self.version.set(first_line);
        Ok(())
    }

    pub(crate) fn version(&self) -> &str {
        self.version.get().map(String::as_str).unwrap_or("unknown")
    }

    pub(crate) fn binary_name(&self) -> &'static str {
        self.binary_name
    }
}
