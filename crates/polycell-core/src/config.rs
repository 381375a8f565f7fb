//! Engine configuration.
//!
//! All durations are written in milliseconds when loaded from a file:
//!
//! ```json
//! {
//!   "run_timeout": 30000,
//!   "rust_edition": "2021",
//!   "toolchains": { "python": "/usr/bin/python3" },
//!   "kernel": { "request_timeout": 60000 }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Default wall-clock budget for a run step or a kernel request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration shared by every backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory for per-call source, binary and result files.
    pub temp_dir: PathBuf,

    /// Budget for running user code.
    #[serde(with = "millis")]
    pub run_timeout: Duration,

    /// Budget for the compile step of compiled backends.
    #[serde(with = "millis")]
    pub compile_timeout: Duration,

    /// Edition passed to the compiler.
    pub rust_edition: String,

    /// Nesting depth used when printing JS-family values.
    pub inspect_depth: u32,

    /// Explicit toolchain paths, checked before the environment and PATH.
    pub toolchains: ToolchainOverrides,

    /// Persistent kernel settings.
    pub kernel: KernelConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            run_timeout: DEFAULT_TIMEOUT,
            compile_timeout: DEFAULT_TIMEOUT,
            rust_edition: "2021".to_string(),
            inspect_depth: 5,
            toolchains: ToolchainOverrides::default(),
            kernel: KernelConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file. Missing fields take defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Use a specific directory for temporary artifacts.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Use a specific run budget.
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }
}

/// Explicit toolchain locations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolchainOverrides {
    pub python: Option<PathBuf>,
    pub rustc: Option<PathBuf>,
    pub javascript: Option<PathBuf>,
    pub typescript: Option<PathBuf>,
}

/// Settings for the persistent interpreter kernel.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Kernel script to run. `None` uses the script bundled with this crate.
    pub script: Option<PathBuf>,

    /// Arguments placed between the interpreter and the script path.
    pub interpreter_args: Vec<String>,

    /// Budget for one execution round-trip.
    #[serde(with = "millis")]
    pub request_timeout: Duration,

    /// Budget for the readiness handshake.
    #[serde(with = "millis")]
    pub startup_timeout: Duration,

    /// Time given to the kernel to exit after the shutdown message.
    #[serde(with = "millis")]
    pub shutdown_grace: Duration,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            script: None,
            interpreter_args: vec!["-u".to_string()],
            request_timeout: DEFAULT_TIMEOUT,
            startup_timeout: DEFAULT_TIMEOUT,
            shutdown_grace: Duration::from_millis(100),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.run_timeout, Duration::from_secs(30));
        assert_eq!(config.compile_timeout, Duration::from_secs(30));
        assert_eq!(config.rust_edition, "2021");
        assert_eq!(config.kernel.interpreter_args, vec!["-u".to_string()]);
        assert_eq!(config.kernel.shutdown_grace, Duration::from_millis(100));
    }

    #[test]
    fn test_partial_json() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"run_timeout": 1500, "toolchains": {"rustc": "/opt/rustc"}, "kernel": {"request_timeout": 250}}"#,
        )
        .unwrap();

        assert_eq!(config.run_timeout, Duration::from_millis(1500));
        assert_eq!(config.compile_timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.toolchains.rustc, Some(PathBuf::from("/opt/rustc")));
        assert_eq!(config.kernel.request_timeout, Duration::from_millis(250));
        assert_eq!(config.kernel.startup_timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("polycell.json");
        std::fs::write(&path, r#"{"rust_edition": "2024", "inspect_depth": 2}"#).unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.rust_edition, "2024");
        assert_eq!(config.inspect_depth, 2);
    }
}
