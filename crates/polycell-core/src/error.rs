//! Error types for polycell-core.

use std::time::Duration;

use thiserror::Error;

use crate::result::ErrorKind;
use crate::toolchain::Toolchain;

/// Result type for polycell-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the engine itself.
///
/// Failures of the *user's* code never show up here; they are reported inside
/// [`ExecutionResult::error`](crate::ExecutionResult). This type covers caller
/// mistakes and infrastructure failures of the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The language tag does not name a known backend.
    #[error("unknown language: {0}")]
    UnknownLanguage(String),

    /// No interpreter or compiler could be resolved.
    #[error("{0} not found")]
    ToolchainNotFound(Toolchain),

    /// The kernel process could not be started or never became ready.
    #[error("kernel failed to start: {0}")]
    KernelStartup(String),

    /// The kernel process exited while a call was outstanding.
    #[error("kernel process exited{}", code.map(|c| format!(" with code {}", c)).unwrap_or_default())]
    KernelProcessExited { code: Option<i32> },

    /// No kernel session is running.
    #[error("kernel is not running")]
    KernelNotRunning,

    /// Restart was requested before any runtime path was known.
    #[error("no interpreter path known for restart")]
    NoKnownRuntime,

    /// The execution budget was exceeded.
    #[error("execution timed out after {}ms", .0.as_millis())]
    ExecutionTimeout(Duration),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this error into the closed kind reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ToolchainNotFound(_) => ErrorKind::ToolchainNotFound,
            Error::KernelProcessExited { .. } => ErrorKind::KernelProcessExited,
            Error::ExecutionTimeout(_) => ErrorKind::ExecutionTimeout,
            _ => ErrorKind::ExecutionError,
        }
    }
}
