//! Result-file protocol shared by the JavaScript-family harnesses.
//!
//! The generated harness writes a single JSON object to the result file:
//!
//! ```json
//! {"status": "ok", "result": "8"}
//! {"status": "error", "error": {"name": "TypeError", "message": "...", "stack": "..."}}
//! ```

use std::path::Path;

use serde::Deserialize;

use super::process::ProcessOutput;
use crate::result::{ErrorInfo, ErrorKind, ExecutionResult};

/// Report written by a harness to its result file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HarnessReport {
    Ok {
        #[serde(default)]
        result: Option<String>,
    },
    Error {
        error: ThrownError,
    },
}

/// A value thrown by user code, as seen by the harness.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ThrownError {
    pub name: String,
    pub message: String,
    pub stack: String,
}

impl Default for ThrownError {
    fn default() -> Self {
        Self {
            name: "Error".to_string(),
            message: String::new(),
            stack: String::new(),
        }
    }
}

impl HarnessReport {
    /// Read and decode a result file. `None` if missing or malformed.
    pub async fn read(path: &Path) -> Option<Self> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("No result file at {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::debug!("Malformed result file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Combine the report with the captured streams.
    pub fn into_result(self, cell_id: &str, output: ProcessOutput) -> ExecutionResult {
        match self {
            HarnessReport::Ok { result } => {
                ExecutionResult::ok(cell_id, result, output.stdout, output.stderr)
            }
            HarnessReport::Error { error } => ExecutionResult::failed(
                cell_id,
                ErrorInfo::new(ErrorKind::RuntimeError, error.message, error.stack)
                    .with_type_name(error.name),
                output.stdout,
                output.stderr,
            ),
        }
    }
}

/// Result for a zero exit that left no usable report.
pub fn missing_report(cell_id: &str, output: ProcessOutput) -> ExecutionResult {
    let traceback = output.stderr.clone();
    ExecutionResult::failed(
        cell_id,
        ErrorInfo::new(ErrorKind::ExecutionError, "No result produced", traceback),
        output.stdout,
        output.stderr,
    )
}

/// Embed a path as a JavaScript string literal.
pub fn js_string_literal(path: &Path) -> String {
    // JSON strings are valid JavaScript string literals.
    serde_json::Value::String(path.to_string_lossy().into_owned()).to_string()
}
