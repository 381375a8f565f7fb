//! Uniform result model shared by every backend.
//!
//! Every backend produces exactly one [`ExecutionResult`] per request. The
//! JSON shape is also what the persistent kernel emits on its stdout, so the
//! same type decodes kernel replies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Target language of a code fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Interpreted, executed by the persistent kernel.
    Python,
    /// Compiled, one-shot compile then run.
    Rust,
    /// Transpiled/interpreted one-shot script.
    JavaScript,
    /// Transpiled one-shot script with hoisted imports.
    TypeScript,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::Python,
        Language::Rust,
        Language::JavaScript,
        Language::TypeScript,
    ];

    /// Canonical tag for this language.
    pub fn tag(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Rust => "rust",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
        }
    }

    /// Guess the language from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "py" => Some(Language::Python),
            "rs" => Some(Language::Rust),
            "js" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "mts" => Some(Language::TypeScript),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "py" | "python3" => Ok(Language::Python),
            "rust" | "rs" => Ok(Language::Rust),
            "javascript" | "js" => Ok(Language::JavaScript),
            "typescript" | "ts" => Ok(Language::TypeScript),
            _ => Err(Error::UnknownLanguage(s.to_string())),
        }
    }
}

/// A single execution request. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub code: String,
    /// Opaque, caller-supplied correlation id.
    pub cell_id: String,
    pub language: Language,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>, cell_id: impl Into<String>, language: Language) -> Self {
        Self {
            code: code.into(),
            cell_id: cell_id.into(),
            language,
        }
    }
}

/// Outcome status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// A captured observable output reported alongside the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffect {
    pub what: String,
    pub content: String,
}

/// Closed classification of execution failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorKind {
    /// No interpreter or compiler was resolvable.
    ToolchainNotFound,
    /// The compile step exited non-zero.
    CompilationError,
    /// The user's code failed at run time (exception, non-zero exit, signal).
    #[default]
    RuntimeError,
    /// The process succeeded but no usable result was produced.
    ExecutionError,
    /// The kernel process died with a call outstanding.
    KernelProcessExited,
    /// The wall-clock budget was exceeded.
    ExecutionTimeout,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ToolchainNotFound => "ToolchainNotFound",
            ErrorKind::CompilationError => "CompilationError",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::ExecutionError => "ExecutionError",
            ErrorKind::KernelProcessExited => "KernelProcessExited",
            ErrorKind::ExecutionTimeout => "ExecutionTimeout",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error details attached to a failed [`ExecutionResult`].
///
/// `kind` is the closed classification; `type_name` (serialized as `type`)
/// is the language-native name such as `TypeError` or `ZeroDivisionError`,
/// kept only as an opaque diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(default)]
    pub kind: ErrorKind,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub traceback: String,
}

impl ErrorInfo {
    /// Create an error whose type name is the kind's own name.
    pub fn new(kind: ErrorKind, message: impl Into<String>, traceback: impl Into<String>) -> Self {
        Self {
            kind,
            type_name: kind.as_str().to_string(),
            message: message.into(),
            traceback: traceback.into(),
        }
    }

    /// Replace the diagnostic type name (e.g. with a thrown exception's name).
    pub fn with_type_name(mut self, name: impl Into<String>) -> Self {
        self.type_name = name.into();
        self
    }
}

impl From<&Error> for ErrorInfo {
    fn from(err: &Error) -> Self {
        ErrorInfo::new(err.kind(), err.to_string(), String::new())
    }
}

/// The single result shape all backends produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(default)]
    pub cell_id: String,
    pub status: Status,
    /// Printed form of the final expression's value.
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub side_effects: Vec<SideEffect>,
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}

impl ExecutionResult {
    /// Successful execution.
    pub fn ok(
        cell_id: impl Into<String>,
        result: Option<String>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        let stdout = stdout.into();
        let stderr = stderr.into();
        Self {
            cell_id: cell_id.into(),
            status: Status::Ok,
            result,
            side_effects: side_effects(&stdout, &stderr),
            stdout,
            stderr,
            error: None,
        }
    }

    /// Failed execution; captured output is kept.
    pub fn failed(
        cell_id: impl Into<String>,
        error: ErrorInfo,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        let stdout = stdout.into();
        let stderr = stderr.into();
        Self {
            cell_id: cell_id.into(),
            status: Status::Error,
            result: None,
            side_effects: side_effects(&stdout, &stderr),
            stdout,
            stderr,
            error: Some(error),
        }
    }

    /// Failed execution before any process produced output.
    pub fn failure(cell_id: impl Into<String>, error: ErrorInfo) -> Self {
        Self::failed(cell_id, error, String::new(), String::new())
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Re-establish the model invariants on a result decoded from elsewhere.
    ///
    /// `side_effects` is recomputed from `stdout`/`stderr`; an `ok` result
    /// drops any error, and an `error` result drops its value and always
    /// carries error details.
    pub fn normalize(mut self) -> Self {
        self.side_effects = side_effects(&self.stdout, &self.stderr);
        match self.status {
            Status::Ok => self.error = None,
            Status::Error => {
                self.result = None;
                if self.error.is_none() {
                    self.error = Some(ErrorInfo::new(
                        ErrorKind::ExecutionError,
                        "error reported without details",
                        "",
                    ));
                }
            }
        }
        self
    }
}

/// Derive the ordered side-effect list: stdout first, then stderr, each
/// present only when non-empty after trimming.
pub fn side_effects(stdout: &str, stderr: &str) -> Vec<SideEffect> {
    [("stdout", stdout), ("stderr", stderr)]
        .into_iter()
        .filter_map(|(what, text)| {
            let content = text.trim();
            (!content.is_empty()).then(|| SideEffect {
                what: what.to_string(),
                content: content.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_effects_order_and_trim() {
        let effects = side_effects("  hello\n", "\nwarn  \n");
        assert_eq!(
            effects,
            vec![
                SideEffect {
                    what: "stdout".into(),
                    content: "hello".into()
                },
                SideEffect {
                    what: "stderr".into(),
                    content: "warn".into()
                },
            ]
        );
    }

    #[test]
    fn test_side_effects_skip_blank_streams() {
        assert!(side_effects("", " \n\t").is_empty());

        let only_err = side_effects("", "boom");
        assert_eq!(only_err.len(), 1);
        assert_eq!(only_err[0].what, "stderr");
    }

    #[test]
    fn test_failed_result_has_no_value() {
        let result = ExecutionResult::failed(
            "c1",
            ErrorInfo::new(ErrorKind::RuntimeError, "bad", "trace"),
            "partial\n",
            "",
        );
        assert_eq!(result.status, Status::Error);
        assert!(result.result.is_none());
        assert_eq!(result.stdout, "partial\n");
        assert_eq!(result.side_effects.len(), 1);
    }

    #[test]
    fn test_serialized_shape() {
        let result = ExecutionResult::failure(
            "cell-7",
            ErrorInfo::new(ErrorKind::CompilationError, "failed", "diag")
                .with_type_name("CompilationError"),
        );
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["cell_id"], "cell-7");
        assert_eq!(json["status"], "error");
        assert!(json["result"].is_null());
        assert_eq!(json["error"]["type"], "CompilationError");
        assert_eq!(json["error"]["kind"], "CompilationError");
        assert_eq!(json["error"]["traceback"], "diag");
        assert_eq!(json["side_effects"], serde_json::json!([]));
    }

    #[test]
    fn test_decode_kernel_reply_and_normalize() {
        let line = r#"{"cell_id": "a", "status": "error", "result": "1", "stdout": "x\n", "stderr": "",
            "side_effects": [{"what": "stdout", "content": "x\n"}, {"what": "stdout", "content": "y"}],
            "error": {"type": "ZeroDivisionError", "message": "division by zero", "traceback": "..."}}"#;
        let result: ExecutionResult = serde_json::from_str(line).unwrap();
        let result = result.normalize();

        assert!(result.result.is_none());
        let error = result.error.as_ref().unwrap();
        assert_eq!(error.kind, ErrorKind::RuntimeError);
        assert_eq!(error.type_name, "ZeroDivisionError");
        assert_eq!(result.side_effects.len(), 1);
        assert_eq!(result.side_effects[0].content, "x");
    }

    #[test]
    fn test_normalize_ok_drops_error() {
        let mut result = ExecutionResult::ok("a", Some("1".into()), "", "");
        result.error = Some(ErrorInfo::new(ErrorKind::RuntimeError, "stale", ""));
        let result = result.normalize();
        assert!(result.error.is_none());
        assert_eq!(result.result.as_deref(), Some("1"));
    }

    #[test]
    fn test_language_tags() {
        assert_eq!("py".parse::<Language>().unwrap(), Language::Python);
        assert_eq!("TS".parse::<Language>().unwrap(), Language::TypeScript);
        assert_eq!("javascript".parse::<Language>().unwrap(), Language::JavaScript);
        assert!(matches!(
            "cobol".parse::<Language>(),
            Err(Error::UnknownLanguage(tag)) if tag == "cobol"
        ));
        assert_eq!(Language::from_extension("rs"), Some(Language::Rust));
        assert_eq!(Language::from_extension("md"), None);
    }
}
