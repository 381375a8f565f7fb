//! Line protocol between the host and the kernel process.
//!
//! Newline-delimited JSON over stdin/stdout, one object per line.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::result::ExecutionResult;

/// Request sent from the host to the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum KernelRequest {
    /// Execute a fragment in the persistent namespace.
    Execute { code: String, cell_id: String },

    /// Ask the kernel to acknowledge and exit.
    Command { command: KernelCommand },
}

/// Control commands understood by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelCommand {
    Shutdown,
}

impl KernelRequest {
    pub fn execute(code: impl Into<String>, cell_id: impl Into<String>) -> Self {
        KernelRequest::Execute {
            code: code.into(),
            cell_id: cell_id.into(),
        }
    }

    pub fn shutdown() -> Self {
        KernelRequest::Command {
            command: KernelCommand::Shutdown,
        }
    }

    /// Encode as a single protocol line, including the trailing newline.
    pub fn encode(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Message received from the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelMessage {
    /// Handshake: the kernel is accepting requests.
    Ready,

    /// Acknowledgement of a shutdown command.
    ShutdownAck,

    /// Result of an execute request.
    Result(ExecutionResult),
}

impl KernelMessage {
    /// Decode one line of kernel output.
    ///
    /// `{"status": "ready"}` and `{"status": "shutdown"}` are control
    /// messages; anything else must be a result object.
    pub fn decode(line: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(line)?;
        match value.get("status").and_then(Value::as_str) {
            Some("ready") => Ok(KernelMessage::Ready),
            Some("shutdown") => Ok(KernelMessage::ShutdownAck),
            _ => Ok(KernelMessage::Result(serde_json::from_value(value)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Status;

    #[test]
    fn test_encode_execute() {
        let line = KernelRequest::execute("print('hi')\n1", "c1").encode().unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let value: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["code"], "print('hi')\n1");
        assert_eq!(value["cell_id"], "c1");
    }

    #[test]
    fn test_encode_shutdown() {
        let line = KernelRequest::shutdown().encode().unwrap();
        assert_eq!(line, "{\"command\":\"shutdown\"}\n");
    }

    #[test]
    fn test_decode_control_messages() {
        assert_eq!(
            KernelMessage::decode(r#"{"status": "ready", "message": "hello"}"#).unwrap(),
            KernelMessage::Ready
        );
        assert_eq!(
            KernelMessage::decode(r#"{"status": "shutdown"}"#).unwrap(),
            KernelMessage::ShutdownAck
        );
    }

    #[test]
    fn test_decode_result() {
        let line = r#"{"cell_id": "c1", "status": "ok", "result": "2", "stdout": "", "stderr": "", "side_effects": [], "error": null}"#;
        let KernelMessage::Result(result) = KernelMessage::decode(line).unwrap() else {
            panic!("expected result");
        };
        assert_eq!(result.cell_id, "c1");
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.result.as_deref(), Some("2"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(KernelMessage::decode("Traceback (most recent call last):").is_err());
        assert!(KernelMessage::decode(r#"{"status": "busy"}"#).is_err());
        assert!(KernelMessage::decode(r#"{"cell_id": "c1"}"#).is_err());
    }
}
