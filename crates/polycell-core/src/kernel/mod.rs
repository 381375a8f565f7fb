//! Persistent interpreter kernel.
//!
//! A single long-lived interpreter process keeps user definitions alive
//! across requests. The host writes one JSON request per line to its stdin
//! and reads one JSON message per line from its stdout:
//!
//! ```text
//! kernel -> {"status": "ready"}
//! host   -> {"code": "x = 1\nx + 1", "cell_id": "c1"}
//! kernel -> {"cell_id": "c1", "status": "ok", "result": "2", ...}
//! host   -> {"command": "shutdown"}
//! kernel -> {"status": "shutdown"}
//! ```
//!
//! Kernel stderr is logged and never parsed.

mod manager;
pub mod protocol;

pub use manager::KernelManager;
pub use protocol::{KernelCommand, KernelMessage, KernelRequest};

/// Kernel script bundled with the crate, used when no script is configured.
pub const KERNEL_SCRIPT: &str = include_str!("../../kernel/polycell_kernel.py");
