//! Out-of-process execution engine for polyglot notebook cells.
//!
//! This crate provides:
//! - A uniform result model shared by every backend
//! - Source transformation that captures a fragment's trailing expression
//! - Ephemeral compile-and-run pipelines (Rust, JavaScript, TypeScript)
//! - A persistent interpreter kernel speaking newline-delimited JSON (Python)
//! - An execution façade that dispatches on the language tag

pub mod config;
pub mod engine;
pub mod error;
pub mod execute;
pub mod kernel;
pub mod result;
pub mod toolchain;
pub mod transform;

pub use config::{EngineConfig, KernelConfig, ToolchainOverrides};
pub use engine::ExecutionEngine;
pub use error::{Error, Result};
pub use execute::{JavaScriptExecutor, RustExecutor, TypeScriptExecutor};
pub use kernel::{KernelManager, KernelMessage};
pub use result::{
    ErrorInfo, ErrorKind, ExecutionRequest, ExecutionResult, Language, SideEffect, Status,
};
pub use toolchain::{SystemToolchains, Toolchain, ToolchainResolver};
pub use transform::{Dialect, extract_imports, split_rust_source, transform_for_return};
