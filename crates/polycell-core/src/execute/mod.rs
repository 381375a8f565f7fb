//! Ephemeral executors for compiled and transpiled languages.
//!
//! Each call stages its own files, spawns one process (two for the compiled
//! backend), and reads the fragment's value from a result file so the
//! process's stdout and stderr stay a faithful capture of the user code.
//! Nothing outlives the call: staged files are removed when it returns and a
//! process that exceeds its budget is killed.

mod harness;
mod javascript;
mod process;
mod rust;
mod staging;
mod typescript;

pub use harness::{HarnessReport, ThrownError};
pub use javascript::{JavaScriptExecutor, generate_executor};
pub use process::{ProcessOutput, ProcessState, run_bounded};
pub use rust::{RustExecutor, generate_program};
pub use staging::Staging;
pub use typescript::{TypeScriptExecutor, generate_module};
