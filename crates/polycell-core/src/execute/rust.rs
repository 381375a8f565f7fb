//! Compiled backend: rustc compile step, then a one-shot run.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use tokio::process::Command;

use super::process::{ProcessState, run_bounded};
use super::staging::Staging;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::result::{ErrorInfo, ErrorKind, ExecutionResult};
use crate::toolchain::{Toolchain, ToolchainResolver};
use crate::transform::{RustSource, split_rust_source};

/// Placeholder substituted for the temporary source path in diagnostics.
const SOURCE_PLACEHOLDER: &str = "<rust>";

/// Executes Rust fragments by compiling a generated program and running it.
pub struct RustExecutor {
    config: Arc<EngineConfig>,
    toolchains: Arc<dyn ToolchainResolver>,
}

impl RustExecutor {
    pub fn new(config: Arc<EngineConfig>, toolchains: Arc<dyn ToolchainResolver>) -> Self {
        Self { config, toolchains }
    }

    /// Compile and run a fragment. Never fails; failures are reported in the result.
    pub async fn execute(&self, code: &str, cell_id: &str) -> ExecutionResult {
        match self.try_execute(code, cell_id).await {
            Ok(result) => result,
            Err(e) => ExecutionResult::failure(cell_id, ErrorInfo::from(&e)),
        }
    }

    async fn try_execute(&self, code: &str, cell_id: &str) -> Result<ExecutionResult> {
        let rustc = self
            .toolchains
            .resolve(Toolchain::Rustc)
            .ok_or(Error::ToolchainNotFound(Toolchain::Rustc))?;

        let source = split_rust_source(code);
        let mut staging = Staging::new(&self.config.temp_dir, "rust");
        let result_path = staging.path("_result.txt");
        let binary_path = staging.path(std::env::consts::EXE_SUFFIX);
        let program = generate_program(&source, &result_path);
        let source_path = staging.write(".rs", &program).await?;

        tracing::debug!("Compiling {} with {}", source_path.display(), rustc.display());

        let mut compile = Command::new(&rustc);
        compile
            .arg("--edition")
            .arg(&self.config.rust_edition)
            .arg(&source_path)
            .arg("-o")
            .arg(&binary_path);

        let compiled = run_bounded(compile, self.config.compile_timeout).await?;
        if !compiled.success() {
            let diagnostics = match compiled.state {
                ProcessState::TimedOut => compiled.describe_failure(self.config.compile_timeout),
                ProcessState::Exited(_) => clean_diagnostics(&compiled.stderr, &source_path),
            };
            return Ok(ExecutionResult::failed(
                cell_id,
                ErrorInfo::new(
                    ErrorKind::CompilationError,
                    "Failed to compile Rust code",
                    diagnostics.clone(),
                ),
                "",
                diagnostics,
            ));
        }

        let run = run_bounded(Command::new(&binary_path), self.config.run_timeout).await?;
        if !run.success() {
            let traceback = if run.stderr.trim().is_empty() {
                run.describe_failure(self.config.run_timeout)
            } else {
                run.stderr.clone()
            };
            let message = match run.state {
                ProcessState::TimedOut => run.describe_failure(self.config.run_timeout),
                ProcessState::Exited(_) => "Rust program exited with error".to_string(),
            };
            return Ok(ExecutionResult::failed(
                cell_id,
                ErrorInfo::new(ErrorKind::RuntimeError, message, traceback),
                run.stdout,
                run.stderr,
            ));
        }

        if !source.captures_value() {
            return Ok(ExecutionResult::ok(cell_id, None, run.stdout, run.stderr));
        }

        match tokio::fs::read_to_string(&result_path).await {
            Ok(text) => {
                let value = text.trim();
                let value = (value != "()").then(|| value.to_string());
                Ok(ExecutionResult::ok(cell_id, value, run.stdout, run.stderr))
            }
            Err(e) => {
                tracing::debug!("Result file unreadable: {}", e);
                Ok(ExecutionResult::failed(
                    cell_id,
                    ErrorInfo::new(ErrorKind::ExecutionError, "No result produced", ""),
                    run.stdout,
                    run.stderr,
                ))
            }
        }
    }
}

/// Build the program compiled for a fragment.
///
/// Inner attributes are hoisted to the top of the file, definitions follow,
/// and the body is evaluated as a block whose `Debug` form is written to
/// `result_path`.
pub fn generate_program(source: &RustSource, result_path: &Path) -> String {
    if source.has_entry_point {
        return source.definitions.clone();
    }

    let (inner_attributes, definitions): (Vec<&str>, Vec<&str>) = source
        .definitions
        .lines()
        .partition(|line| line.trim_start().starts_with("#!["));

    let mut program = String::new();
    for attribute in &inner_attributes {
        program.push_str(attribute);
        program.push('\n');
    }
    program.push_str("#![allow(unused)]\n");

    let Some(body) = &source.body else {
        let _ = write!(program, "\n{}\n\nfn main() {{}}\n", definitions.join("\n"));
        return program;
    };

    let path_literal = format!("{:?}", result_path.to_string_lossy());
    let _ = write!(
        program,
        r#"use std::io::Write as _;

{definitions}

fn main() {{
    let __polycell_value = {{
{body}
    }};
    if let Ok(mut __polycell_out) = std::fs::File::create({path_literal}) {{
        let _ = write!(__polycell_out, "{{:?}}", __polycell_value);
    }}
}}
"#,
        definitions = definitions.join("\n"),
    );
    program
}

/// Replace the temporary source path in compiler output.
fn clean_diagnostics(stderr: &str, source_path: &Path) -> String {
    stderr.replace(source_path.to_string_lossy().as_ref(), SOURCE_PLACEHOLDER)
}
