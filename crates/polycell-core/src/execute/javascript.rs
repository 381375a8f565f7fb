//! JavaScript backend: a one-shot script run under bun or node.

use std::path::Path;
use std::sync::Arc;

use tokio::process::Command;

use super::harness::{HarnessReport, js_string_literal, missing_report};
use super::process::{ProcessState, run_bounded};
use super::staging::Staging;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::result::{ErrorInfo, ErrorKind, ExecutionResult};
use crate::toolchain::{Toolchain, ToolchainResolver};
use crate::transform::{Dialect, transform_for_return};

/// Executes JavaScript fragments.
///
/// The transformed fragment and a separate executor script are staged; the
/// executor evaluates the fragment inside an async function so `await`
/// works at the top level, then writes its report to the result file.
pub struct JavaScriptExecutor {
    config: Arc<EngineConfig>,
    toolchains: Arc<dyn ToolchainResolver>,
}

impl JavaScriptExecutor {
    pub fn new(config: Arc<EngineConfig>, toolchains: Arc<dyn ToolchainResolver>) -> Self {
        Self { config, toolchains }
    }

    pub async fn execute(&self, code: &str, cell_id: &str) -> ExecutionResult {
        match self.try_execute(code, cell_id).await {
            Ok(result) => result,
            Err(e) => ExecutionResult::failure(cell_id, ErrorInfo::from(&e)),
        }
    }

    async fn try_execute(&self, code: &str, cell_id: &str) -> Result<ExecutionResult> {
        let runtime = self
            .toolchains
            .resolve(Toolchain::JavaScript)
            .ok_or(Error::ToolchainNotFound(Toolchain::JavaScript))?;

        let mut staging = Staging::new(&self.config.temp_dir, "js");
        let result_path = staging.path("_result.json");
        let user_path = staging
            .write("_user.js", &transform_for_return(code, Dialect::JavaScript))
            .await?;
        let executor = generate_executor(&user_path, &result_path, self.config.inspect_depth);
        let executor_path = staging.write("_executor.js", &executor).await?;

        tracing::debug!("Running {} with {}", executor_path.display(), runtime.display());

        let mut command = Command::new(&runtime);
        command.arg(&executor_path);
        let output = run_bounded(command, self.config.run_timeout).await?;

        if !output.success() {
            let message = match output.state {
                ProcessState::TimedOut => output.describe_failure(self.config.run_timeout),
                ProcessState::Exited(_) => "JavaScript execution failed".to_string(),
            };
            let traceback = if output.stderr.trim().is_empty() {
                output.describe_failure(self.config.run_timeout)
            } else {
                output.stderr.clone()
            };
            return Ok(ExecutionResult::failed(
                cell_id,
                ErrorInfo::new(ErrorKind::RuntimeError, message, traceback),
                output.stdout,
                output.stderr,
            ));
        }

        Ok(match HarnessReport::read(&result_path).await {
            Some(report) => report.into_result(cell_id, output),
            None => missing_report(cell_id, output),
        })
    }
}

/// Build the executor script for an already-transformed user file.
pub fn generate_executor(user_path: &Path, result_path: &Path, inspect_depth: u32) -> String {
    format!(
        r#"const fs = require('fs');
const util = require('util');

const resultFile = {result};
const source = fs.readFileSync({user}, 'utf8');
const wrapped = `(async () => {{\n${{source}}\n}})()`;

(async () => {{
    try {{
        const value = await eval(wrapped);
        fs.writeFileSync(resultFile, JSON.stringify({{
            status: 'ok',
            result: value === undefined ? null : util.inspect(value, {{ depth: {depth}, colors: false }})
        }}));
    }} catch (e) {{
        const thrown = e ?? {{}};
        fs.writeFileSync(resultFile, JSON.stringify({{
            status: 'error',
            error: {{
                name: String(thrown.name || 'Error'),
                message: String(thrown.message || e),
                stack: String(thrown.stack || '')
            }}
        }}));
    }}
}})();
"#,
        result = js_string_literal(result_path),
        user = js_string_literal(user_path),
        depth = inspect_depth,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_embeds_paths_and_depth() {
        let script = generate_executor(Path::new("/tmp/u.js"), Path::new("/tmp/r.json"), 3);

        assert!(script.contains(r#"const resultFile = "/tmp/r.json";"#));
        assert!(script.contains(r#"fs.readFileSync("/tmp/u.js", 'utf8')"#));
        assert!(script.contains("{ depth: 3, colors: false }"));
        assert!(script.contains("const wrapped = `(async () => {\\n${source}\\n})()`;"));
    }

    #[test]
    fn test_executor_reports_null_for_undefined() {
        let script = generate_executor(Path::new("/u.js"), Path::new("/r.json"), 5);
        assert!(script.contains("value === undefined ? null"));
        assert!(script.contains("status: 'error'"));
    }
}
