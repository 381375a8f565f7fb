//! TypeScript backend: a single generated module run with `bun run`.

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
use crate::transform::{Dialect, extract_imports, transform_for_return};

/// Executes TypeScript fragments.
///
/// Imports are hoisted to module level; the rest of the fragment runs inside
/// an async function whose settled value is reported through the result file.
pub struct TypeScriptExecutor {
    config: Arc<EngineConfig>,
    toolchains: Arc<dyn ToolchainResolver>,
}

impl TypeScriptExecutor {
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
            .resolve(Toolchain::TypeScript)
            .ok_or(Error::ToolchainNotFound(Toolchain::TypeScript))?;

        let mut staging = Staging::new(&self.config.temp_dir, "ts");
        let result_path = staging.path("_result.json");
        let module = generate_module(code, &result_path, self.config.inspect_depth);
        let module_path = staging.write(".ts", &module).await?;

        tracing::debug!("Running {} with {}", module_path.display(), runtime.display());

        let mut command = Command::new(&runtime);
        command.arg("run").arg(&module_path);
        let output = run_bounded(command, self.config.run_timeout).await?;

        if let ProcessState::TimedOut = output.state {
            let message = output.describe_failure(self.config.run_timeout);
            let traceback = if output.stderr.trim().is_empty() {
                message.clone()
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

        let report = HarnessReport::read(&result_path).await;
        Ok(match (output.success(), report) {
            (_, Some(report)) => report.into_result(cell_id, output),
            (true, None) => missing_report(cell_id, output),
            // Exited non-zero before the harness ran: the module did not transpile.
            (false, None) => {
                let message = if output.stderr.trim().is_empty() {
                    "TypeScript compilation failed".to_string()
                } else {
                    output.stderr.trim().to_string()
                };
                let traceback = output.stderr.clone();
                ExecutionResult::failed(
                    cell_id,
                    ErrorInfo::new(ErrorKind::CompilationError, message, traceback),
                    output.stdout,
                    output.stderr,
                )
            }
        })
    }
}

/// Build the module executed for a fragment.
pub fn generate_module(code: &str, result_path: &Path, inspect_depth: u32) -> String {
    let extracted = extract_imports(code);
    let body = transform_for_return(&extracted.body, Dialect::TypeScript);
    let result = js_string_literal(result_path);

    let mut module = String::from(
        "import { writeFileSync as __polycellWrite } from 'fs';\n\
         import { inspect as __polycellInspect } from 'util';\n",
    );
    for import in &extracted.imports {
        module.push_str(import);
        module.push('\n');
    }

    module.push_str(&format!(
        r#"
const __polycellFail = (e: any) => {{
    const thrown = e ?? {{}};
    __polycellWrite({result}, JSON.stringify({{
        status: 'error',
        error: {{
            name: String(thrown.name || 'Error'),
            message: String(thrown.message || e),
            stack: String(thrown.stack || '')
        }}
    }}));
}};

(async () => {{
{body}
}})().then((value: unknown) => {{
    __polycellWrite({result}, JSON.stringify({{
        status: 'ok',
        result: value === undefined ? null : __polycellInspect(value, {{ depth: {inspect_depth}, colors: false }})
    }}));
}}, __polycellFail);
"#,
    ));
    module
}
