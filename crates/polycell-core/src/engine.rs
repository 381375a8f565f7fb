//! Execution façade.
//!
//! [`ExecutionEngine`] owns one executor per backend and the persistent
//! kernel, and routes each request by language. Failures of the user's code
//! always come back as an [`ExecutionResult`]; only caller mistakes such as
//! an unknown language tag are returned as [`Error`].

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::Instrument;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::execute::{JavaScriptExecutor, RustExecutor, TypeScriptExecutor};
use crate::kernel::KernelManager;
use crate::result::{ErrorInfo, ExecutionRequest, ExecutionResult, Language};
use crate::toolchain::{SystemToolchains, Toolchain, ToolchainResolver};

/// Dispatches execution requests to the matching backend.
///
/// Ephemeral backends run concurrently without restriction. Kernel requests
/// are serialized through a mutex, so concurrent Python calls queue instead
/// of racing on the kernel's single pending slot.
pub struct ExecutionEngine {
    config: Arc<EngineConfig>,
    toolchains: Arc<dyn ToolchainResolver>,
    kernel: Mutex<KernelManager>,
    rust: RustExecutor,
    javascript: JavaScriptExecutor,
    typescript: TypeScriptExecutor,
}

impl ExecutionEngine {
    /// Create an engine resolving toolchains from config, environment and PATH.
    pub fn new(config: EngineConfig) -> Self {
        let resolver = SystemToolchains::new(config.toolchains.clone());
        Self::with_resolver(config, Arc::new(resolver))
    }

    /// Create an engine with a custom toolchain resolver.
    pub fn with_resolver(config: EngineConfig, toolchains: Arc<dyn ToolchainResolver>) -> Self {
        let config = Arc::new(config);
        Self {
            kernel: Mutex::new(KernelManager::new(
                config.kernel.clone(),
                config.temp_dir.clone(),
            )),
            rust: RustExecutor::new(config.clone(), toolchains.clone()),
            javascript: JavaScriptExecutor::new(config.clone(), toolchains.clone()),
            typescript: TypeScriptExecutor::new(config.clone(), toolchains.clone()),
            config,
            toolchains,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute a request on its backend.
    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        let span = tracing::info_span!(
            "execute",
            cell_id = %request.cell_id,
            language = %request.language
        );
        self.dispatch(request).instrument(span).await
    }

    /// Execute code given a textual language tag.
    ///
    /// Returns [`Error::UnknownLanguage`] before anything is spawned if the
    /// tag names no backend.
    pub async fn execute_tagged(
        &self,
        code: &str,
        language: &str,
        cell_id: &str,
    ) -> Result<ExecutionResult> {
        let language: Language = language.parse()?;
        Ok(self
            .execute(&ExecutionRequest::new(code, cell_id, language))
            .await)
    }

    async fn dispatch(&self, request: &ExecutionRequest) -> ExecutionResult {
        let ExecutionRequest {
            code,
            cell_id,
            language,
        } = request;

        tracing::debug!("Dispatching {} bytes", code.len());
        let result = match language {
            Language::Python => self.execute_python(code, cell_id).await,
            Language::Rust => self.rust.execute(code, cell_id).await,
            Language::JavaScript => self.javascript.execute(code, cell_id).await,
            Language::TypeScript => self.typescript.execute(code, cell_id).await,
        };

        if let Some(error) = &result.error {
            tracing::debug!("Execution failed: {} ({})", error.kind, error.message);
        }
        result
    }

    async fn execute_python(&self, code: &str, cell_id: &str) -> ExecutionResult {
        let Some(python) = self.toolchains.resolve(Toolchain::Python) else {
            let err = Error::ToolchainNotFound(Toolchain::Python);
            return ExecutionResult::failure(cell_id, ErrorInfo::from(&err));
        };

        let mut kernel = self.kernel.lock().await;
        match kernel.execute(code, cell_id, &python).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Kernel request failed: {}", e);
                ExecutionResult::failure(cell_id, ErrorInfo::from(&e))
            }
        }
    }

    /// Restart the kernel with its current interpreter.
    pub async fn restart_kernel(&self) -> Result<()> {
        self.kernel.lock().await.restart().await
    }

    /// Interpreter path of the running kernel, if any.
    pub async fn kernel_runtime(&self) -> Option<PathBuf> {
        self.kernel.lock().await.runtime_path().map(PathBuf::from)
    }

    /// Stop the kernel. Ephemeral backends hold nothing between calls.
    pub async fn shutdown(&self) {
        self.kernel.lock().await.shutdown().await;
    }

    /// Resolve a toolchain through the engine's resolver.
    pub fn resolve(&self, toolchain: Toolchain) -> Option<PathBuf> {
        self.toolchains.resolve(toolchain)
    }
}
