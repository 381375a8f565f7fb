//! Lifecycle of the persistent kernel process.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tempfile::NamedTempFile;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::KERNEL_SCRIPT;
use super::protocol::{KernelMessage, KernelRequest};
use crate::config::KernelConfig;
use crate::error::{Error, Result};
use crate::result::ExecutionResult;

/// Owns at most one kernel process and its request/response bookkeeping.
///
/// The process is started lazily by [`execute`](Self::execute) and keeps
/// its namespace across calls. `execute` takes `&mut self`, so at most one
/// request is in flight per manager; share a manager behind an async mutex.
///
/// Dropping the manager kills the process.
pub struct KernelManager {
    config: KernelConfig,
    temp_dir: PathBuf,
    session: Option<KernelSession>,
    runtime_path: Option<PathBuf>,
    bundled_script: Option<NamedTempFile>,
}

/// A running kernel process.
struct KernelSession {
    pid: Option<u32>,
    stdin: ChildStdin,
    shared: Arc<SessionShared>,
    /// Sending (or dropping) this kills the process.
    kill_tx: oneshot::Sender<()>,
    /// Owns the child and its stdout; resolves to the exit status.
    monitor: JoinHandle<Option<ExitStatus>>,
    stderr_task: Option<JoinHandle<()>>,
}

/// State shared between the manager and the stdout reader task.
#[derive(Default)]
struct SessionShared {
    ready: AtomicBool,
    calls: Mutex<CallSlot>,
    handshake: Mutex<Option<oneshot::Sender<()>>>,
}

#[derive(Default)]
struct CallSlot {
    pending: Option<PendingCall>,
    exited: bool,
    exit_code: Option<i32>,
}

struct PendingCall {
    cell_id: String,
    reply: oneshot::Sender<Result<ExecutionResult>>,
}

impl KernelManager {
    /// Create a manager. Nothing is spawned until the first request.
    pub fn new(config: KernelConfig, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            temp_dir: temp_dir.into(),
            session: None,
            runtime_path: None,
            bundled_script: None,
        }
    }

    /// Start a kernel with the given interpreter, replacing any running one.
    ///
    /// Returns once the kernel has announced it is ready.
    pub async fn start(&mut self, runtime_path: &Path) -> Result<()> {
        self.shutdown().await;

        let script = self.script_path()?;
        tracing::info!(
            "Starting kernel: {} {}",
            runtime_path.display(),
            script.display()
        );

        let mut child = Command::new(runtime_path)
            .args(&self.config.interpreter_args)
            .arg(&script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::KernelStartup(format!(
                    "failed to spawn '{}': {}",
                    runtime_path.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::KernelStartup("failed to get kernel stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::KernelStartup("failed to get kernel stdout".to_string()))?;
        let stderr_task = child.stderr.take().map(|s| tokio::spawn(log_stderr(s)));

        let shared = Arc::new(SessionShared::default());
        let (ready_tx, ready_rx) = oneshot::channel();
        *lock(&shared.handshake) = Some(ready_tx);

        let (kill_tx, kill_rx) = oneshot::channel();
        let pid = child.id();
        let monitor = tokio::spawn(monitor(child, stdout, shared.clone(), kill_rx));

        self.session = Some(KernelSession {
            pid,
            stdin,
            shared: shared.clone(),
            kill_tx,
            monitor,
            stderr_task,
        });
        self.runtime_path = Some(runtime_path.to_path_buf());

        match tokio::time::timeout(self.config.startup_timeout, ready_rx).await {
            Ok(Ok(())) => {
                tracing::info!("Kernel is ready (pid {:?})", pid);
                Ok(())
            }
            Ok(Err(_)) => {
                let code = shared.exit_code();
                self.shutdown().await;
                Err(Error::KernelProcessExited { code })
            }
            Err(_) => {
                self.shutdown().await;
                Err(Error::KernelStartup(format!(
                    "no ready message within {}ms",
                    self.config.startup_timeout.as_millis()
                )))
            }
        }
    }

    /// Execute a fragment, starting or replacing the kernel first if it is
    /// not running or was started with a different interpreter.
    ///
    /// On timeout the pending request is abandoned but the process is left
    /// running so its namespace survives.
    pub async fn execute(
        &mut self,
        code: &str,
        cell_id: &str,
        runtime_path: &Path,
    ) -> Result<ExecutionResult> {
        if !self.is_alive() || self.runtime_path.as_deref() != Some(runtime_path) {
            self.start(runtime_path).await?;
        }

        let session = self.session.as_mut().ok_or(Error::KernelNotRunning)?;
        let reply = session.shared.begin_call(cell_id)?;

        let line = KernelRequest::execute(code, cell_id).encode()?;
        tracing::debug!("[send] {}", line.trim_end());
        if let Err(e) = session.write_line(&line).await {
            // A dead process resolves the pending call from the reader task.
            tracing::warn!("Failed to write kernel request: {}", e);
        }

        match tokio::time::timeout(self.config.request_timeout, reply).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::KernelProcessExited {
                code: session.shared.exit_code(),
            }),
            Err(_) => {
                session.shared.abandon_call();
                tracing::warn!(
                    "Kernel request {} timed out after {}ms; kernel left running",
                    cell_id,
                    self.config.request_timeout.as_millis()
                );
                Err(Error::ExecutionTimeout(self.config.request_timeout))
            }
        }
    }

    /// Stop the kernel: ask it to exit, wait briefly, then kill it.
    ///
    /// Safe to call repeatedly. Clears the remembered interpreter path.
    pub async fn shutdown(&mut self) {
        self.runtime_path = None;
        let Some(mut session) = self.session.take() else {
            return;
        };

        if !session.shared.has_exited() {
            match KernelRequest::shutdown().encode() {
                Ok(line) => {
                    if let Err(e) = session.write_line(&line).await {
                        tracing::debug!("Failed to send shutdown: {}", e);
                    }
                }
                Err(e) => tracing::debug!("Failed to encode shutdown: {}", e),
            }
        }

        let KernelSession {
            stdin,
            kill_tx,
            mut monitor,
            stderr_task,
            ..
        } = session;
        drop(stdin);

        let status = match tokio::time::timeout(self.config.shutdown_grace, &mut monitor).await {
            Ok(joined) => joined.ok().flatten(),
            Err(_) => {
                let _ = kill_tx.send(());
                monitor.await.ok().flatten()
            }
        };

        if let Some(task) = stderr_task {
            task.abort();
        }

        tracing::info!("Kernel shut down ({:?})", status);
    }

    /// Restart with the interpreter of the current session.
    pub async fn restart(&mut self) -> Result<()> {
        let runtime_path = self.runtime_path.clone().ok_or(Error::NoKnownRuntime)?;
        self.start(&runtime_path).await
    }

    /// A process is running and has completed its handshake.
    pub fn is_alive(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.shared.has_exited() && s.shared.ready.load(Ordering::SeqCst))
    }

    /// The kernel has announced readiness and not acknowledged a shutdown.
    pub fn is_ready(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.shared.ready.load(Ordering::SeqCst))
    }

    /// Interpreter the current session was started with.
    pub fn runtime_path(&self) -> Option<&Path> {
        self.runtime_path.as_deref()
    }

    /// OS process id of a running kernel.
    pub fn pid(&self) -> Option<u32> {
        self.session
            .as_ref()
            .filter(|s| !s.shared.has_exited())
            .and_then(|s| s.pid)
    }

    fn script_path(&mut self) -> Result<PathBuf> {
        if let Some(path) = &self.config.script {
            return Ok(path.clone());
        }
        if let Some(file) = &self.bundled_script {
            return Ok(file.path().to_path_buf());
        }

        std::fs::create_dir_all(&self.temp_dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("polycell_kernel_")
            .suffix(".py")
            .tempfile_in(&self.temp_dir)?;
        file.write_all(KERNEL_SCRIPT.as_bytes())?;
        file.flush()?;

        let path = file.path().to_path_buf();
        self.bundled_script = Some(file);
        Ok(path)
    }
}

impl KernelSession {
    async fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await
    }
}

impl SessionShared {
    fn has_exited(&self) -> bool {
        lock(&self.calls).exited
    }

    fn exit_code(&self) -> Option<i32> {
        lock(&self.calls).exit_code
    }

    /// Register the in-flight call. Fails if the process is already gone.
    fn begin_call(&self, cell_id: &str) -> Result<oneshot::Receiver<Result<ExecutionResult>>> {
        let mut calls = lock(&self.calls);
        if calls.exited {
            return Err(Error::KernelProcessExited {
                code: calls.exit_code,
            });
        }
        let (reply, rx) = oneshot::channel();
        calls.pending = Some(PendingCall {
            cell_id: cell_id.to_string(),
            reply,
        });
        Ok(rx)
    }

    fn abandon_call(&self) {
        lock(&self.calls).pending = None;
    }

    fn dispatch(&self, line: &str) {
        tracing::debug!("[kernel] {}", line);
        match KernelMessage::decode(line) {
            Ok(KernelMessage::Ready) => {
                self.ready.store(true, Ordering::SeqCst);
                if let Some(tx) = lock(&self.handshake).take() {
                    let _ = tx.send(());
                }
            }
            Ok(KernelMessage::ShutdownAck) => self.ready.store(false, Ordering::SeqCst),
            Ok(KernelMessage::Result(result)) => self.complete(result.normalize()),
            Err(e) => tracing::warn!("Ignoring unparseable kernel output {:?}: {}", line, e),
        }
    }

    fn complete(&self, result: ExecutionResult) {
        let mut calls = lock(&self.calls);
        match calls.pending.take() {
            Some(call) if call.cell_id == result.cell_id => {
                let _ = call.reply.send(Ok(result));
            }
            Some(call) => {
                tracing::warn!(
                    "Dropping kernel result for {:?} while waiting for {:?}",
                    result.cell_id,
                    call.cell_id
                );
                calls.pending = Some(call);
            }
            None => tracing::warn!(
                "Dropping kernel result for {:?} with no request in flight",
                result.cell_id
            ),
        }
    }

    /// Record the exit and fail whatever was waiting on the process.
    fn mark_exited(&self, code: Option<i32>) {
        self.ready.store(false, Ordering::SeqCst);
        let pending = {
            let mut calls = lock(&self.calls);
            calls.exited = true;
            calls.exit_code = code;
            calls.pending.take()
        };
        if let Some(call) = pending {
            let _ = call.reply.send(Err(Error::KernelProcessExited { code }));
        }
        lock(&self.handshake).take();
    }
}

/// Read kernel stdout until EOF or a kill request, then reap the process.
async fn monitor(
    mut child: Child,
    stdout: ChildStdout,
    shared: Arc<SessionShared>,
    mut kill_rx: oneshot::Receiver<()>,
) -> Option<ExitStatus> {
    let mut lines = BufReader::new(stdout).lines();
    let mut killed = false;

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => shared.dispatch(&line),
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Kernel stdout read failed: {}", e);
                    break;
                }
            },
            _ = &mut kill_rx => {
                killed = true;
                break;
            }
        }
    }

    let status = if killed {
        kill_and_wait(&mut child).await
    } else {
        tokio::select! {
            status = child.wait() => status.ok(),
            _ = &mut kill_rx => kill_and_wait(&mut child).await,
        }
    };

    let code = status.and_then(|s| s.code());
    tracing::info!("Kernel process exited ({:?})", status);
    shared.mark_exited(code);
    status
}

async fn kill_and_wait(child: &mut Child) -> Option<ExitStatus> {
    if let Err(e) = child.start_kill() {
        tracing::debug!("Kernel kill failed: {}", e);
    }
    child.wait().await.ok()
}

async fn log_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!("[kernel stderr] {}", line);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
