//! Bounded subprocess execution with output capture.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// Time allowed for output pipes to drain after the process is gone.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// How a bounded process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Exited(ExitStatus),
    /// Killed after exceeding its budget.
    TimedOut,
}

/// Captured result of a bounded process.
#[derive(Debug)]
pub struct ProcessOutput {
    pub state: ProcessState,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        matches!(self.state, ProcessState::Exited(status) if status.success())
    }

    /// Human-readable description of an unsuccessful ending.
    pub fn describe_failure(&self, timeout: Duration) -> String {
        match self.state {
            ProcessState::TimedOut => {
                format!("process timed out after {}ms", timeout.as_millis())
            }
            ProcessState::Exited(status) => match status.code() {
                Some(code) => format!("process exited with code {}", code),
                None => "process terminated by signal".to_string(),
            },
        }
    }
}

/// Run a command to completion, killing it if it exceeds `timeout`.
///
/// Stdin is closed. Output written before a timeout or crash is still
/// returned.
pub async fn run_bounded(mut command: Command, timeout: Duration) -> io::Result<ProcessOutput> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn()?;

    let stdout_buf = Arc::new(Mutex::new(Vec::new()));
    let stderr_buf = Arc::new(Mutex::new(Vec::new()));
    let readers = [
        child.stdout.take().map(|s| spawn_reader(s, stdout_buf.clone())),
        child.stderr.take().map(|s| spawn_reader(s, stderr_buf.clone())),
    ];

    let state = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => ProcessState::Exited(status?),
        Err(_) => {
            tracing::debug!("Process exceeded {:?}, killing", timeout);
            // The process may have exited between the timeout and the kill.
            if let Err(e) = child.start_kill() {
                tracing::debug!("Kill failed: {}", e);
            }
            child.wait().await?;
            ProcessState::TimedOut
        }
    };

    for reader in readers.into_iter().flatten() {
        drain(reader).await;
    }

    Ok(ProcessOutput {
        state,
        stdout: take_text(&stdout_buf),
        stderr: take_text(&stderr_buf),
    })
}

fn spawn_reader<R>(mut stream: R, buffer: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => buffer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&chunk[..n]),
                Err(e) => {
                    tracing::debug!("Output read failed: {}", e);
                    break;
                }
            }
        }
    })
}

/// Wait briefly for a reader; grandchildren may keep the pipe open.
async fn drain(mut reader: JoinHandle<()>) {
    if tokio::time::timeout(DRAIN_TIMEOUT, &mut reader).await.is_err() {
        reader.abort();
    }
}

fn take_text(buffer: &Mutex<Vec<u8>>) -> String {
    let bytes = std::mem::take(&mut *buffer.lock().unwrap_or_else(PoisonError::into_inner));
    String::from_utf8_lossy(&bytes).into_owned()
}
