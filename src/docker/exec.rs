//! Limit-enforcing exec primitive. Runs exactly one command inside a pool
//! container with a hard wall-clock timeout and hard per-stream output
//! ceilings, returning captured output or a typed failure. Reused by the
//! compile step and by every test-case run.

use bollard::container::LogOutput;
use bollard::exec::{CreateExecOptions, StartExecResults};
use futures::stream::StreamExt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::DockerClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputStream::Stdout => write!(f, "stdout"),
            OutputStream::Stderr => write!(f, "stderr"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("process exceeded the time limit of {limit_ms} ms")]
    Timeout { limit_ms: u64 },

    #[error("process exceeded the {stream} limit of {limit_bytes} bytes")]
    OutputLimit {
        stream: OutputStream,
        limit_bytes: u64,
    },

    #[error(transparent)]
    Runtime(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ExecLimits {
    pub time_limit_ms: u64,
    pub max_stdout_bytes: u64,
    pub max_stderr_bytes: u64,
    /// Command-line pattern to SIGKILL inside the container when the exec is
    /// abandoned after a timeout or overflow. Usually the workspace id.
    pub kill_pattern: Option<String>,
}

/// Byte accumulator with a hard ceiling. `push` reports whether the chunk
/// still fit; the first overflowing chunk is discarded.
struct CappedBuffer {
    data: Vec<u8>,
    cap: u64,
}

impl CappedBuffer {
    fn new(cap: u64) -> Self {
        Self {
            data: Vec::new(),
            cap,
        }
    }

    fn push(&mut self, chunk: &[u8]) -> bool {
        if self.data.len() as u64 + chunk.len() as u64 > self.cap {
            return false;
        }
        self.data.extend_from_slice(chunk);
        true
    }

    fn into_string(self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Run one command in `container`, optionally feeding stdin, enforcing the
/// wall-clock and output-size limits in `limits`.
pub async fn exec_with_limits(
    client: &DockerClient,
    container: &str,
    cmd: Vec<String>,
    env: Vec<String>,
    stdin: Option<&str>,
    limits: &ExecLimits,
) -> Result<ExecOutput, ExecError> {
    let exec_config = CreateExecOptions {
        cmd: Some(cmd),
        env: if env.is_empty() { None } else { Some(env) },
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        attach_stdin: Some(stdin.is_some()),
        ..Default::default()
    };

    let exec = client
        .docker
        .create_exec(container, exec_config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create exec: {e}"))?;

    let started = Instant::now();
    let start_result = client
        .docker
        .start_exec(&exec.id, None)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start exec: {e}"))?;

    let StartExecResults::Attached { mut output, mut input } = start_result else {
        return Err(anyhow::anyhow!("exec unexpectedly detached").into());
    };

    if let Some(data) = stdin {
        if let Err(e) = input.write_all(data.as_bytes()).await {
            debug!("Failed to write exec stdin: {}", e);
        }
        let _ = input.shutdown().await;
    }
    drop(input);

    let mut stdout = CappedBuffer::new(limits.max_stdout_bytes);
    let mut stderr = CappedBuffer::new(limits.max_stderr_bytes);

    let deadline = Duration::from_millis(limits.time_limit_ms);
    let drain = async {
        while let Some(msg) = output.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("Error reading exec output: {}", e);
                    continue;
                }
            };
            match msg {
                LogOutput::StdOut { message } => {
                    if !stdout.push(&message) {
                        return Some(OutputStream::Stdout);
                    }
                }
                LogOutput::StdErr { message } => {
                    if !stderr.push(&message) {
                        return Some(OutputStream::Stderr);
                    }
                }
                _ => {}
            }
        }
        None
    };

    let overflowed = match tokio::time::timeout(deadline, drain).await {
        Ok(overflowed) => overflowed,
        Err(_) => {
            reap(client, container, limits).await;
            return Err(ExecError::Timeout {
                limit_ms: limits.time_limit_ms,
            });
        }
    };

    if let Some(stream) = overflowed {
        reap(client, container, limits).await;
        let limit_bytes = match stream {
            OutputStream::Stdout => limits.max_stdout_bytes,
            OutputStream::Stderr => limits.max_stderr_bytes,
        };
        return Err(ExecError::OutputLimit { stream, limit_bytes });
    }

    let elapsed_ms = started.elapsed().as_millis() as u64;

    let inspect = client
        .docker
        .inspect_exec(&exec.id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to inspect exec: {e}"))?;
    let exit_code = inspect.exit_code.unwrap_or(-1);

    let stdout = stdout.into_string();
    let mut stderr = stderr.into_string();
    if exit_code != 0 && stderr.trim().is_empty() {
        stderr = format!("process exited with code {exit_code}");
    }

    Ok(ExecOutput {
        stdout,
        stderr,
        exit_code,
        elapsed_ms,
    })
}

async fn reap(client: &DockerClient, container: &str, limits: &ExecLimits) {
    if let Some(pattern) = &limits.kill_pattern {
        client.kill_matching(container, pattern).await;
    }
}
