//! Process spawning
//!
//! [`ProcessRunner`] is the only place the runner touches the host process
//! table. The command executor and the container manager both go through it,
//! which lets tests swap in a scripted runner.

use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::config::Config;
use crate::types::{ExecutionResult, Invocation, ServiceError};

/// Spawns a process, waits for it, and captures its output
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<ExecutionResult, ServiceError>;
}

/// Runs invocations as real child processes via tokio
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Option<Duration>,
    max_output_bytes: usize,
    trim_output: bool,
    env_set: Vec<(String, String)>,
    env_remove: Vec<String>,
}

impl SystemRunner {
    pub fn new(config: &Config) -> Self {
        let timeout = match config.timeouts.default_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            timeout,
            max_output_bytes: config.limits.max_output_bytes,
            trim_output: config.commands.trim_output,
            env_set: config
                .environment
                .set
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            env_remove: config.environment.remove.clone(),
        }
    }

    fn decode(&self, bytes: &[u8]) -> String {
        let mut text = String::from_utf8_lossy(bytes).into_owned();
        if self.trim_output {
            text.truncate(text.trim_end().len());
        }
        text
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ExecutionResult, ServiceError> {
        tracing::debug!(command = %invocation, "Spawning process");

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in &self.env_set {
            cmd.env(key, value);
        }
        for key in &self.env_remove {
            cmd.env_remove(key);
        }

        let mut child = cmd.spawn().map_err(|source| ServiceError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let max_bytes = self.max_output_bytes;

        // Owns the child so that dropping it on timeout kills the process
        let collect = async move {
            tokio::try_join!(
                read_capped(stdout, max_bytes),
                read_capped(stderr, max_bytes),
                child.wait(),
            )
        };

        let collected = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, collect).await {
                Ok(result) => result,
                Err(_elapsed) => {
                    tracing::warn!(command = %invocation, "Process timed out");
                    return Err(ServiceError::Timeout {
                        program: invocation.program.clone(),
                        secs: timeout.as_secs(),
                    });
                }
            },
            None => collect.await,
        };

        let ((stdout, stdout_truncated), (stderr, stderr_truncated), status) =
            collected.map_err(|source| ServiceError::Io {
                program: invocation.program.clone(),
                source,
            })?;
        let exit_code = status.code().unwrap_or(-1);

        tracing::debug!(command = %invocation, exit_code, "Process finished");

        Ok(ExecutionResult {
            stdout: self.decode(&stdout),
            stderr: self.decode(&stderr),
            exit_code,
            truncated: stdout_truncated || stderr_truncated,
        })
    }
}

/// Keep at most `max_bytes` of a stream in memory and discard the rest
///
/// The remainder is still drained so the child never blocks on a full pipe.
async fn read_capped<R>(reader: Option<R>, max_bytes: usize) -> io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok((Vec::new(), false));
    };

    let mut kept = Vec::new();
    (&mut reader).take(max_bytes as u64).read_to_end(&mut kept).await?;
    let discarded = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;

    Ok((kept, discarded > 0))
}
