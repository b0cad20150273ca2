//! Python runtime manager for the training worker.
//!
//! The worker is a Python script run as a subprocess. It receives its job as
//! JSON on stdin and reports progress as newline-delimited JSON on stdout.
//! Anything it writes to stderr is collected for error reports.

use crate::config::PythonConfig;
use crate::error::{FinetuneError, Result};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Number of trailing stderr lines kept for error messages.
const STDERR_TAIL_LINES: usize = 40;

/// Managed Python subprocess runner.
#[derive(Debug, Clone)]
pub struct PythonRuntime {
    python_path: PathBuf,
    venv_path: Option<PathBuf>,
    workspace: PathBuf,
    timeout: Option<Duration>,
}

impl PythonRuntime {
    /// Create from the `[python]` config section.
    pub fn from_config(config: &PythonConfig, workspace: PathBuf) -> Self {
        Self {
            python_path: config.python_path.clone(),
            venv_path: config
                .venv_path
                .clone()
                .or_else(|| detect_venv(&workspace)),
            workspace,
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Get the effective Python command (accounting for venv).
    pub fn python_cmd(&self) -> PathBuf {
        if let Some(venv) = &self.venv_path {
            let bin_dir = if cfg!(windows) { "Scripts" } else { "bin" };
            venv.join(bin_dir).join("python")
        } else {
            self.python_path.clone()
        }
    }

    /// Configured upper bound for one worker, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `script` with `input` as JSON on stdin, handing each stdout line to
    /// `on_line` as it arrives.
    ///
    /// An error from `on_line` stops reading and kills the child. A non-zero
    /// exit is reported with the tail of stderr. Without `timeout` or a
    /// configured one the worker runs until it exits.
    pub async fn run_streaming<F>(
        &self,
        script: &str,
        input: &serde_json::Value,
        timeout: Option<Duration>,
        mut on_line: F,
    ) -> Result<()>
    where
        F: FnMut(&str) -> Result<()> + Send,
    {
        let timeout = timeout.or(self.timeout);
        let payload = serde_json::to_vec(input)?;

        debug!(
            python = %self.python_cmd().display(),
            script_len = script.len(),
            input_len = payload.len(),
            "Spawning Python worker"
        );

        let mut child = Command::new(self.python_cmd())
            .args(["-u", "-c", script])
            .current_dir(&self.workspace)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FinetuneError::python(format!("Failed to spawn Python: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| FinetuneError::python("worker stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FinetuneError::python("worker stdout unavailable"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FinetuneError::python("worker stderr unavailable"))?;

        // Drain stderr concurrently so a chatty worker cannot block on a full pipe.
        let stderr_task = tokio::spawn(async move {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "finetune::worker", "{line}");
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let run = async {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await?;
            drop(stdin);

            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                on_line(&line)?;
            }
            Ok::<_, FinetuneError>(child.wait().await?)
        };

        let outcome = match timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| limit),
            None => Ok(run.await),
        };
        let status = match outcome {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                let _ = child.kill().await;
                return Err(e);
            }
            Err(limit) => {
                let _ = child.kill().await;
                return Err(FinetuneError::Timeout(format!(
                    "Python worker timed out after {}s",
                    limit.as_secs()
                )));
            }
        };

        let stderr_tail = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(FinetuneError::python(format!(
                "worker failed ({status}):\n{stderr_tail}"
            )));
        }
        Ok(())
    }
}

/// Detect a virtual environment: `VIRTUAL_ENV`, then common directory names
/// inside the workspace.
fn detect_venv(workspace: &std::path::Path) -> Option<PathBuf> {
    if let Ok(venv) = std::env::var("VIRTUAL_ENV") {
        let path = PathBuf::from(venv);
        if path.exists() {
            return Some(path);
        }
    }

    [".venv", "venv"]
        .iter()
        .map(|name| workspace.join(name))
        .find(|path| path.join("pyvenv.cfg").exists())
}
