// src/exec/action.rs

//! Task action interface and the shell-command implementation.
//!
//! An action is an opaque capability supplied by the caller: the core never
//! interprets its content, it only records the reported outcome and the
//! wall-clock duration of the invocation.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

/// Result of one invocation of a task action.
#[derive(Debug, Clone, Default)]
pub struct ActionOutcome {
    pub success: bool,
    /// Raw output bytes (stdout for shell actions). Opaque to the core.
    pub output: Vec<u8>,
    /// Human-readable failure message, if the invocation failed.
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn success(output: Vec<u8>) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// A unit of executable work consumed by the executor.
///
/// Implementations receive no engine-internal state. Production graphs use
/// [`ShellAction`]; tests typically use [`FnAction`] or the scripted actions
/// from the test-utils crate.
pub trait TaskAction: Send + Sync {
    fn run(&self) -> Pin<Box<dyn Future<Output = ActionOutcome> + Send + '_>>;
}

/// Action that runs a shell command line via the platform shell.
///
/// Stdout is captured as the opaque output; stderr is consumed line by line
/// and logged at debug so the child's pipe buffers never fill.
#[derive(Debug, Clone)]
pub struct ShellAction {
    cmd: String,
}

impl ShellAction {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    async fn run_inner(&self) -> Result<ActionOutcome> {
        info!(cmd = %self.cmd, "starting shell command");

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning shell command '{}'", self.cmd))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Drain stderr as it arrives; keep the lines for the error message.
        let stderr_lines = tokio::spawn(async move {
            let mut collected = Vec::new();
            if let Some(stderr) = stderr {
                let reader = BufReader::new(stderr);
                let mut lines = reader.lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("stderr: {}", line);
                    collected.push(line);
                }
            }
            collected
        });

        let mut output = Vec::new();
        if let Some(mut stdout) = stdout {
            stdout
                .read_to_end(&mut output)
                .await
                .with_context(|| format!("reading stdout of '{}'", self.cmd))?;
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for shell command '{}'", self.cmd))?;

        let stderr_tail = stderr_lines.await.unwrap_or_default();

        if status.success() {
            Ok(ActionOutcome::success(output))
        } else {
            let code = status.code().unwrap_or(-1);
            let mut error = format!("command exited with status {code}");
            if let Some(last) = stderr_tail.last() {
                error.push_str(": ");
                error.push_str(last);
            }
            Ok(ActionOutcome {
                success: false,
                output,
                error: Some(error),
            })
        }
    }
}

impl TaskAction for ShellAction {
    fn run(&self) -> Pin<Box<dyn Future<Output = ActionOutcome> + Send + '_>> {
        Box::pin(async move {
            match self.run_inner().await {
                Ok(outcome) => outcome,
                // Spawn/IO errors count as a failed invocation, not a crash.
                Err(err) => ActionOutcome::failure(format!("{err:#}")),
            }
        })
    }
}

/// Action built from a closure returning a future.
///
/// Handy for embedding small in-process tasks and for tests.
pub struct FnAction<F> {
    f: F,
}

impl<F, Fut> FnAction<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ActionOutcome> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> TaskAction for FnAction<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ActionOutcome> + Send + 'static,
{
    fn run(&self) -> Pin<Box<dyn Future<Output = ActionOutcome> + Send + '_>> {
        Box::pin((self.f)())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shell_action_captures_stdout() {
        let action = ShellAction::new("echo hello");
        let outcome = action.run().await;
        assert!(outcome.success);
        assert_eq!(String::from_utf8_lossy(&outcome.output).trim(), "hello");
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn shell_action_reports_failure_with_exit_status() {
        let action = ShellAction::new("exit 3");
        let outcome = action.run().await;
        assert!(!outcome.success);
        let error = outcome.error.expect("failure must carry an error message");
        assert!(error.contains("status 3"), "unexpected error: {error}");
    }

    #[tokio::test]
    async fn fn_action_passes_outcome_through() {
        let action = FnAction::new(|| async { ActionOutcome::failure("nope") });
        let outcome = action.run().await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("nope"));
    }
}
