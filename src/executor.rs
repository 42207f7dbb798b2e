//! Local command execution
//!
//! [`ProcessExecutor`] runs commands with `tokio::process`, prefixing the
//! configured root helper when a command needs privileges. Callers that
//! expect flaky commands go through [`try_execute`], which applies the
//! retry policy of the invocation layer.

use crate::domain::ports::{CommandExecutor, CommandOptions, CommandOutput};
use crate::error::{Error, Result};
use crate::retry::{retry_transient, RetryConfig};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Executor spawning real processes
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    /// Command prepended for `run_as_root` calls, e.g. `sudo`
    root_helper: Vec<String>,
}

impl ProcessExecutor {
    pub fn new(root_helper: &str) -> Self {
        Self {
            root_helper: root_helper.split_whitespace().map(str::to_string).collect(),
        }
    }

    fn full_command(&self, command: &[String], options: CommandOptions) -> Vec<String> {
        let mut full = Vec::with_capacity(self.root_helper.len() + command.len());
        if options.run_as_root {
            full.extend(self.root_helper.iter().cloned());
        }
        full.extend(command.iter().cloned());
        full
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new("sudo")
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(&self, command: &[String], options: CommandOptions) -> Result<CommandOutput> {
        let full = self.full_command(command, options);
        let rendered = full.join(" ");
        let (program, args) = full
            .split_first()
            .ok_or_else(|| Error::Internal("empty command".into()))?;

        debug!("Running cmd: {}", rendered);

        // Spawn failures (e.g. command not found) are execution failures too.
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::ProcessExecution {
                command: rendered.clone(),
                exit_code: None,
                stdout: String::new(),
                stderr: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!("Result was {:?}", output.status.code());

        if options.check_exit_code && !output.status.success() {
            return Err(Error::ProcessExecution {
                command: rendered,
                exit_code: output.status.code(),
                stdout,
                stderr,
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

/// Build an owned command line from string slices
pub fn cmd<I, S>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts.into_iter().map(|p| p.as_ref().to_string()).collect()
}

/// Run a command that may fail transiently, retrying per `retry`
pub async fn try_execute(
    executor: &dyn CommandExecutor,
    retry: &RetryConfig,
    command: &[String],
    options: CommandOptions,
) -> Result<CommandOutput> {
    let what = command.first().map(String::as_str).unwrap_or("command");
    retry_transient(retry, what, || executor.execute(command, options)).await
}
