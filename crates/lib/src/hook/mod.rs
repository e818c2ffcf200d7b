//! Post-provision hook execution.
//!
//! Hook commands run one at a time inside the activated environment, through
//! the platform shell. Execution is fail-fast: the first non-zero exit stops
//! the hook and becomes its exit code. Nothing already done is undone.

pub mod shell;

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::descriptor::HookCommand;
use crate::materialize::ActivatedShell;
use shell::{components_command, get_shell};

/// A hook that finished with a non-zero exit code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("hook command {index} ('{command}') exited with code {exit_code}")]
pub struct HookExecutionError {
  /// Zero-based index of the failing command.
  pub index: usize,
  pub command: String,
  pub exit_code: i32,
  pub stderr: String,
}

/// Errors that stop a hook before a command produced an exit code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
  #[error(
    "hook command {index} ('{command}') timed out after {} ({} earlier command(s) completed)",
    humantime::format_duration(*.after),
    .completed.len()
  )]
  Timeout {
    index: usize,
    command: String,
    after: Duration,
    /// Output of the commands that finished before the timeout.
    completed: Vec<StepOutput>,
  },

  #[error("failed to start hook command {index} ('{command}'): {message}")]
  Spawn {
    index: usize,
    command: String,
    message: String,
  },

  #[error(transparent)]
  Failed(#[from] HookExecutionError),

  #[error("hook command {index} adds components but no toolchain manager is active")]
  ToolchainInactive { index: usize },

  #[error("hook cancelled after {completed} command(s)")]
  Cancelled { completed: usize },
}

impl HookError {
  /// Exit code a CLI should report for this error.
  pub fn exit_code(&self) -> i32 {
    match self {
      HookError::Failed(e) => e.exit_code,
      HookError::Timeout { .. } => 124,
      HookError::Cancelled { .. } => 130,
      HookError::Spawn { .. } | HookError::ToolchainInactive { .. } => 1,
    }
  }
}

/// Output of one hook command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutput {
  pub command: String,
  pub exit_code: i32,
  pub stdout: String,
  pub stderr: String,
  pub duration: Duration,
}

/// The outcome of running a hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookResult {
  /// Exit code of the last command run; 0 when every command succeeded.
  pub exit_code: i32,
  /// Concatenated stdout of every command run.
  pub stdout: String,
  /// Concatenated stderr of every command run.
  pub stderr: String,
  pub duration: Duration,
  pub steps: Vec<StepOutput>,
  /// Index of the command that failed, if any.
  pub failed_index: Option<usize>,
}

impl HookResult {
  pub fn success(&self) -> bool {
    self.exit_code == 0
  }

  pub fn commands_run(&self) -> usize {
    self.steps.len()
  }

  /// Turn a non-zero result into a [`HookExecutionError`].
  pub fn into_result(self) -> Result<HookResult, HookExecutionError> {
    match self.failed_index {
      Some(index) => {
        let step = self.steps.get(index);
        Err(HookExecutionError {
          index,
          command: step.map(|s| s.command.clone()).unwrap_or_default(),
          exit_code: self.exit_code,
          stderr: step.map(|s| s.stderr.clone()).unwrap_or_default(),
        })
      }
      None => Ok(self),
    }
  }
}

/// Runs hook commands in an activated environment.
#[derive(Debug, Clone, Default)]
pub struct HookExecutor {
  shell: Option<String>,
  timeout: Option<Duration>,
  echo: bool,
  working_dir: Option<PathBuf>,
}

impl HookExecutor {
  pub fn new() -> Self {
    Self::default()
  }

  /// Interpreter to use instead of the platform default.
  pub fn with_shell(mut self, shell: Option<String>) -> Self {
    self.shell = shell;
    self
  }

  /// Per-command timeout. The child is killed when it expires.
  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  /// Echo captured output to this process's stdout/stderr as commands finish.
  pub fn with_echo(mut self, echo: bool) -> Self {
    self.echo = echo;
    self
  }

  pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
    self.working_dir = dir;
    self
  }

  /// Run `commands` in order, stopping at the first non-zero exit.
  pub async fn run(
    &self,
    activated: &ActivatedShell,
    commands: &[HookCommand],
    cancel: &CancelToken,
  ) -> Result<HookResult, HookError> {
    info!(commands = commands.len(), "running hook");
    let started = Instant::now();
    let mut steps: Vec<StepOutput> = Vec::with_capacity(commands.len());
    let mut failed_index = None;

    for (index, command) in commands.iter().enumerate() {
      if cancel.is_cancelled() {
        return Err(HookError::Cancelled { completed: index });
      }

      let line = match command {
        HookCommand::Run { cmd } => cmd.clone(),
        HookCommand::Components { add } => match &activated.toolchain {
          Some(marker) => components_command(&marker.program, add),
          None => return Err(HookError::ToolchainInactive { index }),
        },
      };

      let step = match self.run_one(index, &line, activated).await {
        Ok(step) => step,
        Err(HookError::Timeout { index, command, after, .. }) => {
          warn!(index, command = %command, "hook command timed out");
          return Err(HookError::Timeout {
            index,
            command,
            after,
            completed: steps,
          });
        }
        Err(e) => return Err(e),
      };
      if self.echo {
        print!("{}", step.stdout);
        eprint!("{}", step.stderr);
      }

      let code = step.exit_code;
      steps.push(step);
      if code != 0 {
        warn!(index, command = %line, code, "hook command failed");
        failed_index = Some(index);
        break;
      }
    }

    let exit_code = steps.last().map(|s| s.exit_code).unwrap_or(0);
    Ok(HookResult {
      exit_code,
      stdout: steps.iter().map(|s| s.stdout.as_str()).collect(),
      stderr: steps.iter().map(|s| s.stderr.as_str()).collect(),
      duration: started.elapsed(),
      steps,
      failed_index,
    })
  }

  async fn run_one(&self, index: usize, line: &str, activated: &ActivatedShell) -> Result<StepOutput, HookError> {
    let (shell_cmd, shell_args) = get_shell(self.shell.as_deref());
    debug!(index, shell = %shell_cmd, command = %line, "spawning hook command");

    let mut command = Command::new(&shell_cmd);
    command
      .args(&shell_args)
      .arg(line)
      .env_clear()
      .envs(&activated.env)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);
    if let Some(dir) = &self.working_dir {
      command.current_dir(dir);
    }

    let started = Instant::now();
    let child = command.spawn().map_err(|e| HookError::Spawn {
      index,
      command: line.to_string(),
      message: e.to_string(),
    })?;

    let waited = match self.timeout {
      // Dropping the timed-out future drops the child, which kills it.
      Some(after) => tokio::time::timeout(after, child.wait_with_output())
        .await
        .map_err(|_| HookError::Timeout {
          index,
          command: line.to_string(),
          after,
          completed: Vec::new(),
        })?,
      None => child.wait_with_output().await,
    };
    let output = waited.map_err(|e| HookError::Spawn {
      index,
      command: line.to_string(),
      message: e.to_string(),
    })?;

    Ok(StepOutput {
      command: line.to_string(),
      exit_code: exit_code(&output.status),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
      duration: started.elapsed(),
    })
  }
}

fn exit_code(status: &std::process::ExitStatus) -> i32 {
  if let Some(code) = status.code() {
    return code;
  }
  #[cfg(unix)]
  {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = status.signal() {
      return 128 + signal;
    }
  }
  -1
}
