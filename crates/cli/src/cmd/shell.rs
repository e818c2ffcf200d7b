//! Implementation of the `shelldeck shell` command.
//!
//! Provisions the environment (resolve, materialize, hook) and then either
//! starts an interactive shell inside it or, with `--run`, exits with the
//! hook's code.

use std::process::Command;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};
use tracing::info;

use shelldeck_lib::hook::{HookError, HookResult};
use shelldeck_lib::materialize::ActivatedShell;
use shelldeck_lib::session::{SessionError, SessionOptions};

use super::{GlobalArgs, cancel_on_ctrl_c, open_session, requested_platform, runtime};
use crate::output::{format_duration, print_error, print_json, print_success, symbols};

/// Execute the shell command.
///
/// Returns the exit code the process should end with: the hook's code when
/// the hook fails or `run` is set, otherwise the interactive shell's.
pub fn cmd_shell(global: &GlobalArgs, file: Option<&str>, platform: Option<&str>, run: bool, pure: bool) -> Result<i32> {
  let platform = requested_platform(platform)?;
  let session = open_session(global, file, SessionOptions { pure, ..Default::default() })?;

  let rt = runtime()?;
  let provisioned = rt.block_on(async {
    cancel_on_ctrl_c(session.cancel_token());
    session.provision(platform).await
  });

  let provisioned = match provisioned {
    Ok(provisioned) => provisioned,
    Err(SessionError::Hook(e)) => {
      if let HookError::Timeout { completed, .. } = &e
        && global.output.is_json()
      {
        print_json(completed)?;
      }
      print_error(&e.to_string());
      return Ok(e.exit_code());
    }
    Err(e) => return Err(e.into()),
  };

  if global.output.is_json() {
    print_json(&provisioned.hook)?;
  } else {
    print_hook_summary(&provisioned.hook);
  }

  if !provisioned.hook.success() || run {
    return Ok(provisioned.hook.exit_code);
  }

  let program = interactive_shell(&provisioned.activated);
  info!(shell = %program, platform = %platform, "starting interactive shell");
  let status = Command::new(&program)
    .env_clear()
    .envs(&provisioned.activated.env)
    .status()
    .with_context(|| format!("Failed to start shell '{}'", program))?;
  Ok(status.code().unwrap_or(1))
}

fn print_hook_summary(hook: &HookResult) {
  if hook.steps.is_empty() {
    return;
  }
  match hook.failed_index {
    None => print_success(&format!(
      "Hook finished: {} command(s) in {}",
      hook.commands_run(),
      format_duration(hook.duration)
    )),
    Some(index) => {
      let command = hook.steps.get(index).map(|s| s.command.as_str()).unwrap_or("");
      print_error(&format!(
        "Hook command {} '{}' exited with code {}",
        index, command, hook.exit_code
      ));
      eprintln!(
        "  {} {}",
        symbols::INFO.if_supports_color(Stream::Stderr, |s| s.dimmed()),
        "later commands were skipped".if_supports_color(Stream::Stderr, |s| s.dimmed())
      );
    }
  }
}

/// The user's shell from the activated environment, or the platform default.
fn interactive_shell(activated: &ActivatedShell) -> String {
  if let Some(shell) = activated.env.get("SHELL").filter(|s| !s.is_empty()) {
    return shell.clone();
  }
  if cfg!(windows) {
    "powershell.exe".to_string()
  } else {
    "/bin/sh".to_string()
  }
}
