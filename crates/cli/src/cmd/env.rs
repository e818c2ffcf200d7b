//! Implementation of the `shelldeck env` command.

use anyhow::{Result, anyhow};

use shelldeck_lib::materialize::script::{Shell, render_script};
use shelldeck_lib::session::SessionOptions;

use super::{GlobalArgs, cancel_on_ctrl_c, open_session, requested_platform, runtime};

/// Print a script that reproduces the activated environment in the current shell.
///
/// Usage: `eval "$(shelldeck env)"`.
pub fn cmd_env(global: &GlobalArgs, file: Option<&str>, shell: Option<&str>, platform: Option<&str>) -> Result<()> {
  let shell = match shell {
    Some(name) => name.parse::<Shell>().map_err(|e| anyhow!("{}. Supported: bash, zsh, fish, sh, powershell", e))?,
    None => Shell::detect(),
  };
  let platform = requested_platform(platform)?;
  let session = open_session(global, file, SessionOptions::default())?;

  let rt = runtime()?;
  let resolved = rt.block_on(async {
    cancel_on_ctrl_c(session.cancel_token());
    session.resolve(platform).await
  })?;
  session.save_lock()?;
  let activated = session.activate(&resolved)?;

  print!("{}", render_script(&activated, shell));
  Ok(())
}
