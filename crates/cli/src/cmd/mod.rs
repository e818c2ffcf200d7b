mod check;
mod env;
mod info;
mod resolve;
mod shell;
mod update;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use shelldeck_lib::cancel::CancelToken;
use shelldeck_lib::config::Settings;
use shelldeck_lib::platform::Platform;
use shelldeck_lib::session::{self, Session, SessionOptions};

use crate::output::OutputFormat;

pub use check::cmd_check;
pub use env::cmd_env;
pub use info::cmd_info;
pub use resolve::cmd_resolve;
pub use shell::cmd_shell;
pub use update::cmd_update;

/// Options shared by every subcommand.
#[derive(Debug, Clone, Copy)]
pub struct GlobalArgs {
  pub offline: bool,
  pub timeout: Option<Duration>,
  pub output: OutputFormat,
}

/// Load settings and apply command line overrides on top.
pub fn load_settings(global: &GlobalArgs) -> Result<Settings> {
  let mut settings = Settings::load().context("Failed to load settings")?;
  if global.offline {
    settings.offline = true;
  }
  if let Some(timeout) = global.timeout {
    settings.registry_timeout = Some(timeout);
    settings.hook_timeout = Some(timeout);
  }
  if global.output.is_json() {
    settings.echo_hook_output = false;
  }
  Ok(settings)
}

/// Find the descriptor and open a session on it.
pub fn open_session(global: &GlobalArgs, file: Option<&str>, options: SessionOptions) -> Result<Session> {
  let settings = load_settings(global)?;
  let cwd = std::env::current_dir().context("Failed to read current directory")?;
  let path = session::find_descriptor(file.map(Path::new), &cwd)?;
  Session::open(&path, settings, options).with_context(|| format!("Failed to load {}", path.display()))
}

/// Parse a requested platform, defaulting to the host.
pub fn requested_platform(platform: Option<&str>) -> Result<Platform> {
  match platform {
    Some(p) => Platform::parse_requested(p).with_context(|| format!("Invalid platform '{}'", p)),
    None => Ok(session::host_platform()?),
  }
}

pub fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}

/// Cancel `token` on Ctrl-C. Must be called inside a runtime.
pub fn cancel_on_ctrl_c(token: CancelToken) {
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      tracing::warn!("interrupted, stopping after the current step");
      token.cancel();
    }
  });
}
