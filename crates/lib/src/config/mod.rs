//! Engine settings.
//!
//! Loaded from `$XDG_CONFIG_HOME/shelldeck/config.toml` (or the file named by
//! `SHELLDECK_CONFIG`). A missing file means defaults. Environment
//! overrides are applied on top.
//!
//! ```toml
//! offline = false
//! registry_timeout = "30s"
//! hook_timeout = "10m"
//! toolchain_managers = ["rustup"]
//! default_platforms = ["x86_64-linux", "aarch64-darwin"]
//! shell = "/bin/bash"
//! echo_hook_output = true
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{DEFAULT_TOOLCHAIN_MANAGERS, ENV_CONFIG, ENV_OFFLINE, SETTINGS_FILENAME};
use crate::platform::paths::{config_dir, env_path};
use crate::platform::{DEFAULT_PLATFORMS, Platform};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read settings {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse settings {}: {message}", .path.display())]
  Parse { path: PathBuf, message: String },

  #[error("invalid settings: {0}")]
  Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Settings {
  /// Air-gapped mode: only locked or pinned inputs resolve.
  pub offline: bool,
  /// Upper bound on one registry lookup.
  #[serde(with = "duration_opt", skip_serializing_if = "Option::is_none")]
  pub registry_timeout: Option<Duration>,
  /// Upper bound on one hook command.
  #[serde(with = "duration_opt", skip_serializing_if = "Option::is_none")]
  pub hook_timeout: Option<Duration>,
  /// Package names treated as toolchain managers.
  pub toolchain_managers: Vec<String>,
  /// Platforms `platforms = "all"` stands for.
  pub default_platforms: Vec<Platform>,
  /// Interpreter for hook commands instead of `/bin/sh` or PowerShell.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub shell: Option<String>,
  /// Echo hook output while running.
  pub echo_hook_output: bool,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      offline: false,
      registry_timeout: None,
      hook_timeout: None,
      toolchain_managers: DEFAULT_TOOLCHAIN_MANAGERS.iter().map(|s| s.to_string()).collect(),
      default_platforms: DEFAULT_PLATFORMS.to_vec(),
      shell: None,
      echo_hook_output: true,
    }
  }
}

impl Settings {
  /// Where settings are read from: `SHELLDECK_CONFIG`, else the config directory.
  pub fn default_path() -> PathBuf {
    env_path(ENV_CONFIG).unwrap_or_else(|| config_dir().join(SETTINGS_FILENAME))
  }

  /// Load settings from [`Settings::default_path`] with environment overrides.
  pub fn load() -> Result<Self, ConfigError> {
    let mut settings = Self::load_from(&Self::default_path())?;
    settings.apply_env_overrides();
    Ok(settings)
  }

  /// Load settings from `path`. A missing file yields defaults.
  pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no settings file, using defaults");
        return Ok(Self::default());
      }
      Err(source) => {
        return Err(ConfigError::Read {
          path: path.to_path_buf(),
          source,
        });
      }
    };

    let settings: Settings = toml::from_str(&content).map_err(|e| ConfigError::Parse {
      path: path.to_path_buf(),
      message: e.message().to_string(),
    })?;
    settings.validate()?;
    Ok(settings)
  }

  /// Apply `SHELLDECK_OFFLINE`.
  pub fn apply_env_overrides(&mut self) {
    if let Ok(value) = std::env::var(ENV_OFFLINE) {
      match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => self.offline = true,
        "0" | "false" | "no" | "off" | "" => self.offline = false,
        other => debug!(value = %other, "ignoring unrecognised {}", ENV_OFFLINE),
      }
    }
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.default_platforms.is_empty() {
      return Err(ConfigError::Invalid("default_platforms must not be empty".to_string()));
    }
    if self.registry_timeout.is_some_and(|d| d.is_zero()) || self.hook_timeout.is_some_and(|d| d.is_zero()) {
      return Err(ConfigError::Invalid("timeouts must be greater than zero".to_string()));
    }
    if self.shell.as_deref().is_some_and(|s| s.trim().is_empty()) {
      return Err(ConfigError::Invalid("shell must not be empty".to_string()));
    }
    Ok(())
  }
}

/// Optional durations written as humantime strings (`"30s"`, `"2m 30s"`).
mod duration_opt {
  use std::time::Duration;

  use serde::{Deserialize, Deserializer, Serializer, de};

  pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
      Some(d) => serializer.serialize_str(&humantime::format_duration(*d).to_string()),
      None => serializer.serialize_none(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw
      .map(|s| humantime::parse_duration(&s).map_err(de::Error::custom))
      .transpose()
  }
}
