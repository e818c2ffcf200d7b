//! Per-user directories.
//!
//! Follows the XDG base directory layout on Unix and the usual `%APPDATA%`
//! locations on Windows.

use std::path::PathBuf;

use crate::consts::APP_NAME;

pub(crate) fn env_path(var: &str) -> Option<PathBuf> {
  std::env::var_os(var).filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  env_path("USERPROFILE").unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  env_path("HOME").unwrap_or_else(|| PathBuf::from("/"))
}

/// Returns the directory for configuration files for the application
#[cfg(windows)]
pub fn config_dir() -> PathBuf {
  env_path("APPDATA").unwrap_or_else(home_dir).join(APP_NAME)
}

/// Returns the directory for configuration files for the application
#[cfg(not(windows))]
pub fn config_dir() -> PathBuf {
  env_path("XDG_CONFIG_HOME")
    .unwrap_or_else(|| home_dir().join(".config"))
    .join(APP_NAME)
}
