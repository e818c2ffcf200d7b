//! Per-package metadata (`meta.toml`).
//!
//! ```toml
//! version = "1.83.0"
//! paths = ["bin", "libexec/bin"]   # search path entries, relative to the package
//! toolchain-manager = true
//!
//! [env]
//! OPENSSL_DIR = "$out"             # $out expands to the package directory
//! ```
//!
//! A package without `meta.toml` contributes `bin/` when it exists.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::PACKAGE_META_FILENAME;

/// Placeholder in `env` values replaced by the package directory.
pub const OUT_PLACEHOLDER: &str = "$out";

#[derive(Debug, Error)]
pub enum MetaError {
  #[error("failed to read {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("malformed {}: {message}", .path.display())]
  Malformed { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PackageMeta {
  #[serde(default)]
  pub version: Option<String>,
  /// Search path entries; `None` means "use `bin/` if present".
  #[serde(default)]
  pub paths: Option<Vec<String>>,
  #[serde(default)]
  pub env: BTreeMap<String, String>,
  /// Marks a toolchain manager such as rustup.
  #[serde(default)]
  pub toolchain_manager: bool,
}

impl PackageMeta {
  /// Read `meta.toml` from a package directory. Absent file yields defaults.
  pub fn load(artifact: &Path) -> Result<Self, MetaError> {
    let path = artifact.join(PACKAGE_META_FILENAME);
    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
      Err(source) => return Err(MetaError::Read { path, source }),
    };

    toml::from_str(&content).map_err(|e| MetaError::Malformed {
      path,
      message: e.message().to_string(),
    })
  }

  /// Search path directories for a package rooted at `artifact`.
  pub fn search_paths(&self, artifact: &Path) -> Vec<PathBuf> {
    match &self.paths {
      Some(paths) => paths.iter().map(|p| artifact.join(p)).collect(),
      None => {
        let bin = artifact.join("bin");
        if bin.is_dir() { vec![bin] } else { Vec::new() }
      }
    }
  }

  /// `env` entries with `$out` expanded, in name order.
  pub fn expanded_env(&self, artifact: &Path) -> Vec<(String, String)> {
    let out = artifact.to_string_lossy();
    self
      .env
      .iter()
      .map(|(k, v)| (k.clone(), v.replace(OUT_PLACEHOLDER, &out)))
      .collect()
  }
}
