//! Package store lookup.
//!
//! The store is the read-only view of an input's content. Every resolved
//! input exposes a [`StoreHandle`] directory; packages live under `pkgs/`,
//! optionally split per platform:
//!
//! # Layout
//!
//! ```text
//! <handle>/
//! └── pkgs/
//!     ├── x86_64-linux/compiler/   # exact triple wins
//!     ├── linux/compiler/          # then the OS
//!     └── compiler/                # then platform-independent
//!         ├── meta.toml            # optional, see [`meta`]
//!         └── bin/compiler
//! ```
//!
//! The engine never writes to the store.

pub mod meta;

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::trace;

use crate::inputs::StoreHandle;
use crate::platform::Platform;

/// Directory under a store handle holding packages.
pub const PACKAGES_DIR: &str = "pkgs";

/// Errors from package lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
  #[error("package '{name}' not found for {platform} in {}", .handle.display())]
  NotFound {
    name: String,
    platform: Platform,
    handle: PathBuf,
  },

  #[error("invalid package name '{0}'")]
  InvalidName(String),
}

/// Lookup service mapping (handle, package, platform) to an artifact path.
pub trait PackageStore: Send + Sync + fmt::Debug {
  fn lookup(&self, handle: &StoreHandle, name: &str, platform: &Platform) -> Result<PathBuf, StoreError>;
}

/// Store reading the on-disk layout above.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryStore;

impl DirectoryStore {
  pub fn new() -> Self {
    Self
  }

  /// Candidate artifact paths in priority order.
  pub fn candidates(handle: &Path, name: &str, platform: &Platform) -> [PathBuf; 3] {
    let pkgs = handle.join(PACKAGES_DIR);
    [
      pkgs.join(platform.triple()).join(name),
      pkgs.join(platform.os.as_str()).join(name),
      pkgs.join(name),
    ]
  }
}

impl PackageStore for DirectoryStore {
  fn lookup(&self, handle: &StoreHandle, name: &str, platform: &Platform) -> Result<PathBuf, StoreError> {
    validate_name(name)?;

    for candidate in Self::candidates(handle.path(), name, platform) {
      trace!(path = %candidate.display(), "probing package path");
      if candidate.exists() {
        return Ok(candidate);
      }
    }

    Err(StoreError::NotFound {
      name: name.to_string(),
      platform: *platform,
      handle: handle.path().to_path_buf(),
    })
  }
}

fn validate_name(name: &str) -> Result<(), StoreError> {
  if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
    return Err(StoreError::InvalidName(name.to_string()));
  }
  Ok(())
}
