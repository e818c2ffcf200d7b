//! Lock file management for input resolution.
//!
//! The lock file (`shelldeck.lock`) pins input revisions so repeated runs
//! resolve identically. It's stored in the same directory as the descriptor.
//!
//! # Lock File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "inputs": {
//!     "toolset": {
//!       "type": "store",
//!       "url": "store:./registry",
//!       "rev": "r1",
//!       "lastModified": 1733667300
//!     }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::source::{Locator, SourceKind};
use super::types::Revision;

/// Current lock file format version.
pub const LOCK_VERSION: u32 = 1;

/// A lock file containing pinned input revisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockFile {
  /// Lock file format version.
  pub version: u32,
  /// Locked inputs, keyed by input name.
  pub inputs: BTreeMap<String, LockedInput>,
}

/// A locked input entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedInput {
  /// Input type: "path" or "store".
  #[serde(rename = "type")]
  pub type_: SourceKind,

  /// Locator from the descriptor, without any inline revision.
  pub url: String,

  /// Pinned revision (content hash for path inputs, revision name for stores).
  pub rev: Revision,

  /// Unix timestamp of when this input was last modified/fetched.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub last_modified: Option<u64>,
}

/// Errors that can occur when working with lock files.
#[derive(Debug, Error)]
pub enum LockError {
  /// Failed to read the lock file.
  #[error("failed to read lock file: {0}")]
  Read(#[source] io::Error),

  /// Failed to write the lock file.
  #[error("failed to write lock file: {0}")]
  Write(#[source] io::Error),

  /// Failed to parse the lock file JSON.
  #[error("failed to parse lock file: {0}")]
  Parse(#[source] serde_json::Error),

  /// Failed to serialize the lock file.
  #[error("failed to serialize lock file: {0}")]
  Serialize(#[source] serde_json::Error),

  /// Lock file version is not supported.
  #[error("unsupported lock file version {0}, expected {LOCK_VERSION}")]
  UnsupportedVersion(u32),
}

impl Default for LockFile {
  fn default() -> Self {
    Self::new()
  }
}

impl LockFile {
  /// Create a new empty lock file.
  pub fn new() -> Self {
    Self {
      version: LOCK_VERSION,
      inputs: BTreeMap::new(),
    }
  }

  /// Load a lock file from the given path.
  ///
  /// Returns `Ok(None)` if the file doesn't exist.
  /// Returns `Ok(Some(lock))` if the file exists and was parsed successfully.
  /// Returns `Err` if the file exists but couldn't be read or parsed.
  pub fn load(path: &Path) -> Result<Option<Self>, LockError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(LockError::Read(e)),
    };

    let lock: LockFile = serde_json::from_str(&content).map_err(LockError::Parse)?;

    if lock.version != LOCK_VERSION {
      return Err(LockError::UnsupportedVersion(lock.version));
    }

    Ok(Some(lock))
  }

  /// Save the lock file to the given path.
  ///
  /// The file is written with pretty-printed JSON for readability.
  pub fn save(&self, path: &Path) -> Result<(), LockError> {
    let content = serde_json::to_string_pretty(self).map_err(LockError::Serialize)?;
    fs::write(path, content).map_err(LockError::Write)?;
    Ok(())
  }

  /// Get a locked input by name.
  pub fn get(&self, name: &str) -> Option<&LockedInput> {
    self.inputs.get(name)
  }

  /// Insert or update a locked input.
  ///
  /// Returns `true` if the entry is new or differs from the previous one.
  pub fn insert(&mut self, name: String, input: LockedInput) -> bool {
    match self.inputs.get(&name) {
      Some(existing) if existing.url == input.url && existing.rev == input.rev => false,
      _ => {
        self.inputs.insert(name, input);
        true
      }
    }
  }

  /// Remove entries whose names are not in `keep`, returning the removed names.
  pub fn prune(&mut self, keep: &HashSet<&str>) -> Vec<String> {
    let stale: Vec<String> = self
      .inputs
      .keys()
      .filter(|name| !keep.contains(name.as_str()))
      .cloned()
      .collect();
    for name in &stale {
      self.inputs.remove(name);
    }
    stale
  }
}

impl LockedInput {
  /// Create a new locked input entry.
  pub fn new(locator: &Locator, rev: Revision) -> Self {
    Self {
      type_: locator.kind,
      url: locator.to_string(),
      rev,
      last_modified: None,
    }
  }

  /// Check whether this entry was recorded for `locator`.
  pub fn matches(&self, locator: &Locator) -> bool {
    self.type_ == locator.kind && self.url == locator.to_string()
  }

  /// Set the last modified timestamp.
  pub fn with_last_modified(mut self, timestamp: u64) -> Self {
    self.last_modified = Some(timestamp);
    self
  }
}
