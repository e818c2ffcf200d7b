//! Input types for declaration and resolution.
//!
//! - [`InputRef`] - A named input as declared in a descriptor
//! - [`Revision`] - A pinned, content-addressed revision identifier
//! - [`ResolvedInput`] - An input with its revision frozen and a store handle

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::source::Locator;

/// A pinned revision: a content hash or a registry revision name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(pub String);

impl Revision {
  pub fn new(rev: impl Into<String>) -> Self {
    Self(rev.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// The leading characters of the revision, for display.
  pub fn short(&self) -> &str {
    let end = self.0.char_indices().nth(12).map(|(i, _)| i).unwrap_or(self.0.len());
    &self.0[..end]
  }
}

impl fmt::Display for Revision {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// A named external input.
///
/// Created when a descriptor is loaded. `revision` is `None` for unpinned
/// inputs until the registry resolves them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputRef {
  pub name: String,
  pub locator: Locator,
  pub revision: Option<Revision>,
}

impl InputRef {
  pub fn new(name: impl Into<String>, locator: Locator) -> Self {
    Self {
      name: name.into(),
      locator,
      revision: None,
    }
  }

  /// Return a copy pinned to `revision`.
  pub fn with_revision(mut self, revision: Revision) -> Self {
    self.revision = Some(revision);
    self
  }

  pub fn is_pinned(&self) -> bool {
    self.revision.is_some()
  }
}

/// Content-addressed handle to an input's content: the directory the package
/// store reads from. Never written by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreHandle(pub PathBuf);

impl StoreHandle {
  pub fn path(&self) -> &Path {
    &self.0
  }
}

/// An input whose revision has been frozen by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInput {
  pub input: InputRef,
  pub revision: Revision,
  pub handle: StoreHandle,
}

impl ResolvedInput {
  pub fn name(&self) -> &str {
    &self.input.name
  }
}
