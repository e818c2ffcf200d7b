//! Input locator parsing.
//!
//! Locators name where an input's content lives:
//!
//! - `path:<dir>` - a local directory, revision = content hash of the tree
//! - `store:<dir>` - a local registry holding one directory per revision
//!
//! Either form may carry an inline pin as a `#<rev>` suffix:
//! `store:./registry#r1`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::Revision;
use crate::platform::paths::home_dir;

/// Errors that can occur when parsing a locator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
  #[error("missing scheme in '{0}', expected 'path:' or 'store:'")]
  MissingScheme(String),

  #[error("unsupported scheme '{0}', expected 'path' or 'store'")]
  UnsupportedScheme(String),

  #[error("empty location in '{0}'")]
  EmptyLocation(String),

  #[error("empty revision after '#' in '{0}'")]
  EmptyRevision(String),
}

/// The kind of source an input is fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
  Path,
  Store,
}

impl SourceKind {
  /// The scheme prefix used in locators and lock entries.
  pub fn as_str(&self) -> &'static str {
    match self {
      SourceKind::Path => "path",
      SourceKind::Store => "store",
    }
  }
}

impl fmt::Display for SourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A parsed source locator, without any inline revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
  pub kind: SourceKind,
  /// The location as written, before tilde or relative path expansion.
  pub location: String,
}

impl Locator {
  pub fn new(kind: SourceKind, location: impl Into<String>) -> Self {
    Self {
      kind,
      location: location.into(),
    }
  }

  /// Resolve the location to a filesystem path.
  ///
  /// Handles:
  /// - Tilde expansion (`~` -> home directory)
  /// - Relative paths (resolved against `base_dir`)
  pub fn to_path(&self, base_dir: &Path) -> PathBuf {
    let location = self.location.as_str();
    if let Some(rest) = location.strip_prefix("~/") {
      home_dir().join(rest)
    } else if location == "~" {
      home_dir()
    } else if Path::new(location).is_absolute() {
      PathBuf::from(location)
    } else {
      base_dir.join(location)
    }
  }
}

impl fmt::Display for Locator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.kind, self.location)
  }
}

/// Parse a locator string, splitting off an inline `#<rev>` pin.
pub fn parse(url: &str) -> Result<(Locator, Option<Revision>), ParseError> {
  let (scheme, rest) = url
    .split_once(':')
    .ok_or_else(|| ParseError::MissingScheme(url.to_string()))?;

  let kind = match scheme {
    "path" => SourceKind::Path,
    "store" => SourceKind::Store,
    other => return Err(ParseError::UnsupportedScheme(other.to_string())),
  };

  let (location, rev) = match rest.rsplit_once('#') {
    Some((location, rev)) => {
      if rev.is_empty() {
        return Err(ParseError::EmptyRevision(url.to_string()));
      }
      (location, Some(Revision::new(rev)))
    }
    None => (rest, None),
  };

  if location.is_empty() {
    return Err(ParseError::EmptyLocation(url.to_string()));
  }

  Ok((Locator::new(kind, location), rev))
}
