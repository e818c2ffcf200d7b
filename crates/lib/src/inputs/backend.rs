//! Source backends: turn a locator and optional pin into content.
//!
//! The registry reaches upstream content only through [`SourceBackend`], so
//! remote registries can be plugged in without touching resolution logic.
//! [`LocalBackend`] serves the two built-in schemes:
//!
//! ```text
//! path:./toolset            # any directory; rev = sha256 of its tree
//!
//! store:./registry          # one directory per revision
//!   latest                  # contains "r2"
//!   r1/pkgs/...
//!   r2/pkgs/...
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::source::{Locator, SourceKind};
use super::types::{Revision, StoreHandle};
use crate::consts::{HASH_EXCLUDES, LATEST_REV_FILENAME};
use crate::util::hash::{DirHashError, hash_directory};

/// What the registry asks a backend for.
#[derive(Debug, Clone)]
pub struct FetchRequest {
  pub name: String,
  pub locator: Locator,
  /// `Some` to verify a pinned revision, `None` to fetch the latest.
  pub revision: Option<Revision>,
  /// When set, the backend must not reach the network.
  pub offline: bool,
}

/// A backend's answer: the revision it found and where its content lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
  pub revision: Revision,
  pub handle: StoreHandle,
}

/// Errors reported by source backends.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
  /// The source location does not exist.
  #[error("source does not exist: {0}")]
  NotFound(PathBuf),

  /// The pinned revision is not present at the source.
  #[error("revision '{rev}' not found at {source_path}")]
  RevisionNotFound { rev: Revision, source_path: PathBuf },

  /// A registry has no `latest` marker, so it can only be used pinned.
  #[error("registry {0} has no '{LATEST_REV_FILENAME}' marker; pin a revision")]
  NoLatest(PathBuf),

  /// A revision name that would escape the registry directory.
  #[error("invalid revision name '{0}'")]
  InvalidRevision(String),

  /// Latest lookup requested in offline mode.
  #[error("latest revision lookup needs network access")]
  Offline,

  #[error("failed to read {path}: {message}")]
  Io { path: PathBuf, message: String },

  #[error("failed to hash source: {0}")]
  Hash(#[from] DirHashError),
}

/// Upstream lookup service for input content.
pub trait SourceBackend: Send + Sync + fmt::Debug {
  /// Resolve a locator to a revision and content-addressed handle.
  ///
  /// Called from a blocking context; implementations may block on I/O.
  fn fetch(&self, request: &FetchRequest) -> Result<Fetched, FetchError>;
}

/// Backend for `path:` and `store:` locators on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalBackend {
  /// Directory relative locations are resolved against (the descriptor's).
  base_dir: PathBuf,
}

impl LocalBackend {
  pub fn new(base_dir: impl Into<PathBuf>) -> Self {
    Self {
      base_dir: base_dir.into(),
    }
  }

  fn fetch_path(&self, request: &FetchRequest) -> Result<Fetched, FetchError> {
    let dir = canonical_dir(&request.locator.to_path(&self.base_dir))?;
    let actual = Revision::new(hash_directory(&dir, HASH_EXCLUDES)?.0);

    if let Some(pinned) = &request.revision
      && *pinned != actual
    {
      return Err(FetchError::RevisionNotFound {
        rev: pinned.clone(),
        source_path: dir,
      });
    }

    debug!(name = %request.name, rev = %actual.short(), "hashed path input");
    Ok(Fetched {
      revision: actual,
      handle: StoreHandle(dir),
    })
  }

  fn fetch_store(&self, request: &FetchRequest) -> Result<Fetched, FetchError> {
    let root = canonical_dir(&request.locator.to_path(&self.base_dir))?;

    let revision = match &request.revision {
      Some(pinned) => pinned.clone(),
      None if request.offline => return Err(FetchError::Offline),
      None => read_latest(&root)?,
    };
    validate_revision_name(&revision)?;

    let rev_dir = root.join(revision.as_str());
    if !rev_dir.is_dir() {
      return Err(FetchError::RevisionNotFound {
        rev: revision,
        source_path: root,
      });
    }

    debug!(name = %request.name, rev = %revision, "found registry revision");
    Ok(Fetched {
      revision,
      handle: StoreHandle(rev_dir),
    })
  }
}

impl SourceBackend for LocalBackend {
  fn fetch(&self, request: &FetchRequest) -> Result<Fetched, FetchError> {
    match request.locator.kind {
      SourceKind::Path => self.fetch_path(request),
      SourceKind::Store => self.fetch_store(request),
    }
  }
}

fn canonical_dir(path: &Path) -> Result<PathBuf, FetchError> {
  let canonical = dunce::canonicalize(path).map_err(|e| {
    if e.kind() == io::ErrorKind::NotFound {
      FetchError::NotFound(path.to_path_buf())
    } else {
      FetchError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
      }
    }
  })?;

  if !canonical.is_dir() {
    return Err(FetchError::NotFound(canonical));
  }
  Ok(canonical)
}

fn read_latest(root: &Path) -> Result<Revision, FetchError> {
  let marker = root.join(LATEST_REV_FILENAME);
  let content = match fs::read_to_string(&marker) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(FetchError::NoLatest(root.to_path_buf())),
    Err(e) => {
      return Err(FetchError::Io {
        path: marker,
        message: e.to_string(),
      });
    }
  };

  let rev = content.trim();
  if rev.is_empty() {
    return Err(FetchError::NoLatest(root.to_path_buf()));
  }
  Ok(Revision::new(rev))
}

fn validate_revision_name(rev: &Revision) -> Result<(), FetchError> {
  let name = rev.as_str();
  let invalid = name.is_empty()
    || name == "."
    || name == ".."
    || name == LATEST_REV_FILENAME
    || name.contains(['/', '\\']);
  if invalid {
    return Err(FetchError::InvalidRevision(name.to_string()));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn request(locator: Locator, revision: Option<&str>) -> FetchRequest {
    FetchRequest {
      name: "toolset".to_string(),
      locator,
      revision: revision.map(Revision::new),
      offline: false,
    }
  }

  fn registry(temp: &TempDir, revs: &[&str], latest: Option<&str>) -> PathBuf {
    let root = temp.path().join("registry");
    for rev in revs {
      fs::create_dir_all(root.join(rev).join("pkgs")).unwrap();
    }
    fs::create_dir_all(&root).unwrap();
    if let Some(latest) = latest {
      fs::write(root.join(LATEST_REV_FILENAME), format!("{}\n", latest)).unwrap();
    }
    root
  }

  mod store {
    use super::*;

    #[test]
    fn unpinned_uses_latest_marker() {
      let temp = TempDir::new().unwrap();
      registry(&temp, &["r1", "r2"], Some("r2"));
      let backend = LocalBackend::new(temp.path());

      let fetched = backend
        .fetch(&request(Locator::new(SourceKind::Store, "registry"), None))
        .unwrap();

      assert_eq!(fetched.revision, Revision::new("r2"));
      assert!(fetched.handle.path().ends_with("r2"));
    }

    #[test]
    fn pinned_revision_is_verified() {
      let temp = TempDir::new().unwrap();
      registry(&temp, &["r1", "r2"], Some("r2"));
      let backend = LocalBackend::new(temp.path());

      let fetched = backend
        .fetch(&request(Locator::new(SourceKind::Store, "registry"), Some("r1")))
        .unwrap();
      assert_eq!(fetched.revision, Revision::new("r1"));

      let missing = backend.fetch(&request(Locator::new(SourceKind::Store, "registry"), Some("r9")));
      assert!(matches!(missing, Err(FetchError::RevisionNotFound { .. })));
    }

    #[test]
    fn missing_latest_marker_requires_pin() {
      let temp = TempDir::new().unwrap();
      registry(&temp, &["r1"], None);
      let backend = LocalBackend::new(temp.path());

      let result = backend.fetch(&request(Locator::new(SourceKind::Store, "registry"), None));
      assert!(matches!(result, Err(FetchError::NoLatest(_))));
    }

    #[test]
    fn offline_refuses_latest_lookup() {
      let temp = TempDir::new().unwrap();
      registry(&temp, &["r1"], Some("r1"));
      let backend = LocalBackend::new(temp.path());

      let mut req = request(Locator::new(SourceKind::Store, "registry"), None);
      req.offline = true;
      assert!(matches!(backend.fetch(&req), Err(FetchError::Offline)));
    }

    #[test]
    fn revision_cannot_escape_registry() {
      let temp = TempDir::new().unwrap();
      registry(&temp, &["r1"], Some("r1"));
      let backend = LocalBackend::new(temp.path());

      let result = backend.fetch(&request(Locator::new(SourceKind::Store, "registry"), Some("../r1")));
      assert!(matches!(result, Err(FetchError::InvalidRevision(_))));
    }
  }

  mod path {
    use super::*;

    #[test]
    fn revision_is_content_hash() {
      let temp = TempDir::new().unwrap();
      let dir = temp.path().join("toolset");
      fs::create_dir(&dir).unwrap();
      fs::write(dir.join("README"), "tools").unwrap();
      let backend = LocalBackend::new(temp.path());

      let first = backend
        .fetch(&request(Locator::new(SourceKind::Path, "./toolset"), None))
        .unwrap();
      assert_eq!(first.revision.as_str().len(), 64);

      let pinned = backend
        .fetch(&request(
          Locator::new(SourceKind::Path, "./toolset"),
          Some(first.revision.as_str()),
        ))
        .unwrap();
      assert_eq!(pinned, first);
    }

    #[test]
    fn changed_content_invalidates_pin() {
      let temp = TempDir::new().unwrap();
      let dir = temp.path().join("toolset");
      fs::create_dir(&dir).unwrap();
      fs::write(dir.join("README"), "v1").unwrap();
      let backend = LocalBackend::new(temp.path());

      let first = backend
        .fetch(&request(Locator::new(SourceKind::Path, "./toolset"), None))
        .unwrap();
      fs::write(dir.join("README"), "v2").unwrap();

      let result = backend.fetch(&request(
        Locator::new(SourceKind::Path, "./toolset"),
        Some(first.revision.as_str()),
      ));
      assert!(matches!(result, Err(FetchError::RevisionNotFound { .. })));
    }

    #[test]
    fn nonexistent_path_returns_error() {
      let temp = TempDir::new().unwrap();
      let backend = LocalBackend::new(temp.path());

      let result = backend.fetch(&request(Locator::new(SourceKind::Path, "./does-not-exist"), None));
      assert!(matches!(result, Err(FetchError::NotFound(_))));
    }
  }
}
