//! Shared fixtures for library integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use shelldeck_lib::config::Settings;
use shelldeck_lib::consts::DESCRIPTOR_FILENAME;
use shelldeck_lib::descriptor;
use shelldeck_lib::inputs::backend::{FetchError, FetchRequest, Fetched, LocalBackend, SourceBackend};
use shelldeck_lib::session::{Session, SessionOptions};
use shelldeck_lib::store::DirectoryStore;
use tempfile::TempDir;

/// Counts how often the local backend is reached.
#[derive(Debug)]
pub struct CountingBackend {
  inner: LocalBackend,
  calls: AtomicUsize,
}

impl CountingBackend {
  pub fn new(base_dir: &Path) -> Self {
    Self {
      inner: LocalBackend::new(base_dir),
      calls: AtomicUsize::new(0),
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl SourceBackend for CountingBackend {
  fn fetch(&self, request: &FetchRequest) -> Result<Fetched, FetchError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.inner.fetch(request)
  }
}

/// A project directory with a `store:` registry under `registry/`.
pub struct Project {
  pub temp: TempDir,
}

impl Project {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  pub fn descriptor_path(&self) -> PathBuf {
    self.root().join(DESCRIPTOR_FILENAME)
  }

  pub fn write_descriptor(&self, content: &str) {
    fs::write(self.descriptor_path(), content).unwrap();
  }

  /// Create revision `rev` of the registry, optionally marking it latest.
  pub fn add_revision(&self, rev: &str, latest: bool) -> PathBuf {
    let dir = self.root().join("registry").join(rev);
    fs::create_dir_all(dir.join("pkgs")).unwrap();
    if latest {
      fs::write(self.root().join("registry/latest"), rev).unwrap();
    }
    dir
  }

  /// Add package `name` to revision `rev` with a `bin/<name>` script printing `output`.
  pub fn add_package(&self, rev: &str, name: &str, output: &str) -> PathBuf {
    let dir = self.root().join("registry").join(rev).join("pkgs").join(name);
    let bin = dir.join("bin").join(name);
    write_script(&bin, &format!("echo \"{}\"", output));
    dir
  }

  /// Open a session with quiet hooks and the counting backend.
  pub fn session(&self, settings: Settings) -> (Session, Arc<CountingBackend>) {
    let file = descriptor::load_file(&self.descriptor_path()).unwrap();
    let backend = Arc::new(CountingBackend::new(&file.base_dir));
    let session = Session::with_backends(
      file,
      settings,
      SessionOptions::default(),
      backend.clone(),
      Arc::new(DirectoryStore),
    )
    .unwrap();
    (session, backend)
  }
}

pub fn quiet() -> Settings {
  Settings {
    echo_hook_output: false,
    ..Default::default()
  }
}

pub fn write_script(path: &Path, body: &str) {
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
  }
}
