//! Test utilities for shelldeck-lib.
//!
//! Fixture builders for input registries and packages, a backend wrapper
//! that counts upstream calls, and cross-platform hook command snippets.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::consts::{LATEST_REV_FILENAME, PACKAGE_META_FILENAME};
use crate::inputs::backend::{FetchError, FetchRequest, Fetched, LocalBackend, SourceBackend};

/// Wraps [`LocalBackend`] and counts how often it is reached.
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

/// Create `<root>/<rev>/` for each revision and an optional `latest` marker.
pub fn write_registry(root: &Path, revs: &[&str], latest: Option<&str>) {
  for rev in revs {
    fs::create_dir_all(root.join(rev).join("pkgs")).unwrap();
  }
  if let Some(latest) = latest {
    fs::write(root.join(LATEST_REV_FILENAME), latest).unwrap();
  }
}

/// Create a package directory with optional `meta.toml` and executables in `bin/`.
pub fn write_package(dir: &Path, meta: Option<&str>, bins: &[(&str, &str)]) -> PathBuf {
  fs::create_dir_all(dir).unwrap();
  if let Some(meta) = meta {
    fs::write(dir.join(PACKAGE_META_FILENAME), meta).unwrap();
  }
  for (name, body) in bins {
    write_script(&dir.join("bin").join(name), body);
  }
  dir.to_path_buf()
}

/// Write an executable shell script.
pub fn write_script(path: &Path, body: &str) {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
  }
}

/// A hook command that prints `msg`.
pub fn echo_cmd(msg: &str) -> String {
  format!("echo {}", msg)
}

/// A hook command that exits with `code`.
pub fn exit_cmd(code: i32) -> String {
  format!("exit {}", code)
}

/// A hook command that creates `path`.
#[cfg(unix)]
pub fn touch_cmd(path: &Path) -> String {
  format!("touch '{}'", path.display())
}

#[cfg(windows)]
pub fn touch_cmd(path: &Path) -> String {
  format!("New-Item -ItemType File -Path '{}' -Force | Out-Null", path.display())
}

/// A hook command that prints the value of environment variable `var`.
#[cfg(unix)]
pub fn print_var_cmd(var: &str) -> String {
  format!("echo \"${}\"", var)
}

#[cfg(windows)]
pub fn print_var_cmd(var: &str) -> String {
  format!("Write-Output $env:{}", var)
}

/// A hook command that sleeps for `secs` seconds.
#[cfg(unix)]
pub fn sleep_cmd(secs: u32) -> String {
  format!("sleep {}", secs)
}

#[cfg(windows)]
pub fn sleep_cmd(secs: u32) -> String {
  format!("Start-Sleep -Seconds {}", secs)
}
