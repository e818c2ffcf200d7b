//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Isolated test project.
///
/// Each test gets its own temporary directory holding the descriptor, a
/// `store:` registry under `registry/` and an empty settings file location.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// A project whose `toolset` input has revisions r1 and r2 (latest r2),
  /// each providing a `compiler` package.
  pub fn with_toolset(descriptor: &str) -> Self {
    let env = Self::new();
    for rev in ["r1", "r2"] {
      env.write_executable(
        &format!("registry/{rev}/pkgs/compiler/bin/compiler"),
        &format!("echo \"compiler {rev}\""),
      );
    }
    env.write_file("registry/latest", "r2");
    env.write_file("shelldeck.toml", descriptor);
    env
  }

  pub fn root(&self) -> PathBuf {
    dunce::canonicalize(self.temp.path()).unwrap_or_else(|_| self.temp.path().to_path_buf())
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Write an executable `/bin/sh` script relative to the temp directory.
  pub fn write_executable(&self, relative_path: &str, body: &str) {
    self.write_file(relative_path, &format!("#!/bin/sh\n{}\n", body));
    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      let path = self.temp.path().join(relative_path);
      std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
  }

  pub fn read_file(&self, relative_path: &str) -> String {
    std::fs::read_to_string(self.temp.path().join(relative_path)).unwrap()
  }

  pub fn exists(&self, relative_path: &str) -> bool {
    self.temp.path().join(relative_path).exists()
  }

  pub fn path(&self, relative_path: &str) -> PathBuf {
    self.temp.path().join(relative_path)
  }

  /// Command running `shelldeck` in the project directory.
  pub fn cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("shelldeck");
    cmd
      .current_dir(self.temp.path())
      .env("SHELLDECK_CONFIG", self.temp.path().join("settings.toml"))
      .env_remove("SHELLDECK_OFFLINE")
      .env_remove("SHELLDECK_LOG");
    cmd
  }
}

/// The locked revision of `name` in the project's lock file.
pub fn locked_rev(root: &Path, name: &str) -> Option<String> {
  let text = std::fs::read_to_string(root.join("shelldeck.lock")).ok()?;
  let lock: serde_json::Value = serde_json::from_str(&text).ok()?;
  lock["inputs"][name]["rev"].as_str().map(str::to_string)
}
