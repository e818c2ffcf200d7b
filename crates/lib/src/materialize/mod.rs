//! Environment materialization.
//!
//! Turns a [`ResolvedEnvironment`] into an [`ActivatedShell`]: the ordered
//! search path, the exported variables and the full process environment
//! hook commands run in. Reads package directories but never writes them.
//!
//! # Precedence
//!
//! - Search paths: resolution order, first occurrence of a directory wins
//! - Package variables: first package to set a name wins
//! - Shell variables override package variables
//! - `SHELLDECK_*` variables are always set by the engine

pub mod script;

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::consts::{DEFAULT_TOOLCHAIN_MANAGERS, ENV_PACKAGES, ENV_PLATFORM, ENV_TOOLCHAIN};
use crate::platform::Platform;
use crate::resolve::ResolvedEnvironment;
use crate::store::meta::{MetaError, PackageMeta};

pub use script::{Shell, render_script};

/// Inherited variables kept in pure mode.
pub const PURE_KEEP: &[&str] = &["HOME", "USER", "TERM", "LANG", "SYSTEMROOT", "USERPROFILE", "TEMP", "TMP"];

/// Errors that can occur while materializing an environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaterializeError {
  #[error("artifact for package '{package}' is missing: {}", .path.display())]
  MissingArtifact { package: String, path: PathBuf },

  /// A package's metadata is unreadable or malformed.
  #[error("store corruption in package '{package}': {message}")]
  Metadata { package: String, message: String },

  #[error("search path {} cannot be used: {message}", .path.display())]
  InvalidSearchPath { path: PathBuf, message: String },

  #[error("package '{package}' sets invalid variable name '{name}'")]
  InvalidVariable { package: String, name: String },

  #[error("shell environment sets invalid variable name '{name}'")]
  InvalidShellVariable { name: String },
}

/// Marks an environment whose package set includes a toolchain manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainMarker {
  /// Name of the manager package (e.g. `rustup`).
  pub package: String,
  /// Program to invoke: the manager's executable when found on the search path.
  pub program: String,
}

/// A materialized environment, ready for command execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivatedShell {
  pub platform: Platform,
  /// Directories prepended to `PATH`, highest priority first.
  pub search_paths: Vec<PathBuf>,
  /// Variables exported by the environment, excluding `PATH`.
  pub variables: BTreeMap<String, String>,
  pub toolchain: Option<ToolchainMarker>,
  /// The full process environment commands run with.
  #[serde(skip)]
  pub env: BTreeMap<String, String>,
}

impl ActivatedShell {
  pub fn has_toolchain(&self) -> bool {
    self.toolchain.is_some()
  }
}

/// Builds [`ActivatedShell`]s.
#[derive(Debug, Clone)]
pub struct Materializer {
  toolchain_managers: Vec<String>,
  pure: bool,
  inherited: BTreeMap<String, String>,
}

impl Default for Materializer {
  fn default() -> Self {
    Self::new()
  }
}

impl Materializer {
  /// A materializer inheriting the current process environment.
  pub fn new() -> Self {
    Self {
      toolchain_managers: DEFAULT_TOOLCHAIN_MANAGERS.iter().map(|s| s.to_string()).collect(),
      pure: false,
      inherited: env::vars().collect(),
    }
  }

  /// Package names treated as toolchain managers without a `meta.toml` flag.
  pub fn with_toolchain_managers(mut self, managers: Vec<String>) -> Self {
    self.toolchain_managers = managers;
    self
  }

  /// Only keep [`PURE_KEEP`] from the inherited environment.
  pub fn with_pure(mut self, pure: bool) -> Self {
    self.pure = pure;
    self
  }

  /// Replace the inherited environment.
  pub fn with_inherited_env(mut self, inherited: BTreeMap<String, String>) -> Self {
    self.inherited = inherited;
    self
  }

  pub fn materialize(&self, resolved: &ResolvedEnvironment) -> Result<ActivatedShell, MaterializeError> {
    let mut search_paths: Vec<PathBuf> = Vec::new();
    let mut variables: BTreeMap<String, String> = BTreeMap::new();
    let mut toolchain = None;

    for package in &resolved.packages {
      if !package.artifact.is_dir() {
        return Err(MaterializeError::MissingArtifact {
          package: package.name.clone(),
          path: package.artifact.clone(),
        });
      }

      let meta = PackageMeta::load(&package.artifact).map_err(|e| MaterializeError::Metadata {
        package: package.name.clone(),
        message: match e {
          MetaError::Read { source, .. } => source.to_string(),
          MetaError::Malformed { message, .. } => message,
        },
      })?;

      let paths = meta.search_paths(&package.artifact);
      for path in &paths {
        if !search_paths.contains(path) {
          search_paths.push(path.clone());
        }
      }

      for (name, value) in meta.expanded_env(&package.artifact) {
        if !valid_var_name(&name) {
          return Err(MaterializeError::InvalidVariable {
            package: package.name.clone(),
            name,
          });
        }
        variables.entry(name).or_insert(value);
      }

      let is_manager = meta.toolchain_manager || self.toolchain_managers.contains(&package.name);
      if is_manager && toolchain.is_none() {
        toolchain = Some(ToolchainMarker {
          package: package.name.clone(),
          program: find_program(&paths, &package.name),
        });
      }

      debug!(package = %package.name, paths = paths.len(), "materialized package");
    }

    for (name, value) in &resolved.variables {
      if !valid_var_name(name) {
        return Err(MaterializeError::InvalidShellVariable { name: name.clone() });
      }
      variables.insert(name.clone(), value.clone());
    }

    let names: Vec<&str> = resolved.packages.iter().map(|p| p.name.as_str()).collect();
    variables.insert(ENV_PLATFORM.to_string(), resolved.platform.triple());
    variables.insert(ENV_PACKAGES.to_string(), names.join(","));
    if let Some(marker) = &toolchain {
      variables.insert(ENV_TOOLCHAIN.to_string(), marker.package.clone());
    }

    let env = self.process_env(&search_paths, &variables)?;

    info!(
      platform = %resolved.platform,
      paths = search_paths.len(),
      toolchain = toolchain.as_ref().map(|t| t.package.as_str()),
      "materialized environment"
    );

    Ok(ActivatedShell {
      platform: resolved.platform,
      search_paths,
      variables,
      toolchain,
      env,
    })
  }

  fn process_env(
    &self,
    search_paths: &[PathBuf],
    variables: &BTreeMap<String, String>,
  ) -> Result<BTreeMap<String, String>, MaterializeError> {
    let mut env: BTreeMap<String, String> = self
      .inherited
      .iter()
      .filter(|(k, _)| !self.pure || PURE_KEEP.iter().any(|keep| keep.eq_ignore_ascii_case(k)))
      .map(|(k, v)| (k.clone(), v.clone()))
      .collect();

    let inherited_path = take_path(&mut env);

    let mut entries: Vec<PathBuf> = search_paths.to_vec();
    if !self.pure
      && let Some(path) = inherited_path
    {
      entries.extend(env::split_paths(&path));
    }

    for entry in search_paths {
      env::join_paths([entry]).map_err(|e| MaterializeError::InvalidSearchPath {
        path: entry.clone(),
        message: e.to_string(),
      })?;
    }
    let joined = env::join_paths(&entries).map_err(|e| MaterializeError::InvalidSearchPath {
      path: PathBuf::new(),
      message: e.to_string(),
    })?;
    env.insert("PATH".to_string(), joined.to_string_lossy().into_owned());

    for (name, value) in variables {
      env.insert(name.clone(), value.clone());
    }
    Ok(env)
  }
}

/// Remove and return `PATH` (any case on Windows).
fn take_path(env: &mut BTreeMap<String, String>) -> Option<String> {
  let key = env
    .keys()
    .find(|k| if cfg!(windows) { k.eq_ignore_ascii_case("PATH") } else { k.as_str() == "PATH" })
    .cloned()?;
  env.remove(&key)
}

/// Whether `name` may be exported by a package or shell. `PATH` is reserved.
pub(crate) fn valid_var_name(name: &str) -> bool {
  !name.is_empty() && !name.contains(['=', '\0']) && !name.eq_ignore_ascii_case("PATH")
}

fn find_program(paths: &[PathBuf], name: &str) -> String {
  let candidates: Vec<String> = if cfg!(windows) {
    vec![format!("{}.exe", name), name.to_string()]
  } else {
    vec![name.to_string()]
  };
  paths
    .iter()
    .flat_map(|dir| candidates.iter().map(move |c| dir.join(c)))
    .find(|p| p.is_file())
    .map(|p| p.to_string_lossy().into_owned())
    .unwrap_or_else(|| name.to_string())
}

/// `true` if `dir` is one of the shell's search paths.
pub fn on_search_path(shell: &ActivatedShell, dir: &Path) -> bool {
  shell.search_paths.iter().any(|p| p == dir)
}
