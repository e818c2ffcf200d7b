//! Per-platform resolution of a descriptor into a concrete package set.
//!
//! For a requested platform the resolver:
//! 1. Rejects platforms the descriptor does not declare (no registry access)
//! 2. Composes every matching shell in declaration order
//! 3. Resolves each package's input through the [`InputRegistry`]
//! 4. Looks the package up in the input's store for that platform
//!
//! Duplicate package names keep the first declaration.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::descriptor::{Descriptor, HookCommand, PackageRef};
use crate::inputs::registry::{InputRegistry, RegistryError};
use crate::inputs::{ResolvedInput, Revision};
use crate::platform::{DEFAULT_PLATFORMS, Platform};
use crate::store::{PackageStore, StoreError};

/// Errors from platform resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
  #[error("platform {platform} is not supported by this descriptor (declared: {declared})")]
  UnsupportedPlatform { platform: Platform, declared: String },

  #[error("package '{name}' from input '{input}' not found for {platform}")]
  PackageNotFound {
    name: String,
    input: String,
    platform: Platform,
  },

  #[error(transparent)]
  Input(#[from] RegistryError),

  #[error("package lookup failed: {0}")]
  Store(StoreError),

  #[error("resolution cancelled")]
  Cancelled,

  #[error("resolution task for {platform} failed: {message}")]
  Task { platform: Platform, message: String },
}

/// One package pinned to an artifact path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPackage {
  pub name: String,
  pub input: String,
  pub revision: Revision,
  pub artifact: PathBuf,
}

/// The concrete package set of a descriptor for one platform.
///
/// Built per invocation and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEnvironment {
  pub platform: Platform,
  /// Names of the shells that contributed, in order.
  pub shells: Vec<String>,
  /// Packages in resolution order.
  pub packages: Vec<ResolvedPackage>,
  /// Variables declared by the contributing shells.
  pub variables: BTreeMap<String, String>,
  pub hook: Vec<HookCommand>,
  /// Input name to the revision it was resolved to.
  pub revisions: BTreeMap<String, Revision>,
}

impl ResolvedEnvironment {
  pub fn package(&self, name: &str) -> Option<&ResolvedPackage> {
    self.packages.iter().find(|p| p.name == name)
  }
}

/// Resolves descriptors against a registry and a package store.
///
/// Cheap to clone; clones share the registry and its cache.
#[derive(Debug, Clone)]
pub struct PlatformResolver {
  registry: Arc<InputRegistry>,
  store: Arc<dyn PackageStore>,
  defaults: Arc<[Platform]>,
}

impl PlatformResolver {
  pub fn new(registry: Arc<InputRegistry>, store: Arc<dyn PackageStore>) -> Self {
    Self {
      registry,
      store,
      defaults: Arc::from(DEFAULT_PLATFORMS.as_slice()),
    }
  }

  /// Override the platforms `platforms = "all"` stands for.
  pub fn with_default_platforms(mut self, defaults: Vec<Platform>) -> Self {
    self.defaults = Arc::from(defaults);
    self
  }

  pub fn registry(&self) -> &Arc<InputRegistry> {
    &self.registry
  }

  pub fn default_platforms(&self) -> &[Platform] {
    &self.defaults
  }

  /// Whether `platform` is covered by the descriptor.
  pub fn supports(&self, descriptor: &Descriptor, platform: &Platform) -> bool {
    descriptor.platforms().matches_with(platform, &self.defaults)
  }

  /// Resolve `descriptor` for one platform.
  pub async fn resolve(
    &self,
    descriptor: &Descriptor,
    platform: Platform,
    cancel: &CancelToken,
  ) -> Result<ResolvedEnvironment, ResolveError> {
    if !self.supports(descriptor, &platform) {
      return Err(ResolveError::UnsupportedPlatform {
        platform,
        declared: descriptor.platforms().to_string(),
      });
    }
    if cancel.is_cancelled() {
      return Err(ResolveError::Cancelled);
    }

    info!(platform = %platform, "resolving environment");

    let mut shells = Vec::new();
    let mut refs: Vec<&PackageRef> = Vec::new();
    let mut seen = HashSet::new();
    let mut variables = BTreeMap::new();
    for shell in descriptor.shells_for(&platform, &self.defaults) {
      shells.push(shell.name.clone());
      for package in &shell.packages {
        if seen.insert(package.name.as_str()) {
          refs.push(package);
        } else {
          warn!(package = %package.name, shell = %shell.name, "ignoring duplicate package");
        }
      }
      for (key, value) in &shell.env {
        variables.entry(key.clone()).or_insert_with(|| value.clone());
      }
    }

    let mut inputs: HashMap<&str, ResolvedInput> = HashMap::new();
    let mut packages = Vec::with_capacity(refs.len());
    for package in refs {
      if cancel.is_cancelled() {
        return Err(ResolveError::Cancelled);
      }

      if !inputs.contains_key(package.input.as_str()) {
        let input = descriptor.input(&package.input).ok_or_else(|| {
          ResolveError::Input(RegistryError::Unresolvable {
            name: package.input.clone(),
            locator: String::new(),
            reason: "input is not declared".to_string(),
          })
        })?;
        let resolved = self.registry.resolve(input, cancel).await?;
        inputs.insert(package.input.as_str(), resolved);
      }
      let Some(resolved) = inputs.get(package.input.as_str()) else {
        continue;
      };

      let artifact = self
        .store
        .lookup(&resolved.handle, &package.name, &platform)
        .map_err(|e| match e {
          StoreError::NotFound { .. } => ResolveError::PackageNotFound {
            name: package.name.clone(),
            input: package.input.clone(),
            platform,
          },
          other => ResolveError::Store(other),
        })?;

      debug!(package = %package.name, artifact = %artifact.display(), "resolved package");
      packages.push(ResolvedPackage {
        name: package.name.clone(),
        input: package.input.clone(),
        revision: resolved.revision.clone(),
        artifact,
      });
    }

    let revisions = inputs
      .into_iter()
      .map(|(name, resolved)| (name.to_string(), resolved.revision))
      .collect();

    Ok(ResolvedEnvironment {
      platform,
      shells,
      packages,
      variables,
      hook: descriptor.hook_for(&platform, &self.defaults),
      revisions,
    })
  }

  /// Resolve several platforms concurrently, one task per platform.
  ///
  /// Results come back in the order of `platforms`. Tasks share only the
  /// registry cache.
  pub async fn resolve_many(
    &self,
    descriptor: Arc<Descriptor>,
    platforms: &[Platform],
    cancel: &CancelToken,
  ) -> Vec<(Platform, Result<ResolvedEnvironment, ResolveError>)> {
    let handles: Vec<_> = platforms
      .iter()
      .map(|&platform| {
        let resolver = self.clone();
        let descriptor = Arc::clone(&descriptor);
        let cancel = cancel.clone();
        let handle = tokio::spawn(async move { resolver.resolve(&descriptor, platform, &cancel).await });
        (platform, handle)
      })
      .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (platform, handle) in handles {
      let result = handle.await.unwrap_or_else(|e| {
        Err(ResolveError::Task {
          platform,
          message: e.to_string(),
        })
      });
      results.push((platform, result));
    }
    results
  }
}
