//! One invocation of the engine: load, resolve, materialize, run the hook.
//!
//! A [`Session`] owns the registry cache and lock record for a single
//! descriptor. Platform resolutions started from the same session share the
//! cache, so each input is fetched at most once per pin.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::cancel::CancelToken;
use crate::config::Settings;
use crate::consts::{DESCRIPTOR_FILENAME, LOCK_FILENAME};
use crate::descriptor::{self, Descriptor, DescriptorError, DescriptorFile, HookCommand};
use crate::hook::{HookError, HookExecutor, HookResult};
use crate::inputs::backend::{LocalBackend, SourceBackend};
use crate::inputs::cache::InputCache;
use crate::inputs::lock::{LockError, LockFile};
use crate::inputs::registry::{InputRegistry, RegistryError, RegistryOptions};
use crate::inputs::Revision;
use crate::materialize::{ActivatedShell, MaterializeError, Materializer};
use crate::platform::Platform;
use crate::resolve::{PlatformResolver, ResolveError, ResolvedEnvironment};
use crate::store::{DirectoryStore, PackageStore};

#[derive(Debug, Error)]
pub enum SessionError {
  #[error("descriptor not found: {}", .searched)]
  DescriptorNotFound { searched: String },

  #[error(transparent)]
  Descriptor(#[from] DescriptorError),

  #[error("lock file {}: {source}", .path.display())]
  Lock {
    path: PathBuf,
    #[source]
    source: LockError,
  },

  #[error(transparent)]
  Input(#[from] RegistryError),

  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error(transparent)]
  Materialize(#[from] MaterializeError),

  #[error(transparent)]
  Hook(#[from] HookError),

  #[error("input '{name}' is not declared in {}", .path.display())]
  UnknownInput { name: String, path: PathBuf },

  #[error("the host platform is not supported")]
  UnsupportedHost,
}

/// Per-invocation knobs that are not persistent settings.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
  /// Clear the inherited environment apart from a few essentials.
  pub pure: bool,
  /// Inputs whose lock entries are ignored (see [`RegistryOptions::force_update`]).
  pub force_update: Option<HashSet<String>>,
}

/// Everything produced by [`Session::provision`].
#[derive(Debug)]
pub struct Provisioned {
  pub resolved: ResolvedEnvironment,
  pub activated: ActivatedShell,
  pub hook: HookResult,
}

/// What [`Session::update`] changed in the lock record.
#[derive(Debug, Default)]
pub struct UpdateReport {
  /// Inputs whose revision moved: name -> (old, new).
  pub updated: BTreeMap<String, (Revision, Revision)>,
  /// Inputs that had no lock entry before.
  pub added: Vec<String>,
  pub unchanged: Vec<String>,
  /// Lock entries dropped because the input is no longer declared.
  pub removed: Vec<String>,
  /// Whether the lock file was (or, for a dry run, would be) rewritten.
  pub lock_changed: bool,
}

impl UpdateReport {
  pub fn has_changes(&self) -> bool {
    !self.updated.is_empty() || !self.added.is_empty() || !self.removed.is_empty()
  }
}

/// Find the descriptor to use.
///
/// Priority order:
/// 1. `explicit`, which must exist
/// 2. `shelldeck.toml` in `start` or the nearest ancestor containing one
pub fn find_descriptor(explicit: Option<&Path>, start: &Path) -> Result<PathBuf, SessionError> {
  if let Some(path) = explicit {
    if path.is_file() {
      return Ok(path.to_path_buf());
    }
    return Err(SessionError::DescriptorNotFound {
      searched: path.display().to_string(),
    });
  }

  for dir in start.ancestors() {
    let candidate = dir.join(DESCRIPTOR_FILENAME);
    if candidate.is_file() {
      return Ok(candidate);
    }
  }

  Err(SessionError::DescriptorNotFound {
    searched: format!("{} in {} and its parents", DESCRIPTOR_FILENAME, start.display()),
  })
}

/// The platform of the running machine.
pub fn host_platform() -> Result<Platform, SessionError> {
  Platform::current().ok_or(SessionError::UnsupportedHost)
}

#[derive(Debug)]
pub struct Session {
  file: DescriptorFile,
  descriptor: Arc<Descriptor>,
  lock_path: PathBuf,
  backend: Arc<dyn SourceBackend>,
  store: Arc<dyn PackageStore>,
  settings: Settings,
  registry: Arc<InputRegistry>,
  resolver: PlatformResolver,
  materializer: Materializer,
  executor: HookExecutor,
  cancel: CancelToken,
}

impl Session {
  /// Load the descriptor at `path` and wire up the local backends.
  pub fn open(path: &Path, settings: Settings, options: SessionOptions) -> Result<Self, SessionError> {
    let file = descriptor::load_file(path)?;
    let backend: Arc<dyn SourceBackend> = Arc::new(LocalBackend::new(&file.base_dir));
    Self::with_backends(file, settings, options, backend, Arc::new(DirectoryStore))
  }

  /// Build a session around an already loaded descriptor and explicit backends.
  pub fn with_backends(
    file: DescriptorFile,
    settings: Settings,
    options: SessionOptions,
    backend: Arc<dyn SourceBackend>,
    store: Arc<dyn PackageStore>,
  ) -> Result<Self, SessionError> {
    let lock_path = file.base_dir.join(LOCK_FILENAME);
    let lock = load_lock(&lock_path)?;

    info!(
      descriptor = %file.path.display(),
      inputs = file.descriptor.inputs.len(),
      shells = file.descriptor.shells.len(),
      offline = settings.offline,
      "opened session"
    );

    let registry = Arc::new(build_registry(&backend, lock, &settings, options.force_update));
    let resolver = PlatformResolver::new(Arc::clone(&registry), Arc::clone(&store))
      .with_default_platforms(settings.default_platforms.clone());
    let materializer = Materializer::new()
      .with_toolchain_managers(settings.toolchain_managers.clone())
      .with_pure(options.pure);
    let executor = HookExecutor::new()
      .with_shell(settings.shell.clone())
      .with_timeout(settings.hook_timeout)
      .with_echo(settings.echo_hook_output)
      .with_working_dir(Some(file.base_dir.clone()));
    let descriptor = Arc::new(file.descriptor.clone());

    Ok(Self {
      file,
      descriptor,
      lock_path,
      backend,
      store,
      settings,
      registry,
      resolver,
      materializer,
      executor,
      cancel: CancelToken::new(),
    })
  }

  pub fn descriptor(&self) -> &Descriptor {
    &self.descriptor
  }

  pub fn path(&self) -> &Path {
    &self.file.path
  }

  pub fn base_dir(&self) -> &Path {
    &self.file.base_dir
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }

  pub fn settings(&self) -> &Settings {
    &self.settings
  }

  pub fn registry(&self) -> &Arc<InputRegistry> {
    &self.registry
  }

  /// A handle that cancels work started from this session.
  pub fn cancel_token(&self) -> CancelToken {
    self.cancel.clone()
  }

  /// Replace the materializer, e.g. to control the inherited environment.
  pub fn with_materializer(mut self, materializer: Materializer) -> Self {
    self.materializer = materializer;
    self
  }

  /// Replace the hook executor.
  pub fn with_executor(mut self, executor: HookExecutor) -> Self {
    self.executor = executor;
    self
  }

  pub async fn resolve(&self, platform: Platform) -> Result<ResolvedEnvironment, SessionError> {
    Ok(self.resolver.resolve(&self.descriptor, platform, &self.cancel).await?)
  }

  /// Resolve several platforms concurrently.
  pub async fn resolve_many(
    &self,
    platforms: &[Platform],
  ) -> Vec<(Platform, Result<ResolvedEnvironment, ResolveError>)> {
    self
      .resolver
      .resolve_many(Arc::clone(&self.descriptor), platforms, &self.cancel)
      .await
  }

  /// Concrete platforms the descriptor declares.
  pub fn declared_platforms(&self) -> Vec<Platform> {
    self.descriptor.platforms().expand(self.resolver.default_platforms())
  }

  pub fn activate(&self, resolved: &ResolvedEnvironment) -> Result<ActivatedShell, SessionError> {
    info!(platform = %resolved.platform, packages = resolved.packages.len(), "materializing environment");
    Ok(self.materializer.materialize(resolved)?)
  }

  pub async fn run_hook(
    &self,
    activated: &ActivatedShell,
    commands: &[HookCommand],
  ) -> Result<HookResult, SessionError> {
    Ok(self.executor.run(activated, commands, &self.cancel).await?)
  }

  /// Resolve, materialize and run the hook for `platform`.
  ///
  /// The lock file is saved once resolution succeeded, whatever the hook
  /// outcome. A non-zero hook is reported through [`HookResult::exit_code`].
  pub async fn provision(&self, platform: Platform) -> Result<Provisioned, SessionError> {
    let resolved = self.resolve(platform).await?;
    self.save_lock()?;
    let activated = self.activate(&resolved)?;
    let hook = self.run_hook(&activated, &resolved.hook).await?;
    info!(
      platform = %platform,
      exit_code = hook.exit_code,
      commands = hook.commands_run(),
      "provisioned environment"
    );
    Ok(Provisioned {
      resolved,
      activated,
      hook,
    })
  }

  /// Write the lock file if resolution recorded anything new.
  ///
  /// Returns whether the file was written.
  pub fn save_lock(&self) -> Result<bool, SessionError> {
    self.registry.prune_lock(&self.descriptor.inputs);
    if !self.registry.lock_changed() {
      return Ok(false);
    }
    self
      .registry
      .lock_file()
      .save(&self.lock_path)
      .map_err(|source| SessionError::Lock {
        path: self.lock_path.clone(),
        source,
      })?;
    info!(path = %self.lock_path.display(), "wrote lock file");
    Ok(true)
  }

  /// Re-resolve inputs ignoring their lock entries and rewrite the lock.
  ///
  /// An empty `names` updates every declared input. Inputs pinned in the
  /// descriptor keep their pin.
  pub async fn update(&self, names: &[String], dry_run: bool) -> Result<UpdateReport, SessionError> {
    for name in names {
      if self.descriptor.input(name).is_none() {
        return Err(SessionError::UnknownInput {
          name: name.clone(),
          path: self.file.path.clone(),
        });
      }
    }

    let old_lock = self.registry.lock_file();
    let force: HashSet<String> = if names.is_empty() {
      self.descriptor.inputs.iter().map(|i| i.name.clone()).collect()
    } else {
      names.iter().cloned().collect()
    };
    info!(count = self.descriptor.inputs.len(), force_count = force.len(), "updating inputs");

    let registry = build_registry(&self.backend, old_lock.clone(), &self.settings, Some(force));
    let resolved = registry.resolve_all(&self.descriptor.inputs, &self.cancel).await?;
    let removed = registry.prune_lock(&self.descriptor.inputs);

    let mut report = UpdateReport {
      removed,
      ..Default::default()
    };
    for input in &resolved {
      match old_lock.get(input.name()) {
        Some(old) if old.rev != input.revision => {
          report
            .updated
            .insert(input.name().to_string(), (old.rev.clone(), input.revision.clone()));
        }
        Some(_) => report.unchanged.push(input.name().to_string()),
        None => report.added.push(input.name().to_string()),
      }
    }

    report.lock_changed = report.has_changes();
    if report.lock_changed && !dry_run {
      registry.lock_file().save(&self.lock_path).map_err(|source| SessionError::Lock {
        path: self.lock_path.clone(),
        source,
      })?;
      info!(path = %self.lock_path.display(), "wrote lock file");
    }
    Ok(report)
  }

  /// The package store this session looks packages up in.
  pub fn store(&self) -> &Arc<dyn PackageStore> {
    &self.store
  }
}

fn load_lock(path: &Path) -> Result<LockFile, SessionError> {
  LockFile::load(path)
    .map(Option::unwrap_or_default)
    .map_err(|source| SessionError::Lock {
      path: path.to_path_buf(),
      source,
    })
}

fn build_registry(
  backend: &Arc<dyn SourceBackend>,
  lock: LockFile,
  settings: &Settings,
  force_update: Option<HashSet<String>>,
) -> InputRegistry {
  InputRegistry::new(
    Arc::clone(backend),
    Arc::new(InputCache::new()),
    lock,
    RegistryOptions {
      offline: settings.offline,
      timeout: settings.registry_timeout,
      force_update,
    },
  )
}
