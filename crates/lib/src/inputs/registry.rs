//! The input registry: pins declared inputs to content-addressed revisions.
//!
//! # Resolution Algorithm
//!
//! For each input:
//! - If the input is force-updated: ignore the lock, fetch what is declared
//! - If the lock records a different locator: conflict (requires `shelldeck update`)
//! - If the descriptor pins a rev and the lock records another: conflict
//! - Otherwise pin = declared rev, else locked rev; verify it at the source
//! - Without any pin: fetch latest and record it in the lock
//!
//! In offline mode an input without a pin is unresolvable.
//!
//! A registry resolves each declared input once. Later requests for the same
//! input reuse that outcome, so a lock entry recorded mid-session never
//! changes which revision (or which fetch) a concurrent request gets.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::backend::{FetchRequest, Fetched, SourceBackend};
use super::cache::{CacheKey, InputCache};
use super::lock::{LockFile, LockedInput};
use super::source::Locator;
use super::types::{InputRef, ResolvedInput, Revision};
use crate::cancel::CancelToken;

/// Errors that can occur during input resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
  /// The input could not be looked up or its revision does not exist.
  #[error("failed to resolve input '{name}' ({locator}): {reason}")]
  Unresolvable {
    name: String,
    locator: String,
    reason: String,
  },

  /// The lock file disagrees with what the descriptor asks for.
  #[error("input '{name}' declares {declared} but the lock file records {locked}. Run 'shelldeck update {name}' to update.")]
  RevisionConflict {
    name: String,
    declared: String,
    locked: String,
  },

  /// The backend did not answer in time.
  #[error("resolving input '{name}' timed out after {}", humantime::format_duration(*.after))]
  Timeout { name: String, after: Duration },

  #[error("input resolution cancelled")]
  Cancelled,
}

/// Knobs for a registry.
#[derive(Debug, Clone, Default)]
pub struct RegistryOptions {
  /// Air-gapped mode: every input needs a pin or a lock entry.
  pub offline: bool,
  /// Upper bound on a single backend call.
  pub timeout: Option<Duration>,
  /// Inputs that ignore their lock entry.
  /// - `None`: use lock file revisions (normal behavior)
  /// - `Some(empty set)`: force update all inputs
  /// - `Some(non-empty set)`: force update only the named inputs
  pub force_update: Option<HashSet<String>>,
}

impl RegistryOptions {
  fn is_forced(&self, name: &str) -> bool {
    self
      .force_update
      .as_ref()
      .map(|set| set.is_empty() || set.contains(name))
      .unwrap_or(false)
  }
}

#[derive(Debug)]
struct LockState {
  file: LockFile,
  changed: bool,
}

/// A declared input as written in the descriptor.
type DeclaredKey = (String, Locator, Option<Revision>);

type ResolvedCell = Arc<OnceCell<Result<ResolvedInput, RegistryError>>>;

/// Resolves [`InputRef`]s through a backend, a shared cache and a lock file.
#[derive(Debug)]
pub struct InputRegistry {
  backend: Arc<dyn SourceBackend>,
  cache: Arc<InputCache>,
  lock: Mutex<LockState>,
  resolved: Mutex<HashMap<DeclaredKey, ResolvedCell>>,
  options: RegistryOptions,
}

impl InputRegistry {
  pub fn new(
    backend: Arc<dyn SourceBackend>,
    cache: Arc<InputCache>,
    lock: LockFile,
    options: RegistryOptions,
  ) -> Self {
    Self {
      backend,
      cache,
      lock: Mutex::new(LockState {
        file: lock,
        changed: false,
      }),
      resolved: Mutex::new(HashMap::new()),
      options,
    }
  }

  pub fn cache(&self) -> &Arc<InputCache> {
    &self.cache
  }

  pub fn options(&self) -> &RegistryOptions {
    &self.options
  }

  /// Resolve an input to a pinned revision and store handle.
  ///
  /// An already pinned input keeps its revision; resolution only verifies
  /// that the revision still exists at the source. Repeated and concurrent
  /// requests for the same declared input share the first outcome.
  pub async fn resolve(&self, input: &InputRef, cancel: &CancelToken) -> Result<ResolvedInput, RegistryError> {
    if cancel.is_cancelled() {
      return Err(RegistryError::Cancelled);
    }

    let cell = self.resolved_cell(input);
    cell.get_or_init(|| self.resolve_declared(input)).await.clone()
  }

  async fn resolve_declared(&self, input: &InputRef) -> Result<ResolvedInput, RegistryError> {
    let pin = self.pin_for(input)?;
    debug!(name = %input.name, locator = %input.locator, pin = ?pin.as_ref().map(Revision::as_str), "resolving input");

    if self.options.offline && pin.is_none() {
      return Err(RegistryError::Unresolvable {
        name: input.name.clone(),
        locator: input.locator.to_string(),
        reason: "offline mode requires a lock entry or a pinned revision".to_string(),
      });
    }

    let key = CacheKey {
      locator: input.locator.clone(),
      revision: pin.clone(),
    };
    let request = FetchRequest {
      name: input.name.clone(),
      locator: input.locator.clone(),
      revision: pin,
      offline: self.options.offline,
    };
    let fetched = self.cache.get_or_fetch(key, || self.fetch(request)).await?;

    if let Some(declared) = &input.revision
      && *declared != fetched.revision
    {
      // A backend must never move a pin.
      return Err(RegistryError::RevisionConflict {
        name: input.name.clone(),
        declared: format!("{}#{}", input.locator, declared),
        locked: format!("{}#{}", input.locator, fetched.revision),
      });
    }

    self.record(input, &fetched.revision);

    Ok(ResolvedInput {
      input: input.clone().with_revision(fetched.revision.clone()),
      revision: fetched.revision,
      handle: fetched.handle,
    })
  }

  /// Resolve several inputs in order, stopping at the first failure.
  pub async fn resolve_all(
    &self,
    inputs: &[InputRef],
    cancel: &CancelToken,
  ) -> Result<Vec<ResolvedInput>, RegistryError> {
    info!(count = inputs.len(), "resolving inputs");
    let mut resolved = Vec::with_capacity(inputs.len());
    for input in inputs {
      resolved.push(self.resolve(input, cancel).await?);
    }
    Ok(resolved)
  }

  /// Drop lock entries for inputs that are no longer declared.
  pub fn prune_lock(&self, declared: &[InputRef]) -> Vec<String> {
    let keep: HashSet<&str> = declared.iter().map(|i| i.name.as_str()).collect();
    let mut state = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
    let removed = state.file.prune(&keep);
    for name in &removed {
      warn!(name = %name, "removing stale input from lock file");
    }
    if !removed.is_empty() {
      state.changed = true;
    }
    removed
  }

  /// A copy of the current lock record.
  pub fn lock_file(&self) -> LockFile {
    self.lock.lock().unwrap_or_else(PoisonError::into_inner).file.clone()
  }

  /// Whether resolution added or changed lock entries.
  pub fn lock_changed(&self) -> bool {
    self.lock.lock().unwrap_or_else(PoisonError::into_inner).changed
  }

  fn resolved_cell(&self, input: &InputRef) -> ResolvedCell {
    let key = (input.name.clone(), input.locator.clone(), input.revision.clone());
    let mut resolved = self.resolved.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(resolved.entry(key).or_default())
  }

  /// Work out which revision to ask the backend for.
  fn pin_for(&self, input: &InputRef) -> Result<Option<Revision>, RegistryError> {
    if self.options.is_forced(&input.name) {
      return Ok(input.revision.clone());
    }

    let state = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(locked) = state.file.get(&input.name) else {
      return Ok(input.revision.clone());
    };

    if !locked.matches(&input.locator) {
      return Err(RegistryError::RevisionConflict {
        name: input.name.clone(),
        declared: input.locator.to_string(),
        locked: format!("{}#{}", locked.url, locked.rev),
      });
    }

    match &input.revision {
      Some(declared) if *declared != locked.rev => Err(RegistryError::RevisionConflict {
        name: input.name.clone(),
        declared: format!("{}#{}", input.locator, declared),
        locked: format!("{}#{}", locked.url, locked.rev),
      }),
      Some(declared) => Ok(Some(declared.clone())),
      None => Ok(Some(locked.rev.clone())),
    }
  }

  async fn fetch(&self, request: FetchRequest) -> Result<Fetched, RegistryError> {
    let name = request.name.clone();
    let locator = request.locator.to_string();
    let backend = Arc::clone(&self.backend);
    let task = tokio::task::spawn_blocking(move || backend.fetch(&request));

    let joined = match self.options.timeout {
      Some(after) => tokio::time::timeout(after, task)
        .await
        .map_err(|_| RegistryError::Timeout {
          name: name.clone(),
          after,
        })?,
      None => task.await,
    };

    let outcome = joined.map_err(|e| RegistryError::Unresolvable {
      name: name.clone(),
      locator: locator.clone(),
      reason: format!("fetch task failed: {}", e),
    })?;

    outcome.map_err(|e| RegistryError::Unresolvable {
      name,
      locator,
      reason: e.to_string(),
    })
  }

  fn record(&self, input: &InputRef, revision: &Revision) {
    let timestamp = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .map(|d| d.as_secs())
      .unwrap_or(0);

    let entry = LockedInput::new(&input.locator, revision.clone()).with_last_modified(timestamp);
    let mut state = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
    if state.file.insert(input.name.clone(), entry) {
      info!(name = %input.name, rev = %revision.short(), "locking input");
      state.changed = true;
    }
  }
}
