//! Shared input resolution cache.
//!
//! One [`InputCache`] is created per session and handed to every registry
//! that should share results, typically through an `Arc` across concurrent
//! platform resolutions. Each key owns a single cell: the first caller runs
//! the fetch, concurrent callers wait on the same cell and reuse its result.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;
use tracing::trace;

use super::backend::Fetched;
use super::registry::RegistryError;
use super::source::Locator;
use super::types::Revision;

/// Identifies one fetch: what was asked for, not who asked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  pub locator: Locator,
  pub revision: Option<Revision>,
}

type Cell = Arc<OnceCell<Result<Fetched, RegistryError>>>;

/// Concurrent map from [`CacheKey`] to a fetch result.
#[derive(Debug, Default)]
pub struct InputCache {
  cells: Mutex<HashMap<CacheKey, Cell>>,
  fetches: AtomicUsize,
}

impl InputCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Return the cached result for `key`, running `fetch` if nobody has yet.
  ///
  /// Failures are cached too, so a failed fetch is not retried within the
  /// lifetime of this cache.
  pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, fetch: F) -> Result<Fetched, RegistryError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Fetched, RegistryError>>,
  {
    let cell = self.cell(&key);
    cell
      .get_or_init(|| async move {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        trace!(locator = %key.locator, "cache miss");
        fetch().await
      })
      .await
      .clone()
  }

  /// Number of fetches actually performed through this cache.
  pub fn fetch_count(&self) -> usize {
    self.fetches.load(Ordering::SeqCst)
  }

  /// Number of distinct keys seen.
  pub fn len(&self) -> usize {
    self.cells.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn cell(&self, key: &CacheKey) -> Cell {
    let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(cells.entry(key.clone()).or_default())
  }
}
