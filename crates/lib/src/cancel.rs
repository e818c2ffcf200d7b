//! Cooperative cancellation.
//!
//! Long-running steps (input resolution, package lookups, hook commands)
//! check a [`CancelToken`] between units of work and stop early, keeping
//! whatever already completed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cloneable cancellation flag shared between a caller and the engine.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
  flag: Arc<AtomicBool>,
}

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  /// Request cancellation. Idempotent.
  pub fn cancel(&self) {
    self.flag.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.flag.load(Ordering::SeqCst)
  }
}
