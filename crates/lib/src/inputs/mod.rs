//! Input resolution and management.
//!
//! This module resolves the named inputs declared in a descriptor's
//! `[inputs]` table to pinned, content-addressed revisions.
//!
//! # Modules
//!
//! - [`source`] - Locator parsing for input sources
//! - [`backend`] - Source backends that find revisions and content
//! - [`cache`] - Shared single-fetch-per-key resolution cache
//! - [`lock`] - Lock file management for reproducible runs
//! - [`registry`] - Resolution policy: pins, lock, offline mode
//! - [`types`] - Core input types (declarations, revisions, resolved inputs)

pub mod backend;
pub mod cache;
pub mod lock;
pub mod registry;
pub mod source;
mod types;

pub use types::*;
