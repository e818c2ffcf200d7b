//! shelldeck-lib: declarative multi-platform environment composition
//!
//! The pipeline for one invocation:
//! - `descriptor`: load and validate `shelldeck.toml`
//! - `inputs`: pin named inputs to content-addressed revisions
//! - `resolve`: pick the package set for a platform
//! - `materialize`: build the activated shell environment
//! - `hook`: run the post-provision hook in that environment
//!
//! `session` wires these together and persists the lock file.

pub mod cancel;
pub mod config;
pub mod consts;
pub mod descriptor;
pub mod hook;
pub mod inputs;
pub mod materialize;
pub mod platform;
pub mod resolve;
pub mod session;
pub mod store;
pub mod util;
