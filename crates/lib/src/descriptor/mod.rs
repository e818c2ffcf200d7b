//! Environment descriptor loading.
//!
//! A descriptor (`shelldeck.toml`) declares human-readable metadata, named
//! inputs and one or more shells. Each shell carries a platform predicate,
//! a package list and an ordered hook.

mod load;
mod types;

pub use load::{DescriptorError, DescriptorFile, Location, load, load_file, validate};
pub use types::*;
