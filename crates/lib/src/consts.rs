//! Crate-wide constants.

/// Application name used for directories and environment variable prefixes.
pub const APP_NAME: &str = "shelldeck";

/// Default descriptor file name, looked up in the working directory.
pub const DESCRIPTOR_FILENAME: &str = "shelldeck.toml";

/// Lock file name, written next to the descriptor.
pub const LOCK_FILENAME: &str = "shelldeck.lock";

/// Settings file name inside the config directory.
pub const SETTINGS_FILENAME: &str = "config.toml";

/// Per-package metadata file inside an artifact directory.
pub const PACKAGE_META_FILENAME: &str = "meta.toml";

/// File inside a `store:` registry naming its latest revision.
pub const LATEST_REV_FILENAME: &str = "latest";

/// Entries skipped when hashing a `path:` input.
pub const HASH_EXCLUDES: &[&str] = &[".git", LOCK_FILENAME];

/// Environment variable forcing air-gapped resolution.
pub const ENV_OFFLINE: &str = "SHELLDECK_OFFLINE";

/// Environment variable overriding the settings file location.
pub const ENV_CONFIG: &str = "SHELLDECK_CONFIG";

/// Environment variable holding the log filter.
pub const ENV_LOG: &str = "SHELLDECK_LOG";

/// Exported into every activated shell: the resolved platform triple.
pub const ENV_PLATFORM: &str = "SHELLDECK_PLATFORM";

/// Exported into every activated shell: comma-separated package names.
pub const ENV_PACKAGES: &str = "SHELLDECK_PACKAGES";

/// Exported when a toolchain manager is active: its package name.
pub const ENV_TOOLCHAIN: &str = "SHELLDECK_TOOLCHAIN";

/// Toolchain manager packages recognised without explicit metadata.
pub const DEFAULT_TOOLCHAIN_MANAGERS: &[&str] = &["rustup"];
