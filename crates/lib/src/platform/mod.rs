//! Platform identifiers and host detection.
//!
//! A [`Platform`] is an `arch-os` triple such as `aarch64-darwin`. Descriptors
//! select platforms through [`PlatformPattern`]s, which may name a full triple
//! or only an operating system.

pub mod arch;
pub mod os;
pub mod paths;

use std::fmt;
use std::str::FromStr;

use arch::Arch;
use os::Os;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when parsing platform identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformParseError {
  #[error("unknown operating system '{0}'")]
  UnknownOs(String),

  #[error("unknown architecture '{0}'")]
  UnknownArch(String),

  #[error("malformed platform '{0}', expected '<arch>-<os>' or '<os>'")]
  Malformed(String),
}

/// Platform identifier combining architecture and OS (e.g., "aarch64-darwin")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

/// Platforms covered by a descriptor that declares `platforms = "all"`.
pub const DEFAULT_PLATFORMS: [Platform; 4] = [
  Platform::new(Arch::X86_64, Os::Linux),
  Platform::new(Arch::Aarch64, Os::Linux),
  Platform::new(Arch::X86_64, Os::MacOs),
  Platform::new(Arch::Aarch64, Os::MacOs),
];

impl Platform {
  /// Create a new platform identifier
  pub const fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: Os::current()?,
    })
  }

  /// Returns the platform triple string (e.g., "aarch64-darwin")
  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }

  /// Parse a requested platform.
  ///
  /// Accepts a full triple, or a bare OS name which is completed with the
  /// host architecture (x86_64 when the host architecture is unknown).
  pub fn parse_requested(s: &str) -> Result<Self, PlatformParseError> {
    if s.contains('-') {
      return s.parse();
    }
    let os = s.parse::<Os>()?;
    Ok(Self::new(Arch::current().unwrap_or(Arch::X86_64), os))
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}

impl FromStr for Platform {
  type Err = PlatformParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (arch, os) = s
      .split_once('-')
      .ok_or_else(|| PlatformParseError::Malformed(s.to_string()))?;
    Ok(Self::new(arch.parse()?, os.parse()?))
  }
}

impl From<Platform> for String {
  fn from(platform: Platform) -> Self {
    platform.triple()
  }
}

impl TryFrom<String> for Platform {
  type Error = PlatformParseError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

/// A platform predicate as written in a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlatformPattern {
  /// Any architecture on this OS (`"linux"`).
  Os(Os),
  /// Exactly this triple (`"x86_64-linux"`).
  Exact(Platform),
}

impl PlatformPattern {
  /// Check whether `platform` satisfies this pattern.
  pub fn matches(&self, platform: &Platform) -> bool {
    match self {
      PlatformPattern::Os(os) => platform.os == *os,
      PlatformPattern::Exact(exact) => exact == platform,
    }
  }
}

impl fmt::Display for PlatformPattern {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PlatformPattern::Os(os) => write!(f, "{}", os),
      PlatformPattern::Exact(platform) => write!(f, "{}", platform),
    }
  }
}

impl FromStr for PlatformPattern {
  type Err = PlatformParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s.contains('-') {
      Ok(PlatformPattern::Exact(s.parse()?))
    } else {
      Ok(PlatformPattern::Os(s.parse()?))
    }
  }
}

/// Returns the platform triple for the current system (e.g., "aarch64-darwin")
///
/// Returns `None` if the current platform is not supported
pub fn platform_triple() -> Option<String> {
  Platform::current().map(|p| p.triple())
}
