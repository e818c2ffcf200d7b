//! In-memory model of an environment descriptor.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::inputs::InputRef;
use crate::platform::arch::Arch;
use crate::platform::{DEFAULT_PLATFORMS, Platform, PlatformPattern};

/// A validated environment descriptor.
///
/// Immutable once loaded; two loads of identical text compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
  pub description: Option<String>,
  /// Inputs in declaration order. Names are unique.
  pub inputs: Vec<InputRef>,
  /// Shell declarations in declaration order.
  pub shells: Vec<ShellDecl>,
}

impl Descriptor {
  /// Look up a declared input by name.
  pub fn input(&self, name: &str) -> Option<&InputRef> {
    self.inputs.iter().find(|i| i.name == name)
  }

  /// The union of every shell's platform predicate.
  pub fn platforms(&self) -> PlatformSet {
    let mut patterns = Vec::new();
    for shell in &self.shells {
      match &shell.platforms {
        PlatformSet::All => return PlatformSet::All,
        PlatformSet::Only(list) => {
          for pattern in list {
            if !patterns.contains(pattern) {
              patterns.push(*pattern);
            }
          }
        }
      }
    }
    PlatformSet::Only(patterns)
  }

  /// Shells whose predicate matches `platform`, in declaration order.
  pub fn shells_for<'a>(
    &'a self,
    platform: &'a Platform,
    defaults: &'a [Platform],
  ) -> impl Iterator<Item = &'a ShellDecl> + 'a {
    self
      .shells
      .iter()
      .filter(move |shell| shell.platforms.matches_with(platform, defaults))
  }

  /// Every hook command of the shells matching `platform`, in order.
  pub fn hook_for(&self, platform: &Platform, defaults: &[Platform]) -> Vec<HookCommand> {
    self
      .shells_for(platform, defaults)
      .flat_map(|shell| shell.hook.iter().cloned())
      .collect()
  }
}

/// One shell (environment output) declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellDecl {
  pub name: String,
  pub platforms: PlatformSet,
  pub packages: Vec<PackageRef>,
  pub hook: Vec<HookCommand>,
  /// Variables exported into the activated shell.
  pub env: BTreeMap<String, String>,
}

/// The platforms a shell applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformSet {
  /// Every platform in the recognized default list.
  All,
  /// Platforms matching at least one pattern.
  Only(Vec<PlatformPattern>),
}

impl PlatformSet {
  /// Check `platform` against this set, using the built-in default list for `All`.
  pub fn matches(&self, platform: &Platform) -> bool {
    self.matches_with(platform, &DEFAULT_PLATFORMS)
  }

  /// Check `platform` against this set; `All` covers exactly `defaults`.
  pub fn matches_with(&self, platform: &Platform, defaults: &[Platform]) -> bool {
    match self {
      PlatformSet::All => defaults.contains(platform),
      PlatformSet::Only(patterns) => patterns.iter().any(|p| p.matches(platform)),
    }
  }

  pub fn is_empty(&self) -> bool {
    matches!(self, PlatformSet::Only(patterns) if patterns.is_empty())
  }

  /// Concrete platforms this set stands for.
  ///
  /// A bare OS expands to the matching `defaults`, or to the host
  /// architecture on that OS when no default matches.
  pub fn expand(&self, defaults: &[Platform]) -> Vec<Platform> {
    let patterns = match self {
      PlatformSet::All => return defaults.to_vec(),
      PlatformSet::Only(patterns) => patterns,
    };

    let mut platforms: Vec<Platform> = Vec::new();
    let mut push = |p: Platform| {
      if !platforms.contains(&p) {
        platforms.push(p);
      }
    };
    for pattern in patterns {
      match pattern {
        PlatformPattern::Exact(platform) => push(*platform),
        PlatformPattern::Os(os) => {
          let matching: Vec<Platform> = defaults.iter().copied().filter(|p| p.os == *os).collect();
          if matching.is_empty() {
            push(Platform::new(Arch::current().unwrap_or(Arch::X86_64), *os));
          }
          for platform in matching {
            push(platform);
          }
        }
      }
    }
    platforms
  }
}

impl fmt::Display for PlatformSet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PlatformSet::All => f.write_str("all"),
      PlatformSet::Only(patterns) => {
        let names: Vec<String> = patterns.iter().map(ToString::to_string).collect();
        f.write_str(&names.join(", "))
      }
    }
  }
}

/// A package requested from a named input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageRef {
  pub name: String,
  pub input: String,
}

impl PackageRef {
  pub fn new(name: impl Into<String>, input: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      input: input.into(),
    }
  }
}

/// A post-provision hook step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HookCommand {
  /// A shell command line.
  Run { cmd: String },
  /// `<manager> component add <names...>` for the active toolchain manager.
  Components { add: Vec<String> },
}

impl HookCommand {
  pub fn run(cmd: impl Into<String>) -> Self {
    HookCommand::Run { cmd: cmd.into() }
  }
}

impl fmt::Display for HookCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      HookCommand::Run { cmd } => f.write_str(cmd),
      HookCommand::Components { add } => write!(f, "components: {}", add.join(" ")),
    }
  }
}
