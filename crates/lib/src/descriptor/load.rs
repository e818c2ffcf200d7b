//! Descriptor parsing, validation and rendering.
//!
//! Parsing happens in two passes: `toml` deserializes the document into raw
//! serde structs (wrong types and malformed syntax surface as
//! [`DescriptorError::Parse`]), then the raw structs are converted and
//! checked into a [`Descriptor`] (semantic problems surface as
//! [`DescriptorError::Validation`] with the offending field path).

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use toml::Spanned;
use tracing::debug;

use super::types::{Descriptor, HookCommand, PackageRef, PlatformSet, ShellDecl};
use crate::inputs::source;
use crate::inputs::{InputRef, Revision};
use crate::materialize::valid_var_name;
use crate::platform::PlatformPattern;

/// A line/column position in descriptor text, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
  pub line: usize,
  pub column: usize,
}

impl Location {
  /// Compute the position of byte `offset` within `text`.
  pub fn from_offset(text: &str, offset: usize) -> Self {
    let offset = offset.min(text.len());
    let before = text.get(..offset).unwrap_or(text);
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    Self { line, column }
  }
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "line {}, column {}", self.line, self.column)
  }
}

fn at(location: &Option<Location>) -> String {
  location.map(|l| format!(" at {}", l)).unwrap_or_default()
}

/// Errors that can occur when loading a descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
  /// Malformed syntax or a field of the wrong type.
  #[error("parse error{}: {message}", at(.location))]
  Parse {
    message: String,
    location: Option<Location>,
  },

  /// Well-formed text describing an invalid environment.
  #[error("invalid descriptor{}: {path}: {message}", at(.location))]
  Validation {
    /// Field path such as `shells[0].packages[1]`.
    path: String,
    message: String,
    location: Option<Location>,
  },

  #[error("failed to read descriptor {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl DescriptorError {
  fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
    DescriptorError::Validation {
      path: path.into(),
      message: message.into(),
      location: None,
    }
  }

  fn located(self, text: &str, span: Range<usize>) -> Self {
    match self {
      DescriptorError::Validation {
        path,
        message,
        location: None,
      } => DescriptorError::Validation {
        path,
        message,
        location: Some(Location::from_offset(text, span.start)),
      },
      other => other,
    }
  }

  /// Source position of the error, when known.
  pub fn location(&self) -> Option<Location> {
    match self {
      DescriptorError::Parse { location, .. } | DescriptorError::Validation { location, .. } => *location,
      DescriptorError::Read { .. } => None,
    }
  }
}

/// A descriptor loaded from disk together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorFile {
  pub path: PathBuf,
  /// Directory relative locators resolve against.
  pub base_dir: PathBuf,
  pub descriptor: Descriptor,
}

/// Parse and validate descriptor text.
pub fn load(text: &str) -> Result<Descriptor, DescriptorError> {
  let raw: RawDescriptor = toml::from_str(text).map_err(|e| toml_error(text, &e))?;
  let descriptor = raw.into_descriptor(text)?;
  validate(&descriptor)?;
  debug!(
    inputs = descriptor.inputs.len(),
    shells = descriptor.shells.len(),
    "loaded descriptor"
  );
  Ok(descriptor)
}

/// Read, parse and validate a descriptor file.
pub fn load_file(path: &Path) -> Result<DescriptorFile, DescriptorError> {
  let text = fs::read_to_string(path).map_err(|source| DescriptorError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  let descriptor = load(&text)?;

  let path = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
  let base_dir = path
    .parent()
    .map(Path::to_path_buf)
    .unwrap_or_else(|| PathBuf::from("."));

  Ok(DescriptorFile {
    path,
    base_dir,
    descriptor,
  })
}

/// Check the invariants of a descriptor, however it was built.
pub fn validate(descriptor: &Descriptor) -> Result<(), DescriptorError> {
  let mut inputs = HashSet::new();
  for (i, input) in descriptor.inputs.iter().enumerate() {
    if input.name.is_empty() {
      return Err(DescriptorError::validation(format!("inputs[{}]", i), "input name is empty"));
    }
    if !inputs.insert(input.name.as_str()) {
      return Err(DescriptorError::validation(
        format!("inputs.{}", input.name),
        format!("duplicate input name '{}'", input.name),
      ));
    }
  }

  if descriptor.shells.is_empty() {
    return Err(DescriptorError::validation("shells", "at least one shell must be declared"));
  }

  let mut shells = HashSet::new();
  for (i, shell) in descriptor.shells.iter().enumerate() {
    if !shells.insert(shell.name.as_str()) {
      return Err(DescriptorError::validation(
        format!("shells[{}].name", i),
        format!("duplicate shell name '{}'", shell.name),
      ));
    }
    if shell.platforms.is_empty() {
      return Err(DescriptorError::validation(
        format!("shells[{}].platforms", i),
        "platform set is empty",
      ));
    }
    for (j, package) in shell.packages.iter().enumerate() {
      if !inputs.contains(package.input.as_str()) {
        return Err(DescriptorError::validation(
          format!("shells[{}].packages[{}]", i, j),
          format!(
            "package '{}' refers to undeclared input '{}'",
            package.name, package.input
          ),
        ));
      }
    }
    for name in shell.env.keys() {
      if !valid_var_name(name) {
        let message = if name.eq_ignore_ascii_case("PATH") {
          "PATH is built from package search paths and cannot be set by a shell".to_string()
        } else {
          format!("invalid variable name '{}'", name.escape_debug())
        };
        return Err(DescriptorError::validation(format!("shells[{}].env.{}", i, name), message));
      }
    }
    for (j, command) in shell.hook.iter().enumerate() {
      let empty = match command {
        HookCommand::Run { cmd } => cmd.trim().is_empty(),
        HookCommand::Components { add } => add.is_empty(),
      };
      if empty {
        return Err(DescriptorError::validation(
          format!("shells[{}].hook[{}]", i, j),
          "hook command is empty",
        ));
      }
    }
  }

  Ok(())
}

fn toml_error(text: &str, err: &toml::de::Error) -> DescriptorError {
  let location = err.span().map(|span| Location::from_offset(text, span.start));
  let message = err.message().to_string();
  if message.contains("duplicate") {
    return DescriptorError::Validation {
      path: "document".to_string(),
      message,
      location,
    };
  }
  DescriptorError::Parse { message, location }
}

impl Descriptor {
  /// Render the descriptor back to TOML that loads to an equal value.
  ///
  /// Written by hand so declaration order survives.
  pub fn to_toml(&self) -> String {
    let mut out = String::new();
    if let Some(description) = &self.description {
      out.push_str(&format!("description = {}\n\n", quote(description)));
    }

    if !self.inputs.is_empty() {
      out.push_str("[inputs]\n");
      for input in &self.inputs {
        let url = match &input.revision {
          Some(rev) => format!("{}#{}", input.locator, rev),
          None => input.locator.to_string(),
        };
        out.push_str(&format!("{} = {}\n", key(&input.name), quote(&url)));
      }
      out.push('\n');
    }

    for shell in &self.shells {
      out.push_str("[[shells]]\n");
      out.push_str(&format!("name = {}\n", quote(&shell.name)));

      let platforms = match &shell.platforms {
        PlatformSet::All => quote("all"),
        PlatformSet::Only(patterns) => array(patterns.iter().map(|p| quote(&p.to_string()))),
      };
      out.push_str(&format!("platforms = {}\n", platforms));

      let packages = shell
        .packages
        .iter()
        .map(|p| format!("{{ name = {}, input = {} }}", quote(&p.name), quote(&p.input)));
      out.push_str(&format!("packages = {}\n", array(packages)));

      let hook = shell.hook.iter().map(|c| match c {
        HookCommand::Run { cmd } => quote(cmd),
        HookCommand::Components { add } => {
          format!("{{ components = {} }}", array(add.iter().map(|a| quote(a))))
        }
      });
      out.push_str(&format!("hook = {}\n", array(hook)));

      if !shell.env.is_empty() {
        let entries: Vec<String> = shell
          .env
          .iter()
          .map(|(k, v)| format!("{} = {}", key(k), quote(v)))
          .collect();
        out.push_str(&format!("env = {{ {} }}\n", entries.join(", ")));
      }
      out.push('\n');
    }
    out
  }
}

fn array(items: impl Iterator<Item = String>) -> String {
  format!("[{}]", items.collect::<Vec<_>>().join(", "))
}

fn quote(s: &str) -> String {
  toml::Value::String(s.to_string()).to_string()
}

fn key(name: &str) -> String {
  let bare = !name.is_empty()
    && name
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
  if bare { name.to_string() } else { quote(name) }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDescriptor {
  #[serde(default)]
  description: Option<String>,
  #[serde(default)]
  inputs: BTreeMap<String, Spanned<RawInput>>,
  #[serde(default)]
  shells: Vec<RawShell>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawInput {
  Url(String),
  Table(RawInputTable),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInputTable {
  url: String,
  #[serde(default)]
  rev: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawShell {
  #[serde(default = "default_shell_name")]
  name: String,
  #[serde(default)]
  platforms: Option<RawPlatforms>,
  #[serde(default)]
  packages: Vec<RawPackage>,
  #[serde(default)]
  env: BTreeMap<String, String>,
  #[serde(default)]
  hook: Vec<RawHook>,
}

fn default_shell_name() -> String {
  "default".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPlatforms {
  One(String),
  List(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPackage {
  Name(String),
  Table(RawPackageTable),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPackageTable {
  name: String,
  #[serde(default)]
  input: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawHook {
  Run(String),
  Table(RawHookTable),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHookTable {
  #[serde(default)]
  run: Option<String>,
  #[serde(default)]
  components: Option<Vec<String>>,
}

impl RawDescriptor {
  fn into_descriptor(self, text: &str) -> Result<Descriptor, DescriptorError> {
    let mut raw_inputs: Vec<(String, Spanned<RawInput>)> = self.inputs.into_iter().collect();
    raw_inputs.sort_by_key(|(_, value)| value.span().start);

    let mut inputs = Vec::with_capacity(raw_inputs.len());
    for (name, value) in raw_inputs {
      let span = value.span();
      let input = convert_input(&name, value.into_inner()).map_err(|e| e.located(text, span))?;
      inputs.push(input);
    }

    let mut shells = Vec::with_capacity(self.shells.len());
    for (i, raw) in self.shells.into_iter().enumerate() {
      shells.push(convert_shell(i, raw, &inputs)?);
    }

    Ok(Descriptor {
      description: self.description,
      inputs,
      shells,
    })
  }
}

fn convert_input(name: &str, raw: RawInput) -> Result<InputRef, DescriptorError> {
  let path = format!("inputs.{}", name);
  let (url, explicit) = match raw {
    RawInput::Url(url) => (url, None),
    RawInput::Table(table) => (table.url, table.rev),
  };

  let (locator, inline) = source::parse(&url).map_err(|e| DescriptorError::validation(&path, e.to_string()))?;
  let explicit = match explicit {
    Some(rev) if rev.is_empty() => {
      return Err(DescriptorError::validation(format!("{}.rev", path), "revision is empty"));
    }
    other => other.map(Revision::new),
  };

  let revision = match (inline, explicit) {
    (Some(inline), Some(explicit)) if inline != explicit => {
      return Err(DescriptorError::validation(
        &path,
        format!(
          "inline revision '{}' conflicts with rev = '{}'",
          inline, explicit
        ),
      ));
    }
    (inline, explicit) => inline.or(explicit),
  };

  let input = InputRef::new(name, locator);
  Ok(match revision {
    Some(rev) => input.with_revision(rev),
    None => input,
  })
}

fn convert_shell(index: usize, raw: RawShell, inputs: &[InputRef]) -> Result<ShellDecl, DescriptorError> {
  let path = format!("shells[{}]", index);

  let platforms = match raw.platforms {
    None => return Err(DescriptorError::validation(format!("{}.platforms", path), "platform set is empty")),
    Some(RawPlatforms::One(s)) if s == "all" => PlatformSet::All,
    Some(RawPlatforms::One(s)) => PlatformSet::Only(vec![parse_pattern(&format!("{}.platforms", path), &s)?]),
    Some(RawPlatforms::List(list)) => {
      let mut patterns = Vec::with_capacity(list.len());
      for (j, s) in list.iter().enumerate() {
        if s == "all" {
          return Err(DescriptorError::validation(
            format!("{}.platforms[{}]", path, j),
            "use platforms = \"all\" instead of listing it",
          ));
        }
        patterns.push(parse_pattern(&format!("{}.platforms[{}]", path, j), s)?);
      }
      PlatformSet::Only(patterns)
    }
  };

  let mut packages = Vec::with_capacity(raw.packages.len());
  for (j, package) in raw.packages.into_iter().enumerate() {
    let field = format!("{}.packages[{}]", path, j);
    let (name, input) = match package {
      RawPackage::Name(name) => (name, None),
      RawPackage::Table(table) => (table.name, table.input),
    };
    if name.is_empty() {
      return Err(DescriptorError::validation(field, "package name is empty"));
    }
    let input = match input {
      Some(input) => input,
      None => default_input(&field, &name, inputs)?,
    };
    packages.push(PackageRef::new(name, input));
  }

  let mut hook = Vec::with_capacity(raw.hook.len());
  for (j, command) in raw.hook.into_iter().enumerate() {
    let field = format!("{}.hook[{}]", path, j);
    let command = match command {
      RawHook::Run(cmd) => HookCommand::Run { cmd },
      RawHook::Table(RawHookTable {
        run: Some(cmd),
        components: None,
      }) => HookCommand::Run { cmd },
      RawHook::Table(RawHookTable {
        run: None,
        components: Some(add),
      }) => HookCommand::Components { add },
      RawHook::Table(_) => {
        return Err(DescriptorError::validation(
          field,
          "hook entry must set exactly one of 'run' or 'components'",
        ));
      }
    };
    hook.push(command);
  }

  Ok(ShellDecl {
    name: raw.name,
    platforms,
    packages,
    hook,
    env: raw.env,
  })
}

fn parse_pattern(field: &str, s: &str) -> Result<PlatformPattern, DescriptorError> {
  s.parse()
    .map_err(|e: crate::platform::PlatformParseError| DescriptorError::validation(field, e.to_string()))
}

fn default_input(field: &str, package: &str, inputs: &[InputRef]) -> Result<String, DescriptorError> {
  match inputs {
    [only] => Ok(only.name.clone()),
    [] => Err(DescriptorError::validation(
      field,
      format!("package '{}' needs an input but none are declared", package),
    )),
    _ => Err(DescriptorError::validation(
      field,
      format!(
        "package '{}' must name its input when several are declared",
        package
      ),
    )),
  }
}
