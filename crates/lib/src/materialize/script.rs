//! Shell detection and activation script generation

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::ActivatedShell;

/// Supported shell types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
  Bash,
  Zsh,
  Fish,
  PowerShell,
  Sh,
}

impl Shell {
  /// Detect the current shell from environment
  ///
  /// Checks `$SHELL` on Unix, falls back to reasonable defaults.
  pub fn detect() -> Self {
    if let Ok(shell) = env::var("SHELL") {
      let shell_name = PathBuf::from(&shell)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();

      return match shell_name.as_str() {
        "zsh" => Shell::Zsh,
        "bash" => Shell::Bash,
        "fish" => Shell::Fish,
        "sh" => Shell::Sh,
        "pwsh" | "powershell" => Shell::PowerShell,
        _ => {
          if shell_name.contains("zsh") {
            Shell::Zsh
          } else if shell_name.contains("bash") {
            Shell::Bash
          } else if shell_name.contains("fish") {
            Shell::Fish
          } else {
            Shell::Sh // Safe fallback for POSIX
          }
        }
      };
    }

    #[cfg(target_os = "windows")]
    return Shell::PowerShell;

    #[cfg(not(target_os = "windows"))]
    Shell::Sh
  }

  /// Get the shell name as a string
  pub fn as_str(&self) -> &'static str {
    match self {
      Shell::Bash => "bash",
      Shell::Zsh => "zsh",
      Shell::Fish => "fish",
      Shell::PowerShell => "powershell",
      Shell::Sh => "sh",
    }
  }

  /// Quote a value so the shell reads it literally
  pub fn quote(&self, value: &str) -> String {
    match self {
      Shell::Fish => format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'")),
      Shell::PowerShell => format!("'{}'", value.replace('\'', "''")),
      Shell::Bash | Shell::Zsh | Shell::Sh => format!("'{}'", value.replace('\'', r"'\''")),
    }
  }

  /// Generate an export statement for setting an environment variable
  pub fn export_var(&self, name: &str, value: &str) -> String {
    match self {
      Shell::Fish => format!("set -gx {} {}", name, self.quote(value)),
      Shell::PowerShell => format!("$env:{} = {}", name, self.quote(value)),
      Shell::Bash | Shell::Zsh | Shell::Sh => format!("export {}={}", name, self.quote(value)),
    }
  }

  /// Generate a statement prepending `entries` (first has priority) to a PATH-like variable
  pub fn prepend_path(&self, name: &str, entries: &[String]) -> String {
    match self {
      Shell::Fish => {
        let quoted: Vec<String> = entries.iter().map(|e| self.quote(e)).collect();
        format!("set -gx {} {} ${}", name, quoted.join(" "), name)
      }
      Shell::PowerShell => format!(
        "$env:{} = {} + [IO.Path]::PathSeparator + $env:{}",
        name,
        self.quote(&entries.join(";")),
        name
      ),
      Shell::Bash | Shell::Zsh | Shell::Sh => {
        format!("export {}={}:\"${}\"", name, self.quote(&entries.join(":")), name)
      }
    }
  }

  /// Generate a comment for this shell
  pub fn comment(&self, text: &str) -> String {
    format!("# {}", text)
  }

  /// Generate the script header/shebang
  pub fn header(&self) -> &'static str {
    match self {
      Shell::Bash => "#!/usr/bin/env bash",
      Shell::Zsh => "#!/usr/bin/env zsh",
      Shell::Fish => "# Fish shell environment",
      Shell::PowerShell => "# PowerShell environment",
      Shell::Sh => "#!/bin/sh",
    }
  }
}

impl fmt::Display for Shell {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Shell {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "bash" => Ok(Shell::Bash),
      "zsh" => Ok(Shell::Zsh),
      "fish" => Ok(Shell::Fish),
      "sh" => Ok(Shell::Sh),
      "powershell" | "pwsh" => Ok(Shell::PowerShell),
      other => Err(format!("unsupported shell '{}'", other)),
    }
  }
}

/// Render the statements that reproduce `activated` in an existing `shell` session.
///
/// Variables come out in name order, followed by the search path prefix.
pub fn render_script(activated: &ActivatedShell, shell: Shell) -> String {
  let mut lines = vec![
    shell.header().to_string(),
    shell.comment(&format!("shelldeck environment for {}", activated.platform)),
  ];

  for (name, value) in &activated.variables {
    lines.push(shell.export_var(name, value));
  }

  if !activated.search_paths.is_empty() {
    let entries: Vec<String> = activated
      .search_paths
      .iter()
      .map(|p| p.to_string_lossy().into_owned())
      .collect();
    lines.push(shell.prepend_path("PATH", &entries));
  }

  let mut script = lines.join("\n");
  script.push('\n');
  script
}
