//! Interpreter selection for hook commands.

/// Get the shell command and argument for the current platform.
///
/// # Arguments
///
/// * `override_shell` - Optional shell override from settings
///
/// # Returns
///
/// A tuple of (shell_command, shell_arguments) where the command line is
/// passed as the final argument.
///
/// # Note
///
/// By default we always use `/bin/sh` (Unix) or PowerShell (Windows) rather
/// than the user's `$SHELL`: interactive shells may source profile files
/// that rewrite `PATH` and undo the activated environment.
pub fn get_shell(override_shell: Option<&str>) -> (String, Vec<String>) {
  if let Some(shell) = override_shell {
    let args = if shell.contains("powershell") || shell.contains("pwsh") {
      vec!["-NoProfile".to_string(), "-Command".to_string()]
    } else if shell.contains("cmd") {
      vec!["/C".to_string()]
    } else {
      // Assume Unix-style shell (bash, sh, zsh, etc.)
      vec!["-c".to_string()]
    };
    return (shell.to_string(), args);
  }

  #[cfg(unix)]
  {
    ("/bin/sh".to_string(), vec!["-c".to_string()])
  }

  #[cfg(windows)]
  {
    (
      "powershell.exe".to_string(),
      vec![
        "-NoProfile".to_string(),
        "-ExecutionPolicy".to_string(),
        "Bypass".to_string(),
        "-Command".to_string(),
      ],
    )
  }
}

/// The command line adding `components` through a toolchain manager `program`.
///
/// The program and every component name are quoted as single words.
pub fn components_command(program: &str, components: &[String]) -> String {
  let names: Vec<String> = components.iter().map(|c| quote(c)).collect();
  #[cfg(windows)]
  {
    format!("& {} component add {}", quote(program), names.join(" "))
  }
  #[cfg(not(windows))]
  {
    format!("{} component add {}", quote(program), names.join(" "))
  }
}

#[cfg(windows)]
fn quote(word: &str) -> String {
  format!("'{}'", word.replace('\'', "''"))
}

#[cfg(not(windows))]
fn quote(word: &str) -> String {
  format!("'{}'", word.replace('\'', r"'\''"))
}
