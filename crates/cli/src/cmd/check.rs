//! Implementation of the `shelldeck check` command.

use anyhow::Result;
use serde::Serialize;

use shelldeck_lib::session::SessionOptions;

use super::{GlobalArgs, open_session};
use crate::output::{print_json, print_stat, print_success};

#[derive(Serialize)]
struct CheckSummary {
  path: String,
  description: Option<String>,
  inputs: Vec<String>,
  shells: Vec<String>,
  platforms: String,
}

/// Load and validate the descriptor (and its lock file) without resolving anything.
pub fn cmd_check(global: &GlobalArgs, file: Option<&str>) -> Result<()> {
  let session = open_session(global, file, SessionOptions::default())?;
  let descriptor = session.descriptor();

  let summary = CheckSummary {
    path: session.path().display().to_string(),
    description: descriptor.description.clone(),
    inputs: descriptor.inputs.iter().map(|i| i.name.clone()).collect(),
    shells: descriptor.shells.iter().map(|s| s.name.clone()).collect(),
    platforms: descriptor.platforms().to_string(),
  };

  if global.output.is_json() {
    return print_json(&summary);
  }

  print_success(&format!("{} is valid", summary.path));
  if let Some(description) = &summary.description {
    print_stat("Description", description);
  }
  print_stat("Inputs", &summary.inputs.join(", "));
  print_stat("Shells", &summary.shells.join(", "));
  print_stat("Platforms", &summary.platforms);
  Ok(())
}
