//! Implementation of the `shelldeck update` command.
//!
//! This command re-resolves inputs (fetching latest revisions) and
//! updates the lock file.

use std::time::Instant;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};

use shelldeck_lib::session::SessionOptions;

use super::{GlobalArgs, cancel_on_ctrl_c, open_session, runtime};
use crate::output::{format_duration, print_info, print_json, symbols};

#[derive(serde::Serialize)]
struct UpdateSummary<'a> {
  dry_run: bool,
  updated: Vec<(&'a str, &'a str, &'a str)>,
  added: &'a [String],
  removed: &'a [String],
  unchanged: &'a [String],
}

/// Execute the update command.
///
/// `inputs` names the inputs to update; empty means all of them.
pub fn cmd_update(global: &GlobalArgs, file: Option<&str>, inputs: Vec<String>, dry_run: bool) -> Result<()> {
  let start = Instant::now();
  let session = open_session(global, file, SessionOptions::default())?;

  let rt = runtime()?;
  let report = rt
    .block_on(async {
      cancel_on_ctrl_c(session.cancel_token());
      session.update(&inputs, dry_run).await
    })
    .context("Failed to update inputs")?;

  if global.output.is_json() {
    return print_json(&UpdateSummary {
      dry_run,
      updated: report
        .updated
        .iter()
        .map(|(name, (old, new))| (name.as_str(), old.as_str(), new.as_str()))
        .collect(),
      added: &report.added,
      removed: &report.removed,
      unchanged: &report.unchanged,
    });
  }

  if dry_run {
    print_info("Dry run - no changes written");
    println!();
  }

  for (name, (old_rev, new_rev)) in &report.updated {
    let prefix = if dry_run { "Would update" } else { "Updated" };
    println!(
      "  {} {}: {} {} {}",
      symbols::MODIFY.if_supports_color(Stream::Stdout, |s| s.yellow()),
      prefix,
      name.if_supports_color(Stream::Stdout, |s| s.cyan()),
      format!("{} ->", old_rev.short()).if_supports_color(Stream::Stdout, |s| s.dimmed()),
      new_rev.short().if_supports_color(Stream::Stdout, |s| s.green())
    );
  }

  for name in &report.added {
    let prefix = if dry_run { "Would add" } else { "Added" };
    println!(
      "  {} {}: {}",
      symbols::ADD.if_supports_color(Stream::Stdout, |s| s.green()),
      prefix,
      name.if_supports_color(Stream::Stdout, |s| s.cyan())
    );
  }

  for name in &report.removed {
    let prefix = if dry_run { "Would remove" } else { "Removed" };
    println!(
      "  {} {}: {}",
      symbols::REMOVE.if_supports_color(Stream::Stdout, |s| s.red()),
      prefix,
      name.if_supports_color(Stream::Stdout, |s| s.cyan())
    );
  }

  if !report.unchanged.is_empty() {
    let names = report.unchanged.join(", ");
    println!(
      "  {} Unchanged: {}",
      symbols::INFO.if_supports_color(Stream::Stdout, |s| s.dimmed()),
      names.if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  }

  if !report.has_changes() {
    println!(
      "{} All inputs are up to date.",
      symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green())
    );
  } else if !dry_run {
    println!();
    println!(
      "{} Lock file updated: {}",
      symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
      session.lock_path().display()
    );
    println!(
      "  {} Duration: {}",
      symbols::INFO.if_supports_color(Stream::Stdout, |s| s.dimmed()),
      format_duration(start.elapsed()).if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  }

  Ok(())
}
