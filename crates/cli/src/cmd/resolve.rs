//! Implementation of the `shelldeck resolve` command.

use anyhow::{Result, bail};
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use shelldeck_lib::platform::Platform;
use shelldeck_lib::resolve::ResolvedEnvironment;
use shelldeck_lib::session::SessionOptions;

use super::{GlobalArgs, cancel_on_ctrl_c, open_session, requested_platform, runtime};
use crate::output::{print_json, print_stat, print_warning, symbols};

#[derive(Serialize)]
struct PlatformReport {
  platform: Platform,
  #[serde(skip_serializing_if = "Option::is_none")]
  environment: Option<ResolvedEnvironment>,
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<String>,
}

/// Resolve the requested platforms concurrently and print each environment.
///
/// The lock file is written when at least one platform resolved.
pub fn cmd_resolve(global: &GlobalArgs, file: Option<&str>, platforms: &[String], all: bool, json: bool) -> Result<()> {
  let session = open_session(global, file, SessionOptions::default())?;

  let targets: Vec<Platform> = if all {
    session.declared_platforms()
  } else if platforms.is_empty() {
    vec![requested_platform(None)?]
  } else {
    platforms
      .iter()
      .map(|p| requested_platform(Some(p)))
      .collect::<Result<_>>()?
  };

  let rt = runtime()?;
  let results = rt.block_on(async {
    cancel_on_ctrl_c(session.cancel_token());
    session.resolve_many(&targets).await
  });

  let reports: Vec<PlatformReport> = results
    .into_iter()
    .map(|(platform, result)| match result {
      Ok(environment) => PlatformReport {
        platform,
        environment: Some(environment),
        error: None,
      },
      Err(e) => PlatformReport {
        platform,
        environment: None,
        error: Some(e.to_string()),
      },
    })
    .collect();

  let failed = reports.iter().filter(|r| r.error.is_some()).count();
  if failed < reports.len() {
    session.save_lock()?;
  }

  if json || global.output.is_json() {
    print_json(&reports)?;
  } else {
    for report in &reports {
      print_report(report);
    }
  }

  if failed > 0 {
    bail!("{} of {} platform(s) failed to resolve", failed, reports.len());
  }
  Ok(())
}

fn print_report(report: &PlatformReport) {
  println!("{}", report.platform.if_supports_color(Stream::Stdout, |s| s.bold()));
  let Some(env) = &report.environment else {
    if let Some(error) = &report.error {
      print_warning(error);
    }
    return;
  };

  print_stat("Shells", &env.shells.join(", "));
  for package in &env.packages {
    println!(
      "  {} {} {} {}@{} {}",
      symbols::ADD.if_supports_color(Stream::Stdout, |s| s.green()),
      package.name.if_supports_color(Stream::Stdout, |s| s.cyan()),
      symbols::ARROW,
      package.input,
      package.revision.short(),
      package.artifact.display().if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  }
  for (name, value) in &env.variables {
    println!("  {}={}", name, value);
  }
  if !env.hook.is_empty() {
    print_stat("Hook", &format!("{} command(s)", env.hook.len()));
  }
}
