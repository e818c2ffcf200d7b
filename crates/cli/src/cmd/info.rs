use anyhow::Result;
use serde::Serialize;

use shelldeck_lib::config::Settings;
use shelldeck_lib::platform::paths::config_dir;
use shelldeck_lib::platform::platform_triple;

use super::{GlobalArgs, load_settings};
use crate::output::{print_json, print_stat};

#[derive(Serialize)]
struct Info {
  version: &'static str,
  platform: Option<String>,
  config_dir: String,
  settings_file: String,
  settings: Settings,
}

pub fn cmd_info(global: &GlobalArgs) -> Result<()> {
  let info = Info {
    version: env!("CARGO_PKG_VERSION"),
    platform: platform_triple(),
    config_dir: config_dir().display().to_string(),
    settings_file: Settings::default_path().display().to_string(),
    settings: load_settings(global)?,
  };

  if global.output.is_json() {
    return print_json(&info);
  }

  println!("shelldeck v{}", info.version);
  println!("System:");
  match &info.platform {
    Some(triple) => print_stat("Platform", triple),
    None => print_stat("Platform", "could not detect platform"),
  }
  print_stat("Config dir", &info.config_dir);
  print_stat("Settings", &info.settings_file);
  print_stat("Offline", &info.settings.offline.to_string());
  let defaults: Vec<String> = info.settings.default_platforms.iter().map(ToString::to_string).collect();
  print_stat("Default platforms", &defaults.join(", "));
  Ok(())
}
