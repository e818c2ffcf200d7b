mod cmd;
mod output;

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shelldeck_lib::consts::ENV_LOG;

use crate::cmd::GlobalArgs;
use crate::output::{ColorChoice, LogLevel, OutputFormat, print_error};

/// shelldeck - declarative multi-platform development shells
#[derive(Parser)]
#[command(name = "shelldeck")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Resolve only from the lock file and inline pins
  #[arg(long, global = true)]
  offline: bool,

  /// Upper bound on each registry lookup and hook command (e.g. "30s", "2m")
  #[arg(long, global = true, value_parser = humantime::parse_duration)]
  timeout: Option<Duration>,

  /// Log level used when SHELLDECK_LOG is not set
  #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn)]
  log_level: LogLevel,

  /// When to color output
  #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
  color: ColorChoice,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Enter a shell in the activated environment
  Shell {
    /// Path to the descriptor (default: nearest shelldeck.toml)
    #[arg(short, long)]
    file: Option<String>,

    /// Platform to provision (default: host)
    #[arg(short, long)]
    platform: Option<String>,

    /// Run the hook and exit with its code instead of starting a shell
    #[arg(long)]
    run: bool,

    /// Clear the inherited environment apart from a few essentials
    #[arg(long)]
    pure: bool,
  },

  /// Print the resolved environment for one or more platforms
  Resolve {
    #[arg(short, long)]
    file: Option<String>,

    /// Platforms to resolve (repeatable, default: host)
    #[arg(short, long)]
    platform: Vec<String>,

    /// Resolve every declared platform
    #[arg(long, conflicts_with = "platform")]
    all: bool,

    /// Shorthand for --output json
    #[arg(long)]
    json: bool,
  },

  /// Print a script that activates the environment in the current shell
  Env {
    #[arg(short, long)]
    file: Option<String>,

    /// Shell to generate the script for (auto-detected if not specified)
    #[arg(short, long)]
    shell: Option<String>,

    #[arg(short, long)]
    platform: Option<String>,
  },

  /// Load and validate the descriptor
  Check {
    #[arg(short, long)]
    file: Option<String>,
  },

  /// Re-resolve inputs to their latest revisions and update the lock file
  Update {
    /// Inputs to update (default: all)
    inputs: Vec<String>,

    #[arg(short, long)]
    file: Option<String>,

    /// Show what would change without writing the lock file
    #[arg(long)]
    dry_run: bool,
  },

  /// Show host platform and paths
  Info,
}

fn init_logging(level: LogLevel) {
  let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new(level.as_str()));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .without_time()
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_logging(cli.log_level);
  cli.color.apply();

  let global = GlobalArgs {
    offline: cli.offline,
    timeout: cli.timeout,
    output: cli.output,
  };

  let result = match cli.command {
    Commands::Shell {
      file,
      platform,
      run,
      pure,
    } => cmd::cmd_shell(&global, file.as_deref(), platform.as_deref(), run, pure),
    Commands::Resolve {
      file,
      platform,
      all,
      json,
    } => cmd::cmd_resolve(&global, file.as_deref(), &platform, all, json).map(|()| 0),
    Commands::Env { file, shell, platform } => {
      cmd::cmd_env(&global, file.as_deref(), shell.as_deref(), platform.as_deref()).map(|()| 0)
    }
    Commands::Check { file } => cmd::cmd_check(&global, file.as_deref()).map(|()| 0),
    Commands::Update { inputs, file, dry_run } => {
      cmd::cmd_update(&global, file.as_deref(), inputs, dry_run).map(|()| 0)
    }
    Commands::Info => cmd::cmd_info(&global).map(|()| 0),
  };

  match result {
    Ok(code) => exit_code(code),
    Err(err) => {
      print_error(&format!("{:#}", err));
      ExitCode::FAILURE
    }
  }
}

/// Map a child exit code onto a process exit code.
fn exit_code(code: i32) -> ExitCode {
  match u8::try_from(code) {
    Ok(code) => ExitCode::from(code),
    Err(_) => ExitCode::FAILURE,
  }
}
