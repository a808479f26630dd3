mod commands;
mod core;
mod graph;
mod policy;
mod release;
mod ui;

use clap::{Parser, Subcommand};
use crate::core::context::ReplayContext;
use crate::core::error::{ReplayError, ReplayResult, print_error};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Rebuild a branch-accurate git history from a pile of historical releases
#[derive(Parser)]
#[command(name = "release-replay")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct Cli {
  /// Directory containing replay.toml (default: current directory)
  #[arg(short = 'C', long, global = true, value_name = "DIR")]
  config_dir: Option<PathBuf>,

  /// Log debug output to stderr (RUST_LOG takes precedence)
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Write a starter replay.toml and release manifest
  Init {
    /// Overwrite an existing replay.toml
    #[arg(long)]
    force: bool,
  },

  /// Show release branches, parents and the replay order
  Tree {
    /// Output the tree in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Show which releases are already in the repository
  Status {
    /// Output status in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Replay pending releases onto the repository
  Run {
    /// Actually perform the replay (default: dry-run mode showing plan)
    #[arg(long)]
    apply: bool,
    /// Output plan or summary in JSON format (useful for CI/automation)
    #[arg(long)]
    json: bool,
    /// Continue with unrelated releases when an artifact fails to extract
    #[arg(long)]
    keep_going: bool,
  },
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

/// Log to stderr so stdout stays clean for --json
fn init_tracing(verbose: bool) {
  let default = if verbose {
    "release_replay=debug"
  } else {
    "release_replay=info"
  };
  let filter = tracing_subscriber::EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| default.into()));

  tracing_subscriber::registry()
    .with(filter)
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();
}

fn main() {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let config_dir = match cli.config_dir {
    Some(dir) => dir,
    None => match std::env::current_dir() {
      Ok(dir) => dir,
      Err(e) => handle_error(ReplayError::message(format!("Failed to get current directory: {}", e))),
    },
  };

  if let Err(err) = dispatch(cli.command, config_dir) {
    handle_error(err);
  }
}

fn dispatch(command: Commands, config_dir: PathBuf) -> ReplayResult<()> {
  match command {
    Commands::Init { force } => commands::run_init(&config_dir, force),
    Commands::Tree { json } => commands::run_tree(&ReplayContext::build(&config_dir)?, json),
    Commands::Status { json } => commands::run_status(&ReplayContext::build(&config_dir)?, json),
    Commands::Run {
      apply,
      json,
      keep_going,
    } => commands::run_replay(&ReplayContext::build(&config_dir)?, apply, json, keep_going),
  }
}

fn handle_error(err: ReplayError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
