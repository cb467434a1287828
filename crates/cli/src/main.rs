mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{ProjectArgs, cmd_binaries, cmd_images};
use output::print_error;

/// buildchain - vendor, generate, compile and package operator projects
#[derive(Parser)]
#[command(name = "buildchain")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose (debug) logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Raise the verbosity of the code generators
  #[arg(long, global = true)]
  debug: bool,

  /// Project root (default: $BUILDCHAIN_ROOT, then the current directory)
  #[arg(long, global = true, value_name = "DIR")]
  root: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Vendor dependencies, regenerate code if its inputs changed, and compile
  /// every unit under cmd/
  Binaries,

  /// Build the binaries, then one container image per directory under images/
  Images {
    /// Save each image to a tar archive in the project root
    #[arg(long)]
    save: bool,

    /// Gzip the saved archives (implies --save)
    #[arg(long)]
    compress: bool,
  },
}

fn init_logging(verbose: bool) {
  let default_level = if verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let Some(command) = cli.command else {
    eprintln!("{}", Cli::command().render_help());
    return ExitCode::FAILURE;
  };

  let project = ProjectArgs {
    root: cli.root,
    debug: cli.debug,
  };

  let result = match command {
    Commands::Binaries => cmd_binaries(&project),
    Commands::Images { save, compress } => cmd_images(&project, save, compress),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{err:#}"));
      ExitCode::FAILURE
    }
  }
}
