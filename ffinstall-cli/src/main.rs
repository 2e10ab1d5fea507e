//! ffinstall CLI - Command-line interface
//!
//! Downloads a prebuilt FFmpeg, verifies it, installs it and puts it on the
//! search path.

mod commands;
mod error;
mod ui;

use clap::{Parser, Subcommand};
use ffinstall::config::ConfigFile;
use ffinstall::logging::{self, LoggingOptions};

use commands::config::ConfigCommands;
use commands::install::InstallArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "ffinstall", version, about = "Install FFmpeg builds onto the search path")]
struct Cli {
    /// Mirror log output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download, verify and install an FFmpeg build
    Install(InstallArgs),

    /// List the available builds
    Builds,

    /// Show the latest released FFmpeg version
    Version,

    /// Remove extraction leftovers and tool files from the scratch area
    Clean,

    /// Check whether a newer ffinstall release exists
    CheckUpdate,

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match ConfigFile::load() {
        Ok(config) => config,
        Err(e) => {
            ui::warning(&format!("{}; using defaults", e));
            ConfigFile::default()
        }
    };

    // Held until exit so buffered log lines are flushed
    let _log_guard = match logging::init(&LoggingOptions {
        level: config.logging.level.clone(),
        file: config.logging.file.clone(),
        verbose: cli.verbose,
    }) {
        Ok(guard) => Some(guard),
        Err(e) => {
            ui::warning(&format!("File logging disabled: {}", e));
            None
        }
    };

    if let Err(e) = run(cli.command, &config) {
        tracing::error!(error = %e, "Command failed");
        ui::error(&e.to_string());
        std::process::exit(1);
    }
}

fn run(command: Commands, config: &ConfigFile) -> Result<(), CliError> {
    match command {
        Commands::Install(args) => commands::install::run(args, config),
        Commands::Builds => commands::builds::run(config),
        Commands::Version => commands::version::run(config),
        Commands::Clean => commands::clean::run(config),
        Commands::CheckUpdate => commands::update::run(config),
        Commands::Config { command } => commands::config::run(command),
    }
}
