//! Serve a POSIX-like namespace out of a pool of pre-allocated backing files.
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{debug, error};

mod app_config;
mod daemon;
mod trc;

use crate::app_config::Config;
use crate::trc::Trc;

#[derive(Parser)]
#[command(
    version,
    about = "A user-space filesystem over a pool of pre-opened backing files."
)]
struct Args {
    #[arg(
        short,
        long,
        value_parser,
        help = "Optional path to a slotfs config TOML."
    )]
    config_path: Option<PathBuf>,

    #[arg(short, long, help = "Mount point, overriding the configuration.")]
    mount_point: Option<PathBuf>,

    #[arg(short, long, help = "Backing storage root, overriding the configuration.")]
    backing_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Mount the filesystem and serve it until interrupted.
    Run,

    /// Print the effective configuration and exit.
    ShowConfig,
}

/// Main entry point for the application.
fn main() {
    let args = Args::parse();

    // Errors use eprintln since tracing isn't initialized yet.
    let mut config = Config::load_or_default(args.config_path.as_deref()).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        std::process::exit(1);
    });
    if let Some(mount_point) = args.mount_point {
        config.mount_point = mount_point;
    }
    if let Some(backing_root) = args.backing_root {
        config.storage.backing_root = backing_root;
    }
    if let Err(error_messages) = config.validate() {
        eprintln!("Configuration is invalid.");
        for msg in &error_messages {
            eprintln!(" - {msg}");
        }
        std::process::exit(1);
    }

    if let Err(e) = Trc::default().init() {
        eprintln!(
            "Failed to initialize logging. Without logging, we can't provide any useful error \
             messages, so we have to exit: {e}"
        );
        std::process::exit(1);
    }

    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            debug!(config = ?config, "Starting daemon with configuration...");
            if let Err(e) = daemon::spawn(config) {
                error!("Daemon failed: {e}");
                std::process::exit(1);
            }
        }
        Command::ShowConfig => match config.to_toml() {
            Ok(rendered) => print!("{rendered}"),
            Err(e) => {
                error!("Failed to render configuration: {e}");
                std::process::exit(1);
            }
        },
    }
}
