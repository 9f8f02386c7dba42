//! Photon relay CLI.
//!
//! Captures UDP traffic on every usable interface, locks onto the interface
//! carrying the game session and forwards its Photon payloads to local
//! consumers.

mod cli;
mod commands;
mod error;
mod logging;
mod output;
mod status;

use clap::Parser;

use cli::{Cli, Commands};
use error::{exit_codes, CliError};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init(cli.verbose, cli.quiet);

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(exit_codes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Run(args) => commands::run_relay(args, config, cli.json).await,
        Commands::Interfaces(args) => commands::run_interfaces(args, config, cli.json).await,
        Commands::Config(args) => commands::run_config(args, config, cli.json).await,
    }
}
