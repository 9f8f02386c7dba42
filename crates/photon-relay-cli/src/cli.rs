//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Photon relay - capture game traffic on every interface and forward it
#[derive(Parser, Debug)]
#[command(name = "photon-relay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (default: ./photon-relay.json, then the user config dir)
    #[arg(short, long, global = true, env = "PHOTON_RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture, arbitrate and forward Photon traffic
    Run(RunArgs),

    /// List capture interfaces
    Interfaces(InterfacesArgs),

    /// Configuration management
    Config(ConfigArgs),
}

// ==================== Run ====================

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Only monitor these interfaces (repeatable, exact name)
    #[arg(short, long = "interface")]
    pub interfaces: Vec<String>,

    /// Override forward targets (repeatable, host:port)
    #[arg(short, long = "target")]
    pub targets: Vec<String>,

    /// Release a stale lock even when no traffic arrives
    #[arg(long)]
    pub idle_release: bool,

    /// Status refresh interval in milliseconds
    #[arg(long, default_value = "1000")]
    pub status_interval: u64,
}

// ==================== Interfaces ====================

#[derive(Args, Debug)]
pub struct InterfacesArgs {
    /// Include interfaces that would not be monitored
    #[arg(short, long)]
    pub all: bool,
}

// ==================== Config ====================

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write the default configuration to a file
    Init(ConfigInitArgs),

    /// Print the config file lookup order
    Path,
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Destination (default: the user config dir)
    pub path: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}
