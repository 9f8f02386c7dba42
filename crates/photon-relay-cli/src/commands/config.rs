//! Configuration commands implementation.

use std::path::{Path, PathBuf};

use photon_relay_core::config::{self, ConfigSource, RelayConfig};
use serde_json::json;

use crate::cli::{ConfigArgs, ConfigCommands, ConfigInitArgs};
use crate::error::{CliError, Result};
use crate::output::get_formatter;

/// Run the config command
pub async fn run_config(
    args: ConfigArgs,
    config_path: Option<&Path>,
    json: bool,
) -> Result<()> {
    match args.command {
        ConfigCommands::Show => run_show(config_path, json).await,
        ConfigCommands::Init(args) => run_init(args, json).await,
        ConfigCommands::Path => run_path(config_path, json),
    }
}

async fn run_show(config_path: Option<&Path>, json: bool) -> Result<()> {
    let formatter = get_formatter(json);
    let (config, source) = config::load_or_default(config_path).await?;
    println!("{}", formatter.format_config(&config, &source));
    Ok(())
}

async fn run_init(args: ConfigInitArgs, json: bool) -> Result<()> {
    let formatter = get_formatter(json);

    let path = match args.path {
        Some(path) => path,
        None => config::default_config_path().ok_or_else(|| {
            CliError::Other("Could not determine the user config directory".to_string())
        })?,
    };

    config::save(&path, &RelayConfig::default(), args.force).await?;

    println!(
        "{}",
        formatter.format_message(&format!("Wrote default configuration to {}", path.display()))
    );
    Ok(())
}

fn run_path(config_path: Option<&Path>, json: bool) -> Result<()> {
    let candidates: Vec<PathBuf> = match config_path {
        Some(path) => vec![path.to_path_buf()],
        None => config::config_candidates(),
    };

    if json {
        let entries: Vec<_> = candidates
            .iter()
            .map(|p| json!({ "path": p.display().to_string(), "exists": p.exists() }))
            .collect();
        let value = json!({ "candidates": entries });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        for (i, path) in candidates.iter().enumerate() {
            let marker = if path.exists() { " (found)" } else { "" };
            println!("{}. {}{}", i + 1, path.display(), marker);
        }
        println!("{}. {}", candidates.len() + 1, ConfigSource::Builtin);
    }
    Ok(())
}
