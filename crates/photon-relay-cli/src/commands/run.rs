//! The relay itself: capture, arbitrate, forward.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use photon_relay_core::capture::{list_interfaces, open_sessions, InterfaceFilter, InterfaceInfo};
use photon_relay_core::config::{self, RelayConfig};
use photon_relay_core::{Arbitrator, Forwarder, Router, RouterOptions};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::output::get_formatter;
use crate::status::{stats_record, StatusReporter};

const MIN_STATUS_INTERVAL_MS: u64 = 100;

/// Run the relay until interrupted or until every capture source ends.
pub async fn run_relay(
    args: RunArgs,
    config_path: Option<&Path>,
    json: bool,
) -> Result<()> {
    let formatter = get_formatter(json);

    let (mut config, source) = config::load_or_default(config_path).await?;
    apply_overrides(&mut config, &args);
    config.validate()?;
    info!(source = %source, "Configuration loaded");

    let interfaces = select_interfaces(&config, &args.interfaces)?;
    let sessions = open_sessions(&interfaces, &config.capture_options())?;
    let forwarder = Forwarder::bind(&config.targets).await?;

    let arbitrator = Arc::new(Arbitrator::new(config.lock_policy()));
    let mut router = Router::new(
        Arc::clone(&arbitrator),
        RouterOptions {
            queue_capacity: config.queue_capacity,
            idle_release: config.idle_release,
        },
    );
    let output = router
        .output_stream()
        .ok_or_else(|| CliError::Other("Router output stream unavailable".to_string()))?;

    for (iface, source) in sessions {
        info!(device = %iface.name, label = %iface.display_name(), "Monitoring interface");
        router.attach(iface.name, source);
    }
    info!(
        interfaces = router.interface_count(),
        ports = ?config.ports,
        "Relay started"
    );

    let forward_task = tokio::spawn(async move { forwarder.run(output).await });

    let mut reporter = StatusReporter::new(json);
    let interval = Duration::from_millis(args.status_interval.max(MIN_STATUS_INTERVAL_MS));
    let mut ticker = tokio::time::interval(interval);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let interrupted = loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                break true;
            }
            _ = ticker.tick() => {
                if config.idle_release {
                    arbitrator.expire(Instant::now());
                }
                let stats = router.stats();
                reporter.update(&stats);
                if stats.interfaces.iter().all(|s| !s.running) {
                    break false;
                }
            }
        }
    };

    reporter.finish();
    if interrupted {
        router.shutdown().await;
    } else {
        warn!("All capture sources ended");
        router.wait().await;
    }

    let sent = forward_task
        .await
        .map_err(|e| CliError::Other(format!("Forwarder task failed: {}", e)))?;
    info!(sent, "Relay stopped");

    // Stdout is NDJSON in JSON mode, so the summary stays on one line.
    let stats = router.stats();
    if json {
        println!("{}", stats_record(&stats));
    } else {
        println!("{}", formatter.format_stats(&stats));
    }
    Ok(())
}

fn apply_overrides(config: &mut RelayConfig, args: &RunArgs) {
    if !args.targets.is_empty() {
        config.targets = args.targets.clone();
    }
    if args.idle_release {
        config.idle_release = true;
    }
}

/// Interfaces named on the command line bypass the exclusion rules.
fn select_interfaces(
    config: &RelayConfig,
    only: &[String],
) -> Result<Vec<InterfaceInfo>> {
    let all = list_interfaces()?;

    if only.is_empty() {
        let filter = InterfaceFilter::from_config(config)?;
        return Ok(filter.select(all)?);
    }

    pick_named(all, only)
}

fn pick_named(all: Vec<InterfaceInfo>, only: &[String]) -> Result<Vec<InterfaceInfo>> {
    if let Some(missing) = only.iter().find(|name| !all.iter().any(|i| &i.name == *name)) {
        return Err(CliError::InvalidArgument(format!(
            "Interface '{}' not found",
            missing
        )));
    }
    Ok(all.into_iter().filter(|i| only.contains(&i.name)).collect())
}
