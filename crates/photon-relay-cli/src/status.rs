//! Live status line for the relay.

use std::time::Duration;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use photon_relay_core::{LockState, RouterStats};
use serde_json::json;

/// Reports lock changes and running totals while the relay runs.
///
/// In JSON mode one line is printed to stdout per lock change; otherwise a
/// spinner on stderr shows the current lock and counters.
pub struct StatusReporter {
    spinner: Option<ProgressBar>,
    last_lock: Option<LockState>,
}

impl StatusReporter {
    pub fn new(json: bool) -> Self {
        let spinner = if json {
            None
        } else {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.enable_steady_tick(Duration::from_millis(120));
            pb.set_message("Waiting for Photon traffic...");
            Some(pb)
        };

        Self {
            spinner,
            last_lock: None,
        }
    }

    pub fn update(&mut self, stats: &RouterStats) {
        let changed = self.last_lock.as_ref() != Some(&stats.lock);

        match &self.spinner {
            Some(pb) => pb.set_message(summary(stats)),
            None if changed => println!("{}", lock_event(stats)),
            None => {}
        }

        if changed {
            self.last_lock = Some(stats.lock.clone());
        }
    }

    pub fn finish(&self) {
        if let Some(pb) = &self.spinner {
            pb.finish_and_clear();
        }
    }
}

fn summary(stats: &RouterStats) -> String {
    let admitted: u64 = stats.interfaces.iter().map(|s| s.admitted).sum();
    let dropped: u64 = stats.interfaces.iter().map(|s| s.dropped).sum();
    let running = stats.interfaces.iter().filter(|s| s.running).count();

    let lock = match &stats.lock {
        LockState::Locked(device) => format!("Device: {}", device),
        LockState::Unlocked => "Scanning...".to_string(),
    };

    format!(
        "{} | {}/{} interfaces | {} forwarded | {} dropped",
        lock,
        running,
        stats.interfaces.len(),
        admitted,
        dropped
    )
}

fn lock_event(stats: &RouterStats) -> String {
    let active_device = match &stats.lock {
        LockState::Locked(device) => Some(device.as_str()),
        LockState::Unlocked => None,
    };
    let value = json!({
        "timestamp": Utc::now().to_rfc3339(),
        "active_device": active_device,
        "locked": stats.lock.is_locked(),
    });
    value.to_string()
}

/// Final counters as one NDJSON record, matching the lock event lines.
pub fn stats_record(stats: &RouterStats) -> String {
    json!({
        "timestamp": Utc::now().to_rfc3339(),
        "stats": stats,
    })
    .to_string()
}
