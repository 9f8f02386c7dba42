//! Table-formatted output for CLI.

use colored::*;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use photon_relay_core::config::{ConfigSource, RelayConfig};
use photon_relay_core::{LockState, RouterStats};

use super::{InterfaceRow, OutputFormatter};

pub struct TableOutput;

impl TableOutput {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TableOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for TableOutput {
    fn format_interfaces(&self, rows: &[InterfaceRow]) -> String {
        if rows.is_empty() {
            return "No interfaces found.".to_string();
        }

        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Name", "Description", "Addresses", "Flags", "Monitored"]);

        for row in rows {
            let addresses = row
                .info
                .addresses
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(", ");

            let mut flags = Vec::new();
            if row.info.is_up {
                flags.push("up");
            }
            if row.info.is_loopback {
                flags.push("loopback");
            }

            let monitored = if row.monitored {
                Cell::new("yes").fg(Color::Green)
            } else {
                Cell::new("no").fg(Color::DarkGrey)
            };

            table.add_row(vec![
                Cell::new(&row.info.name),
                Cell::new(&row.info.description),
                Cell::new(addresses),
                Cell::new(flags.join(",")),
                monitored,
            ]);
        }

        let monitored = rows.iter().filter(|r| r.monitored).count();
        format!(
            "{}\n\n{} interface(s), {} monitored",
            table,
            rows.len(),
            monitored
        )
    }

    fn format_config(&self, config: &RelayConfig, source: &ConfigSource) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Config: {}", source.to_string().bold()));
        lines.push(format!("  Targets:        {}", config.targets.join(", ")));
        lines.push(format!(
            "  Ports:          {}",
            config
                .ports
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
        lines.push(format!("  Lock score:     {}", config.lock_score));
        lines.push(format!("  Lock timeout:   {}s", config.lock_timeout));
        lines.push(format!("  Queue capacity: {}", config.queue_capacity));
        lines.push(format!(
            "  Idle release:   {}",
            if config.idle_release { "on" } else { "off" }
        ));
        lines.push(format!(
            "  Loopback:       {}",
            if config.include_loopback { "included" } else { "skipped" }
        ));
        if !config.exclude_interfaces.is_empty() {
            lines.push(format!(
                "  Excluded:       {}",
                config.exclude_interfaces.join(", ")
            ));
        }

        lines.join("\n")
    }

    fn format_stats(&self, stats: &RouterStats) -> String {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            "Interface", "Captured", "Photon", "Admitted", "Rejected", "Dropped", "State",
        ]);

        let active = match &stats.lock {
            LockState::Locked(device) => Some(device.as_str()),
            LockState::Unlocked => None,
        };

        for s in &stats.interfaces {
            let state = if active == Some(s.origin.as_str()) {
                Cell::new("locked").fg(Color::Green)
            } else if s.running {
                Cell::new("running")
            } else {
                Cell::new("closed").fg(Color::Red)
            };

            table.add_row(vec![
                Cell::new(&s.origin),
                Cell::new(s.captured),
                Cell::new(s.matched),
                Cell::new(s.admitted),
                Cell::new(s.rejected),
                Cell::new(s.dropped),
                state,
            ]);
        }

        table.to_string()
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }
}
