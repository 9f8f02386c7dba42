//! Output formatting for CLI results.

pub mod json;
pub mod table;

pub use json::JsonOutput;
pub use table::TableOutput;

use photon_relay_core::capture::InterfaceInfo;
use photon_relay_core::config::{ConfigSource, RelayConfig};
use photon_relay_core::RouterStats;
use serde::Serialize;

/// An interface together with the monitoring decision for it.
#[derive(Debug, Clone, Serialize)]
pub struct InterfaceRow {
    #[serde(flatten)]
    pub info: InterfaceInfo,
    pub monitored: bool,
}

/// Output formatter trait
pub trait OutputFormatter {
    /// Format interface list
    fn format_interfaces(&self, rows: &[InterfaceRow]) -> String;

    /// Format the effective configuration and where it came from
    fn format_config(&self, config: &RelayConfig, source: &ConfigSource) -> String;

    /// Format per-interface pipeline counters
    fn format_stats(&self, stats: &RouterStats) -> String;

    /// Format a generic message
    fn format_message(&self, message: &str) -> String;
}

/// Get the appropriate formatter based on JSON flag
pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonOutput::new())
    } else {
        Box::new(TableOutput::new())
    }
}
