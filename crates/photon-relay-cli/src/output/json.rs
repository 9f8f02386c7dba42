//! JSON-formatted output for CLI.

use photon_relay_core::config::{ConfigSource, RelayConfig};
use photon_relay_core::RouterStats;
use serde::Serialize;
use serde_json::json;

use super::{InterfaceRow, OutputFormatter};

pub struct JsonOutput;

impl JsonOutput {
    pub fn new() -> Self {
        Self
    }

    fn to_json<T: Serialize>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for JsonOutput {
    fn format_interfaces(&self, rows: &[InterfaceRow]) -> String {
        let monitored = rows.iter().filter(|r| r.monitored).count();
        Self::to_json(&json!({
            "interfaces": rows,
            "count": rows.len(),
            "monitored": monitored
        }))
    }

    fn format_config(&self, config: &RelayConfig, source: &ConfigSource) -> String {
        Self::to_json(&json!({
            "source": source.to_string(),
            "config": config
        }))
    }

    fn format_stats(&self, stats: &RouterStats) -> String {
        Self::to_json(stats)
    }

    fn format_message(&self, message: &str) -> String {
        Self::to_json(&json!({ "message": message }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photon_relay_core::capture::InterfaceInfo;
    use photon_relay_core::LockState;

    #[test]
    fn test_interfaces_json_is_flat() {
        let rows = vec![InterfaceRow {
            info: InterfaceInfo {
                name: "eth0".to_string(),
                description: String::new(),
                addresses: vec!["10.0.0.2".parse().unwrap()],
                is_loopback: false,
                is_up: true,
            },
            monitored: true,
        }];
        let value: serde_json::Value =
            serde_json::from_str(&JsonOutput::new().format_interfaces(&rows)).unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(value["interfaces"][0]["name"], "eth0");
        assert_eq!(value["interfaces"][0]["monitored"], true);
    }

    #[test]
    fn test_stats_json() {
        let stats = RouterStats {
            lock: LockState::Locked("eth0".to_string()),
            interfaces: Vec::new(),
        };
        let value: serde_json::Value =
            serde_json::from_str(&JsonOutput::new().format_stats(&stats)).unwrap();
        assert_eq!(value["lock"]["device"], "eth0");
    }
}
