//! Network interface enumeration and selection.

use std::net::IpAddr;

use regex::Regex;
use serde::Serialize;

use crate::config::RelayConfig;
use crate::error::{CaptureError, ConfigError};

/// Information about a capture-capable network interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceInfo {
    /// Capture device name (e.g. "eth0", "\Device\NPF_{...}")
    pub name: String,
    /// Human-readable description, empty when the driver gives none
    pub description: String,
    /// Addresses assigned to this interface
    pub addresses: Vec<IpAddr>,
    pub is_loopback: bool,
    pub is_up: bool,
}

impl From<pcap::Device> for InterfaceInfo {
    fn from(device: pcap::Device) -> Self {
        Self {
            is_loopback: device.flags.is_loopback(),
            is_up: device.flags.is_up(),
            addresses: device.addresses.iter().map(|a| a.addr).collect(),
            description: device.desc.unwrap_or_default(),
            name: device.name,
        }
    }
}

impl InterfaceInfo {
    /// Label for logs and tables: the description when there is one.
    pub fn display_name(&self) -> &str {
        if self.description.is_empty() {
            &self.name
        } else {
            &self.description
        }
    }
}

/// List all interfaces pcap can see.
pub fn list_interfaces() -> Result<Vec<InterfaceInfo>, CaptureError> {
    let devices =
        pcap::Device::list().map_err(|e| CaptureError::DeviceList(e.to_string()))?;
    Ok(devices.into_iter().map(InterfaceInfo::from).collect())
}

/// Decides which interfaces are worth monitoring.
///
/// Interfaces without addresses are skipped, as are loopbacks unless
/// explicitly included, and anything matching an exclude pattern (checked
/// against both name and description).
#[derive(Debug, Clone)]
pub struct InterfaceFilter {
    include_loopback: bool,
    excludes: Vec<Regex>,
}

impl InterfaceFilter {
    pub fn new(include_loopback: bool, patterns: &[String]) -> Result<Self, ConfigError> {
        let excludes = patterns
            .iter()
            .map(|p| glob_to_regex(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            include_loopback,
            excludes,
        })
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self, ConfigError> {
        Self::new(config.include_loopback, &config.exclude_interfaces)
    }

    pub fn accepts(&self, iface: &InterfaceInfo) -> bool {
        if iface.addresses.is_empty() {
            return false;
        }
        if iface.is_loopback && !self.include_loopback {
            return false;
        }
        !self
            .excludes
            .iter()
            .any(|re| re.is_match(&iface.name) || re.is_match(&iface.description))
    }

    /// Keep the accepted interfaces; an empty result is an error.
    pub fn select(&self, interfaces: Vec<InterfaceInfo>) -> Result<Vec<InterfaceInfo>, CaptureError> {
        let selected: Vec<InterfaceInfo> =
            interfaces.into_iter().filter(|i| self.accepts(i)).collect();
        if selected.is_empty() {
            return Err(CaptureError::NoDevices);
        }
        Ok(selected)
    }
}

/// Compile a `*`/`?` glob into an anchored, case-insensitive regex.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, ConfigError> {
    let escaped = regex::escape(pattern)
        .replace(r"\*", ".*")
        .replace(r"\?", ".");
    Regex::new(&format!("(?i)^{}$", escaped))
        .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", pattern, e)))
}
