//! Relay configuration.
//!
//! A JSON file read once at startup. Missing keys fall back to the built-in
//! defaults, so a file only needs the values it changes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::arbitration::LockPolicy;
use crate::capture::interface::glob_to_regex;
use crate::capture::session::{CaptureOptions, DEFAULT_READ_TIMEOUT_MS, DEFAULT_SNAPLEN};
use crate::detector::PHOTON_UDP_PORTS;
use crate::error::ConfigError;

/// Config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "photon-relay.json";

/// Default forward destination
pub const DEFAULT_TARGET: &str = "127.0.0.1:44444";

pub const DEFAULT_LOCK_SCORE: u32 = 3;
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Forward destinations as `host:port`
    pub targets: Vec<String>,
    /// UDP ports passed to the capture filter
    pub ports: Vec<u16>,
    /// Matches required before an interface is locked
    pub lock_score: u32,
    /// Seconds of silence before the lock is released
    pub lock_timeout: u64,
    /// Bound of the queue between capture and forwarder
    pub queue_capacity: usize,
    /// Glob patterns of interfaces never to monitor
    pub exclude_interfaces: Vec<String>,
    pub include_loopback: bool,
    /// Release a stale lock even when no packets arrive at all
    pub idle_release: bool,
    pub snaplen: i32,
    pub read_timeout_ms: i32,
    pub promiscuous: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            targets: vec![DEFAULT_TARGET.to_string()],
            ports: PHOTON_UDP_PORTS.to_vec(),
            lock_score: DEFAULT_LOCK_SCORE,
            lock_timeout: DEFAULT_LOCK_TIMEOUT_SECS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            exclude_interfaces: Vec::new(),
            include_loopback: false,
            idle_release: false,
            snaplen: DEFAULT_SNAPLEN,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            promiscuous: false,
        }
    }
}

impl RelayConfig {
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_score == 0 {
            return Err(ConfigError::invalid("lock_score", "must be greater than zero"));
        }
        if self.lock_timeout == 0 {
            return Err(ConfigError::invalid("lock_timeout", "must be greater than zero"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::invalid("queue_capacity", "must be greater than zero"));
        }
        if self.ports.is_empty() {
            return Err(ConfigError::invalid("ports", "at least one port is required"));
        }
        if self.ports.contains(&0) {
            return Err(ConfigError::invalid("ports", "port 0 is not a valid filter port"));
        }
        if self.targets.is_empty() {
            return Err(ConfigError::invalid("targets", "at least one target is required"));
        }
        for target in &self.targets {
            validate_target(target)?;
        }
        if self.snaplen <= 0 {
            return Err(ConfigError::invalid("snaplen", "must be greater than zero"));
        }
        if self.read_timeout_ms <= 0 {
            return Err(ConfigError::invalid("read_timeout_ms", "must be greater than zero"));
        }
        for pattern in &self.exclude_interfaces {
            glob_to_regex(pattern)?;
        }
        Ok(())
    }

    pub fn lock_policy(&self) -> LockPolicy {
        LockPolicy {
            threshold: self.lock_score,
            timeout: Duration::from_secs(self.lock_timeout),
        }
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            ports: self.ports.clone(),
            snaplen: self.snaplen,
            read_timeout_ms: self.read_timeout_ms,
            promiscuous: self.promiscuous,
        }
    }
}

fn validate_target(target: &str) -> Result<(), ConfigError> {
    let (host, port) = target
        .rsplit_once(':')
        .ok_or_else(|| ConfigError::invalid("targets", format!("'{}' is not host:port", target)))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(ConfigError::invalid("targets", format!("'{}' has no host", target)));
    }
    match port.parse::<u16>() {
        Ok(p) if p != 0 => Ok(()),
        _ => Err(ConfigError::invalid("targets", format!("'{}' has an invalid port", target))),
    }
}

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Builtin,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Builtin => write!(f, "built-in defaults"),
        }
    }
}

/// Platform config file location, e.g. `~/.config/photon-relay/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "photon-relay", "photon-relay")
        .map(|dirs| dirs.config_dir().join("config.json"))
}

/// Candidate files in lookup order.
pub fn config_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(path) = default_config_path() {
        candidates.push(path);
    }
    candidates
}

/// Read and validate one config file.
pub async fn load(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path).await?;
    let config = RelayConfig::from_json(&content)?;
    config.validate()?;
    Ok(config)
}

/// Load the explicit path if given, else the first existing candidate,
/// else the built-in defaults.
pub async fn load_or_default(
    explicit: Option<&Path>,
) -> Result<(RelayConfig, ConfigSource), ConfigError> {
    if let Some(path) = explicit {
        let config = load(path).await?;
        return Ok((config, ConfigSource::File(path.to_path_buf())));
    }
    load_first(&config_candidates()).await
}

async fn load_first(candidates: &[PathBuf]) -> Result<(RelayConfig, ConfigSource), ConfigError> {
    for path in candidates {
        if fs::try_exists(path).await.unwrap_or(false) {
            let config = load(path).await?;
            return Ok((config, ConfigSource::File(path.clone())));
        }
    }
    Ok((RelayConfig::default(), ConfigSource::Builtin))
}

/// Write `config` as pretty JSON, creating parent directories.
pub async fn save(path: &Path, config: &RelayConfig, overwrite: bool) -> Result<(), ConfigError> {
    if !overwrite && fs::try_exists(path).await.unwrap_or(false) {
        return Err(ConfigError::AlreadyExists(path.display().to_string()));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = RelayConfig::default();
        config.validate().unwrap();
        assert_eq!(config.ports, vec![5055, 5056, 5058]);
        assert_eq!(config.lock_policy().timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = RelayConfig::from_json(r#"{"lock_score": 5, "targets": ["10.0.0.5:9000"]}"#)
            .unwrap();
        assert_eq!(config.lock_score, 5);
        assert_eq!(config.targets, vec!["10.0.0.5:9000".to_string()]);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            RelayConfig { lock_score: 0, ..Default::default() },
            RelayConfig { lock_timeout: 0, ..Default::default() },
            RelayConfig { queue_capacity: 0, ..Default::default() },
            RelayConfig { ports: Vec::new(), ..Default::default() },
            RelayConfig { targets: Vec::new(), ..Default::default() },
            RelayConfig { targets: vec!["localhost".to_string()], ..Default::default() },
            RelayConfig { targets: vec!["host:0".to_string()], ..Default::default() },
            RelayConfig { targets: vec![":9000".to_string()], ..Default::default() },
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid { .. })),
                "{:?} should be rejected",
                config
            );
        }
    }

    #[test]
    fn test_ipv6_target_accepted() {
        assert!(validate_target("[::1]:44444").is_ok());
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            RelayConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = RelayConfig {
            lock_score: 7,
            exclude_interfaces: vec!["docker*".to_string()],
            ..Default::default()
        };

        save(&path, &config, false).await.unwrap();
        let loaded = load(&path).await.unwrap();
        assert_eq!(loaded, config);

        assert!(matches!(
            save(&path, &config, false).await,
            Err(ConfigError::AlreadyExists(_))
        ));
        save(&path, &config, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"lock_timeout": 0}"#).unwrap();
        assert!(matches!(load(&path).await, Err(ConfigError::Invalid { .. })));
    }

    #[tokio::test]
    async fn test_explicit_missing_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(matches!(
            load_or_default(Some(&path)).await,
            Err(ConfigError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_load_first_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("a.json");
        let present = dir.path().join("b.json");
        std::fs::write(&present, r#"{"lock_score": 9}"#).unwrap();

        let (config, source) = load_first(&[missing.clone(), present.clone()]).await.unwrap();
        assert_eq!(config.lock_score, 9);
        assert_eq!(source, ConfigSource::File(present));

        let (config, source) = load_first(&[missing]).await.unwrap();
        assert_eq!(config, RelayConfig::default());
        assert_eq!(source, ConfigSource::Builtin);
    }
}
