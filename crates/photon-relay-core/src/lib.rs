//! Photon relay core.
//!
//! Captures UDP traffic on every usable interface, keeps the datagrams that
//! look like Photon, elects one interface as the authoritative source and
//! forwards its payloads to downstream consumers.

pub mod arbitration;
pub mod capture;
pub mod config;
pub mod detector;
pub mod error;
pub mod forwarder;
pub mod router;
pub mod types;

pub use arbitration::{Arbitrator, LockPolicy, LockState};
pub use config::RelayConfig;
pub use error::{CaptureError, ConfigError, CoreError, ForwardError, Result};
pub use forwarder::Forwarder;
pub use router::{Router, RouterOptions, RouterStats};
pub use types::{Datagram, Origin, Packet};
