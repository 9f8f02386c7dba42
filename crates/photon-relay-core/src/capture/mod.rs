//! Packet capture adapters.
//!
//! Enumerates interfaces, opens one pcap session per interface and turns
//! captured frames into UDP datagrams for the router.

pub mod decode;
pub mod interface;
pub mod session;

pub use decode::{decode_udp, LinkLayer};
pub use interface::{list_interfaces, InterfaceFilter, InterfaceInfo};
pub use session::{
    port_filter, CaptureOptions, DatagramSource, IterSource, PcapSource, SourceEvent,
};

use tracing::warn;

use crate::error::CaptureError;

/// Open a capture on every interface, skipping the ones that fail.
///
/// Fails only when no interface could be opened at all.
pub fn open_sessions(
    interfaces: &[InterfaceInfo],
    options: &CaptureOptions,
) -> Result<Vec<(InterfaceInfo, PcapSource)>, CaptureError> {
    open_sessions_with(interfaces, |iface| PcapSource::open(&iface.name, options))
}

/// `open_sessions` with a caller-supplied opener.
pub fn open_sessions_with<S, F>(
    interfaces: &[InterfaceInfo],
    mut open: F,
) -> Result<Vec<(InterfaceInfo, S)>, CaptureError>
where
    F: FnMut(&InterfaceInfo) -> Result<S, CaptureError>,
{
    let mut sessions = Vec::new();

    for iface in interfaces {
        match open(iface) {
            Ok(source) => sessions.push((iface.clone(), source)),
            Err(e) => {
                warn!(device = %iface.name, error = %e, "Skipping interface");
            }
        }
    }

    if sessions.is_empty() {
        return Err(CaptureError::NoDevices);
    }

    Ok(sessions)
}
