//! Capture sessions: per-interface datagram sources.

use pcap::{Active, Capture};
use tracing::{debug, info};

use super::decode::{decode_udp, LinkLayer};
use crate::error::CaptureError;
use crate::types::Datagram;

/// Default snapshot length (maximum bytes per packet)
pub const DEFAULT_SNAPLEN: i32 = 65535;

/// Default read timeout so workers can observe the stop signal
pub const DEFAULT_READ_TIMEOUT_MS: i32 = 100;

/// One step of a capture source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Datagram(Datagram),
    /// Nothing to deliver this round (read timeout or a frame that wasn't UDP).
    Idle,
    /// The interface is gone for good.
    Closed,
}

/// A lazy, non-restartable sequence of UDP datagrams from one interface.
///
/// Dropping the source releases the underlying capture resource.
pub trait DatagramSource: Send {
    fn next_event(&mut self) -> Result<SourceEvent, CaptureError>;
}

/// Adapts an iterator of datagrams; ends when the iterator does.
pub struct IterSource<I>(pub I);

impl<I> DatagramSource for IterSource<I>
where
    I: Iterator<Item = Datagram> + Send,
{
    fn next_event(&mut self) -> Result<SourceEvent, CaptureError> {
        Ok(self.0.next().map_or(SourceEvent::Closed, SourceEvent::Datagram))
    }
}

/// Live capture configuration
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub ports: Vec<u16>,
    pub snaplen: i32,
    pub read_timeout_ms: i32,
    pub promiscuous: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            ports: crate::detector::PHOTON_UDP_PORTS.to_vec(),
            snaplen: DEFAULT_SNAPLEN,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            promiscuous: false,
        }
    }
}

/// BPF expression matching UDP traffic on any of `ports`.
pub fn port_filter(ports: &[u16]) -> String {
    ports
        .iter()
        .map(|p| format!("udp port {}", p))
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Live pcap capture on one device.
pub struct PcapSource {
    device: String,
    capture: Capture<Active>,
    link: LinkLayer,
}

impl PcapSource {
    /// Open `device`, apply the port filter and check the link type.
    pub fn open(device: &str, options: &CaptureOptions) -> Result<Self, CaptureError> {
        let open_err = |message: String| CaptureError::Open {
            device: device.to_string(),
            message,
        };

        let mut capture = Capture::from_device(device)
            .map_err(|e| open_err(e.to_string()))?
            .promisc(options.promiscuous)
            .snaplen(options.snaplen)
            .timeout(options.read_timeout_ms)
            .immediate_mode(true)
            .open()
            .map_err(|e| open_err(e.to_string()))?;

        let dlt = capture.get_datalink();
        let link = LinkLayer::from_dlt(dlt.0)
            .ok_or_else(|| open_err(format!("unsupported link type {:?}", dlt)))?;

        let filter = port_filter(&options.ports);
        if !filter.is_empty() {
            capture
                .filter(&filter, true)
                .map_err(|e| CaptureError::Filter {
                    device: device.to_string(),
                    message: e.to_string(),
                })?;
            debug!(device = %device, filter = %filter, "Applied BPF filter");
        }

        info!(device = %device, link = ?link, "Capture opened");

        Ok(Self {
            device: device.to_string(),
            capture,
            link,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn link_layer(&self) -> LinkLayer {
        self.link
    }
}

impl DatagramSource for PcapSource {
    fn next_event(&mut self) -> Result<SourceEvent, CaptureError> {
        match self.capture.next_packet() {
            Ok(packet) => Ok(decode_udp(self.link, packet.data)
                .map_or(SourceEvent::Idle, SourceEvent::Datagram)),
            Err(pcap::Error::TimeoutExpired) => Ok(SourceEvent::Idle),
            Err(pcap::Error::NoMorePackets) => Ok(SourceEvent::Closed),
            Err(e) => Err(CaptureError::Read {
                device: self.device.clone(),
                message: e.to_string(),
            }),
        }
    }
}

impl Drop for PcapSource {
    fn drop(&mut self) {
        debug!(device = %self.device, "Closing capture handle");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_filter() {
        assert_eq!(
            port_filter(&[5055, 5056, 5058]),
            "udp port 5055 or udp port 5056 or udp port 5058"
        );
        assert_eq!(port_filter(&[5056]), "udp port 5056");
        assert_eq!(port_filter(&[]), "");
    }

    #[test]
    fn test_iter_source_ends() {
        let mut source = IterSource(vec![Datagram::new(1, 2, vec![0xF1, 0, 0])].into_iter());
        assert!(matches!(source.next_event(), Ok(SourceEvent::Datagram(_))));
        assert_eq!(source.next_event().unwrap(), SourceEvent::Closed);
        assert_eq!(source.next_event().unwrap(), SourceEvent::Closed);
    }
}
