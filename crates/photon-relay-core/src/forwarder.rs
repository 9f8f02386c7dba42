//! UDP forwarder: sends every admitted payload to each configured target.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::ForwardError;
use crate::types::Packet;

/// Requested send buffer size; bursts of game traffic arrive back to back
const SEND_BUFFER_SIZE: usize = 1 << 20;

/// Create a nonblocking UDP socket on an ephemeral port, in the address
/// family of `target`.
pub fn create_send_socket(target: &SocketAddr) -> Result<std::net::UdpSocket, std::io::Error> {
    let domain = Domain::for_address(*target);
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

    if let Err(e) = socket.set_send_buffer_size(SEND_BUFFER_SIZE) {
        debug!(error = %e, "Could not enlarge send buffer");
    }

    let unspecified = match target {
        SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        SocketAddr::V6(_) => {
            socket.set_only_v6(true)?;
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        }
    };
    socket.bind(&SocketAddr::new(unspecified, 0).into())?;

    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

/// Resolve each `host:port` target to one address, IPv4 preferred.
///
/// Unresolvable targets are logged and skipped.
pub async fn resolve_targets(targets: &[String]) -> Vec<SocketAddr> {
    let mut resolved = Vec::new();

    for target in targets {
        match lookup_host(target.as_str()).await {
            Ok(addrs) => {
                let addrs: Vec<SocketAddr> = addrs.collect();
                let chosen = addrs
                    .iter()
                    .find(|a| a.is_ipv4())
                    .or_else(|| addrs.first());
                match chosen {
                    Some(addr) => {
                        debug!(target = %target, addr = %addr, "Resolved forward target");
                        resolved.push(*addr);
                    }
                    None => {
                        warn!(target = %target, "Target resolved to no address, skipping");
                    }
                }
            }
            Err(e) => {
                warn!(target = %target, error = %e, "Failed to resolve target, skipping");
            }
        }
    }

    resolved
}

fn bind_for(target: &SocketAddr) -> Result<UdpSocket, ForwardError> {
    create_send_socket(target)
        .and_then(UdpSocket::from_std)
        .map_err(ForwardError::Bind)
}

/// Holds one send socket per address family in use.
pub struct Forwarder {
    v4: Option<UdpSocket>,
    v6: Option<UdpSocket>,
    targets: Vec<SocketAddr>,
}

impl Forwarder {
    /// Resolve targets once and bind the send sockets.
    pub async fn bind(targets: &[String]) -> Result<Self, ForwardError> {
        let targets = resolve_targets(targets).await;
        if targets.is_empty() {
            return Err(ForwardError::NoTargets);
        }

        let mut v4 = None;
        let mut v6 = None;
        for target in &targets {
            let slot = if target.is_ipv4() { &mut v4 } else { &mut v6 };
            if slot.is_none() {
                *slot = Some(bind_for(target)?);
            }
        }

        info!(targets = ?targets, "Forwarder ready");

        Ok(Self { v4, v6, targets })
    }

    pub fn targets(&self) -> &[SocketAddr] {
        &self.targets
    }

    /// Local address of the socket used for `target`'s family.
    pub fn local_addr(&self, target: &SocketAddr) -> Option<std::io::Result<SocketAddr>> {
        self.socket_for(target).map(UdpSocket::local_addr)
    }

    /// Forward packets until the stream closes. Returns the number of
    /// payloads handed to the sockets (per target).
    pub async fn run(&self, mut input: mpsc::Receiver<Packet>) -> u64 {
        let mut sent = 0u64;

        while let Some(packet) = input.recv().await {
            sent += self.send(&packet.payload).await;
        }

        info!(sent, "Forwarder finished");
        sent
    }

    fn socket_for(&self, target: &SocketAddr) -> Option<&UdpSocket> {
        match target {
            SocketAddr::V4(_) => self.v4.as_ref(),
            SocketAddr::V6(_) => self.v6.as_ref(),
        }
    }

    async fn send(&self, payload: &[u8]) -> u64 {
        let mut sent = 0;
        for target in &self.targets {
            let Some(socket) = self.socket_for(target) else {
                continue;
            };
            match socket.send_to(payload, target).await {
                Ok(_) => sent += 1,
                Err(e) => warn!(target = %target, error = %e, "Failed to forward packet"),
            }
        }
        sent
    }
}
