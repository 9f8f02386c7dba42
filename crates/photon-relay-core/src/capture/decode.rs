//! Link/IP/UDP header decoding for captured frames.
//!
//! Only what the relay needs: find the UDP header inside a frame and slice
//! out its payload. Frames that aren't UDP, are truncated, or are non-first
//! IPv4 fragments decode to `None`.

use bytes::Bytes;

use crate::types::Datagram;

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86DD;
const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_QINQ: u16 = 0x88A8;

const ETHERNET_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;
const MAX_VLAN_TAGS: usize = 2;
const NULL_HEADER_LEN: usize = 4;
const SLL_HEADER_LEN: usize = 16;
const IPV4_MIN_HEADER_LEN: usize = 20;
const IPV6_HEADER_LEN: usize = 40;
const UDP_HEADER_LEN: usize = 8;

const IPPROTO_UDP: u8 = 17;

/// Link-layer framing of a capture handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer {
    Ethernet,
    /// BSD loopback / Npcap loopback: 4-byte address family header.
    Null,
    /// Bare IP packets, version taken from the first nibble (VPN adapters).
    RawIp,
    /// Linux cooked capture (`any` device, some tunnels).
    LinuxSll,
}

impl LinkLayer {
    /// Map a pcap DLT/LINKTYPE value, `None` if unsupported.
    pub fn from_dlt(dlt: i32) -> Option<Self> {
        match dlt {
            1 => Some(LinkLayer::Ethernet),
            0 | 108 => Some(LinkLayer::Null),
            12 | 14 | 101 | 228 | 229 => Some(LinkLayer::RawIp),
            113 => Some(LinkLayer::LinuxSll),
            _ => None,
        }
    }
}

/// Extract the UDP datagram carried by `frame`.
pub fn decode_udp(link: LinkLayer, frame: &[u8]) -> Option<Datagram> {
    let ip = match link {
        LinkLayer::Ethernet => ethernet_payload(frame)?,
        LinkLayer::Null => frame.get(NULL_HEADER_LEN..)?,
        LinkLayer::RawIp => frame,
        LinkLayer::LinuxSll => sll_payload(frame)?,
    };
    decode_ip(ip)
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn ethernet_payload(frame: &[u8]) -> Option<&[u8]> {
    let mut ethertype = read_u16(frame, 12)?;
    let mut offset = ETHERNET_HEADER_LEN;

    for _ in 0..MAX_VLAN_TAGS {
        if ethertype != ETHERTYPE_VLAN && ethertype != ETHERTYPE_QINQ {
            break;
        }
        ethertype = read_u16(frame, offset + 2)?;
        offset += VLAN_TAG_LEN;
    }

    match ethertype {
        ETHERTYPE_IPV4 | ETHERTYPE_IPV6 => frame.get(offset..),
        _ => None,
    }
}

fn sll_payload(frame: &[u8]) -> Option<&[u8]> {
    match read_u16(frame, 14)? {
        ETHERTYPE_IPV4 | ETHERTYPE_IPV6 => frame.get(SLL_HEADER_LEN..),
        _ => None,
    }
}

fn decode_ip(packet: &[u8]) -> Option<Datagram> {
    match packet.first()? >> 4 {
        4 => decode_ipv4(packet),
        6 => decode_ipv6(packet),
        _ => None,
    }
}

fn decode_ipv4(packet: &[u8]) -> Option<Datagram> {
    if packet.len() < IPV4_MIN_HEADER_LEN {
        return None;
    }

    let header_len = usize::from(packet[0] & 0x0F) * 4;
    if header_len < IPV4_MIN_HEADER_LEN || packet[9] != IPPROTO_UDP {
        return None;
    }

    let fragment_offset = read_u16(packet, 6)? & 0x1FFF;
    if fragment_offset != 0 {
        return None;
    }

    // Offloaded captures can report a zero total length.
    let total_len = usize::from(read_u16(packet, 2)?);
    let end = if total_len == 0 {
        packet.len()
    } else {
        total_len.min(packet.len())
    };

    decode_udp_header(packet.get(header_len..end)?)
}

fn decode_ipv6(packet: &[u8]) -> Option<Datagram> {
    if packet.len() < IPV6_HEADER_LEN || packet[6] != IPPROTO_UDP {
        return None;
    }

    let payload_len = usize::from(read_u16(packet, 4)?);
    let end = if payload_len == 0 {
        packet.len()
    } else {
        (IPV6_HEADER_LEN + payload_len).min(packet.len())
    };

    decode_udp_header(packet.get(IPV6_HEADER_LEN..end)?)
}

fn decode_udp_header(segment: &[u8]) -> Option<Datagram> {
    if segment.len() < UDP_HEADER_LEN {
        return None;
    }

    let source_port = read_u16(segment, 0)?;
    let dest_port = read_u16(segment, 2)?;
    let length = usize::from(read_u16(segment, 4)?);
    let end = if length >= UDP_HEADER_LEN {
        length.min(segment.len())
    } else {
        segment.len()
    };

    let payload = segment.get(UDP_HEADER_LEN..end)?;
    if payload.is_empty() {
        return None;
    }

    Some(Datagram {
        source_port,
        dest_port,
        payload: Bytes::copy_from_slice(payload),
    })
}
