//! Shared data types for the capture pipeline.

use std::sync::Arc;

use bytes::Bytes;

/// Identifier of the interface a packet was captured on.
///
/// Cheap to clone; stable for the lifetime of one capture session.
pub type Origin = Arc<str>;

/// A raw UDP datagram as produced by a capture source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub source_port: u16,
    pub dest_port: u16,
    pub payload: Bytes,
}

impl Datagram {
    pub fn new(source_port: u16, dest_port: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            source_port,
            dest_port,
            payload: payload.into(),
        }
    }
}

/// A datagram tagged with the interface it arrived on.
///
/// Built once by the capture worker, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub origin: Origin,
    pub source_port: u16,
    pub dest_port: u16,
    pub payload: Bytes,
}

impl Packet {
    pub fn from_datagram(origin: Origin, datagram: Datagram) -> Self {
        Self {
            origin,
            source_port: datagram.source_port,
            dest_port: datagram.dest_port,
            payload: datagram.payload,
        }
    }
}
