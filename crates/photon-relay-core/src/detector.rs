//! Photon datagram classification.
//!
//! A datagram counts as Photon when either port is a well-known Photon port
//! or the payload starts with a Photon signature byte. Matching on the
//! signature catches proxied or remapped traffic; the arbitrator's scoring
//! absorbs the false positives that come with it.

/// Well-known Photon UDP ports.
pub const PHOTON_UDP_PORTS: [u16; 3] = [5055, 5056, 5058];

/// First-byte values of Photon command headers.
pub const SIGNATURE_BYTES: [u8; 3] = [0xF1, 0xF2, 0xFE];

/// Payloads shorter than this are never Photon.
pub const MIN_PAYLOAD_LEN: usize = 3;

/// Returns true if `port` is one of the well-known Photon ports.
pub fn is_photon_port(port: u16) -> bool {
    PHOTON_UDP_PORTS.contains(&port)
}

/// Returns true if the payload starts with a Photon signature byte.
pub fn has_signature(payload: &[u8]) -> bool {
    payload
        .first()
        .is_some_and(|first| SIGNATURE_BYTES.contains(first))
}

/// Classify one UDP datagram.
pub fn is_target_protocol(source_port: u16, dest_port: u16, payload: &[u8]) -> bool {
    if payload.len() < MIN_PAYLOAD_LEN {
        return false;
    }

    is_photon_port(source_port) || is_photon_port(dest_port) || has_signature(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_match() {
        assert!(is_target_protocol(5056, 50000, &[0x00, 0x01, 0x02]));
        assert!(is_target_protocol(50000, 5055, &[0x00, 0x01, 0x02]));
        assert!(is_target_protocol(50000, 5058, &[0x00, 0x01, 0x02]));
    }

    #[test]
    fn test_signature_match_on_any_port() {
        for sig in SIGNATURE_BYTES {
            assert!(is_target_protocol(1234, 4321, &[sig, 0x00, 0x00]));
            assert!(is_target_protocol(40000, 40001, &[sig, 0xAA, 0xBB, 0xCC]));
        }
    }

    #[test]
    fn test_short_payload_rejected() {
        assert!(!is_target_protocol(5056, 5056, &[0xF1, 0x00]));
        assert!(!is_target_protocol(5055, 1, &[0xF1]));
        assert!(!is_target_protocol(5055, 1, &[]));
    }

    #[test]
    fn test_no_match() {
        assert!(!is_target_protocol(53, 40000, &[0x12, 0x34, 0x56, 0x78]));
        assert!(!is_target_protocol(40000, 443, &[0x00, 0xF1, 0xF2]));
    }

    #[test]
    fn test_has_signature() {
        assert!(has_signature(&[0xFE]));
        assert!(!has_signature(&[0xF3]));
        assert!(!has_signature(&[]));
    }
}
