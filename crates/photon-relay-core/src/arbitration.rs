//! Device arbitration.
//!
//! Several interfaces may carry the same game traffic (for example a VPN
//! adapter and the physical NIC underneath it). The arbitrator picks one of
//! them by score and then admits packets from that interface only, until it
//! goes quiet for longer than the lock timeout.
//!
//! All state lives behind one mutex and every `admit` runs the full
//! timeout/reject/score/lock/refresh sequence inside a single critical
//! section, so two origins can never both cross the threshold.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::types::Origin;

/// Score threshold and inactivity timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    /// Matches an origin needs before it is trusted. Must be positive.
    pub threshold: u32,
    /// Silence from the active device after which the lock is released.
    pub timeout: Duration,
}

/// Snapshot of the lock for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "device", rename_all = "lowercase")]
pub enum LockState {
    Unlocked,
    Locked(String),
}

impl LockState {
    pub fn is_locked(&self) -> bool {
        matches!(self, LockState::Locked(_))
    }
}

#[derive(Debug, Default)]
struct ArbitrationState {
    active_device: Option<Origin>,
    device_scores: HashMap<Origin, u32>,
    last_valid_at: Option<Instant>,
}

impl ArbitrationState {
    fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        match (&self.active_device, self.last_valid_at) {
            (Some(_), Some(last)) => now.saturating_duration_since(last) > timeout,
            _ => false,
        }
    }

    fn release(&mut self) {
        self.active_device = None;
        self.device_scores.clear();
        self.last_valid_at = None;
    }
}

/// Scoring/lock/timeout engine shared by all capture workers.
#[derive(Debug)]
pub struct Arbitrator {
    policy: LockPolicy,
    state: Mutex<ArbitrationState>,
}

impl Arbitrator {
    pub fn new(policy: LockPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(ArbitrationState::default()),
        }
    }

    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    /// Decide whether a classified packet from `origin` enters the output
    /// stream.
    ///
    /// While unlocked every candidate is admitted and scored; the first
    /// origin to reach the threshold takes the lock, after which only it is
    /// admitted.
    pub fn admit(&self, origin: &Origin, now: Instant) -> bool {
        let mut state = self.state.lock();

        if state.is_stale(now, self.policy.timeout) {
            if let Some(active) = &state.active_device {
                info!(device = %active, "Device lock timed out");
            }
            state.release();
        }

        if let Some(active) = &state.active_device {
            if active != origin {
                return false;
            }
            state.last_valid_at = Some(now);
            return true;
        }

        let score = {
            let entry = state.device_scores.entry(origin.clone()).or_insert(0);
            *entry = entry.saturating_add(1);
            *entry
        };

        if score >= self.policy.threshold {
            info!(device = %origin, score, "Locked to device");
            state.active_device = Some(origin.clone());
            state.device_scores.clear();
            state.last_valid_at = Some(now);
        } else {
            debug!(device = %origin, score, "Scored candidate device");
        }

        true
    }

    /// Release a stale lock without waiting for the next packet.
    ///
    /// Returns true if a lock was released.
    pub fn expire(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        if !state.is_stale(now, self.policy.timeout) {
            return false;
        }
        if let Some(active) = &state.active_device {
            info!(device = %active, "Device lock expired while idle");
        }
        state.release();
        true
    }

    /// The interface currently holding the lock, if any.
    pub fn active_device(&self) -> Option<Origin> {
        self.state.lock().active_device.clone()
    }

    pub fn lock_state(&self) -> LockState {
        match self.active_device() {
            Some(device) => LockState::Locked(device.to_string()),
            None => LockState::Unlocked,
        }
    }

    /// Current score of `origin`. Always zero while a lock is held.
    pub fn score(&self, origin: &str) -> u32 {
        self.state
            .lock()
            .device_scores
            .get(origin)
            .copied()
            .unwrap_or(0)
    }
}
