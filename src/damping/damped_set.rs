//! The set of addresses the local node has committed to treating as damped.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::types::MemberAddress;

/// Damped entries with their commit timestamps.
///
/// Owned by the damp controller. An entry is released once
/// `now - committed_at >= suppress_duration`; the scan lives here, the
/// timer that drives it lives in the controller.
#[derive(Debug, Default)]
pub struct DampedSet {
    entries: HashMap<MemberAddress, Instant>,
}

impl DampedSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `{address, now}`. Returns `false` without touching the
    /// original timestamp if the address is already damped.
    pub fn commit(&mut self, address: MemberAddress, now: Instant) -> bool {
        if self.entries.contains_key(&address) {
            return false;
        }
        self.entries.insert(address, now);
        true
    }

    /// Scan every entry and remove those whose suppress duration has
    /// elapsed, returning the released addresses.
    pub fn expire(&mut self, now: Instant, suppress_duration: Duration) -> Vec<MemberAddress> {
        let released: Vec<MemberAddress> = self
            .entries
            .iter()
            .filter(|(_, committed_at)| now.duration_since(**committed_at) >= suppress_duration)
            .map(|(address, _)| address.clone())
            .collect();
        for address in &released {
            self.entries.remove(address);
        }
        released
    }

    /// Whether the address is currently damped
    pub fn contains(&self, address: &MemberAddress) -> bool {
        self.entries.contains_key(address)
    }

    /// Number of damped entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the damped addresses. Iteration order is unspecified.
    pub fn addresses(&self) -> Vec<MemberAddress> {
        self.entries.keys().cloned().collect()
    }
}
