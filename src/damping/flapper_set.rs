//! The set of suspected flappers the local node is tracking.

use std::collections::HashMap;

use crate::types::{Flapper, MemberAddress};

/// In-memory flapper bookkeeping, keyed by member address.
///
/// Owned by the damp controller; the 0-to-1 and 1-to-0 size transitions that
/// start and stop the damp timer are the controller's job, not this set's.
#[derive(Debug, Default)]
pub struct FlapperSet {
    flappers: HashMap<MemberAddress, Flapper>,
}

impl FlapperSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a flapper. Returns `false` without effect if the address is
    /// already tracked.
    pub fn add(&mut self, flapper: Flapper) -> bool {
        if self.flappers.contains_key(&flapper.address) {
            return false;
        }
        self.flappers.insert(flapper.address.clone(), flapper);
        true
    }

    /// Remove a flapper by address, returning it if it was tracked
    pub fn remove(&mut self, address: &MemberAddress) -> Option<Flapper> {
        self.flappers.remove(address)
    }

    /// Whether the address is currently tracked
    pub fn contains(&self, address: &MemberAddress) -> bool {
        self.flappers.contains_key(address)
    }

    /// Number of tracked flappers
    pub fn len(&self) -> usize {
        self.flappers.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.flappers.is_empty()
    }

    /// Snapshot of the tracked addresses. Iteration order is unspecified.
    pub fn addresses(&self) -> Vec<MemberAddress> {
        self.flappers.keys().cloned().collect()
    }
}
