//! Membership collaborator interface.
//!
//! The damper calls into the node's membership table but does not implement
//! it. It is a writer through [`Membership::make_damped`] and
//! [`Membership::update`] and assumes membership serializes its own writes.

use async_trait::async_trait;

use crate::types::{Member, MemberAddress, MembershipChange};

/// The slice of the membership table the damping subprotocol consumes
#[async_trait]
pub trait Membership: Send + Sync {
    /// Up to `n` live, pingable members, excluding the given addresses.
    /// Selection is random; the damper places no ordering requirement on it.
    async fn get_random_pingable_members(
        &self,
        n: usize,
        excluding: &[MemberAddress],
    ) -> Vec<Member>;

    /// Look a member up by address
    async fn find_member_by_address(&self, address: &MemberAddress) -> Option<Member>;

    /// Mark a member as damped. Idempotent.
    async fn make_damped(&self, address: &MemberAddress);

    /// Apply gossiped membership changes
    async fn update(&self, changes: &[MembershipChange]);

    /// Fraction of the cluster currently damped, in [0, 1].
    /// Membership is authoritative on cluster size; the damper is not.
    async fn get_damped_percentage(&self) -> f64;
}
