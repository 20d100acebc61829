//! Observable event surface of the damp controller.
//!
//! Subscribers register and unregister explicitly; the controller publishes
//! tagged variants, one per event kind. Delivery is synchronous on the
//! publishing task and never crosses a suspension point, so subscriber
//! callbacks must be fast and non-blocking.

use crate::types::{MemberAddress, ObserverScores};

/// Everything the damp controller reports about its rounds
#[derive(Debug, Clone)]
pub enum DampingEvent {
    /// The cluster-wide damped cap blocked an initiation
    DampedLimitExceeded {
        /// Flappers the skipped round would have voted on
        flappers: Vec<MemberAddress>,
        /// Damped fraction reported by membership
        damped_fraction: f64,
        /// Configured `dampedMaxPercentage`
        limit: f64,
    },

    /// Not enough observers to attempt any quorum; the round was skipped
    DampReqUnsatisfied {
        /// Flappers the skipped round would have voted on
        flappers: Vec<MemberAddress>,
        /// Observers membership could offer
        observers: usize,
        /// Configured quorum size
        r_val: usize,
    },

    /// The fan-out ended without reaching its quorum
    DampReqFailed {
        /// Flappers the failed round was voting on
        flappers: Vec<MemberAddress>,
        /// Quorum size the round ran with
        r_val: usize,
        /// Accumulated error descriptions from the observers
        errors: Vec<String>,
    },

    /// An initiation was requested while a round was already in flight
    DampingInProgress {
        /// Flappers tracked at the time of the rejected initiation
        flappers: Vec<MemberAddress>,
    },

    /// The quorum was reached but no flapper met the suppress criteria
    DampingUnconfirmed {
        /// Flappers the round voted on
        flappers: Vec<MemberAddress>,
        /// Observers that were contacted
        observers: Vec<MemberAddress>,
        /// Quorum size the round ran with
        r_val: usize,
        /// The aggregated successful responses
        results: Vec<ObserverScores>,
    },

    /// A member was committed to the damped set
    Damped {
        /// The member now suppressed
        address: MemberAddress,
        /// Quorum size the deciding round ran with
        r_val: usize,
        /// The aggregated successful responses behind the decision
        results: Vec<ObserverScores>,
    },

    /// A damped member's suppress duration elapsed and it was released
    MemberUndamped {
        /// The member readmitted to gossip and probing
        address: MemberAddress,
    },
}

impl DampingEvent {
    /// Short stable name of the event kind, for logs and test assertions
    pub fn kind(&self) -> &'static str {
        match self {
            DampingEvent::DampedLimitExceeded { .. } => "damped-limit-exceeded",
            DampingEvent::DampReqUnsatisfied { .. } => "damp-req-unsatisfied",
            DampingEvent::DampReqFailed { .. } => "damp-req-failed",
            DampingEvent::DampingInProgress { .. } => "damping-in-progress",
            DampingEvent::DampingUnconfirmed { .. } => "damping-unconfirmed",
            DampingEvent::Damped { .. } => "damped",
            DampingEvent::MemberUndamped { .. } => "member-undamped",
        }
    }
}

/// Callback interface for damping events
pub trait DampingEventSubscriber: Send + Sync {
    /// Called once per published event, on the publishing task
    fn on_event(&self, event: &DampingEvent);
}

impl<T: DampingEventSubscriber + ?Sized> DampingEventSubscriber for std::sync::Arc<T> {
    fn on_event(&self, event: &DampingEvent) {
        (**self).on_event(event);
    }
}

/// Handle returned by `Damper::subscribe`, used to unsubscribe
pub type SubscriberId = u64;
