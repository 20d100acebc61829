//! Flap damping: quorum-based suppression of oscillating members.
//!
//! A member whose reachability flaps produces a storm of membership updates
//! that destabilizes every peer. This module lets the ring collectively
//! decide, via a quorum of independent observers, to suppress such a member
//! for a bounded interval and then readmit it:
//!
//! - [`FlapperSet`] / [`DampedSet`]: the controller's private bookkeeping
//! - [`fanout`]: the damp-req fan-out voting primitive
//! - [`scoring`]: quorum aggregation and the damping decision
//! - [`Damper`]: the owning state machine, timers and membership mutation
//! - [`handler`]: the receive side answering peers' damp-requests

pub mod damped_set;
pub mod damper;
pub mod events;
pub mod fanout;
pub mod flapper_set;
pub mod handler;
pub mod scoring;

pub use damped_set::DampedSet;
pub use damper::{Damper, DamperStats, RoundOutcome};
pub use events::{DampingEvent, DampingEventSubscriber, SubscriberId};
pub use fanout::send_damp_reqs;
pub use flapper_set::FlapperSet;
pub use handler::{handle_damp_req, handle_damp_req_raw};
pub use scoring::decide_damped;
