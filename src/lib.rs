//! # gossip-damper: flap damping for SWIM-style cluster membership
//!
//! In a gossip-based membership ring, a member whose reachability oscillates
//! ("flaps") floods every peer with alive/suspect/faulty churn. This crate
//! implements the damping subprotocol that lets the ring collectively
//! suppress such a member for a bounded interval — excluding it from
//! dissemination and pinging — and automatically readmit it afterwards.
//!
//! ## Architecture
//!
//! ```text
//! Damping Subprotocol
//! ├── Damp Controller (Damper)
//! │   ├── Flapper Set        suspected flappers under tracking
//! │   ├── Damped Set         committed suppressions + expiration
//! │   ├── Damp Timer         single-shot, re-armed per round
//! │   └── Expiration Timer   releases entries after suppress duration
//! ├── Damp-Req Fan-out       parallel voting RPCs, early commit/abort
//! ├── Scoring & Decision     unanimous quorum at the suppress limit
//! └── Receive-Side Handler   scores peers' flappers from local membership
//! ```
//!
//! The failure detector that *finds* flappers, the membership table, and the
//! wire transport are collaborators consumed through the [`Membership`] and
//! [`DampReqTransport`] traits; this crate owns only the damping state
//! machine.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gossip_damper::{Damper, DampingConfig, Flapper};
//!
//! let damper = Damper::new(DampingConfig::default(), membership, transport)?;
//! damper.add_flapper(Flapper::new("10.0.0.7:7946")).await;
//! // The damp timer now fans damp-requests out each tick; once a quorum of
//! // observers unanimously votes above the suppress limit, the member is
//! // damped and later released automatically.
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all)]

pub mod config;
pub mod damping;
pub mod error;
pub mod membership;
pub mod transport;
pub mod types;

// Re-export main components
pub use damping::{
    decide_damped, handle_damp_req, handle_damp_req_raw, send_damp_reqs, Damper, DamperStats,
    DampingEvent, DampingEventSubscriber, RoundOutcome, SubscriberId,
};

// Configuration and common types
pub use config::DampingConfig;
pub use error::{Error, Result};
pub use membership::Membership;
pub use transport::DampReqTransport;
pub use types::{
    DampReqBody, DampReqResponse, Flapper, Member, MemberAddress, MemberStatus, MembershipChange,
    ObserverScores, ScoreEntry,
};
