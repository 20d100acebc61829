//! Error types for the damping subprotocol.
//!
//! Every error raised inside a subprotocol round is recovered locally by the
//! damp controller; nothing here propagates out of it. Receive-side errors
//! are returned to the transport caller only.

use thiserror::Error;

use crate::types::MemberAddress;

/// Main error type for the damping subprotocol
#[derive(Error, Debug)]
pub enum Error {
    /// The damp-req fan-out can no longer reach its quorum: even if every
    /// outstanding request succeeded, fewer than `r_val` successes are
    /// attainable. Carries the per-observer failures accumulated so far.
    #[error(
        "damp-req quorum unattainable for {} flapper(s): wanted {r_val} successes, got {successes} with {} failure(s)",
        flappers.len(),
        errors.len()
    )]
    UnattainableQuorum {
        /// Flappers the aborted round was voting on
        flappers: Vec<MemberAddress>,
        /// Quorum size the round was started with
        r_val: usize,
        /// Successful responses collected before the abort
        successes: usize,
        /// Transport errors from the observers that failed
        errors: Vec<Error>,
    },

    /// Not enough observers to even attempt the configured quorum
    #[error("not enough observers for damp-req: have {observers}, need r-val {r_val}")]
    UnsatisfiableR {
        /// Observers the membership could offer
        observers: usize,
        /// Configured quorum size
        r_val: usize,
    },

    /// The cluster-wide damped fraction is at or above the configured cap
    #[error("damped member cap reached: {fraction:.3} >= {limit:.3}")]
    CapExceeded {
        /// Damped fraction reported by membership
        fraction: f64,
        /// Configured `dampedMaxPercentage`
        limit: f64,
    },

    /// Malformed damp-req body on the receive side
    #[error("bad damp-req: {message}")]
    BadRequest {
        /// Human-readable rejection reason
        message: String,
    },

    /// A single damp-request to one observer failed at the transport level
    #[error("transport error talking to {peer}: {message}")]
    Transport {
        /// Observer the request was addressed to
        peer: MemberAddress,
        /// Human-readable failure description
        message: String,
    },

    /// Configuration errors
    #[error("configuration error in {field}: {message}")]
    Config {
        /// Offending configuration key
        field: String,
        /// What was wrong with it
        message: String,
    },

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Flatten the error into the human-readable strings carried by events.
    ///
    /// `UnattainableQuorum` expands to its accumulated per-observer errors;
    /// everything else is a single line.
    pub fn detail_lines(&self) -> Vec<String> {
        match self {
            Error::UnattainableQuorum { errors, .. } if !errors.is_empty() => {
                errors.iter().map(|e| e.to_string()).collect()
            }
            other => vec![other.to_string()],
        }
    }
}
