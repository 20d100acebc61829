//! Common types for the damping subprotocol.
//!
//! Addresses are the equality key everywhere: the damper never assumes any
//! structure beyond hashing and total order. Wire types follow the damp-req
//! JSON bodies (`flappers`, `scores`, `changes`, `dampScore`).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use tokio::time::Instant;

/// Stable member identifier, a `host:port` string treated as opaque
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberAddress(pub String);

impl fmt::Display for MemberAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MemberAddress {
    fn from(addr: &str) -> Self {
        Self(addr.to_string())
    }
}

impl From<String> for MemberAddress {
    fn from(addr: String) -> Self {
        Self(addr)
    }
}

/// Member liveness as seen by the local membership table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    /// Member is reachable and participating
    Alive,

    /// Member missed a probe and is under suspicion
    Suspect,

    /// Member has been declared unreachable
    Faulty,

    /// Member is suppressed by the damping subprotocol
    Damped,
}

/// A cluster member as exposed by the membership collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Stable address of the member
    pub address: MemberAddress,

    /// Liveness status
    pub status: MemberStatus,

    /// Flap score this node maintains for the member; higher is flappier
    pub damp_score: f64,
}

/// A member the failure detector flagged as oscillating
#[derive(Debug, Clone)]
pub struct Flapper {
    /// Address of the suspected flapper
    pub address: MemberAddress,

    /// When the detector handed it to the damper
    pub observed_at: Instant,
}

impl Flapper {
    /// Flag `address` as flapping, observed now
    pub fn new(address: impl Into<MemberAddress>) -> Self {
        Self {
            address: address.into(),
            observed_at: Instant::now(),
        }
    }
}

/// Damp-req request body: the full flapper list, sent to every observer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DampReqBody {
    /// Addresses the sender wants damp scores for
    pub flappers: Vec<MemberAddress>,
}

/// One observer's score for one flapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    /// Member being scored
    pub member: MemberAddress,

    /// The observer's damp score for it
    pub damp_score: f64,
}

/// A gossiped membership update piggybacked on a damp-req response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipChange {
    /// Member the change is about
    pub address: MemberAddress,

    /// New status
    pub status: MemberStatus,

    /// Incarnation number the change was issued at
    pub incarnation: u64,
}

/// Damp-req response body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DampReqResponse {
    /// Per-flapper scores. An observer that returns a non-array here is
    /// skipped silently at decision time, so the field parses leniently
    /// instead of failing the whole response.
    #[serde(
        default,
        deserialize_with = "lenient_scores",
        skip_serializing_if = "Option::is_none"
    )]
    pub scores: Option<Vec<ScoreEntry>>,

    /// Optional piggybacked membership updates, applied on receipt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Vec<MembershipChange>>,
}

/// A successful fan-out response tagged with the responding observer
#[derive(Debug, Clone)]
pub struct ObserverScores {
    /// Observer that answered
    pub observer: MemberAddress,

    /// Its scores, or `None` if the response carried a non-array field
    pub scores: Option<Vec<ScoreEntry>>,
}

fn lenient_scores<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<ScoreEntry>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Array(entries) => Ok(Some(
            entries
                .into_iter()
                .filter_map(|entry| serde_json::from_value(entry).ok())
                .collect(),
        )),
        _ => Ok(None),
    }
}
