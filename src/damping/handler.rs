//! Receive side: answer a peer's damp-request from the local membership
//! table.

use tracing::debug;

use crate::error::{Error, Result};
use crate::membership::Membership;
use crate::types::{DampReqBody, DampReqResponse, ScoreEntry};

/// Score every flapper the peer asked about.
///
/// Members missing from the local table are omitted silently, not reported
/// as zero.
pub async fn handle_damp_req(membership: &dyn Membership, body: &DampReqBody) -> DampReqResponse {
    let mut scores = Vec::with_capacity(body.flappers.len());
    for address in &body.flappers {
        match membership.find_member_by_address(address).await {
            Some(member) => scores.push(ScoreEntry {
                member: member.address,
                damp_score: member.damp_score,
            }),
            None => debug!(%address, "damp-req names an unknown member; omitting"),
        }
    }
    DampReqResponse {
        scores: Some(scores),
        changes: None,
    }
}

/// Parse a raw damp-request body, score it, and serialize the response.
///
/// A body whose `flappers` field is missing or not an array of addresses is
/// rejected with [`Error::BadRequest`] for the transport to surface.
pub async fn handle_damp_req_raw(membership: &dyn Membership, body: &[u8]) -> Result<Vec<u8>> {
    let body: DampReqBody = serde_json::from_slice(body).map_err(|err| Error::BadRequest {
        message: format!("invalid damp-req body: {err}"),
    })?;
    let response = handle_damp_req(membership, &body).await;
    Ok(serde_json::to_vec(&response)?)
}
