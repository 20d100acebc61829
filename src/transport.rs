//! Damp-req transport interface.
//!
//! RPC framing and the wire transport live outside this crate; the fan-out
//! only needs a way to send one damp-request to one observer and get its
//! response or a transport error back.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{DampReqBody, DampReqResponse, Member};

/// Outgoing damp-request channel to a single observer
#[async_trait]
pub trait DampReqTransport: Send + Sync {
    /// Send one damp-request and await the observer's response.
    ///
    /// Requests to distinct observers are dispatched concurrently by the
    /// fan-out; an implementation must not serialize them against each other.
    async fn damp_req(&self, target: &Member, body: DampReqBody) -> Result<DampReqResponse>;
}
