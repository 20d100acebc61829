//! Damp-req fan-out: the one-shot voting primitive.
//!
//! One damp-request goes to every observer in parallel; responses are
//! consumed in arrival order. The round commits the moment `r_val` successes
//! are in, and aborts the moment the quorum becomes unattainable. Either
//! way the caller gets exactly one outcome: both terminal paths return from
//! the single consuming loop, so a double callback cannot be expressed.
//!
//! Piggybacked membership changes are applied on every successful response,
//! including responses that arrive after the outcome is decided; those are
//! drained on a background task whose only effect is `Membership::update`.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::membership::Membership;
use crate::transport::DampReqTransport;
use crate::types::{DampReqBody, DampReqResponse, Member, MemberAddress, ObserverScores};

/// Fan a damp-request out to `observers` and await the quorum outcome.
///
/// Callers must pass `1 <= r_val <= observers.len()`; the damp controller
/// clamps `r_val` and skips the round otherwise. Each success is tagged with
/// the responding observer's address for diagnostics.
pub async fn send_damp_reqs(
    transport: Arc<dyn DampReqTransport>,
    membership: Arc<dyn Membership>,
    flapper_addrs: Vec<MemberAddress>,
    observers: Vec<Member>,
    r_val: usize,
) -> Result<Vec<ObserverScores>> {
    let n = observers.len();
    debug!(
        observers = n,
        r_val,
        flappers = flapper_addrs.len(),
        "fanning out damp-req"
    );

    let mut in_flight: FuturesUnordered<_> = observers
        .into_iter()
        .map(|observer| {
            let transport = Arc::clone(&transport);
            let body = DampReqBody {
                flappers: flapper_addrs.clone(),
            };
            async move {
                let result = transport.damp_req(&observer, body).await;
                (observer, result)
            }
        })
        .collect();

    let mut successes: Vec<ObserverScores> = Vec::new();
    let mut errors: Vec<Error> = Vec::new();

    while let Some((observer, result)) = in_flight.next().await {
        match result {
            Ok(response) => {
                apply_piggyback(membership.as_ref(), &observer.address, &response).await;
                debug!(observer = %observer.address, "damp-req success");
                successes.push(ObserverScores {
                    observer: observer.address,
                    scores: response.scores,
                });
                if successes.len() >= r_val {
                    drain_remaining(in_flight, membership);
                    return Ok(successes);
                }
            }
            Err(error) => {
                warn!(observer = %observer.address, %error, "damp-req failed");
                errors.push(error);
            }
        }

        // Abort as soon as the quorum is out of reach even if every
        // outstanding request were to succeed.
        let remaining = n - (successes.len() + errors.len());
        if remaining + successes.len() < r_val {
            drain_remaining(in_flight, membership);
            return Err(Error::UnattainableQuorum {
                flappers: flapper_addrs,
                r_val,
                successes: successes.len(),
                errors,
            });
        }
    }

    // Only reachable when there was nothing to wait for (no observers).
    Err(Error::UnattainableQuorum {
        flappers: flapper_addrs,
        r_val,
        successes: successes.len(),
        errors,
    })
}

async fn apply_piggyback(
    membership: &dyn Membership,
    observer: &MemberAddress,
    response: &DampReqResponse,
) {
    if let Some(changes) = &response.changes {
        if !changes.is_empty() {
            debug!(observer = %observer, changes = changes.len(), "applying piggybacked changes");
            membership.update(changes).await;
        }
    }
}

/// Keep consuming responses after the round is decided; late successes still
/// carry gossip worth applying, everything else is dropped.
fn drain_remaining<F>(mut in_flight: FuturesUnordered<F>, membership: Arc<dyn Membership>)
where
    F: std::future::Future<Output = (Member, Result<DampReqResponse>)> + Send + 'static,
{
    if in_flight.is_empty() {
        return;
    }
    tokio::spawn(async move {
        while let Some((observer, result)) = in_flight.next().await {
            match result {
                Ok(response) => {
                    apply_piggyback(membership.as_ref(), &observer.address, &response).await;
                    debug!(observer = %observer.address, "late damp-req response discarded");
                }
                Err(error) => {
                    debug!(observer = %observer.address, %error, "late damp-req failure discarded");
                }
            }
        }
    });
}
