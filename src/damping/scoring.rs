//! Quorum scoring: turn aggregated damp-req responses into a damping
//! decision.

use std::collections::HashMap;

use crate::types::{MemberAddress, ObserverScores};

/// Decide which flappers to damp from the successful fan-out responses.
///
/// Scores are grouped per member across all responses; a member is damped
/// iff at least `r_val` observers reported on it and every reported score
/// is at or above `suppress_limit`. Requiring unanimity within the quorum
/// is deliberately conservative: a false positive excludes a correct node
/// from dissemination, which hurts more than a delayed true positive.
///
/// Responses whose scores field was not an array (`scores: None`) are
/// skipped silently. The result is deterministic with respect to the
/// multiset of responses; its order is unspecified.
pub fn decide_damped(
    successes: &[ObserverScores],
    r_val: usize,
    suppress_limit: f64,
) -> Vec<MemberAddress> {
    let mut grouped: HashMap<&MemberAddress, Vec<f64>> = HashMap::new();
    for response in successes {
        let Some(scores) = &response.scores else {
            continue;
        };
        for entry in scores {
            grouped.entry(&entry.member).or_default().push(entry.damp_score);
        }
    }

    grouped
        .into_iter()
        .filter(|(_, scores)| {
            scores.len() >= r_val && scores.iter().all(|score| *score >= suppress_limit)
        })
        .map(|(address, _)| address.clone())
        .collect()
}
