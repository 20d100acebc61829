//! Fan-out semantics: exactly one outcome per round, early commit, early
//! abort, and the late-response gossip drain.

mod common;

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use gossip_damper::{
    send_damp_reqs, DampReqTransport, Error, Member, MemberStatus, Membership,
};

use common::{
    addr, member, scores_response, scores_response_with_changes, Reply, ScriptedTransport,
    StubMembership,
};

fn observer_name(i: usize) -> String {
    format!("observer{i}:1")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// For any success/failure pattern and any `1 <= r <= n`, the fan-out
    /// resolves exactly once: with `r` successes when the quorum is
    /// attainable, with `UnattainableQuorum` otherwise.
    #[test]
    fn fanout_resolves_exactly_once(
        pattern in prop::collection::vec(any::<bool>(), 1..8),
        r_seed in any::<u16>(),
    ) {
        let n = pattern.len();
        let r_val = (r_seed as usize % n) + 1;

        tokio_test::block_on(async {
            let membership = StubMembership::new();
            let transport = ScriptedTransport::new();
            let observers: Vec<Member> = pattern
                .iter()
                .enumerate()
                .map(|(i, succeeds)| {
                    let name = observer_name(i);
                    if *succeeds {
                        transport.script(
                            &name,
                            Reply::Respond(scores_response(&[("flappy:1", 10.0)])),
                        );
                    } else {
                        transport.script(&name, Reply::Fail("boom".to_string()));
                    }
                    member(&name, 0.0)
                })
                .collect();

            let result = send_damp_reqs(
                Arc::clone(&transport) as Arc<dyn DampReqTransport>,
                Arc::clone(&membership) as Arc<dyn Membership>,
                vec![addr("flappy:1")],
                observers,
                r_val,
            )
            .await;

            let attainable = pattern.iter().filter(|ok| **ok).count() >= r_val;
            match result {
                Ok(successes) => {
                    assert!(attainable, "committed without an attainable quorum");
                    // Early commit stops at exactly r successes.
                    assert_eq!(successes.len(), r_val);
                }
                Err(Error::UnattainableQuorum { r_val: reported, successes, .. }) => {
                    assert!(!attainable, "aborted an attainable quorum");
                    assert_eq!(reported, r_val);
                    assert!(successes < r_val);
                }
                Err(other) => panic!("unexpected fan-out error: {other}"),
            }
        });
    }
}

#[tokio::test(start_paused = true)]
async fn early_commit_does_not_wait_for_stragglers() {
    let membership = StubMembership::new();
    let transport = ScriptedTransport::new();
    transport.script(
        "fast:1",
        Reply::Respond(scores_response(&[("flappy:1", 10.0)])),
    );
    transport.script("slow:1", Reply::Hang);

    let successes = send_damp_reqs(
        Arc::clone(&transport) as Arc<dyn DampReqTransport>,
        Arc::clone(&membership) as Arc<dyn Membership>,
        vec![addr("flappy:1")],
        vec![member("fast:1", 0.0), member("slow:1", 0.0)],
        1,
    )
    .await
    .unwrap();

    assert_eq!(successes.len(), 1);
    assert_eq!(successes[0].observer, addr("fast:1"));
}

#[tokio::test]
async fn abort_fires_as_soon_as_the_quorum_is_unreachable() {
    let membership = StubMembership::new();
    let transport = ScriptedTransport::new();
    transport.script("a:1", Reply::Fail("connection reset".to_string()));
    transport.script("b:1", Reply::Hang);
    transport.script("c:1", Reply::Hang);

    let result = send_damp_reqs(
        Arc::clone(&transport) as Arc<dyn DampReqTransport>,
        Arc::clone(&membership) as Arc<dyn Membership>,
        vec![addr("flappy:1")],
        vec![member("a:1", 0.0), member("b:1", 0.0), member("c:1", 0.0)],
        3,
    )
    .await;

    // With r = n, one failure settles it; the hanging observers are not
    // awaited.
    match result {
        Err(Error::UnattainableQuorum { successes, errors, .. }) => {
            assert_eq!(successes, 0);
            assert_eq!(errors.len(), 1);
        }
        other => panic!("expected UnattainableQuorum, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn late_responses_still_apply_piggybacked_changes() {
    let membership = StubMembership::new();
    membership.add_member("n1:1", 0.0);
    membership.add_member("n2:1", 0.0);
    let transport = ScriptedTransport::new();
    transport.script(
        "fast:1",
        Reply::Respond(scores_response_with_changes(
            &[("flappy:1", 10.0)],
            &[("n1:1", MemberStatus::Suspect, 3)],
        )),
    );
    transport.script(
        "slow:1",
        Reply::RespondAfter(
            Duration::from_millis(10),
            scores_response_with_changes(
                &[("flappy:1", 20.0)],
                &[("n2:1", MemberStatus::Faulty, 4)],
            ),
        ),
    );

    let successes = send_damp_reqs(
        Arc::clone(&transport) as Arc<dyn DampReqTransport>,
        Arc::clone(&membership) as Arc<dyn Membership>,
        vec![addr("flappy:1")],
        vec![member("fast:1", 0.0), member("slow:1", 0.0)],
        1,
    )
    .await
    .unwrap();
    assert_eq!(successes.len(), 1);
    assert_eq!(membership.applied_updates().len(), 1);

    // The slow response lands after the round is over; its gossip is still
    // worth applying even though its scores are discarded.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(membership.applied_updates().len(), 2);
    let statuses: Vec<MemberStatus> = membership
        .applied_updates()
        .iter()
        .map(|change| change.status)
        .collect();
    assert_eq!(statuses, vec![MemberStatus::Suspect, MemberStatus::Faulty]);
}

#[tokio::test]
async fn successes_are_tagged_with_their_observer() {
    let membership = StubMembership::new();
    let transport = ScriptedTransport::new();
    transport.script(
        "a:1",
        Reply::Respond(scores_response(&[("flappy:1", 1.0)])),
    );
    transport.script(
        "b:1",
        Reply::Respond(scores_response(&[("flappy:1", 2.0)])),
    );

    let successes = send_damp_reqs(
        Arc::clone(&transport) as Arc<dyn DampReqTransport>,
        Arc::clone(&membership) as Arc<dyn Membership>,
        vec![addr("flappy:1")],
        vec![member("a:1", 0.0), member("b:1", 0.0)],
        2,
    )
    .await
    .unwrap();

    let mut observers: Vec<_> = successes.iter().map(|s| s.observer.clone()).collect();
    observers.sort();
    assert_eq!(observers, vec![addr("a:1"), addr("b:1")]);
}
