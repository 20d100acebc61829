//! Shared stubs for the integration tests: an in-memory membership table,
//! a scripted damp-req transport, and an event recorder.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;

use gossip_damper::{
    DampReqBody, DampReqResponse, DampReqTransport, DampingEvent, DampingEventSubscriber, Error,
    Member, MemberAddress, MemberStatus, Membership, MembershipChange, Result, ScoreEntry,
};

/// In-memory membership stub. Tracks every write the damper performs.
#[derive(Default)]
pub struct StubMembership {
    members: Mutex<HashMap<MemberAddress, Member>>,
    damped_percentage_override: Mutex<Option<f64>>,
    make_damped_calls: Mutex<Vec<MemberAddress>>,
    updates: Mutex<Vec<MembershipChange>>,
}

impl StubMembership {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A table of alive members with the given damp scores
    pub fn with_members(members: &[(&str, f64)]) -> Arc<Self> {
        let stub = Self::new();
        for (address, damp_score) in members {
            stub.add_member(address, *damp_score);
        }
        stub
    }

    pub fn add_member(&self, address: &str, damp_score: f64) {
        let address = MemberAddress::from(address);
        self.members.lock().unwrap().insert(
            address.clone(),
            Member {
                address,
                status: MemberStatus::Alive,
                damp_score,
            },
        );
    }

    /// Force `get_damped_percentage` to a fixed value
    pub fn set_damped_percentage(&self, fraction: f64) {
        *self.damped_percentage_override.lock().unwrap() = Some(fraction);
    }

    /// Every address `make_damped` was called with, in call order
    pub fn make_damped_calls(&self) -> Vec<MemberAddress> {
        self.make_damped_calls.lock().unwrap().clone()
    }

    /// Every piggybacked change `update` received, flattened in call order
    pub fn applied_updates(&self) -> Vec<MembershipChange> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl Membership for StubMembership {
    async fn get_random_pingable_members(
        &self,
        n: usize,
        excluding: &[MemberAddress],
    ) -> Vec<Member> {
        let members = self.members.lock().unwrap();
        let mut pingable: Vec<Member> = members
            .values()
            .filter(|m| m.status == MemberStatus::Alive && !excluding.contains(&m.address))
            .cloned()
            .collect();
        pingable.shuffle(&mut rand::thread_rng());
        pingable.truncate(n);
        pingable
    }

    async fn find_member_by_address(&self, address: &MemberAddress) -> Option<Member> {
        self.members.lock().unwrap().get(address).cloned()
    }

    async fn make_damped(&self, address: &MemberAddress) {
        self.make_damped_calls.lock().unwrap().push(address.clone());
        if let Some(member) = self.members.lock().unwrap().get_mut(address) {
            member.status = MemberStatus::Damped;
        }
    }

    async fn update(&self, changes: &[MembershipChange]) {
        self.updates.lock().unwrap().extend(changes.iter().cloned());
        let mut members = self.members.lock().unwrap();
        for change in changes {
            if let Some(member) = members.get_mut(&change.address) {
                member.status = change.status;
            }
        }
    }

    async fn get_damped_percentage(&self) -> f64 {
        if let Some(fraction) = *self.damped_percentage_override.lock().unwrap() {
            return fraction;
        }
        let members = self.members.lock().unwrap();
        if members.is_empty() {
            return 0.0;
        }
        let damped = members
            .values()
            .filter(|m| m.status == MemberStatus::Damped)
            .count();
        damped as f64 / members.len() as f64
    }
}

/// What a scripted observer does with a damp-request
#[derive(Clone)]
pub enum Reply {
    /// Respond immediately
    Respond(DampReqResponse),
    /// Respond after a delay
    RespondAfter(Duration, DampReqResponse),
    /// Fail immediately with a transport error
    Fail(String),
    /// Never respond
    Hang,
}

/// Damp-req transport driven by a per-observer script
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<MemberAddress, Reply>>,
    default_reply: Mutex<Option<Reply>>,
    calls: Mutex<Vec<(MemberAddress, DampReqBody)>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, address: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert(MemberAddress::from(address), reply);
    }

    /// Reply used for any observer without a specific script
    pub fn script_default(&self, reply: Reply) {
        *self.default_reply.lock().unwrap() = Some(reply);
    }

    /// Every damp-request sent, in dispatch order
    pub fn calls(&self) -> Vec<(MemberAddress, DampReqBody)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DampReqTransport for ScriptedTransport {
    async fn damp_req(&self, target: &Member, body: DampReqBody) -> Result<DampReqResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((target.address.clone(), body));
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(&target.address)
            .cloned()
            .or_else(|| self.default_reply.lock().unwrap().clone());
        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::RespondAfter(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Some(Reply::Fail(message)) => Err(Error::Transport {
                peer: target.address.clone(),
                message,
            }),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(Error::Transport {
                peer: target.address.clone(),
                message: "unscripted observer".to_string(),
            }),
        }
    }
}

/// Records every published damping event
#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<DampingEvent>>,
}

impl EventRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<DampingEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.kind()).collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.kinds().iter().filter(|k| **k == kind).count()
    }
}

impl DampingEventSubscriber for EventRecorder {
    fn on_event(&self, event: &DampingEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Response carrying the given member scores
pub fn scores_response(scores: &[(&str, f64)]) -> DampReqResponse {
    DampReqResponse {
        scores: Some(
            scores
                .iter()
                .map(|(member, damp_score)| ScoreEntry {
                    member: MemberAddress::from(*member),
                    damp_score: *damp_score,
                })
                .collect(),
        ),
        changes: None,
    }
}

/// Response carrying scores plus piggybacked membership changes
pub fn scores_response_with_changes(
    scores: &[(&str, f64)],
    changes: &[(&str, MemberStatus, u64)],
) -> DampReqResponse {
    let mut response = scores_response(scores);
    response.changes = Some(
        changes
            .iter()
            .map(|(address, status, incarnation)| MembershipChange {
                address: MemberAddress::from(*address),
                status: *status,
                incarnation: *incarnation,
            })
            .collect(),
    );
    response
}

pub fn addr(address: &str) -> MemberAddress {
    MemberAddress::from(address)
}

pub fn member(address: &str, damp_score: f64) -> Member {
    Member {
        address: MemberAddress::from(address),
        status: MemberStatus::Alive,
        damp_score,
    }
}
