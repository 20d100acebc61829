//! The damp controller: owns the flapper and damped sets, drives the
//! subprotocol timer, applies damping to membership, and releases damped
//! members after their suppress duration.
//!
//! One logical round at a time: the damp timer is a single-shot re-armed
//! after the round completes, never a fixed periodic interval, so rounds
//! cannot overlap. Cancellation follows the usual pattern here: stopping a
//! timer flips its enabled flag and pokes the cancel [`Notify`]; an
//! in-flight round is never interrupted, it just finds the flag down when
//! it would re-arm.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::DampingConfig;
use crate::damping::damped_set::DampedSet;
use crate::damping::events::{DampingEvent, DampingEventSubscriber, SubscriberId};
use crate::damping::flapper_set::FlapperSet;
use crate::damping::{fanout, scoring};
use crate::membership::Membership;
use crate::transport::DampReqTransport;
use crate::types::{Flapper, MemberAddress};

/// How a subprotocol round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// At least one flapper was committed to the damped set
    Damped,

    /// The quorum was reached but the decision was empty
    Unconfirmed,

    /// The fan-out could not reach its quorum
    Failed,

    /// The round was skipped before fanning out: cap exceeded or not
    /// enough observers. Skipped rounds do not re-arm the damp timer.
    Skipped,

    /// Another round was already in flight; nothing was started
    InProgress,

    /// The flapper set was empty; nothing to vote on
    Idle,
}

/// Counters and gauges describing the damper's lifetime activity
#[derive(Debug, Clone, Default)]
pub struct DamperStats {
    pub flapper_count: usize,
    pub damped_count: usize,
    pub damp_timer_enabled: bool,
    pub expiration_timer_enabled: bool,
    pub rounds_initiated: u64,
    pub rounds_damped: u64,
    pub rounds_unconfirmed: u64,
    pub rounds_failed: u64,
    pub rounds_skipped: u64,
    pub members_damped: u64,
    pub members_undamped: u64,
}

#[derive(Debug, Default)]
struct RoundCounters {
    rounds_initiated: u64,
    rounds_damped: u64,
    rounds_unconfirmed: u64,
    rounds_failed: u64,
    rounds_skipped: u64,
    members_damped: u64,
    members_undamped: u64,
}

struct DamperState {
    flappers: FlapperSet,
    damped: DampedSet,
    damp_timer_enabled: bool,
    expiration_timer_enabled: bool,
    round_in_flight: bool,
    counters: RoundCounters,
}

struct DamperInner {
    config: DampingConfig,
    membership: Arc<dyn Membership>,
    transport: Arc<dyn DampReqTransport>,
    state: Mutex<DamperState>,
    subscribers: parking_lot::RwLock<Vec<(SubscriberId, Box<dyn DampingEventSubscriber>)>>,
    next_subscriber_id: AtomicU64,
    damp_timer_cancel: Notify,
    expiration_cancel: Notify,
}

/// The damping state machine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Damper {
    inner: Arc<DamperInner>,
}

impl Damper {
    /// Create a damper over the given membership and transport.
    /// Fails if the configuration is unusable.
    pub fn new(
        config: DampingConfig,
        membership: Arc<dyn Membership>,
        transport: Arc<dyn DampReqTransport>,
    ) -> crate::error::Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(DamperInner {
                config,
                membership,
                transport,
                state: Mutex::new(DamperState {
                    flappers: FlapperSet::new(),
                    damped: DampedSet::new(),
                    damp_timer_enabled: false,
                    expiration_timer_enabled: false,
                    round_in_flight: false,
                    counters: RoundCounters::default(),
                }),
                subscribers: parking_lot::RwLock::new(Vec::new()),
                next_subscriber_id: AtomicU64::new(1),
                damp_timer_cancel: Notify::new(),
                expiration_cancel: Notify::new(),
            }),
        })
    }

    /// Track a suspected flapper. Idempotent: addresses already tracked or
    /// already damped are ignored. The first tracked flapper starts the
    /// damp timer.
    pub async fn add_flapper(&self, flapper: Flapper) {
        let mut state = self.inner.state.lock().await;
        if state.damped.contains(&flapper.address) {
            debug!(address = %flapper.address, "ignoring flapper that is already damped");
            return;
        }
        if !state.flappers.add(flapper.clone()) {
            debug!(address = %flapper.address, "ignoring flapper that is already tracked");
            return;
        }
        info!(address = %flapper.address, tracked = state.flappers.len(), "tracking flapper");
        if state.flappers.len() == 1 {
            self.start_damp_timer(&mut state);
        }
    }

    /// Stop tracking a flapper. Idempotent: unknown addresses are ignored.
    /// When the set empties the damp timer is cancelled.
    pub async fn remove_flapper(&self, address: &MemberAddress) {
        let mut state = self.inner.state.lock().await;
        if state.flappers.remove(address).is_none() {
            debug!(%address, "ignoring removal of unknown flapper");
            return;
        }
        info!(%address, tracked = state.flappers.len(), "stopped tracking flapper");
        if state.flappers.is_empty() {
            self.stop_damp_timer(&mut state);
        }
    }

    /// Number of tracked flappers
    pub async fn flapper_count(&self) -> usize {
        self.inner.state.lock().await.flappers.len()
    }

    /// Snapshot of the tracked flapper addresses
    pub async fn flapper_addresses(&self) -> Vec<MemberAddress> {
        self.inner.state.lock().await.flappers.addresses()
    }

    /// Number of damped entries
    pub async fn damped_count(&self) -> usize {
        self.inner.state.lock().await.damped.len()
    }

    /// Snapshot of the damped addresses
    pub async fn damped_addresses(&self) -> Vec<MemberAddress> {
        self.inner.state.lock().await.damped.addresses()
    }

    /// Whether the address is currently damped by this node
    pub async fn is_damped(&self, address: &MemberAddress) -> bool {
        self.inner.state.lock().await.damped.contains(address)
    }

    /// Cluster-wide damped fraction, as reported by membership
    pub async fn damped_percentage(&self) -> f64 {
        self.inner.membership.get_damped_percentage().await
    }

    /// Snapshot of the damper's counters and timer gauges
    pub async fn stats(&self) -> DamperStats {
        let state = self.inner.state.lock().await;
        DamperStats {
            flapper_count: state.flappers.len(),
            damped_count: state.damped.len(),
            damp_timer_enabled: state.damp_timer_enabled,
            expiration_timer_enabled: state.expiration_timer_enabled,
            rounds_initiated: state.counters.rounds_initiated,
            rounds_damped: state.counters.rounds_damped,
            rounds_unconfirmed: state.counters.rounds_unconfirmed,
            rounds_failed: state.counters.rounds_failed,
            rounds_skipped: state.counters.rounds_skipped,
            members_damped: state.counters.members_damped,
            members_undamped: state.counters.members_undamped,
        }
    }

    /// Register an event subscriber
    pub fn subscribe(&self, subscriber: Box<dyn DampingEventSubscriber>) -> SubscriberId {
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.write().push((id, subscriber));
        id
    }

    /// Remove a subscriber. Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.inner.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Tear both timers down. In-flight fan-outs drain in the background;
    /// their continuations find the timers disabled and do nothing.
    pub async fn stop(&self) {
        info!("stopping damper");
        let mut state = self.inner.state.lock().await;
        state.damp_timer_enabled = false;
        state.expiration_timer_enabled = false;
        drop(state);
        self.inner.damp_timer_cancel.notify_waiters();
        self.inner.expiration_cancel.notify_waiters();
    }

    /// Run one subprotocol round against the currently tracked flappers.
    ///
    /// Normally driven by the damp timer, public so operators and tests can
    /// force a round. All errors are recovered here; the outcome reports
    /// how the round ended.
    pub async fn initiate_subprotocol(&self) -> RoundOutcome {
        let flapper_addrs = {
            let mut state = self.inner.state.lock().await;
            if state.round_in_flight {
                let flappers = state.flappers.addresses();
                drop(state);
                debug!("subprotocol round already in flight");
                self.publish(DampingEvent::DampingInProgress { flappers });
                return RoundOutcome::InProgress;
            }
            if state.flappers.is_empty() {
                return RoundOutcome::Idle;
            }
            state.round_in_flight = true;
            state.counters.rounds_initiated += 1;
            state.flappers.addresses()
        };

        let outcome = self.run_round(flapper_addrs).await;

        let mut state = self.inner.state.lock().await;
        state.round_in_flight = false;
        match outcome {
            RoundOutcome::Damped => state.counters.rounds_damped += 1,
            RoundOutcome::Unconfirmed => state.counters.rounds_unconfirmed += 1,
            RoundOutcome::Failed => state.counters.rounds_failed += 1,
            RoundOutcome::Skipped => state.counters.rounds_skipped += 1,
            RoundOutcome::InProgress | RoundOutcome::Idle => {}
        }
        outcome
    }

    async fn run_round(&self, flapper_addrs: Vec<MemberAddress>) -> RoundOutcome {
        let config = &self.inner.config;

        // The cluster cap is evaluated once per initiation, not per member.
        let fraction = self.inner.membership.get_damped_percentage().await;
        if fraction >= config.damped_max_percentage {
            warn!(
                fraction,
                limit = config.damped_max_percentage,
                "damped member cap reached; skipping round"
            );
            self.publish(DampingEvent::DampedLimitExceeded {
                flappers: flapper_addrs,
                damped_fraction: fraction,
                limit: config.damped_max_percentage,
            });
            return RoundOutcome::Skipped;
        }

        let observers = self
            .inner
            .membership
            .get_random_pingable_members(config.damp_req_n_val, &flapper_addrs)
            .await;
        let r_val = config.damp_req_r_val.min(observers.len());
        if r_val == 0 {
            warn!(
                wanted = config.damp_req_n_val,
                "no pingable observers for damp-req; skipping round"
            );
            self.publish(DampingEvent::DampReqUnsatisfied {
                flappers: flapper_addrs,
                observers: observers.len(),
                r_val: config.damp_req_r_val,
            });
            return RoundOutcome::Skipped;
        }

        let observer_addrs: Vec<MemberAddress> =
            observers.iter().map(|m| m.address.clone()).collect();

        let successes = match fanout::send_damp_reqs(
            Arc::clone(&self.inner.transport),
            Arc::clone(&self.inner.membership),
            flapper_addrs.clone(),
            observers,
            r_val,
        )
        .await
        {
            Ok(successes) => successes,
            Err(error) => {
                warn!(%error, "damp-req fan-out failed");
                self.publish(DampingEvent::DampReqFailed {
                    flappers: flapper_addrs,
                    r_val,
                    errors: error.detail_lines(),
                });
                return RoundOutcome::Failed;
            }
        };

        let decision =
            scoring::decide_damped(&successes, r_val, config.damp_scoring_suppress_limit);
        if decision.is_empty() {
            info!(
                responses = successes.len(),
                "damping inconclusive; no flapper met the suppress criteria"
            );
            self.publish(DampingEvent::DampingUnconfirmed {
                flappers: flapper_addrs,
                observers: observer_addrs,
                r_val,
                results: successes,
            });
            return RoundOutcome::Unconfirmed;
        }

        for address in &decision {
            self.inner.membership.make_damped(address).await;

            let mut state = self.inner.state.lock().await;
            state.flappers.remove(address);
            if state.damped.commit(address.clone(), Instant::now()) {
                state.counters.members_damped += 1;
                self.start_expiration_timer(&mut state);
            } else {
                debug!(%address, "member was already damped");
            }
            if state.flappers.is_empty() {
                self.stop_damp_timer(&mut state);
            }
            drop(state);

            info!(%address, "damped member");
            self.publish(DampingEvent::Damped {
                address: address.clone(),
                r_val,
                results: successes.clone(),
            });
        }
        RoundOutcome::Damped
    }

    fn publish(&self, event: DampingEvent) {
        debug!(kind = event.kind(), "publishing damping event");
        for (_, subscriber) in self.inner.subscribers.read().iter() {
            subscriber.on_event(&event);
        }
    }

    fn start_damp_timer(&self, state: &mut MutexGuard<'_, DamperState>) {
        if state.damp_timer_enabled {
            debug!("damp timer already enabled");
            return;
        }
        state.damp_timer_enabled = true;
        info!(
            interval_ms = self.inner.config.damp_timer_interval,
            "starting damp timer"
        );
        tokio::spawn(damp_timer_loop(self.clone()));
    }

    fn stop_damp_timer(&self, state: &mut MutexGuard<'_, DamperState>) {
        if !state.damp_timer_enabled {
            return;
        }
        state.damp_timer_enabled = false;
        info!("stopping damp timer");
        self.inner.damp_timer_cancel.notify_waiters();
    }

    fn start_expiration_timer(&self, state: &mut MutexGuard<'_, DamperState>) {
        if state.expiration_timer_enabled {
            debug!("expiration timer already armed");
            return;
        }
        state.expiration_timer_enabled = true;
        info!(
            interval_ms = self.inner.config.damped_member_expiration_interval,
            "starting damped member expiration timer"
        );
        tokio::spawn(expiration_loop(self.clone()));
    }

    async fn damp_timer_enabled(&self) -> bool {
        self.inner.state.lock().await.damp_timer_enabled
    }
}

/// Single-shot damp timer, re-armed after each round's completion callback.
///
/// A skipped round (cap exceeded, no observers) does not invoke the outer
/// completion and therefore does not re-arm: the chain stalls until the
/// flapper set empties and refills.
async fn damp_timer_loop(damper: Damper) {
    let interval = damper.inner.config.damp_timer_interval();
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = damper.inner.damp_timer_cancel.notified() => break,
        }
        if !damper.damp_timer_enabled().await {
            break;
        }
        let outcome = damper.initiate_subprotocol().await;
        if !damper.damp_timer_enabled().await {
            break;
        }
        match outcome {
            RoundOutcome::Skipped => {
                debug!("skipped round does not re-arm the damp timer");
                break;
            }
            RoundOutcome::Idle => break,
            _ => {}
        }
    }
    debug!("damp timer loop ended");
}

/// Periodic expiration scan; cancels itself once the damped set empties.
async fn expiration_loop(damper: Damper) {
    let interval = damper.inner.config.expiration_interval();
    let suppress_duration = damper.inner.config.suppress_duration();
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = damper.inner.expiration_cancel.notified() => break,
        }

        let mut state = damper.inner.state.lock().await;
        if !state.expiration_timer_enabled {
            break;
        }
        let released = state.damped.expire(Instant::now(), suppress_duration);
        state.counters.members_undamped += released.len() as u64;
        let emptied = state.damped.is_empty();
        if emptied {
            state.expiration_timer_enabled = false;
        }
        drop(state);

        for address in released {
            info!(%address, "suppress duration elapsed; member released");
            damper.publish(DampingEvent::MemberUndamped { address });
        }
        if emptied {
            break;
        }
    }
    debug!("expiration timer loop ended");
}
