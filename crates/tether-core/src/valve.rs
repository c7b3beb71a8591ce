//! Broadcast propagation groups.
//!
//! A [`Valve`] relays payloads among a group of weakly observed
//! [`Bindable`]s: when one member's produce-side event fires, every other
//! live member that can consume the payload receives it. A [`StateValve`]
//! additionally remembers the last payload it propagated and drops
//! duplicates before any consumer is touched — the property that breaks
//! A→B→A rebroadcast ping-pong between bound objects.
//!
//! # Invariants
//!
//! 1. Iterating a valve never yields a reclaimed bindable; reclaimed
//!    entries are removed as a side effect of iteration.
//! 2. Deliveries never interleave: pushes from different producers are
//!    serialized by a per-valve gate. The gate is re-entrant for the
//!    owning thread, so a synchronous cascade (consumer write → native
//!    change notification → nested push) unwinds through the duplicate
//!    check instead of deadlocking.
//! 3. A member that refuses a payload is skipped with a named outcome;
//!    a member that panics is caught and reported; neither aborts
//!    delivery to the remaining members.
//! 4. Disposal drops every producer subscription, fires a one-shot
//!    disposing notification, and is idempotent; later operations fail
//!    with [`ValveError::Disposed`].
//!
//! The plain valve has no cycle protection by itself; wire a
//! [`StateValve`] (as fixtures do) when members echo writes back as
//! change notifications.

use core::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, Weak};
use std::thread::{self, ThreadId};

use thiserror::Error;
use tether_path::Path;

use crate::bindable::{BindOutcome, Bindable, Object};
use crate::broadcast::{Broadcaster, Subscription};
use crate::lock;
use crate::value::{Payload, Value, payload_eq};

/// Lifetime violations: using a valve after disposal is a programming
/// error, distinct from the expected refusals of [`BindOutcome`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValveError {
    /// The valve has been disposed; no further membership or propagation.
    #[error("valve has been disposed")]
    Disposed,
}

/// What a push did.
#[derive(Clone, Debug, PartialEq)]
pub enum PushOutcome {
    /// The payload equals the last propagated one; no consumer was
    /// touched. Only a [`StateValve`] produces this.
    Unchanged,
    /// The payload was offered to the group.
    Delivered(DeliveryReport),
}

impl PushOutcome {
    /// Whether at least one member accepted the payload.
    #[must_use]
    pub fn accepted_any(&self) -> bool {
        matches!(self, Self::Delivered(report) if report.accepted > 0)
    }
}

/// Per-push accounting: every skip is a named, observable outcome.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeliveryReport {
    /// Members that consumed the payload.
    pub accepted: usize,
    /// Members that refused, with the refusal reason.
    pub skipped: Vec<Skip>,
}

/// One member's refusal during a delivery.
#[derive(Clone, Debug, PartialEq)]
pub struct Skip {
    /// The refusing member's (relative) path.
    pub path: Path,
    /// Why it refused.
    pub outcome: BindOutcome,
}

// ---------------------------------------------------------------------------
// Delivery gate
// ---------------------------------------------------------------------------

/// Serializes deliveries per valve, re-entrant for the owning thread.
struct DeliveryGate {
    state: Mutex<GateState>,
    released: Condvar,
}

#[derive(Default)]
struct GateState {
    owner: Option<ThreadId>,
    depth: usize,
}

impl DeliveryGate {
    fn new() -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            released: Condvar::new(),
        }
    }

    fn enter(&self) -> GateGuard<'_> {
        let me = thread::current().id();
        let mut state = lock(&self.state);
        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    break;
                }
                Some(owner) if owner == me => {
                    state.depth += 1;
                    break;
                }
                Some(_) => {
                    state = self
                        .released
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        GateGuard { gate: self }
    }
}

struct GateGuard<'a> {
    gate: &'a DeliveryGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        let mut state = lock(&self.gate.state);
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.gate.released.notify_one();
        }
    }
}

// ---------------------------------------------------------------------------
// Valve
// ---------------------------------------------------------------------------

/// Where an inbound producer event lands. The plain valve pushes straight
/// through; the state valve routes through its duplicate check first.
trait PushSink: Send + Sync {
    fn push_from(&self, source: &Weak<dyn Bindable>, payload: &Payload);
}

struct Member {
    bindable: Weak<dyn Bindable>,
    path: Path,
    _subscription: Option<Subscription>,
}

/// An unordered, prune-on-iterate broadcast group of weakly observed
/// bindables.
pub struct Valve {
    weak_self: Weak<Valve>,
    members: Mutex<Vec<Member>>,
    gate: DeliveryGate,
    disposed: AtomicBool,
    disposing: Broadcaster<()>,
}

impl Valve {
    /// A fresh group. Valves live behind `Arc` so producer subscriptions
    /// can point back at them without owning them.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            weak_self: weak.clone(),
            ..Self::unmanaged()
        })
    }

    /// A valve embedded in another propagation unit; its inbound events
    /// are routed by that unit, never by `weak_self`.
    fn unmanaged() -> Self {
        Self {
            weak_self: Weak::new(),
            members: Mutex::new(Vec::new()),
            gate: DeliveryGate::new(),
            disposed: AtomicBool::new(false),
            disposing: Broadcaster::new(),
        }
    }

    /// Add a member.
    ///
    /// The valve observes it weakly; if it can produce, the valve also
    /// subscribes to its broadcast so inbound native change notifications
    /// feed [`Valve::push`].
    ///
    /// # Errors
    ///
    /// [`ValveError::Disposed`] after disposal.
    pub fn add(&self, bindable: &Arc<dyn Bindable>) -> Result<(), ValveError> {
        let sink: Weak<dyn PushSink> = self.weak_self.clone();
        self.add_with_sink(bindable, sink)
    }

    fn add_with_sink(
        &self,
        bindable: &Arc<dyn Bindable>,
        sink: Weak<dyn PushSink>,
    ) -> Result<(), ValveError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(ValveError::Disposed);
        }
        let subscription = if bindable.capabilities().produces() {
            bindable.broadcast().map(|broadcast| {
                let source = Arc::downgrade(bindable);
                broadcast.subscribe(move |payload: &Payload| {
                    if let Some(sink) = sink.upgrade() {
                        sink.push_from(&source, payload);
                    }
                })
            })
        } else {
            None
        };
        lock(&self.members).push(Member {
            bindable: Arc::downgrade(bindable),
            path: bindable.path().clone(),
            _subscription: subscription,
        });
        Ok(())
    }

    /// The live members, pruning reclaimed entries as a side effect.
    #[must_use]
    pub fn members(&self) -> Vec<Arc<dyn Bindable>> {
        let mut members = lock(&self.members);
        members.retain(|member| member.bindable.strong_count() > 0);
        members
            .iter()
            .filter_map(|member| member.bindable.upgrade())
            .collect()
    }

    /// Number of live members, pruning as a side effect.
    #[must_use]
    pub fn len(&self) -> usize {
        let mut members = lock(&self.members);
        members.retain(|member| member.bindable.strong_count() > 0);
        members.len()
    }

    /// Whether no live member remains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offer `payload` to every live member other than `source`.
    ///
    /// Refusing members are skipped with named outcomes; a panicking
    /// member is caught, reported, and recorded as
    /// [`BindOutcome::Faulted`]. Delivery is serialized by the valve's
    /// gate.
    ///
    /// # Errors
    ///
    /// [`ValveError::Disposed`] after disposal.
    pub fn push(
        &self,
        source: Option<&Arc<dyn Bindable>>,
        payload: &Payload,
    ) -> Result<PushOutcome, ValveError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(ValveError::Disposed);
        }
        let _gate = self.gate.enter();
        Ok(PushOutcome::Delivered(self.deliver(source, payload)))
    }

    fn deliver(&self, source: Option<&Arc<dyn Bindable>>, payload: &Payload) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for member in self.members() {
            if source.is_some_and(|source| Arc::ptr_eq(&member, source)) {
                continue;
            }
            let outcome = match catch_unwind(AssertUnwindSafe(|| member.try_consume(payload))) {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(path = %member.path(), "consumer panicked during delivery");
                    BindOutcome::Faulted
                }
            };
            if outcome.handled() {
                report.accepted += 1;
            } else {
                report.skipped.push(Skip {
                    path: member.path().clone(),
                    outcome,
                });
            }
        }
        report
    }

    /// The one-shot notification fired when the valve is disposed.
    #[must_use]
    pub fn on_disposing(&self) -> &Broadcaster<()> {
        &self.disposing
    }

    /// Whether [`Valve::dispose`] has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Drop all members (and with them every producer subscription) and
    /// fire the disposing notification. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        lock(&self.members).clear();
        self.disposing.emit(&());
    }
}

impl PushSink for Valve {
    fn push_from(&self, source: &Weak<dyn Bindable>, payload: &Payload) {
        let Some(source) = source.upgrade() else {
            return;
        };
        if let Err(error) = self.push(Some(&source), payload) {
            tracing::debug!(%error, "inbound broadcast ignored");
        }
    }
}

impl fmt::Debug for Valve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Valve")
            .field("members", &lock(&self.members).len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// StateValve
// ---------------------------------------------------------------------------

/// A [`Valve`] that deduplicates consecutive payloads.
///
/// The last propagated payload starts out absent (`None` — there is no
/// shared "unequal to everything" sentinel), so the first push always
/// proceeds. A push equal to the last propagated payload returns
/// [`PushOutcome::Unchanged`] before any consumer is touched, regardless
/// of which member it came from or on which thread — this is the
/// guarantee that stops rebroadcast ping-pong.
pub struct StateValve {
    weak_self: Weak<StateValve>,
    valve: Valve,
    last: Mutex<Option<Payload>>,
    changed: Broadcaster<Payload>,
}

impl StateValve {
    /// A fresh deduplicating group.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            weak_self: weak.clone(),
            valve: Valve::unmanaged(),
            last: Mutex::new(None),
            changed: Broadcaster::new(),
        })
    }

    /// Add a member; inbound producer events route through the duplicate
    /// check before delivery.
    ///
    /// # Errors
    ///
    /// [`ValveError::Disposed`] after disposal.
    pub fn add(&self, bindable: &Arc<dyn Bindable>) -> Result<(), ValveError> {
        let sink: Weak<dyn PushSink> = self.weak_self.clone();
        self.valve.add_with_sink(bindable, sink)
    }

    /// Push with deduplication.
    ///
    /// Inside the delivery gate: if `payload` equals the last propagated
    /// payload (shared-pointer identity first, then element-wise value
    /// equality), returns [`PushOutcome::Unchanged`] without touching any
    /// consumer. Otherwise records it, delegates to the group delivery,
    /// and fires the value-changed notification.
    ///
    /// # Errors
    ///
    /// [`ValveError::Disposed`] after disposal.
    pub fn push(
        &self,
        source: Option<&Arc<dyn Bindable>>,
        payload: &Payload,
    ) -> Result<PushOutcome, ValveError> {
        if self.valve.disposed.load(Ordering::Acquire) {
            return Err(ValveError::Disposed);
        }
        let _gate = self.valve.gate.enter();
        {
            let mut last = lock(&self.last);
            if last.as_ref().is_some_and(|previous| payload_eq(previous, payload)) {
                return Ok(PushOutcome::Unchanged);
            }
            *last = Some(payload.clone());
        }
        let report = self.valve.deliver(source, payload);
        self.changed.emit(payload);
        Ok(PushOutcome::Delivered(report))
    }

    /// Fired after every accepted (non-duplicate) propagation, with the
    /// propagated payload.
    #[must_use]
    pub fn on_changed(&self) -> &Broadcaster<Payload> {
        &self.changed
    }

    /// The last propagated payload, if any.
    #[must_use]
    pub fn last_payload(&self) -> Option<Payload> {
        lock(&self.last).clone()
    }

    /// Values currently held by the member attached to `object`, or empty
    /// when no live member is attached to it.
    #[must_use]
    pub fn values_for_object(&self, object: &Object) -> Payload {
        self.valve
            .members()
            .into_iter()
            .find(|member| {
                member
                    .object()
                    .is_some_and(|attached| Arc::ptr_eq(&attached, object))
            })
            .and_then(|member| member.current_values())
            .unwrap_or_default()
    }

    /// The transposed, padding-aligned matrix of member values: one outer
    /// entry per payload position, one inner entry per member (`None`
    /// where a member holds fewer positions). Used when this valve sits at
    /// an interior fixture node with structured child values.
    #[must_use]
    pub fn child_valve_objects(&self) -> Vec<Vec<Option<Value>>> {
        let rows: Vec<Payload> = self
            .valve
            .members()
            .into_iter()
            .map(|member| member.current_values().unwrap_or_default())
            .collect();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        (0..width)
            .map(|position| rows.iter().map(|row| row.get(position).cloned()).collect())
            .collect()
    }

    /// The live members, pruning reclaimed entries as a side effect.
    #[must_use]
    pub fn members(&self) -> Vec<Arc<dyn Bindable>> {
        self.valve.members()
    }

    /// Number of live members, pruning as a side effect.
    #[must_use]
    pub fn len(&self) -> usize {
        self.valve.len()
    }

    /// Whether no live member remains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.valve.is_empty()
    }

    /// The one-shot notification fired when the valve is disposed.
    #[must_use]
    pub fn on_disposing(&self) -> &Broadcaster<()> {
        self.valve.on_disposing()
    }

    /// Whether [`StateValve::dispose`] has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.valve.is_disposed()
    }

    /// Dispose the underlying group. Idempotent.
    pub fn dispose(&self) {
        self.valve.dispose();
    }
}

impl PushSink for StateValve {
    fn push_from(&self, source: &Weak<dyn Bindable>, payload: &Payload) {
        let Some(source) = source.upgrade() else {
            return;
        };
        if let Err(error) = self.push(Some(&source), payload) {
            tracing::debug!(%error, "inbound broadcast ignored");
        }
    }
}

impl fmt::Debug for StateValve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateValve")
            .field("members", &lock(&self.valve.members).len())
            .field("has_last", &lock(&self.last).is_some())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
