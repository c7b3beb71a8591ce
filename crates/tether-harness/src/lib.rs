#![forbid(unsafe_code)]

//! Test doubles and reference models for the tether binding engine.
//!
//! Everything here is deterministic: liveness is exercised by dropping
//! the last `Arc` and asserting that upgrades fail, never by waiting on
//! an ambient collector.
//!
//! - [`Probe`]: a scriptable [`Bindable`] that records every consumed
//!   payload and lets tests fire its produce-side event by hand.
//! - [`RosterScanner`]: hands out fixed template rosters per scanned
//!   root, in order — the cheapest way to drive fixture building.
//! - [`Card`], [`Dial`], [`Panel`], [`Badge`]: notifying model objects
//!   with interior-mutable members; they emit on *every* set, even an
//!   unchanged one, so the engine's duplicate check (not the model) is
//!   what stops rebroadcast echoes.
//! - [`CounterMixin`]: a minimal [`Mixin`] carrying its own state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tether_core::{
    BindOutcome, Bindable, Broadcaster, Capabilities, Object, Payload, Scanner, ValueType,
    gate_payload, payload,
};
use tether_path::{Path, SyllableParser, UnderscoreParser};
use tether_scan::{MemberChange, Mixin, Notify};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

/// A scriptable bindable.
///
/// Member names are underscore-split, so `"drag_dropped"` yields a
/// two-syllable path. Consumed payloads are recorded in order; the
/// produce-side event fires on [`Probe::emit`], the way a native change
/// notification would.
pub struct Probe {
    path: Path,
    capabilities: Capabilities,
    value_types: Vec<ValueType>,
    object: Mutex<Option<Object>>,
    values: Mutex<Option<Payload>>,
    consumed: Mutex<Vec<Payload>>,
    attach_count: AtomicUsize,
    broadcast: Broadcaster<Payload>,
    fault_on_consume: bool,
}

impl Probe {
    fn build<T: 'static>(name: &str, capabilities: Capabilities) -> Arc<Self> {
        Arc::new(Self {
            path: UnderscoreParser.parse_path(name),
            capabilities,
            value_types: vec![ValueType::of::<T>()],
            object: Mutex::new(None),
            values: Mutex::new(None),
            consumed: Mutex::new(Vec::new()),
            attach_count: AtomicUsize::new(0),
            broadcast: Broadcaster::new(),
            fault_on_consume: false,
        })
    }

    /// A produce-and-consume probe for values of type `T`.
    #[must_use]
    pub fn duplex<T: 'static>(name: &str) -> Arc<Self> {
        Self::build::<T>(name, Capabilities::PRODUCE | Capabilities::CONSUME)
    }

    /// A consume-only probe.
    #[must_use]
    pub fn consumer<T: 'static>(name: &str) -> Arc<Self> {
        Self::build::<T>(name, Capabilities::CONSUME)
    }

    /// A produce-only probe.
    #[must_use]
    pub fn producer<T: 'static>(name: &str) -> Arc<Self> {
        Self::build::<T>(name, Capabilities::PRODUCE)
    }

    /// A consumer that panics on delivery, for fault-isolation tests.
    #[must_use]
    pub fn faulty<T: 'static>(name: &str) -> Arc<Self> {
        let mut probe = Self::build::<T>(name, Capabilities::CONSUME);
        Arc::get_mut(&mut probe).expect("fresh arc").fault_on_consume = true;
        probe
    }

    /// Fire the produce-side event.
    pub fn emit(&self, payload: &Payload) {
        self.broadcast.emit(payload);
    }

    /// Number of payloads this probe accepted.
    #[must_use]
    pub fn consumed_count(&self) -> usize {
        lock(&self.consumed).len()
    }

    /// Every accepted payload, in delivery order.
    #[must_use]
    pub fn consumed(&self) -> Vec<Payload> {
        lock(&self.consumed).clone()
    }

    /// Number of attachments seen (via `set_object(Some(..))`).
    #[must_use]
    pub fn attach_count(&self) -> usize {
        self.attach_count.load(Ordering::SeqCst)
    }

    /// Preset the values reported by [`Bindable::current_values`].
    pub fn set_values(&self, payload: Payload) {
        *lock(&self.values) = Some(payload);
    }
}

impl Bindable for Probe {
    fn path(&self) -> &Path {
        &self.path
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn value_types(&self) -> &[ValueType] {
        &self.value_types
    }

    fn object(&self) -> Option<Object> {
        lock(&self.object).clone()
    }

    fn set_object(&self, object: Option<Object>) {
        if object.is_some() {
            self.attach_count.fetch_add(1, Ordering::SeqCst);
        }
        *lock(&self.object) = object;
    }

    fn clone_detached(&self) -> Arc<dyn Bindable> {
        Arc::new(Self {
            path: self.path.clone(),
            capabilities: self.capabilities,
            value_types: self.value_types.clone(),
            object: Mutex::new(None),
            values: Mutex::new(None),
            consumed: Mutex::new(Vec::new()),
            attach_count: AtomicUsize::new(0),
            broadcast: Broadcaster::new(),
            fault_on_consume: self.fault_on_consume,
        })
    }

    fn try_consume(&self, payload: &Payload) -> BindOutcome {
        if !self.capabilities.consumes() {
            return BindOutcome::NotCapable;
        }
        if self.fault_on_consume {
            panic!("scripted consumer fault");
        }
        if let Some(mismatch) = gate_payload(&self.value_types, payload) {
            return mismatch;
        }
        lock(&self.consumed).push(payload.clone());
        *lock(&self.values) = Some(payload.clone());
        BindOutcome::Handled
    }

    fn current_values(&self) -> Option<Payload> {
        lock(&self.values).clone()
    }

    fn broadcast(&self) -> Option<&Broadcaster<Payload>> {
        self.capabilities.produces().then_some(&self.broadcast)
    }
}

// ---------------------------------------------------------------------------
// RosterScanner
// ---------------------------------------------------------------------------

/// Hands out fixed template rosters per scanned root, in scan order.
pub struct RosterScanner {
    rosters: Vec<Vec<Arc<dyn Bindable>>>,
    cursor: AtomicUsize,
}

impl RosterScanner {
    /// One roster per root, consumed in the order roots are scanned.
    #[must_use]
    pub fn new(rosters: Vec<Vec<Arc<dyn Bindable>>>) -> Self {
        Self {
            rosters,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl Scanner for RosterScanner {
    fn scan(&self, _object: &Object) -> Vec<Arc<dyn Bindable>> {
        let ix = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.rosters.get(ix).cloned().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Notifying models
// ---------------------------------------------------------------------------

/// A model with one string property, `Title`.
pub struct Card {
    title: Mutex<String>,
    title_sets: AtomicUsize,
    changed: Broadcaster<MemberChange>,
}

impl Card {
    /// A card holding `title`.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            title: Mutex::new(title.into()),
            title_sets: AtomicUsize::new(0),
            changed: Broadcaster::new(),
        })
    }

    /// Current title.
    #[must_use]
    pub fn title(&self) -> String {
        lock(&self.title).clone()
    }

    /// Set the title and emit the native change notification,
    /// unconditionally — the engine's duplicate check is what stops
    /// echoes, and these models make that observable.
    pub fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        *lock(&self.title) = title.clone();
        self.title_sets.fetch_add(1, Ordering::SeqCst);
        self.changed.emit(&MemberChange::new("Title", payload![title]));
    }

    /// Number of `set_title` calls, including echoes written back by a
    /// binding.
    #[must_use]
    pub fn title_set_count(&self) -> usize {
        self.title_sets.load(Ordering::SeqCst)
    }
}

impl Notify for Card {
    fn changed(&self) -> &Broadcaster<MemberChange> {
        &self.changed
    }
}

/// A model with a numeric `Value` property, a read-only `Limit`, and a
/// `Reset` command.
pub struct Dial {
    value: Mutex<u32>,
    limit: u32,
    resets: AtomicUsize,
    changed: Broadcaster<MemberChange>,
}

impl Dial {
    /// A dial clamped presentationally to `limit` (the model does not
    /// enforce it; bindings move raw values).
    #[must_use]
    pub fn new(limit: u32) -> Arc<Self> {
        Arc::new(Self {
            value: Mutex::new(0),
            limit,
            resets: AtomicUsize::new(0),
            changed: Broadcaster::new(),
        })
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> u32 {
        *lock(&self.value)
    }

    /// Set the value and emit the native change notification.
    pub fn set_value(&self, value: u32) {
        *lock(&self.value) = value;
        self.changed.emit(&MemberChange::new("Value", payload![value]));
    }

    /// The read-only limit.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Zero the value, counting the reset.
    pub fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.set_value(0);
    }

    /// Number of resets executed.
    #[must_use]
    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

impl Notify for Dial {
    fn changed(&self) -> &Broadcaster<MemberChange> {
        &self.changed
    }
}

/// A nested child model with one string property, `Text`.
pub struct Badge {
    text: Mutex<String>,
    changed: Broadcaster<MemberChange>,
}

impl Badge {
    /// A badge holding `text`.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            text: Mutex::new(text.into()),
            changed: Broadcaster::new(),
        })
    }

    /// Current text.
    #[must_use]
    pub fn text(&self) -> String {
        lock(&self.text).clone()
    }

    /// Set the text and emit the native change notification.
    pub fn set_text(&self, text: impl Into<String>) {
        let text = text.into();
        *lock(&self.text) = text.clone();
        self.changed.emit(&MemberChange::new("Text", payload![text]));
    }
}

impl Notify for Badge {
    fn changed(&self) -> &Broadcaster<MemberChange> {
        &self.changed
    }
}

/// A model holding a [`Badge`] child plus its own `Title` property.
pub struct Panel {
    title: Mutex<String>,
    badge: Arc<Badge>,
    changed: Broadcaster<MemberChange>,
}

impl Panel {
    /// A panel with `title` and a badge holding `badge_text`.
    #[must_use]
    pub fn new(title: impl Into<String>, badge_text: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            title: Mutex::new(title.into()),
            badge: Badge::new(badge_text),
            changed: Broadcaster::new(),
        })
    }

    /// Current title.
    #[must_use]
    pub fn title(&self) -> String {
        lock(&self.title).clone()
    }

    /// Set the title and emit the native change notification.
    pub fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        *lock(&self.title) = title.clone();
        self.changed.emit(&MemberChange::new("Title", payload![title]));
    }

    /// The nested badge.
    #[must_use]
    pub fn badge(&self) -> Arc<Badge> {
        Arc::clone(&self.badge)
    }
}

impl Notify for Panel {
    fn changed(&self) -> &Broadcaster<MemberChange> {
        &self.changed
    }
}

// ---------------------------------------------------------------------------
// CounterMixin
// ---------------------------------------------------------------------------

/// A mixin carrying its own `Count` state per bound instance.
pub struct CounterMixin {
    count: Mutex<u64>,
    target: Mutex<Option<Object>>,
    changed: Broadcaster<MemberChange>,
}

impl CounterMixin {
    /// A detached template.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            count: Mutex::new(0),
            target: Mutex::new(None),
            changed: Broadcaster::new(),
        })
    }

    /// Current count.
    #[must_use]
    pub fn count(&self) -> u64 {
        *lock(&self.count)
    }

    /// Set the count and emit the native change notification.
    pub fn set_count(&self, count: u64) {
        *lock(&self.count) = count;
        self.changed.emit(&MemberChange::new("Count", payload![count]));
    }

    /// The bound target, if any.
    #[must_use]
    pub fn target(&self) -> Option<Object> {
        lock(&self.target).clone()
    }
}

impl Notify for CounterMixin {
    fn changed(&self) -> &Broadcaster<MemberChange> {
        &self.changed
    }
}

impl Mixin for CounterMixin {
    fn set_object(&self, instance: Option<Object>) {
        *lock(&self.target) = instance;
    }

    fn clone_detached(&self) -> Arc<dyn Mixin> {
        Self::new()
    }

    fn as_object(self: Arc<Self>) -> Object {
        self
    }
}
