//! In-crate test double: a scriptable bindable.

use core::any::Any;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tether_path::{Path, Syllable};

use crate::bindable::{BindOutcome, Bindable, Object, gate_payload};
use crate::broadcast::Broadcaster;
use crate::capability::Capabilities;
use crate::lock;
use crate::value::{Payload, ValueType};

pub(crate) struct StubBindable {
    path: Path,
    capabilities: Capabilities,
    value_types: Vec<ValueType>,
    object: Mutex<Option<Object>>,
    values: Mutex<Option<Payload>>,
    consumed: AtomicUsize,
    broadcast: Broadcaster<Payload>,
    panic_on_consume: bool,
}

impl StubBindable {
    fn build<T: Any>(name: &str, capabilities: Capabilities) -> Arc<Self> {
        Arc::new(Self {
            path: Path::single(Syllable::new(name)),
            capabilities,
            value_types: vec![ValueType::of::<T>()],
            object: Mutex::new(None),
            values: Mutex::new(None),
            consumed: AtomicUsize::new(0),
            broadcast: Broadcaster::new(),
            panic_on_consume: false,
        })
    }

    pub(crate) fn duplex<T: Any>(name: &str) -> Arc<Self> {
        Self::build::<T>(name, Capabilities::PRODUCE | Capabilities::CONSUME)
    }

    pub(crate) fn at_path<T: Any>(path: Path) -> Arc<Self> {
        let mut stub = Self::build::<T>("x", Capabilities::PRODUCE | Capabilities::CONSUME);
        Arc::get_mut(&mut stub).expect("fresh arc").path = path;
        stub
    }

    pub(crate) fn consumer<T: Any>(name: &str) -> Arc<Self> {
        Self::build::<T>(name, Capabilities::CONSUME)
    }

    pub(crate) fn producer<T: Any>(name: &str) -> Arc<Self> {
        Self::build::<T>(name, Capabilities::PRODUCE)
    }

    pub(crate) fn panicking<T: Any>(name: &str) -> Arc<Self> {
        let mut stub = Self::build::<T>(name, Capabilities::CONSUME);
        Arc::get_mut(&mut stub).expect("fresh arc").panic_on_consume = true;
        stub
    }

    /// Fire the produce-side event, as a native change notification would.
    pub(crate) fn emit(&self, payload: &Payload) {
        self.broadcast.emit(payload);
    }

    pub(crate) fn consumed_count(&self) -> usize {
        self.consumed.load(Ordering::SeqCst)
    }

    pub(crate) fn set_values(&self, payload: Payload) {
        *lock(&self.values) = Some(payload);
    }
}

impl Bindable for StubBindable {
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
        *lock(&self.object) = object;
    }

    fn clone_detached(&self) -> Arc<dyn Bindable> {
        Arc::new(Self {
            path: self.path.clone(),
            capabilities: self.capabilities,
            value_types: self.value_types.clone(),
            object: Mutex::new(None),
            values: Mutex::new(None),
            consumed: AtomicUsize::new(0),
            broadcast: Broadcaster::new(),
            panic_on_consume: self.panic_on_consume,
        })
    }

    fn try_consume(&self, payload: &Payload) -> BindOutcome {
        if !self.capabilities.consumes() {
            return BindOutcome::NotCapable;
        }
        if self.panic_on_consume {
            panic!("scripted consumer fault");
        }
        if let Some(mismatch) = gate_payload(&self.value_types, payload) {
            return mismatch;
        }
        self.consumed.fetch_add(1, Ordering::SeqCst);
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
