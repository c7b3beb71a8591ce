//! Extension objects, re-homed onto the real target.
//!
//! A [`Mixin`] injects bindable members onto types that do not natively
//! expose them. The mixin template is itself scanned as if it were the
//! target type; [`MixinScanner`] then re-homes the resulting bindables:
//! each attachment clones the mixin, binds the clone to the real
//! instance, and attaches the member bindable to the clone. One clone
//! per attachment keeps concurrent attachments free of cross-talk, the
//! same discipline as
//! [`Bindable::clone_detached`](tether_core::Bindable::clone_detached).

use core::any::Any;
use std::sync::{Arc, Mutex, PoisonError};

use tether_path::Path;

use tether_core::{
    BindOutcome, Bindable, Broadcaster, Capabilities, Object, Payload, Scanner, ValueType,
};

/// An extension object that adapts a target instance.
///
/// Implementations hold their own state (with interior mutability) plus
/// an optional bound target set via [`Mixin::set_object`]. They are
/// registered with a scanner like any other type; their members read and
/// write the mixin, which in turn reads and writes the target it adapts.
pub trait Mixin: Any + Send + Sync {
    /// Bind (or unbind, with `None`) the real target instance.
    fn set_object(&self, instance: Option<Object>);

    /// An independent detached copy with the same behavior and no bound
    /// target.
    fn clone_detached(&self) -> Arc<dyn Mixin>;

    /// This mixin as a scannable [`Object`]. Implementations return
    /// `self`.
    fn as_object(self: Arc<Self>) -> Object;
}

/// Scans a mixin template as if it were the target type and re-homes the
/// results onto whatever object the bindables later attach to.
pub struct MixinScanner {
    template: Arc<dyn Mixin>,
    inner: Arc<dyn Scanner>,
}

impl MixinScanner {
    /// Inject `template`'s members, discovered by `inner`, onto every
    /// scanned object.
    #[must_use]
    pub fn new(template: Arc<dyn Mixin>, inner: Arc<dyn Scanner>) -> Self {
        Self { template, inner }
    }
}

impl Scanner for MixinScanner {
    fn scan(&self, _object: &Object) -> Vec<Arc<dyn Bindable>> {
        let scannable = Arc::clone(&self.template).as_object();
        self.inner
            .scan(&scannable)
            .into_iter()
            .map(|bindable| {
                Arc::new(MixinBindable {
                    inner: bindable,
                    template: Arc::clone(&self.template),
                    state: Mutex::new(None),
                }) as Arc<dyn Bindable>
            })
            .collect()
    }
}

struct BoundMixin {
    target: Object,
    adapter: Arc<dyn Mixin>,
}

/// A member bindable whose attachment goes through a fresh mixin clone.
struct MixinBindable {
    inner: Arc<dyn Bindable>,
    template: Arc<dyn Mixin>,
    state: Mutex<Option<BoundMixin>>,
}

impl MixinBindable {
    fn bound(&self) -> Option<Object> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|bound| Arc::clone(&bound.target))
    }
}

impl Bindable for MixinBindable {
    fn path(&self) -> &Path {
        self.inner.path()
    }

    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    fn value_types(&self) -> &[ValueType] {
        self.inner.value_types()
    }

    /// The real target, not the interposed mixin clone.
    fn object(&self) -> Option<Object> {
        self.bound()
    }

    fn set_object(&self, object: Option<Object>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = state.take() {
            self.inner.set_object(None);
            previous.adapter.set_object(None);
        }
        let Some(target) = object else {
            return;
        };
        let adapter = self.template.clone_detached();
        adapter.set_object(Some(Arc::clone(&target)));
        self.inner
            .set_object(Some(Arc::clone(&adapter).as_object()));
        *state = Some(BoundMixin { target, adapter });
    }

    fn clone_detached(&self) -> Arc<dyn Bindable> {
        Arc::new(Self {
            inner: self.inner.clone_detached(),
            template: Arc::clone(&self.template),
            state: Mutex::new(None),
        })
    }

    fn try_consume(&self, payload: &Payload) -> BindOutcome {
        self.inner.try_consume(payload)
    }

    fn try_execute(&self, args: &Payload) -> BindOutcome {
        self.inner.try_execute(args)
    }

    fn current_values(&self) -> Option<Payload> {
        self.inner.current_values()
    }

    fn broadcast(&self) -> Option<&Broadcaster<Payload>> {
        self.inner.broadcast()
    }
}
