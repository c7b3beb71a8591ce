//! The scanner-produced bindable.

use std::sync::{Arc, Mutex};

use tether_path::Path;

use tether_core::{
    BindOutcome, Bindable, Broadcaster, Capabilities, Object, Payload, Subscription, ValueType,
    gate_payload,
};

use crate::schema::{ChangeSink, ErasedMember, GetFn, SetFn, ExecFn, SubscribeFn};

/// One scanned member as a [`Bindable`].
///
/// Capabilities are derived from the accessors the scanner wired: a
/// setter grants CONSUME, a command body grants EXECUTE, and a
/// change-notification hookup grants PRODUCE. Attaching subscribes the
/// hookup (translating the object's native notification into this
/// bindable's broadcast) and holds the object strongly for the duration;
/// detaching drops both, exactly once each.
pub struct MemberBindable {
    path: Path,
    capabilities: Capabilities,
    value_types: Vec<ValueType>,
    get: Option<GetFn>,
    set: Option<SetFn>,
    execute: Option<ExecFn>,
    subscribe: Option<SubscribeFn>,
    broadcast: Arc<Broadcaster<Payload>>,
    state: Mutex<AttachState>,
}

#[derive(Default)]
struct AttachState {
    object: Option<Object>,
    listener: Option<Subscription>,
}

impl MemberBindable {
    /// Build a detached template from an erased member declaration.
    ///
    /// `route` resolves the object the accessors target from the scanned
    /// root: identity when absent, a composed child-getter chain for
    /// nested members.
    pub(crate) fn from_member(
        path: Path,
        member: &ErasedMember,
        route: Option<&crate::schema::ChildFn>,
    ) -> Arc<dyn Bindable> {
        let get: Option<GetFn> = match (member.get.clone(), route) {
            (Some(get), Some(route)) => {
                let route = Arc::clone(route);
                Some(Arc::new(move |object: &Object| {
                    route(object).and_then(|child| get(&child))
                }))
            }
            (get, _) => get,
        };
        let set: Option<SetFn> = match (member.set.clone(), route) {
            (Some(set), Some(route)) => {
                let route = Arc::clone(route);
                Some(Arc::new(move |object: &Object, payload: &Payload| {
                    route(object).is_some_and(|child| set(&child, payload))
                }))
            }
            (set, _) => set,
        };
        let execute: Option<ExecFn> = match (member.execute.clone(), route) {
            (Some(execute), Some(route)) => {
                let route = Arc::clone(route);
                Some(Arc::new(move |object: &Object, args: &Payload| {
                    route(object).is_some_and(|child| execute(&child, args))
                }))
            }
            (execute, _) => execute,
        };
        let subscribe: Option<SubscribeFn> = match (member.subscribe.clone(), route) {
            (Some(subscribe), Some(route)) => {
                let route = Arc::clone(route);
                Some(Arc::new(move |object: &Object, sink: ChangeSink| {
                    route(object).and_then(|child| subscribe(&child, sink))
                }))
            }
            (subscribe, _) => subscribe,
        };

        let mut capabilities = Capabilities::empty();
        if set.is_some() {
            capabilities |= Capabilities::CONSUME;
        }
        if execute.is_some() {
            capabilities |= Capabilities::EXECUTE;
        }
        if subscribe.is_some() {
            capabilities |= Capabilities::PRODUCE;
        }

        Arc::new(Self {
            path,
            capabilities,
            value_types: member.value_types.clone(),
            get,
            set,
            execute,
            subscribe,
            broadcast: Arc::new(Broadcaster::new()),
            state: Mutex::new(AttachState::default()),
        })
    }

    fn attached_object(&self) -> Option<Object> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .object
            .clone()
    }
}

impl Bindable for MemberBindable {
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
        self.attached_object()
    }

    fn set_object(&self, object: Option<Object>) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // Exactly-once listener discipline: the previous registration is
        // dropped before any new one is made.
        state.listener = None;
        state.object = None;
        let Some(object) = object else {
            return;
        };
        if let Some(subscribe) = &self.subscribe {
            let broadcast = Arc::clone(&self.broadcast);
            let sink: ChangeSink = Arc::new(move |payload: &Payload| broadcast.emit(payload));
            state.listener = subscribe(&object, sink);
            if state.listener.is_none() {
                tracing::trace!(path = %self.path, "change listener could not be registered");
            }
        }
        state.object = Some(object);
    }

    fn clone_detached(&self) -> Arc<dyn Bindable> {
        Arc::new(Self {
            path: self.path.clone(),
            capabilities: self.capabilities,
            value_types: self.value_types.clone(),
            get: self.get.clone(),
            set: self.set.clone(),
            execute: self.execute.clone(),
            subscribe: self.subscribe.clone(),
            broadcast: Arc::new(Broadcaster::new()),
            state: Mutex::new(AttachState::default()),
        })
    }

    fn try_consume(&self, payload: &Payload) -> BindOutcome {
        let Some(set) = &self.set else {
            return BindOutcome::NotCapable;
        };
        if let Some(mismatch) = gate_payload(&self.value_types, payload) {
            return mismatch;
        }
        // Write outside the state lock: the setter fires the object's
        // native notification synchronously, which re-enters the engine.
        let Some(object) = self.attached_object() else {
            return BindOutcome::Detached;
        };
        if set(&object, payload) {
            BindOutcome::Handled
        } else {
            // The routed target is gone or not the registered type; there
            // is no live typed object behind this attachment.
            BindOutcome::Detached
        }
    }

    fn try_execute(&self, args: &Payload) -> BindOutcome {
        let Some(execute) = &self.execute else {
            return BindOutcome::NotCapable;
        };
        if let Some(mismatch) = gate_payload(&self.value_types, args) {
            return mismatch;
        }
        let Some(object) = self.attached_object() else {
            return BindOutcome::Detached;
        };
        if execute(&object, args) {
            BindOutcome::Handled
        } else {
            BindOutcome::Detached
        }
    }

    fn current_values(&self) -> Option<Payload> {
        let get = self.get.as_ref()?;
        let object = self.attached_object()?;
        get(&object)
    }

    fn broadcast(&self) -> Option<&Broadcaster<Payload>> {
        self.capabilities.produces().then(|| self.broadcast.as_ref())
    }
}
