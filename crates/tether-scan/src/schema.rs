//! Typed member declaration, erased once.
//!
//! A [`TypeSchema`] declares what a type exposes for binding. All type
//! knowledge — getters, setters, command bodies, child accessors, the
//! change-notification hookup — is captured into erased closures over
//! [`Object`] when the schema is registered with a scanner; scanning
//! afterwards is a `TypeId` lookup plus template construction, with no
//! downcasting visible to the engine.

use core::any::{Any, TypeId, type_name};
use std::sync::Arc;

use tether_core::{Broadcaster, Object, Payload, Subscription, Value, ValueType};

/// Where a translated native change notification lands: the bindable's
/// own broadcast.
pub type ChangeSink = Arc<dyn Fn(&Payload) + Send + Sync>;

/// One native change notification from a [`Notify`] object.
#[derive(Clone, Debug)]
pub struct MemberChange {
    /// The raw (unparsed) member name, as declared in the schema.
    pub name: &'static str,
    /// The new values, one per payload position.
    pub values: Payload,
}

impl MemberChange {
    /// Convenience constructor.
    #[must_use]
    pub fn new(name: &'static str, values: Payload) -> Self {
        Self { name, values }
    }
}

/// The change-notification convention.
///
/// A type implementing `Notify` exposes one broadcaster for all of its
/// members; implementations emit a [`MemberChange`] whenever a member's
/// value changes. [`NotifyScanner`](crate::NotifyScanner) wires scanned
/// members to it with a name-filtered listener.
pub trait Notify: Any + Send + Sync {
    /// The object's native change feed.
    fn changed(&self) -> &Broadcaster<MemberChange>;
}

// ---------------------------------------------------------------------------
// Erased accessor model
// ---------------------------------------------------------------------------

pub(crate) type GetFn = Arc<dyn Fn(&Object) -> Option<Payload> + Send + Sync>;
pub(crate) type SetFn = Arc<dyn Fn(&Object, &Payload) -> bool + Send + Sync>;
pub(crate) type ExecFn = Arc<dyn Fn(&Object, &Payload) -> bool + Send + Sync>;
pub(crate) type SubscribeFn = Arc<dyn Fn(&Object, ChangeSink) -> Option<Subscription> + Send + Sync>;
pub(crate) type ChildFn = Arc<dyn Fn(&Object) -> Option<Object> + Send + Sync>;

pub(crate) struct ErasedMember {
    pub(crate) name: &'static str,
    pub(crate) value_types: Vec<ValueType>,
    pub(crate) get: Option<GetFn>,
    pub(crate) set: Option<SetFn>,
    pub(crate) execute: Option<ExecFn>,
    pub(crate) subscribe: Option<SubscribeFn>,
}

pub(crate) enum SchemaEntry {
    Member(ErasedMember),
    Child {
        name: &'static str,
        child_type: TypeId,
        child_type_name: &'static str,
        get: ChildFn,
    },
}

/// Declares the bindable members of a `T`.
///
/// Values are read from `&T`, so mutable members use interior mutability
/// (the same discipline that makes a shared object observable from a
/// change feed in the first place). Registration erases the types; see
/// the scanner builders for how a schema becomes bindables.
pub struct TypeSchema<T> {
    pub(crate) entries: Vec<SchemaEntry>,
    _marker: core::marker::PhantomData<fn(T)>,
}

impl<T: Any + Send + Sync> TypeSchema<T> {
    /// An empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            _marker: core::marker::PhantomData,
        }
    }

    /// A readable, writable, single-value member.
    #[must_use]
    pub fn property<V>(
        mut self,
        name: &'static str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
        set: impl Fn(&T, V) + Send + Sync + 'static,
    ) -> Self
    where
        V: Any + Send + Sync + PartialEq + Clone,
    {
        let get_fn: GetFn = Arc::new(move |object: &Object| {
            let target = object.downcast_ref::<T>()?;
            Some(vec![Value::new(get(target))])
        });
        let set_fn: SetFn = Arc::new(move |object: &Object, payload: &Payload| {
            let Some(target) = object.downcast_ref::<T>() else {
                return false;
            };
            let Some(value) = payload.first().and_then(|v| v.downcast_ref::<V>()) else {
                return false;
            };
            set(target, value.clone());
            true
        });
        self.entries.push(SchemaEntry::Member(ErasedMember {
            name,
            value_types: vec![ValueType::of::<V>()],
            get: Some(get_fn),
            set: Some(set_fn),
            execute: None,
            subscribe: None,
        }));
        self
    }

    /// A readable, single-value member with no setter.
    #[must_use]
    pub fn read_only<V>(
        mut self,
        name: &'static str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
    ) -> Self
    where
        V: Any + Send + Sync + PartialEq + Clone,
    {
        let get_fn: GetFn = Arc::new(move |object: &Object| {
            let target = object.downcast_ref::<T>()?;
            Some(vec![Value::new(get(target))])
        });
        self.entries.push(SchemaEntry::Member(ErasedMember {
            name,
            value_types: vec![ValueType::of::<V>()],
            get: Some(get_fn),
            set: None,
            execute: None,
            subscribe: None,
        }));
        self
    }

    /// A broadcast-only member carrying one value per notification.
    ///
    /// Inert under a scanner without a change-notification source.
    #[must_use]
    pub fn signal<V>(mut self, name: &'static str) -> Self
    where
        V: Any + Send + Sync,
    {
        self.entries.push(SchemaEntry::Member(ErasedMember {
            name,
            value_types: vec![ValueType::of::<V>()],
            get: None,
            set: None,
            execute: None,
            subscribe: None,
        }));
        self
    }

    /// A broadcast-only member carrying two values per notification.
    #[must_use]
    pub fn signal2<V1, V2>(mut self, name: &'static str) -> Self
    where
        V1: Any + Send + Sync,
        V2: Any + Send + Sync,
    {
        self.entries.push(SchemaEntry::Member(ErasedMember {
            name,
            value_types: vec![ValueType::of::<V1>(), ValueType::of::<V2>()],
            get: None,
            set: None,
            execute: None,
            subscribe: None,
        }));
        self
    }

    /// An argument-less command.
    #[must_use]
    pub fn command(
        mut self,
        name: &'static str,
        run: impl Fn(&T) + Send + Sync + 'static,
    ) -> Self {
        let exec_fn: ExecFn = Arc::new(move |object: &Object, _args: &Payload| {
            let Some(target) = object.downcast_ref::<T>() else {
                return false;
            };
            run(target);
            true
        });
        self.entries.push(SchemaEntry::Member(ErasedMember {
            name,
            value_types: Vec::new(),
            get: None,
            set: None,
            execute: Some(exec_fn),
            subscribe: None,
        }));
        self
    }

    /// A command taking one typed argument.
    #[must_use]
    pub fn command_with<V>(
        mut self,
        name: &'static str,
        run: impl Fn(&T, V) + Send + Sync + 'static,
    ) -> Self
    where
        V: Any + Send + Sync + PartialEq + Clone,
    {
        let exec_fn: ExecFn = Arc::new(move |object: &Object, args: &Payload| {
            let Some(target) = object.downcast_ref::<T>() else {
                return false;
            };
            let Some(value) = args.first().and_then(|v| v.downcast_ref::<V>()) else {
                return false;
            };
            run(target, value.clone());
            true
        });
        self.entries.push(SchemaEntry::Member(ErasedMember {
            name,
            value_types: vec![ValueType::of::<V>()],
            get: None,
            set: None,
            execute: Some(exec_fn),
            subscribe: None,
        }));
        self
    }

    /// A nested child object whose own schema is flattened into this
    /// type's path namespace (`name` + child member name), with composed
    /// accessors. Recursive nesting is cycle-guarded per scan.
    #[must_use]
    pub fn child<C>(
        mut self,
        name: &'static str,
        get: impl Fn(&T) -> Option<Arc<C>> + Send + Sync + 'static,
    ) -> Self
    where
        C: Any + Send + Sync,
    {
        let get_fn: ChildFn = Arc::new(move |object: &Object| {
            let target = object.downcast_ref::<T>()?;
            get(target).map(|child| child as Object)
        });
        self.entries.push(SchemaEntry::Child {
            name,
            child_type: TypeId::of::<C>(),
            child_type_name: type_name::<C>(),
            get: get_fn,
        });
        self
    }
}

impl<T: Any + Send + Sync> Default for TypeSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}
