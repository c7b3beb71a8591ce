//! Registry-backed discovery strategies.
//!
//! Both scanners hold a `TypeId`-keyed registry of erased schemas and
//! produce detached [`MemberBindable`] templates. They differ only in
//! wiring: [`MemberScanner`] binds members exactly as declared, while
//! [`NotifyScanner`] requires registered types to implement
//! [`Notify`](crate::Notify) and grants every declared member the
//! produce capability through a name-filtered listener on the object's
//! change feed.
//!
//! Nested `child` entries flatten the child type's schema into the
//! parent's path namespace with composed accessors. The recursion is
//! cycle-guarded per scan: a type already on the current expansion path
//! is not entered again, so mutually nested schemas terminate.

use core::any::{Any, TypeId};
use std::sync::Arc;

use ahash::AHashMap;

use tether_core::{Bindable, Object, Scanner, ScopedScanner};
use tether_path::{Path, SyllableParser};

use crate::member::MemberBindable;
use crate::schema::{
    ChangeSink, ChildFn, MemberChange, Notify, SchemaEntry, SubscribeFn, TypeSchema,
};

struct ErasedSchema {
    type_name: &'static str,
    entries: Vec<SchemaEntry>,
}

/// Shared scanning machinery: a parser plus the schema registry.
#[derive(Clone)]
struct SchemaSet {
    parser: Arc<dyn SyllableParser>,
    schemas: AHashMap<TypeId, Arc<ErasedSchema>>,
}

impl SchemaSet {
    fn new(parser: impl SyllableParser + 'static) -> Self {
        Self {
            parser: Arc::new(parser),
            schemas: AHashMap::new(),
        }
    }

    fn insert(&mut self, type_id: TypeId, type_name: &'static str, entries: Vec<SchemaEntry>) {
        self.schemas
            .insert(type_id, Arc::new(ErasedSchema { type_name, entries }));
    }

    fn scan(&self, object: &Object) -> Vec<Arc<dyn Bindable>> {
        let type_id = object.as_ref().type_id();
        let Some(schema) = self.schemas.get(&type_id) else {
            tracing::trace!("no schema registered for scanned object");
            return Vec::new();
        };
        tracing::trace!(type_name = schema.type_name, "scanning");
        let mut templates = Vec::new();
        let mut on_path = vec![type_id];
        self.expand(schema, &Path::root(), None, &mut on_path, &mut templates);
        templates
    }

    fn expand(
        &self,
        schema: &ErasedSchema,
        prefix: &Path,
        route: Option<&ChildFn>,
        on_path: &mut Vec<TypeId>,
        templates: &mut Vec<Arc<dyn Bindable>>,
    ) {
        for entry in &schema.entries {
            match entry {
                SchemaEntry::Member(member) => {
                    let path = prefix.join(&self.parser.parse_path(member.name));
                    if path.is_root() {
                        tracing::trace!(name = member.name, "member name parsed to nothing");
                        continue;
                    }
                    templates.push(MemberBindable::from_member(path, member, route));
                }
                SchemaEntry::Child {
                    name,
                    child_type,
                    child_type_name,
                    get,
                } => {
                    if on_path.contains(child_type) {
                        tracing::trace!(
                            child = child_type_name,
                            "nested schema cycle stopped"
                        );
                        continue;
                    }
                    let Some(child_schema) = self.schemas.get(child_type) else {
                        tracing::trace!(child = child_type_name, "child type not registered");
                        continue;
                    };
                    let child_prefix = prefix.join(&self.parser.parse_path(name));
                    let child_route: ChildFn = match route {
                        None => Arc::clone(get),
                        Some(outer) => {
                            let outer = Arc::clone(outer);
                            let get = Arc::clone(get);
                            Arc::new(move |object: &Object| {
                                outer(object).and_then(|child| get(&child))
                            })
                        }
                    };
                    on_path.push(*child_type);
                    self.expand(
                        child_schema,
                        &child_prefix,
                        Some(&child_route),
                        on_path,
                        templates,
                    );
                    on_path.pop();
                }
            }
        }
    }
}

/// Binds declared members exactly as declared.
///
/// Properties scanned this way can be consumed and read but not
/// broadcast — without a change-notification source there is nothing to
/// translate. Use [`NotifyScanner`] for types that implement
/// [`Notify`](crate::Notify).
#[derive(Clone)]
pub struct MemberScanner {
    set: SchemaSet,
}

impl MemberScanner {
    /// A scanner splitting raw member names with `parser`.
    #[must_use]
    pub fn new(parser: impl SyllableParser + 'static) -> Self {
        Self {
            set: SchemaSet::new(parser),
        }
    }

    /// Register `T`'s schema, builder style.
    #[must_use]
    pub fn with<T: core::any::Any + Send + Sync>(
        mut self,
        build: impl FnOnce(TypeSchema<T>) -> TypeSchema<T>,
    ) -> Self {
        let schema = build(TypeSchema::new());
        self.set.insert(
            TypeId::of::<T>(),
            core::any::type_name::<T>(),
            schema.entries,
        );
        self
    }
}

impl Scanner for MemberScanner {
    fn scan(&self, object: &Object) -> Vec<Arc<dyn Bindable>> {
        self.set.scan(object)
    }
}

impl ScopedScanner for MemberScanner {
    fn new_scope(&self) -> Arc<dyn ScopedScanner> {
        Arc::new(self.clone())
    }
}

/// The change-notification convention scanner.
///
/// Registered types implement [`Notify`](crate::Notify); every declared
/// member gains the produce capability. On attach, the member bindable
/// subscribes a listener filtered by the member's raw name; the
/// listener forwards [`MemberChange::values`] into the bindable's own
/// broadcast, and is dropped exactly once on detach.
#[derive(Clone)]
pub struct NotifyScanner {
    set: SchemaSet,
}

impl NotifyScanner {
    /// A scanner splitting raw member names with `parser`.
    #[must_use]
    pub fn new(parser: impl SyllableParser + 'static) -> Self {
        Self {
            set: SchemaSet::new(parser),
        }
    }

    /// Register `T`'s schema, wiring every member to `T`'s change feed.
    #[must_use]
    pub fn with<T: Notify>(
        mut self,
        build: impl FnOnce(TypeSchema<T>) -> TypeSchema<T>,
    ) -> Self {
        let schema = build(TypeSchema::new());
        let entries = schema
            .entries
            .into_iter()
            .map(|entry| match entry {
                SchemaEntry::Member(mut member) => {
                    member.subscribe = Some(notify_subscribe::<T>(member.name));
                    SchemaEntry::Member(member)
                }
                child @ SchemaEntry::Child { .. } => child,
            })
            .collect();
        self.set
            .insert(TypeId::of::<T>(), core::any::type_name::<T>(), entries);
        self
    }
}

impl Scanner for NotifyScanner {
    fn scan(&self, object: &Object) -> Vec<Arc<dyn Bindable>> {
        self.set.scan(object)
    }
}

impl ScopedScanner for NotifyScanner {
    fn new_scope(&self) -> Arc<dyn ScopedScanner> {
        Arc::new(self.clone())
    }
}

/// A name-filtered bridge from `T`'s change feed to a bindable's
/// broadcast.
fn notify_subscribe<T: Notify>(name: &'static str) -> SubscribeFn {
    Arc::new(move |object: &Object, sink: ChangeSink| {
        let target = object.downcast_ref::<T>()?;
        Some(target.changed().subscribe(move |change: &MemberChange| {
            if change.name == name {
                sink(&change.values);
            }
        }))
    })
}
