//! Type-erased broadcast values.
//!
//! A [`Value`] is one positional broadcast argument: a shared, immutable
//! datum carrying its runtime type and a value-equality function captured
//! at construction. A [`Payload`] is the ordered argument list of one
//! broadcast.
//!
//! Equality is reference equality first (shared-pointer identity, cheap),
//! then element value equality via the captured `PartialEq`. Two values of
//! different runtime types are never equal.

use core::any::{Any, TypeId, type_name};
use core::fmt;
use std::sync::Arc;

/// The erased storage type for one value.
type AnyValue = dyn Any + Send + Sync;

/// A shared, type-erased, immutably held broadcast argument.
#[derive(Clone)]
pub struct Value {
    inner: Arc<AnyValue>,
    ty: ValueType,
    eq: fn(&AnyValue, &AnyValue) -> bool,
}

impl Value {
    /// Wrap a concrete value, capturing its type and equality.
    #[must_use]
    pub fn new<T>(value: T) -> Self
    where
        T: Any + Send + Sync + PartialEq,
    {
        Self {
            inner: Arc::new(value),
            ty: ValueType::of::<T>(),
            eq: erased_eq::<T>,
        }
    }

    /// The declared-type descriptor of the contained value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        self.ty
    }

    /// The runtime `TypeId` of the contained value.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.ty.id()
    }

    /// Whether the contained value is a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.ty.id() == TypeId::of::<T>()
    }

    /// Borrow the contained value as a `T`, if it is one.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Shared-pointer identity: `true` iff both values share storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.ty.id() == other.ty.id() && (self.eq)(self.inner.as_ref(), other.inner.as_ref())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value<{}>", self.ty.name())
    }
}

fn erased_eq<T: Any + PartialEq>(a: &AnyValue, b: &AnyValue) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// One declared payload position: runtime type plus a readable name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ValueType {
    id: TypeId,
    name: &'static str,
}

impl ValueType {
    /// The descriptor for `T`.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// The runtime type id.
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Human-readable type name, for diagnostics only.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Positional compatibility: whether a payload value of this runtime
    /// type may be delivered to a position declared as `self`. Rust's
    /// `TypeId` model is monomorphic, so this is exact type equality.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        self.id == value.type_id()
    }
}

/// The ordered argument list of one broadcast.
pub type Payload = Vec<Value>;

/// Element-wise payload equality, shared-pointer identity first per
/// element. Payloads of different arity are never equal.
#[must_use]
pub fn payload_eq(a: &Payload, b: &Payload) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}

/// Build a [`Payload`] from concrete values.
///
/// ```
/// use tether_core::payload;
///
/// let p = payload!["title".to_owned(), 3_u32];
/// assert_eq!(p.len(), 2);
/// ```
#[macro_export]
macro_rules! payload {
    ($($value:expr),* $(,)?) => {
        vec![$($crate::Value::new($value)),*]
    };
}
