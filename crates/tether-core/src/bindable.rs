//! The bindable access-point abstraction.

use core::any::Any;
use core::fmt;
use std::sync::{Arc, Weak};

use tether_path::Path;

use crate::broadcast::Broadcaster;
use crate::capability::Capabilities;
use crate::value::{Payload, ValueType};

/// A bound (or bindable) target object, seen by the engine as an opaque
/// shared value. The engine is reflection-agnostic: everything it knows
/// about an object comes from the bindables a scanner produced for it.
pub type Object = Arc<dyn Any + Send + Sync>;

/// A non-owning observation of an [`Object`]. `upgrade()` fails exactly
/// when the last strong reference is gone — liveness is deterministic.
pub type WeakObject = Weak<dyn Any + Send + Sync>;

/// One named, typed, capability-tagged access point on an object.
///
/// A bindable is created by a scanner in a detached state (no object).
/// Attaching it may register change listeners on the instance that
/// translate its native notifications into [`Bindable::broadcast`];
/// detaching must unregister them, exactly once. While attached, the
/// bindable may hold the instance strongly — an actively bound value must
/// stay reachable — but a detached bindable never keeps an object alive.
///
/// One scanned template is attached to many instances by cloning:
/// [`Bindable::clone_detached`] yields an independent copy with the same
/// path, capabilities, and value types, but no attachment and no
/// listeners, so concurrent attachments never cross-talk.
pub trait Bindable: Send + Sync {
    /// Name of this access point, relative to its declaring object.
    fn path(&self) -> &Path;

    /// What this access point can do.
    fn capabilities(&self) -> Capabilities;

    /// Declared type of each positional broadcast argument.
    fn value_types(&self) -> &[ValueType];

    /// The currently attached object, if any.
    fn object(&self) -> Option<Object>;

    /// Attach to `object`, or detach with `None`.
    ///
    /// Attaching over an existing attachment first detaches cleanly.
    /// Listener registration/unregistration is exactly-once.
    fn set_object(&self, object: Option<Object>);

    /// An independent detached copy of this access point.
    fn clone_detached(&self) -> Arc<dyn Bindable>;

    /// Accept a pushed payload, writing it into the attached object.
    ///
    /// Capability-gated and silent: a bindable that cannot consume, is
    /// detached, or receives a payload of the wrong shape refuses with a
    /// named [`BindOutcome`] instead of panicking, so one incompatible
    /// consumer never aborts delivery to the rest of its group.
    fn try_consume(&self, payload: &Payload) -> BindOutcome;

    /// Run this access point as a command with `args`. Same gating rules
    /// as [`Bindable::try_consume`], against the EXECUTE capability.
    fn try_execute(&self, args: &Payload) -> BindOutcome {
        let _ = args;
        BindOutcome::NotCapable
    }

    /// The values currently held by the attached object at this access
    /// point, or `None` when detached or unreadable.
    fn current_values(&self) -> Option<Payload> {
        None
    }

    /// The produce-side event, present iff the PRODUCE capability is set.
    /// Valves subscribe here to receive inbound change notifications.
    fn broadcast(&self) -> Option<&Broadcaster<Payload>> {
        None
    }
}

impl fmt::Debug for dyn Bindable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindable")
            .field("path", &self.path().to_string())
            .field("capabilities", &self.capabilities())
            .field("attached", &self.object().is_some())
            .finish()
    }
}

/// Named outcome of a capability-gated operation on a bindable.
///
/// Every refusal path is an observable value — nothing is silently lost —
/// but none of them is an error: heterogeneous broadcast groups routinely
/// skip members that do not match a payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindOutcome {
    /// The payload was consumed (or the command executed).
    Handled,
    /// The bindable lacks the required capability.
    NotCapable,
    /// The bindable has no attached object.
    Detached,
    /// Payload arity differs from the declared value types.
    ArityMismatch {
        /// Declared positional argument count.
        expected: usize,
        /// Actual payload length.
        actual: usize,
    },
    /// A payload position holds a value of an incompatible runtime type.
    TypeMismatch {
        /// First incompatible position.
        position: usize,
    },
    /// The handler panicked; assigned by the delivery loop that caught it.
    Faulted,
}

impl BindOutcome {
    /// Whether the operation went through.
    #[must_use]
    pub fn handled(&self) -> bool {
        matches!(self, Self::Handled)
    }
}

/// Check a payload against declared value types: arity first, then
/// per-position runtime-type compatibility. `None` means deliverable.
#[must_use]
pub fn gate_payload(declared: &[ValueType], payload: &Payload) -> Option<BindOutcome> {
    if declared.len() != payload.len() {
        return Some(BindOutcome::ArityMismatch {
            expected: declared.len(),
            actual: payload.len(),
        });
    }
    declared
        .iter()
        .zip(payload)
        .position(|(ty, value)| !ty.accepts(value))
        .map(|position| BindOutcome::TypeMismatch { position })
}
