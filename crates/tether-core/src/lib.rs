#![forbid(unsafe_code)]

//! The tether binding engine.
//!
//! tether keeps the values of matching access points on independent objects
//! synchronized without owning those objects. The moving parts, leaves
//! first:
//!
//! - [`Value`]/[`Payload`]: type-erased shared values with captured
//!   equality, one per positional broadcast argument.
//! - [`Broadcaster`]/[`Subscription`]: a thread-safe subscriber list with
//!   RAII unsubscription; subscribers are held weakly and pruned lazily.
//! - [`Bindable`]: one capability-tagged access point (property, event,
//!   command) on a possibly-absent target object.
//! - [`Conduit`]: one cloned bindable paired with one weakly observed root
//!   object at an absolute [`Path`](tether_path::Path).
//! - [`Valve`]/[`StateValve`]: a broadcast group relaying payloads among
//!   live bindables; the state variant drops payloads equal to the last
//!   one it propagated.
//! - [`Fixture`]: the matching algorithm — groups conduits with equal
//!   absolute paths into valves, recursively, over shared path prefixes.
//!
//! # Lifetime model
//!
//! 1. The engine never owns bound objects: conduits and valves observe
//!    weakly, and reclaimed entries are pruned as a side effect of
//!    iteration.
//! 2. While a conduit is attached, its bindable may hold the object
//!    strongly (listener registrations) — an actively bound value must
//!    stay reachable. Releasing the attachment drops that hold.
//! 3. Dropping a fixture releases everything it wired.
//!
//! # Propagation model
//!
//! 1. Deliveries within one valve never interleave: a per-valve gate
//!    serializes pushes from different producers, while a synchronous
//!    cascade on the same thread re-enters without deadlock.
//! 2. A [`StateValve`] drops a payload equal to the last propagated one
//!    before any consumer is touched, which breaks rebroadcast ping-pong
//!    between bound objects.
//! 3. A consumer that rejects a payload (wrong arity, wrong types, no
//!    consume capability, detached) is skipped with a named outcome and
//!    never aborts delivery to the rest; a consumer panic is caught and
//!    reported per consumer.

pub mod bindable;
pub mod broadcast;
pub mod capability;
pub mod conduit;
pub mod fixture;
pub mod scan;
pub mod valve;
pub mod value;

#[cfg(test)]
mod testing;

pub use bindable::{BindOutcome, Bindable, Object, WeakObject, gate_payload};
pub use broadcast::{Broadcaster, Subscription};
pub use capability::Capabilities;
pub use conduit::{Attachment, Conduit};
pub use fixture::Fixture;
pub use scan::{CombinedScanner, Scanner, ScopedScanner};
pub use valve::{DeliveryReport, PushOutcome, Skip, StateValve, Valve, ValveError};
pub use value::{Payload, Value, ValueType, payload_eq};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the guard if a holder panicked mid-update.
/// Engine critical sections only move owned data, so a poisoned state is
/// still consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
