#![forbid(unsafe_code)]

//! Concrete discovery for tether.
//!
//! The core engine is reflection-agnostic: it consumes
//! [`Bindable`](tether_core::Bindable)s and never inspects objects. This
//! crate supplies the discovery side — the Rust restatement of runtime
//! reflection:
//!
//! - [`TypeSchema`]: a typed builder declaring a type's bindable members
//!   (properties, read-only properties, signals, commands, nested child
//!   objects), erased once at registration.
//! - [`MemberScanner`]: binds declared members as-is; without a change
//!   notification source they can consume and be read, not broadcast.
//! - [`NotifyScanner`]: the change-notification convention — registered
//!   types implement [`Notify`], and scanned members gain the produce
//!   capability by subscribing a name-filtered listener that translates
//!   the object's native [`MemberChange`] into the bindable's broadcast.
//! - [`Mixin`]/[`MixinScanner`]: extension objects scanned as if they
//!   were the target type, re-homed so each attachment binds a fresh
//!   mixin clone to the real instance.
//!
//! Scanning is `TypeId`-keyed: all type knowledge is captured in closures
//! at registration, so an unknown object scans to nothing rather than
//! failing. Nested child members flatten a child type's schema into the
//! parent's path namespace with composed accessors; the recursion is
//! cycle-guarded per scan, and [`ScopedScanner`](tether_core::ScopedScanner)
//! hands recursive callers a derived scanner with the same registrations.

pub mod member;
pub mod mixin;
pub mod scanner;
pub mod schema;

pub use member::MemberBindable;
pub use mixin::{Mixin, MixinScanner};
pub use scanner::{MemberScanner, NotifyScanner};
pub use schema::{ChangeSink, MemberChange, Notify, TypeSchema};
