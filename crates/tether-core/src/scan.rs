//! Discovery contracts.
//!
//! The engine never inspects objects itself — a [`Scanner`] collaborator
//! turns a live object into the bindables that describe its access
//! points. Concrete strategies live outside the core; this module only
//! fixes the seams.

use std::sync::Arc;

use crate::bindable::{Bindable, Object};

/// Turns a live object into its bindable access points.
///
/// Scanning an object the strategy knows nothing about yields an empty
/// sequence, not an error. Returned bindables are detached templates;
/// callers clone them per attachment (see
/// [`Conduit::new`](crate::Conduit::new)).
pub trait Scanner: Send + Sync {
    /// Discover `object`'s access points.
    fn scan(&self, object: &Object) -> Vec<Arc<dyn Bindable>>;
}

/// A [`Scanner`] that can derive a narrowed scanner for recursive
/// discovery.
///
/// A scope shares the parent's knowledge but carries fresh recursion
/// state, so a fixture subtree (or a nested-object expansion) can rescan
/// without revisiting what is already on the current path.
pub trait ScopedScanner: Scanner {
    /// Derive a scanner for one nested discovery pass.
    fn new_scope(&self) -> Arc<dyn ScopedScanner>;
}

/// Composes several scanners by concatenating their results in order.
#[derive(Default)]
pub struct CombinedScanner {
    parts: Vec<Arc<dyn Scanner>>,
}

impl CombinedScanner {
    /// An empty composition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a scanner, builder style.
    #[must_use]
    pub fn with(mut self, scanner: Arc<dyn Scanner>) -> Self {
        self.parts.push(scanner);
        self
    }

    /// Number of composed scanners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Whether the composition is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl Scanner for CombinedScanner {
    fn scan(&self, object: &Object) -> Vec<Arc<dyn Bindable>> {
        self.parts
            .iter()
            .flat_map(|scanner| scanner.scan(object))
            .collect()
    }
}

impl FromIterator<Arc<dyn Scanner>> for CombinedScanner {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Scanner>>>(iter: I) -> Self {
        Self {
            parts: iter.into_iter().collect(),
        }
    }
}
