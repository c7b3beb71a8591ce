//! The cross-object matching algorithm.
//!
//! Given N root objects and a [`Scanner`], fixture building wires every
//! access point that at least two distinct roots expose under the same
//! absolute path into one [`StateValve`], recursively over shared path
//! prefixes. The result is a deterministic tree: children are ordered by
//! the path total order, and a branch that cannot bind anything (fewer
//! than two conduits at every node beneath it) never survives.
//!
//! A fixture owns what it wired — attachment handles and valves — and
//! nothing else. Dropping (or disposing) a fixture releases every
//! attachment, which detaches the bindables and lets the root objects be
//! reclaimed as soon as nothing external holds them.

use core::fmt;
use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashSet;
use tether_path::{Path, Syllable};

use crate::bindable::Object;
use crate::conduit::{Attachment, Conduit};
use crate::scan::Scanner;
use crate::valve::StateValve;

/// One node of the binding tree: the conduits whose absolute paths equal
/// this node's path, wired into one valve, plus children for paths that
/// share this node's path as a prefix and continue past it.
pub struct Fixture {
    path: Path,
    conduits: Vec<Arc<Conduit>>,
    valve: Option<Arc<StateValve>>,
    children: Vec<Fixture>,
    attachments: Vec<Attachment>,
}

struct Entry {
    conduit: Arc<Conduit>,
    remaining: Path,
}

impl Fixture {
    /// Scan `roots` and wire every binding site they share.
    ///
    /// Each scanned bindable is wrapped as a [`Conduit`] at its own path
    /// (root-relative, no base), tagged with the root's index. Conduits
    /// at materialized binding sites are attached eagerly so the valves
    /// observe live producer events; the attachment handles are owned by
    /// the returned fixtures.
    ///
    /// Roots with disjoint member sets yield no fixtures at all.
    #[must_use]
    pub fn create_fixtures(scanner: &dyn Scanner, roots: &[Object]) -> Vec<Fixture> {
        let mut entries = Vec::new();
        for (tag, root) in roots.iter().enumerate() {
            for template in scanner.scan(root) {
                let conduit = Arc::new(Conduit::new(&template, root, None, tag));
                let remaining = conduit.absolute_path().clone();
                entries.push(Entry { conduit, remaining });
            }
        }
        tracing::debug!(
            roots = roots.len(),
            conduits = entries.len(),
            "building fixtures"
        );
        build_children(&Path::root(), entries)
    }

    /// This node's absolute path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The conduits bound at exactly this path (empty for interior
    /// nodes).
    #[must_use]
    pub fn conduits(&self) -> &[Arc<Conduit>] {
        &self.conduits
    }

    /// The valve relaying values among this node's conduits, if the node
    /// is a materialized binding site.
    #[must_use]
    pub fn valve(&self) -> Option<&Arc<StateValve>> {
        self.valve.as_ref()
    }

    /// Child fixtures, ordered by the path total order.
    #[must_use]
    pub fn children(&self) -> &[Fixture] {
        &self.children
    }

    /// This node and every descendant, depth first.
    pub fn iter(&self) -> impl Iterator<Item = &Fixture> {
        let mut stack = vec![self];
        core::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// Release every attachment and dispose every valve in this subtree.
    ///
    /// Dropping the fixture does the same implicitly; disposing makes the
    /// teardown observable (valves fire their disposing notification).
    pub fn dispose(&mut self) {
        for attachment in self.attachments.drain(..) {
            attachment.release();
        }
        if let Some(valve) = &self.valve {
            valve.dispose();
        }
        for child in &mut self.children {
            child.dispose();
        }
    }
}

impl fmt::Debug for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fixture")
            .field("path", &self.path.to_string())
            .field("conduits", &self.conduits.len())
            .field("bound", &self.valve.is_some())
            .field("children", &self.children.len())
            .finish()
    }
}

/// Partition `entries` by the leading syllable of their remaining path
/// and build a child per syllable group reached from ≥ 2 distinct roots.
fn build_children(base: &Path, entries: Vec<Entry>) -> Vec<Fixture> {
    let mut groups: BTreeMap<Syllable, Vec<Entry>> = BTreeMap::new();
    for entry in entries {
        let Some((head, tail)) = entry.remaining.split_first() else {
            // A root-level bindable with an empty name has nothing to
            // match under any syllable group.
            tracing::trace!(
                path = %entry.conduit.absolute_path(),
                "unnamed access point discarded"
            );
            continue;
        };
        let head = head.clone();
        groups.entry(head).or_default().push(Entry {
            conduit: entry.conduit,
            remaining: tail,
        });
    }

    let mut children = Vec::new();
    for (syllable, group) in groups {
        let mut roots = AHashSet::new();
        for entry in &group {
            roots.insert(entry.conduit.tag());
        }
        if roots.len() < 2 {
            continue;
        }
        let path = base.join(&Path::single(syllable));
        if let Some(node) = build_node(path, group) {
            children.push(node);
        }
    }
    children
}

/// Build the node at `path`: exhausted entries become its bound conduits,
/// deeper entries recurse into children. Returns `None` when neither
/// materializes — empty branches do not survive.
fn build_node(path: Path, entries: Vec<Entry>) -> Option<Fixture> {
    let mut leaves = Vec::new();
    let mut deeper = Vec::new();
    for entry in entries {
        if entry.remaining.is_root() {
            leaves.push(entry.conduit);
        } else {
            deeper.push(entry);
        }
    }

    let children = build_children(&path, deeper);

    let mut conduits = Vec::new();
    let mut attachments = Vec::new();
    let mut valve = None;
    if leaves.len() >= 2 {
        let state_valve = StateValve::new();
        for conduit in leaves {
            let Some(attachment) = conduit.attach() else {
                tracing::trace!(
                    path = %conduit.absolute_path(),
                    "root object reclaimed before wiring"
                );
                continue;
            };
            match state_valve.add(conduit.bindable()) {
                Ok(()) => {
                    attachments.push(attachment);
                    conduits.push(conduit);
                }
                Err(error) => tracing::debug!(%error, "valve rejected conduit"),
            }
        }
        if conduits.len() >= 2 {
            valve = Some(state_valve);
        } else {
            // Attachments release on drop; a lone survivor cannot bind.
            conduits.clear();
            attachments.clear();
        }
    }

    if valve.is_none() && children.is_empty() {
        tracing::trace!(path = %path, "empty fixture branch dropped");
        return None;
    }
    Some(Fixture {
        path,
        conduits,
        valve,
        children,
        attachments,
    })
}
