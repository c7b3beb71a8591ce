//! Weak attachment of one bindable to one root object.

use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tether_path::Path;

use crate::bindable::{Bindable, Object, WeakObject};

/// One cloned bindable paired with one weakly observed root object at an
/// absolute path.
///
/// The conduit clones its template at construction — a scanned template is
/// never shared across roots — and holds the root only as a non-owning
/// observation. State machine: `Detached → Attached → Detached`.
///
/// While attached, the bindable may hold the object strongly through its
/// listener registrations; releasing the [`Attachment`] drops that hold,
/// and once the last external strong reference is gone a later
/// [`Conduit::attach`] deterministically fails instead of resurrecting a
/// differently-identified instance.
pub struct Conduit {
    bindable: Arc<dyn Bindable>,
    target: WeakObject,
    absolute_path: Path,
    tag: usize,
}

impl Conduit {
    /// Pair a clone of `template` with `root`.
    ///
    /// The absolute path is `base + template.path()`, or just the
    /// template's own path without a base. `tag` is an opaque correlation
    /// value echoed back by [`Conduit::tag`]; fixture building uses the
    /// root's index.
    #[must_use]
    pub fn new(
        template: &Arc<dyn Bindable>,
        root: &Object,
        base: Option<&Path>,
        tag: usize,
    ) -> Self {
        let bindable = template.clone_detached();
        let absolute_path = match base {
            Some(base) => base.join(bindable.path()),
            None => bindable.path().clone(),
        };
        Self {
            bindable,
            target: Arc::downgrade(root),
            absolute_path,
            tag,
        }
    }

    /// The conduit's own bindable clone.
    #[must_use]
    pub fn bindable(&self) -> &Arc<dyn Bindable> {
        &self.bindable
    }

    /// Where this access point lives in the root's namespace.
    #[must_use]
    pub fn absolute_path(&self) -> &Path {
        &self.absolute_path
    }

    /// The caller-supplied correlation tag.
    #[must_use]
    pub fn tag(&self) -> usize {
        self.tag
    }

    /// Whether the observed root object is still alive.
    #[must_use]
    pub fn is_target_alive(&self) -> bool {
        self.target.strong_count() > 0
    }

    /// Resolve the observation and wire the bindable to the live object.
    ///
    /// Returns `None` if the root has already been reclaimed — the
    /// expected non-fatal outcome, not an error. On success the returned
    /// handle owns the attachment: dropping or [`Attachment::release`]-ing
    /// it detaches the bindable again.
    ///
    /// At most one attachment should be outstanding per conduit; attaching
    /// again re-binds the same bindable to the (same) live object.
    #[must_use]
    pub fn attach(&self) -> Option<Attachment> {
        let live = self.target.upgrade()?;
        self.bindable.set_object(Some(live));
        Some(Attachment {
            bindable: Arc::clone(&self.bindable),
            released: AtomicBool::new(false),
        })
    }
}

impl fmt::Debug for Conduit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conduit")
            .field("path", &self.absolute_path.to_string())
            .field("tag", &self.tag)
            .field("target_alive", &self.is_target_alive())
            .finish()
    }
}

/// Scoped handle for one successful [`Conduit::attach`].
///
/// Releasing detaches the bindable (`set_object(None)`), dropping any
/// strong hold on the instance. Releasing twice — explicitly or via drop —
/// is a no-op.
pub struct Attachment {
    bindable: Arc<dyn Bindable>,
    released: AtomicBool,
}

impl Attachment {
    /// Detach now. Idempotent.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.bindable.set_object(None);
        }
    }

    /// Whether this handle has already been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("released", &self.is_released())
            .finish()
    }
}
