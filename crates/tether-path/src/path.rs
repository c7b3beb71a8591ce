//! Immutable hierarchical names.

use core::fmt;
use core::ops::Add;
use std::sync::Arc;

use crate::syllable::Syllable;

/// An ordered, immutable sequence of [`Syllable`]s naming a binding point.
///
/// Cloning is cheap (the syllable storage is shared). Equality, ordering,
/// and hashing are all defined on the flattened syllable sequence, so a
/// path built as `"a" + "b/c"` is indistinguishable from one built as
/// `"a/b" + "c"`.
///
/// The total order is lexicographic over syllables with the shorter path
/// sorting first on a tie, which puts a prefix immediately before every
/// path it prefixes: `[a] < [a, b] < [a, b, c]`.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path {
    syllables: Arc<[Syllable]>,
}

impl Path {
    /// The empty path. It names the root, is a prefix of every path, and
    /// compares least.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// A single-syllable path.
    #[must_use]
    pub fn single(syllable: Syllable) -> Self {
        Self {
            syllables: Arc::from([syllable]),
        }
    }

    /// Number of syllables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.syllables.len()
    }

    /// Whether this is the root (empty) path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.syllables.is_empty()
    }

    /// The syllable sequence.
    #[must_use]
    pub fn syllables(&self) -> &[Syllable] {
        &self.syllables
    }

    /// Iterate over the syllables in order.
    pub fn iter(&self) -> impl Iterator<Item = &Syllable> {
        self.syllables.iter()
    }

    /// Concatenate, yielding `self` followed by `other`.
    ///
    /// Associative: `(p.join(q)).join(r) == p.join(&q.join(r))`. Joining
    /// the root on either side is an identity (up to storage sharing).
    #[must_use]
    pub fn join(&self, other: &Path) -> Path {
        if other.is_root() {
            return self.clone();
        }
        if self.is_root() {
            return other.clone();
        }
        let mut combined = Vec::with_capacity(self.len() + other.len());
        combined.extend_from_slice(&self.syllables);
        combined.extend_from_slice(&other.syllables);
        Path {
            syllables: combined.into(),
        }
    }

    /// Prefix test: `true` iff the longest common leading run of syllables
    /// between `self` and `prefix` has the length of `prefix`.
    #[must_use]
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.syllables.starts_with(&prefix.syllables)
    }

    /// Relative subtraction: the suffix of `self` after `base`.
    ///
    /// Defined only when `base` is a prefix of `self`; otherwise `None`.
    /// `p.join(q).relative_to(p)` always yields `q`.
    #[must_use]
    pub fn relative_to(&self, base: &Path) -> Option<Path> {
        if !self.starts_with(base) {
            return None;
        }
        Some(Path {
            syllables: self.syllables[base.len()..].into(),
        })
    }

    /// Split into the leading syllable and the remaining suffix.
    ///
    /// `None` for the root path.
    #[must_use]
    pub fn split_first(&self) -> Option<(&Syllable, Path)> {
        let (first, rest) = self.syllables.split_first()?;
        Some((
            first,
            Path {
                syllables: rest.into(),
            },
        ))
    }
}

impl FromIterator<Syllable> for Path {
    fn from_iter<I: IntoIterator<Item = Syllable>>(iter: I) -> Self {
        Self {
            syllables: iter.into_iter().collect(),
        }
    }
}

impl From<Syllable> for Path {
    fn from(syllable: Syllable) -> Self {
        Self::single(syllable)
    }
}

impl Add<&Path> for &Path {
    type Output = Path;

    fn add(self, rhs: &Path) -> Path {
        self.join(rhs)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (ix, syllable) in self.syllables.iter().enumerate() {
            if ix > 0 {
                f.write_str(".")?;
            }
            f.write_str(syllable.as_str())?;
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({self})")
    }
}
