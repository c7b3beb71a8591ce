//! Capability flags for bindables.

use bitflags::bitflags;

bitflags! {
    /// What a bindable can do.
    ///
    /// Every capability-gated operation on a bindable lacking the matching
    /// flag is a silent rejection with a named outcome, never a panic.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Can broadcast value changes (has a produce-side event).
        const PRODUCE = 1 << 0;
        /// Can accept a pushed payload.
        const CONSUME = 1 << 1;
        /// Can run a command.
        const EXECUTE = 1 << 2;
    }
}

impl Capabilities {
    /// Whether the PRODUCE flag is set.
    #[must_use]
    pub fn produces(self) -> bool {
        self.contains(Self::PRODUCE)
    }

    /// Whether the CONSUME flag is set.
    #[must_use]
    pub fn consumes(self) -> bool {
        self.contains(Self::CONSUME)
    }

    /// Whether the EXECUTE flag is set.
    #[must_use]
    pub fn executes(self) -> bool {
        self.contains(Self::EXECUTE)
    }
}
