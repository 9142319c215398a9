//! Reservation-station slot identifiers.
//!
//! A [`SlotId`] is an index into the engine's fixed `slots` array. It is the
//! only way register-file entries, other slots' source operands, and
//! per-slot bookkeeping (`faulting_preceding`, hazard sets, `Fence`'s
//! `preceding`) refer to an in-flight instruction — never a back-pointer into
//! the engine itself (see Design Notes: "Cyclic references").

use std::fmt;

/// Identifies an occupied reservation-station slot by its index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

impl SlotId {
    /// Wraps a raw slot index.
    #[inline]
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotId({})", self.0)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
