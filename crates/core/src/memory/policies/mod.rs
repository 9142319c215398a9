//! Cache replacement policies.
//!
//! Mirrors the shape of a hardware cache's victim-selection logic: each
//! policy tracks whatever bookkeeping it needs per `(set, way)` and exposes
//! the same three-method interface so `Cache` can stay policy-agnostic.

use rr::RrPolicy;

/// Round-robin (LFSR-driven) replacement.
pub mod rr;
/// Least-recently-used replacement.
pub mod lru;
/// First-in-first-out replacement.
pub mod fifo;

pub use fifo::FifoPolicy;
pub use lru::LruPolicy;

/// Trait for cache victim-selection policies.
pub trait ReplacementPolicy {
    /// Called whenever a way is read as a hit and the access should count
    /// toward recency bookkeeping (i.e. `side_effects` was requested).
    fn touch(&mut self, set: usize, way: usize);

    /// Called whenever a way transitions from empty to holding data: either
    /// a fresh fill into a previously-unused way, or a fill chosen by
    /// [`ReplacementPolicy::choose_victim`] and then cleared for reuse.
    fn on_allocate(&mut self, set: usize, way: usize);

    /// Chooses which way within `set` to evict, given that all ways are
    /// currently occupied.
    fn choose_victim(&mut self, set: usize) -> usize;
}

/// Enum wrapper over the replacement-policy implementations for static
/// dispatch in the cache's hot read/write path (no `Box<dyn Trait>`).
#[derive(Clone)]
pub enum ReplacementPolicyWrapper {
    /// Random-replacement (LFSR).
    Rr(RrPolicy),
    /// Least-recently-used.
    Lru(LruPolicy),
    /// First-in-first-out.
    Fifo(FifoPolicy),
}

impl ReplacementPolicyWrapper {
    /// Builds the round-robin/LFSR policy for a cache of the given shape.
    #[must_use]
    pub fn rr(sets: usize, ways: usize) -> Self {
        Self::Rr(RrPolicy::new(sets, ways))
    }

    /// Builds the LRU policy for a cache of the given shape.
    #[must_use]
    pub fn lru(sets: usize, ways: usize) -> Self {
        Self::Lru(LruPolicy::new(sets, ways))
    }

    /// Builds the FIFO policy for a cache of the given shape.
    #[must_use]
    pub fn fifo(sets: usize, ways: usize) -> Self {
        Self::Fifo(FifoPolicy::new(sets, ways))
    }
}

impl ReplacementPolicy for ReplacementPolicyWrapper {
    fn touch(&mut self, set: usize, way: usize) {
        match self {
            Self::Rr(p) => p.touch(set, way),
            Self::Lru(p) => p.touch(set, way),
            Self::Fifo(p) => p.touch(set, way),
        }
    }

    fn on_allocate(&mut self, set: usize, way: usize) {
        match self {
            Self::Rr(p) => p.on_allocate(set, way),
            Self::Lru(p) => p.on_allocate(set, way),
            Self::Fifo(p) => p.on_allocate(set, way),
        }
    }

    fn choose_victim(&mut self, set: usize) -> usize {
        match self {
            Self::Rr(p) => p.choose_victim(set),
            Self::Lru(p) => p.choose_victim(set),
            Self::Fifo(p) => p.choose_victim(set),
        }
    }
}
