//! Least-recently-used cache policy.
//!
//! Generalized from the teacher's `LruPolicy` (an MRU-ordered stack per set)
//! to the spec's explicit "oldest read/write timestamp" wording (spec §6
//! "cache replacement policy" and the LRU invariant in `cache_replacement`):
//! rather than re-deriving recency from stack position, each way stores the
//! logical tick at which it was last touched, and the victim is the way with
//! the smallest one. This is what lets `_accesses_overlap` (the hazard scan)
//! pass `side_effects=false` and leave the policy's notion of recency
//! completely undisturbed, per Design Notes ("Cache side effect on read
//! during LRU").

use super::ReplacementPolicy;

/// Tracks, per `(set, way)`, the logical time of the last touch/allocate.
#[derive(Clone)]
pub struct LruPolicy {
    timestamps: Vec<Vec<u64>>,
    clock: u64,
}

impl LruPolicy {
    /// Builds the policy for a cache with `sets` sets of `ways` ways each,
    /// all ways starting equally "old".
    #[must_use]
    pub fn new(sets: usize, ways: usize) -> Self {
        Self { timestamps: vec![vec![0; ways]; sets], clock: 0 }
    }

    fn bump(&mut self, set: usize, way: usize) {
        self.clock += 1;
        self.timestamps[set][way] = self.clock;
    }
}

impl ReplacementPolicy for LruPolicy {
    fn touch(&mut self, set: usize, way: usize) {
        self.bump(set, way);
    }

    fn on_allocate(&mut self, set: usize, way: usize) {
        self.bump(set, way);
    }

    fn choose_victim(&mut self, set: usize) -> usize {
        let row = &self.timestamps[set];
        row.iter()
            .enumerate()
            .min_by_key(|&(_, &ts)| ts)
            .map_or(0, |(way, _)| way)
    }
}

#[cfg(test)]
mod tests {
    use super::{LruPolicy, ReplacementPolicy};

    #[test]
    fn untouched_way_is_evicted_first() {
        let mut policy = LruPolicy::new(1, 2);
        policy.on_allocate(0, 0);
        policy.on_allocate(0, 1);
        assert_eq!(policy.choose_victim(0), 0);
    }

    #[test]
    fn touching_a_way_protects_it_from_the_next_eviction() {
        let mut policy = LruPolicy::new(1, 2);
        policy.on_allocate(0, 0);
        policy.on_allocate(0, 1);
        policy.touch(0, 0);
        assert_eq!(policy.choose_victim(0), 1);
    }
}
