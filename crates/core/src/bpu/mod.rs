//! Branch Prediction Unit (spec §4.3).
//!
//! Two variants behind one trait, matching the teacher's
//! `BranchPredictorWrapper` pattern: static dispatch over a closed set of
//! implementations rather than `Box<dyn BranchPredictor>`, since the fetch
//! loop calls `predict` every cycle a branch is enqueued.

use crate::common::Word;
use crate::config::BpuConfig;

/// Simple, single-counter predictor.
pub mod simple;
/// Indexed, `2^k`-counter predictor.
pub mod indexed;

pub use indexed::IndexedBpu;
pub use simple::SimpleBpu;

/// The interface both BPU variants share.
pub trait BranchPredictor {
    /// Predicts whether the branch at `pc` will be taken.
    fn predict(&self, pc: Word) -> bool;
    /// Updates the predictor with a branch's retired outcome.
    fn update(&mut self, pc: Word, taken: bool);
    /// Directly sets the counter covering `pc` to `value` (0..=3). Used by
    /// test harnesses (spec §8 S2: "BPU initial counter = 2").
    fn set(&mut self, pc: Word, value: u8);
}

/// The bimodal counter's exact transition table (spec §4.3).
///
/// Not a standard saturating counter: on `taken`, state `0` goes to `1` (not
/// straight to a middle "weakly taken" state) while every other state jumps
/// to `3`; on `!taken`, state `3` steps down to `2` but every other state
/// resets all the way to `0`. spec.md's Design Notes flag that the source
/// this was distilled from contains two incompatible transition functions
/// and explicitly resolves the ambiguity in favor of this one because it is
/// the variant used across the majority of the original's source files.
#[must_use]
pub fn bimodal_update(state: u8, taken: bool) -> u8 {
    if taken {
        if state == 0 { 1 } else { 3 }
    } else if state == 3 {
        2
    } else {
        0
    }
}

/// Enum wrapper over the two BPU implementations for static dispatch.
#[derive(Clone)]
pub enum BpuWrapper {
    /// A single 2-bit counter shared across all program counters.
    Simple(SimpleBpu),
    /// `2^k` counters, indexed by `pc mod 2^k`.
    Indexed(IndexedBpu),
}

impl BpuWrapper {
    /// Builds the configured predictor variant.
    #[must_use]
    pub fn new(config: &BpuConfig) -> Self {
        if config.advanced {
            Self::Indexed(IndexedBpu::new(config.index_bits, config.init_counter))
        } else {
            Self::Simple(SimpleBpu::new(config.init_counter))
        }
    }
}

impl BranchPredictor for BpuWrapper {
    fn predict(&self, pc: Word) -> bool {
        match self {
            Self::Simple(bpu) => bpu.predict(pc),
            Self::Indexed(bpu) => bpu.predict(pc),
        }
    }

    fn update(&mut self, pc: Word, taken: bool) {
        match self {
            Self::Simple(bpu) => bpu.update(pc, taken),
            Self::Indexed(bpu) => bpu.update(pc, taken),
        }
    }

    fn set(&mut self, pc: Word, value: u8) {
        match self {
            Self::Simple(bpu) => bpu.set(pc, value),
            Self::Indexed(bpu) => bpu.set(pc, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::bimodal_update;

    #[test]
    fn bimodal_table_matches_spec_exactly() {
        assert_eq!(bimodal_update(0, true), 1);
        assert_eq!(bimodal_update(1, true), 3);
        assert_eq!(bimodal_update(2, true), 3);
        assert_eq!(bimodal_update(3, true), 3);

        assert_eq!(bimodal_update(3, false), 2);
        assert_eq!(bimodal_update(0, false), 0);
        assert_eq!(bimodal_update(1, false), 0);
        assert_eq!(bimodal_update(2, false), 0);
    }
}
