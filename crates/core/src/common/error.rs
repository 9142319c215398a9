//! Architectural faults and the core's error taxonomy.
//!
//! Two very different things are called "errors" by the engine and it is
//! important to keep them apart:
//!
//! - A [`Trap`] is not a bug. It is an architectural fault — a protected-memory
//!   access or a branch misprediction — that is part of the machine's normal,
//!   specified behavior and is always surfaced to the driver via `tick`'s
//!   return value, never hidden.
//! - A [`CoreError`] is everything else: front-end usage mistakes (fetching
//!   from an empty queue, steering to an out-of-range index) and configuration
//!   mistakes (an invalid cache shape). The core never silently continues past
//!   one of these; it returns `Err` instead.
//!
//! A third category, programming-invariant violations (for example asking a
//! slot for its result before its operands are concrete), is not represented
//! here at all: those remain `debug_assert!`/panic, since they indicate a bug
//! in the caller rather than a condition the driver can recover from.

use thiserror::Error;

use super::word::Word;

/// The kind of architectural fault that occurred.
///
/// `Flush` never appears here: a flush passes through the memory subsystem to
/// model its cycle cost but cannot itself fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// A load read a byte in the protected upper half of memory.
    Load,
    /// A store wrote a byte in the protected upper half of memory.
    Store,
    /// A branch retired with an outcome that disagreed with its prediction.
    Branch,
}

/// The architectural fault payload surfaced by [`crate::engine::ExecutionEngine::tick`].
///
/// Rollback has already happened by the time a `Trap` reaches the driver: the
/// register file holds the faulting slot's snapshot, the reservation station
/// is empty, and the cache (deliberately) still holds whatever it filled
/// speculatively before the fault was known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Trap {
    /// Program counter of the faulting instruction.
    pub pc: Word,
    /// What kind of fault this was.
    pub kind: FaultKind,
    /// For `Branch` faults, the prediction that was supplied at issue and
    /// disagreed with the retired outcome. `None` for memory faults.
    pub prediction: Option<bool>,
    /// For `Load`/`Store` faults, the effective address that was accessed.
    /// `None` for branch faults.
    pub address: Option<Word>,
}

impl Trap {
    /// Builds the payload for a memory fault (`Load` or `Store`).
    #[must_use]
    pub fn memory(pc: Word, kind: FaultKind, address: Word) -> Self {
        debug_assert!(matches!(kind, FaultKind::Load | FaultKind::Store));
        Self { pc, kind, prediction: None, address: Some(address) }
    }

    /// Builds the payload for a branch misprediction.
    #[must_use]
    pub fn branch(pc: Word, prediction: bool) -> Self {
        Self { pc, kind: FaultKind::Branch, prediction: Some(prediction), address: None }
    }

    /// The program counter the driver should resume issuing at, per the
    /// driver contract: `pc + 1` for memory faults (the faulting instruction
    /// is skipped), `pc` for branch mispredicts (re-steered to the correct
    /// target by the driver).
    #[must_use]
    pub fn resume_pc(&self) -> Word {
        match self.kind {
            FaultKind::Load | FaultKind::Store => self.pc.wrapping_add(Word::new(1)),
            FaultKind::Branch => self.pc,
        }
    }
}

/// Usage and configuration errors the core reports rather than panicking on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Tried to fetch or pop an instruction from an empty front-end queue.
    #[error("front-end instruction queue is empty")]
    QueueEmpty,

    /// Tried to steer the front end (e.g. `set_pc`, `add_instructions_after_branch`)
    /// to an index outside the current queue.
    #[error("index {index} out of range for queue of length {len}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The queue length at the time of the call.
        len: usize,
    },

    /// `add_instructions_after_branch` was called against a queue slot that
    /// does not hold a branch instruction.
    #[error("instruction at index {index} is not a branch")]
    NotABranch {
        /// The offending index.
        index: usize,
    },

    /// A reservation-station slot could not be allocated because a `Fence`
    /// is currently in flight, or because no free slot exists.
    #[error("no free reservation-station slot is available to issue into")]
    NoFreeSlot,

    /// A cache was configured with a number of tag bits that does not evenly
    /// divide the address space, or with zero sets/ways.
    #[error("invalid cache configuration: {0}")]
    InvalidCacheConfig(String),

    /// A configuration named a replacement policy that is not one of
    /// `rr`, `lru`, `fifo`.
    #[error("unknown cache replacement policy: {0}")]
    UnknownReplacementPolicy(String),

    /// A configuration value was out of its accepted range (e.g. a queue
    /// bound of zero, a slot count of zero).
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        /// The configuration field that failed validation.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
