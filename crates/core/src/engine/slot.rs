//! Reservation-station slot state (spec §3 "Reservation-Station Slot").
//!
//! The source this is distilled from models slot kinds through a four-level
//! class hierarchy (spec Design Notes: "Inheritance of slot kinds"). Rust has
//! no implementation inheritance, so this is a flat tagged variant instead:
//! `SlotBody` carries only the per-kind *data* each state machine needs, and
//! the per-cycle `_tick_execute`/`_tick_retire` behavior lives as methods on
//! [`crate::engine::ExecutionEngine`] that match on the variant, rather than
//! virtual dispatch through the variant itself.

use std::collections::HashSet;

use crate::common::{SlotId, Word};
use crate::isa::{BinOp, Cond};
use crate::regfile::{RegEntry, RegisterFile};

/// Which memory operation a `Mem` slot performs.
#[derive(Debug, Clone, Copy)]
pub enum MemOp {
    /// A load of `byte_width` bytes, zero-extended into the destination register.
    Load { byte_width: usize },
    /// A store of `byte_width` bytes from the source value.
    Store { byte_width: usize },
    /// A cache-line eviction; never faults.
    Flush,
}

impl MemOp {
    /// Whether this operation can retire with an architectural fault.
    /// `Flush` cannot (spec §4.1 "Flush ... never faults in normal addresses").
    #[must_use]
    pub const fn can_fault(self) -> bool {
        matches!(self, Self::Load { .. } | Self::Store { .. })
    }

    /// The access width in bytes.
    #[must_use]
    pub const fn byte_width(self) -> usize {
        match self {
            Self::Load { byte_width } | Self::Store { byte_width } => byte_width,
            Self::Flush => 1,
        }
    }
}

/// State for an in-flight ALU instruction (`Reg`/`Imm`).
#[derive(Clone)]
pub struct AluSlot {
    pub op: BinOp,
    pub src1: RegEntry,
    pub src2: RegEntry,
    pub cycles_left: u32,
}

/// State for an in-flight `Load`/`Store`/`Flush`.
#[derive(Clone)]
pub struct MemSlot {
    pub op: MemOp,
    pub rbase: RegEntry,
    pub offset: Word,
    /// The value to store; `Some` only for `Store`.
    pub rs_val: Option<RegEntry>,
    /// The effective address, once `rbase` has resolved.
    pub addr: Option<Word>,
    /// The hazard set: older in-flight potentially-faulting memory slots
    /// whose byte range overlaps this one. Computed once `addr` is known and
    /// shrinks as peers notify retirement; the access is performed once it
    /// is empty.
    pub hazards: Option<HashSet<SlotId>>,
    /// Whether the underlying memory-subsystem access has already happened.
    pub performed: bool,
    /// The resolved result value (zero for `Store`/`Flush`).
    pub value: Option<Word>,
    pub fault: bool,
    pub cycles_value_left: u32,
    pub cycles_fault_left: u32,
}

/// State for an in-flight conditional branch.
#[derive(Clone)]
pub struct BranchSlot {
    pub cond: Cond,
    pub src1: RegEntry,
    pub src2: RegEntry,
    pub cycles_left: u32,
    /// Instruction index the branch targets if taken.
    pub target_index: usize,
    /// Prediction supplied at issue time.
    pub prediction: bool,
    /// The resolved outcome, once the executing phase completes.
    pub taken: Option<bool>,
}

/// State for an in-flight `Cyclecount`. Carries no per-cycle state: it
/// resolves immediately with the engine's current cycle counter.
#[derive(Clone)]
pub struct CyclecountSlot;

/// State for an in-flight `Fence`: the set of older in-flight slots it must
/// outlast before it can execute.
#[derive(Clone)]
pub struct FenceSlot {
    pub preceding: HashSet<SlotId>,
}

/// The per-kind data of an occupied slot.
#[derive(Clone)]
pub enum SlotBody {
    /// `Reg`/`Imm`.
    Alu(AluSlot),
    /// `Load`/`Store`/`Flush`.
    Mem(MemSlot),
    /// `Branch`.
    Branch(BranchSlot),
    /// `Cyclecount`.
    Cyclecount(CyclecountSlot),
    /// `Fence`.
    Fence(FenceSlot),
}

impl SlotBody {
    /// Whether this slot kind is tracked in the engine's `faulting_inflight`
    /// set and carries a rollback snapshot: `Load`/`Store`/`Flush`/`Branch`
    /// (spec §4.1 Issue — note this is a strictly larger set than "kinds
    /// that can actually produce a `Trap`", since `Flush` is tracked for
    /// hazard-ordering purposes but, per `MemOp::can_fault`, can never itself
    /// fault).
    #[must_use]
    pub const fn tracks_faulting_inflight(&self) -> bool {
        matches!(self, Self::Mem(_) | Self::Branch(_))
    }

    /// The mnemonic-ish name for trace output.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Alu(_) => "alu",
            Self::Mem(slot) => match slot.op {
                MemOp::Load { .. } => "load",
                MemOp::Store { .. } => "store",
                MemOp::Flush => "flush",
            },
            Self::Branch(_) => "branch",
            Self::Cyclecount(_) => "cyclecount",
            Self::Fence(_) => "fence",
        }
    }
}

/// The phase an occupied slot is in. `Retired` is not represented: a slot
/// that finishes retiring is freed the same tick, not left in a third state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Executing,
    Retiring,
}

/// A deep copy of everything needed to roll back to the instant this slot
/// was issued (spec §3: "a snapshot of the architectural register file at
/// issue time, the instruction's PC, and the set of `SlotId`s of older
/// potentially-faulting in-flight instructions").
#[derive(Clone)]
pub struct SlotSnapshot {
    pub registers: RegisterFile,
    pub pc: Word,
    pub faulting_preceding: HashSet<SlotId>,
}

/// One occupied reservation-station slot.
#[derive(Clone)]
pub struct Slot {
    pub body: SlotBody,
    /// Destination register index, if this kind writes one.
    pub dest: Option<usize>,
    pub phase: Phase,
    /// Present only for `tracks_faulting_inflight` kinds.
    pub snapshot: Option<SlotSnapshot>,
}

impl Slot {
    /// Broadcasts `value` from `source` into every pending operand this slot
    /// holds — its own source operands, and (for faulting kinds) the
    /// register-file snapshot it is carrying.
    pub fn receive_broadcast(&mut self, source: SlotId, value: Word) {
        match &mut self.body {
            SlotBody::Alu(slot) => {
                slot.src1 = slot.src1.resolve_if(source, value);
                slot.src2 = slot.src2.resolve_if(source, value);
            }
            SlotBody::Mem(slot) => {
                slot.rbase = slot.rbase.resolve_if(source, value);
                if let Some(rs_val) = &mut slot.rs_val {
                    *rs_val = rs_val.resolve_if(source, value);
                }
            }
            SlotBody::Branch(slot) => {
                slot.src1 = slot.src1.resolve_if(source, value);
                slot.src2 = slot.src2.resolve_if(source, value);
            }
            SlotBody::Cyclecount(_) | SlotBody::Fence(_) => {}
        }

        if let Some(snapshot) = &mut self.snapshot {
            snapshot.registers.broadcast(source, value);
        }
    }
}
