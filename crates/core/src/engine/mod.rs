//! The out-of-order Execution Engine (spec §4.1).
//!
//! A Tomasulo-style unified reservation station with a common data bus: one
//! fixed array of slots, each either a free (`None`) bay or an occupied,
//! stateful instruction working its way from `Executing` to `Retiring` to
//! freed. `tick` drives every occupied slot forward by exactly one cycle in
//! slot-index order, broadcasting each result as soon as it is produced so
//! later slots in the same scan can consume it immediately (spec §4.1
//! "Broadcast ordering").

use std::collections::HashSet;

use crate::bpu::{BpuWrapper, BranchPredictor};
use crate::common::{Byte, FaultKind, SlotId, Trap, Word};
use crate::isa::{Instruction, Kind};
use crate::memory::MemorySubsystem;
use crate::regfile::{RegEntry, RegisterFile};

pub use slot::{AluSlot, BranchSlot, CyclecountSlot, FenceSlot, MemOp, MemSlot, Phase, Slot, SlotBody, SlotSnapshot};

/// Per-kind slot state and the flat tagged-variant replacement for the
/// source's class hierarchy.
pub mod slot;

/// What `_tick_retire` determined this cycle for one slot.
enum RetireOutcome {
    /// Not yet ready to leave the Retiring phase.
    Waiting,
    /// Retires with no architectural effect beyond freeing the slot.
    Clean,
    /// Retires by faulting; rollback follows immediately.
    Fault(Trap),
}

/// The unified reservation station.
#[derive(Clone)]
pub struct ExecutionEngine {
    regs: RegisterFile,
    slots: Vec<Option<Slot>>,
    faulting_inflight: HashSet<SlotId>,
    cycle_counter: u64,
}

fn destination_register(instr: &Instruction) -> Option<usize> {
    match instr.kind {
        Kind::Reg { .. } | Kind::Imm { .. } | Kind::Load { .. } | Kind::Cyclecount => {
            Some(instr.operands.reg(0))
        }
        Kind::Store { .. } | Kind::Flush | Kind::Branch { .. } | Kind::Fence => None,
    }
}

/// The set of 16-bit addresses an access of `width` bytes starting at `addr`
/// touches, wrapping at the `Word` boundary. Used only to test two ranges
/// for overlap; `width` never exceeds 2 in this instruction set.
fn touched_addresses(addr: Word, width: usize) -> [u16; 2] {
    let mut out = [addr.value(); 2];
    for (i, slot) in out.iter_mut().enumerate().take(width) {
        *slot = addr.wrapping_add(Word::new(i as u16)).value();
    }
    out
}

fn ranges_overlap(a_addr: Word, a_width: usize, b_addr: Word, b_width: usize) -> bool {
    let a = touched_addresses(a_addr, a_width);
    let b = touched_addresses(b_addr, b_width);
    a[..a_width].iter().any(|x| b[..b_width].contains(x))
}

fn perform_memory_op(
    memory: &mut MemorySubsystem,
    op: MemOp,
    addr: Word,
    rs_val: Option<Word>,
) -> (Word, bool, u32, u32) {
    match op {
        MemOp::Load { byte_width: 2 } => {
            let r = memory.read_word(addr, true);
            (r.value, r.fault, r.cycles_value, r.cycles_fault)
        }
        MemOp::Load { .. } => {
            let r = memory.read_byte(addr, true);
            (r.value.zero_extend(), r.fault, r.cycles_value, r.cycles_fault)
        }
        MemOp::Store { byte_width: 2 } => {
            let value = rs_val.expect("store value resolved before performing");
            let r = memory.write_word(addr, value, true);
            (r.value, r.fault, r.cycles_value, r.cycles_fault)
        }
        MemOp::Store { .. } => {
            let value = rs_val.expect("store value resolved before performing");
            let r = memory.write_byte(addr, Byte::truncate(value), true);
            (r.value.zero_extend(), r.fault, r.cycles_value, r.cycles_fault)
        }
        MemOp::Flush => {
            let r = memory.flush_line(addr);
            (r.value, false, r.cycles_value, r.cycles_fault)
        }
    }
}

impl ExecutionEngine {
    /// Builds an engine with `num_slots` reservation-station slots and a
    /// fresh, all-zero register file (spec §6 `ReservationStation.slots`).
    #[must_use]
    pub fn new(num_slots: usize) -> Self {
        Self {
            regs: RegisterFile::new(),
            slots: (0..num_slots).map(|_| None).collect(),
            faulting_inflight: HashSet::new(),
            cycle_counter: 0,
        }
    }

    /// The architectural register file.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// The engine's cycle counter, as read by `cyclecount`.
    #[must_use]
    pub const fn cycle_counter(&self) -> u64 {
        self.cycle_counter
    }

    /// Number of reservation-station slots.
    #[must_use]
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// Whether every slot is free.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Whether any occupied slot holds a `Fence` (which refuses all new
    /// issues until it drains the station).
    #[must_use]
    pub fn has_fence_in_flight(&self) -> bool {
        self.slots.iter().flatten().any(|slot| matches!(slot.body, SlotBody::Fence(_)))
    }

    fn free_slot_index(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    fn build_slot_body(&self, instr: &Instruction, prediction: Option<bool>) -> SlotBody {
        let ops = &instr.operands;
        match instr.kind {
            Kind::Reg { op, cycles, .. } => SlotBody::Alu(AluSlot {
                op,
                src1: self.regs.read(ops.reg(1)),
                src2: self.regs.read(ops.reg(2)),
                cycles_left: cycles,
            }),
            Kind::Imm { op, cycles, .. } => SlotBody::Alu(AluSlot {
                op,
                src1: self.regs.read(ops.reg(1)),
                src2: RegEntry::Value(ops.imm(2)),
                cycles_left: cycles,
            }),
            Kind::Load { byte_width, .. } => SlotBody::Mem(MemSlot {
                op: MemOp::Load { byte_width },
                rbase: self.regs.read(ops.reg(1)),
                offset: ops.imm(2),
                rs_val: None,
                addr: None,
                hazards: None,
                performed: false,
                value: None,
                fault: false,
                cycles_value_left: 0,
                cycles_fault_left: 0,
            }),
            Kind::Store { byte_width, .. } => SlotBody::Mem(MemSlot {
                op: MemOp::Store { byte_width },
                rbase: self.regs.read(ops.reg(1)),
                offset: ops.imm(2),
                rs_val: Some(self.regs.read(ops.reg(0))),
                addr: None,
                hazards: None,
                performed: false,
                value: None,
                fault: false,
                cycles_value_left: 0,
                cycles_fault_left: 0,
            }),
            Kind::Flush => SlotBody::Mem(MemSlot {
                op: MemOp::Flush,
                rbase: self.regs.read(ops.reg(0)),
                offset: ops.imm(1),
                rs_val: None,
                addr: None,
                hazards: None,
                performed: false,
                value: None,
                fault: false,
                cycles_value_left: 0,
                cycles_fault_left: 0,
            }),
            Kind::Branch { cond, cycles, .. } => SlotBody::Branch(BranchSlot {
                cond,
                src1: self.regs.read(ops.reg(0)),
                src2: self.regs.read(ops.reg(1)),
                cycles_left: cycles,
                target_index: ops.target_index(2),
                prediction: prediction.unwrap_or(false),
                taken: None,
            }),
            Kind::Cyclecount => SlotBody::Cyclecount(CyclecountSlot),
            Kind::Fence => {
                let preceding =
                    self.slots.iter().enumerate().filter_map(|(i, s)| s.as_ref().map(|_| SlotId::new(i))).collect();
                SlotBody::Fence(FenceSlot { preceding })
            }
        }
    }

    /// Attempts to issue `instr` (fetched at `pc`, with `prediction` for
    /// branches) into the lowest-index free slot.
    ///
    /// Refuses if a `Fence` is currently in flight or no slot is free. This
    /// instruction set has no addressing mode that can fail slot
    /// construction outright (every operand is either an immediate or a
    /// register read, and a pending register read is a perfectly valid,
    /// normal thing for a slot to hold) — the "not issuable yet" case spec
    /// §4.1 describes is therefore vacuous here and is not a third refusal
    /// path.
    pub fn try_issue(&mut self, instr: Instruction, pc: Word, prediction: Option<bool>) -> bool {
        if self.has_fence_in_flight() {
            return false;
        }
        let Some(index) = self.free_slot_index() else { return false };
        let slot_id = SlotId::new(index);

        let body = self.build_slot_body(&instr, prediction);
        let dest = destination_register(&instr);
        let tracks = body.tracks_faulting_inflight();

        let snapshot = tracks.then(|| SlotSnapshot {
            registers: self.regs,
            pc,
            faulting_preceding: self.faulting_inflight.clone(),
        });

        if let Some(dest_reg) = dest {
            self.regs.rename(dest_reg, slot_id);
        }

        self.slots[index] = Some(Slot { body, dest, phase: Phase::Executing, snapshot });

        if tracks {
            self.faulting_inflight.insert(slot_id);
        }

        tracing::debug!(slot = index, kind = instr.name(), %pc, "engine.issue");
        true
    }

    fn execute_mem(&mut self, slot_id: SlotId, memory: &mut MemorySubsystem) -> Option<Word> {
        let index = slot_id.index();

        if let SlotBody::Mem(mem) = &mut self.slots[index].as_mut().unwrap().body {
            if mem.addr.is_none() {
                let base = mem.rbase.value()?;
                mem.addr = Some(base.wrapping_add(mem.offset));
            }
        }

        let (addr, width, is_store) = match &self.slots[index].as_ref().unwrap().body {
            SlotBody::Mem(mem) => (mem.addr.unwrap(), mem.op.byte_width(), matches!(mem.op, MemOp::Store { .. })),
            _ => unreachable!("execute_mem only called on Mem slots"),
        };

        let hazards_already_computed =
            matches!(&self.slots[index].as_ref().unwrap().body, SlotBody::Mem(mem) if mem.hazards.is_some());

        let hazards_empty = if hazards_already_computed {
            matches!(&self.slots[index].as_ref().unwrap().body, SlotBody::Mem(mem) if mem.hazards.as_ref().unwrap().is_empty())
        } else {
            let faulting_preceding = self.slots[index].as_ref().unwrap().snapshot.as_ref().unwrap().faulting_preceding.clone();
            let mut hazards = HashSet::new();
            for other_id in &faulting_preceding {
                if let Some(Slot { body: SlotBody::Mem(other), .. }) = &self.slots[other_id.index()] {
                    if let Some(other_addr) = other.addr {
                        if ranges_overlap(addr, width, other_addr, other.op.byte_width()) {
                            hazards.insert(*other_id);
                        }
                    }
                }
            }
            let empty = hazards.is_empty();
            if let SlotBody::Mem(mem) = &mut self.slots[index].as_mut().unwrap().body {
                mem.hazards = Some(hazards);
            }
            empty
        };

        if !hazards_empty {
            return None;
        }

        if is_store {
            let snapshot = self.slots[index].as_ref().unwrap().snapshot.as_ref().unwrap();
            let preceding_clear = snapshot.faulting_preceding.is_empty();
            let value_ready =
                matches!(&self.slots[index].as_ref().unwrap().body, SlotBody::Mem(mem) if mem.rs_val.and_then(RegEntry::value).is_some());
            if !preceding_clear || !value_ready {
                return None;
            }
        }

        let already_performed =
            matches!(&self.slots[index].as_ref().unwrap().body, SlotBody::Mem(mem) if mem.performed);
        if !already_performed {
            let (op, rs_val) = match &self.slots[index].as_ref().unwrap().body {
                SlotBody::Mem(mem) => (mem.op, mem.rs_val.and_then(RegEntry::value)),
                _ => unreachable!(),
            };
            let (value, fault, cycles_value, cycles_fault) = perform_memory_op(memory, op, addr, rs_val);
            if let SlotBody::Mem(mem) = &mut self.slots[index].as_mut().unwrap().body {
                mem.performed = true;
                mem.value = Some(value);
                mem.fault = fault;
                mem.cycles_value_left = cycles_value;
                mem.cycles_fault_left = cycles_fault;
            }
        }

        let mem = match &mut self.slots[index].as_mut().unwrap().body {
            SlotBody::Mem(mem) => mem,
            _ => unreachable!(),
        };
        if mem.cycles_value_left > 0 {
            mem.cycles_value_left -= 1;
            return None;
        }
        mem.value
    }

    fn tick_execute(&mut self, slot_id: SlotId, memory: &mut MemorySubsystem) -> Option<Word> {
        let index = slot_id.index();
        if matches!(&self.slots[index].as_ref().unwrap().body, SlotBody::Mem(_)) {
            return self.execute_mem(slot_id, memory);
        }

        let slot = self.slots[index].as_mut().unwrap();
        match &mut slot.body {
            SlotBody::Alu(alu) => {
                let a = alu.src1.value()?;
                let b = alu.src2.value()?;
                if alu.cycles_left > 0 {
                    alu.cycles_left -= 1;
                    return None;
                }
                Some((alu.op)(a, b))
            }
            SlotBody::Branch(branch) => {
                let a = branch.src1.value()?;
                let b = branch.src2.value()?;
                if branch.cycles_left > 0 {
                    branch.cycles_left -= 1;
                    return None;
                }
                if branch.taken.is_none() {
                    branch.taken = Some((branch.cond)(a, b));
                }
                Some(Word::ZERO)
            }
            SlotBody::Cyclecount(_) => Some(Word::new(self.cycle_counter as u16)),
            SlotBody::Fence(fence) => fence.preceding.is_empty().then_some(Word::ZERO),
            SlotBody::Mem(_) => unreachable!("handled above"),
        }
    }

    fn resolve_fault_or_wait(&self, slot_id: SlotId, trap: Trap) -> RetireOutcome {
        let snapshot = self.slots[slot_id.index()].as_ref().unwrap().snapshot.as_ref().unwrap();
        if snapshot.faulting_preceding.is_empty() && snapshot.registers.is_fully_concrete() {
            RetireOutcome::Fault(trap)
        } else {
            RetireOutcome::Waiting
        }
    }

    fn tick_retire(&mut self, slot_id: SlotId, bpu: &mut BpuWrapper) -> RetireOutcome {
        let index = slot_id.index();

        if let SlotBody::Mem(mem) = &mut self.slots[index].as_mut().unwrap().body {
            if mem.cycles_fault_left > 0 {
                mem.cycles_fault_left -= 1;
                return RetireOutcome::Waiting;
            }
        }

        let slot = self.slots[index].as_ref().unwrap();
        match &slot.body {
            SlotBody::Alu(_) | SlotBody::Cyclecount(_) | SlotBody::Fence(_) => RetireOutcome::Clean,
            SlotBody::Mem(mem) => {
                if !mem.fault {
                    return RetireOutcome::Clean;
                }
                let pc = slot.snapshot.as_ref().unwrap().pc;
                let kind = match mem.op {
                    MemOp::Load { .. } => FaultKind::Load,
                    MemOp::Store { .. } => FaultKind::Store,
                    MemOp::Flush => unreachable!("Flush::can_fault is false"),
                };
                let addr = mem.addr.unwrap();
                self.resolve_fault_or_wait(slot_id, Trap::memory(pc, kind, addr))
            }
            SlotBody::Branch(branch) => {
                let pc = slot.snapshot.as_ref().unwrap().pc;
                let taken = branch.taken.expect("branch retires only after execute resolves `taken`");
                let prediction = branch.prediction;
                bpu.update(pc, taken);
                if taken == prediction {
                    RetireOutcome::Clean
                } else {
                    self.resolve_fault_or_wait(slot_id, Trap::branch(pc, prediction))
                }
            }
        }
    }

    fn broadcast(&mut self, source: SlotId, value: Word) {
        self.regs.broadcast(source, value);
        for slot in self.slots.iter_mut().flatten() {
            slot.receive_broadcast(source, value);
        }
        tracing::trace!(%source, %value, "engine.broadcast");
    }

    fn notify_retired(&mut self, retired: SlotId) {
        for slot in self.slots.iter_mut().flatten() {
            if let Some(snapshot) = &mut slot.snapshot {
                snapshot.faulting_preceding.remove(&retired);
            }
            match &mut slot.body {
                SlotBody::Mem(mem) => {
                    if let Some(hazards) = &mut mem.hazards {
                        hazards.remove(&retired);
                    }
                }
                SlotBody::Fence(fence) => {
                    fence.preceding.remove(&retired);
                }
                SlotBody::Alu(_) | SlotBody::Branch(_) | SlotBody::Cyclecount(_) => {}
            }
        }
    }

    fn retire_clean(&mut self, slot_id: SlotId) {
        tracing::debug!(slot = slot_id.index(), "engine.retire");
        self.faulting_inflight.remove(&slot_id);
        self.notify_retired(slot_id);
        self.slots[slot_id.index()] = None;
    }

    fn rollback(&mut self, slot_id: SlotId) {
        let snapshot_regs = self.slots[slot_id.index()].as_ref().unwrap().snapshot.as_ref().unwrap().registers;
        tracing::warn!(slot = slot_id.index(), "engine.rollback");
        self.regs = snapshot_regs;
        for slot in &mut self.slots {
            *slot = None;
        }
        self.faulting_inflight.clear();
    }

    /// Advances every occupied slot by one cycle: executing slots try to
    /// produce a result (broadcasting it immediately on success), retiring
    /// slots try to finish (freeing cleanly, or rolling back and returning
    /// the fault). Slots are visited in index order; a result broadcast by
    /// an earlier slot this tick is visible to every later slot visited the
    /// same tick (spec §4.1 "Broadcast ordering").
    pub fn tick(&mut self, memory: &mut MemorySubsystem, bpu: &mut BpuWrapper) -> Option<Trap> {
        self.cycle_counter += 1;

        for index in 0..self.slots.len() {
            let slot_id = SlotId::new(index);
            let Some(phase) = self.slots[index].as_ref().map(|slot| slot.phase) else { continue };

            match phase {
                Phase::Executing => {
                    if let Some(value) = self.tick_execute(slot_id, memory) {
                        self.slots[index].as_mut().unwrap().phase = Phase::Retiring;
                        self.broadcast(slot_id, value);
                    }
                }
                Phase::Retiring => match self.tick_retire(slot_id, bpu) {
                    RetireOutcome::Waiting => {}
                    RetireOutcome::Clean => self.retire_clean(slot_id),
                    RetireOutcome::Fault(trap) => {
                        self.rollback(slot_id);
                        return Some(trap);
                    }
                },
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::ExecutionEngine;
    use crate::bpu::BpuWrapper;
    use crate::common::Word;
    use crate::config::{BpuConfig, CacheConfig, MemoryConfig};
    use crate::isa::{Instruction, Kind, Operands};
    use crate::memory::MemorySubsystem;

    fn harness(slots: usize) -> (ExecutionEngine, MemorySubsystem, BpuWrapper) {
        let engine = ExecutionEngine::new(slots);
        let memory = MemorySubsystem::new(&CacheConfig::default(), &MemoryConfig::default()).unwrap();
        let bpu = BpuWrapper::new(&BpuConfig::default());
        (engine, memory, bpu)
    }

    fn addi(dest: usize, src: usize, imm: i32) -> Instruction {
        Instruction::new(
            Kind::Imm { name: "addi", op: |a, b| a.wrapping_add(b), cycles: 0 },
            Operands::new(&[dest as i32, src as i32, imm]),
        )
    }

    #[test]
    fn alu_result_is_visible_to_a_later_slot_in_the_same_tick() {
        let (mut engine, mut memory, mut bpu) = harness(4);
        // r1 = r0 + 1 (dest r1), r2 = r1 + 1 (depends on r1, issued same tick).
        assert!(engine.try_issue(addi(1, 0, 1), Word::ZERO, None));
        assert!(engine.try_issue(addi(2, 1, 1), Word::new(1), None));

        engine.tick(&mut memory, &mut bpu); // both execute (0-cycle ALU): r1 produced, broadcast same tick
        engine.tick(&mut memory, &mut bpu); // both retire

        assert_eq!(engine.registers().read(1).value(), Some(Word::new(1)));
        assert_eq!(engine.registers().read(2).value(), Some(Word::new(2)));
    }

    #[test]
    fn renaming_lets_two_writers_of_the_same_register_coexist() {
        let (mut engine, mut memory, mut bpu) = harness(4);
        assert!(engine.try_issue(addi(1, 0, 5), Word::ZERO, None));
        assert!(engine.try_issue(addi(1, 0, 9), Word::new(1), None));
        assert!(engine.registers().read(1).is_pending());

        for _ in 0..4 {
            engine.tick(&mut memory, &mut bpu);
        }
        assert_eq!(engine.registers().read(1).value(), Some(Word::new(9)));
    }

    #[test]
    fn no_free_slot_refuses_issue() {
        let (mut engine, _memory, _bpu) = harness(1);
        assert!(engine.try_issue(addi(1, 0, 1), Word::ZERO, None));
        assert!(!engine.try_issue(addi(2, 0, 1), Word::new(1), None));
    }
}
