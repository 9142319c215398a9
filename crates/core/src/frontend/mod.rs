//! Front End: the bounded instruction queue and its steering (spec §4.2).
//!
//! The front end owns the full decoded program and a cursor (`pc`) into it.
//! It never executes anything; its only job is to keep a bounded queue of
//! `InstrInfo` topped up, consulting the BPU once per enqueued branch, and to
//! let the driver re-steer it after a rollback.

use std::collections::VecDeque;

use crate::bpu::BranchPredictor;
use crate::common::{CoreError, Word};
use crate::isa::{Instruction, Kind};

/// One queued instruction: its decoded form, the `pc` it was fetched at, and
/// (for branches) the prediction made when it was enqueued.
#[derive(Debug, Clone, Copy)]
pub struct InstrInfo {
    /// The decoded instruction.
    pub instr: Instruction,
    /// The program counter it was fetched from. Microprogram instructions
    /// carry `Word::MAX` (the two's-complement encoding of `-1`), per spec
    /// §4.2 `add_micro_program`.
    pub pc: Word,
    /// For `Branch` instructions, the direction predicted at enqueue time.
    /// `None` for everything else.
    pub prediction: Option<bool>,
}

/// `pc` value carried by microprogram-injected instructions (spec §4.2:
/// `add_micro_program` appends "with `pc=-1`").
pub const MICROPROGRAM_PC: Word = Word::new(0xFFFF);

fn branch_target(instr: &Instruction) -> Word {
    Word::new(instr.operands.target_index(2) as u16)
}

/// The bounded front-end instruction queue.
#[derive(Clone)]
pub struct FrontEnd {
    instrs: Vec<Instruction>,
    queue: VecDeque<InstrInfo>,
    pc: Word,
    max_length: usize,
}

impl FrontEnd {
    /// Builds a front end over the fully-decoded program, with the given
    /// bound on the ordinary (non-microprogram) queue length (spec §6
    /// `Frontend.max_queue_length`).
    #[must_use]
    pub fn new(instrs: Vec<Instruction>, max_length: usize) -> Self {
        Self { instrs, queue: VecDeque::new(), pc: Word::ZERO, max_length }
    }

    /// Current program counter.
    #[must_use]
    pub const fn get_pc(&self) -> Word {
        self.pc
    }

    /// Sets the program counter. Must reference a valid instruction index.
    pub fn set_pc(&mut self, new_pc: Word) -> Result<(), CoreError> {
        let index = new_pc.value() as usize;
        if index >= self.instrs.len() {
            return Err(CoreError::IndexOutOfRange { index, len: self.instrs.len() });
        }
        self.pc = new_pc;
        Ok(())
    }

    /// Whether fetch has reached the end of the program and the queue has
    /// drained.
    #[must_use]
    pub fn is_done(&self) -> bool {
        (self.pc.value() as usize) >= self.instrs.len() && self.queue.is_empty()
    }

    /// Tops the queue up to `max_length`, consulting `bpu` for every branch
    /// enqueued and steering `pc` to the predicted-taken target or to the
    /// next instruction accordingly.
    pub fn add_instructions_to_queue(&mut self, bpu: &impl BranchPredictor) {
        while self.queue.len() < self.max_length && (self.pc.value() as usize) < self.instrs.len() {
            let index = self.pc.value() as usize;
            let instr = self.instrs[index];
            let pc = self.pc;

            let prediction = matches!(instr.kind, Kind::Branch { .. }).then(|| bpu.predict(pc));

            self.pc = match (instr.kind, prediction) {
                (Kind::Branch { .. }, Some(true)) => branch_target(&instr),
                _ => pc.wrapping_add(Word::new(1)),
            };

            self.queue.push_back(InstrInfo { instr, pc, prediction });
        }
    }

    /// Appends every instruction in a microprogram, ignoring `max_length`
    /// (spec §4.2 `add_micro_program`). Any branch encountered is treated as
    /// unconditionally taken — no BPU consultation, no fault generation —
    /// and immediately redirects `pc` to its label operand (spec Design
    /// Notes: "Front-end micro-program branch handling").
    pub fn add_micro_program(&mut self, instrs: impl IntoIterator<Item = Instruction>) {
        for instr in instrs {
            let is_branch = matches!(instr.kind, Kind::Branch { .. });
            if is_branch {
                self.pc = branch_target(&instr);
            }
            self.queue.push_back(InstrInfo { instr, pc: MICROPROGRAM_PC, prediction: None });
        }
    }

    /// Re-enqueues the branch at `branch_pc` with the now-known outcome
    /// `taken`, re-steers `pc` to the correct side of it, and refills the
    /// queue — the driver's post-rollback branch recovery (spec §4.2, §6
    /// "CPU driver contract").
    pub fn add_instructions_after_branch(
        &mut self,
        taken: bool,
        branch_pc: Word,
        bpu: &impl BranchPredictor,
    ) -> Result<(), CoreError> {
        let index = branch_pc.value() as usize;
        let instr = *self
            .instrs
            .get(index)
            .ok_or(CoreError::IndexOutOfRange { index, len: self.instrs.len() })?;
        if !matches!(instr.kind, Kind::Branch { .. }) {
            return Err(CoreError::NotABranch { index });
        }

        self.pc = if taken { branch_target(&instr) } else { branch_pc.wrapping_add(Word::new(1)) };
        self.queue.push_back(InstrInfo { instr, pc: branch_pc, prediction: Some(taken) });

        self.add_instructions_to_queue(bpu);
        Ok(())
    }

    /// Peeks the head of the queue without dequeuing it.
    pub fn fetch_instruction_from_queue(&self) -> Result<&InstrInfo, CoreError> {
        self.queue.front().ok_or(CoreError::QueueEmpty)
    }

    /// Dequeues and returns the head of the queue.
    pub fn pop_instruction_from_queue(&mut self) -> Result<InstrInfo, CoreError> {
        self.queue.pop_front().ok_or(CoreError::QueueEmpty)
    }

    /// Clears the queue. `pc` is untouched.
    pub fn flush_instruction_queue(&mut self) {
        self.queue.clear();
    }

    /// Current queue occupancy.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::FrontEnd;
    use crate::bpu::{BranchPredictor, SimpleBpu};
    use crate::common::Word;
    use crate::isa::{Instruction, Kind, Operands};

    fn addi() -> Instruction {
        Instruction::new(
            Kind::Imm { name: "addi", op: |a, b| a.wrapping_add(b), cycles: 1 },
            Operands::new(&[1, 0, 1]),
        )
    }

    fn branch_to(target: usize) -> Instruction {
        Instruction::new(
            Kind::Branch { name: "bne", cond: |a, b| a.ne_word(b), cycles: 1 },
            Operands::new(&[1, 0, target as i32]),
        )
    }

    #[test]
    fn queue_never_exceeds_max_length_on_ordinary_fetch() {
        let instrs = vec![addi(); 10];
        let mut front = FrontEnd::new(instrs, 3);
        let bpu = SimpleBpu::new(0);
        front.add_instructions_to_queue(&bpu);
        assert_eq!(front.queue_len(), 3);
    }

    #[test]
    fn is_done_once_queue_and_program_are_exhausted() {
        let instrs = vec![addi()];
        let mut front = FrontEnd::new(instrs, 5);
        let bpu = SimpleBpu::new(0);
        front.add_instructions_to_queue(&bpu);
        assert!(!front.is_done());
        front.pop_instruction_from_queue().unwrap();
        assert!(front.is_done());
    }

    #[test]
    fn predicted_taken_branch_steers_pc_to_the_label() {
        let instrs = vec![branch_to(5), addi(), addi(), addi(), addi(), addi()];
        let mut front = FrontEnd::new(instrs, 1);
        let mut bpu = SimpleBpu::new(2); // predicts taken
        bpu.set(Word::ZERO, 2);
        front.add_instructions_to_queue(&bpu);
        assert_eq!(front.get_pc(), Word::new(5));
    }

    #[test]
    fn micro_program_ignores_the_queue_bound() {
        let instrs = vec![addi()];
        let mut front = FrontEnd::new(instrs, 1);
        let bpu = SimpleBpu::new(0);
        front.add_instructions_to_queue(&bpu);
        front.add_micro_program(vec![addi(), addi(), addi()]);
        assert_eq!(front.queue_len(), 4);
    }

    #[test]
    fn set_pc_out_of_range_is_an_error() {
        let mut front = FrontEnd::new(vec![addi()], 5);
        assert!(front.set_pc(Word::new(5)).is_err());
    }

    #[test]
    fn after_branch_on_a_non_branch_index_is_an_error() {
        let mut front = FrontEnd::new(vec![addi()], 5);
        let bpu = SimpleBpu::new(0);
        assert!(front.add_instructions_after_branch(true, Word::ZERO, &bpu).is_err());
    }
}
