//! The top-level simulator: owns every subsystem side by side and implements
//! the CPU driver contract (spec §2 "CPU glue", §6 "CPU driver contract").
//!
//! Grounded in the teacher's `Simulator { cpu, pipeline }`: rather than one
//! subsystem reaching into another through back-pointers, `Simulator` holds
//! all four and passes them to each other explicitly every tick.

use std::collections::HashMap;

use crate::bpu::{BpuWrapper, BranchPredictor};
use crate::common::{CoreError, FaultKind, Trap};
use crate::config::Config;
use crate::engine::ExecutionEngine;
use crate::frontend::FrontEnd;
use crate::isa::Instruction;
use crate::memory::MemorySubsystem;
use crate::regfile::RegisterFile;

/// A deep copy of every subsystem's state, for the undo/redo history the
/// driver keeps (spec Design Notes: "leave the undo list to the driver" —
/// the actual stack lives in `specsim-cli::history`, this is just the thing
/// it stacks).
#[derive(Clone)]
pub struct SimSnapshot {
    engine: ExecutionEngine,
    front: FrontEnd,
    bpu: BpuWrapper,
    memory: MemorySubsystem,
}

/// Owns the Execution Engine, Front End, Branch Predictor, and Memory
/// Subsystem together and drives them one cycle at a time.
pub struct Simulator {
    engine: ExecutionEngine,
    front: FrontEnd,
    bpu: BpuWrapper,
    memory: MemorySubsystem,
    /// Pre-parsed microprogram bodies, keyed by the fault kind they inject
    /// on. Resolving `config.microprogram`'s filenames to these is a
    /// `specsim-cli` concern (the assembler lives there); by the time a
    /// `Simulator` exists, every microprogram is already decoded.
    microprograms: HashMap<FaultKind, Vec<Instruction>>,
}

impl Simulator {
    /// Builds a simulator over a fully decoded `program`, validating
    /// `config` and constructing each subsystem from its slice of it.
    pub fn new(
        program: Vec<Instruction>,
        config: &Config,
        microprograms: HashMap<FaultKind, Vec<Instruction>>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            engine: ExecutionEngine::new(config.reservation_station.slots),
            front: FrontEnd::new(program, config.frontend.max_queue_length),
            bpu: BpuWrapper::new(&config.bpu),
            memory: MemorySubsystem::new(&config.cache, &config.memory)?,
            microprograms,
        })
    }

    /// The architectural register file.
    #[must_use]
    pub fn registers(&self) -> &RegisterFile {
        self.engine.registers()
    }

    /// The engine's cycle counter.
    #[must_use]
    pub fn cycle_counter(&self) -> u64 {
        self.engine.cycle_counter()
    }

    /// Read access to the memory subsystem, for trace output and test
    /// assertions.
    #[must_use]
    pub fn memory(&self) -> &MemorySubsystem {
        &self.memory
    }

    /// Mutable access to the memory subsystem. Exists for test harnesses and
    /// future debugger-style probes (spec §1: the debugger shell itself is
    /// out of scope, but nothing here should block one from being built on
    /// top) that need to issue a memory access outside the engine's normal
    /// issue/execute path — e.g. re-reading a byte after catching a fault to
    /// observe the cache-residue timing spec §8 S3 describes.
    pub fn memory_mut(&mut self) -> &mut MemorySubsystem {
        &mut self.memory
    }

    /// Current front-end program counter.
    #[must_use]
    pub fn pc(&self) -> crate::common::Word {
        self.front.get_pc()
    }

    /// What the branch predictor currently predicts for `pc`, without
    /// consulting or mutating the front end. A read-only window onto BPU
    /// state for test assertions and future trace/debugger tooling.
    #[must_use]
    pub fn bpu_predicts(&self, pc: crate::common::Word) -> bool {
        self.bpu.predict(pc)
    }

    /// Whether fetch is exhausted, the queue has drained, and the
    /// reservation station is empty: the run is over.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.front.is_done() && self.engine.is_idle()
    }

    /// Advances the simulator by one cycle, implementing the driver contract
    /// of spec §6 verbatim:
    ///
    /// 1. While the front-end queue is non-empty, try to issue its head;
    ///    the moment `try_issue` refuses (no free slot, or a `Fence` is in
    ///    flight), stop issuing for this tick — the head stays queued.
    /// 2. Tick the engine.
    /// 3. If it faults: resume `pc` at `fault.pc + 1` for a memory fault, or
    ///    re-steer past the branch (`add_instructions_after_branch` with the
    ///    negated prediction, since a mispredict means the actual outcome
    ///    was the opposite) for a branch fault; flush the queue; inject the
    ///    configured microprogram for this fault kind, if any.
    /// 4. Refill the queue.
    pub fn tick(&mut self) -> Option<Trap> {
        loop {
            let head = match self.front.fetch_instruction_from_queue() {
                Ok(info) => *info,
                Err(_) => break,
            };
            if self.engine.try_issue(head.instr, head.pc, head.prediction) {
                let _ = self.front.pop_instruction_from_queue();
            } else {
                break;
            }
        }

        let trap = self.engine.tick(&mut self.memory, &mut self.bpu);

        if let Some(trap) = trap {
            match trap.kind {
                FaultKind::Load | FaultKind::Store => {
                    let _ = self.front.set_pc(trap.resume_pc());
                }
                FaultKind::Branch => {
                    let actual_taken = !trap.prediction.unwrap_or(false);
                    let _ = self.front.add_instructions_after_branch(actual_taken, trap.pc, &self.bpu);
                }
            }
            self.front.flush_instruction_queue();

            if let Some(microprogram) = self.microprograms.get(&trap.kind) {
                self.front.add_micro_program(microprogram.iter().copied());
            }
        }

        self.front.add_instructions_to_queue(&self.bpu);

        trap
    }

    /// Runs until `is_finished` or `max_ticks` cycles have elapsed,
    /// whichever comes first, collecting every fault encountered.
    pub fn run(&mut self, max_ticks: u64) -> Vec<Trap> {
        let mut faults = Vec::new();
        let mut elapsed = 0u64;
        while !self.is_finished() && elapsed < max_ticks {
            if let Some(trap) = self.tick() {
                faults.push(trap);
            }
            elapsed += 1;
        }
        faults
    }

    /// Captures a deep copy of every subsystem's state.
    #[must_use]
    pub fn snapshot(&self) -> SimSnapshot {
        SimSnapshot {
            engine: self.engine.clone(),
            front: self.front.clone(),
            bpu: self.bpu.clone(),
            memory: self.memory.clone(),
        }
    }

    /// Restores a previously captured snapshot. `microprograms` is untouched:
    /// it is loaded once at construction and never mutated thereafter.
    pub fn restore(&mut self, snapshot: &SimSnapshot) {
        self.engine = snapshot.engine.clone();
        self.front = snapshot.front.clone();
        self.bpu = snapshot.bpu.clone();
        self.memory = snapshot.memory.clone();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::Simulator;
    use crate::common::Word;
    use crate::config::Config;
    use crate::isa::catalog;

    fn program(lines: &[&str]) -> Vec<crate::isa::Instruction> {
        lines
            .iter()
            .map(|line| {
                let mut parts = line.split_whitespace();
                let mnemonic = parts.next().unwrap();
                let operands: Vec<i32> = parts.map(|p| p.parse().unwrap()).collect();
                let kind = catalog::lookup(mnemonic).unwrap();
                crate::isa::Instruction::new(kind, crate::isa::Operands::new(&operands))
            })
            .collect()
    }

    #[test]
    fn a_straight_line_program_finishes_with_the_expected_register_value() {
        let instrs = program(&["addi 1 0 5", "addi 2 1 3"]);
        let mut sim = Simulator::new(instrs, &Config::default(), HashMap::new()).unwrap();
        sim.run(1000);
        assert!(sim.is_finished());
        assert_eq!(sim.registers().read(2).value(), Some(Word::new(8)));
    }

    #[test]
    fn a_protected_load_faults_and_the_driver_resumes_past_it() {
        let protected = crate::memory::PROTECTED_START as i32;
        let instrs = program(&[&format!("addi 1 0 {protected}"), "lw 2 1 0", "addi 3 0 7"]);
        let mut sim = Simulator::new(instrs, &Config::default(), HashMap::new()).unwrap();
        let faults = sim.run(1000);
        assert_eq!(faults.len(), 1);
        assert!(sim.is_finished());
        // the driver resumes past the fault and re-issues the trailing addi,
        // which commits normally on its second, non-speculative pass
        assert_eq!(sim.registers().read(3).value(), Some(Word::new(7)));
    }
}
