//! End-to-end scenarios, reproduced verbatim from the project's test plan
//! (the numbered "S1"–"S6" walkthroughs): a handful of short programs run
//! against a full [`Simulator`], each checked against the terminal state and
//! transient side effects its source program describes.
//!
//! Instructions are built directly from the catalog rather than through a
//! text assembler (the assembler lives in `specsim-cli`, a separate crate
//! this one cannot depend on without an upward edge); `asm` mirrors the shape
//! of a parsed program closely enough that each scenario still reads as the
//! assembly listing it is named after.

use std::collections::HashMap;

use pretty_assertions::assert_eq;

use specsim_core::common::{FaultKind, Word};
use specsim_core::config::{CacheConfig, MemoryConfig, ReplacementPolicyKind};
use specsim_core::isa::{catalog, Instruction, Operands};
use specsim_core::memory::MemorySubsystem;
use specsim_core::{Config, ExecutionEngine, Simulator};

/// Builds a program from `"mnemonic operand operand operand"` lines, each
/// operand a bare integer (register indices with no `r` prefix, branch
/// targets already resolved to instruction indices).
fn asm(lines: &[&str]) -> Vec<Instruction> {
    lines
        .iter()
        .map(|line| {
            let mut parts = line.split_whitespace();
            let mnemonic = parts.next().expect("non-empty line");
            let operands: Vec<i32> = parts.map(|p| p.parse().expect("integer operand")).collect();
            let kind = catalog::lookup(mnemonic).unwrap_or_else(|| panic!("unknown mnemonic {mnemonic}"));
            Instruction::new(kind, Operands::new(&operands))
        })
        .collect()
}

/// Installs a `tracing` subscriber gated by `RUST_LOG`, so a failing
/// scenario can be re-run with e.g. `RUST_LOG=specsim_core=trace` to see the
/// engine's per-cycle issue/broadcast/retire/rollback trace. Safe to call
/// from every test: `try_init` no-ops if a subscriber is already installed.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn run(program: Vec<Instruction>, config: &Config) -> Simulator {
    init_tracing();
    let mut sim = Simulator::new(program, config, HashMap::new()).expect("valid config");
    sim.run(10_000);
    sim
}

/// S1 — arithmetic & memory round-trip.
#[test]
fn s1_arithmetic_and_memory_round_trip() {
    let program = asm(&[
        "addi 1 0 1", // r1 = 1
        "add 2 1 1",  // r2 = r1 + r1 = 2
        "addi 3 2 1", // r3 = r2 + 1 = 3
        "sw 3 0 0",   // mem[0..2] = r3
        "lw 4 0 0",   // r4 = mem[0..2]
    ]);
    let mut sim = run(program, &Config::default());

    assert!(sim.is_finished());
    assert_eq!(sim.registers().read(1).value(), Some(Word::new(1)));
    assert_eq!(sim.registers().read(2).value(), Some(Word::new(2)));
    assert_eq!(sim.registers().read(3).value(), Some(Word::new(3)));
    assert_eq!(sim.registers().read(4).value(), Some(Word::new(3)));
    assert_eq!(sim.memory_mut().read_word(Word::ZERO, false).value, Word::new(3));
}

/// S2 — branch misprediction recovery. BPU seeded to counter 2 (predicts
/// taken), a five-iteration countdown loop, then a tail instruction only
/// reachable once the loop exits.
#[test]
fn s2_branch_misprediction_recovery() {
    let program = asm(&[
        "addi 1 0 5", // r1 = 5                      (idx 0)
        "subi 1 1 1", // loop: r1 -= 1                (idx 1)
        "bne 1 0 1",  // branch back to idx 1 while r1 != 0  (idx 2)
        "addi 2 0 42", // r2 = 42                     (idx 3)
    ]);
    init_tracing();
    let mut config = Config::default();
    config.bpu.init_counter = 2;

    let mut sim = Simulator::new(program, &config, HashMap::new()).expect("valid config");
    let faults = sim.run(10_000);

    assert!(sim.is_finished());
    assert_eq!(sim.registers().read(1).value(), Some(Word::ZERO));
    assert_eq!(sim.registers().read(2).value(), Some(Word::new(42)));
    assert!(faults.iter().any(|trap| trap.kind == FaultKind::Branch), "expected at least one branch misprediction");

    // The branch is taken on every iteration but the last: bimodal state
    // climbs 2 -> 3 -> 3 -> 3 -> 3, then the final not-taken outcome steps it
    // down from 3 to 2 (spec §4.3's table), so it ends predicting taken.
    assert!(sim.bpu_predicts(Word::new(2)));
}

/// S3 — Meltdown-style cache residue: a faulting load still warms the cache
/// line, and the fill survives the rollback that the fault triggers.
#[test]
fn s3_meltdown_cache_residue_survives_rollback() {
    let protected = specsim_core::memory::PROTECTED_START as i32;
    let program = asm(&[&format!("addi 1 0 {protected}"), "lb 2 1 0"]);
    let config = Config::default();

    init_tracing();
    let mut sim = Simulator::new(program, &config, HashMap::new()).expect("valid config");
    let faults = sim.run(10_000);

    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].kind, FaultKind::Load);
    assert_eq!(faults[0].address, Some(Word::new(protected as u16)));

    let addr = Word::new(protected as u16);
    assert!(sim.memory().is_addr_cached(addr), "speculative fill must survive the rollback");

    let residue = sim.memory_mut().read_byte(addr, true);
    assert_eq!(residue.cycles_value, config.cache.cache_hit_cycles);
}

/// S4 — a load cannot observe memory before the store ahead of it (same
/// address) has retired; the hazard queue enforces strict program order for
/// overlapping accesses regardless of relative latency.
#[test]
fn s4_store_load_hazard_ordering() {
    let program = asm(&["addi 1 0 5", "sw 1 0 0", "lw 2 0 0"]);
    let mut sim = run(program, &Config::default());

    assert!(sim.is_finished());
    assert_eq!(sim.registers().read(2).value(), Some(Word::new(5)));
}

/// S5 — a `Fence` drains the reservation station before anything newer
/// issues: `cyclecount` only ever sees the cycle count once the fence (and
/// everything before it) has retired, and the engine refuses every `try_issue`
/// call while the fence is in flight.
#[test]
fn s5_fence_drains_before_newer_instructions_issue() {
    let program = asm(&["addi 1 0 1", "fence", "cyclecount 2"]);
    let mut sim = run(program, &Config::default());

    assert!(sim.is_finished());
    let observed = sim.registers().read(2).value().expect("cyclecount resolved");
    assert!(observed.value() >= 2, "cyclecount must execute no earlier than the cycle after the fence issues");
    assert!(observed.value() as u64 <= sim.cycle_counter());
}

/// S5, engine-level: while a `Fence` occupies a slot, `try_issue` refuses
/// every new instruction, and resumes accepting them the instant the fence
/// retires.
#[test]
fn s5_try_issue_refuses_while_fence_in_flight() {
    let mut engine = ExecutionEngine::new(8);
    let mut memory = MemorySubsystem::new(&CacheConfig::default(), &MemoryConfig::default()).unwrap();
    let mut bpu = specsim_core::bpu::BpuWrapper::new(&specsim_core::config::BpuConfig::default());

    let fence = Instruction::new(specsim_core::isa::Kind::Fence, Operands::new(&[]));
    let addi = Instruction::new(
        specsim_core::isa::Kind::Imm { name: "addi", op: |a, b| a.wrapping_add(b), cycles: 0 },
        Operands::new(&[1, 0, 1]),
    );

    assert!(engine.try_issue(fence, Word::ZERO, None));
    assert!(!engine.try_issue(addi, Word::new(1), None), "fence in flight must refuse new issues");

    // Nothing else is in flight, so the fence's `preceding` set is already
    // empty; one tick resolves and retires it.
    assert!(engine.tick(&mut memory, &mut bpu).is_none());
    assert!(!engine.has_fence_in_flight());
    assert!(engine.try_issue(addi, Word::new(1), None), "issue must resume once the fence retires");
}

/// S6 — LRU replacement determinism: addresses 0 and 9 alias into the same
/// set; a read of 0 between the two writes protects it, so the write to 17
/// (aliasing the same set) evicts 9, not 0.
#[test]
fn s6_lru_replacement_is_deterministic() {
    let cache_config = CacheConfig {
        sets: 4,
        ways: 2,
        line_size: 2,
        replacement_policy: ReplacementPolicyKind::Lru,
        ..CacheConfig::default()
    };
    let mut memory = MemorySubsystem::new(&cache_config, &MemoryConfig::default()).unwrap();

    memory.write_byte(Word::new(0), specsim_core::common::Byte::new(1), true);
    memory.write_byte(Word::new(9), specsim_core::common::Byte::new(2), true);
    memory.read_byte(Word::new(0), true);
    memory.write_byte(Word::new(17), specsim_core::common::Byte::new(3), true);

    assert!(!memory.is_addr_cached(Word::new(9)), "address 9 should have been evicted");
    assert!(memory.is_addr_cached(Word::new(0)), "address 0 was touched most recently before the eviction");
    assert!(memory.is_addr_cached(Word::new(17)), "address 17 was just written");
}
