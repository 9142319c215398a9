//! Cycle-accurate simulator of a speculative out-of-order processor.
//!
//! This crate implements the in-scope subsystems of a small Tomasulo-style
//! core built to demonstrate Spectre/Meltdown-style transient execution:
//! 1. **Engine:** a unified reservation station (`ExecutionEngine`) with
//!    register renaming, a common data bus, and rollback on architectural
//!    fault.
//! 2. **Front End:** a bounded instruction queue fed from a fully-decoded
//!    program, with branch-prediction-steered fetch and microprogram
//!    injection.
//! 3. **BPU:** a simple single-counter predictor and an indexed
//!    multi-counter predictor, both bimodal.
//! 4. **Memory:** a set-associative tagged cache in front of a byte-addressed
//!    backing store with a protected-region fault model.
//! 5. **Sim:** `Simulator`, which owns every subsystem side by side and
//!    implements the CPU driver contract.
//!
//! Assembling a program from source text and driving the simulator from a
//! command line are external concerns; they live in `specsim-cli`.

/// Common types and errors (words, bytes, slot ids, traps).
pub mod common;
/// Simulator configuration (defaults and per-subsystem config structs).
pub mod config;
/// The out-of-order execution engine: reservation station, slot state
/// machines, register renaming, and rollback.
pub mod engine;
/// The front-end instruction queue and its steering.
pub mod frontend;
/// Instruction set: decoded instruction shape, operand encoding, and the
/// mnemonic-to-kind catalog.
pub mod isa;
/// The architectural register file and its renaming entries.
pub mod regfile;
/// Branch prediction: the simple and indexed bimodal predictors.
pub mod bpu;
/// The tagged-cache memory subsystem and its backing store.
pub mod memory;
/// The top-level simulator and its driver contract.
pub mod sim;

/// Root configuration type; use `Config::default()` or deserialize one.
pub use crate::config::Config;
/// The out-of-order execution engine.
pub use crate::engine::ExecutionEngine;
/// Top-level simulator; owns the engine, front end, BPU, and memory side by
/// side.
pub use crate::sim::Simulator;
