//! The instruction set: kinds, decoded instructions, and the mnemonic catalog.

/// The static mnemonic → [`kind::Kind`] table.
pub mod catalog;
/// Decoded instructions.
pub mod instruction;
/// The instruction-kind sum type.
pub mod kind;

pub use catalog::lookup;
pub use instruction::{Instruction, Operands};
pub use kind::{BinOp, Cond, Kind};
