//! Static mnemonic → [`Kind`] table.
//!
//! Shared between the engine (which only ever sees already-decoded
//! `Instruction`s) and the assembler, which looks mnemonics up here rather
//! than hard-coding its own copy of the instruction set.

use crate::common::Word;

use super::kind::Kind;

fn add(a: Word, b: Word) -> Word {
    a.wrapping_add(b)
}
fn sub(a: Word, b: Word) -> Word {
    a.wrapping_sub(b)
}
fn sll(a: Word, b: Word) -> Word {
    a.shift_left(b)
}
fn srl(a: Word, b: Word) -> Word {
    a.shift_right_logical(b)
}
fn sra(a: Word, b: Word) -> Word {
    a.shift_right_arithmetic(b)
}
fn xor(a: Word, b: Word) -> Word {
    a.xor(b)
}
fn or(a: Word, b: Word) -> Word {
    a.or(b)
}
fn and(a: Word, b: Word) -> Word {
    a.and(b)
}

fn beq(a: Word, b: Word) -> bool {
    a.eq_word(b)
}
fn bne(a: Word, b: Word) -> bool {
    a.ne_word(b)
}
fn bltu(a: Word, b: Word) -> bool {
    a.unsigned_lt(b)
}
fn bleu(a: Word, b: Word) -> bool {
    a.unsigned_le(b)
}
fn bgtu(a: Word, b: Word) -> bool {
    a.unsigned_gt(b)
}
fn bgeu(a: Word, b: Word) -> bool {
    a.unsigned_ge(b)
}
fn blts(a: Word, b: Word) -> bool {
    a.signed_lt(b)
}
fn bles(a: Word, b: Word) -> bool {
    a.signed_le(b)
}
fn bgts(a: Word, b: Word) -> bool {
    a.signed_gt(b)
}
fn bges(a: Word, b: Word) -> bool {
    a.signed_ge(b)
}

/// Default cycle count for ALU and branch operations that don't otherwise
/// specify one. The instruction set table gives no per-mnemonic cycle
/// counts, only `Config`'s `ReservationStation`/engine-wide costs do, so the
/// catalog uses a uniform single-cycle default and `Config` may override it
/// per kind group.
const DEFAULT_ALU_CYCLES: u32 = 1;
const DEFAULT_BRANCH_CYCLES: u32 = 1;

/// Looks up a mnemonic and returns the `Kind` it decodes to, or `None` if the
/// mnemonic is not recognized.
#[must_use]
pub fn lookup(mnemonic: &str) -> Option<Kind> {
    Some(match mnemonic {
        "add" => Kind::Reg { name: "add", op: add, cycles: DEFAULT_ALU_CYCLES },
        "sub" => Kind::Reg { name: "sub", op: sub, cycles: DEFAULT_ALU_CYCLES },
        "sll" => Kind::Reg { name: "sll", op: sll, cycles: DEFAULT_ALU_CYCLES },
        "srl" => Kind::Reg { name: "srl", op: srl, cycles: DEFAULT_ALU_CYCLES },
        "sra" => Kind::Reg { name: "sra", op: sra, cycles: DEFAULT_ALU_CYCLES },
        "xor" => Kind::Reg { name: "xor", op: xor, cycles: DEFAULT_ALU_CYCLES },
        "or" => Kind::Reg { name: "or", op: or, cycles: DEFAULT_ALU_CYCLES },
        "and" => Kind::Reg { name: "and", op: and, cycles: DEFAULT_ALU_CYCLES },

        "addi" => Kind::Imm { name: "addi", op: add, cycles: DEFAULT_ALU_CYCLES },
        "subi" => Kind::Imm { name: "subi", op: sub, cycles: DEFAULT_ALU_CYCLES },
        "slli" => Kind::Imm { name: "slli", op: sll, cycles: DEFAULT_ALU_CYCLES },
        "srli" => Kind::Imm { name: "srli", op: srl, cycles: DEFAULT_ALU_CYCLES },
        "srai" => Kind::Imm { name: "srai", op: sra, cycles: DEFAULT_ALU_CYCLES },
        "xori" => Kind::Imm { name: "xori", op: xor, cycles: DEFAULT_ALU_CYCLES },
        "ori" => Kind::Imm { name: "ori", op: or, cycles: DEFAULT_ALU_CYCLES },
        "andi" => Kind::Imm { name: "andi", op: and, cycles: DEFAULT_ALU_CYCLES },

        "lw" => Kind::Load { name: "lw", byte_width: Word::WIDTH_BYTES },
        "lb" => Kind::Load { name: "lb", byte_width: 1 },
        "sw" => Kind::Store { name: "sw", byte_width: Word::WIDTH_BYTES },
        "sb" => Kind::Store { name: "sb", byte_width: 1 },

        "flush" => Kind::Flush,

        "beq" => Kind::Branch { name: "beq", cond: beq, cycles: DEFAULT_BRANCH_CYCLES },
        "bne" => Kind::Branch { name: "bne", cond: bne, cycles: DEFAULT_BRANCH_CYCLES },
        "bltu" => Kind::Branch { name: "bltu", cond: bltu, cycles: DEFAULT_BRANCH_CYCLES },
        "bleu" => Kind::Branch { name: "bleu", cond: bleu, cycles: DEFAULT_BRANCH_CYCLES },
        "bgtu" => Kind::Branch { name: "bgtu", cond: bgtu, cycles: DEFAULT_BRANCH_CYCLES },
        "bgeu" => Kind::Branch { name: "bgeu", cond: bgeu, cycles: DEFAULT_BRANCH_CYCLES },
        "blts" => Kind::Branch { name: "blts", cond: blts, cycles: DEFAULT_BRANCH_CYCLES },
        "bles" => Kind::Branch { name: "bles", cond: bles, cycles: DEFAULT_BRANCH_CYCLES },
        "bgts" => Kind::Branch { name: "bgts", cond: bgts, cycles: DEFAULT_BRANCH_CYCLES },
        "bges" => Kind::Branch { name: "bges", cond: bges, cycles: DEFAULT_BRANCH_CYCLES },

        "cyclecount" => Kind::Cyclecount,
        "fence" => Kind::Fence,

        _ => return None,
    })
}

/// All mnemonics the catalog recognizes, in the order listed in the
/// instruction-set table. Used by the assembler to produce helpful
/// "unknown mnemonic" diagnostics (e.g. a did-you-mean suggestion).
pub const MNEMONICS: &[&str] = &[
    "add", "sub", "sll", "srl", "sra", "xor", "or", "and", "addi", "subi", "slli", "srli", "srai",
    "xori", "ori", "andi", "lw", "lb", "sw", "sb", "flush", "beq", "bne", "bltu", "bleu", "bgtu",
    "bgeu", "blts", "bles", "bgts", "bges", "cyclecount", "fence",
];

#[cfg(test)]
mod tests {
    use super::{lookup, MNEMONICS};

    #[test]
    fn every_listed_mnemonic_resolves() {
        for mnemonic in MNEMONICS {
            assert!(lookup(mnemonic).is_some(), "{mnemonic} should resolve");
        }
    }

    #[test]
    fn unknown_mnemonic_is_none() {
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn srl_is_logical_and_sra_is_arithmetic() {
        use crate::common::Word;
        let Some(super::Kind::Reg { op: srl, .. }) = lookup("srl") else { unreachable!() };
        let Some(super::Kind::Reg { op: sra, .. }) = lookup("sra") else { unreachable!() };
        let negative = Word::new(0x8000);
        assert_eq!(srl(negative, Word::new(1)), Word::new(0x4000));
        assert_eq!(sra(negative, Word::new(1)), Word::new(0xC000));
    }
}
