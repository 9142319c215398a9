//! Assembly parser (spec §6 "Parser input").
//!
//! A two-pass, line-oriented assembler: the first pass walks the source
//! resolving every label to the instruction index it labels, the second
//! turns each remaining line into a [`specsim_core::isa::Instruction`] via
//! [`specsim_core::isa::catalog::lookup`]. Grounded in the original Python
//! parser's `_split_instructions`/two-pass `parse` shape, reworked as typed
//! errors instead of raised `ValueError`s.

use std::collections::HashMap;

use specsim_core::isa::{catalog, Instruction, Kind, Operands};
use specsim_core::regfile::NUM_REGISTERS;

/// Everything that can go wrong turning source text into instructions
/// (spec §7 "Parser errors").
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// A mnemonic not present in [`catalog::MNEMONICS`].
    #[error("line {line}: unknown instruction {mnemonic:?}")]
    UnknownMnemonic {
        /// 1-based source line.
        line: usize,
        /// The unrecognized token.
        mnemonic: String,
    },
    /// The operand count didn't match the mnemonic's kind.
    #[error("line {line}: {mnemonic} expects {expected} operand(s), got {found}")]
    WrongOperandCount {
        /// 1-based source line.
        line: usize,
        /// The mnemonic being parsed.
        mnemonic: String,
        /// How many operands the kind requires.
        expected: usize,
        /// How many were written.
        found: usize,
    },
    /// A register operand wasn't `r<index>` with `index` in range.
    #[error("line {line}: malformed register {operand:?}")]
    MalformedRegister {
        /// 1-based source line.
        line: usize,
        /// The offending operand token.
        operand: String,
    },
    /// An immediate operand didn't parse as an integer.
    #[error("line {line}: malformed immediate {operand:?}")]
    MalformedImmediate {
        /// 1-based source line.
        line: usize,
        /// The offending operand token.
        operand: String,
    },
    /// A label operand referenced an undeclared label.
    #[error("line {line}: unknown label {label:?}")]
    UnknownLabel {
        /// 1-based source line.
        line: usize,
        /// The undeclared label.
        label: String,
    },
}

/// The syntactic kind of one operand position, used to pick a parse rule.
/// Distinct from [`specsim_core::isa::Kind`], which classifies whole
/// instructions rather than individual operands.
#[derive(Clone, Copy)]
enum OperandSyntax {
    Reg,
    Imm,
    Label,
}

/// The operand syntax for each position of `kind`, in spec §3's documented
/// order (note this differs from the original Python source, which lists a
/// branch's label operand first; spec.md §3 gives `Branch`'s order as
/// `(rs1, rs2, label_pc)`, which this follows).
fn operand_syntax(kind: &Kind) -> &'static [OperandSyntax] {
    use OperandSyntax::{Imm, Label, Reg};
    match kind {
        Kind::Reg { .. } => &[Reg, Reg, Reg],
        Kind::Imm { .. } | Kind::Load { .. } | Kind::Store { .. } => &[Reg, Reg, Imm],
        Kind::Flush => &[Reg, Imm],
        Kind::Branch { .. } => &[Reg, Reg, Label],
        Kind::Cyclecount => &[Reg],
        Kind::Fence => &[],
    }
}

struct Line<'a> {
    number: usize,
    text: &'a str,
}

/// Strips `//` comments and blank lines, and splits a trailing label (`name:`
/// immediately followed by an instruction on the same physical line) onto
/// its own logical line, the way the original parser's
/// `src.replace(":", ":\n")` pass does.
fn logical_lines(src: &str) -> Vec<Line<'_>> {
    let mut out = Vec::new();
    for (number, raw) in src.lines().enumerate() {
        let number = number + 1;
        let without_comment = raw.split("//").next().unwrap_or("");
        for part in without_comment.split_inclusive(':') {
            let text = part.trim();
            if text.is_empty() {
                continue;
            }
            out.push(Line { number, text });
        }
    }
    out
}

fn parse_register(line: usize, token: &str) -> Result<usize, ParseError> {
    let digits = token
        .strip_prefix(['r', 'R'])
        .ok_or_else(|| ParseError::MalformedRegister { line, operand: token.to_owned() })?;
    let index: usize = digits
        .parse()
        .map_err(|_| ParseError::MalformedRegister { line, operand: token.to_owned() })?;
    if index >= NUM_REGISTERS {
        return Err(ParseError::MalformedRegister { line, operand: token.to_owned() });
    }
    Ok(index)
}

fn parse_immediate(line: usize, token: &str) -> Result<i32, ParseError> {
    let (negative, digits) = token.strip_prefix('-').map_or((false, token), |d| (true, d));
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else {
        digits.parse::<i64>()
    }
    .map_err(|_| ParseError::MalformedImmediate { line, operand: token.to_owned() })?;
    let value = if negative { -value } else { value };
    i32::try_from(value).map_err(|_| ParseError::MalformedImmediate { line, operand: token.to_owned() })
}

fn split_operands(rest: &str) -> Vec<&str> {
    if rest.trim().is_empty() {
        Vec::new()
    } else {
        rest.split(',').map(str::trim).collect()
    }
}

/// Parses a full assembly source string into its instructions.
///
/// # Errors
///
/// Returns the first [`ParseError`] encountered: an unknown mnemonic, a
/// wrong operand count, a malformed register or immediate, or a reference to
/// an undeclared label.
pub fn parse(src: &str) -> Result<Vec<Instruction>, ParseError> {
    let lines = logical_lines(src);

    let mut labels: HashMap<&str, usize> = HashMap::new();
    let mut index = 0usize;
    for line in &lines {
        if let Some(name) = line.text.strip_suffix(':') {
            labels.insert(name, index);
        } else {
            index += 1;
        }
    }

    let mut instrs = Vec::with_capacity(index);
    for line in &lines {
        if line.text.ends_with(':') {
            continue;
        }

        let mut parts = line.text.splitn(2, char::is_whitespace);
        let mnemonic = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("");
        let operands = split_operands(rest);

        let kind = catalog::lookup(mnemonic)
            .ok_or_else(|| ParseError::UnknownMnemonic { line: line.number, mnemonic: mnemonic.to_owned() })?;

        let syntax = operand_syntax(&kind);
        if operands.len() != syntax.len() {
            return Err(ParseError::WrongOperandCount {
                line: line.number,
                mnemonic: mnemonic.to_owned(),
                expected: syntax.len(),
                found: operands.len(),
            });
        }

        let mut values = [0i32; 3];
        for index in 0..syntax.len() {
            let operand: &str = operands[index];
            values[index] = match syntax[index] {
                OperandSyntax::Reg => parse_register(line.number, operand)? as i32,
                OperandSyntax::Imm => parse_immediate(line.number, operand)?,
                OperandSyntax::Label => *labels.get(operand).ok_or_else(|| ParseError::UnknownLabel {
                    line: line.number,
                    label: operand.to_owned(),
                })? as i32,
            };
        }

        instrs.push(Instruction::new(kind, Operands::new(&values[..syntax.len()])));
    }

    Ok(instrs)
}
