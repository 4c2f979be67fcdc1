// ugBC - A retargetable BASIC compiler creating binaries for 8-bit home computers
// Copyright (C) 2026  Marcel Joachim Kloubert <marcel@kloubert.dev>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! The CPU half of a target.
//!
//! A `Cpu` knows how to express the primitive operations of the code
//! generator (moves, arithmetic, comparisons, branches, indexed access)
//! in its instruction set, and which runtime modules implement the
//! operations that are too large to emit inline.

use super::RuntimeModule;
use crate::emitter::{AsmLine, Emitter, LineKind, Syntax};

/// A source operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// The variable or runtime location with this symbol.
    Memory(String),
    Immediate(i64),
}

impl Value {
    pub fn mem(symbol: impl Into<String>) -> Self {
        Value::Memory(symbol.into())
    }

    pub fn imm(value: i64) -> Self {
        Value::Immediate(value)
    }

    pub fn immediate(&self) -> Option<i64> {
        match self {
            Value::Immediate(v) => Some(*v),
            Value::Memory(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    /// The comparison obtained by swapping the operands.
    pub fn swapped(&self) -> Comparison {
        match self {
            Comparison::Lt => Comparison::Gt,
            Comparison::Le => Comparison::Ge,
            Comparison::Gt => Comparison::Lt,
            Comparison::Ge => Comparison::Le,
            other => *other,
        }
    }

    pub fn evaluate(&self, a: i64, b: i64) -> bool {
        match self {
            Comparison::Eq => a == b,
            Comparison::Ne => a != b,
            Comparison::Lt => a < b,
            Comparison::Le => a <= b,
            Comparison::Gt => a > b,
            Comparison::Ge => a >= b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
    Xor,
}

impl LogicOp {
    pub fn evaluate(&self, a: i64, b: i64) -> i64 {
        match self {
            LogicOp::And => a & b,
            LogicOp::Or => a | b,
            LogicOp::Xor => a ^ b,
        }
    }
}

/// A table-driven peephole rewrite.
///
/// Pattern lines are matched against consecutive code lines; `%0`..`%9`
/// capture one operand and must match the same text wherever they repeat.
#[derive(Debug)]
pub struct PeepholeRule {
    pub name: &'static str,
    pub pattern: &'static [&'static str],
    pub replacement: &'static [&'static str],
    /// The rewrite changes the processor flags, so it is skipped when a
    /// conditional branch follows the window.
    pub changes_flags: bool,
}

/// Instruction-level primitives of one processor family.
///
/// Multi-byte operations take the width in bytes. Byte `k` of a value is
/// counted from the least significant byte, whatever the byte order of
/// the processor.
pub trait Cpu {
    fn name(&self) -> &'static str;

    fn syntax(&self) -> &'static Syntax;

    /// Runtime modules written for this processor.
    fn library(&self) -> &'static [RuntimeModule];

    /// Operand text addressing byte `k` of a `bytes` wide value.
    fn byte_operand(&self, value: &Value, bytes: usize, k: usize) -> String;

    /// `dest = src`.
    fn copy(&self, out: &mut Emitter, src: &Value, dest: &str, bytes: usize);

    /// `dest = src` between widths, sign extending when `signed`.
    fn copy_extend(
        &self,
        out: &mut Emitter,
        src: &Value,
        src_bytes: usize,
        signed: bool,
        dest: &str,
        dest_bytes: usize,
    );

    /// Store the address of `label` in the 16 bit `dest`.
    fn address_of(&self, out: &mut Emitter, label: &str, dest: &str);

    fn add(&self, out: &mut Emitter, a: &Value, b: &Value, dest: &str, bytes: usize);

    fn sub(&self, out: &mut Emitter, a: &Value, b: &Value, dest: &str, bytes: usize);

    fn logic(&self, out: &mut Emitter, op: LogicOp, a: &Value, b: &Value, dest: &str, bytes: usize);

    /// Bitwise NOT.
    fn complement(&self, out: &mut Emitter, src: &Value, dest: &str, bytes: usize);

    /// Two's complement negation.
    fn negate(&self, out: &mut Emitter, src: &Value, dest: &str, bytes: usize);

    fn increment(&self, out: &mut Emitter, dest: &str, bytes: usize);

    fn decrement(&self, out: &mut Emitter, dest: &str, bytes: usize);

    /// Shift `dest` left by one bit.
    fn shift_left(&self, out: &mut Emitter, dest: &str, bytes: usize);

    /// `dest = (a cmp b) ? $FF : $00`, `dest` being one byte.
    #[allow(clippy::too_many_arguments)]
    fn compare(
        &self,
        out: &mut Emitter,
        cmp: Comparison,
        a: &Value,
        b: &Value,
        bytes: usize,
        signed: bool,
        dest: &str,
    );

    /// Jump to `label` when `value` is zero.
    fn branch_if_zero(&self, out: &mut Emitter, value: &Value, bytes: usize, label: &str);

    /// Jump to `label` when `value` is not zero.
    fn branch_if_not_zero(&self, out: &mut Emitter, value: &Value, bytes: usize, label: &str);

    /// Jump to `label` when `value` differs from `constant`.
    fn branch_if_not_equal(
        &self,
        out: &mut Emitter,
        value: &Value,
        constant: i64,
        bytes: usize,
        label: &str,
    );

    fn jump(&self, out: &mut Emitter, label: &str);

    fn call(&self, out: &mut Emitter, label: &str);

    fn ret(&self, out: &mut Emitter);

    /// Stop the program in an endless loop.
    fn halt(&self, out: &mut Emitter);

    /// `dest = PEEK(address)`.
    fn peek(&self, out: &mut Emitter, address: &Value, dest: &str);

    /// `POKE address, value`.
    fn poke(&self, out: &mut Emitter, address: &Value, value: &Value);

    /// `dest = *(base + offset)`, `offset` being 16 bit.
    fn load_indexed(&self, out: &mut Emitter, base: &str, offset: &Value, dest: &str, bytes: usize);

    /// `*(base + offset) = src`.
    fn store_indexed(&self, out: &mut Emitter, base: &str, offset: &Value, src: &Value, bytes: usize);

    /// Mnemonics that transfer control unconditionally.
    fn unconditional_transfers(&self) -> &'static [&'static str];

    /// Mnemonics of conditional branches.
    fn conditional_branches(&self) -> &'static [&'static str];

    /// Mnemonics that only write their operand.
    fn store_mnemonics(&self) -> &'static [&'static str];

    fn peephole_rules(&self) -> &'static [PeepholeRule];

    /// Estimated size in bytes of an emitted line.
    fn estimate_size(&self, line: &AsmLine) -> usize;

    /// Body emitted at every call site when a routine is preferred inline.
    fn inline_body(&self, _entry: &str) -> Option<&'static str> {
        None
    }

    /// Target label of an unconditional jump to a label, if `line` is one.
    fn jump_target<'a>(&self, line: &'a AsmLine) -> Option<&'a str> {
        let mnemonic = line.mnemonic()?;
        if !["JMP", "BRA", "LBRA"].contains(&mnemonic.as_str()) {
            return None;
        }
        let operand = line.operand();
        let is_label = operand
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
            && operand.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        is_label.then_some(operand)
    }

    /// Whether `line` ends the reachable code that precedes it.
    fn is_unconditional(&self, line: &AsmLine) -> bool {
        if line.kind != LineKind::Code {
            return false;
        }
        match line.mnemonic() {
            Some(m) if self.unconditional_transfers().contains(&m.as_str()) => true,
            Some(m) if m == "PULS" || m == "PULU" => line.operand().to_ascii_uppercase().contains("PC"),
            _ => false,
        }
    }
}

/// Size of a data directive in bytes, shared by the processor estimators.
pub(crate) fn directive_size(text: &str) -> usize {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let keyword = parts.next().unwrap_or("").to_ascii_uppercase();
    let operand = parts.next().unwrap_or("").trim();
    let count = if operand.is_empty() {
        0
    } else {
        operand.split(',').count()
    };
    match keyword.as_str() {
        ".BYTE" | "FCB" => count,
        ".WORD" | "FDB" => count * 2,
        ".DWORD" => count * 4,
        ".RES" | "RZB" | "RMB" => operand
            .split(',')
            .next()
            .and_then(|n| parse_number(n.trim()))
            .map(|n| n as usize)
            .unwrap_or(0),
        ".ASCIIZ" | "FCC" => operand.len().saturating_sub(2) + usize::from(keyword == ".ASCIIZ"),
        _ => 0,
    }
}

/// Parse `$hex`, `%bin` or decimal assembler numbers.
pub(crate) fn parse_number(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix('$') {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = text.strip_prefix('%') {
        i64::from_str_radix(bin, 2).ok()
    } else {
        text.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_swap() {
        assert_eq!(Comparison::Lt.swapped(), Comparison::Gt);
        assert_eq!(Comparison::Eq.swapped(), Comparison::Eq);
        assert!(Comparison::Ge.evaluate(3, 3));
    }

    #[test]
    fn test_directive_size() {
        assert_eq!(directive_size(".byte $01,$02,$03"), 3);
        assert_eq!(directive_size(".word _a, _b"), 4);
        assert_eq!(directive_size(".res 10"), 10);
        assert_eq!(directive_size("RZB $10"), 16);
        assert_eq!(directive_size("FDB 1"), 2);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("$FF"), Some(255));
        assert_eq!(parse_number("%101"), Some(5));
        assert_eq!(parse_number("12"), Some(12));
        assert_eq!(parse_number("_A"), None);
    }
}
