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

//! MOS 6502 / 6510 code generation (ca65 syntax).
//!
//! Zero page pointers used for indirect access:
//! - `PTR0` / `PTR1`: two 16 bit pointers, mapped per machine by the
//!   `vars` runtime module
//!
//! Values are little-endian. Every multi-byte primitive walks the bytes
//! from the least significant one so that the carry chains.

use super::cpu::{directive_size, parse_number, Comparison, Cpu, LogicOp, PeepholeRule, Value};
use super::library::MOS6502_LIBRARY;
use super::RuntimeModule;
use crate::emitter::{AsmLine, Emitter, LineKind, Syntax, CA65};

#[derive(Debug, Default)]
pub struct Mos6502;

const BRANCHES: &[&str] = &["BCC", "BCS", "BEQ", "BNE", "BMI", "BPL", "BVC", "BVS"];

static RULES: &[PeepholeRule] = &[
    PeepholeRule {
        name: "store-reload",
        pattern: &["STA %0", "LDA %0"],
        replacement: &["STA %0"],
        changes_flags: true,
    },
    PeepholeRule {
        name: "double-load-a",
        pattern: &["LDA %0", "LDA %1"],
        replacement: &["LDA %1"],
        changes_flags: false,
    },
    PeepholeRule {
        name: "double-store",
        pattern: &["STA %0", "STA %0"],
        replacement: &["STA %0"],
        changes_flags: false,
    },
    PeepholeRule {
        name: "push-pull",
        pattern: &["PHA", "PLA"],
        replacement: &[],
        changes_flags: true,
    },
    PeepholeRule {
        name: "double-load-x",
        pattern: &["LDX %0", "LDX %1"],
        replacement: &["LDX %1"],
        changes_flags: false,
    },
    PeepholeRule {
        name: "double-load-y",
        pattern: &["LDY %0", "LDY %1"],
        replacement: &["LDY %1"],
        changes_flags: false,
    },
    PeepholeRule {
        name: "transfer-back",
        pattern: &["TAX", "TXA"],
        replacement: &["TAX"],
        changes_flags: true,
    },
    PeepholeRule {
        name: "copy-reload",
        pattern: &["LDA %0", "STA %1", "LDA %0"],
        replacement: &["LDA %0", "STA %1"],
        changes_flags: true,
    },
];

const MUL8_INLINE: &str = "    LDA MATHA
    STA MATHR
    LDA #$00
    LDX #$08
    LSR MATHR
mul8_{U}_loop:
    BCC mul8_{U}_skip
    CLC
    ADC MATHB
mul8_{U}_skip:
    ROR A
    ROR MATHR
    DEX
    BNE mul8_{U}_loop
    STA MATHR+1
";

impl Mos6502 {
    pub fn new() -> Self {
        Self
    }

    fn load_a(&self, out: &mut Emitter, value: &Value, bytes: usize, k: usize) {
        out.code(format!("LDA {}", self.byte_operand(value, bytes, k)));
    }

    fn store_a(&self, out: &mut Emitter, dest: &str, bytes: usize, k: usize) {
        out.code(format!(
            "STA {}",
            self.byte_operand(&Value::mem(dest), bytes, k)
        ));
    }

    /// Tail of a boolean computation: the branch to `label` has been
    /// emitted and means `taken`.
    fn bool_tail(&self, out: &mut Emitter, label: &str, taken: bool, dest: &str) {
        let done = out.make_label("cmpdone");
        if taken {
            out.code("LDA #$00");
            out.code(format!("BEQ {}", done));
            out.label(label);
            out.code("LDA #$FF");
        } else {
            out.code("LDA #$FF");
            out.code(format!("BNE {}", done));
            out.label(label);
            out.code("LDA #$00");
        }
        out.label(done);
        out.code(format!("STA {}", dest));
    }

    fn pointer_to(&self, out: &mut Emitter, address: &Value) {
        self.copy(out, address, "PTR0", 2);
    }
}

impl Cpu for Mos6502 {
    fn name(&self) -> &'static str {
        "6502"
    }

    fn syntax(&self) -> &'static Syntax {
        &CA65
    }

    fn library(&self) -> &'static [RuntimeModule] {
        MOS6502_LIBRARY
    }

    fn byte_operand(&self, value: &Value, _bytes: usize, k: usize) -> String {
        match value {
            Value::Immediate(v) => format!("#${:02X}", (v >> (8 * k)) & 0xFF),
            Value::Memory(symbol) if k == 0 => symbol.clone(),
            Value::Memory(symbol) => format!("{}+{}", symbol, k),
        }
    }

    fn copy(&self, out: &mut Emitter, src: &Value, dest: &str, bytes: usize) {
        for k in 0..bytes {
            self.load_a(out, src, bytes, k);
            self.store_a(out, dest, bytes, k);
        }
    }

    fn copy_extend(
        &self,
        out: &mut Emitter,
        src: &Value,
        src_bytes: usize,
        signed: bool,
        dest: &str,
        dest_bytes: usize,
    ) {
        let common = src_bytes.min(dest_bytes);
        for k in 0..common {
            self.load_a(out, src, src_bytes, k);
            self.store_a(out, dest, dest_bytes, k);
        }
        if dest_bytes <= src_bytes {
            return;
        }
        match src {
            Value::Immediate(v) => {
                let extended = if signed { *v } else { *v & ((1i64 << (8 * src_bytes)) - 1) };
                for k in src_bytes..dest_bytes {
                    self.load_a(out, &Value::imm(extended), dest_bytes, k);
                    self.store_a(out, dest, dest_bytes, k);
                }
            }
            Value::Memory(_) => {
                out.code("LDA #$00");
                if signed {
                    let positive = out.make_label("sext");
                    out.code(format!("LDX {}", self.byte_operand(src, src_bytes, src_bytes - 1)));
                    out.code(format!("BPL {}", positive));
                    out.code("LDA #$FF");
                    out.label(positive);
                }
                for k in src_bytes..dest_bytes {
                    self.store_a(out, dest, dest_bytes, k);
                }
            }
        }
    }

    fn address_of(&self, out: &mut Emitter, label: &str, dest: &str) {
        out.code(format!("LDA #<{}", label));
        out.code(format!("STA {}", dest));
        out.code(format!("LDA #>{}", label));
        out.code(format!("STA {}+1", dest));
    }

    fn add(&self, out: &mut Emitter, a: &Value, b: &Value, dest: &str, bytes: usize) {
        out.code("CLC");
        for k in 0..bytes {
            self.load_a(out, a, bytes, k);
            out.code(format!("ADC {}", self.byte_operand(b, bytes, k)));
            self.store_a(out, dest, bytes, k);
        }
    }

    fn sub(&self, out: &mut Emitter, a: &Value, b: &Value, dest: &str, bytes: usize) {
        out.code("SEC");
        for k in 0..bytes {
            self.load_a(out, a, bytes, k);
            out.code(format!("SBC {}", self.byte_operand(b, bytes, k)));
            self.store_a(out, dest, bytes, k);
        }
    }

    fn logic(&self, out: &mut Emitter, op: LogicOp, a: &Value, b: &Value, dest: &str, bytes: usize) {
        let mnemonic = match op {
            LogicOp::And => "AND",
            LogicOp::Or => "ORA",
            LogicOp::Xor => "EOR",
        };
        for k in 0..bytes {
            self.load_a(out, a, bytes, k);
            out.code(format!("{} {}", mnemonic, self.byte_operand(b, bytes, k)));
            self.store_a(out, dest, bytes, k);
        }
    }

    fn complement(&self, out: &mut Emitter, src: &Value, dest: &str, bytes: usize) {
        for k in 0..bytes {
            self.load_a(out, src, bytes, k);
            out.code("EOR #$FF");
            self.store_a(out, dest, bytes, k);
        }
    }

    fn negate(&self, out: &mut Emitter, src: &Value, dest: &str, bytes: usize) {
        out.code("SEC");
        for k in 0..bytes {
            out.code("LDA #$00");
            out.code(format!("SBC {}", self.byte_operand(src, bytes, k)));
            self.store_a(out, dest, bytes, k);
        }
    }

    fn increment(&self, out: &mut Emitter, dest: &str, bytes: usize) {
        let target = Value::mem(dest);
        if bytes == 1 {
            out.code(format!("INC {}", dest));
            return;
        }
        let done = out.make_label("inc");
        for k in 0..bytes {
            out.code(format!("INC {}", self.byte_operand(&target, bytes, k)));
            if k + 1 < bytes {
                out.code(format!("BNE {}", done));
            }
        }
        out.label(done);
    }

    fn decrement(&self, out: &mut Emitter, dest: &str, bytes: usize) {
        let target = Value::mem(dest);
        if bytes == 1 {
            out.code(format!("DEC {}", dest));
            return;
        }
        let skips: Vec<String> = (0..bytes - 1).map(|_| out.make_label("dec")).collect();
        for (k, skip) in skips.iter().enumerate() {
            out.code(format!("LDA {}", self.byte_operand(&target, bytes, k)));
            out.code(format!("BNE {}", skip));
        }
        out.code(format!("DEC {}", self.byte_operand(&target, bytes, bytes - 1)));
        for (k, skip) in skips.iter().enumerate().rev() {
            out.label(skip.clone());
            out.code(format!("DEC {}", self.byte_operand(&target, bytes, k)));
        }
    }

    fn shift_left(&self, out: &mut Emitter, dest: &str, bytes: usize) {
        let target = Value::mem(dest);
        for k in 0..bytes {
            let mnemonic = if k == 0 { "ASL" } else { "ROL" };
            out.code(format!("{} {}", mnemonic, self.byte_operand(&target, bytes, k)));
        }
    }

    fn compare(
        &self,
        out: &mut Emitter,
        cmp: Comparison,
        a: &Value,
        b: &Value,
        bytes: usize,
        signed: bool,
        dest: &str,
    ) {
        match cmp {
            Comparison::Eq | Comparison::Ne => {
                let differ = out.make_label("cmpne");
                for k in 0..bytes {
                    self.load_a(out, a, bytes, k);
                    out.code(format!("CMP {}", self.byte_operand(b, bytes, k)));
                    out.code(format!("BNE {}", differ));
                }
                self.bool_tail(out, &differ, cmp == Comparison::Ne, dest);
            }
            Comparison::Gt | Comparison::Le => {
                self.compare(out, cmp.swapped(), b, a, bytes, signed, dest)
            }
            Comparison::Lt | Comparison::Ge => {
                let less = out.make_label("cmplt");
                out.code("SEC");
                for k in 0..bytes {
                    self.load_a(out, a, bytes, k);
                    out.code(format!("SBC {}", self.byte_operand(b, bytes, k)));
                }
                if signed {
                    let no_overflow = out.make_label("cmpvc");
                    out.code(format!("BVC {}", no_overflow));
                    out.code("EOR #$80");
                    out.label(no_overflow);
                    out.code(format!("BMI {}", less));
                } else {
                    out.code(format!("BCC {}", less));
                }
                self.bool_tail(out, &less, cmp == Comparison::Lt, dest);
            }
        }
    }

    fn branch_if_zero(&self, out: &mut Emitter, value: &Value, bytes: usize, label: &str) {
        match value {
            Value::Immediate(0) => self.jump(out, label),
            Value::Immediate(_) => {}
            Value::Memory(_) => {
                let skip = out.make_label("bz");
                self.load_a(out, value, bytes, 0);
                for k in 1..bytes {
                    out.code(format!("ORA {}", self.byte_operand(value, bytes, k)));
                }
                out.code(format!("BNE {}", skip));
                out.code(format!("JMP {}", label));
                out.label(skip);
            }
        }
    }

    fn branch_if_not_zero(&self, out: &mut Emitter, value: &Value, bytes: usize, label: &str) {
        match value {
            Value::Immediate(0) => {}
            Value::Immediate(_) => self.jump(out, label),
            Value::Memory(_) => {
                let skip = out.make_label("bnz");
                self.load_a(out, value, bytes, 0);
                for k in 1..bytes {
                    out.code(format!("ORA {}", self.byte_operand(value, bytes, k)));
                }
                out.code(format!("BEQ {}", skip));
                out.code(format!("JMP {}", label));
                out.label(skip);
            }
        }
    }

    fn branch_if_not_equal(
        &self,
        out: &mut Emitter,
        value: &Value,
        constant: i64,
        bytes: usize,
        label: &str,
    ) {
        if let Value::Immediate(v) = value {
            if *v != constant {
                self.jump(out, label);
            }
            return;
        }
        let fail = out.make_label("bne");
        let equal = out.make_label("beq");
        let expected = Value::imm(constant);
        for k in 0..bytes {
            self.load_a(out, value, bytes, k);
            out.code(format!("CMP {}", self.byte_operand(&expected, bytes, k)));
            out.code(format!("BNE {}", fail));
        }
        out.code(format!("BEQ {}", equal));
        out.label(fail);
        out.code(format!("JMP {}", label));
        out.label(equal);
    }

    fn jump(&self, out: &mut Emitter, label: &str) {
        out.code(format!("JMP {}", label));
    }

    fn call(&self, out: &mut Emitter, label: &str) {
        out.code(format!("JSR {}", label));
    }

    fn ret(&self, out: &mut Emitter) {
        out.code("RTS");
    }

    fn halt(&self, out: &mut Emitter) {
        let forever = out.make_label("halt");
        out.label(forever.clone());
        out.code(format!("JMP {}", forever));
    }

    fn peek(&self, out: &mut Emitter, address: &Value, dest: &str) {
        match address {
            Value::Immediate(a) => out.code(format!("LDA ${:04X}", a & 0xFFFF)),
            Value::Memory(_) => {
                self.pointer_to(out, address);
                out.code("LDY #$00");
                out.code("LDA (PTR0),Y");
            }
        }
        out.code(format!("STA {}", dest));
    }

    fn poke(&self, out: &mut Emitter, address: &Value, value: &Value) {
        match address {
            Value::Immediate(a) => {
                self.load_a(out, value, 1, 0);
                out.code(format!("STA ${:04X}", a & 0xFFFF));
            }
            Value::Memory(_) => {
                self.pointer_to(out, address);
                self.load_a(out, value, 1, 0);
                out.code("LDY #$00");
                out.code("STA (PTR0),Y");
            }
        }
    }

    fn load_indexed(&self, out: &mut Emitter, base: &str, offset: &Value, dest: &str, bytes: usize) {
        if let Value::Immediate(o) = offset {
            for k in 0..bytes {
                out.code(format!("LDA {}+{}", base, *o as usize + k));
                self.store_a(out, dest, bytes, k);
            }
            return;
        }
        out.code("CLC");
        out.code(format!("LDA #<{}", base));
        out.code(format!("ADC {}", self.byte_operand(offset, 2, 0)));
        out.code("STA PTR0");
        out.code(format!("LDA #>{}", base));
        out.code(format!("ADC {}", self.byte_operand(offset, 2, 1)));
        out.code("STA PTR0+1");
        for k in 0..bytes {
            out.code(format!("LDY #${:02X}", k));
            out.code("LDA (PTR0),Y");
            self.store_a(out, dest, bytes, k);
        }
    }

    fn store_indexed(&self, out: &mut Emitter, base: &str, offset: &Value, src: &Value, bytes: usize) {
        if let Value::Immediate(o) = offset {
            for k in 0..bytes {
                self.load_a(out, src, bytes, k);
                out.code(format!("STA {}+{}", base, *o as usize + k));
            }
            return;
        }
        out.code("CLC");
        out.code(format!("LDA #<{}", base));
        out.code(format!("ADC {}", self.byte_operand(offset, 2, 0)));
        out.code("STA PTR0");
        out.code(format!("LDA #>{}", base));
        out.code(format!("ADC {}", self.byte_operand(offset, 2, 1)));
        out.code("STA PTR0+1");
        for k in 0..bytes {
            self.load_a(out, src, bytes, k);
            out.code(format!("LDY #${:02X}", k));
            out.code("STA (PTR0),Y");
        }
    }

    fn unconditional_transfers(&self) -> &'static [&'static str] {
        &["JMP", "RTS", "RTI"]
    }

    fn conditional_branches(&self) -> &'static [&'static str] {
        BRANCHES
    }

    fn store_mnemonics(&self) -> &'static [&'static str] {
        &["STA", "STX", "STY"]
    }

    fn peephole_rules(&self) -> &'static [PeepholeRule] {
        RULES
    }

    fn estimate_size(&self, line: &AsmLine) -> usize {
        match line.kind {
            LineKind::Directive => directive_size(&line.text),
            LineKind::Code => {
                let mnemonic = line.mnemonic().unwrap_or_default();
                let operand = line.operand();
                if operand.is_empty() || operand.eq_ignore_ascii_case("A") {
                    1
                } else if operand.starts_with('#') || BRANCHES.contains(&mnemonic.as_str()) {
                    2
                } else if mnemonic == "JMP" || mnemonic == "JSR" {
                    3
                } else if operand.starts_with('(') {
                    2
                } else {
                    let base = operand.split(',').next().unwrap_or(operand);
                    match parse_number(base.trim()) {
                        Some(n) if n <= 0xFF => 2,
                        _ => 3,
                    }
                }
            }
            _ => 0,
        }
    }

    fn inline_body(&self, entry: &str) -> Option<&'static str> {
        match entry {
            "MUL8" => Some(MUL8_INLINE),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(emitter: &Emitter) -> Vec<String> {
        emitter.lines().iter().map(|l| l.text.clone()).collect()
    }

    #[test]
    fn test_copy_immediate_word() {
        let mut out = Emitter::new();
        Mos6502.copy(&mut out, &Value::imm(0x1234), "_A", 2);
        assert_eq!(
            texts(&out),
            vec!["LDA #$34", "STA _A", "LDA #$12", "STA _A+1"]
        );
    }

    #[test]
    fn test_add_chains_carry() {
        let mut out = Emitter::new();
        Mos6502.add(&mut out, &Value::mem("_A"), &Value::imm(1), "_B", 2);
        assert_eq!(
            texts(&out),
            vec!["CLC", "LDA _A", "ADC #$01", "STA _B", "LDA _A+1", "ADC #$00", "STA _B+1"]
        );
    }

    #[test]
    fn test_signed_extension() {
        let mut out = Emitter::new();
        Mos6502.copy_extend(&mut out, &Value::mem("_S"), 1, true, "_W", 2);
        let text = texts(&out);
        assert!(text.contains(&"LDX _S".to_string()));
        assert!(text.contains(&"LDA #$FF".to_string()));
        assert_eq!(text.last().map(String::as_str), Some("STA _W+1"));
    }

    #[test]
    fn test_compare_greater_swaps_operands() {
        let mut out = Emitter::new();
        Mos6502.compare(
            &mut out,
            Comparison::Gt,
            &Value::imm(2),
            &Value::imm(1),
            1,
            false,
            "Ttmp0",
        );
        let text = texts(&out);
        assert_eq!(&text[..3], &["SEC", "LDA #$01", "SBC #$02"]);
        assert!(text[3].starts_with("BCC "));
        assert_eq!(text.last().map(String::as_str), Some("STA Ttmp0"));
    }

    #[test]
    fn test_branch_if_zero_on_constant() {
        let mut out = Emitter::new();
        Mos6502.branch_if_zero(&mut out, &Value::imm(1), 1, "_else");
        assert!(out.lines().is_empty());
        Mos6502.branch_if_zero(&mut out, &Value::imm(0), 1, "_else");
        assert_eq!(texts(&out), vec!["JMP _else"]);
    }

    #[test]
    fn test_size_estimates() {
        let cpu = Mos6502;
        assert_eq!(cpu.estimate_size(&AsmLine::code("RTS")), 1);
        assert_eq!(cpu.estimate_size(&AsmLine::code("LDA #$01")), 2);
        assert_eq!(cpu.estimate_size(&AsmLine::code("LDA $FB")), 2);
        assert_eq!(cpu.estimate_size(&AsmLine::code("STA _A")), 3);
        assert_eq!(cpu.estimate_size(&AsmLine::code("BNE _x")), 2);
        assert_eq!(cpu.estimate_size(&AsmLine::directive(".res 4")), 4);
    }

    #[test]
    fn test_unconditional() {
        let cpu = Mos6502;
        assert!(cpu.is_unconditional(&AsmLine::code("JMP _x")));
        assert!(!cpu.is_unconditional(&AsmLine::code("BNE _x")));
        assert_eq!(cpu.jump_target(&AsmLine::code("JMP _x")), Some("_x"));
        assert_eq!(cpu.jump_target(&AsmLine::code("JMP (PTR0)")), None);
    }
}
