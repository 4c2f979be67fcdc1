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

//! Relational operators.
//!
//! Every comparison yields a `BYTE` holding $FF for true and $00 for
//! false, so that `AND`, `OR` and `NOT` work on its result bitwise.
//! Strings compare through the pool routine `DSCMP` and floats through
//! `FPCMP`; both leave 0 (equal), 1 (less) or 2 (greater) in `MATHR`.

use super::conversions::ConversionEmitter;
use super::strings::StringEmitter;
use crate::backend::{Comparison, Value};
use crate::environment::Environment;
use crate::error::{ErrorCode, Result};
use crate::symbols::VariableId;
use crate::types::{widen, VariableType};

/// Extension trait for comparisons.
pub trait ComparisonEmitter {
    /// `a <cmp> b`.
    fn compare(&mut self, cmp: Comparison, a: VariableId, b: VariableId) -> Result<VariableId>;
}

impl Environment {
    /// Turn the three-way result left in `MATHR` into a truth value.
    fn three_way(&mut self, cmp: Comparison) -> VariableId {
        let (test, outcome) = match cmp {
            Comparison::Eq => (Comparison::Eq, 0),
            Comparison::Ne => (Comparison::Ne, 0),
            Comparison::Lt => (Comparison::Eq, 1),
            Comparison::Ge => (Comparison::Ne, 1),
            Comparison::Gt => (Comparison::Eq, 2),
            Comparison::Le => (Comparison::Ne, 2),
        };
        let result = self.temporary(VariableType::Byte, "comparison");
        let name = self.real_name(result);
        self.target.cpu.compare(
            &mut self.out,
            test,
            &Value::mem("MATHR"),
            &Value::imm(outcome),
            1,
            false,
            &name,
        );
        result
    }

    fn compare_strings(&mut self, cmp: Comparison, a: VariableId, b: VariableId) -> Result<VariableId> {
        let first = self.dstring_of(a)?;
        let second = self.dstring_of(b)?;
        self.load(first, "DSA", 1);
        self.load(second, "DSB", 1);
        self.call_runtime("dstring", "DSCMP")?;
        let result = self.three_way(cmp);
        self.consume_dstring(first)?;
        self.consume_dstring(second)?;
        Ok(result)
    }

    fn compare_floats(&mut self, cmp: Comparison, a: VariableId, b: VariableId) -> Result<VariableId> {
        let a = self.cast(a, VariableType::Float)?;
        let b = self.cast(b, VariableType::Float)?;
        let bytes = self.width(a);
        self.load(a, "FPA", bytes);
        self.load(b, "FPB", bytes);
        self.call_runtime("float", "FPCMP")?;
        Ok(self.three_way(cmp))
    }
}

impl ComparisonEmitter for Environment {
    fn compare(&mut self, cmp: Comparison, a: VariableId, b: VariableId) -> Result<VariableId> {
        let (ta, tb) = (self.type_of(a), self.type_of(b));
        if ta.is_string() || tb.is_string() {
            if !(ta.is_string() && tb.is_string()) {
                return Err(self.error(
                    ErrorCode::CompareUnsupported,
                    format!("cannot compare {} with {}", ta, tb),
                ));
            }
            return self.compare_strings(cmp, a, b);
        }
        if !ta.is_numeric() || !tb.is_numeric() {
            return Err(self.error(
                ErrorCode::CompareUnsupported,
                format!("cannot compare {} with {}", ta, tb),
            ));
        }
        let common = widen(
            self.symbols.variable(a).type_info(),
            self.symbols.variable(b).type_info(),
        )
        .ty;
        if common.is_float() {
            return self.compare_floats(cmp, a, b);
        }
        // Mixed signedness compares in the signed type of the wider width.
        let common = if ta.is_signed() != tb.is_signed() {
            common.signed()
        } else {
            common
        };
        let va = self.operand(a, common);
        let vb = self.operand(b, common);
        let bytes = common.size(self.precision()).max(1);
        let result = self.temporary(VariableType::Byte, "comparison");
        let name = self.real_name(result);
        self.target
            .cpu
            .compare(&mut self.out, cmp, &va, &vb, bytes, common.is_signed(), &name);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{c64, calls, code};
    use super::super::variables::VariableEmitter;
    use super::*;

    #[test]
    fn test_constants_are_compared_at_runtime() {
        let mut env = c64();
        let two = env.integer_constant(2);
        let one = env.integer_constant(1);
        let result = env.compare(Comparison::Gt, two, one).unwrap();
        assert_eq!(env.type_of(result), VariableType::Byte);
        let lines = code(&env);
        assert_eq!(lines[0], "SEC");
        assert_eq!(lines[1], "LDA #$01");
        assert_eq!(lines[2], "SBC #$02");
    }

    #[test]
    fn test_word_equality_checks_every_byte() {
        let mut env = c64();
        let w = env.define_variable("W", VariableType::Word).unwrap();
        let k = env.integer_constant(1000);
        env.compare(Comparison::Eq, w, k).unwrap();
        let compares = code(&env).iter().filter(|l| l.starts_with("CMP")).count();
        assert_eq!(compares, 2);
    }

    #[test]
    fn test_strings_use_three_way_routine() {
        let mut env = c64();
        let s = env.define_variable("S$", VariableType::DString).unwrap();
        let k = env.string_constant("YES");
        env.compare(Comparison::Ne, s, k).unwrap();
        assert_eq!(calls(&env, "DSCMP"), 1);
        assert_eq!(calls(&env, "DSFREE"), 1);
    }

    #[test]
    fn test_floats_use_runtime() {
        let mut env = c64();
        let f = env.define_variable("F", VariableType::Float).unwrap();
        let i = env.integer_constant(3);
        env.compare(Comparison::Le, f, i).unwrap();
        assert_eq!(calls(&env, "FPCMP"), 1);
    }

    #[test]
    fn test_string_with_number_is_rejected() {
        let mut env = c64();
        let s = env.string_constant("A");
        let n = env.integer_constant(1);
        let err = env.compare(Comparison::Eq, s, n).unwrap_err();
        assert_eq!(err.code, ErrorCode::CompareUnsupported);
    }
}
