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

//! Binary arithmetic and bitwise operators.
//!
//! This module provides code generation for:
//! - `+` and `-` (string `+` is concatenation)
//! - `*`, `/`, `MOD` and `^`
//! - `AND`, `OR`, `XOR`
//!
//! Both operands are promoted to a common type first. Operations on two
//! constants are folded at compile time.

use super::conversions::{truncate, ConversionEmitter};
use super::strings::StringEmitter;
use super::variables::VariableEmitter;
use crate::backend::{LogicOp, Value};
use crate::environment::Environment;
use crate::error::{ErrorCode, Result, WarningCode};
use crate::symbols::VariableId;
use crate::types::{widen, VariableType};

/// Extension trait for binary operators.
pub trait ArithmeticEmitter {
    fn add(&mut self, a: VariableId, b: VariableId) -> Result<VariableId>;

    fn sub(&mut self, a: VariableId, b: VariableId) -> Result<VariableId>;

    /// Multiplication. The product of two integers is twice as wide as the
    /// operands, up to 32 bits.
    fn mul(&mut self, a: VariableId, b: VariableId) -> Result<VariableId>;

    fn div(&mut self, a: VariableId, b: VariableId) -> Result<VariableId>;

    fn modulo(&mut self, a: VariableId, b: VariableId) -> Result<VariableId>;

    /// `a ^ b` by repeated multiplication.
    fn power(&mut self, a: VariableId, b: VariableId) -> Result<VariableId>;

    fn logic(&mut self, op: LogicOp, a: VariableId, b: VariableId) -> Result<VariableId>;
}

/// Float entry points of the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FloatOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl FloatOp {
    fn entry(&self) -> &'static str {
        match self {
            FloatOp::Add => "FPADD",
            FloatOp::Sub => "FPSUB",
            FloatOp::Mul => "FPMUL",
            FloatOp::Div => "FPDIV",
        }
    }

    fn evaluate(&self, a: f64, b: f64) -> f64 {
        match self {
            FloatOp::Add => a + b,
            FloatOp::Sub => a - b,
            FloatOp::Mul => a * b,
            FloatOp::Div => a / b,
        }
    }
}

impl Environment {
    /// Common type of two numeric operands.
    fn promote(&self, a: VariableId, b: VariableId) -> Result<VariableType> {
        self.expect_numeric(a)?;
        self.expect_numeric(b)?;
        let (ta, tb) = (
            self.symbols.variable(a).type_info(),
            self.symbols.variable(b).type_info(),
        );
        Ok(widen(ta, tb).ty)
    }

    /// Compile time value of a float or integer constant.
    fn float_value(&self, id: VariableId) -> Option<f64> {
        let variable = self.symbols.variable(id);
        let value = variable.constant_value()?;
        Some(variable.value_float.unwrap_or(value as f64))
    }

    fn float_binary(&mut self, op: FloatOp, a: VariableId, b: VariableId) -> Result<VariableId> {
        if let (Some(x), Some(y)) = (self.float_value(a), self.float_value(b)) {
            if op == FloatOp::Div && y == 0.0 {
                return Err(self.error(ErrorCode::DivisionByZero, "division by zero"));
            }
            return Ok(self.float_constant(op.evaluate(x, y)));
        }
        let a = self.cast(a, VariableType::Float)?;
        let b = self.cast(b, VariableType::Float)?;
        let bytes = self.width(a);
        self.load(a, "FPA", bytes);
        self.load(b, "FPB", bytes);
        self.call_runtime("float", op.entry())?;
        Ok(self.result_from("FPR", bytes, VariableType::Float, op.entry()))
    }

    /// `a op b` at the width of `ty`, using a primitive of the processor.
    fn integer_binary(
        &mut self,
        ty: VariableType,
        a: VariableId,
        b: VariableId,
        purpose: &str,
        emit: impl FnOnce(&mut Environment, &Value, &Value, &str, usize),
    ) -> VariableId {
        let va = self.operand(a, ty);
        let vb = self.operand(b, ty);
        let result = self.temporary(ty, purpose);
        let name = self.real_name(result);
        let bytes = self.width(result);
        emit(self, &va, &vb, &name, bytes);
        result
    }

    /// Multiply by a constant power of two with shifts.
    fn shift_product(&mut self, ty: VariableType, value: VariableId, shift: u32) -> VariableId {
        let wide = match ty.size(self.precision()) {
            1 if ty.is_signed() => VariableType::SWord,
            1 => VariableType::Word,
            2 if ty.is_signed() => VariableType::SDWord,
            2 => VariableType::DWord,
            _ => ty,
        };
        let result = self.temporary(wide, "product");
        let name = self.real_name(result);
        let bytes = self.width(result);
        let source = self.value_of(value);
        let (from, signed) = (self.width(value), self.is_signed(value));
        self.target
            .cpu
            .copy_extend(&mut self.out, &source, from, signed, &name, bytes);
        for _ in 0..shift {
            self.target.cpu.shift_left(&mut self.out, &name, bytes);
        }
        result
    }

    fn divide(&mut self, a: VariableId, b: VariableId, remainder: bool) -> Result<VariableId> {
        let ty = self.promote(a, b)?;
        if self.constant_of(b) == Some(0) || self.float_value(b) == Some(0.0) {
            return Err(self.error(ErrorCode::DivisionByZero, "division by zero"));
        }
        if ty.is_float() {
            if remainder {
                return Err(self.error(
                    ErrorCode::DivUnsupported,
                    "MOD needs integer operands",
                ));
            }
            return self.float_binary(FloatOp::Div, a, b);
        }
        if let (Some(x), Some(y)) = (self.constant_of(a), self.constant_of(b)) {
            let value = if remainder { x % y } else { x / y };
            return Ok(self.integer_constant(value));
        }
        let bytes = ty.size(self.precision()).max(1);
        let entry = format!(
            "{}DIV{}",
            if ty.is_signed() { "S" } else { "" },
            bytes * 8
        );
        self.load(a, "MATHA", bytes);
        self.load(b, "MATHB", bytes);
        self.call_runtime("div", &entry)?;
        let register = if remainder { "MATHM" } else { "MATHR" };
        Ok(self.result_from(register, bytes, ty, if remainder { "remainder" } else { "quotient" }))
    }
}

impl ArithmeticEmitter for Environment {
    fn add(&mut self, a: VariableId, b: VariableId) -> Result<VariableId> {
        if self.type_of(a).is_string() || self.type_of(b).is_string() {
            return self.concat(a, b);
        }
        let ty = self.promote(a, b)?;
        if ty.is_float() {
            return self.float_binary(FloatOp::Add, a, b);
        }
        if let (Some(x), Some(y)) = (self.constant_of(a), self.constant_of(b)) {
            return Ok(self.integer_constant(x + y));
        }
        Ok(self.integer_binary(ty, a, b, "sum", |env, x, y, dest, bytes| {
            env.target.cpu.add(&mut env.out, x, y, dest, bytes)
        }))
    }

    fn sub(&mut self, a: VariableId, b: VariableId) -> Result<VariableId> {
        let ty = self.promote(a, b)?;
        if ty.is_float() {
            return self.float_binary(FloatOp::Sub, a, b);
        }
        if let (Some(x), Some(y)) = (self.constant_of(a), self.constant_of(b)) {
            return Ok(self.integer_constant(x - y));
        }
        Ok(self.integer_binary(ty, a, b, "difference", |env, x, y, dest, bytes| {
            env.target.cpu.sub(&mut env.out, x, y, dest, bytes)
        }))
    }

    fn mul(&mut self, a: VariableId, b: VariableId) -> Result<VariableId> {
        let ty = self.promote(a, b)?;
        if ty.is_float() {
            return self.float_binary(FloatOp::Mul, a, b);
        }
        match (self.constant_of(a), self.constant_of(b)) {
            (Some(x), Some(y)) => return Ok(self.integer_constant(x.wrapping_mul(y))),
            (Some(x), None) if x > 0 && (x as u64).is_power_of_two() => {
                return Ok(self.shift_product(ty, b, x.trailing_zeros()));
            }
            (None, Some(y)) if y > 0 && (y as u64).is_power_of_two() => {
                return Ok(self.shift_product(ty, a, y.trailing_zeros()));
            }
            _ => {}
        }

        let bytes = ty.size(self.precision()).max(1);
        let signed = ty.is_signed();
        let (entry, operand_bytes, result_type, result_bytes) = match (bytes, signed) {
            (1, false) => ("MUL8", 1, VariableType::Word, 2),
            (1, true) => ("MUL16", 2, VariableType::SWord, 2),
            (2, false) => ("MUL16", 2, VariableType::DWord, 4),
            (2, true) => ("MUL32", 4, VariableType::SDWord, 4),
            (_, true) => ("MUL32", 4, VariableType::SDWord, 4),
            (_, false) => ("MUL32", 4, VariableType::DWord, 4),
        };
        if bytes >= 4 {
            self.warn(
                WarningCode::PrecisionLossOnMultiplication,
                "the product of 32 bit values keeps only the low 32 bits",
            );
        }
        self.load(a, "MATHA", operand_bytes);
        self.load(b, "MATHB", operand_bytes);
        self.call_runtime("mul", entry)?;
        Ok(self.result_from("MATHR", result_bytes, result_type, "product"))
    }

    fn div(&mut self, a: VariableId, b: VariableId) -> Result<VariableId> {
        self.divide(a, b, false)
    }

    fn modulo(&mut self, a: VariableId, b: VariableId) -> Result<VariableId> {
        self.divide(a, b, true)
    }

    fn power(&mut self, a: VariableId, b: VariableId) -> Result<VariableId> {
        let ty = self.promote(a, b)?;
        if let (Some(x), Some(y)) = (self.float_value(a), self.float_value(b)) {
            if ty.is_float() {
                return Ok(self.float_constant(x.powf(y)));
            }
            let (base, exponent) = (x as i64, y as i64);
            if exponent >= 0 {
                let value = base.wrapping_pow(exponent.min(u32::MAX as i64) as u32);
                return Ok(self.integer_constant(value));
            }
            return Ok(self.integer_constant(0));
        }

        let result = self.temporary(ty, "power");
        let one = if ty.is_float() {
            self.float_constant(1.0)
        } else {
            self.typed_constant(1, ty)
        };
        self.assign(result, one)?;
        let exponent = self.cast(b, VariableType::Word)?;
        let count = self.temporary(VariableType::Word, "power count");
        let count_name = self.real_name(count);
        let value = self.value_of(exponent);
        self.target.cpu.copy(&mut self.out, &value, &count_name, 2);

        let top = self.make_label("pow");
        let done = self.make_label("powdone");
        self.out.label(top.clone());
        self.target
            .cpu
            .branch_if_zero(&mut self.out, &Value::mem(count_name.clone()), 2, &done);
        let product = self.mul(result, a)?;
        let product = self.cast(product, ty)?;
        let (value, name) = (self.value_of(product), self.real_name(result));
        let bytes = self.width(result);
        self.target.cpu.copy(&mut self.out, &value, &name, bytes);
        self.target.cpu.decrement(&mut self.out, &count_name, 2);
        self.target.cpu.jump(&mut self.out, &top);
        self.out.label(done);

        Ok(result)
    }

    fn logic(&mut self, op: LogicOp, a: VariableId, b: VariableId) -> Result<VariableId> {
        let ty = self.promote(a, b)?;
        if ty.is_float() {
            return Err(self.error(
                ErrorCode::LogicUnsupported,
                "bitwise operators need integer operands",
            ));
        }
        if let (Some(x), Some(y)) = (self.constant_of(a), self.constant_of(b)) {
            return Ok(self.typed_constant(truncate(op.evaluate(x, y), ty), ty));
        }
        Ok(self.integer_binary(ty, a, b, "logic", |env, x, y, dest, bytes| {
            env.target.cpu.logic(&mut env.out, op, x, y, dest, bytes)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{c64, calls, code, coco};
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_constants_fold() {
        let mut env = c64();
        let a = env.integer_constant(200);
        let b = env.integer_constant(100);
        let sum = env.add(a, b).unwrap();
        assert_eq!(env.constant_of(sum), Some(300));
        assert_eq!(env.type_of(sum), VariableType::Word);
        assert!(code(&env).is_empty());
    }

    #[test]
    fn test_byte_addition() {
        let mut env = c64();
        let a = env.define_variable("A", VariableType::Byte).unwrap();
        let one = env.integer_constant(1);
        let sum = env.add(a, one).unwrap();
        let name = env.real_name(sum);
        assert_eq!(
            code(&env),
            vec!["CLC".to_string(), "LDA _A".to_string(), "ADC #$01".to_string(), format!("STA {}", name)]
        );
    }

    #[test]
    fn test_unsigned_byte_product_is_a_word() {
        let mut env = c64();
        let a = env.define_variable("A", VariableType::Byte).unwrap();
        let b = env.define_variable("B", VariableType::Byte).unwrap();
        let product = env.mul(a, b).unwrap();
        assert_eq!(env.type_of(product), VariableType::Word);
        assert_eq!(calls(&env, "MUL8"), 1);
    }

    #[test]
    fn test_signed_byte_product_widens_operands() {
        let mut env = coco();
        let a = env.define_variable("A", VariableType::SByte).unwrap();
        let b = env.define_variable("B", VariableType::SByte).unwrap();
        let product = env.mul(a, b).unwrap();
        assert_eq!(env.type_of(product), VariableType::SWord);
        assert_eq!(calls(&env, "MUL16"), 1);
    }

    #[test]
    fn test_long_product_warns() {
        let mut env = c64();
        let a = env.define_variable("A", VariableType::DWord).unwrap();
        let b = env.define_variable("B", VariableType::DWord).unwrap();
        env.mul(a, b).unwrap();
        assert_eq!(env.warnings[0].code, WarningCode::PrecisionLossOnMultiplication);
    }

    #[test]
    fn test_power_of_two_product_shifts() {
        let mut env = c64();
        let a = env.define_variable("A", VariableType::Byte).unwrap();
        let four = env.integer_constant(4);
        env.mul(a, four).unwrap();
        assert!(!env.out.is_deployed("mul"));
        assert_eq!(code(&env).iter().filter(|l| l.starts_with("ASL")).count(), 2);
    }

    #[test]
    fn test_division_by_constant_zero() {
        let mut env = c64();
        let a = env.define_variable("A", VariableType::Word).unwrap();
        let zero = env.integer_constant(0);
        assert_eq!(env.div(a, zero).unwrap_err().code, ErrorCode::DivisionByZero);
    }

    #[test]
    fn test_signed_division_and_modulo() {
        let mut env = c64();
        let a = env.define_variable("A", VariableType::SWord).unwrap();
        let b = env.define_variable("B", VariableType::SWord).unwrap();
        let q = env.div(a, b).unwrap();
        let r = env.modulo(a, b).unwrap();
        assert_eq!(calls(&env, "SDIV16"), 2);
        assert_eq!(env.type_of(q), VariableType::SWord);
        assert_eq!(env.type_of(r), VariableType::SWord);
    }

    #[test]
    fn test_float_addition_uses_runtime() {
        let mut env = c64();
        let f = env.define_variable("F", VariableType::Float).unwrap();
        let one = env.integer_constant(1);
        let sum = env.add(f, one).unwrap();
        assert_eq!(env.type_of(sum), VariableType::Float);
        assert_eq!(calls(&env, "FPADD"), 1);
    }

    #[test]
    fn test_constant_power() {
        let mut env = c64();
        let two = env.integer_constant(2);
        let ten = env.integer_constant(10);
        let p = env.power(two, ten).unwrap();
        assert_eq!(env.constant_of(p), Some(1024));
    }

    #[test]
    fn test_logic_on_floats_is_rejected() {
        let mut env = c64();
        let f = env.float_constant(1.5);
        let one = env.integer_constant(1);
        let err = env.logic(LogicOp::And, f, one).unwrap_err();
        assert_eq!(err.code, ErrorCode::LogicUnsupported);
    }
}
