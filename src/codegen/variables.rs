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

//! Variables, constants and moves.
//!
//! This module provides:
//! - constant temporaries for literals (integers, floats, strings)
//! - `DIM`, `VAR`, `CONST` and implicit definitions
//! - the assignment of one variable to another, with every cast it needs
//! - `BIT` variables packed into the shared bit bytes
//! - `PEEK` and `POKE`

use super::BIT_BYTES_LABEL;
use crate::backend::{LogicOp, Value};
use crate::environment::Environment;
use crate::error::{ErrorCode, Result, WarningCode};
use crate::symbols::{ConstantValue, VariableId};
use crate::types::{check_buffer_to_string, check_cast, encode_float, CastKind, VariableType};

/// Extension trait for variable handling.
pub trait VariableEmitter {
    /// A constant of the smallest integer type holding `value`.
    fn integer_constant(&mut self, value: i64) -> VariableId;

    /// A constant of type `ty`.
    fn typed_constant(&mut self, value: i64, ty: VariableType) -> VariableId;

    fn float_constant(&mut self, value: f64) -> VariableId;

    /// A static string constant.
    fn string_constant(&mut self, value: &str) -> VariableId;

    /// `CONST name = value`.
    fn define_constant(&mut self, name: &str, value: ConstantValue) -> Result<()>;

    /// Compile time value of `id`, if it has one.
    fn constant_value_of(&self, id: VariableId) -> Option<ConstantValue>;

    /// `DIM name AS ty` / `VAR name AS ty`.
    fn define_variable(&mut self, name: &str, ty: VariableType) -> Result<VariableId>;

    /// `DIM name AS ty @ address`.
    fn define_mapped_variable(&mut self, name: &str, ty: VariableType, address: u16) -> Result<VariableId>;

    /// `DIM name AS ty = value`.
    fn define_initialized_variable(&mut self, name: &str, ty: VariableType, init: VariableId) -> Result<VariableId>;

    /// The variable read by an expression naming `name`.
    ///
    /// Constants come first; unknown names are defined implicitly unless
    /// `OPTION EXPLICIT` is on.
    fn variable_reference(&mut self, name: &str) -> Result<VariableId>;

    /// The variable written by `name = ...`.
    fn assignment_target(&mut self, name: &str) -> Result<VariableId>;

    /// `dest = src`, converting between the two types.
    fn assign(&mut self, dest: VariableId, src: VariableId) -> Result<()>;

    /// `PEEK(address)`.
    fn peek(&mut self, address: VariableId) -> Result<VariableId>;

    /// `POKE address, value`.
    fn poke(&mut self, address: VariableId, value: VariableId) -> Result<()>;

    /// `GLOBAL pattern` or `SHARED pattern`.
    fn share(&mut self, pattern: &str, global: bool);
}

/// Type given to a name used without a declaration.
pub(crate) fn implicit_type(name: &str) -> VariableType {
    if name.ends_with('$') {
        VariableType::DString
    } else {
        VariableType::SWord
    }
}

impl Environment {
    /// A float packed so that `byte_operand(k)` addresses byte `k` of its
    /// encoding in memory order.
    pub(crate) fn float_bits(&self, value: f64) -> i64 {
        let encoded = encode_float(value, self.precision());
        let big_endian = self.target.cpu.syntax().big_endian;
        let n = encoded.len();
        encoded.iter().enumerate().fold(0i64, |acc, (j, b)| {
            let shift = if big_endian { 8 * (n - 1 - j) } else { 8 * j };
            acc | (i64::from(*b) << shift)
        })
    }

    /// Operand text of the byte holding `slot` of a bit variable.
    fn bit_byte(&self, id: VariableId) -> Result<(String, i64)> {
        let slot = self.symbols.variable(id).bit_slot.ok_or_else(|| {
            self.error(ErrorCode::InternalError, "bit variable without a slot")
        })?;
        let byte = if slot.byte == 0 {
            BIT_BYTES_LABEL.to_string()
        } else {
            format!("{}+{}", BIT_BYTES_LABEL, slot.byte)
        };
        Ok((byte, 1i64 << slot.bit))
    }

    /// A `BYTE` temporary holding 0 or 1 for the bit variable `id`.
    pub(crate) fn read_bit(&mut self, id: VariableId) -> Result<VariableId> {
        let (byte, mask) = self.bit_byte(id)?;
        self.touch(id);
        let temp = self.temporary(VariableType::Byte, "bit value");
        let name = self.real_name(temp);
        let skip = self.make_label("bit");
        let cpu = &self.target.cpu;
        cpu.logic(&mut self.out, LogicOp::And, &Value::mem(byte), &Value::imm(mask), &name, 1);
        cpu.branch_if_zero(&mut self.out, &Value::mem(name.clone()), 1, &skip);
        cpu.copy(&mut self.out, &Value::imm(1), &name, 1);
        self.out.label(skip);
        Ok(temp)
    }

    fn write_bit(&mut self, dest: VariableId, src: VariableId) -> Result<()> {
        let (byte, mask) = self.bit_byte(dest)?;
        let value = self.value_of(src);
        let bytes = self.width(src);
        let set = |env: &mut Environment| {
            env.target.cpu.logic(
                &mut env.out,
                LogicOp::Or,
                &Value::mem(byte.clone()),
                &Value::imm(mask),
                &byte,
                1,
            );
        };
        let clear = |env: &mut Environment| {
            env.target.cpu.logic(
                &mut env.out,
                LogicOp::And,
                &Value::mem(byte.clone()),
                &Value::imm(!mask & 0xFF),
                &byte,
                1,
            );
        };
        match value.immediate() {
            Some(0) => clear(self),
            Some(_) => set(self),
            None => {
                let zero = self.make_label("bitclr");
                let done = self.make_label("bitdone");
                self.target.cpu.branch_if_zero(&mut self.out, &value, bytes, &zero);
                set(self);
                self.target.cpu.jump(&mut self.out, &done);
                self.out.label(zero);
                clear(self);
                self.out.label(done);
            }
        }
        Ok(())
    }

    /// Store the 16 bit address of the static string behind `id` in `dest`.
    pub(crate) fn string_pointer(&mut self, id: VariableId, dest: &str) {
        self.touch(id);
        match self.symbols.variable(id).value_string {
            Some(string) => self.target.cpu.address_of(&mut self.out, &string.label(), dest),
            None => {
                let name = self.real_name(id);
                self.target.cpu.copy(&mut self.out, &Value::mem(name), dest, 2);
            }
        }
    }

    /// Release the dynamic string held by `id`.
    pub(crate) fn free_dstring(&mut self, id: VariableId) -> Result<()> {
        self.load(id, "DSA", 1);
        self.call_runtime("dstring", "DSFREE")
    }

    fn constant_temporary(&mut self, ty: VariableType, purpose: &str) -> VariableId {
        let precision = self.precision();
        let id = self.symbols.temporary(ty, precision, purpose);
        self.symbols.variable_mut(id).used = false;
        id
    }

    fn assign_integer(&mut self, dest: VariableId, src: VariableId, kind: CastKind) {
        let target = self.type_of(dest);
        let bytes = self.width(dest);
        let name = self.real_name(dest);
        match self.constant_of(src) {
            Some(value) => {
                if let Some((low, high)) = target.range() {
                    // Unsigned targets also take negative values as two's complement.
                    let low = if target.is_signed() { low } else { -(high + 1) / 2 };
                    if value < low || value > high {
                        self.warn(
                            WarningCode::ValueTruncated,
                            format!("{} does not fit in {}", value, target),
                        );
                    }
                }
                self.target.cpu.copy(&mut self.out, &Value::imm(value), &name, bytes);
            }
            None => {
                if kind == CastKind::Narrow {
                    self.warn(
                        WarningCode::ImplicitDowncast,
                        format!("{} narrowed to {}", self.type_of(src), target),
                    );
                }
                let value = self.value_of(src);
                let from = self.width(src);
                let signed = self.is_signed(src);
                self.target
                    .cpu
                    .copy_extend(&mut self.out, &value, from, signed, &name, bytes);
            }
        }
    }

    fn assign_dstring(&mut self, dest: VariableId, src: VariableId) -> Result<()> {
        let source = self.symbols.variable(src);
        let dest_name = self.real_name(dest);
        match source.var_type {
            VariableType::String => {
                self.free_dstring(dest)?;
                self.string_pointer(src, "DSPTR");
                self.call_runtime("dstring", "DSDEFINE")?;
                self.target.cpu.copy(&mut self.out, &Value::mem("DSA"), &dest_name, 1);
            }
            VariableType::DString if source.is_temporary() => {
                self.free_dstring(dest)?;
                let name = self.real_name(src);
                self.target.cpu.copy(&mut self.out, &Value::mem(name), &dest_name, 1);
            }
            VariableType::DString => {
                self.load(src, "DSA", 1);
                self.call_runtime("dstring", "DSDUP")?;
                let copy = self.result_from("DSA", 1, VariableType::DString, "string copy");
                self.free_dstring(dest)?;
                let name = self.real_name(copy);
                self.target.cpu.copy(&mut self.out, &Value::mem(name), &dest_name, 1);
            }
            VariableType::Buffer => {
                let size = source.value_buffer.as_ref().map(Vec::len).unwrap_or(0);
                let label = source.real_name.clone();
                check_buffer_to_string(size).map_err(|code| {
                    self.error(code, format!("a buffer of {} bytes cannot become a string", size))
                })?;
                self.touch(src);
                self.target.cpu.copy(&mut self.out, &Value::imm(size as i64), "DSLEN", 1);
                self.call_runtime("dstring", "DSALLOC")?;
                let text = self.result_from("DSA", 1, VariableType::DString, "buffer string");
                self.target.cpu.address_of(&mut self.out, &label, "PTR0");
                self.target.cpu.copy(&mut self.out, &Value::mem("DSPTR"), "PTR1", 2);
                self.target.cpu.copy(&mut self.out, &Value::imm(size as i64), "MEMLEN", 2);
                self.call_runtime("memmove", "MEMCPY")?;
                self.free_dstring(dest)?;
                let name = self.real_name(text);
                self.target.cpu.copy(&mut self.out, &Value::mem(name), &dest_name, 1);
            }
            other => {
                return Err(self.error(
                    ErrorCode::CannotCast,
                    format!("cannot assign {} to a string", other),
                ))
            }
        }
        Ok(())
    }

    fn assign_float(&mut self, dest: VariableId, src: VariableId, kind: CastKind) -> Result<()> {
        let name = self.real_name(dest);
        let bytes = self.width(dest);
        match kind {
            CastKind::IntegerToFloat => match self.constant_of(src) {
                Some(value) => {
                    let bits = self.float_bits(value as f64);
                    self.target.cpu.copy(&mut self.out, &Value::imm(bits), &name, bytes);
                }
                None => {
                    self.load(src, "MATHA", 4);
                    self.call_runtime("float", "FPFROMINT")?;
                    self.target.cpu.copy(&mut self.out, &Value::mem("FPR"), &name, bytes);
                }
            },
            CastKind::FloatToInteger => match self.symbols.variable(src).value_float {
                Some(value) if self.constant_of(src).is_some() => {
                    let truncated = value.trunc() as i64;
                    self.target
                        .cpu
                        .copy(&mut self.out, &Value::imm(truncated), &name, bytes);
                }
                _ => {
                    let fbytes = self.width(src);
                    self.load(src, "FPA", fbytes);
                    self.call_runtime("float", "FPTOINT")?;
                    let signed = self.is_signed(dest);
                    self.target.cpu.copy_extend(
                        &mut self.out,
                        &Value::mem("MATHR"),
                        4,
                        signed,
                        &name,
                        bytes,
                    );
                }
            },
            _ => {
                let value = self.value_of(src);
                self.target.cpu.copy(&mut self.out, &value, &name, bytes);
            }
        }
        Ok(())
    }
}

impl VariableEmitter for Environment {
    fn integer_constant(&mut self, value: i64) -> VariableId {
        self.typed_constant(value, VariableType::for_constant(value))
    }

    fn typed_constant(&mut self, value: i64, ty: VariableType) -> VariableId {
        let id = self.constant_temporary(ty, "constant");
        self.symbols.variable_mut(id).value = Some(value);
        id
    }

    fn float_constant(&mut self, value: f64) -> VariableId {
        let bits = self.float_bits(value);
        let id = self.constant_temporary(VariableType::Float, "float constant");
        let variable = self.symbols.variable_mut(id);
        variable.value = Some(bits);
        variable.value_float = Some(value);
        id
    }

    fn string_constant(&mut self, value: &str) -> VariableId {
        let string = self.symbols.strings.intern(value);
        let id = self.constant_temporary(VariableType::String, "string constant");
        self.symbols.variable_mut(id).value_string = Some(string);
        id
    }

    fn define_constant(&mut self, name: &str, value: ConstantValue) -> Result<()> {
        log::debug!("constant {} = {}", name, value);
        let result = self.symbols.define_constant(name, value).map(|_| ());
        self.located(result)
    }

    fn constant_value_of(&self, id: VariableId) -> Option<ConstantValue> {
        let variable = self.symbols.variable(id);
        if let Some(string) = variable.value_string {
            return Some(ConstantValue::String(self.symbols.strings.get(string).value.clone()));
        }
        let value = variable.constant_value()?;
        Some(match variable.value_float {
            Some(float) => ConstantValue::Float(float),
            None => ConstantValue::Integer(value),
        })
    }

    fn define_variable(&mut self, name: &str, ty: VariableType) -> Result<VariableId> {
        let precision = self.precision();
        let result = self.symbols.define_variable(name, ty, precision);
        self.located(result)
    }

    fn define_mapped_variable(&mut self, name: &str, ty: VariableType, address: u16) -> Result<VariableId> {
        let id = self.define_variable(name, ty)?;
        let size = self.width(id);
        let placed = self.memory.assign_to_area(Some(address), size);
        let (area, _) = self.located(placed)?;
        let variable = self.symbols.variable_mut(id);
        variable.absolute_address = Some(address);
        variable.area = area;
        Ok(id)
    }

    fn define_initialized_variable(&mut self, name: &str, ty: VariableType, init: VariableId) -> Result<VariableId> {
        let id = self.define_variable(name, ty)?;
        let static_value = match (self.constant_of(init), self.type_of(init)) {
            (Some(value), from) if ty.is_integer() && from.is_integer() => Some(value),
            (Some(value), VariableType::Float) if ty.is_float() => Some(value),
            _ => None,
        };
        match static_value {
            Some(value) if !self.in_procedure() && ty != VariableType::Bit => {
                let variable = self.symbols.variable_mut(id);
                variable.value = Some(value);
                variable.static_init = true;
                variable.assigned = true;
                Ok(id)
            }
            _ => {
                self.assign(id, init)?;
                Ok(id)
            }
        }
    }

    fn variable_reference(&mut self, name: &str) -> Result<VariableId> {
        if let Some(constant) = self.symbols.constant(name) {
            let value = constant.value.clone();
            return Ok(match value {
                ConstantValue::Integer(v) => self.integer_constant(v),
                ConstantValue::Float(v) => self.float_constant(v),
                ConstantValue::String(s) => self.string_constant(&s),
            });
        }
        let precision = self.precision();
        let explicit = self.options.explicit;
        let result = self
            .symbols
            .retrieve_or_define(name, implicit_type(name), precision, explicit);
        let id = self.located(result)?;
        if self.type_of(id) == VariableType::Bit {
            return self.read_bit(id);
        }
        self.touch(id);
        Ok(id)
    }

    fn assignment_target(&mut self, name: &str) -> Result<VariableId> {
        if self.symbols.constant(name).is_some() {
            return Err(self.error(
                ErrorCode::ReadOnlyVariable,
                format!("{} is a constant", name),
            ));
        }
        let precision = self.precision();
        let explicit = self.options.explicit;
        let result = self
            .symbols
            .retrieve_or_define(name, implicit_type(name), precision, explicit);
        self.located(result)
    }

    fn assign(&mut self, dest: VariableId, src: VariableId) -> Result<()> {
        if dest == src {
            return Ok(());
        }
        let target = self.symbols.variable(dest);
        if target.readonly {
            return Err(self.error(
                ErrorCode::ReadOnlyVariable,
                format!("{} cannot be assigned", target.name),
            ));
        }
        let (to, from) = (target.type_info(), self.symbols.variable(src).type_info());
        self.symbols.variable_mut(dest).assigned = true;
        self.touch(src);

        if to.ty == VariableType::Bit {
            return self.write_bit(dest, src);
        }
        let src = if from.ty == VariableType::Bit {
            self.read_bit(src)?
        } else {
            src
        };
        let from = self.symbols.variable(src).type_info();

        let kind = check_cast(from, to).map_err(|code| {
            self.error(code, format!("cannot assign {} to {}", from.ty, to.ty))
        })?;
        match kind {
            CastKind::BufferToString | CastKind::StringToString => match to.ty {
                VariableType::DString => self.assign_dstring(dest, src),
                _ => Err(self.error(
                    ErrorCode::CannotCast,
                    format!("cannot assign {} to {}", from.ty, to.ty),
                )),
            },
            CastKind::Same if to.ty == VariableType::DString => self.assign_dstring(dest, src),
            CastKind::Same if to.ty == VariableType::String => {
                let name = self.real_name(dest);
                self.string_pointer(src, &name);
                Ok(())
            }
            CastKind::Same if from.ty.is_resource() => {
                if to.ty.is_resource() {
                    return Err(self.error(
                        ErrorCode::ReadOnlyVariable,
                        format!("{} resources cannot be reassigned", to.ty),
                    ));
                }
                let (label, name) = (self.real_name(src), self.real_name(dest));
                self.target.cpu.address_of(&mut self.out, &label, &name);
                Ok(())
            }
            CastKind::Same if to.ty.is_resource() => Err(self.error(
                ErrorCode::ReadOnlyVariable,
                format!("{} resources cannot be reassigned", to.ty),
            )),
            CastKind::IntegerToFloat | CastKind::FloatToInteger => self.assign_float(dest, src, kind),
            CastKind::Same if to.ty.is_float() => self.assign_float(dest, src, kind),
            _ => {
                self.assign_integer(dest, src, kind);
                Ok(())
            }
        }
    }

    fn peek(&mut self, address: VariableId) -> Result<VariableId> {
        self.expect_numeric(address)?;
        let address = self.operand(address, VariableType::Address);
        let result = self.temporary(VariableType::Byte, "peek");
        let name = self.real_name(result);
        self.target.cpu.peek(&mut self.out, &address, &name);
        Ok(result)
    }

    fn poke(&mut self, address: VariableId, value: VariableId) -> Result<()> {
        self.expect_numeric(address)?;
        self.expect_numeric(value)?;
        let address = self.operand(address, VariableType::Address);
        let value = self.operand(value, VariableType::Byte);
        self.target.cpu.poke(&mut self.out, &address, &value);
        Ok(())
    }

    fn share(&mut self, pattern: &str, global: bool) {
        if global {
            self.symbols.add_global_pattern(pattern);
        } else {
            self.symbols.add_shared_pattern(pattern);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{c64, calls, code, coco};
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_byte_assignment_from_constant() {
        let mut env = c64();
        let a = env.define_variable("A", VariableType::Byte).unwrap();
        let ten = env.integer_constant(10);
        env.assign(a, ten).unwrap();
        assert_eq!(code(&env), vec!["LDA #$0A", "STA _A"]);
        assert!(env.warnings.is_empty());
    }

    #[test]
    fn test_constant_out_of_range_warns() {
        let mut env = c64();
        let a = env.define_variable("A", VariableType::Byte).unwrap();
        let big = env.integer_constant(300);
        env.assign(a, big).unwrap();
        assert_eq!(env.warnings[0].code, WarningCode::ValueTruncated);
    }

    #[test]
    fn test_narrowing_warns_and_keeps_low_byte() {
        let mut env = coco();
        let w = env.define_variable("W", VariableType::Word).unwrap();
        let b = env.define_variable("B", VariableType::Byte).unwrap();
        env.assign(b, w).unwrap();
        assert_eq!(env.warnings[0].code, WarningCode::ImplicitDowncast);
        assert!(code(&env).iter().any(|l| l.contains("_W+1")));
    }

    #[test]
    fn test_widening_signed_extends() {
        let mut env = c64();
        let s = env.define_variable("S", VariableType::SByte).unwrap();
        let w = env.define_variable("W", VariableType::SWord).unwrap();
        env.assign(w, s).unwrap();
        let lines = code(&env);
        assert!(lines.contains(&"LDA #$FF".to_string()));
        assert!(lines.contains(&"STA _W+1".to_string()));
    }

    #[test]
    fn test_readonly_and_constant_targets() {
        let mut env = c64();
        env.define_constant("LIVES", ConstantValue::Integer(3)).unwrap();
        let err = env.assignment_target("LIVES").unwrap_err();
        assert_eq!(err.code, ErrorCode::ReadOnlyVariable);
        let lives = env.variable_reference("LIVES").unwrap();
        assert_eq!(env.constant_of(lives), Some(3));
    }

    #[test]
    fn test_explicit_mode_rejects_unknown_names() {
        let mut env = c64();
        env.options.explicit = true;
        let err = env.variable_reference("X").unwrap_err();
        assert_eq!(err.code, ErrorCode::UndefinedVariable);
        env.options.explicit = false;
        let x = env.variable_reference("X").unwrap();
        assert_eq!(env.type_of(x), VariableType::SWord);
        let s = env.variable_reference("N$").unwrap();
        assert_eq!(env.type_of(s), VariableType::DString);
    }

    #[test]
    fn test_static_string_into_dynamic_string() {
        let mut env = c64();
        let s = env.define_variable("S$", VariableType::DString).unwrap();
        let text = env.string_constant("HELLO");
        env.assign(s, text).unwrap();
        assert_eq!(calls(&env, "DSFREE"), 1);
        assert_eq!(calls(&env, "DSDEFINE"), 1);
        assert!(code(&env).contains(&"LDA #<_STR0".to_string()));
    }

    #[test]
    fn test_named_string_is_duplicated() {
        let mut env = c64();
        let a = env.define_variable("A$", VariableType::DString).unwrap();
        let b = env.define_variable("B$", VariableType::DString).unwrap();
        env.assign(a, b).unwrap();
        assert_eq!(calls(&env, "DSDUP"), 1);
    }

    #[test]
    fn test_number_into_string_is_rejected() {
        let mut env = c64();
        let s = env.define_variable("S$", VariableType::DString).unwrap();
        let n = env.integer_constant(1);
        assert_eq!(env.assign(s, n).unwrap_err().code, ErrorCode::CannotCast);
    }

    #[test]
    fn test_bit_variables_share_a_byte() {
        let mut env = c64();
        let f = env.define_variable("F", VariableType::Bit).unwrap();
        let g = env.define_variable("G", VariableType::Bit).unwrap();
        let one = env.integer_constant(1);
        env.assign(g, one).unwrap();
        assert_eq!(code(&env), vec!["LDA _BITS", "ORA #$02", "STA _BITS"]);
        let read = env.read_bit(f).unwrap();
        assert_eq!(env.type_of(read), VariableType::Byte);
    }

    #[test]
    fn test_integer_constant_into_float_is_folded() {
        let mut env = c64();
        let f = env.define_variable("F", VariableType::Float).unwrap();
        let two = env.integer_constant(2);
        env.assign(f, two).unwrap();
        assert!(!env.out.is_deployed("float"));
        // 2 = 0.5 * 2^2: exponent 130, mantissa $00 $00
        assert_eq!(code(&env)[0], "LDA #$82");
    }

    #[test]
    fn test_float_to_integer_uses_runtime() {
        let mut env = c64();
        let f = env.define_variable("F", VariableType::Float).unwrap();
        let i = env.define_variable("I", VariableType::SWord).unwrap();
        env.assign(i, f).unwrap();
        assert_eq!(calls(&env, "FPTOINT"), 1);
    }

    #[test]
    fn test_mapped_variable_binds_area() {
        let mut env = c64();
        let id = env
            .define_mapped_variable("BORDER", VariableType::Byte, 0xC000)
            .unwrap();
        let variable = env.symbols.variable(id);
        assert_eq!(variable.absolute_address, Some(0xC000));
        assert!(variable.area.is_none());
    }

    #[test]
    fn test_mapped_variables_inside_and_outside_areas() {
        let mut env = c64();
        let screen = env
            .define_mapped_variable("SCREEN", VariableType::Byte, 0xCC10)
            .unwrap();
        let again = env
            .define_mapped_variable("CURSOR", VariableType::Byte, 0xCC10)
            .unwrap();
        let border = env
            .define_mapped_variable("BORDER", VariableType::Byte, 0xD020)
            .unwrap();
        assert!(env.symbols.variable(screen).area.is_some());
        assert!(env.symbols.variable(again).area.is_some());
        assert_eq!(env.symbols.variable(border).area, None);
        assert_eq!(env.symbols.variable(border).absolute_address, Some(0xD020));
    }

    #[test]
    fn test_initialized_global_is_static() {
        let mut env = c64();
        let five = env.integer_constant(5);
        let id = env
            .define_initialized_variable("N", VariableType::Word, five)
            .unwrap();
        assert!(env.symbols.variable(id).static_init);
        assert!(code(&env).is_empty());
    }

    #[test]
    fn test_peek_and_poke() {
        let mut env = c64();
        let address = env.integer_constant(0xD020);
        let value = env.integer_constant(1);
        env.poke(address, value).unwrap();
        let peeked = env.peek(address).unwrap();
        assert_eq!(env.type_of(peeked), VariableType::Byte);
    }
}
