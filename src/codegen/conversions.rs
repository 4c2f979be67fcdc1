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

//! Explicit and implicit type conversions.
//!
//! `CAST(expr AS type)` and the promotions of binary operators end up
//! here. Unlike assignments, conversions never warn: the program asked
//! for the target type.

use super::variables::VariableEmitter;
use crate::backend::Value;
use crate::environment::Environment;
use crate::error::{ErrorCode, Result};
use crate::symbols::VariableId;
use crate::types::{check_cast, CastKind, TypeInfo, VariableType};

/// Extension trait for conversions.
pub trait ConversionEmitter {
    /// A variable of type `ty` holding the value of `id`.
    ///
    /// Returns `id` itself when no conversion is needed.
    fn cast(&mut self, id: VariableId, ty: VariableType) -> Result<VariableId>;
}

/// `value` reduced to what a variable of `ty` stores.
pub(crate) fn truncate(value: i64, ty: VariableType) -> i64 {
    let bits = ty.bits(crate::types::FloatPrecision::Fast);
    if !(1..64).contains(&bits) {
        return value;
    }
    let masked = value & ((1i64 << bits) - 1);
    if ty.is_signed() && (masked >> (bits - 1)) & 1 == 1 {
        masked - (1i64 << bits)
    } else {
        masked
    }
}

impl ConversionEmitter for Environment {
    fn cast(&mut self, id: VariableId, ty: VariableType) -> Result<VariableId> {
        let from = self.symbols.variable(id).type_info();
        let to = TypeInfo::new(ty, self.precision());
        if from == to {
            return Ok(id);
        }
        let source = if from.ty == VariableType::Bit {
            self.read_bit(id)?
        } else {
            id
        };
        let from = self.symbols.variable(source).type_info();
        let kind = check_cast(from, to).map_err(|code| {
            self.error(code, format!("cannot convert {} to {}", from.ty, to.ty))
        })?;
        log::trace!("cast {} -> {} ({:?})", from.ty, to.ty, kind);

        if let Some(value) = self.constant_of(source) {
            match kind {
                CastKind::Same | CastKind::Widen | CastKind::Narrow => {
                    return Ok(self.typed_constant(truncate(value, ty), ty));
                }
                CastKind::IntegerToFloat => return Ok(self.float_constant(value as f64)),
                CastKind::FloatToInteger => {
                    let float = self.symbols.variable(source).value_float.unwrap_or(0.0);
                    return Ok(self.typed_constant(truncate(float.trunc() as i64, ty), ty));
                }
                _ => {}
            }
        }

        match kind {
            CastKind::Same | CastKind::Widen | CastKind::Narrow if ty.is_integer() => {
                let result = self.temporary(ty, "cast");
                let name = self.real_name(result);
                let bytes = self.width(result);
                if from.ty.is_resource() {
                    let label = self.real_name(source);
                    self.target.cpu.address_of(&mut self.out, &label, &name);
                } else {
                    let value = self.value_of(source);
                    let (src_bytes, signed) = (self.width(source), self.is_signed(source));
                    self.target
                        .cpu
                        .copy_extend(&mut self.out, &value, src_bytes, signed, &name, bytes);
                }
                Ok(result)
            }
            CastKind::IntegerToFloat | CastKind::FloatToInteger => {
                let result = self.temporary(ty, "cast");
                self.assign(result, source)?;
                Ok(result)
            }
            CastKind::StringToString | CastKind::BufferToString if ty == VariableType::DString => {
                let result = self.temporary(ty, "cast");
                let name = self.real_name(result);
                self.target.cpu.copy(&mut self.out, &Value::imm(0), &name, 1);
                self.assign(result, source)?;
                Ok(result)
            }
            _ => Err(self.error(
                ErrorCode::CannotCast,
                format!("cannot convert {} to {}", from.ty, to.ty),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{c64, calls, code};
    use super::*;
    use test_case::test_case;

    #[test_case(300, VariableType::Byte, 44 ; "byte wraps")]
    #[test_case(-1, VariableType::Byte, 255 ; "negative to unsigned")]
    #[test_case(255, VariableType::SByte, -1 ; "unsigned to signed")]
    #[test_case(0x12345, VariableType::Word, 0x2345 ; "word keeps low half")]
    #[test_case(-2, VariableType::SWord, -2 ; "signed stays")]
    fn test_truncate(value: i64, ty: VariableType, expected: i64) {
        assert_eq!(truncate(value, ty), expected);
    }

    #[test]
    fn test_constant_casts_fold() {
        let mut env = c64();
        let value = env.integer_constant(513);
        let byte = env.cast(value, VariableType::Byte).unwrap();
        assert_eq!(env.constant_of(byte), Some(1));
        assert!(code(&env).is_empty());
        assert!(env.warnings.is_empty());
    }

    #[test]
    fn test_same_type_is_identity() {
        let mut env = c64();
        let w = env.define_variable("W", VariableType::Word).unwrap();
        assert_eq!(env.cast(w, VariableType::Word).unwrap(), w);
    }

    #[test]
    fn test_runtime_widening() {
        let mut env = c64();
        let b = env.define_variable("B", VariableType::Byte).unwrap();
        let w = env.cast(b, VariableType::Word).unwrap();
        let name = env.real_name(w);
        assert_eq!(
            code(&env),
            vec![
                "LDA _B".to_string(),
                format!("STA {}", name),
                "LDA #$00".to_string(),
                format!("STA {}+1", name),
            ]
        );
    }

    #[test]
    fn test_integer_to_float_calls_runtime() {
        let mut env = c64();
        let i = env.define_variable("I", VariableType::SWord).unwrap();
        let f = env.cast(i, VariableType::Float).unwrap();
        assert_eq!(env.type_of(f), VariableType::Float);
        assert_eq!(calls(&env, "FPFROMINT"), 1);
    }

    #[test]
    fn test_number_to_string_is_rejected() {
        let mut env = c64();
        let i = env.define_variable("I", VariableType::Byte).unwrap();
        let err = env.cast(i, VariableType::DString).unwrap_err();
        assert_eq!(err.code, ErrorCode::CannotCast);
    }
}
