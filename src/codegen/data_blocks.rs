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

//! DATA, READ and RESTORE.
//!
//! DATA values are collected into segments at compile time and laid out
//! by the output composer after `DATASTART`, each one preceded by its type
//! tag. READ walks them at runtime through `DATAPTR`.

use super::variables::VariableEmitter;
use crate::backend::Value;
use crate::environment::Environment;
use crate::error::{ErrorCode, Result};
use crate::symbols::{ConstantValue, Datum, LabelTarget, VariableId};
use crate::types::VariableType;

/// Extension trait for the DATA statements.
pub trait DataEmitter {
    /// `DATA v1, v2, ...`, optionally `DATA AS type`.
    fn data(&mut self, values: &[VariableId], as_type: Option<VariableType>) -> Result<()>;

    /// `READ target`.
    fn read(&mut self, target: VariableId) -> Result<()>;

    /// `RESTORE` or `RESTORE label`.
    fn restore(&mut self, target: Option<LabelTarget>) -> Result<()>;

    /// `RESTORE expression`, a line number known only at runtime.
    fn restore_line(&mut self, line: VariableId) -> Result<()>;
}

impl Environment {
    fn datum_of(&mut self, id: VariableId, as_type: Option<VariableType>) -> Result<Datum> {
        let value = self.constant_value_of(id).ok_or_else(|| {
            self.error(
                ErrorCode::ValueOutOfRange,
                "DATA accepts constant values only",
            )
        })?;
        Ok(match value {
            ConstantValue::Integer(value) => match as_type {
                Some(ty) if ty.is_float() => {
                    self.features.data_float = true;
                    Datum::float(value as f64)
                }
                Some(ty) if ty.is_integer() => Datum {
                    var_type: ty,
                    ..Datum::integer(value)
                },
                _ => Datum::integer(value),
            },
            ConstantValue::Float(value) => {
                self.features.data_float = true;
                Datum::float(value)
            }
            ConstantValue::String(value) => Datum::string(value),
        })
    }

    fn read_number(&mut self) -> Result<()> {
        if self.features.data_float {
            self.deploy("float")?;
        }
        self.call_runtime("data", "DATAREADNUMBER")
    }
}

impl DataEmitter for Environment {
    fn data(&mut self, values: &[VariableId], as_type: Option<VariableType>) -> Result<()> {
        let (label, line) = match &self.last_label {
            Some(LabelTarget::Name(name)) => (Some(name.clone()), None),
            Some(LabelTarget::Line(line)) => (None, Some(*line)),
            None => (None, None),
        };
        for &id in values {
            let datum = self.datum_of(id, as_type)?;
            self.symbols.data.add(label.as_deref(), line, datum);
        }
        Ok(())
    }

    fn read(&mut self, target: VariableId) -> Result<()> {
        let ty = self.type_of(target);
        match ty {
            VariableType::DString => {
                self.call_runtime("datastr", "DATAREADSTRING")?;
                let text = self.result_from("DSA", 1, VariableType::DString, "read string");
                self.assign(target, text)
            }
            VariableType::Float => {
                self.read_number()?;
                self.target
                    .cpu
                    .copy(&mut self.out, &Value::mem("MATHR"), "MATHA", 4);
                self.call_runtime("float", "FPFROMINT")?;
                let bytes = self.width(target);
                let value = self.result_from("FPR", bytes, VariableType::Float, "read float");
                self.assign(target, value)
            }
            VariableType::Bit => {
                self.read_number()?;
                let value = self.result_from("MATHR", 4, VariableType::SDWord, "read value");
                self.assign(target, value)
            }
            ty if ty.is_integer() => {
                self.read_number()?;
                self.touch(target);
                let name = self.real_name(target);
                let bytes = self.width(target);
                self.target.cpu.copy_extend(
                    &mut self.out,
                    &Value::mem("MATHR"),
                    4,
                    true,
                    &name,
                    bytes,
                );
                Ok(())
            }
            other => Err(self.error(
                ErrorCode::ReadUnsupported,
                format!("READ cannot fill a {}", other),
            )),
        }
    }

    fn restore(&mut self, target: Option<LabelTarget>) -> Result<()> {
        match target {
            None => self.call_runtime("data", "DATARESTORE"),
            Some(target) => {
                self.deploy("data")?;
                let symbol = self.symbols.data.request_restore(target, self.span);
                self.target.cpu.address_of(&mut self.out, &symbol, "DATAPTR");
                Ok(())
            }
        }
    }

    fn restore_line(&mut self, line: VariableId) -> Result<()> {
        if let Some(value) = self.constant_of(line) {
            let line = u32::try_from(value).map_err(|_| {
                self.error(
                    ErrorCode::ValueOutOfRange,
                    format!("{} is not a line number", value),
                )
            })?;
            return self.restore(Some(LabelTarget::Line(line)));
        }
        self.expect_numeric(line)?;
        self.symbols.data.dynamic_restore = true;
        self.load(line, "DATALINE", 2);
        self.call_runtime("datarestore", "DATARESTORELINE")
    }
}

#[cfg(test)]
mod tests {
    use super::super::control_flow::FlowEmitter;
    use super::super::testing::{c64, calls, code};
    use super::*;

    #[test]
    fn test_read_restore_cycle() {
        let mut env = c64();
        let one = env.integer_constant(1);
        let two = env.integer_constant(2);
        let text = env.string_constant("x");
        env.data(&[one, two, text], None).unwrap();
        let a = env.define_variable("A", VariableType::Byte).unwrap();
        let b = env.define_variable("B", VariableType::Byte).unwrap();
        let c = env.define_variable("C$", VariableType::DString).unwrap();
        env.read(a).unwrap();
        env.read(b).unwrap();
        env.read(c).unwrap();
        env.restore(None).unwrap();
        env.read(a).unwrap();

        let segments = env.symbols.data.segments();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].data.len(), 3);
        assert_eq!(calls(&env, "DATAREADNUMBER"), 3);
        assert_eq!(calls(&env, "DATAREADSTRING"), 1);
        assert_eq!(calls(&env, "DATARESTORE"), 1);
        assert!(env.startup.contains(&"DATARESTORE"));
        assert!(code(&env).contains(&"STA _A".to_string()));
    }

    #[test]
    fn test_data_follows_last_label() {
        let mut env = c64();
        env.define_label(LabelTarget::Line(100)).unwrap();
        let one = env.integer_constant(1);
        env.data(&[one], None).unwrap();
        env.define_label(LabelTarget::Name("LEVEL".into())).unwrap();
        let two = env.integer_constant(2);
        env.data(&[two], None).unwrap();
        let segments = env.symbols.data.segments();
        assert_eq!(segments[0].line, Some(100));
        assert_eq!(segments[1].label.as_deref(), Some("LEVEL"));
    }

    #[test]
    fn test_float_data_is_flagged() {
        let mut env = c64();
        let f = env.float_constant(1.5);
        env.data(&[f], None).unwrap();
        assert!(env.features.data_float);
    }

    #[test]
    fn test_typed_data_keeps_type() {
        let mut env = c64();
        let one = env.integer_constant(1);
        env.data(&[one], Some(VariableType::Word)).unwrap();
        assert_eq!(env.symbols.data.segments()[0].data[0].var_type, VariableType::Word);
    }

    #[test]
    fn test_data_needs_constants() {
        let mut env = c64();
        let a = env.define_variable("A", VariableType::Byte).unwrap();
        let err = env.data(&[a], None).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValueOutOfRange);
    }

    #[test]
    fn test_restore_label_is_resolved_later() {
        let mut env = c64();
        env.restore(Some(LabelTarget::Line(20))).unwrap();
        assert!(code(&env).contains(&"LDA #<_restore0".to_string()));
        let err = env.symbols.data.resolve_restores().unwrap_err();
        assert_eq!(err.code, ErrorCode::UndefinedLabel);
    }

    #[test]
    fn test_computed_restore_uses_index() {
        let mut env = c64();
        let n = env.define_variable("N", VariableType::Word).unwrap();
        env.restore_line(n).unwrap();
        assert!(env.symbols.data.dynamic_restore);
        assert_eq!(calls(&env, "DATARESTORELINE"), 1);
    }

    #[test]
    fn test_read_into_image_is_rejected() {
        let mut env = c64();
        let img = env.define_variable("IMG", VariableType::Image).unwrap();
        let err = env.read(img).unwrap_err();
        assert_eq!(err.code, ErrorCode::ReadUnsupported);
    }
}
