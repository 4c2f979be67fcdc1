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

//! Arrays.
//!
//! Elements are stored row-major, the last index running fastest. Each
//! dimension counts its elements, so `DIM a(10)` has indices 0 to 9.
//! Dynamic string arrays hold one pool descriptor per element.

use super::strings::StringEmitter;
use super::variables::VariableEmitter;
use crate::assets::load_buffer;
use crate::backend::Value;
use crate::environment::Environment;
use crate::error::{ErrorCode, Result};
use crate::symbols::{ArrayInfo, ConstantValue, VariableId};
use crate::types::{check_array_file, check_array_init, encode_float, VariableType};

/// Extension trait for arrays.
pub trait ArrayEmitter {
    /// `DIM name(d1, d2, ...) AS element`.
    fn define_array(&mut self, name: &str, element: VariableType, dimensions: &[usize]) -> Result<VariableId>;

    /// `DIM name(...) AS element = #{ v1, v2, ... }`.
    fn define_initialized_array(
        &mut self,
        name: &str,
        element: VariableType,
        dimensions: &[usize],
        values: &[VariableId],
    ) -> Result<VariableId>;

    /// `DIM name(...) AS element = LOAD("file")`.
    fn define_array_from_file(
        &mut self,
        name: &str,
        element: VariableType,
        dimensions: &[usize],
        path: &str,
    ) -> Result<VariableId>;

    /// `name(i1, i2, ...)` in an expression.
    fn array_element(&mut self, array: VariableId, indices: &[VariableId]) -> Result<VariableId>;

    /// `name(i1, i2, ...) = value`.
    fn assign_element(&mut self, array: VariableId, indices: &[VariableId], value: VariableId) -> Result<()>;
}

/// `value` as `size` bytes in memory order.
fn integer_bytes(value: i64, size: usize, big_endian: bool) -> Vec<u8> {
    let mut bytes: Vec<u8> = (0..size).map(|k| ((value >> (8 * k)) & 0xFF) as u8).collect();
    if big_endian {
        bytes.reverse();
    }
    bytes
}

impl Environment {
    fn array_info(&self, array: VariableId) -> Result<ArrayInfo> {
        let variable = self.symbols.variable(array);
        variable.array.clone().ok_or_else(|| {
            self.error(
                ErrorCode::IndexUnsupported,
                format!("{} is not an array", variable.name),
            )
        })
    }

    fn element_type(&self, element: VariableType) -> Result<VariableType> {
        match element {
            VariableType::String | VariableType::DString => Ok(VariableType::DString),
            ty if ty.is_numeric() && ty != VariableType::Bit => Ok(ty),
            other => Err(self.error(
                ErrorCode::TypeMismatch,
                format!("arrays of {} are not supported", other),
            )),
        }
    }

    /// Multiply the 16 bit value in `dest` by `factor`.
    fn scale(&mut self, dest: &str, factor: usize) -> Result<()> {
        if factor <= 1 {
            return Ok(());
        }
        if factor.is_power_of_two() {
            for _ in 0..factor.trailing_zeros() {
                self.target.cpu.shift_left(&mut self.out, dest, 2);
            }
            return Ok(());
        }
        let cpu = &self.target.cpu;
        cpu.copy(&mut self.out, &Value::mem(dest), "MATHA", 2);
        cpu.copy(&mut self.out, &Value::imm(factor as i64), "MATHB", 2);
        self.call_runtime("mul", "MUL16")?;
        self.target
            .cpu
            .copy(&mut self.out, &Value::mem("MATHR"), dest, 2);
        Ok(())
    }

    /// Byte offset of an element: an immediate when every index is constant.
    fn element_offset(&mut self, info: &ArrayInfo, indices: &[VariableId]) -> Result<Value> {
        if indices.len() != info.dimensions.len() {
            return Err(self.error(
                ErrorCode::ArrayIndexOutOfBounds,
                format!(
                    "the array has {} dimensions, {} indices given",
                    info.dimensions.len(),
                    indices.len()
                ),
            ));
        }
        for &index in indices {
            self.expect_numeric(index)?;
        }
        let constants: Option<Vec<i64>> = indices.iter().map(|&i| self.constant_of(i)).collect();
        if let Some(constants) = constants {
            let mut offset = 0usize;
            for (&value, &size) in constants.iter().zip(&info.dimensions) {
                if value < 0 || value as usize >= size {
                    return Err(self.error(
                        ErrorCode::ArrayIndexOutOfBounds,
                        format!("index {} is outside 0..{}", value, size - 1),
                    ));
                }
                offset = offset * size + value as usize;
            }
            return Ok(Value::imm((offset * info.element_size()) as i64));
        }

        let offset = self.temporary(VariableType::Word, "element offset");
        let name = self.real_name(offset);
        self.load(indices[0], &name, 2);
        for (&index, &size) in indices.iter().zip(&info.dimensions).skip(1) {
            self.scale(&name, size)?;
            let value = self.operand(index, VariableType::Word);
            self.target
                .cpu
                .add(&mut self.out, &Value::mem(name.clone()), &value, &name, 2);
        }
        self.scale(&name, info.element_size())?;
        Ok(Value::Memory(name))
    }

    fn initial_bytes(&self, info: &ArrayInfo, values: &[VariableId]) -> Result<Vec<u8>> {
        let big_endian = self.target.cpu.syntax().big_endian;
        let size = info.element_size();
        let mut bytes = Vec::with_capacity(info.size());
        for &id in values {
            let encoded = match (self.constant_value_of(id), info.element) {
                (Some(ConstantValue::Float(v)), VariableType::Float) => encode_float(v, info.precision),
                (Some(ConstantValue::Integer(v)), VariableType::Float) => {
                    encode_float(v as f64, info.precision)
                }
                (Some(ConstantValue::Integer(v)), ty) if ty.is_integer() => {
                    integer_bytes(v, size, big_endian)
                }
                (Some(ConstantValue::Float(v)), ty) if ty.is_integer() => {
                    integer_bytes(v.trunc() as i64, size, big_endian)
                }
                _ => {
                    return Err(self.error(
                        ErrorCode::TypeMismatch,
                        format!("an array of {} needs numeric constants", info.element),
                    ))
                }
            };
            bytes.extend(encoded);
        }
        Ok(bytes)
    }
}

impl ArrayEmitter for Environment {
    fn define_array(&mut self, name: &str, element: VariableType, dimensions: &[usize]) -> Result<VariableId> {
        let element = self.element_type(element)?;
        if dimensions.is_empty() || dimensions.contains(&0) {
            return Err(self.error(
                ErrorCode::ValueOutOfRange,
                format!("{} needs at least one element in each dimension", name),
            ));
        }
        let id = self.define_variable(name, VariableType::Array)?;
        let precision = self.precision();
        self.symbols.variable_mut(id).array = Some(ArrayInfo {
            dimensions: dimensions.to_vec(),
            element,
            precision,
            init: None,
        });
        log::debug!("array {} of {} {:?}", name, element, dimensions);
        Ok(id)
    }

    fn define_initialized_array(
        &mut self,
        name: &str,
        element: VariableType,
        dimensions: &[usize],
        values: &[VariableId],
    ) -> Result<VariableId> {
        let id = self.define_array(name, element, dimensions)?;
        let info = self.array_info(id)?;
        check_array_init(info.count(), values.len()).map_err(|code| {
            self.error(
                code,
                format!("{} has {} elements but {} values were given", name, info.count(), values.len()),
            )
        })?;
        let bytes = self.initial_bytes(&info, values)?;
        if let Some(array) = self.symbols.variable_mut(id).array.as_mut() {
            array.init = Some(bytes);
        }
        Ok(id)
    }

    fn define_array_from_file(
        &mut self,
        name: &str,
        element: VariableType,
        dimensions: &[usize],
        path: &str,
    ) -> Result<VariableId> {
        let full = self.asset_path(path)?;
        let contents = self.located(load_buffer(&full))?;
        let id = self.define_array(name, element, dimensions)?;
        let size = self.width(id);
        check_array_file(size, contents.len()).map_err(|code| {
            self.error(
                code,
                format!("{} takes {} bytes but {} has {}", name, size, path, contents.len()),
            )
        })?;
        if let Some(array) = self.symbols.variable_mut(id).array.as_mut() {
            array.init = Some(contents);
        }
        Ok(id)
    }

    fn array_element(&mut self, array: VariableId, indices: &[VariableId]) -> Result<VariableId> {
        let info = self.array_info(array)?;
        let offset = self.element_offset(&info, indices)?;
        self.touch(array);
        let base = self.real_name(array);
        let result = self.temporary(info.element, "array element");
        let name = self.real_name(result);
        let bytes = info.element_size();
        self.target
            .cpu
            .load_indexed(&mut self.out, &base, &offset, &name, bytes);
        if info.element == VariableType::DString {
            // The element keeps its own copy.
            self.load(result, "DSA", 1);
            self.call_runtime("dstring", "DSDUP")?;
            self.target
                .cpu
                .copy(&mut self.out, &Value::mem("DSA"), &name, 1);
        }
        Ok(result)
    }

    fn assign_element(&mut self, array: VariableId, indices: &[VariableId], value: VariableId) -> Result<()> {
        let info = self.array_info(array)?;
        if self.symbols.variable(array).readonly {
            let name = self.symbols.variable(array).name.clone();
            return Err(self.error(ErrorCode::ReadOnlyVariable, format!("{} is read only", name)));
        }
        let source = if info.element == VariableType::DString {
            self.expect_string(value)?;
            let text = self.dstring_of(value)?;
            if self.symbols.variable(text).is_temporary() {
                text
            } else {
                self.load(text, "DSA", 1);
                self.call_runtime("dstring", "DSDUP")?;
                self.result_from("DSA", 1, VariableType::DString, "element copy")
            }
        } else {
            let converted = self.temporary(info.element, "element value");
            self.assign(converted, value)?;
            converted
        };
        let offset = self.element_offset(&info, indices)?;
        self.touch(array);
        let base = self.real_name(array);
        let bytes = info.element_size();
        if info.element == VariableType::DString {
            self.target
                .cpu
                .load_indexed(&mut self.out, &base, &offset, "DSA", 1);
            self.call_runtime("dstring", "DSFREE")?;
        }
        let src = self.value_of(source);
        self.target
            .cpu
            .store_indexed(&mut self.out, &base, &offset, &src, bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{c64, calls, code, coco};
    use super::*;

    #[test]
    fn test_array_size_follows_dimensions() {
        let mut env = c64();
        let a = env.define_array("GRID", VariableType::Word, &[3, 4]).unwrap();
        assert_eq!(env.width(a), 24);
        assert_eq!(env.type_of(a), VariableType::Array);
    }

    #[test]
    fn test_constant_index_is_an_immediate_offset() {
        let mut env = c64();
        let a = env.define_array("GRID", VariableType::Word, &[3, 4]).unwrap();
        let i = env.integer_constant(1);
        let j = env.integer_constant(2);
        let v = env.array_element(a, &[i, j]).unwrap();
        assert_eq!(env.type_of(v), VariableType::Word);
        let lines = code(&env);
        assert!(lines.contains(&format!("LDA {}+12", env.real_name(a))));
        assert!(lines.contains(&format!("LDA {}+13", env.real_name(a))));
    }

    #[test]
    fn test_constant_index_out_of_bounds() {
        let mut env = c64();
        let a = env.define_array("V", VariableType::Byte, &[5]).unwrap();
        let i = env.integer_constant(5);
        let err = env.array_element(a, &[i]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ArrayIndexOutOfBounds);
    }

    #[test]
    fn test_runtime_index_goes_through_pointer() {
        let mut env = c64();
        let a = env.define_array("V", VariableType::Word, &[10]).unwrap();
        let i = env.define_variable("I", VariableType::Byte).unwrap();
        let value = env.integer_constant(7);
        env.assign_element(a, &[i], value).unwrap();
        let lines = code(&env);
        assert!(lines.iter().any(|l| l.starts_with("ASL ")));
        assert!(lines.contains(&"STA (PTR0),Y".to_string()));
    }

    #[test]
    fn test_odd_element_size_multiplies() {
        let mut env = c64();
        let a = env.define_array("F", VariableType::Float, &[4]).unwrap();
        let i = env.define_variable("I", VariableType::Byte).unwrap();
        env.array_element(a, &[i]).unwrap();
        assert_eq!(calls(&env, "MUL16"), 1);
    }

    #[test]
    fn test_initializer_count_must_match() {
        let mut env = c64();
        let one = env.integer_constant(1);
        let err = env
            .define_initialized_array("V", VariableType::Byte, &[3], &[one, one])
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ArrayInitCountMismatch);
        assert!(err.message.contains("3 elements"));
    }

    #[test]
    fn test_initializer_follows_byte_order() {
        let mut env = coco();
        let value = env.integer_constant(0x1234);
        let a = env
            .define_initialized_array("V", VariableType::Word, &[1], &[value])
            .unwrap();
        let init = env.symbols.variable(a).array.as_ref().unwrap().init.clone();
        assert_eq!(init, Some(vec![0x12, 0x34]));

        let mut env = c64();
        let value = env.integer_constant(0x1234);
        let a = env
            .define_initialized_array("V", VariableType::Word, &[1], &[value])
            .unwrap();
        let init = env.symbols.variable(a).array.as_ref().unwrap().init.clone();
        assert_eq!(init, Some(vec![0x34, 0x12]));
    }

    #[test]
    fn test_file_size_must_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("table.bin"), [1u8, 2, 3]).unwrap();
        let mut env = c64();
        env.source_dir = dir.path().to_path_buf();
        let err = env
            .define_array_from_file("T", VariableType::Byte, &[4], "table.bin")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ArrayFileSizeMismatch);
        let ok = env
            .define_array_from_file("U", VariableType::Byte, &[3], "table.bin")
            .unwrap();
        assert_eq!(env.symbols.variable(ok).array.as_ref().unwrap().init, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_string_elements_are_duplicated_on_read() {
        let mut env = c64();
        let a = env.define_array("N$", VariableType::String, &[4]).unwrap();
        let i = env.integer_constant(2);
        let v = env.array_element(a, &[i]).unwrap();
        assert_eq!(env.type_of(v), VariableType::DString);
        assert_eq!(calls(&env, "DSDUP"), 1);
    }

    #[test]
    fn test_indexing_a_scalar_fails() {
        let mut env = c64();
        let x = env.define_variable("X", VariableType::Byte).unwrap();
        let i = env.integer_constant(0);
        let err = env.array_element(x, &[i]).unwrap_err();
        assert_eq!(err.code, ErrorCode::IndexUnsupported);
    }
}
