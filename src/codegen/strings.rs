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

//! String expressions.
//!
//! Static strings live in the string table and are read through their
//! address; every string computed at runtime is a descriptor of the
//! dynamic string pool. Functions of constant arguments are folded into
//! new static strings.
//!
//! Descriptors held by temporaries belong to the expression that made
//! them: consuming one as an operand frees it.

use super::conversions::{truncate, ConversionEmitter};
use super::variables::VariableEmitter;
use crate::backend::Value;
use crate::environment::Environment;
use crate::error::{ErrorCode, Result};
use crate::symbols::{ConstantValue, VariableId};
use crate::types::VariableType;

/// Extension trait for string functions.
pub trait StringEmitter {
    /// `a + b` on strings.
    fn concat(&mut self, a: VariableId, b: VariableId) -> Result<VariableId>;

    /// `LEFT$(s, n)`.
    fn left(&mut self, s: VariableId, n: VariableId) -> Result<VariableId>;

    /// `RIGHT$(s, n)`.
    fn right(&mut self, s: VariableId, n: VariableId) -> Result<VariableId>;

    /// `MID$(s, position [, length])`, `position` counting from 1.
    fn mid(&mut self, s: VariableId, position: VariableId, length: Option<VariableId>) -> Result<VariableId>;

    /// `LEN(s)`.
    fn len(&mut self, s: VariableId) -> Result<VariableId>;

    /// `CHR$(code)`.
    fn chr(&mut self, code: VariableId) -> Result<VariableId>;

    /// `ASC(s)`: code of the first character, 0 for the empty string.
    fn asc(&mut self, s: VariableId) -> Result<VariableId>;

    /// `STR$(n)`: decimal text of a 16 bit value.
    fn str(&mut self, n: VariableId) -> Result<VariableId>;

    /// `VAL(s)`: the signed value of the leading digits.
    fn val(&mut self, s: VariableId) -> Result<VariableId>;

    /// The dynamic string holding the value of `id`.
    fn dstring_of(&mut self, id: VariableId) -> Result<VariableId>;
}

impl Environment {
    fn string_value(&self, id: VariableId) -> Option<String> {
        match self.constant_value_of(id) {
            Some(ConstantValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Free the descriptor of a dynamic string temporary once it has
    /// been read.
    pub(crate) fn consume_dstring(&mut self, id: VariableId) -> Result<()> {
        let variable = self.symbols.variable(id);
        if variable.var_type == VariableType::DString && variable.is_temporary() {
            self.free_dstring(id)?;
        }
        Ok(())
    }

    /// Load `id` as a descriptor into the runtime register `dest`.
    fn load_dstring(&mut self, id: VariableId, dest: &str) -> Result<VariableId> {
        let string = self.dstring_of(id)?;
        self.load(string, dest, 1);
        Ok(string)
    }

    /// Call a pool routine taking `s` in `DSA` and returning a new string.
    fn substring(
        &mut self,
        s: VariableId,
        entry: &str,
        setup: impl FnOnce(&mut Environment) -> Result<()>,
    ) -> Result<VariableId> {
        self.expect_string(s)?;
        let source = self.dstring_of(s)?;
        setup(self)?;
        self.load(source, "DSA", 1);
        self.call_runtime("dstring", entry)?;
        let result = self.result_from("DSA", 1, VariableType::DString, entry);
        self.consume_dstring(source)?;
        Ok(result)
    }

    fn byte_argument(&mut self, id: VariableId, dest: &str) -> Result<()> {
        self.expect_numeric(id)?;
        let id = if self.type_of(id).is_float() {
            self.cast(id, VariableType::Byte)?
        } else {
            id
        };
        let value = self.operand(id, VariableType::Byte);
        self.deploy("dstring")?;
        self.target.cpu.copy(&mut self.out, &value, dest, 1);
        Ok(())
    }
}

/// Characters of `s` between `start` and `start + count`, both clamped.
fn slice(s: &str, start: usize, count: usize) -> String {
    s.chars().skip(start).take(count).collect()
}

impl StringEmitter for Environment {
    fn concat(&mut self, a: VariableId, b: VariableId) -> Result<VariableId> {
        self.expect_string(a)?;
        self.expect_string(b)?;
        if let (Some(x), Some(y)) = (self.string_value(a), self.string_value(b)) {
            return Ok(self.string_constant(&format!("{}{}", x, y)));
        }
        let first = self.dstring_of(a)?;
        let second = self.dstring_of(b)?;
        self.load(first, "DSA", 1);
        self.load(second, "DSB", 1);
        self.call_runtime("dstring", "DSCONCAT")?;
        let result = self.result_from("DSA", 1, VariableType::DString, "concatenation");
        self.consume_dstring(first)?;
        self.consume_dstring(second)?;
        Ok(result)
    }

    fn left(&mut self, s: VariableId, n: VariableId) -> Result<VariableId> {
        if let (Some(text), Some(count)) = (self.string_value(s), self.constant_of(n)) {
            return Ok(self.string_constant(&slice(&text, 0, count.max(0) as usize)));
        }
        self.substring(s, "DSLEFT", |env| env.byte_argument(n, "DSLEN"))
    }

    fn right(&mut self, s: VariableId, n: VariableId) -> Result<VariableId> {
        if let (Some(text), Some(count)) = (self.string_value(s), self.constant_of(n)) {
            let length = text.chars().count();
            let count = (count.max(0) as usize).min(length);
            return Ok(self.string_constant(&slice(&text, length - count, count)));
        }
        self.substring(s, "DSRIGHT", |env| env.byte_argument(n, "DSLEN"))
    }

    fn mid(&mut self, s: VariableId, position: VariableId, length: Option<VariableId>) -> Result<VariableId> {
        let count = match length {
            Some(length) => self.constant_of(length),
            None => Some(255),
        };
        if let (Some(text), Some(start), Some(count)) =
            (self.string_value(s), self.constant_of(position), count)
        {
            let start = (start.max(1) - 1) as usize;
            return Ok(self.string_constant(&slice(&text, start, count.max(0) as usize)));
        }
        self.substring(s, "DSMID", |env| {
            env.byte_argument(position, "DSPOS")?;
            match length {
                Some(length) => env.byte_argument(length, "DSLEN"),
                None => {
                    env.target.cpu.copy(&mut env.out, &Value::imm(255), "DSLEN", 1);
                    Ok(())
                }
            }
        })
    }

    fn len(&mut self, s: VariableId) -> Result<VariableId> {
        self.expect_string(s)?;
        if let Some(text) = self.string_value(s) {
            return Ok(self.typed_constant(text.chars().count() as i64, VariableType::Byte));
        }
        let source = self.load_dstring(s, "DSA")?;
        self.call_runtime("dstring", "DSLENGTH")?;
        let result = self.result_from("MATHR", 2, VariableType::Byte, "length");
        self.consume_dstring(source)?;
        Ok(result)
    }

    fn chr(&mut self, code: VariableId) -> Result<VariableId> {
        self.expect_numeric(code)?;
        if let Some(value) = self.constant_of(code) {
            let text = match value as u8 {
                0 => String::new(),
                c => char::from(c).to_string(),
            };
            return Ok(self.string_constant(&text));
        }
        let value = self.operand(code, VariableType::Byte);
        self.deploy("vars")?;
        self.target.cpu.copy(&mut self.out, &value, "MATHA", 1);
        self.call_runtime("dstring", "DSCHR")?;
        Ok(self.result_from("DSA", 1, VariableType::DString, "character"))
    }

    fn asc(&mut self, s: VariableId) -> Result<VariableId> {
        self.expect_string(s)?;
        if let Some(text) = self.string_value(s) {
            let code = text.chars().next().map(|c| c as i64).unwrap_or(0);
            return Ok(self.typed_constant(code, VariableType::Byte));
        }
        let source = self.load_dstring(s, "DSA")?;
        self.call_runtime("dstring", "DSASC")?;
        let result = self.result_from("MATHR", 2, VariableType::Byte, "character code");
        self.consume_dstring(source)?;
        Ok(result)
    }

    fn str(&mut self, n: VariableId) -> Result<VariableId> {
        self.expect_numeric(n)?;
        if let Some(value) = self.constant_of(n) {
            let text = match self.symbols.variable(n).value_float {
                Some(float) => float.to_string(),
                None => value.to_string(),
            };
            return Ok(self.string_constant(&text));
        }
        let n = if self.type_of(n).is_float() {
            self.cast(n, VariableType::SWord)?
        } else {
            n
        };
        self.load(n, "MATHA", 2);
        self.call_runtime("dstring", "DSSTR")?;
        Ok(self.result_from("DSA", 1, VariableType::DString, "number text"))
    }

    fn val(&mut self, s: VariableId) -> Result<VariableId> {
        self.expect_string(s)?;
        if let Some(text) = self.string_value(s) {
            let trimmed = text.trim_start();
            let (sign, digits) = match trimmed.strip_prefix('-') {
                Some(rest) => (-1, rest),
                None => (1, trimmed),
            };
            let value: i64 = digits
                .chars()
                .take_while(char::is_ascii_digit)
                .fold(0i64, |acc, d| acc * 10 + i64::from(d as u8 - b'0'))
                & 0xFFFF;
            let value = truncate(sign * value, VariableType::SWord);
            return Ok(self.typed_constant(value, VariableType::SWord));
        }
        let source = self.load_dstring(s, "DSA")?;
        self.call_runtime("dstring", "DSVAL")?;
        let result = self.result_from("MATHR", 2, VariableType::SWord, "value");
        self.consume_dstring(source)?;
        Ok(result)
    }

    fn dstring_of(&mut self, id: VariableId) -> Result<VariableId> {
        match self.type_of(id) {
            VariableType::DString => Ok(id),
            VariableType::String => {
                self.deploy("vars")?;
                self.string_pointer(id, "DSPTR");
                self.call_runtime("dstring", "DSDEFINE")?;
                Ok(self.result_from("DSA", 1, VariableType::DString, "string"))
            }
            other => Err(self.error(
                ErrorCode::StringExpected,
                format!("a string is required, found {}", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{c64, calls, coco};
    use super::*;
    use test_case::test_case;

    fn text_of(env: &Environment, id: VariableId) -> Option<String> {
        env.string_value(id)
    }

    #[test]
    fn test_constant_concatenation_folds() {
        let mut env = c64();
        let a = env.string_constant("HELLO, ");
        let b = env.string_constant("WORLD");
        let result = env.concat(a, b).unwrap();
        assert_eq!(text_of(&env, result).as_deref(), Some("HELLO, WORLD"));
        assert_eq!(calls(&env, "DSCONCAT"), 0);
    }

    #[test]
    fn test_runtime_concatenation() {
        let mut env = c64();
        let name = env.define_variable("N$", VariableType::DString).unwrap();
        let greeting = env.string_constant("HI ");
        let result = env.concat(greeting, name).unwrap();
        assert_eq!(env.type_of(result), VariableType::DString);
        assert_eq!(calls(&env, "DSDEFINE"), 1);
        assert_eq!(calls(&env, "DSCONCAT"), 1);
        // the descriptor made from the constant is released, N$ is not
        assert_eq!(calls(&env, "DSFREE"), 1);
    }

    #[test_case("ABCDEF", 3, "ABC" ; "prefix")]
    #[test_case("AB", 5, "AB" ; "longer than the string")]
    #[test_case("AB", 0, "" ; "nothing")]
    fn test_left_folds(text: &str, n: i64, expected: &str) {
        let mut env = c64();
        let s = env.string_constant(text);
        let n = env.integer_constant(n);
        let result = env.left(s, n).unwrap();
        assert_eq!(text_of(&env, result).as_deref(), Some(expected));
    }

    #[test]
    fn test_right_and_mid_fold() {
        let mut env = c64();
        let s = env.string_constant("ABCDEF");
        let two = env.integer_constant(2);
        let right = env.right(s, two).unwrap();
        assert_eq!(text_of(&env, right).as_deref(), Some("EF"));
        let three = env.integer_constant(3);
        let mid = env.mid(s, two, Some(three)).unwrap();
        assert_eq!(text_of(&env, mid).as_deref(), Some("BCD"));
        let rest = env.mid(s, three, None).unwrap();
        assert_eq!(text_of(&env, rest).as_deref(), Some("CDEF"));
    }

    #[test]
    fn test_mid_on_variable_uses_pool() {
        let mut env = coco();
        let s = env.define_variable("S$", VariableType::DString).unwrap();
        let two = env.integer_constant(2);
        let result = env.mid(s, two, None).unwrap();
        assert_eq!(env.type_of(result), VariableType::DString);
        assert_eq!(calls(&env, "DSMID"), 1);
        assert_eq!(calls(&env, "DSFREE"), 0);
    }

    #[test]
    fn test_len_asc_chr_val_str_fold() {
        let mut env = c64();
        let s = env.string_constant("-42X");
        let len = env.len(s).unwrap();
        assert_eq!(env.constant_of(len), Some(4));
        let asc = env.asc(s).unwrap();
        assert_eq!(env.constant_of(asc), Some(45));
        let val = env.val(s).unwrap();
        assert_eq!(env.constant_of(val), Some(-42));
        let code = env.integer_constant(65);
        let chr = env.chr(code).unwrap();
        assert_eq!(text_of(&env, chr).as_deref(), Some("A"));
        let number = env.integer_constant(-7);
        let text = env.str(number).unwrap();
        assert_eq!(text_of(&env, text).as_deref(), Some("-7"));
    }

    #[test]
    fn test_runtime_len_reads_register() {
        let mut env = c64();
        let s = env.define_variable("S$", VariableType::DString).unwrap();
        let len = env.len(s).unwrap();
        assert_eq!(env.type_of(len), VariableType::Byte);
        assert_eq!(calls(&env, "DSLENGTH"), 1);
    }

    #[test]
    fn test_numbers_are_not_strings() {
        let mut env = c64();
        let n = env.integer_constant(1);
        assert_eq!(env.len(n).unwrap_err().code, ErrorCode::StringExpected);
        assert_eq!(env.dstring_of(n).unwrap_err().code, ErrorCode::StringExpected);
    }
}
