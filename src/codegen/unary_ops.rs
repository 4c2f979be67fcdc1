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

//! Unary operators and single-operand statements.
//!
//! `-x`, `NOT x`, `INC x`, `DEC x`, `RND` and `RANDOMIZE`.

use super::conversions::truncate;
use super::variables::VariableEmitter;
use crate::environment::Environment;
use crate::error::{ErrorCode, Result};
use crate::symbols::VariableId;
use crate::types::VariableType;

/// Extension trait for unary operators.
pub trait UnaryEmitter {
    /// Two's complement negation; unsigned operands give a signed result.
    fn negate(&mut self, id: VariableId) -> Result<VariableId>;

    /// Bitwise `NOT`.
    fn not(&mut self, id: VariableId) -> Result<VariableId>;

    /// `INC name`.
    fn increment(&mut self, id: VariableId) -> Result<()>;

    /// `DEC name`.
    fn decrement(&mut self, id: VariableId) -> Result<()>;

    /// `RND(max)`: a pseudo random `WORD`, reduced modulo `max` when given.
    fn random(&mut self, max: Option<VariableId>) -> Result<VariableId>;

    /// `RANDOMIZE [seed]`.
    fn randomize(&mut self, seed: Option<VariableId>) -> Result<()>;
}

impl UnaryEmitter for Environment {
    fn negate(&mut self, id: VariableId) -> Result<VariableId> {
        let ty = self.type_of(id);
        if !ty.is_numeric() {
            return Err(self.error(
                ErrorCode::NegationUnsupported,
                format!("{} cannot be negated", ty),
            ));
        }
        if ty.is_float() {
            if let Some(value) = self.symbols.variable(id).value_float {
                if self.constant_of(id).is_some() {
                    return Ok(self.float_constant(-value));
                }
            }
            let bytes = self.width(id);
            self.load(id, "FPA", bytes);
            self.call_runtime("float", "FPNEG")?;
            return Ok(self.result_from("FPR", bytes, VariableType::Float, "negation"));
        }
        if let Some(value) = self.constant_of(id) {
            return Ok(self.integer_constant(-value));
        }
        let result_ty = ty.signed();
        let result = self.temporary(result_ty, "negation");
        let (value, name, bytes) = (self.value_of(id), self.real_name(result), self.width(result));
        self.target.cpu.negate(&mut self.out, &value, &name, bytes);
        Ok(result)
    }

    fn not(&mut self, id: VariableId) -> Result<VariableId> {
        let ty = self.type_of(id);
        if !ty.is_integer() {
            return Err(self.error(
                ErrorCode::LogicUnsupported,
                format!("NOT needs an integer operand, found {}", ty),
            ));
        }
        if let Some(value) = self.constant_of(id) {
            return Ok(self.typed_constant(truncate(!value, ty), ty));
        }
        let result = self.temporary(ty, "complement");
        let (value, name, bytes) = (self.value_of(id), self.real_name(result), self.width(result));
        self.target.cpu.complement(&mut self.out, &value, &name, bytes);
        Ok(result)
    }

    fn increment(&mut self, id: VariableId) -> Result<()> {
        let variable = self.symbols.variable(id);
        if !variable.var_type.is_integer() || variable.readonly || variable.var_type == VariableType::Bit {
            return Err(self.error(
                ErrorCode::IncrementUnsupported,
                format!("INC is not possible on {}", variable.name),
            ));
        }
        self.symbols.variable_mut(id).assigned = true;
        let (name, bytes) = (self.real_name(id), self.width(id));
        self.target.cpu.increment(&mut self.out, &name, bytes);
        Ok(())
    }

    fn decrement(&mut self, id: VariableId) -> Result<()> {
        let variable = self.symbols.variable(id);
        if !variable.var_type.is_integer() || variable.readonly || variable.var_type == VariableType::Bit {
            return Err(self.error(
                ErrorCode::IncrementUnsupported,
                format!("DEC is not possible on {}", variable.name),
            ));
        }
        self.symbols.variable_mut(id).assigned = true;
        let (name, bytes) = (self.real_name(id), self.width(id));
        self.target.cpu.decrement(&mut self.out, &name, bytes);
        Ok(())
    }

    fn random(&mut self, max: Option<VariableId>) -> Result<VariableId> {
        self.call_runtime("random", "RANDOM")?;
        let value = self.result_from("MATHR", 2, VariableType::Word, "random");
        match max {
            None => Ok(value),
            Some(max) => {
                self.expect_numeric(max)?;
                if self.constant_of(max) == Some(0) {
                    return Err(self.error(ErrorCode::DivisionByZero, "RND(0) has no range"));
                }
                self.load(value, "MATHA", 2);
                let bound = self.operand(max, VariableType::Word);
                self.target.cpu.copy(&mut self.out, &bound, "MATHB", 2);
                self.call_runtime("div", "DIV16")?;
                Ok(self.result_from("MATHM", 2, VariableType::Word, "random"))
            }
        }
    }

    fn randomize(&mut self, seed: Option<VariableId>) -> Result<()> {
        if let Some(seed) = seed {
            self.expect_numeric(seed)?;
            let value = self.operand(seed, VariableType::Word);
            self.deploy("vars")?;
            self.deploy("random")?;
            self.target.cpu.copy(&mut self.out, &value, "RANDSEED", 2);
            return Ok(());
        }
        self.call_runtime("random", "RANDOMIZE")
    }
}
