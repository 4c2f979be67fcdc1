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

//! Code generation verbs.
//!
//! The parser drives code generation through the extension traits of this
//! module, all implemented on [`Environment`]. Every verb resolves its
//! operands to variables, promotes types, emits the casts it needs, asks
//! the target for the primitives and returns the variable holding the
//! result. Operands are evaluated strictly left to right.
//!
//! Groups:
//! - [`VariableEmitter`]: constants, definitions, moves and casts
//! - [`ArithmeticEmitter`], [`UnaryEmitter`], [`ComparisonEmitter`]
//! - [`StringEmitter`], [`ArrayEmitter`]
//! - [`FlowEmitter`], [`ProcedureEmitter`], [`ThreadEmitter`], [`TimerEmitter`]
//! - [`DataEmitter`], [`TextEmitter`], [`GraphicsEmitter`], [`AudioEmitter`],
//!   [`StorageEmitter`]

mod arrays;
mod audio;
mod binary_ops;
mod comparisons;
mod control_flow;
mod conversions;
mod data_blocks;
mod graphics;
mod procedures;
mod storage;
mod strings;
mod text;
mod threads;
mod timers;
mod unary_ops;
mod variables;

pub use arrays::ArrayEmitter;
pub use audio::AudioEmitter;
pub use binary_ops::ArithmeticEmitter;
pub use comparisons::ComparisonEmitter;
pub use control_flow::FlowEmitter;
pub use conversions::ConversionEmitter;
pub use data_blocks::DataEmitter;
pub use graphics::{GraphicsEmitter, ImageLoad, SpriteMode};
pub use procedures::ProcedureEmitter;
pub use storage::StorageEmitter;
pub use strings::StringEmitter;
pub use text::{PrintItem, TextEmitter};
pub use threads::ThreadEmitter;
pub use timers::TimerEmitter;
pub use unary_ops::UnaryEmitter;
pub use variables::VariableEmitter;

pub(crate) use variables::implicit_type;

use crate::backend::Value;
use crate::environment::Environment;
use crate::error::{ErrorCode, Result};
use crate::symbols::VariableId;
use crate::types::VariableType;
use std::path::{Component, Path, PathBuf};

/// Label of the bytes holding every `BIT` variable.
pub const BIT_BYTES_LABEL: &str = "_BITS";

impl Environment {
    pub(crate) fn type_of(&self, id: VariableId) -> VariableType {
        self.symbols.variable(id).var_type
    }

    /// Bytes of the storage behind `id`, at least one.
    pub(crate) fn width(&self, id: VariableId) -> usize {
        self.symbols.variable(id).size().max(1)
    }

    pub(crate) fn is_signed(&self, id: VariableId) -> bool {
        self.type_of(id).is_signed()
    }

    pub(crate) fn real_name(&self, id: VariableId) -> String {
        self.symbols.variable(id).real_name.clone()
    }

    pub(crate) fn constant_of(&self, id: VariableId) -> Option<i64> {
        self.symbols.variable(id).constant_value()
    }

    /// A temporary of `ty` for the current statement.
    pub(crate) fn temporary(&mut self, ty: VariableType, purpose: &str) -> VariableId {
        let precision = self.precision();
        let id = self.symbols.temporary(ty, precision, purpose);
        self.symbols.variable_mut(id).used = true;
        id
    }

    /// Record a read of `id`.
    pub(crate) fn touch(&mut self, id: VariableId) {
        self.symbols.variable_mut(id).used = true;
    }

    /// Locate an error raised by a table that does not know the statement.
    pub(crate) fn located<T>(&self, result: Result<T>) -> Result<T> {
        result.map_err(|e| e.or_at(self.span))
    }

    /// The value of `id` widened to `bytes`.
    ///
    /// Constants and variables of the right width are used as they are;
    /// anything narrower is extended into a temporary first.
    pub(crate) fn operand(&mut self, id: VariableId, ty: VariableType) -> Value {
        let value = self.value_of(id);
        let bytes = ty.size(self.precision()).max(1);
        if value.immediate().is_some() || self.width(id) == bytes {
            return value;
        }
        let signed = self.is_signed(id);
        let from = self.width(id);
        let temp = self.temporary(ty, "widened operand");
        let name = self.real_name(temp);
        self.target
            .cpu
            .copy_extend(&mut self.out, &value, from, signed, &name, bytes);
        Value::Memory(name)
    }

    /// Copy `id` into the runtime register `dest` of `bytes`, extending
    /// by the signedness of its type.
    pub(crate) fn load(&mut self, id: VariableId, dest: &str, bytes: usize) {
        self.touch(id);
        let value = self.value_of(id);
        let from = self.width(id);
        let signed = self.is_signed(id);
        self.target
            .cpu
            .copy_extend(&mut self.out, &value, from, signed, dest, bytes);
    }

    /// A new temporary of `ty` holding the `src_bytes` wide value left in
    /// the runtime register `src`.
    pub(crate) fn result_from(
        &mut self,
        src: &str,
        src_bytes: usize,
        ty: VariableType,
        purpose: &str,
    ) -> VariableId {
        let result = self.temporary(ty, purpose);
        let bytes = self.width(result);
        let name = self.real_name(result);
        self.target.cpu.copy_extend(
            &mut self.out,
            &Value::mem(src),
            src_bytes,
            ty.is_signed(),
            &name,
            bytes,
        );
        result
    }

    pub(crate) fn expect_numeric(&self, id: VariableId) -> Result<()> {
        let ty = self.type_of(id);
        if ty.is_numeric() {
            Ok(())
        } else {
            Err(self.error(
                ErrorCode::NumericExpected,
                format!("a number is required, found {}", ty),
            ))
        }
    }

    pub(crate) fn expect_string(&self, id: VariableId) -> Result<()> {
        let ty = self.type_of(id);
        if ty.is_string() {
            Ok(())
        } else {
            Err(self.error(
                ErrorCode::StringExpected,
                format!("a string is required, found {}", ty),
            ))
        }
    }

    /// A file named by the program, resolved against the source directory.
    ///
    /// In sandbox mode absolute paths and `..` are refused.
    pub(crate) fn asset_path(&self, path: &str) -> Result<PathBuf> {
        let given = Path::new(path);
        let escapes = given.is_absolute() || given.components().any(|c| c == Component::ParentDir);
        if self.options.sandbox && escapes {
            return Err(self.error(
                ErrorCode::SandboxViolation,
                format!("{} is outside the source directory", path),
            ));
        }
        Ok(if given.is_absolute() {
            given.to_path_buf()
        } else {
            self.source_dir.join(given)
        })
    }

    /// Constant integer value of `id`, failing when it is only known at runtime.
    pub(crate) fn require_constant(&self, id: VariableId, what: &str) -> Result<i64> {
        self.constant_of(id).ok_or_else(|| {
            self.error(
                ErrorCode::ValueOutOfRange,
                format!("{} must be a constant", what),
            )
        })
    }
}
