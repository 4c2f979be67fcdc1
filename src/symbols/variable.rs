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

//! Variables and temporaries.

use super::procedure::ProcedureId;
use super::strings::StringId;
use crate::assets::palette::PaletteEntry;
use crate::assets::tiled::{TilemapId, TilesetId};
use crate::memory::{AreaId, BankId};
use crate::types::{FloatPrecision, TypeInfo, VariableType};
use std::cell::Cell;
use std::rc::Rc;

/// Index of a variable in the symbol tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(pub usize);

/// Allocation state of a temporary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporaryState {
    Free,
    InUse,
    /// Kept alive past the end of the statement (loop bounds, handlers).
    Locked,
}

/// Which table a variable lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableScope {
    Global,
    Local(ProcedureId),
    Temporary(Option<ProcedureId>),
    Resident,
}

/// Shape and initializer of an array.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayInfo {
    pub dimensions: Vec<usize>,
    pub element: VariableType,
    pub precision: FloatPrecision,
    /// Initial contents, already laid out in target byte order.
    pub init: Option<Vec<u8>>,
}

impl ArrayInfo {
    pub fn count(&self) -> usize {
        self.dimensions.iter().product()
    }

    pub fn element_size(&self) -> usize {
        self.element.size(self.precision).max(1)
    }

    pub fn size(&self) -> usize {
        self.count() * self.element_size()
    }
}

/// Geometry and palette of a converted image resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageInfo {
    pub width: usize,
    pub height: usize,
    pub mode: u8,
    pub colors: usize,
    pub palette: Vec<PaletteEntry>,
    pub frame_width: usize,
    pub frame_height: usize,
    pub frame_count: usize,
    pub frames_per_row: usize,
    pub rows: usize,
    /// Bytes of one converted frame.
    pub frame_size: usize,
    pub tileset: Option<TilesetId>,
    pub tilemap: Option<TilemapId>,
    pub first_gid: u32,
}

/// Location of a `BIT` variable inside the shared bit bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitSlot {
    pub byte: usize,
    pub bit: u8,
}

/// Placement of a resource in expansion memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionSlot {
    pub bank: usize,
    pub offset: usize,
    pub window: usize,
}

/// A variable, temporary or resource.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    /// Symbol used in the generated assembly.
    pub real_name: String,
    pub var_type: VariableType,
    pub precision: FloatPrecision,
    pub scope: VariableScope,
    /// Shared with every `TemporaryGuard` handed out for this variable.
    pub temporary: Option<Rc<Cell<TemporaryState>>>,
    /// What a temporary was allocated for; shown in the generated listing.
    pub purpose: Option<String>,
    pub used: bool,
    pub imported: bool,
    pub assigned: bool,
    pub readonly: bool,
    pub on_storage: bool,
    /// Integer value, when the variable was initialized by a constant.
    pub value: Option<i64>,
    pub value_string: Option<StringId>,
    pub value_float: Option<f64>,
    pub value_buffer: Option<Vec<u8>>,
    pub uncompressed_size: usize,
    /// Emit `value` as the initial contents instead of reserving space.
    pub static_init: bool,
    pub absolute_address: Option<u16>,
    pub bank: Option<BankId>,
    pub area: Option<AreaId>,
    pub expansion: Option<ExpansionSlot>,
    pub array: Option<ArrayInfo>,
    /// Saved and restored per thread instance inside parallel procedures.
    pub threaded: bool,
    pub image: Option<ImageInfo>,
    pub bit_slot: Option<BitSlot>,
}

impl Variable {
    pub fn new(
        name: impl Into<String>,
        real_name: impl Into<String>,
        var_type: VariableType,
        precision: FloatPrecision,
        scope: VariableScope,
    ) -> Self {
        Self {
            name: name.into(),
            real_name: real_name.into(),
            var_type,
            precision,
            scope,
            temporary: None,
            purpose: None,
            used: false,
            imported: false,
            assigned: false,
            readonly: false,
            on_storage: false,
            value: None,
            value_string: None,
            value_float: None,
            value_buffer: None,
            uncompressed_size: 0,
            static_init: false,
            absolute_address: None,
            bank: None,
            area: None,
            expansion: None,
            array: None,
            threaded: false,
            image: None,
            bit_slot: None,
        }
    }

    pub fn type_info(&self) -> TypeInfo {
        TypeInfo::new(self.var_type, self.precision)
    }

    pub fn bits(&self) -> u32 {
        self.var_type.bits(self.precision)
    }

    /// Bytes reserved for the variable itself (not its resource data).
    pub fn size(&self) -> usize {
        match &self.array {
            Some(array) => array.size(),
            None => self.var_type.size(self.precision),
        }
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary.is_some()
    }

    pub fn temporary_state(&self) -> Option<TemporaryState> {
        self.temporary.as_ref().map(|state| state.get())
    }

    /// Constant integer value usable for folding.
    pub fn constant_value(&self) -> Option<i64> {
        if self.is_temporary() || self.readonly {
            self.value
        } else {
            None
        }
    }
}

/// Borrow of a temporary for the duration of one primitive.
///
/// Dropping the guard returns the temporary to the pool; [`TemporaryGuard::lock`]
/// keeps it reserved instead.
#[derive(Debug)]
pub struct TemporaryGuard {
    id: VariableId,
    state: Rc<Cell<TemporaryState>>,
}

impl TemporaryGuard {
    pub(crate) fn new(id: VariableId, state: Rc<Cell<TemporaryState>>) -> Self {
        Self { id, state }
    }

    pub fn id(&self) -> VariableId {
        self.id
    }

    /// Keep the temporary reserved past the guard's lifetime.
    pub fn lock(self) -> VariableId {
        self.state.set(TemporaryState::Locked);
        self.id
    }
}

impl Drop for TemporaryGuard {
    fn drop(&mut self) {
        if self.state.get() == TemporaryState::InUse {
            self.state.set(TemporaryState::Free);
        }
    }
}

/// Turn a BASIC name into an assembler-safe symbol fragment.
pub fn sanitize(name: &str) -> String {
    name.replace('$', "__S")
}
