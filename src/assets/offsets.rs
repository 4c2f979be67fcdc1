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

//! Offset tables for frame and sequence addressing.
//!
//! A multi-frame image is indexed at runtime by looking up the byte offset
//! of frame `n` in a word table instead of multiplying. One table exists
//! per distinct stride; images sharing a stride share the table, which
//! grows to the largest count requested.

use crate::emitter::{AsmLine, Syntax};
use crate::error::ErrorCode;
use crate::symbols::VariableId;

/// Largest value a table entry can hold.
pub const MAX_OFFSET: usize = 0xFFFF;

/// A table of `count` offsets `0, size, 2 * size, ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offsetting {
    pub size: usize,
    pub count: usize,
    /// Resources indexed through the table; `true` for sequences.
    pub variables: Vec<(VariableId, bool)>,
}

impl Offsetting {
    /// Symbol of the table.
    pub fn label(&self) -> String {
        table_label(self.size)
    }

    pub fn values(&self) -> Vec<usize> {
        (0..self.count).map(|i| i * self.size).collect()
    }
}

pub fn table_label(size: usize) -> String {
    format!("OFFSETS{}", size)
}

/// Symbol of the size to table lookup emitted after the tables.
pub const DISPATCH_LABEL: &str = "OFFSETTABLES";

#[derive(Debug, Default)]
pub struct Offsettings {
    tables: Vec<Offsetting>,
}

impl Offsettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table of `count` strides of `size` bytes used by `variable`.
    ///
    /// Every offset and the stride itself must fit a word.
    pub fn register(
        &mut self,
        size: usize,
        count: usize,
        variable: VariableId,
        sequence: bool,
    ) -> Result<(), ErrorCode> {
        if size == 0 || count == 0 {
            return Ok(());
        }
        let last = (count - 1).checked_mul(size);
        if size > MAX_OFFSET || last.map_or(true, |l| l > MAX_OFFSET) {
            return Err(ErrorCode::ImageTooLarge);
        }
        match self.tables.iter_mut().find(|t| t.size == size) {
            Some(table) => {
                table.count = table.count.max(count);
                if !table.variables.contains(&(variable, sequence)) {
                    table.variables.push((variable, sequence));
                }
            }
            None => self.tables.push(Offsetting {
                size,
                count,
                variables: vec![(variable, sequence)],
            }),
        }
        Ok(())
    }

    pub fn get(&self, size: usize) -> Option<&Offsetting> {
        self.tables.iter().find(|t| t.size == size)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Offsetting> {
        self.tables.iter()
    }

    /// Tables in registration order followed by the dispatch table,
    /// pairs of `(size, table)` terminated by a zero size.
    pub fn lines(&self, syntax: &Syntax) -> Vec<AsmLine> {
        let mut lines = Vec::new();
        if self.tables.is_empty() {
            return lines;
        }
        for table in &self.tables {
            lines.push(AsmLine::label(table.label()));
            for chunk in table.values().chunks(8) {
                let values: Vec<String> = chunk.iter().map(|v| format!("${:04X}", v)).collect();
                lines.push(AsmLine::directive(syntax.word_value(&values.join(","))));
            }
        }
        lines.push(AsmLine::label(DISPATCH_LABEL));
        for table in &self.tables {
            lines.push(AsmLine::directive(
                syntax.word_value(&format!("{},{}", table.size, table.label())),
            ));
        }
        lines.push(AsmLine::directive(syntax.word_value("0")));
        lines
    }
}
