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

//! DATA segments.
//!
//! Every DATA statement appends typed values to the segment of the label
//! or line number it follows. Segments keep the textual order of the
//! program, which is the order READ walks them in.

use super::labels::LabelTarget;
use crate::error::{CompileError, ErrorCode, Span};
use crate::types::{FloatPrecision, VariableType};

/// Type tags preceding every value in the DATA area.
pub mod tag {
    pub const BYTE: u8 = 1;
    pub const SBYTE: u8 = 2;
    pub const WORD: u8 = 3;
    pub const SWORD: u8 = 4;
    pub const DWORD: u8 = 5;
    pub const SDWORD: u8 = 6;
    pub const FLOAT: u8 = 7;
    pub const STRING: u8 = 8;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DatumValue {
    Integer(i64),
    Float(f64),
    String(String),
}

/// One value of a DATA statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Datum {
    pub value: DatumValue,
    pub var_type: VariableType,
}

impl Datum {
    pub fn integer(value: i64) -> Self {
        Self {
            value: DatumValue::Integer(value),
            var_type: VariableType::for_constant(value),
        }
    }

    pub fn float(value: f64) -> Self {
        Self {
            value: DatumValue::Float(value),
            var_type: VariableType::Float,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self {
            value: DatumValue::String(value.into()),
            var_type: VariableType::String,
        }
    }

    pub fn tag(&self) -> u8 {
        match self.var_type {
            VariableType::SByte => tag::SBYTE,
            VariableType::Word => tag::WORD,
            VariableType::SWord => tag::SWORD,
            VariableType::DWord => tag::DWORD,
            VariableType::SDWord => tag::SDWORD,
            VariableType::Float => tag::FLOAT,
            VariableType::String | VariableType::DString => tag::STRING,
            _ => tag::BYTE,
        }
    }

    /// Bytes taken in the DATA area, tag included.
    pub fn size(&self, precision: FloatPrecision) -> usize {
        1 + match &self.value {
            DatumValue::String(s) => 1 + s.len(),
            DatumValue::Float(_) => precision.bytes(),
            DatumValue::Integer(_) => self.var_type.size(precision),
        }
    }
}

/// The values following one label or line number.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSegment {
    pub real_name: String,
    pub label: Option<String>,
    pub line: Option<u32>,
    pub data: Vec<Datum>,
}

/// A `RESTORE <target>` whose segment is resolved at the end of compilation.
#[derive(Debug, Clone)]
struct PendingRestore {
    symbol: String,
    target: LabelTarget,
    span: Span,
}

#[derive(Debug, Default)]
pub struct DataSegments {
    segments: Vec<DataSegment>,
    restores: Vec<PendingRestore>,
    /// `RESTORE` with a computed line number was used.
    pub dynamic_restore: bool,
}

impl DataSegments {
    /// Append `datum` to the segment owned by `label` / `line`.
    pub fn add(&mut self, label: Option<&str>, line: Option<u32>, datum: Datum) {
        let same_owner = self
            .segments
            .last()
            .map(|s| s.label.as_deref() == label && s.line == line)
            .unwrap_or(false);
        if !same_owner {
            let real_name = format!("_data{}", self.segments.len());
            self.segments.push(DataSegment {
                real_name,
                label: label.map(str::to_string),
                line,
                data: Vec::new(),
            });
        }
        if let Some(segment) = self.segments.last_mut() {
            segment.data.push(datum);
        }
    }

    pub fn segments(&self) -> &[DataSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// First segment, in textual order, whose line is at least `line`.
    pub fn find_line(&self, line: u32) -> Option<&DataSegment> {
        self.segments
            .iter()
            .find(|s| s.line.map(|l| l >= line).unwrap_or(false))
    }

    /// First segment following `label`.
    pub fn find_label(&self, label: &str) -> Option<&DataSegment> {
        self.segments
            .iter()
            .find(|s| s.label.as_deref() == Some(label))
    }

    /// Register `RESTORE target` and return the symbol standing for its segment.
    pub fn request_restore(&mut self, target: LabelTarget, span: Span) -> String {
        let symbol = format!("_restore{}", self.restores.len());
        self.restores.push(PendingRestore {
            symbol: symbol.clone(),
            target,
            span,
        });
        symbol
    }

    /// Bind every pending restore symbol to its segment.
    pub fn resolve_restores(&self) -> Result<Vec<(String, String)>, CompileError> {
        self.restores
            .iter()
            .map(|restore| {
                let segment = match &restore.target {
                    LabelTarget::Line(line) => self.find_line(*line),
                    LabelTarget::Name(name) => self.find_label(name),
                };
                segment
                    .map(|s| (restore.symbol.clone(), s.real_name.clone()))
                    .ok_or_else(|| {
                        CompileError::new(
                            ErrorCode::UndefinedLabel,
                            format!("no DATA follows {} for RESTORE", restore.target),
                            restore.span,
                        )
                    })
            })
            .collect()
    }

    /// `(line, segment)` pairs for the runtime RESTORE index.
    pub fn line_index(&self) -> Vec<(u32, &str)> {
        self.segments
            .iter()
            .filter_map(|s| s.line.map(|l| (l, s.real_name.as_str())))
            .collect()
    }

    /// Total bytes of the DATA area.
    pub fn size(&self, precision: FloatPrecision) -> usize {
        self.segments
            .iter()
            .flat_map(|s| s.data.iter())
            .map(|d| d.size(precision))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_follow_owner() {
        let mut data = DataSegments::default();
        data.add(None, Some(10), Datum::integer(1));
        data.add(None, Some(10), Datum::integer(2));
        data.add(None, Some(20), Datum::string("x"));
        assert_eq!(data.segments().len(), 2);
        assert_eq!(data.segments()[0].data.len(), 2);
        assert_eq!(data.segments()[1].real_name, "_data1");
    }

    #[test]
    fn test_restore_line_picks_first_segment_at_or_after() {
        let mut data = DataSegments::default();
        data.add(None, Some(100), Datum::integer(1));
        data.add(None, Some(200), Datum::integer(2));
        assert_eq!(data.find_line(150).unwrap().line, Some(200));
        assert_eq!(data.find_line(100).unwrap().line, Some(100));
        assert!(data.find_line(201).is_none());
    }

    #[test]
    fn test_unresolved_restore() {
        let mut data = DataSegments::default();
        data.add(Some("level"), None, Datum::integer(7));
        let ok = data.request_restore(LabelTarget::Name("level".into()), Span::new(0, 1));
        data.request_restore(LabelTarget::Name("missing".into()), Span::new(5, 6));
        let err = data.resolve_restores().unwrap_err();
        assert_eq!(err.code, ErrorCode::UndefinedLabel);
        assert_eq!(ok, "_restore0");
    }

    #[test]
    fn test_datum_sizes() {
        assert_eq!(Datum::integer(1).size(FloatPrecision::Fast), 2);
        assert_eq!(Datum::integer(1000).size(FloatPrecision::Fast), 3);
        assert_eq!(Datum::string("abc").size(FloatPrecision::Fast), 5);
        assert_eq!(Datum::float(1.5).size(FloatPrecision::Single), 5);
    }
}
