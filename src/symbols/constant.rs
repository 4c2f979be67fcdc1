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

//! Named constants (`CONST` and resource aliases).

/// Value of a constant.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Integer(i64),
    String(String),
    Float(f64),
}

impl ConstantValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ConstantValue::Integer(_) => "integer",
            ConstantValue::String(_) => "string",
            ConstantValue::Float(_) => "float",
        }
    }
}

impl std::fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstantValue::Integer(v) => write!(f, "{}", v),
            ConstantValue::String(s) => write!(f, "\"{}\"", s),
            ConstantValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// A named, immutable value.
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub name: String,
    pub real_name: String,
    pub value: ConstantValue,
    /// Defined outside the program (machine constants).
    pub imported: bool,
}
