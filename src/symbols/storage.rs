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

//! Storage descriptors: files packaged into the output disk image.

use super::variable::VariableId;
use std::path::PathBuf;

/// One file copied into the image.
#[derive(Debug, Clone, PartialEq)]
pub struct FileStorage {
    pub source: PathBuf,
    /// Name inside the image.
    pub target: String,
    pub size: usize,
    /// Variable loaded from this file by `DLOAD`.
    pub variable: Option<VariableId>,
}

/// A `STORAGE ... ENDSTORAGE` block.
#[derive(Debug, Clone, PartialEq)]
pub struct Storage {
    pub name: String,
    pub files: Vec<FileStorage>,
}

impl Storage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: Vec::new(),
        }
    }

    pub fn find(&self, target: &str) -> Option<&FileStorage> {
        self.files
            .iter()
            .find(|f| f.target.eq_ignore_ascii_case(target))
    }
}
