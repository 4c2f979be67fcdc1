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

//! Interned static strings.

use std::collections::HashMap;

/// Index of a static string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(pub usize);

impl StringId {
    pub fn label(&self) -> String {
        format!("_STR{}", self.0)
    }
}

/// A string literal stored once in the STRINGS bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticString {
    pub id: StringId,
    pub value: String,
}

impl StaticString {
    pub fn size(&self) -> usize {
        self.value.len()
    }
}

#[derive(Debug, Default)]
pub struct StaticStrings {
    strings: Vec<StaticString>,
    index: HashMap<String, StringId>,
}

impl StaticStrings {
    /// Return the id of `value`, storing it on first use.
    pub fn intern(&mut self, value: &str) -> StringId {
        if let Some(id) = self.index.get(value) {
            return *id;
        }
        let id = StringId(self.strings.len());
        self.strings.push(StaticString {
            id,
            value: value.to_string(),
        });
        self.index.insert(value.to_string(), id);
        id
    }

    pub fn get(&self, id: StringId) -> &StaticString {
        &self.strings[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &StaticString> {
        self.strings.iter()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_idempotent() {
        let mut strings = StaticStrings::default();
        let a = strings.intern("HELLO");
        let b = strings.intern("WORLD");
        assert_eq!(strings.intern("HELLO"), a);
        assert_ne!(a, b);
        assert_eq!(strings.get(b).size(), 5);
        assert_eq!(a.label(), "_STR0");
    }
}
