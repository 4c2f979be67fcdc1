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

//! Assembler dialects.
//!
//! The emitter stores lines without layout; a `Syntax` decides how labels,
//! directives and data are spelled for one assembler.

/// Description of one assembler dialect.
#[derive(Debug)]
pub struct Syntax {
    pub name: &'static str,
    /// Appended to label definitions.
    pub label_suffix: &'static str,
    pub byte: &'static str,
    pub word: &'static str,
    pub reserve: &'static str,
    /// Multi-byte values are stored most significant byte first.
    pub big_endian: bool,
    /// Keyword of `name EQU value`; `None` spells equates `name = value`.
    pub equ: Option<&'static str>,
    /// Emit `.segment` lines.
    pub segments: bool,
    /// Mnemonics that are directives, not instructions.
    pub directives: &'static [&'static str],
}

/// cc65's `ca65`.
pub static CA65: Syntax = Syntax {
    name: "ca65",
    label_suffix: ":",
    byte: ".byte",
    word: ".word",
    reserve: ".res",
    big_endian: false,
    equ: None,
    segments: true,
    directives: &[
        ".BYTE", ".WORD", ".DWORD", ".RES", ".SEGMENT", ".ORG", ".INCLUDE", ".ASCIIZ",
        ".EXPORT", ".IMPORT", ".ALIGN", ".PROC", ".ENDPROC", ".SETCPU",
    ],
};

/// Ciaran Anscomb's `asm6809`.
pub static ASM6809: Syntax = Syntax {
    name: "asm6809",
    label_suffix: "",
    byte: "FCB",
    word: "FDB",
    reserve: "RZB",
    big_endian: true,
    equ: Some("EQU"),
    segments: false,
    directives: &["FCB", "FDB", "RZB", "RMB", "FCC", "ORG", "EQU", "SETDP", "INCLUDE", "END"],
};

impl Syntax {
    pub fn label(&self, name: &str) -> String {
        format!("{}{}", name, self.label_suffix)
    }

    pub fn equate(&self, name: &str, value: &str) -> String {
        match self.equ {
            Some(keyword) => format!("{} {} {}", name, keyword, value),
            None => format!("{} = {}", name, value),
        }
    }

    /// Check whether a directive line is an equate (rendered at column 0).
    pub fn is_equate(&self, text: &str) -> bool {
        let mut parts = text.split_whitespace();
        let _name = parts.next();
        match (parts.next(), self.equ) {
            (Some("="), _) => true,
            (Some(word), Some(keyword)) => word.eq_ignore_ascii_case(keyword),
            _ => false,
        }
    }

    pub fn is_directive(&self, mnemonic: &str) -> bool {
        let upper = mnemonic.to_ascii_uppercase();
        self.directives.iter().any(|d| *d == upper)
    }

    pub fn segment(&self, name: &str) -> Option<String> {
        self.segments.then(|| format!(".segment \"{}\"", name))
    }

    /// `byte` directives for `data`, sixteen values per line.
    pub fn bytes(&self, data: &[u8]) -> Vec<String> {
        if data.is_empty() {
            return Vec::new();
        }
        data.chunks(16)
            .map(|chunk| {
                let values: Vec<String> = chunk.iter().map(|b| format!("${:02X}", b)).collect();
                format!("{} {}", self.byte, values.join(","))
            })
            .collect()
    }

    pub fn word_value(&self, value: &str) -> String {
        format!("{} {}", self.word, value)
    }

    pub fn dword_value(&self, value: u32) -> String {
        if self.big_endian {
            format!("{} ${:04X},${:04X}", self.word, value >> 16, value & 0xFFFF)
        } else {
            format!(".dword ${:08X}", value)
        }
    }

    pub fn reserve_bytes(&self, size: usize) -> String {
        format!("{} {}", self.reserve, size)
    }

    /// Bytes of an integer of `bytes` width in target order.
    pub fn integer_bytes(&self, value: i64, bytes: usize) -> Vec<u8> {
        let le: Vec<u8> = (0..bytes).map(|i| (value >> (8 * i)) as u8).collect();
        if self.big_endian {
            le.into_iter().rev().collect()
        } else {
            le
        }
    }
}
