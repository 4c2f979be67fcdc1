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

//! Debugger labels.
//!
//! The assemblers write their symbols in their own formats: ld65 emits
//! VICE label lines (`al 000801 .name`), asm6809 emits equates
//! (`name EQU $2800`). Both are converted to the `.lb2` format, one
//! `al C:XXXX .NAME` line per label sorted by address.

use crate::backend::cpu::parse_number;

/// One symbol with its address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Label {
    pub address: u16,
    pub name: String,
}

fn parse_line(line: &str) -> Option<Label> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let (name, value) = match words.as_slice() {
        ["al", address, name] => (name.trim_start_matches('.'), format!("${}", address)),
        [name, keyword, value] if keyword.eq_ignore_ascii_case("equ") || *keyword == "=" => {
            (name.trim_end_matches(':'), value.to_string())
        }
        _ => return None,
    };
    // Linker internals and cheap local labels.
    if name.starts_with("__") || name.starts_with('@') || name.is_empty() {
        return None;
    }
    let address = parse_number(&value)?;
    Some(Label {
        address: (address & 0xFFFF) as u16,
        name: name.to_string(),
    })
}

/// Labels of an assembler symbol file, sorted and without duplicates.
pub fn parse_labels(text: &str) -> Vec<Label> {
    let mut labels: Vec<Label> = text.lines().filter_map(parse_line).collect();
    labels.sort();
    labels.dedup();
    labels
}

/// Render `labels` as an `.lb2` file.
pub fn render_lb2(labels: &[Label]) -> String {
    labels
        .iter()
        .map(|label| format!("al C:{:04X} .{}\n", label.address, label.name.to_ascii_uppercase()))
        .collect()
}

/// Convert an assembler symbol file to `.lb2`.
pub fn convert(text: &str) -> String {
    render_lb2(&parse_labels(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ld65_labels() {
        let text = "al 00080E .STARTUP\nal 000801 .__LOADADDR__\nal 000820 ._A\nal 000810 .@loop\n";
        insta::assert_snapshot!(convert(text), @r###"
        al C:080E .STARTUP
        al C:0820 ._A
        "###);
    }

    #[test]
    fn test_asm6809_symbols() {
        let text = "CODESTART EQU $2800\n_A equ $2A10\nMATHA EQU $2A00\ngarbage line here now\n";
        let labels = parse_labels(text);
        assert_eq!(labels.len(), 3);
        assert_eq!(labels[0].name, "CODESTART");
        assert_eq!(labels[1].address, 0x2A00);
        assert_eq!(
            render_lb2(&labels),
            "al C:2800 .CODESTART\nal C:2A00 .MATHA\nal C:2A10 ._A\n"
        );
    }
}
