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

//! ld65 linker configurations.

use crate::memory::BankType;
use std::fmt::Write;

/// Memory layout handed to the linker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkerLayout {
    pub load_address: u16,
    pub size: usize,
    /// Separate RAM for the writable segments, when the program runs from ROM.
    pub ram: Option<(u16, usize)>,
}

/// Segments in image order.
const SEGMENTS: [BankType; 5] = [
    BankType::Code,
    BankType::Data,
    BankType::Strings,
    BankType::Variables,
    BankType::Temporary,
];

fn writable(bank_type: BankType) -> bool {
    matches!(bank_type, BankType::Variables | BankType::Temporary)
}

/// Render the linker configuration for `layout`.
pub fn linker_config(layout: &LinkerLayout) -> String {
    let mut cfg = String::new();
    let _ = writeln!(cfg, "MEMORY {{");
    let _ = writeln!(
        cfg,
        "    MAIN: file = %O, start = ${:04X}, size = ${:04X};",
        layout.load_address, layout.size
    );
    if let Some((start, size)) = layout.ram {
        let _ = writeln!(cfg, "    RAM: file = \"\", start = ${:04X}, size = ${:04X};", start, size);
    }
    let _ = writeln!(cfg, "}}");
    let _ = writeln!(cfg, "SEGMENTS {{");
    for bank_type in SEGMENTS {
        let (memory, kind) = match layout.ram {
            Some(_) if writable(bank_type) => ("RAM", "bss"),
            _ => ("MAIN", "rw"),
        };
        let optional = if bank_type == BankType::Code { "" } else { ", optional = yes" };
        let _ = writeln!(
            cfg,
            "    {}: load = {}, type = {}{};",
            bank_type.segment(),
            memory,
            kind,
            optional
        );
    }
    let _ = writeln!(cfg, "}}");
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_config() {
        let cfg = linker_config(&LinkerLayout {
            load_address: 0x0801,
            size: 0x77FF,
            ram: None,
        });
        insta::assert_snapshot!(cfg, @r###"
        MEMORY {
            MAIN: file = %O, start = $0801, size = $77FF;
        }
        SEGMENTS {
            CODE: load = MAIN, type = rw;
            DATA: load = MAIN, type = rw, optional = yes;
            STRINGS: load = MAIN, type = rw, optional = yes;
            VARIABLES: load = MAIN, type = rw, optional = yes;
            TEMPORARY: load = MAIN, type = rw, optional = yes;
        }
        "###);
    }

    #[test]
    fn test_cartridge_config_moves_variables_to_ram() {
        let cfg = linker_config(&LinkerLayout {
            load_address: 0xA000,
            size: 0x1FF9,
            ram: Some((0x2000, 0x5800)),
        });
        assert!(cfg.contains("MAIN: file = %O, start = $A000, size = $1FF9;"));
        assert!(cfg.contains("RAM: file = \"\", start = $2000, size = $5800;"));
        assert!(cfg.contains("VARIABLES: load = RAM, type = bss, optional = yes;"));
        assert!(cfg.contains("DATA: load = MAIN, type = rw, optional = yes;"));
    }
}
