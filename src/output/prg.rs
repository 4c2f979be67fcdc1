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

//! PRG files.
//!
//! A PRG file is the program preceded by its 2-byte load address
//! (little-endian).

use std::io;

/// Prefix `code` with `load_address`.
pub fn prg_image(code: &[u8], load_address: u16) -> Vec<u8> {
    let mut image = Vec::with_capacity(code.len() + 2);
    image.extend_from_slice(&load_address.to_le_bytes());
    image.extend_from_slice(code);
    image
}

/// Split a PRG image into its load address and code.
pub fn read_prg(data: &[u8]) -> io::Result<(u16, &[u8])> {
    if data.len() < 2 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "PRG file too short"));
    }
    Ok((u16::from_le_bytes([data[0], data[1]]), &data[2..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::c64::BASIC_START;

    #[test]
    fn test_prg_has_load_address() {
        let image = prg_image(&[0xA9, 0x00, 0x60], BASIC_START);
        assert_eq!(image, vec![0x01, 0x08, 0xA9, 0x00, 0x60]);
        let (address, code) = read_prg(&image).unwrap();
        assert_eq!(address, 0x0801);
        assert_eq!(code, &[0xA9, 0x00, 0x60]);
    }

    #[test]
    fn test_short_prg_is_rejected() {
        assert!(read_prg(&[0x01]).is_err());
    }
}
