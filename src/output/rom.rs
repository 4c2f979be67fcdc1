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

//! Cartridge images.
//!
//! The Atari left cartridge occupies `$A000-$BFFF`. Its last six bytes
//! hold the run address, a zero "cartridge present" byte, the option
//! byte and the init address. The init address points at an `RTS`
//! placed just before the trailer.

use std::io;

/// Size of a standard 8K cartridge.
pub const CARTRIDGE_SIZE: usize = 0x2000;

/// Boot the cartridge and jump to its run address.
const OPTION_RUN: u8 = 0x04;

const TRAILER_SIZE: usize = 7;

/// Bytes available to the program.
pub const CARTRIDGE_CODE_SIZE: usize = CARTRIDGE_SIZE - TRAILER_SIZE;

/// Pad `code` into an 8K cartridge with the Atari trailer.
pub fn rom_image(code: &[u8], load_address: u16) -> io::Result<Vec<u8>> {
    if code.len() > CARTRIDGE_CODE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "program of {} bytes does not fit an {} byte cartridge",
                code.len(),
                CARTRIDGE_SIZE
            ),
        ));
    }
    let mut image = vec![0xFF; CARTRIDGE_SIZE];
    image[..code.len()].copy_from_slice(code);

    let rts = CARTRIDGE_CODE_SIZE;
    let init = load_address.wrapping_add(rts as u16);
    image[rts] = 0x60;
    image[rts + 1..rts + 3].copy_from_slice(&load_address.to_le_bytes());
    image[rts + 3] = 0x00;
    image[rts + 4] = OPTION_RUN;
    image[rts + 5..rts + 7].copy_from_slice(&init.to_le_bytes());
    Ok(image)
}
