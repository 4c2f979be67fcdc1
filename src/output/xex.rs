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

//! Atari XEX executables.
//!
//! An XEX file is a `$FFFF` marker followed by segments of
//! `(start, end inclusive, bytes)`. A last segment writes the run
//! address into RUNAD so DOS jumps to the program once it is loaded.

/// Location of the run address vector.
pub const RUNAD: u16 = 0x02E0;

fn segment(image: &mut Vec<u8>, start: u16, data: &[u8]) {
    let end = start.wrapping_add(data.len().saturating_sub(1) as u16);
    image.extend_from_slice(&start.to_le_bytes());
    image.extend_from_slice(&end.to_le_bytes());
    image.extend_from_slice(data);
}

/// Wrap `code`, loaded at `load_address`, into an executable starting there.
pub fn xex_image(code: &[u8], load_address: u16) -> Vec<u8> {
    let mut image = vec![0xFF, 0xFF];
    segment(&mut image, load_address, code);
    segment(&mut image, RUNAD, &load_address.to_le_bytes());
    image
}
