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

//! D64 disk images.
//!
//! A D64 image is a 1541 floppy: 35 tracks of 17 to 21 sectors of 256
//! bytes, 683 sectors in all. Track 18 holds the BAM (sector 0) and the
//! directory (sector 1 onwards). Files are chains of sectors carrying
//! 254 bytes each.

use std::io;

/// Total size of a D64 image in bytes.
pub const D64_SIZE: usize = 174_848;

pub const NUM_TRACKS: u8 = 35;

pub const DIRECTORY_TRACK: u8 = 18;

/// Sectors per track, indexed by track (track 0 does not exist).
const SECTORS_PER_TRACK: [u8; 36] = [
    0, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, // 1-17
    19, 19, 19, 19, 19, 19, 19, // 18-24
    18, 18, 18, 18, 18, 18, // 25-30
    17, 17, 17, 17, 17, // 31-35
];

/// Track 18, sector 0.
const BAM_OFFSET: usize = 17 * 21 * 256;

/// Track 18, sector 1.
const DIRECTORY_OFFSET: usize = BAM_OFFSET + 256;

const ENTRIES_PER_SECTOR: usize = 8;

/// Closed PRG file.
const FILE_TYPE_PRG: u8 = 0x82;

pub fn sectors_in_track(track: u8) -> u8 {
    if track == 0 || track > NUM_TRACKS {
        0
    } else {
        SECTORS_PER_TRACK[track as usize]
    }
}

/// Byte offset of a track/sector in the image.
pub fn sector_offset(track: u8, sector: u8) -> Option<usize> {
    if sector >= sectors_in_track(track) {
        return None;
    }
    let before: usize = (1..track).map(|t| sectors_in_track(t) as usize * 256).sum();
    Some(before + sector as usize * 256)
}

fn disk_error(message: &str) -> io::Error {
    io::Error::other(message.to_string())
}

/// Name bytes padded with shifted spaces.
fn padded_name(name: &str) -> [u8; 16] {
    let mut bytes = [0xA0u8; 16];
    for (slot, c) in bytes.iter_mut().zip(name.to_ascii_uppercase().bytes()) {
        *slot = c;
    }
    bytes
}

/// Builds a D64 image file by file.
pub struct D64Builder {
    data: Vec<u8>,
    next: (u8, u8),
    files: usize,
}

impl D64Builder {
    /// An empty, formatted disk called `name`.
    pub fn new(name: &str) -> Self {
        let mut builder = Self {
            data: vec![0; D64_SIZE],
            next: (1, 0),
            files: 0,
        };
        builder.format(name);
        builder
    }

    fn bam_entry(track: u8) -> usize {
        BAM_OFFSET + 4 + (track as usize - 1) * 4
    }

    fn format(&mut self, name: &str) {
        let bam = BAM_OFFSET;
        self.data[bam] = DIRECTORY_TRACK;
        self.data[bam + 1] = 1;
        self.data[bam + 2] = 0x41;

        for track in 1..=NUM_TRACKS {
            let entry = Self::bam_entry(track);
            let sectors = sectors_in_track(track);
            self.data[entry] = sectors;
            for sector in 0..sectors {
                self.data[entry + 1 + (sector / 8) as usize] |= 1 << (sector % 8);
            }
        }
        self.mark_used(DIRECTORY_TRACK, 0);
        self.mark_used(DIRECTORY_TRACK, 1);

        self.data[bam + 0x90..bam + 0xA0].copy_from_slice(&padded_name(name));
        self.data[bam + 0xA0..bam + 0xAB].copy_from_slice(&[
            0xA0, 0xA0, b'U', b'G', 0xA0, b'2', b'A', 0xA0, 0xA0, 0xA0, 0xA0,
        ]);

        self.data[DIRECTORY_OFFSET] = 0x00;
        self.data[DIRECTORY_OFFSET + 1] = 0xFF;
    }

    fn is_free(&self, track: u8, sector: u8) -> bool {
        let entry = Self::bam_entry(track);
        self.data[entry + 1 + (sector / 8) as usize] & (1 << (sector % 8)) != 0
    }

    fn mark_used(&mut self, track: u8, sector: u8) {
        let entry = Self::bam_entry(track);
        if self.is_free(track, sector) {
            self.data[entry] -= 1;
            self.data[entry + 1 + (sector / 8) as usize] &= !(1 << (sector % 8));
        }
    }

    /// Next free sector outside the directory track.
    fn allocate(&mut self) -> Option<(u8, u8)> {
        let (mut track, mut sector) = self.next;
        for _ in 0..D64_SIZE / 256 {
            if track == DIRECTORY_TRACK {
                track += 1;
                sector = 0;
            }
            if track > NUM_TRACKS {
                track = 1;
                sector = 0;
            }
            if self.is_free(track, sector) {
                self.mark_used(track, sector);
                self.next = (track, sector + 1);
                if sector + 1 >= sectors_in_track(track) {
                    self.next = (track + 1, 0);
                }
                return Some((track, sector));
            }
            sector += 1;
            if sector >= sectors_in_track(track) {
                track += 1;
                sector = 0;
            }
        }
        None
    }

    /// Store `data` as a PRG file called `name`.
    pub fn add_file(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        if self.files >= ENTRIES_PER_SECTOR {
            return Err(disk_error("directory full"));
        }
        let chunks: Vec<&[u8]> = if data.is_empty() {
            vec![&[]]
        } else {
            data.chunks(254).collect()
        };
        let mut sectors = Vec::with_capacity(chunks.len());
        for _ in &chunks {
            sectors.push(self.allocate().ok_or_else(|| disk_error("disk full"))?);
        }

        for (index, (chunk, &(track, sector))) in chunks.iter().zip(&sectors).enumerate() {
            let offset = sector_offset(track, sector).ok_or_else(|| disk_error("bad sector"))?;
            match sectors.get(index + 1) {
                Some(&(next_track, next_sector)) => {
                    self.data[offset] = next_track;
                    self.data[offset + 1] = next_sector;
                }
                None => {
                    self.data[offset] = 0;
                    self.data[offset + 1] = (chunk.len() + 1) as u8;
                }
            }
            self.data[offset + 2..offset + 2 + chunk.len()].copy_from_slice(chunk);
        }

        let entry = DIRECTORY_OFFSET + self.files * 32;
        let (first_track, first_sector) = sectors[0];
        self.data[entry + 2] = FILE_TYPE_PRG;
        self.data[entry + 3] = first_track;
        self.data[entry + 4] = first_sector;
        self.data[entry + 5..entry + 21].copy_from_slice(&padded_name(name));
        self.data[entry + 0x1E..entry + 0x20].copy_from_slice(&(sectors.len() as u16).to_le_bytes());
        self.files += 1;
        log::debug!("d64: {} in {} sector(s) from {}/{}", name, sectors.len(), first_track, first_sector);
        Ok(())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}
