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

//! Allocation of 8x8 character tiles.
//!
//! Tiles are deduplicated: allocating bytes identical to an already
//! allocated tile returns that tile. Each tile gets a descriptor of its
//! shape, used to find the most similar tile when no slot is left.

use crate::error::ErrorCode;

pub const TILE_COUNT: usize = 256;

/// Shape summary of a tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileDescriptor {
    /// Set pixels.
    pub white_area: u8,
    /// Color changes along each row.
    pub horizontal_edges: [u8; 8],
    /// Color changes along each column.
    pub vertical_edges: [u8; 8],
}

impl TileDescriptor {
    pub fn of(data: &[u8; 8]) -> Self {
        let mut descriptor = TileDescriptor {
            white_area: data.iter().map(|b| b.count_ones() as u8).sum(),
            ..Default::default()
        };
        for (y, row) in data.iter().enumerate() {
            descriptor.horizontal_edges[y] = ((row ^ (row >> 1)) & 0x7F).count_ones() as u8;
        }
        for x in 0..8 {
            let column: Vec<bool> = data.iter().map(|row| row & (0x80 >> x) != 0).collect();
            descriptor.vertical_edges[x] = column.windows(2).filter(|w| w[0] != w[1]).count() as u8;
        }
        descriptor
    }

    /// Higher is more similar; identical shapes score 255.
    pub fn affinity(&self, other: &TileDescriptor) -> u8 {
        let mut distance = self.white_area.abs_diff(other.white_area) as usize;
        for i in 0..8 {
            distance += self.horizontal_edges[i].abs_diff(other.horizontal_edges[i]) as usize;
            distance += self.vertical_edges[i].abs_diff(other.vertical_edges[i]) as usize;
        }
        255usize.saturating_sub(distance) as u8
    }
}

#[derive(Debug, Clone)]
pub struct TileDescriptors {
    /// First tile the program may redefine.
    pub first: usize,
    pub first_free: usize,
    pub last_free: usize,
    pub count: usize,
    descriptors: Vec<Option<TileDescriptor>>,
    data: Vec<Option<[u8; 8]>>,
}

impl TileDescriptors {
    /// Tiles `first..=last` are available.
    pub fn new(first: usize, last: usize) -> Self {
        let last = last.min(TILE_COUNT - 1);
        Self {
            first,
            first_free: first,
            last_free: last,
            count: 0,
            descriptors: vec![None; TILE_COUNT],
            data: vec![None; TILE_COUNT],
        }
    }

    /// Index of a tile holding `data`, allocating one if needed.
    pub fn allocate(&mut self, data: &[u8; 8]) -> Result<u8, ErrorCode> {
        if let Some(index) = self.find(data) {
            return Ok(index as u8);
        }
        if self.first_free > self.last_free {
            return Err(ErrorCode::TilesExhausted);
        }
        let index = self.first_free;
        self.data[index] = Some(*data);
        self.descriptors[index] = Some(TileDescriptor::of(data));
        self.first_free += 1;
        self.count += 1;
        Ok(index as u8)
    }

    pub fn find(&self, data: &[u8; 8]) -> Option<usize> {
        self.data.iter().position(|d| d.as_ref() == Some(data))
    }

    /// The allocated tile most similar to `data`.
    pub fn closest(&self, data: &[u8; 8]) -> Option<usize> {
        let wanted = TileDescriptor::of(data);
        self.descriptors
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.map(|d| (i, d.affinity(&wanted))))
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(i, _)| i)
    }

    pub fn data(&self, index: usize) -> Option<&[u8; 8]> {
        self.data.get(index).and_then(|d| d.as_ref())
    }

    pub fn descriptor(&self, index: usize) -> Option<&TileDescriptor> {
        self.descriptors.get(index).and_then(|d| d.as_ref())
    }

    /// Allocated tiles in index order.
    pub fn allocated(&self) -> impl Iterator<Item = (usize, &[u8; 8])> {
        self.data
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.as_ref().map(|d| (i, d)))
    }
}
