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

//! The memory model of the target.
//!
//! - memory areas where memory-mapped and placed variables live
//! - typed banks (code, variables, temporaries, data, strings)
//! - expansion banks holding resources that are paged into resident windows

use crate::error::{CompileError, ErrorCode};
use crate::symbols::variable::ExpansionSlot;
use serde::Deserialize;

/// Index of a memory area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AreaId(pub usize);

/// Index of a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BankId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryAreaKind {
    /// Always visible to the CPU.
    Direct,
    /// Visible only when a hardware gate is open.
    Gated,
    /// Plain RAM reachable through the runtime.
    Ram,
}

/// A range of addresses variables can be placed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryArea {
    pub id: AreaId,
    pub start: u32,
    /// Next free address.
    pub current: u32,
    /// First address past the area.
    pub end: u32,
    pub kind: MemoryAreaKind,
}

impl MemoryArea {
    pub fn size(&self) -> u32 {
        self.end - self.start
    }

    pub fn remains(&self) -> u32 {
        self.end - self.current
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BankType {
    Code,
    Variables,
    Temporary,
    Data,
    Strings,
}

impl BankType {
    pub const ALL: [BankType; 5] = [
        BankType::Code,
        BankType::Variables,
        BankType::Temporary,
        BankType::Data,
        BankType::Strings,
    ];

    fn index(&self) -> usize {
        match self {
            BankType::Code => 0,
            BankType::Variables => 1,
            BankType::Temporary => 2,
            BankType::Data => 3,
            BankType::Strings => 4,
        }
    }

    /// Name of the segment holding banks of this type.
    pub fn segment(&self) -> &'static str {
        match self {
            BankType::Code => "CODE",
            BankType::Variables => "VARIABLES",
            BankType::Temporary => "TEMPORARY",
            BankType::Data => "DATA",
            BankType::Strings => "STRINGS",
        }
    }
}

/// A typed region of the program image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bank {
    pub id: BankId,
    pub name: String,
    /// Fixed load address; `None` lets the linker place it.
    pub address: Option<u16>,
    pub bank_type: BankType,
    pub filename: Option<String>,
    pub space: usize,
    pub remains: usize,
    /// `(symbol, size)` of every allocation, in order.
    pub allocations: Vec<(String, usize)>,
}

impl Bank {
    /// Reserve `size` bytes for `symbol`, returning the offset in the bank.
    pub fn allocate(&mut self, symbol: &str, size: usize) -> Result<usize, CompileError> {
        if size > self.remains {
            return Err(CompileError::unlocated(
                ErrorCode::BankFull,
                format!(
                    "bank {} cannot hold {} ({} bytes, {} left)",
                    self.name, symbol, size, self.remains
                ),
            ));
        }
        let offset = self.space - self.remains;
        self.remains -= size;
        self.allocations.push((symbol.to_string(), size));
        Ok(offset)
    }

    pub fn allocated(&self) -> usize {
        self.allocations.iter().map(|(_, size)| size).sum()
    }
}

/// A resident window resources are paged into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionWindow {
    pub size: usize,
    /// Largest block assigned to this window; sizes the paging stub.
    pub max_block: usize,
}

/// A block stored in an expansion bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionBlock {
    pub name: String,
    pub offset: usize,
    pub size: usize,
    pub window: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionBank {
    pub index: usize,
    pub size: usize,
    pub remains: usize,
    pub blocks: Vec<ExpansionBlock>,
    pub data: Vec<u8>,
}

/// Banked memory beyond the CPU address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionBanks {
    pub windows: Vec<ExpansionWindow>,
    pub banks: Vec<ExpansionBank>,
}

impl ExpansionBanks {
    pub fn new(window_sizes: &[usize], bank_count: usize, bank_size: usize) -> Self {
        Self {
            windows: window_sizes
                .iter()
                .map(|&size| ExpansionWindow { size, max_block: 0 })
                .collect(),
            banks: (0..bank_count)
                .map(|index| ExpansionBank {
                    index,
                    size: bank_size,
                    remains: bank_size,
                    blocks: Vec::new(),
                    data: Vec::new(),
                })
                .collect(),
        }
    }

    /// Store `data` in the first bank with room, to be paged into `window`.
    pub fn allocate(
        &mut self,
        name: &str,
        data: &[u8],
        window: usize,
    ) -> Result<ExpansionSlot, CompileError> {
        let window_size = match self.windows.get(window) {
            Some(w) => w.size,
            None => {
                return Err(CompileError::unlocated(
                    ErrorCode::BankNotFound,
                    format!("expansion window {} does not exist", window),
                ))
            }
        };
        if data.len() > window_size {
            return Err(CompileError::unlocated(
                ErrorCode::ExpansionWindowExceeded,
                format!(
                    "{} ({} bytes) exceeds expansion window {} ({} bytes)",
                    name,
                    data.len(),
                    window,
                    window_size
                ),
            ));
        }
        let bank = self
            .banks
            .iter_mut()
            .find(|b| b.remains >= data.len())
            .ok_or_else(|| {
                CompileError::unlocated(
                    ErrorCode::BankFull,
                    format!("no expansion bank has room for {} ({} bytes)", name, data.len()),
                )
            })?;
        let offset = bank.size - bank.remains;
        bank.remains -= data.len();
        bank.data.extend_from_slice(data);
        bank.blocks.push(ExpansionBlock {
            name: name.to_string(),
            offset,
            size: data.len(),
            window,
        });
        let slot = ExpansionSlot {
            bank: bank.index,
            offset,
            window,
        };
        let w = &mut self.windows[window];
        w.max_block = w.max_block.max(data.len());
        Ok(slot)
    }
}

#[derive(Debug, Default)]
pub struct MemoryModel {
    areas: Vec<MemoryArea>,
    banks: Vec<Bank>,
    by_type: [Vec<BankId>; 5],
    pub expansion: Option<ExpansionBanks>,
}

impl MemoryModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `[start, end]` (inclusive) as a memory area.
    pub fn add_area(&mut self, start: u16, end: u16, kind: MemoryAreaKind) -> AreaId {
        let id = AreaId(self.areas.len());
        self.areas.push(MemoryArea {
            id,
            start: start as u32,
            current: start as u32,
            end: end as u32 + 1,
            kind,
        });
        id
    }

    pub fn areas(&self) -> &[MemoryArea] {
        &self.areas
    }

    pub fn area(&self, id: AreaId) -> &MemoryArea {
        &self.areas[id.0]
    }

    /// Place `size` bytes in an area.
    ///
    /// A fixed `address` is kept as it is and bound to the first area
    /// containing it, if any; the area cursor does not move. Otherwise the
    /// lowest free address of the first DIRECT area with enough room is used.
    pub fn assign_to_area(
        &mut self,
        address: Option<u16>,
        size: usize,
    ) -> Result<(Option<AreaId>, u16), CompileError> {
        let size = size as u32;
        if let Some(address) = address {
            let address32 = address as u32;
            let area = self
                .areas
                .iter()
                .find(|a| a.start <= address32 && address32 < a.end)
                .map(|a| a.id);
            return Ok((area, address));
        }
        match self
            .areas
            .iter_mut()
            .find(|a| a.kind == MemoryAreaKind::Direct && a.remains() >= size)
        {
            Some(area) => {
                let placed = area.current as u16;
                area.current += size;
                Ok((Some(area.id), placed))
            }
            None => Err(CompileError::unlocated(
                ErrorCode::MemoryAreaExhausted,
                format!("no memory area has {} free bytes", size),
            )),
        }
    }

    /// Create a bank. Banks of one type are kept in creation order.
    pub fn add_bank(
        &mut self,
        name: &str,
        bank_type: BankType,
        address: Option<u16>,
        space: usize,
    ) -> BankId {
        let id = BankId(self.banks.len());
        self.banks.push(Bank {
            id,
            name: name.to_string(),
            address,
            bank_type,
            filename: None,
            space,
            remains: space,
            allocations: Vec::new(),
        });
        self.by_type[bank_type.index()].push(id);
        id
    }

    pub fn bank(&self, id: BankId) -> &Bank {
        &self.banks[id.0]
    }

    pub fn bank_mut(&mut self, id: BankId) -> &mut Bank {
        &mut self.banks[id.0]
    }

    pub fn banks(&self) -> &[Bank] {
        &self.banks
    }

    pub fn banks_of(&self, bank_type: BankType) -> &[BankId] {
        &self.by_type[bank_type.index()]
    }

    pub fn bank_by_name(&self, name: &str) -> Option<BankId> {
        self.banks.iter().find(|b| b.name == name).map(|b| b.id)
    }

    /// First bank of `bank_type`, failing with E125 if none exists.
    pub fn default_bank(&self, bank_type: BankType) -> Result<BankId, CompileError> {
        self.banks_of(bank_type).first().copied().ok_or_else(|| {
            CompileError::unlocated(
                ErrorCode::BankNotFound,
                format!("no {} bank defined", bank_type.segment()),
            )
        })
    }
}
