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

//! STORAGE blocks and DLOAD.
//!
//! A storage block lists files copied into the disk image next to the
//! program. A file may be bound to a buffer variable: the variable only
//! reserves room in memory and DLOAD fills it from the disk.

use super::variables::VariableEmitter;
use crate::backend::MachineOp;
use crate::config::OutputFormat;
use crate::environment::Environment;
use crate::error::{ErrorCode, Result, WarningCode};
use crate::symbols::{ConstantValue, FileStorage, Storage, Variable, VariableId, VariableScope};
use crate::types::VariableType;

/// Extension trait for the storage statements.
pub trait StorageEmitter {
    /// `STORAGE "name"`.
    fn begin_storage(&mut self, name: &str) -> Result<()>;

    /// `FILE "source" [AS "target"] [TO variable]`.
    fn storage_file(&mut self, source: &str, target: Option<&str>, bind: Option<&str>) -> Result<()>;

    /// `ENDSTORAGE`.
    fn end_storage(&mut self) -> Result<()>;

    /// `DLOAD "name" [TO address] [SIZE s] [OFFSET o]`.
    fn dload(
        &mut self,
        name: VariableId,
        address: Option<VariableId>,
        size: Option<VariableId>,
        offset: Option<VariableId>,
    ) -> Result<()>;
}

impl Environment {
    fn has_disk_format(&self) -> bool {
        self.target
            .machine
            .output_formats()
            .iter()
            .any(|f| matches!(f, OutputFormat::D64 | OutputFormat::Dsk | OutputFormat::Atr))
    }

    /// The variable bound to `name` by a storage block.
    fn stored_variable(&self, name: &str) -> Option<VariableId> {
        self.symbols
            .storages
            .iter()
            .find_map(|s| s.find(name))
            .and_then(|f| f.variable)
    }
}

impl StorageEmitter for Environment {
    fn begin_storage(&mut self, name: &str) -> Result<()> {
        if !self.has_disk_format() {
            return Err(self.error(
                ErrorCode::StorageUnsupported,
                format!("{} has no disk image format", self.target.machine.name()),
            ));
        }
        if self
            .symbols
            .storages
            .iter()
            .any(|s| s.name.eq_ignore_ascii_case(name))
        {
            return Err(self.error(
                ErrorCode::StorageNameDuplicate,
                format!("storage {} is already declared", name),
            ));
        }
        self.symbols.storages.push(Storage::new(name));
        self.storage = Some(self.symbols.storages.len() - 1);
        Ok(())
    }

    fn storage_file(&mut self, source: &str, target: Option<&str>, bind: Option<&str>) -> Result<()> {
        let Some(index) = self.storage else {
            return Err(self.error(
                ErrorCode::StorageUnsupported,
                "FILE outside of a STORAGE block",
            ));
        };
        let path = self.asset_path(source)?;
        let size = std::fs::metadata(&path)
            .map(|m| m.len() as usize)
            .map_err(|_| {
                self.error(
                    ErrorCode::StorageFileNotFound,
                    format!("file {} not found", path.display()),
                )
            })?;
        let target = target
            .map(str::to_string)
            .or_else(|| {
                path.file_name()
                    .map(|n| n.to_string_lossy().to_ascii_uppercase())
            })
            .unwrap_or_else(|| source.to_ascii_uppercase());
        if self.symbols.storages[index].find(&target).is_some() {
            return Err(self.error(
                ErrorCode::StorageNameDuplicate,
                format!("{} is already stored", target),
            ));
        }
        let variable = match bind {
            Some(name) => {
                let real_name = format!("_{}", name.to_ascii_uppercase());
                let mut variable = Variable::new(
                    name,
                    real_name,
                    VariableType::Buffer,
                    self.precision(),
                    VariableScope::Global,
                );
                variable.on_storage = true;
                variable.uncompressed_size = size;
                Some(self.symbols.add_variable(variable))
            }
            None => None,
        };
        log::debug!("storage file {} as {} ({} bytes)", path.display(), target, size);
        self.symbols.storages[index].files.push(FileStorage {
            source: path,
            target,
            size,
            variable,
        });
        Ok(())
    }

    fn end_storage(&mut self) -> Result<()> {
        if self.storage.take().is_none() {
            return Err(self.error(
                ErrorCode::StorageUnsupported,
                "ENDSTORAGE without STORAGE",
            ));
        }
        Ok(())
    }

    fn dload(
        &mut self,
        name: VariableId,
        address: Option<VariableId>,
        size: Option<VariableId>,
        offset: Option<VariableId>,
    ) -> Result<()> {
        if self.target.machine.routine(MachineOp::Dload).is_none() {
            return Err(self.error(
                ErrorCode::DloadUnsupported,
                format!("DLOAD is not available on {}", self.target.machine.name()),
            ));
        }
        self.expect_string(name)?;
        if self.type_of(name) == VariableType::DString {
            return Err(self.error(
                ErrorCode::TypeMismatch,
                "DLOAD needs a static file name",
            ));
        }
        if size.is_some() || offset.is_some() {
            self.warn(
                WarningCode::DloadSizeIgnored,
                "DLOAD reads whole files, SIZE and OFFSET are ignored",
            );
        }
        let destination = match address {
            Some(address) => {
                self.expect_numeric(address)?;
                address
            }
            None => {
                let file = self.constant_value_of(name).and_then(|v| match v {
                    ConstantValue::String(s) => Some(s),
                    _ => None,
                });
                let bound = file.as_deref().and_then(|f| self.stored_variable(f));
                let Some(variable) = bound else {
                    return Err(self.error(
                        ErrorCode::StorageFileNotFound,
                        format!("{} is not bound to a variable, DLOAD needs TO", file.unwrap_or_default()),
                    ));
                };
                self.touch(variable);
                let pointer = self.temporary(VariableType::Address, "dload address");
                let dest = self.real_name(pointer);
                let label = self.real_name(variable);
                self.target.cpu.address_of(&mut self.out, &label, &dest);
                pointer
            }
        };
        let pointer = self.temporary(VariableType::Address, "dload name");
        let dest = self.real_name(pointer);
        self.string_pointer(name, &dest);
        self.machine_call(MachineOp::Dload, &[pointer, destination]).map(|_| ())
    }
}
