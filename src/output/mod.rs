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

//! Output of the compiler.
//!
//! - [`composer`]: the final assembly source
//! - [`cfg`]: ld65 linker configurations
//! - [`labels`]: debugger labels from the assembler's symbol file
//! - [`info`]: the compilation report
//! - [`prg`], [`xex`], [`rom`], [`d64`]: native packaging
//!
//! DSK and ATR images are written by the external imagers.

pub mod cfg;
pub mod composer;
pub mod d64;
pub mod info;
pub mod labels;
pub mod prg;
pub mod rom;
pub mod xex;

pub use composer::{compose, ComposedProgram};

use crate::backend::{BuildPaths, Machine, ToolCommand};
use crate::config::OutputFormat;
use crate::error::{CompileError, ErrorCode, Result};
use crate::toolchain::Toolchain;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the program inside disk images.
pub const PROGRAM_NAME: &str = "PROGRAM";

/// A file copied into the disk image next to the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    pub data: Vec<u8>,
}

/// Everything the assembler run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifacts {
    /// The packaged binary.
    pub binary: Vec<u8>,
    /// `.lb2` debugger labels.
    pub labels: String,
    pub listing: Option<String>,
}

fn write_error(path: &Path, error: std::io::Error) -> CompileError {
    CompileError::unlocated(
        ErrorCode::CannotWriteOutput,
        format!("cannot write {}: {}", path.display(), error),
    )
}

fn write(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    fs::write(path, contents).map_err(|e| write_error(path, e))
}

fn read_output(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        CompileError::unlocated(
            ErrorCode::CannotReadAssemblerOutput,
            format!("cannot read {}: {}", path.display(), e),
        )
    })
}

fn run_all(toolchain: &mut dyn Toolchain, commands: &[ToolCommand]) -> Result<()> {
    for command in commands {
        toolchain.run(command)?;
    }
    Ok(())
}

/// Assemble `program` in `dir` and package the result.
pub fn build(
    machine: &dyn Machine,
    program: &ComposedProgram,
    storage: &[StoredFile],
    dir: &Path,
    with_listing: bool,
    toolchain: &mut dyn Toolchain,
) -> Result<BuildArtifacts> {
    let paths = BuildPaths {
        source: dir.join("main.asm"),
        linker_config: dir.join("main.cfg"),
        object: dir.join("main.o"),
        binary: dir.join("main.bin"),
        symbols: dir.join("main.sym"),
        listing: with_listing.then(|| dir.join("main.lst")),
    };
    write(&paths.source, &program.assembly)?;
    if let Some(cfg) = &program.linker_config {
        write(&paths.linker_config, cfg)?;
    }
    run_all(toolchain, &machine.build_commands(&paths))?;

    let raw = read_output(&paths.binary)?;
    let symbols = read_output(&paths.symbols)?;
    let labels = labels::convert(&String::from_utf8_lossy(&symbols));
    let listing = match &paths.listing {
        Some(path) => Some(String::from_utf8_lossy(&read_output(path)?).into_owned()),
        None => None,
    };
    log::debug!("assembled {} byte(s)", raw.len());

    let binary = package(program.format, &raw, program.load_address, storage, dir, toolchain)?;
    Ok(BuildArtifacts {
        binary,
        labels,
        listing,
    })
}

/// A CoCo `LOADM` binary: one data block and the exec address.
fn loadm_image(code: &[u8], load_address: u16) -> Vec<u8> {
    let mut image = vec![0x00];
    image.extend_from_slice(&(code.len() as u16).to_be_bytes());
    image.extend_from_slice(&load_address.to_be_bytes());
    image.extend_from_slice(code);
    image.extend_from_slice(&[0xFF, 0x00, 0x00]);
    image.extend_from_slice(&load_address.to_be_bytes());
    image
}

fn dsk_image(
    raw: &[u8],
    load_address: u16,
    storage: &[StoredFile],
    dir: &Path,
    toolchain: &mut dyn Toolchain,
) -> Result<Vec<u8>> {
    let image = dir.join("image.dsk");
    let image_name = image.to_string_lossy().into_owned();
    let mut commands = vec![ToolCommand::new("decb", &["dskini", &image_name])];
    let mut files: Vec<(String, Vec<u8>)> = vec![(
        format!("{}.BIN", PROGRAM_NAME),
        loadm_image(raw, load_address),
    )];
    files.extend(storage.iter().map(|f| (f.name.clone(), f.data.clone())));
    for (name, data) in files {
        let path = dir.join(&name);
        write(&path, data)?;
        let path_name = path.to_string_lossy().into_owned();
        let target = format!("{},{}", image_name, name);
        commands.push(ToolCommand::new("decb", &["copy", "-2", "-b", &path_name, &target]));
    }
    run_all(toolchain, &commands)?;
    read_output(&image)
}

fn atr_image(
    raw: &[u8],
    load_address: u16,
    storage: &[StoredFile],
    dir: &Path,
    toolchain: &mut dyn Toolchain,
) -> Result<Vec<u8>> {
    let files: PathBuf = dir.join("atr");
    fs::create_dir_all(&files).map_err(|e| write_error(&files, e))?;
    write(&files.join("AUTORUN.SYS"), xex::xex_image(raw, load_address))?;
    for file in storage {
        write(&files.join(&file.name), &file.data)?;
    }
    let image = dir.join("image.atr");
    let image_name = image.to_string_lossy().into_owned();
    let files_name = files.to_string_lossy().into_owned();
    let command = ToolCommand::new("dir2atr", &["-b", "Dos25", "720", &image_name, &files_name]);
    run_all(toolchain, &[command])?;
    read_output(&image)
}

/// Wrap the raw assembler output into `format`.
pub fn package(
    format: OutputFormat,
    raw: &[u8],
    load_address: u16,
    storage: &[StoredFile],
    dir: &Path,
    toolchain: &mut dyn Toolchain,
) -> Result<Vec<u8>> {
    log::debug!("packaging {} byte(s) as {}", raw.len(), format);
    match format {
        OutputFormat::Bin => Ok(raw.to_vec()),
        OutputFormat::Prg => Ok(prg::prg_image(raw, load_address)),
        OutputFormat::Xex => Ok(xex::xex_image(raw, load_address)),
        OutputFormat::Rom => rom::rom_image(raw, load_address)
            .map_err(|e| CompileError::unlocated(ErrorCode::CannotWriteOutput, e.to_string())),
        OutputFormat::D64 => {
            let mut disk = d64::D64Builder::new(PROGRAM_NAME);
            let disk_error =
                |e: std::io::Error| CompileError::unlocated(ErrorCode::CannotWriteOutput, e.to_string());
            disk.add_file(PROGRAM_NAME, &prg::prg_image(raw, load_address))
                .map_err(disk_error)?;
            for file in storage {
                // DLOAD names the address, the header is skipped.
                disk.add_file(&file.name, &prg::prg_image(&file.data, 0))
                    .map_err(disk_error)?;
            }
            Ok(disk.into_data())
        }
        OutputFormat::Dsk => dsk_image(raw, load_address, storage, dir, toolchain),
        OutputFormat::Atr => atr_image(raw, load_address, storage, dir, toolchain),
        OutputFormat::K7 | OutputFormat::Tap | OutputFormat::Cas => Err(CompileError::unlocated(
            ErrorCode::OutputFormatMismatch,
            format!("{} files are not supported", format),
        )),
    }
}
