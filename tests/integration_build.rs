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

//! Compile and build through a recording toolchain.

use pretty_assertions::assert_eq;
use std::fs;
use ugbc::backend::Target;
use ugbc::output::{build, d64, BuildArtifacts};
use ugbc::toolchain::RecordingToolchain;
use ugbc::{compile, compile_file, CompilerOptions, ErrorCode, OutputFormat, TargetKind};

const PROGRAM: &str = "a = 10\nPRINT a\n";

fn options(format: OutputFormat) -> CompilerOptions {
    CompilerOptions {
        output_format: Some(format),
        ..CompilerOptions::default()
    }
}

fn build_source(
    source: &str,
    kind: TargetKind,
    format: OutputFormat,
    toolchain: &mut RecordingToolchain,
) -> ugbc::Result<BuildArtifacts> {
    let compilation = compile(source, options(format), kind)?;
    let dir = tempfile::tempdir().unwrap();
    let target = Target::new(kind);
    build(
        target.machine.as_ref(),
        &compilation.program,
        &compilation.storage,
        dir.path(),
        false,
        toolchain,
    )
}

#[test]
fn test_c64_prg() {
    let mut toolchain = RecordingToolchain::new();
    let artifacts = build_source(PROGRAM, TargetKind::C64, OutputFormat::Prg, &mut toolchain).unwrap();
    assert_eq!(toolchain.programs(), vec!["ca65", "ld65"]);
    assert_eq!(&artifacts.binary[..2], &[0x01, 0x08]);
    assert!(artifacts.listing.is_none());
}

#[test]
fn test_c64_d64_carries_storage() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("level.bin"), [1, 2, 3, 4]).unwrap();
    let source_path = dir.path().join("game.bas");
    fs::write(
        &source_path,
        "STORAGE \"disk\"\nFILE \"level.bin\" AS \"LEVEL\"\nENDSTORAGE\nPRINT \"OK\"\n",
    )
    .unwrap();

    let compilation = compile_file(&source_path, options(OutputFormat::D64), TargetKind::C64).unwrap();
    assert_eq!(compilation.storage.len(), 1);
    assert_eq!(compilation.storage[0].name, "LEVEL");
    assert_eq!(compilation.storage[0].data, vec![1, 2, 3, 4]);

    let work = tempfile::tempdir().unwrap();
    let mut toolchain = RecordingToolchain::new();
    let target = Target::new(TargetKind::C64);
    let artifacts = build(
        target.machine.as_ref(),
        &compilation.program,
        &compilation.storage,
        work.path(),
        false,
        &mut toolchain,
    )
    .unwrap();
    assert_eq!(artifacts.binary.len(), d64::D64_SIZE);
    assert_eq!(toolchain.programs(), vec!["ca65", "ld65"]);
}

#[test]
fn test_coco_dsk() {
    let mut toolchain = RecordingToolchain::new();
    build_source(PROGRAM, TargetKind::Coco, OutputFormat::Dsk, &mut toolchain).unwrap();
    assert_eq!(toolchain.programs(), vec!["asm6809", "decb", "decb"]);
    assert!(toolchain.commands[2].args.last().unwrap().ends_with(",PROGRAM.BIN"));
}

#[test]
fn test_coco_bin_is_raw() {
    let mut toolchain = RecordingToolchain::new();
    toolchain.binary = vec![0x39, 0x12];
    let artifacts = build_source(PROGRAM, TargetKind::Coco, OutputFormat::Bin, &mut toolchain).unwrap();
    assert_eq!(artifacts.binary, vec![0x39, 0x12]);
    assert_eq!(toolchain.programs(), vec!["asm6809"]);
}

#[test]
fn test_atari_xex() {
    let mut toolchain = RecordingToolchain::new();
    let artifacts = build_source(PROGRAM, TargetKind::Atari, OutputFormat::Xex, &mut toolchain).unwrap();
    assert_eq!(&artifacts.binary[..2], &[0xFF, 0xFF]);
    assert_eq!(&artifacts.binary[2..4], &[0x00, 0x20]);
}

#[test]
fn test_atari_atr() {
    let mut toolchain = RecordingToolchain::new();
    build_source(PROGRAM, TargetKind::Atari, OutputFormat::Atr, &mut toolchain).unwrap();
    assert_eq!(toolchain.programs(), vec!["ca65", "ld65", "dir2atr"]);
}

#[test]
fn test_atari_rom_is_a_full_cartridge() {
    let mut toolchain = RecordingToolchain::new();
    let artifacts = build_source(PROGRAM, TargetKind::Atari, OutputFormat::Rom, &mut toolchain).unwrap();
    assert_eq!(artifacts.binary.len(), 8192);
    assert_eq!(artifacts.binary[0], 0x60);
}

#[test]
fn test_failing_linker() {
    let mut toolchain = RecordingToolchain::new();
    toolchain.failing = Some("ld65".to_string());
    let error = build_source(PROGRAM, TargetKind::C64, OutputFormat::Prg, &mut toolchain).unwrap_err();
    assert_eq!(error.code, ErrorCode::ToolFailed);
    assert_eq!(toolchain.programs(), vec!["ca65", "ld65"]);
}
