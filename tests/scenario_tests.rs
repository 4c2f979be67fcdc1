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

//! The end-to-end programs every target must compile.
//!
//! Assertions are made on the generated assembly; nothing is assembled
//! or executed.

use pretty_assertions::assert_eq;
use ugbc::backend::Target;
use ugbc::symbols::ConstantValue;
use ugbc::{compile, compile_in, format_critical, CompilerOptions, Environment, ErrorCode, TargetKind};

fn assembly(source: &str) -> String {
    compile(source, CompilerOptions::default(), TargetKind::C64)
        .unwrap_or_else(|e| panic!("{} failed: {}", source, e))
        .program
        .assembly
}

/// Trimmed assembly lines, without comments and blanks.
fn lines(assembly: &str) -> Vec<String> {
    assembly
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with(';'))
        .map(str::to_string)
        .collect()
}

fn calls(lines: &[String], entry: &str) -> usize {
    let call = format!("JSR {}", entry);
    lines.iter().filter(|l| **l == call).count()
}

fn position(lines: &[String], wanted: impl Fn(&str) -> bool, what: &str) -> usize {
    lines
        .iter()
        .position(|l| wanted(l))
        .unwrap_or_else(|| panic!("{} not found", what))
}

#[test]
fn test_byte_assignment_and_print() {
    let lines = lines(&assembly("DIM A AS BYTE : A = 10 : PRINT A"));
    let load = position(&lines, |l| l == "LDA #$0A", "LDA #$0A");
    let store = position(&lines, |l| l == "STA _A", "STA _A");
    let print = position(&lines, |l| l == "JSR PRINTN8", "JSR PRINTN8");
    assert!(load < store && store < print);
    assert_eq!(calls(&lines, "PRINTN8"), 1);

    // The program ends in a jump to itself.
    let halt = position(&lines, |l| l.starts_with("_halt") && l.ends_with(':'), "halt label");
    let label = lines[halt].trim_end_matches(':');
    assert_eq!(lines[halt + 1], format!("JMP {}", label));
    assert!(print < halt);

    // One byte reserved for A.
    let slot = position(&lines, |l| l == "_A:", "_A:");
    assert_eq!(lines[slot + 1], ".res 1");
}

#[test]
fn test_for_loop_prints_signed_index() {
    let lines = lines(&assembly("FOR I = 1 TO 3 : PRINT I : NEXT"));
    assert_eq!(calls(&lines, "PRINTS16"), 1);
    let print = position(&lines, |l| l == "JSR PRINTS16", "JSR PRINTS16");
    let start = position(
        &lines,
        |l| l.starts_with("_for") && l.ends_with(':') && !l.contains("_end"),
        "loop label",
    );
    let label = lines[start].trim_end_matches(':').to_string();
    let back = lines
        .iter()
        .rposition(|l| l.ends_with(&format!(" {}", label)))
        .expect("jump back to the loop");
    let end = position(&lines, |l| *l == format!("{}_end:", label), "loop end");
    assert!(start < print && print < back && back < end);
}

#[test]
fn test_if_else_layout() {
    // CLS keeps the ENDIF label from falling into the final halt.
    let lines = lines(&assembly("IF 2 > 1 THEN PRINT \"Y\" ELSE PRINT \"N\" ENDIF\nCLS"));
    let else_label = position(&lines, |l| l.starts_with("_else") && l.ends_with(':'), "else label");
    let else_name = lines[else_label].trim_end_matches(':').to_string();
    let compare = position(&lines, |l| l.starts_with("SBC") || l.starts_with("CMP"), "compare");
    let branch = position(&lines, |l| l.ends_with(&format!(" {}", else_name)), "branch to ELSE");
    let yes = position(&lines, |l| l == "JSR PRINTSTR", "first PRINTSTR");
    let to_end = position(
        &lines,
        |l| l.starts_with("JMP _if") && l.ends_with("_end"),
        "jump to ENDIF",
    );
    let no = lines
        .iter()
        .rposition(|l| l == "JSR PRINTSTR")
        .expect("second PRINTSTR");
    let end_name = lines[to_end].trim_start_matches("JMP ").to_string();
    let end = position(&lines, |l| *l == format!("{}:", end_name), "ENDIF label");

    assert!(compare < branch);
    assert!(branch < yes && yes < to_end && to_end < else_label);
    assert!(else_label < no && no < end);
}

#[test]
fn test_load_image_alias_is_cached() {
    let dir = tempfile::tempdir().unwrap();
    let mut image = image::RgbaImage::new(8, 8);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        *pixel = if (x + y) % 2 == 0 {
            image::Rgba([255, 255, 255, 255])
        } else {
            image::Rgba([0, 0, 0, 255])
        };
    }
    image.save(dir.path().join("8x8.png")).unwrap();

    let mut env = Environment::new(CompilerOptions::default(), Target::new(TargetKind::C64));
    env.source_dir = dir.path().to_path_buf();
    let source = "LOAD IMAGE(\"8x8.png\") AS \"s\"\nimg = LOAD IMAGE(\"8x8.png\")\nother = LOAD IMAGE(\"8x8.png\")";
    let compilation = compile_in(&mut env, source).unwrap();

    let alias = env.symbols.constant("S").expect("alias constant");
    let ConstantValue::Integer(id) = alias.value else {
        panic!("alias is not an integer: {:?}", alias.value);
    };
    let img = env.symbols.lookup("IMG").unwrap();
    let other = env.symbols.lookup("OTHER").unwrap();
    assert_eq!(env.assets.resource_id(img), Some(id as usize));
    assert_eq!(env.assets.resource_id(other), Some(id as usize));

    let buffers = env
        .symbols
        .variables()
        .filter(|(_, v)| v.value_buffer.is_some())
        .count();
    assert_eq!(buffers, 1);
    assert!(compilation.info.contains("8x8"));
}

#[test]
fn test_data_read_restore() {
    let source = "DATA 1,2,\"x\" : READ a : READ b : READ c$\nRESTORE\nREAD a";
    let lines = lines(&assembly(source));
    assert_eq!(calls(&lines, "DATAREADNUMBER"), 3);
    assert_eq!(calls(&lines, "DATAREADSTRING"), 1);
    // Once at startup, once for the RESTORE statement.
    assert_eq!(calls(&lines, "DATARESTORE"), 2);

    let startup = position(&lines, |l| l == "JSR DATARESTORE", "startup RESTORE");
    let first_read = position(&lines, |l| l == "JSR DATAREADNUMBER", "READ");
    let restore = lines
        .iter()
        .rposition(|l| l == "JSR DATARESTORE")
        .unwrap();
    let last_read = lines
        .iter()
        .rposition(|l| l == "JSR DATAREADNUMBER")
        .unwrap();
    assert!(startup < first_read);
    assert!(first_read < restore && restore < last_read);

    // RESTORE rewinds to the first value of the table.
    let start = position(&lines, |l| l == "DATASTART:", "DATASTART");
    let end = position(&lines, |l| l == "DATAPTRE:", "DATAPTRE");
    assert!(start < end);
    assert!(lines.iter().any(|l| l == "LDA #<DATASTART"));
}

#[test]
fn test_exit_beyond_the_only_loop() {
    let source = "DO\nEXIT 2\nLOOP";
    let error = compile(source, CompilerOptions::default(), TargetKind::C64).unwrap_err();
    assert_eq!(error.code, ErrorCode::ExitBeyondLoops);
    assert_eq!(error.code.to_string(), "E145");
    assert_eq!(
        format_critical(&error, source, "exit.bas"),
        format!("CRITICAL ERROR during compilation of exit.bas: {} at 2 column 1", error)
    );
}

#[test]
fn test_same_program_on_every_target() {
    for target in [TargetKind::C64, TargetKind::Atari, TargetKind::Coco] {
        let compilation = compile("DIM A AS BYTE : A = 10 : PRINT A", CompilerOptions::default(), target)
            .unwrap_or_else(|e| panic!("{} failed: {}", target, e));
        assert!(compilation.program.assembly.contains("PRINTN8"), "{}", target);
    }
}
