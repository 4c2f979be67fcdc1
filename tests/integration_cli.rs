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

//! End-to-end CLI integration tests.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn ugbc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_ugbc"))
}

fn run_in(dir: &Path, args: &[&str]) -> Output {
    ugbc()
        .current_dir(dir)
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test --help flag.
#[test]
fn test_help_flag() {
    let output = ugbc().arg("--help").output().expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ugbc"));
    assert!(stdout.contains("-T"));
    assert!(stdout.contains("-o"));
}

/// Test --version flag.
#[test]
fn test_version_flag() {
    let output = ugbc().arg("--version").output().expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ugbc"));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_writes_assembly_config_and_info() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("hello.bas"), "PRINT \"HELLO\"\n").unwrap();

    let output = run_in(
        dir.path(),
        &["-c", "hello.cfg", "-I", "hello.info", "hello.bas", "hello.asm"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let assembly = fs::read_to_string(dir.path().join("hello.asm")).unwrap();
    assert!(assembly.contains("JSR PRINTSTR"));
    let cfg = fs::read_to_string(dir.path().join("hello.cfg")).unwrap();
    assert!(cfg.contains("MEMORY"));
    let info = fs::read_to_string(dir.path().join("hello.info")).unwrap();
    assert!(info.contains("target: c64"));
}

#[test]
fn test_coco_writes_no_linker_config() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("hello.bas"), "PRINT 1\n").unwrap();

    let output = run_in(
        dir.path(),
        &["-T", "coco", "-c", "hello.cfg", "hello.bas", "hello.asm"],
    );
    assert!(output.status.success());
    assert!(dir.path().join("hello.asm").exists());
    assert!(!dir.path().join("hello.cfg").exists());
}

#[test]
fn test_compile_error_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("broken.bas"), "DO\nPRINT 1\n").unwrap();

    let output = run_in(dir.path(), &["broken.bas", "broken.asm"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("CRITICAL ERROR during compilation of broken.bas"));
    assert!(!dir.path().join("broken.asm").exists());
}

#[test]
fn test_missing_source() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_in(dir.path(), &["nowhere.bas", "nowhere.asm"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_unknown_target() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_in(dir.path(), &["-T", "zx81", "a.bas", "a.asm"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown target"));
}

#[test]
fn test_ten_liner_rules() {
    let dir = tempfile::tempdir().unwrap();
    let source: String = (0..11).map(|i| format!("PRINT {}\n", i)).collect();
    fs::write(dir.path().join("long.bas"), &source).unwrap();

    let relaxed = run_in(dir.path(), &["long.bas", "long.asm"]);
    assert!(relaxed.status.success());

    let strict = run_in(dir.path(), &["--ten-liner", "long.bas", "long.asm"]);
    assert_eq!(strict.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&strict.stderr).contains("E051"));
}

#[test]
fn test_missing_tool_fails_the_build() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("hello.bas"), "PRINT 1\n").unwrap();

    let output = ugbc()
        .current_dir(dir.path())
        .env("PATH", dir.path())
        .args(["-o", "hello.prg", "hello.bas", "hello.asm"])
        .output()
        .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(1));
    assert!(dir.path().join("hello.asm").exists());
    assert!(!dir.path().join("hello.prg").exists());
}
