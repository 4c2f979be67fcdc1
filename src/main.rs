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

//! ugBC compiler CLI
//!
//! Compiles a ugBASIC source into assembly for the chosen target and,
//! when `-o` is given, drives the assembler and linker to a binary.

use clap::{ArgAction, Parser};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ugbc::backend::Target;
use ugbc::config::{CompilerOptions, OutputFormat, Profile, TargetKind};
use ugbc::error::{format_critical, format_warning, render_report};
use ugbc::output::{self, BuildArtifacts};
use ugbc::toolchain::ProcessToolchain;
use ugbc::{CompileError, Compilation, ErrorCode};

/// ugBC - the ugBASIC compiler
#[derive(Parser, Debug)]
#[command(name = "ugbc")]
#[command(version)]
#[command(about = "A retargetable BASIC compiler for 8-bit home computers")]
#[command(long_about = r#"
ugBC compiles ugBASIC programs into assembly for the Commodore 64, the
Atari 8-bit computers and the TRS-80 Color Computer. With -o the assembly
is handed to cc65 (6502) or asm6809 (6809) to produce a binary.

Example usage:
  ugbc game.bas game.asm
  ugbc -T c64 -o game.prg game.bas game.asm
  ugbc -T coco -O dsk -o game.dsk -L game.lb2 game.bas game.asm
"#)]
struct Cli {
    /// The BASIC source file
    source: PathBuf,

    /// Where to write the generated assembly
    asm: PathBuf,

    /// Where to write the linker configuration (cc65 targets)
    #[arg(short = 'c', value_name = "CFG")]
    linker_config: Option<PathBuf>,

    /// Target machine: c64, atari, coco
    #[arg(short = 'T', value_name = "TARGET", default_value = "c64")]
    target: String,

    /// Assemble and link into this binary
    #[arg(short = 'o', value_name = "BINARY")]
    output: Option<PathBuf>,

    /// Output format (prg, xex, rom, bin, d64, dsk, atr); defaults to the extension of -o
    #[arg(short = 'O', value_name = "FORMAT")]
    format: Option<String>,

    /// Write the assembler listing
    #[arg(short = 'l', value_name = "LISTING")]
    listing: Option<PathBuf>,

    /// Write debugger labels (.lb2)
    #[arg(short = 'L', value_name = "LABELS")]
    labels: Option<PathBuf>,

    /// Write the compilation report
    #[arg(short = 'I', value_name = "INFO")]
    info: Option<PathBuf>,

    /// Report warnings
    #[arg(short = 'W')]
    warnings: bool,

    /// Peephole optimizer cycles (0 disables it)
    #[arg(short = 'p', value_name = "CYCLES")]
    peephole: Option<usize>,

    /// Directory for intermediate files
    #[arg(short = 't', value_name = "TEMP")]
    temporary: Option<PathBuf>,

    /// Refuse absolute asset paths and unknown external tools
    #[arg(long)]
    sandbox: bool,

    /// Enforce the BASIC 10 Liner rules
    #[arg(long)]
    ten_liner: bool,

    /// YAML profile overlaying the compiler options
    #[arg(long, value_name = "YAML")]
    profile: Option<PathBuf>,

    /// Render errors with source excerpts
    #[arg(long)]
    pretty_errors: bool,

    /// More logging (-v info, -vv debug)
    #[arg(short = 'v', action = ArgAction::Count)]
    verbose: u8,
}

/// Exit codes.
const EXIT_COMPILE: u8 = 1;
const EXIT_USAGE: u8 = 2;
const EXIT_IO: u8 = 3;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    let _ = simple_logger::SimpleLogger::new()
        .with_level(level)
        .env()
        .init();
}

fn options_from(cli: &Cli) -> Result<CompilerOptions, String> {
    let mut options = CompilerOptions::default();
    if let Some(path) = &cli.profile {
        let profile = Profile::load(path).map_err(|e| e.to_string())?;
        profile.apply(&mut options);
    }

    let format = match (&cli.format, &cli.output) {
        (Some(name), _) => Some(
            OutputFormat::from_name(name).ok_or_else(|| format!("unknown output format '{}'", name))?,
        ),
        (None, Some(path)) => OutputFormat::from_path(path),
        (None, None) => None,
    };
    if format.is_some() {
        options.output_format = format;
    }
    if let Some(cycles) = cli.peephole {
        options.peephole_limit = cycles;
    }
    if let Some(path) = &cli.temporary {
        options.temporary_path = path.clone();
    }
    options.warnings_enabled = cli.warnings;
    options.sandbox |= cli.sandbox;
    options.ten_liner_rules |= cli.ten_liner;
    Ok(options)
}

fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), String> {
    fs::write(path, contents).map_err(|e| format!("cannot write {}: {}", path.display(), e))
}

fn report_error(cli: &Cli, error: &CompileError, source: &str) {
    let file = cli.source.display().to_string();
    if cli.pretty_errors {
        eprint!("{}", render_report(error, source, &file));
    } else {
        eprintln!("{}", format_critical(error, source, &file));
    }
}

fn build(cli: &Cli, compilation: &Compilation, temporary: &Path) -> Result<BuildArtifacts, CompileError> {
    let scratch = tempfile::Builder::new()
        .prefix("ugbc")
        .tempdir_in(temporary)
        .map_err(|e| {
            CompileError::unlocated(
                ErrorCode::CannotWriteOutput,
                format!("cannot create a directory in {}: {}", temporary.display(), e),
            )
        })?;
    let target = Target::new(compilation.target);
    let mut toolchain = ProcessToolchain::new(cli.sandbox);
    output::build(
        target.machine.as_ref(),
        &compilation.program,
        &compilation.storage,
        scratch.path(),
        cli.listing.is_some(),
        &mut toolchain,
    )
}

fn run(cli: &Cli) -> Result<(), u8> {
    let target = TargetKind::from_name(&cli.target).ok_or_else(|| {
        eprintln!("Error: unknown target '{}'. Use c64, atari or coco.", cli.target);
        EXIT_USAGE
    })?;
    let options = options_from(cli).map_err(|message| {
        eprintln!("Error: {}", message);
        EXIT_USAGE
    })?;
    let temporary = options.temporary_path.clone();

    let source = fs::read_to_string(&cli.source).unwrap_or_default();
    log::info!("compiling {} for {}", cli.source.display(), target);
    let compilation = ugbc::compile_file(&cli.source, options, target).map_err(|error| {
        report_error(cli, &error, &source);
        EXIT_COMPILE
    })?;

    let file = cli.source.display().to_string();
    for warning in &compilation.warnings {
        eprint!("{}", format_warning(warning, &source, Some(&file)));
    }

    let io_failure = |message: String| {
        eprintln!("Error: {}", message);
        EXIT_IO
    };
    write_file(&cli.asm, &compilation.program.assembly).map_err(io_failure)?;
    if let (Some(path), Some(config)) = (&cli.linker_config, &compilation.program.linker_config) {
        write_file(path, config).map_err(io_failure)?;
    }
    if let Some(path) = &cli.info {
        write_file(path, &compilation.info).map_err(io_failure)?;
    }

    let Some(binary) = &cli.output else {
        return Ok(());
    };
    let artifacts = build(cli, &compilation, &temporary).map_err(|error| {
        report_error(cli, &error, &source);
        EXIT_COMPILE
    })?;
    write_file(binary, &artifacts.binary).map_err(io_failure)?;
    if let Some(path) = &cli.labels {
        write_file(path, &artifacts.labels).map_err(io_failure)?;
    }
    if let (Some(path), Some(listing)) = (&cli.listing, &artifacts.listing) {
        write_file(path, listing).map_err(io_failure)?;
    }
    log::info!(
        "wrote {} ({} bytes, {})",
        binary.display(),
        artifacts.binary.len(),
        compilation.program.format
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}
