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

//! ugBC compiler library.
//!
//! ugBC compiles ugBASIC programs into assembly for 8-bit home computers
//! and drives the external assembler to produce the final binary.
//!
//! # Modules
//!
//! - [`lexer`] and [`parser`]: a single pass over the source; the parser
//!   calls the code generation verbs as it recognizes statements
//! - [`environment`]: the state of one compilation
//! - [`symbols`], [`types`], [`control`], [`memory`], [`assets`]: the
//!   tables the code generator works on
//! - [`codegen`]: the verbs, target independent
//! - [`backend`]: processors and machines
//! - [`emitter`]: assembly buffers and the runtime preprocessor
//! - [`optimizer`]: peephole and flow passes over the generated assembly
//! - [`output`]: program layout, linker configuration, packaging
//! - [`toolchain`]: the external assembler, linker and imagers
//!
//! # Example
//!
//! ```no_run
//! use ugbc::config::{CompilerOptions, TargetKind};
//!
//! let compilation = ugbc::compile("PRINT \"HELLO\"", CompilerOptions::default(), TargetKind::C64)?;
//! println!("{}", compilation.program.assembly);
//! # Ok::<(), ugbc::CompileError>(())
//! ```

pub mod assets;
pub mod backend;
pub mod codegen;
pub mod config;
pub mod control;
pub mod emitter;
pub mod environment;
pub mod error;
pub mod lexer;
pub mod memory;
pub mod optimizer;
pub mod output;
pub mod parser;
pub mod symbols;
pub mod toolchain;
pub mod types;

pub use config::{CompilerOptions, OutputFormat, TargetKind};
pub use environment::Environment;
pub use error::{format_critical, format_error, CompileError, ErrorCode, Result, Span, Warning};
pub use output::{ComposedProgram, StoredFile};

use backend::Target;
use codegen::FlowEmitter;
use optimizer::OptimizerStats;
use std::path::Path;

/// The version of the compiler.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of the compiler.
pub const NAME: &str = "ugBC";

/// The result of compiling one program.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub target: TargetKind,
    pub program: ComposedProgram,
    /// The additional information report.
    pub info: String,
    pub warnings: Vec<Warning>,
    pub stats: OptimizerStats,
    /// Files of the STORAGE blocks, in declaration order.
    pub storage: Vec<StoredFile>,
}

/// Compile `source` for `target`.
pub fn compile(source: &str, options: CompilerOptions, target: TargetKind) -> Result<Compilation> {
    let mut env = Environment::new(options, Target::new(target));
    compile_in(&mut env, source)
}

/// Compile the file at `path`; assets are resolved next to it.
pub fn compile_file(path: &Path, options: CompilerOptions, target: TargetKind) -> Result<Compilation> {
    let source = std::fs::read_to_string(path).map_err(|e| {
        CompileError::unlocated(
            ErrorCode::CannotReadFile,
            format!("cannot read {}: {}", path.display(), e),
        )
    })?;
    let mut env = Environment::new(options, Target::new(target));
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        env.source_dir = dir.to_path_buf();
    }
    compile_in(&mut env, &source)
}

/// Compile `source` in a prepared environment.
pub fn compile_in(env: &mut Environment, source: &str) -> Result<Compilation> {
    log::debug!("parsing {} byte(s) for {}", source.len(), env.target.kind);
    if env.options.ten_liner_rules {
        lexer::check_ten_liner(source)?;
    }
    parser::parse_program(env, source)?;
    env.symbols.labels.verify()?;
    env.control.verify_empty()?;
    let restores = env.symbols.data.resolve_restores()?;
    env.end_program();

    let code = env.out.take_lines();
    log::debug!("optimizing {} line(s)", code.len());
    let (code, stats) = optimizer::optimize(code, env.target.cpu.as_ref(), env.options.peephole_limit);
    let program = output::compose(env, code, &restores)?;
    let storage = stored_files(env)?;
    let info = output::info::render_info(env, &program, &stats);

    Ok(Compilation {
        target: env.target.kind,
        program,
        info,
        warnings: env.warnings.clone(),
        stats,
        storage,
    })
}

fn stored_files(env: &Environment) -> Result<Vec<StoredFile>> {
    let mut files = Vec::new();
    for storage in &env.symbols.storages {
        for file in &storage.files {
            let data = std::fs::read(&file.source).map_err(|e| {
                CompileError::unlocated(
                    ErrorCode::StorageFileNotFound,
                    format!("cannot read {}: {}", file.source.display(), e),
                )
            })?;
            files.push(StoredFile {
                name: file.target.clone(),
                data,
            });
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "ugBC");
    }

    #[test]
    fn test_compile_empty_program() {
        let compilation = compile("", CompilerOptions::default(), TargetKind::C64).unwrap();
        assert_eq!(compilation.program.format, OutputFormat::Prg);
        assert!(compilation.program.assembly.contains("JSR STARTUP"));
        assert!(compilation.warnings.is_empty());
    }

    #[test]
    fn test_ten_liner_rules() {
        let source = "PRINT 1\n".repeat(11);
        let options = CompilerOptions {
            ten_liner_rules: true,
            ..CompilerOptions::default()
        };
        let error = compile(&source, options, TargetKind::C64).unwrap_err();
        assert_eq!(error.code, ErrorCode::TenLinerViolation);
        assert!(compile(&source, CompilerOptions::default(), TargetKind::C64).is_ok());
    }

    #[test]
    fn test_unclosed_block_fails_at_end() {
        let error = compile("DO\nPRINT 1\n", CompilerOptions::default(), TargetKind::C64).unwrap_err();
        assert_eq!(error.code, ErrorCode::DoWithoutLoop);
    }
}
