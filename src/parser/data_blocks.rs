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

//! DATA, READ and RESTORE; STORAGE blocks and DLOAD.

use super::control_flow::ControlFlowParser;
use super::expressions::ExpressionParser;
use super::helpers::ParserHelpers;
use super::types::TypeParser;
use super::Parser;
use crate::codegen::{DataEmitter, StorageEmitter, VariableEmitter};
use crate::error::CompileError;
use crate::lexer::Token;

/// Trait for data block parsing operations.
pub trait DataBlockParser {
    /// `DATA [AS type] v1, v2, ...`.
    fn parse_data(&mut self) -> Result<(), CompileError>;

    /// `READ a, b$, ...`.
    fn parse_read(&mut self) -> Result<(), CompileError>;

    /// `RESTORE [label | line | (expression)]`.
    fn parse_restore(&mut self) -> Result<(), CompileError>;

    /// `STORAGE "name"`.
    fn parse_storage(&mut self) -> Result<(), CompileError>;

    /// `FILE "source" [AS "target"] [TO name]`.
    fn parse_file(&mut self) -> Result<(), CompileError>;

    /// `DLOAD "name" [TO address] [SIZE s] [OFFSET o]`.
    fn parse_dload(&mut self) -> Result<(), CompileError>;
}

impl<'a> Parser<'a> {
    /// Whether the RESTORE operand names a label rather than a value.
    fn restore_names_label(&self) -> bool {
        let single = self
            .peek_ahead(1)
            .is_some_and(|t| t.is_statement_end() || matches!(t, Token::Else));
        match self.peek() {
            Some(Token::Integer(_)) => single,
            Some(Token::Identifier(name)) => {
                let name = name.to_ascii_uppercase();
                single
                    && self.env.symbols.lookup(&name).is_none()
                    && self.env.symbols.constant(&name).is_none()
            }
            _ => false,
        }
    }
}

impl<'a> DataBlockParser for Parser<'a> {
    fn parse_data(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Data, "DATA")?;
        let as_type = self.parse_optional_type()?;
        let mut values = vec![self.parse_expression()?];
        while self.match_token(&Token::Comma) {
            values.push(self.parse_expression()?);
        }
        self.env.data(&values, as_type)
    }

    fn parse_read(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Read, "READ")?;
        loop {
            let name = self.expect_identifier("a variable name")?.to_ascii_uppercase();
            let target = self.env.assignment_target(&name)?;
            self.env.read(target)?;
            if !self.match_token(&Token::Comma) {
                return Ok(());
            }
        }
    }

    fn parse_restore(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Restore, "RESTORE")?;
        if self.at_statement_end() {
            return self.env.restore(None);
        }
        if self.restore_names_label() {
            let target = self.parse_label_target()?;
            return self.env.restore(Some(target));
        }
        let line = self.parse_expression()?;
        self.env.restore_line(line)
    }

    fn parse_storage(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Storage, "STORAGE")?;
        let name = self.parse_static_string("a storage name")?;
        self.env.begin_storage(&name)
    }

    fn parse_file(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::File, "FILE")?;
        let source = self.parse_static_string("a file name")?;
        let target = if self.match_token(&Token::As) {
            Some(self.parse_static_string("a target name")?)
        } else {
            None
        };
        let bind = if self.match_token(&Token::To) {
            Some(self.expect_identifier("a variable name")?.to_ascii_uppercase())
        } else {
            None
        };
        self.env
            .storage_file(&source, target.as_deref(), bind.as_deref())
    }

    fn parse_dload(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Dload, "DLOAD")?;
        let name = self.parse_expression()?;
        let mut address = None;
        let mut size = None;
        let mut offset = None;
        loop {
            if self.match_token(&Token::To) {
                address = Some(self.parse_expression()?);
            } else if self.match_word("SIZE") {
                size = Some(self.parse_expression()?);
            } else if self.match_word("OFFSET") {
                offset = Some(self.parse_expression()?);
            } else {
                break;
            }
        }
        self.env.dload(name, address, size, offset)
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::Target;
    use crate::codegen::testing::{c64, calls, coco};
    use crate::config::{CompilerOptions, OutputFormat, TargetKind};
    use crate::environment::Environment;
    use crate::error::{CompileError, ErrorCode, WarningCode};
    use crate::parser::parse_program;
    use std::io::Write;

    fn compile(source: &str) -> Result<Environment, CompileError> {
        let mut env = c64();
        parse_program(&mut env, source)?;
        Ok(env)
    }

    #[test]
    fn test_data_and_read() {
        let env = compile("DATA 1, 2, \"x\"\nREAD a\nREAD b\nREAD c$").unwrap();
        assert!(!env.symbols.data.is_empty());
        assert_eq!(calls(&env, "DATAREADNUMBER"), 2);
        assert_eq!(calls(&env, "DATAREADSTRING"), 1);
    }

    #[test]
    fn test_restore_forms() {
        let source = "10 DATA 1\nvalues:\nDATA 2\nRESTORE\nRESTORE 10\nRESTORE values\nn = 10\nRESTORE (n)";
        let env = compile(source).unwrap();
        assert!(env.symbols.data.resolve_restores().is_ok());
    }

    #[test]
    fn test_restore_to_missing_label() {
        let env = compile("DATA 1\nRESTORE nowhere").unwrap();
        let err = env.symbols.data.resolve_restores().unwrap_err();
        assert_eq!(err.code, ErrorCode::UndefinedLabel);
    }

    #[test]
    fn test_storage_block() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("level.bin")).unwrap();
        file.write_all(&[1, 2, 3, 4]).unwrap();

        let mut options = CompilerOptions::default();
        options.output_format = Some(OutputFormat::D64);
        let mut env = Environment::new(options, Target::new(TargetKind::C64));
        env.source_dir = dir.path().to_path_buf();
        let source = "STORAGE \"disk\"\nFILE \"level.bin\" AS \"LEVEL\" TO level\nENDSTORAGE\nDLOAD \"LEVEL\" SIZE 2";
        parse_program(&mut env, source).unwrap();
        assert_eq!(env.symbols.storages[0].files[0].size, 4);
        assert_eq!(calls(&env, "DLOAD"), 1);
        assert_eq!(env.warnings[0].code, WarningCode::DloadSizeIgnored);
    }

    #[test]
    fn test_dload_unsupported_on_coco() {
        let mut env = coco();
        let err = parse_program(&mut env, "DLOAD \"X\" TO 1024").unwrap_err();
        assert_eq!(err.code, ErrorCode::DloadUnsupported);
    }
}
