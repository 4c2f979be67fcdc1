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

//! Parser module for ugBASIC.
//!
//! The parser is a single-pass recursive descent over the token stream.
//! It builds no tree: every statement and expression calls the code
//! generation verbs of [`crate::codegen`] on the [`Environment`] as soon as
//! it is recognized, and expressions evaluate to the variable holding
//! their value.
//!
//! Before the main pass a pre-scan declares every procedure, so calls may
//! precede definitions, and notes whether DATA holds floating point
//! literals.
//!
//! # Module Structure
//!
//! - `blocks` - Procedures, threads and timers (BlockParser trait)
//! - `control_flow` - Conditionals, loops and jumps (ControlFlowParser trait)
//! - `data_blocks` - DATA, READ, RESTORE and disk storage (DataBlockParser trait)
//! - `directives` - OPTION and DEFINE (DirectiveParser trait)
//! - `expressions` - Expression parsing (ExpressionParser trait)
//! - `helpers` - Token stream navigation and error handling (ParserHelpers trait)
//! - `media` - Graphics, sprites, tiles and sound (MediaParser trait)
//! - `statements` - Statement dispatch and simple statements (StatementParser trait)
//! - `types` - Type and parameter list parsing (TypeParser trait)

pub mod blocks;
pub mod control_flow;
pub mod data_blocks;
pub mod directives;
pub mod expressions;
pub mod helpers;
pub mod media;
pub mod statements;
pub mod types;

use helpers::ParserHelpers;
use statements::StatementParser;
use types::TypeParser;

use crate::codegen::{FlowEmitter, ProcedureEmitter};
use crate::environment::Environment;
use crate::error::{CompileError, ErrorCode, Span};
use crate::lexer::{tokenize, Token};
use crate::symbols::LabelTarget;

/// Words that begin a statement even when a `:` follows them.
const STATEMENT_WORDS: &[&str] = &["RANDOMIZE"];

/// The parser state.
pub struct Parser<'a> {
    /// The token stream to parse.
    pub(crate) tokens: &'a [(Token, Span)],
    /// Current position in the token stream.
    pub(crate) position: usize,
    /// Code generation state driven by the parser.
    pub(crate) env: &'a mut Environment,
    /// Byte offset of the start of every source line.
    line_starts: Vec<usize>,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given token stream.
    pub fn new(tokens: &'a [(Token, Span)], env: &'a mut Environment, source: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            tokens,
            position: 0,
            env,
            line_starts,
        }
    }

    /// One-based source line holding `span`.
    pub(crate) fn line_of(&self, span: Span) -> usize {
        self.line_starts.partition_point(|&start| start <= span.start)
    }

    // ========================================
    // Program Parsing
    // ========================================

    /// Compile the complete program.
    pub fn parse(&mut self) -> Result<(), CompileError> {
        self.prescan()?;
        while !self.is_at_end() {
            self.parse_line()?;
        }
        Ok(())
    }

    /// Declare procedures and gather program-wide facts.
    fn prescan(&mut self) -> Result<(), CompileError> {
        let mut in_data = false;
        for index in 0..self.tokens.len() {
            match &self.tokens[index].0 {
                Token::Procedure
                    if !(index > 0 && matches!(self.tokens[index - 1].0, Token::Declare)) =>
                {
                    let parallel =
                        index > 0 && matches!(self.tokens[index - 1].0, Token::Parallel);
                    self.position = index + 1;
                    let span = self.tokens[index].1;
                    let name = self.expect_identifier("a procedure name")?.to_ascii_uppercase();
                    let parameters = self.parse_parameters()?;
                    self.env.set_position(span, self.line_of(span));
                    self.env.declare_procedure(&name, parameters, parallel)?;
                }
                Token::Data => in_data = true,
                Token::Float(_) if in_data => self.env.features.data_float = true,
                token if token.is_statement_end() => in_data = false,
                _ => {}
            }
        }
        self.position = 0;
        Ok(())
    }

    /// Compile one source line: an optional line number or label, then
    /// statements separated by `:`.
    fn parse_line(&mut self) -> Result<(), CompileError> {
        if let Some(Token::Integer(number)) = self.peek() {
            let number = *number;
            let span = self.peek_span().unwrap_or_else(|| self.previous_span());
            self.advance();
            let line = u32::try_from(number).map_err(|_| {
                CompileError::new(
                    ErrorCode::ValueOutOfRange,
                    format!("line number {} out of range", number),
                    span,
                )
            })?;
            self.env.set_position(span, self.line_of(span));
            self.env.define_label(LabelTarget::Line(line))?;
        } else if self.at_label() {
            let span = self.peek_span().unwrap_or_else(|| self.previous_span());
            let name = self.expect_identifier("a label")?.to_ascii_uppercase();
            self.advance();
            self.env.set_position(span, self.line_of(span));
            self.env.define_label(LabelTarget::Name(name))?;
        }

        loop {
            match self.peek() {
                None => return Ok(()),
                Some(Token::Newline) => {
                    self.advance();
                    return self.env.end_inline_ifs();
                }
                Some(Token::Colon) => {
                    self.advance();
                }
                Some(_) => {
                    let span = self.peek_span().unwrap_or_else(|| self.previous_span());
                    self.env.set_position(span, self.line_of(span));
                    self.env.symbols.reset_temporaries();
                    self.parse_statement()?;
                    if !self.at_statement_end() {
                        return Err(self.unexpected("end of statement"));
                    }
                }
            }
        }
    }

    /// `name:` at the start of a line.
    fn at_label(&self) -> bool {
        match (self.peek(), self.peek_ahead(1)) {
            (Some(Token::Identifier(name)), Some(Token::Colon)) => !STATEMENT_WORDS
                .iter()
                .any(|w| name.eq_ignore_ascii_case(w)),
            _ => false,
        }
    }
}

/// Compile `source` into `env`.
///
/// Checks that need the whole program (open blocks, undefined labels)
/// are left to the caller.
pub fn parse_program(env: &mut Environment, source: &str) -> Result<(), CompileError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(&tokens, env, source);
    parser.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::testing::{c64, calls, code};
    use crate::types::VariableType;

    /// Helper to parse source code directly into a C64 environment.
    fn parse_source(source: &str) -> Result<Environment, CompileError> {
        let mut env = c64();
        parse_program(&mut env, source)?;
        Ok(env)
    }

    fn error_of(source: &str) -> ErrorCode {
        parse_source(source).err().map(|e| e.code).unwrap()
    }

    // ========================================
    // Parser Creation Tests
    // ========================================

    #[test]
    fn test_parser_creation() {
        let tokens = vec![];
        let mut env = c64();
        let parser = Parser::new(&tokens, &mut env, "");
        assert!(parser.is_at_end());
    }

    #[test]
    fn test_line_of_span() {
        let tokens = vec![];
        let mut env = c64();
        let parser = Parser::new(&tokens, &mut env, "CLS\nPRINT 1\n");
        assert_eq!(parser.line_of(Span::new(0, 3)), 1);
        assert_eq!(parser.line_of(Span::new(4, 9)), 2);
    }

    // ========================================
    // Program Structure Tests
    // ========================================

    #[test]
    fn test_statements_separated_by_colon() {
        let env = parse_source("DIM A AS BYTE : A = 10 : PRINT A").unwrap();
        assert_eq!(calls(&env, "PRINTN8"), 1);
        let a = env.symbols.lookup("A").unwrap();
        assert_eq!(env.symbols.variable(a).var_type, VariableType::Byte);
    }

    #[test]
    fn test_line_numbers_become_labels() {
        let env = parse_source("10 CLS\n20 GOTO 10").unwrap();
        assert!(env.symbols.labels.is_defined(&LabelTarget::Line(10)));
        assert!(code(&env).contains(&"JMP _line10".to_string()));
    }

    #[test]
    fn test_named_label() {
        let env = parse_source("start:\nGOTO start").unwrap();
        assert!(env
            .symbols
            .labels
            .is_defined(&LabelTarget::Name("START".to_string())));
    }

    #[test]
    fn test_randomize_is_not_a_label() {
        let env = parse_source("RANDOMIZE: CLS").unwrap();
        assert_eq!(calls(&env, "TEXTCLS"), 1);
    }

    #[test]
    fn test_procedures_are_declared_before_use() {
        let env = parse_source("CALL later\nEND\nPROCEDURE later\nCLS\nEND PROC").unwrap();
        assert!(env.symbols.find_procedure("LATER").is_some());
    }

    #[test]
    fn test_float_data_is_noticed() {
        let env = parse_source("DATA 1, 2.5").unwrap();
        assert!(env.features.data_float);
        let env = parse_source("DATA 1, 2\nA = 2.5").unwrap();
        assert!(!env.features.data_float);
    }

    #[test]
    fn test_trailing_tokens_are_rejected() {
        assert_eq!(error_of("CLS 1"), ErrorCode::SyntaxError);
    }

    #[test]
    fn test_keywords_ignore_case() {
        let env = parse_source("dim a as byte : a = 1 : print a").unwrap();
        assert_eq!(calls(&env, "PRINTN8"), 1);
    }
}
