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

//! Procedures, threads and timers.

use super::control_flow::ControlFlowParser;
use super::expressions::ExpressionParser;
use super::helpers::ParserHelpers;
use super::types::TypeParser;
use super::Parser;
use crate::codegen::{ProcedureEmitter, TimerEmitter, VariableEmitter};
use crate::error::{CompileError, ErrorCode};
use crate::lexer::Token;

/// Trait for procedure and thread parsing operations.
pub trait BlockParser {
    /// `[PARALLEL] PROCEDURE name[params]`.
    fn parse_procedure(&mut self) -> Result<(), CompileError>;

    /// `END PROC` or `ENDPROC`, with an optional `[value]`.
    fn parse_end_procedure(&mut self) -> Result<(), CompileError>;

    /// `PROC name[args]` or `CALL name[args]`.
    fn parse_call(&mut self) -> Result<(), CompileError>;

    /// `SHARED a, b*` or `GLOBAL a, b*`.
    fn parse_shared(&mut self) -> Result<(), CompileError>;

    /// `DECLARE PROC name[p AS type ON register, ...] AT address`.
    fn parse_declare(&mut self) -> Result<(), CompileError>;

    /// `EVERY n TICKS GOSUB label`, `EVERY n TICKS CALL proc`, `EVERY ON|OFF`.
    fn parse_every(&mut self) -> Result<(), CompileError>;
}

impl<'a> BlockParser for Parser<'a> {
    fn parse_procedure(&mut self) -> Result<(), CompileError> {
        self.match_token(&Token::Parallel);
        self.expect(&Token::Procedure, "PROCEDURE")?;
        let name = self.expect_identifier("a procedure name")?.to_ascii_uppercase();
        // Parameters were declared by the pre-scan.
        self.parse_parameters()?;
        self.env.begin_procedure(&name)?;
        Ok(())
    }

    fn parse_end_procedure(&mut self) -> Result<(), CompileError> {
        if !self.match_token(&Token::EndProc) {
            self.expect(&Token::End, "END")?;
            self.expect(&Token::Proc, "PROC")?;
        }
        let result = if self.match_token(&Token::LeftBracket) {
            let value = self.parse_expression()?;
            self.expect(&Token::RightBracket, "']'")?;
            Some(value)
        } else {
            None
        };
        self.env.end_procedure(result)
    }

    fn parse_call(&mut self) -> Result<(), CompileError> {
        self.advance();
        let name = self.expect_identifier("a procedure name")?.to_ascii_uppercase();
        let args = self.parse_call_arguments()?;
        self.env.call_procedure(&name, &args)?;
        Ok(())
    }

    fn parse_shared(&mut self) -> Result<(), CompileError> {
        let global = self.check(&Token::Global);
        self.advance();
        loop {
            let mut pattern = match self.peek() {
                Some(Token::Identifier(name)) => {
                    let name = name.to_ascii_uppercase();
                    self.advance();
                    name
                }
                Some(Token::Star) => String::new(),
                _ => return Err(self.unexpected("a variable name or pattern")),
            };
            if self.match_token(&Token::Star) {
                pattern.push('*');
            }
            self.env.share(&pattern, global);
            if !self.match_token(&Token::Comma) {
                return Ok(());
            }
        }
    }

    fn parse_declare(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Declare, "DECLARE")?;
        if !self.match_token(&Token::Proc) {
            self.expect(&Token::Procedure, "PROC")?;
        }
        let name = self.expect_identifier("a procedure name")?.to_ascii_uppercase();
        let parameters = self.parse_register_parameters()?;
        self.expect_word("AT")?;
        let address = self.parse_constant("a routine address")?;
        let address = u16::try_from(address).map_err(|_| {
            self.env.error(
                ErrorCode::ValueOutOfRange,
                format!("address {} out of range", address),
            )
        })?;
        self.env.declare_external(&name, address, parameters)?;
        Ok(())
    }

    fn parse_every(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Every, "EVERY")?;
        if self.match_token(&Token::On) {
            return self.env.every_on();
        }
        if self.match_token(&Token::Off) {
            return self.env.every_off();
        }
        let period = self.parse_expression()?;
        self.expect(&Token::Ticks, "TICKS")?;
        if self.match_token(&Token::Gosub) {
            let target = self.parse_label_target()?;
            return self.env.every_gosub(period, target);
        }
        if self.match_token(&Token::Call) || self.match_token(&Token::Proc) {
            let name = self.expect_identifier("a procedure name")?.to_ascii_uppercase();
            return self.env.every_call(period, &name);
        }
        Err(self.unexpected("GOSUB or CALL"))
    }
}
