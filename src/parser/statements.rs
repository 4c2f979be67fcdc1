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

//! Statement dispatch and the simple statements.

use super::blocks::BlockParser;
use super::control_flow::ControlFlowParser;
use super::data_blocks::DataBlockParser;
use super::directives::DirectiveParser;
use super::expressions::ExpressionParser;
use super::helpers::ParserHelpers;
use super::media::MediaParser;
use super::types::TypeParser;
use super::Parser;
use crate::codegen::{
    implicit_type, ArrayEmitter, GraphicsEmitter, PrintItem, ProcedureEmitter, StorageEmitter,
    TextEmitter, ThreadEmitter, UnaryEmitter, VariableEmitter,
};
use crate::error::{CompileError, ErrorCode};
use crate::lexer::Token;
use crate::symbols::VariableId;
use crate::types::VariableType;

/// Trait for statement parsing operations.
pub trait StatementParser {
    /// Parse and compile one statement.
    fn parse_statement(&mut self) -> Result<(), CompileError>;

    /// `PRINT [items]`.
    fn parse_print(&mut self) -> Result<(), CompileError>;

    /// `DIM` and `VAR` declarations, possibly several separated by commas.
    fn parse_dim(&mut self) -> Result<(), CompileError>;

    /// `CONST name = value`.
    fn parse_const(&mut self) -> Result<(), CompileError>;

    /// `name = value`, `name(i, ...) = value` or a procedure call.
    fn parse_assignment(&mut self, name: &str) -> Result<(), CompileError>;

    /// `WAIT KEY`, `WAIT VBL`, `WAIT PARALLEL thread`.
    fn parse_wait(&mut self) -> Result<(), CompileError>;
}

impl<'a> Parser<'a> {
    /// `(d1, d2, ...)` with constant dimensions.
    fn parse_dimensions(&mut self) -> Result<Vec<usize>, CompileError> {
        self.expect(&Token::LeftParen, "'('")?;
        let mut dimensions = Vec::new();
        loop {
            let size = self.parse_constant("an array dimension")?;
            let size = usize::try_from(size)
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| {
                    self.env.error(
                        ErrorCode::ValueOutOfRange,
                        format!("array dimension {} must be positive", size),
                    )
                })?;
            dimensions.push(size);
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RightParen, "')'")?;
        Ok(dimensions)
    }

    fn parse_array_declaration(
        &mut self,
        name: &str,
        element: VariableType,
        dimensions: &[usize],
    ) -> Result<VariableId, CompileError> {
        if !self.match_token(&Token::Equal) {
            return self.env.define_array(name, element, dimensions);
        }
        if self.match_token(&Token::Load) {
            self.expect(&Token::LeftParen, "'('")?;
            let path = self.parse_static_string("a file name")?;
            self.expect(&Token::RightParen, "')'")?;
            return self
                .env
                .define_array_from_file(name, element, dimensions, &path);
        }
        self.expect(&Token::Hash, "'#'")?;
        self.expect(&Token::LeftBrace, "'{'")?;
        let values = self.parse_arguments(&Token::RightBrace)?;
        self.expect(&Token::RightBrace, "'}'")?;
        self.env
            .define_initialized_array(name, element, dimensions, &values)
    }

    fn parse_declaration(&mut self) -> Result<(), CompileError> {
        let name = self.expect_identifier("a variable name")?.to_ascii_uppercase();
        let mut dimensions = if self.check(&Token::LeftParen) {
            Some(self.parse_dimensions()?)
        } else {
            None
        };
        let ty = self.parse_optional_type()?.unwrap_or_else(|| implicit_type(&name));
        if dimensions.is_none() && self.check(&Token::LeftParen) {
            dimensions = Some(self.parse_dimensions()?);
        }
        if let Some(dimensions) = dimensions {
            self.parse_array_declaration(&name, ty, &dimensions)?;
            return Ok(());
        }
        if self.match_word("AT") {
            let address = self.parse_constant("an address")?;
            let address = u16::try_from(address).map_err(|_| {
                self.env.error(
                    ErrorCode::ValueOutOfRange,
                    format!("address {} out of range", address),
                )
            })?;
            self.env.define_mapped_variable(&name, ty, address)?;
        } else if self.match_token(&Token::Equal) {
            let init = self.parse_expression()?;
            self.env.define_initialized_variable(&name, ty, init)?;
        } else {
            self.env.define_variable(&name, ty)?;
        }
        Ok(())
    }

    /// Make `name` refer to the resource `value`, when it may.
    fn bind_resource(&mut self, name: &str, value: VariableId) -> bool {
        let ty = self.env.type_of(value);
        if !(ty.is_resource() || ty == VariableType::Sprite) {
            return false;
        }
        let bindable = match self.env.symbols.lookup(name) {
            None => true,
            Some(id) => {
                let existing = self.env.symbols.variable(id);
                existing.var_type == ty && existing.value_buffer.is_none()
            }
        };
        if bindable {
            self.env.symbols.alias(name, value);
        }
        bindable
    }

    fn parse_identifier_statement(&mut self, name: &str) -> Result<(), CompileError> {
        match name {
            "INC" | "DEC" => {
                let target = self.expect_identifier("a variable name")?.to_ascii_uppercase();
                let id = self.env.assignment_target(&target)?;
                if name == "INC" {
                    self.env.increment(id)
                } else {
                    self.env.decrement(id)
                }
            }
            "RANDOMIZE" => {
                let seed = if self.at_statement_end() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.env.randomize(seed)
            }
            _ => self.parse_assignment(name),
        }
    }
}

impl<'a> StatementParser for Parser<'a> {
    fn parse_statement(&mut self) -> Result<(), CompileError> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected("a statement"));
        };
        match token {
            Token::Print => self.parse_print(),
            Token::Locate => {
                self.advance();
                let x = self.parse_expression()?;
                self.expect(&Token::Comma, "','")?;
                let y = self.parse_expression()?;
                self.env.locate(x, y)
            }
            Token::Cls => {
                self.advance();
                self.env.cls()
            }
            Token::Pen => {
                self.advance();
                let color = self.parse_expression()?;
                self.env.pen(color)
            }
            Token::Paper => {
                self.advance();
                let color = self.parse_expression()?;
                self.env.paper(color)
            }
            Token::Dim | Token::Var => self.parse_dim(),
            Token::Const => self.parse_const(),
            Token::Let => {
                self.advance();
                let name = self.expect_identifier("a variable name")?.to_ascii_uppercase();
                self.parse_assignment(&name)
            }
            Token::Poke => {
                self.advance();
                let address = self.parse_expression()?;
                self.expect(&Token::Comma, "','")?;
                let value = self.parse_expression()?;
                self.env.poke(address, value)
            }
            Token::Wait => self.parse_wait(),

            Token::If => self.parse_if(),
            Token::Else => self.parse_else(),
            Token::ElseIf => self.parse_else_if(),
            Token::EndIf => self.parse_end_if(),
            Token::End => self.parse_end(),
            Token::Select => self.parse_select(),
            Token::Case => self.parse_case(),
            Token::EndSelect => self.parse_end_select(),
            Token::For => self.parse_for(),
            Token::Next => self.parse_next(),
            Token::Do => self.parse_do(),
            Token::Loop => self.parse_loop(),
            Token::While => self.parse_while(),
            Token::Wend => self.parse_wend(),
            Token::Repeat => self.parse_repeat(),
            Token::Until => self.parse_until(),
            Token::Exit => self.parse_exit(),
            Token::Goto | Token::Gosub => self.parse_jump(),
            Token::Return => self.parse_return(),
            Token::On => self.parse_on(),
            Token::Begin => self.parse_begin(),

            Token::Procedure | Token::Parallel => self.parse_procedure(),
            Token::EndProc => self.parse_end_procedure(),
            Token::Proc | Token::Call => self.parse_call(),
            Token::Shared | Token::Global => self.parse_shared(),
            Token::Declare => self.parse_declare(),
            Token::Spawn => {
                self.parse_expression()?;
                Ok(())
            }
            Token::Yield => {
                self.advance();
                self.env.yield_thread()
            }
            Token::Kill => {
                self.advance();
                let thread = if self.at_statement_end() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.env.kill(thread)
            }
            Token::Respawn => {
                self.advance();
                let thread = self.parse_expression()?;
                self.env.respawn(thread)
            }
            Token::Run => {
                self.advance();
                self.expect(&Token::Parallel, "PARALLEL")?;
                self.env.run_parallel()
            }
            Token::Every => self.parse_every(),

            Token::Data => self.parse_data(),
            Token::Read => self.parse_read(),
            Token::Restore => self.parse_restore(),
            Token::Storage => self.parse_storage(),
            Token::File => self.parse_file(),
            Token::EndStorage => {
                self.advance();
                self.env.end_storage()
            }
            Token::Dload => self.parse_dload(),

            Token::Option => self.parse_option(),
            Token::Define => self.parse_define(),

            Token::Load => {
                self.parse_load()?;
                Ok(())
            }
            Token::Bitmap => self.parse_bitmap(),
            Token::Plot => self.parse_plot(),
            Token::Color => self.parse_color(),
            Token::Put => self.parse_put(),
            Token::Sprite => self.parse_sprite(),
            Token::Volume | Token::Play | Token::Sound => self.parse_audio(),

            Token::Identifier(name) => {
                self.advance();
                let name = name.to_ascii_uppercase();
                self.parse_identifier_statement(&name)
            }
            _ => Err(self.unexpected("a statement")),
        }
    }

    fn parse_print(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Print, "PRINT")?;
        let mut items = Vec::new();
        while !self.at_statement_end() {
            if self.match_token(&Token::Comma) {
                items.push(PrintItem::Tab);
            } else if self.match_token(&Token::Semicolon) {
                items.push(PrintItem::Join);
            } else {
                if matches!(items.last(), Some(PrintItem::Value(_))) {
                    return Err(self.unexpected("',' or ';'"));
                }
                items.push(PrintItem::Value(self.parse_expression()?));
            }
        }
        self.env.print(&items)
    }

    fn parse_dim(&mut self) -> Result<(), CompileError> {
        self.advance();
        loop {
            self.parse_declaration()?;
            if !self.match_token(&Token::Comma) {
                return Ok(());
            }
        }
    }

    fn parse_const(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Const, "CONST")?;
        let name = self.expect_identifier("a constant name")?.to_ascii_uppercase();
        self.expect(&Token::Equal, "'='")?;
        let value = self.parse_expression()?;
        let value = self.env.constant_value_of(value).ok_or_else(|| {
            self.env.error(
                ErrorCode::ValueOutOfRange,
                format!("the value of {} must be known at compile time", name),
            )
        })?;
        self.env.define_constant(&name, value)
    }

    fn parse_assignment(&mut self, name: &str) -> Result<(), CompileError> {
        if self.check(&Token::LeftBracket) {
            let args = self.parse_call_arguments()?;
            self.env.call_procedure(name, &args)?;
            return Ok(());
        }
        if self.match_token(&Token::LeftParen) {
            let result = self.env.symbols.retrieve(name);
            let array = self.env.located(result)?;
            let indices = self.parse_arguments(&Token::RightParen)?;
            self.expect(&Token::RightParen, "')'")?;
            self.expect(&Token::Equal, "'='")?;
            let value = self.parse_expression()?;
            return self.env.assign_element(array, &indices, value);
        }
        self.expect(&Token::Equal, "'='")?;
        let value = self.parse_expression()?;
        if self.bind_resource(name, value) {
            return Ok(());
        }
        let target = self.env.assignment_target(name)?;
        self.env.assign(target, value)
    }

    fn parse_wait(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Wait, "WAIT")?;
        if self.match_word("KEY") {
            self.env.wait_key()
        } else if self.match_word("VBL") {
            self.env.wait_vbl()
        } else if self.match_token(&Token::Parallel) || self.match_token(&Token::Thread) {
            let thread = self.parse_expression()?;
            self.env.wait_parallel(thread)
        } else {
            Err(self.unexpected("KEY, VBL or PARALLEL"))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::codegen::testing::{c64, calls, code};
    use crate::environment::Environment;
    use crate::error::{CompileError, ErrorCode};
    use crate::parser::parse_program;
    use crate::symbols::ConstantValue;
    use crate::types::VariableType;
    use pretty_assertions::assert_eq;

    fn compile(source: &str) -> Result<Environment, CompileError> {
        let mut env = c64();
        parse_program(&mut env, source)?;
        Ok(env)
    }

    fn type_of(env: &Environment, name: &str) -> VariableType {
        let id = env.symbols.lookup(name).unwrap();
        env.symbols.variable(id).var_type
    }

    #[test]
    fn test_byte_assignment_and_print() {
        let env = compile("DIM A AS BYTE : A = 10 : PRINT A").unwrap();
        let lines = code(&env);
        assert_eq!(lines[0], "LDA #$0A");
        assert_eq!(lines[1], "STA _A");
        assert_eq!(calls(&env, "PRINTN8"), 1);
    }

    #[test]
    fn test_dim_list_and_implicit_types() {
        let env = compile("DIM a AS WORD, s$, n").unwrap();
        assert_eq!(type_of(&env, "A"), VariableType::Word);
        assert_eq!(type_of(&env, "S$"), VariableType::DString);
        assert_eq!(type_of(&env, "N"), VariableType::SWord);
    }

    #[test]
    fn test_dim_with_initializer_is_static() {
        let env = compile("DIM x AS BYTE = 42").unwrap();
        let id = env.symbols.lookup("X").unwrap();
        assert_eq!(env.symbols.variable(id).value, Some(42));
        assert!(code(&env).is_empty());
    }

    #[test]
    fn test_dim_at_address() {
        let env = compile("DIM border AS BYTE AT $D020\nDIM frame AS BYTE AT $D020\nborder = 2").unwrap();
        let id = env.symbols.lookup("BORDER").unwrap();
        assert_eq!(env.symbols.variable(id).absolute_address, Some(0xD020));
        assert_eq!(env.symbols.variable(id).area, None);
        let frame = env.symbols.lookup("FRAME").unwrap();
        assert_eq!(env.symbols.variable(frame).absolute_address, Some(0xD020));
    }

    #[test]
    fn test_array_declarations() {
        let env = compile("DIM t(3) AS BYTE = #{1, 2, 3}\nDIM u AS WORD (2, 4)").unwrap();
        let t = env.symbols.lookup("T").unwrap();
        assert!(env.symbols.variable(t).array.is_some());
        let u = env.symbols.lookup("U").unwrap();
        assert_eq!(env.symbols.variable(u).array.as_ref().unwrap().dimensions, vec![2, 4]);
    }

    #[test]
    fn test_array_initializer_count() {
        let err = compile("DIM t(3) AS BYTE = #{1, 2}").unwrap_err();
        assert_eq!(err.code, ErrorCode::ArrayInitCountMismatch);
    }

    #[test]
    fn test_const_defines_constant() {
        let env = compile("CONST limit = 2 * 50").unwrap();
        assert_eq!(
            env.symbols.constant("LIMIT").map(|c| c.value.clone()),
            Some(ConstantValue::Integer(100))
        );
    }

    #[test]
    fn test_const_needs_compile_time_value() {
        let err = compile("DIM a AS BYTE\nCONST c = a").unwrap_err();
        assert_eq!(err.code, ErrorCode::ValueOutOfRange);
    }

    #[test]
    fn test_constant_cannot_be_assigned() {
        let err = compile("CONST c = 1\nc = 2").unwrap_err();
        assert_eq!(err.code, ErrorCode::ReadOnlyVariable);
    }

    #[test]
    fn test_explicit_option_rejects_undeclared() {
        let err = compile("OPTION EXPLICIT\nx = 1").unwrap_err();
        assert_eq!(err.code, ErrorCode::UndefinedVariable);
    }

    #[test]
    fn test_inc_dec_and_poke() {
        let env = compile("DIM a AS BYTE\nINC a\nDEC a\nPOKE 53280, 0").unwrap();
        let lines = code(&env);
        assert!(lines.contains(&"INC _A".to_string()));
        assert!(lines.contains(&"DEC _A".to_string()));
    }

    #[test]
    fn test_print_separators() {
        let env = compile("PRINT \"A\"; \"B\",").unwrap();
        assert_eq!(calls(&env, "PRINTSTR"), 2);
        assert_eq!(calls(&env, "TEXTTAB"), 1);
        assert_eq!(calls(&env, "TEXTNEWLINE"), 0);
    }

    #[test]
    fn test_print_needs_separators() {
        let err = compile("PRINT 1 2").unwrap_err();
        assert_eq!(err.code, ErrorCode::SyntaxError);
    }

    #[test]
    fn test_wait_forms() {
        let env = compile("WAIT KEY").unwrap();
        assert_eq!(calls(&env, "WAITKEY"), 1);
        assert_eq!(compile("WAIT FOREVER").unwrap_err().code, ErrorCode::SyntaxError);
    }

    #[test]
    fn test_unknown_statement() {
        let err = compile("THEN").unwrap_err();
        assert_eq!(err.code, ErrorCode::SyntaxError);
    }
}
