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

//! Expression parsing.
//!
//! Every level evaluates its operands left to right and hands them to the
//! code generator, which folds constants and returns the variable holding
//! the result.
//!
//! Precedence, loosest first:
//! 1. `OR`, `XOR`
//! 2. `AND`
//! 3. `NOT`
//! 4. comparisons (`=`, `<>`, `<`, `<=`, `>`, `>=`)
//! 5. `+`, `-`
//! 6. `*`, `/`, `MOD`
//! 7. `^`
//! 8. unary `-` and `+`

use super::helpers::ParserHelpers;
use super::media::MediaParser;
use super::Parser;
use crate::backend::{Comparison, LogicOp};
use crate::codegen::{
    ArithmeticEmitter, ArrayEmitter, ComparisonEmitter, ConversionEmitter, GraphicsEmitter,
    ProcedureEmitter, StringEmitter, TextEmitter, ThreadEmitter, UnaryEmitter, VariableEmitter,
};
use crate::error::{CompileError, ErrorCode};
use crate::lexer::Token;
use crate::symbols::VariableId;
use crate::types::VariableType;

/// Trait for expression parsing operations.
pub trait ExpressionParser {
    /// Parse a complete expression.
    fn parse_expression(&mut self) -> Result<VariableId, CompileError>;

    /// Parse comma separated expressions up to (not including) `close`.
    fn parse_arguments(&mut self, close: &Token) -> Result<Vec<VariableId>, CompileError>;

    /// Parse `[args]` after a procedure name; absent brackets mean no arguments.
    fn parse_call_arguments(&mut self) -> Result<Vec<VariableId>, CompileError>;

    /// Parse an expression that must be known at compile time.
    fn parse_constant(&mut self, what: &str) -> Result<i64, CompileError>;

    /// Parse an expression that must be a string literal or string constant.
    fn parse_static_string(&mut self, what: &str) -> Result<String, CompileError>;
}

impl<'a> Parser<'a> {
    fn parse_or(&mut self) -> Result<VariableId, CompileError> {
        let mut left = self.parse_and()?;
        loop {
            let op = if self.match_token(&Token::Or) {
                LogicOp::Or
            } else if self.match_token(&Token::Xor) {
                LogicOp::Xor
            } else {
                return Ok(left);
            };
            let right = self.parse_and()?;
            left = self.env.logic(op, left, right)?;
        }
    }

    fn parse_and(&mut self) -> Result<VariableId, CompileError> {
        let mut left = self.parse_not()?;
        while self.match_token(&Token::And) {
            let right = self.parse_not()?;
            left = self.env.logic(LogicOp::And, left, right)?;
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<VariableId, CompileError> {
        if self.match_token(&Token::Not) {
            let operand = self.parse_not()?;
            return self.env.not(operand);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<VariableId, CompileError> {
        let left = self.parse_additive()?;
        let cmp = match self.peek() {
            Some(Token::Equal) => Comparison::Eq,
            Some(Token::NotEqual) => Comparison::Ne,
            Some(Token::Less) => Comparison::Lt,
            Some(Token::LessEqual) => Comparison::Le,
            Some(Token::Greater) => Comparison::Gt,
            Some(Token::GreaterEqual) => Comparison::Ge,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_additive()?;
        self.env.compare(cmp, left, right)
    }

    fn parse_additive(&mut self) -> Result<VariableId, CompileError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            if self.match_token(&Token::Plus) {
                let right = self.parse_multiplicative()?;
                left = self.env.add(left, right)?;
            } else if self.match_token(&Token::Minus) {
                let right = self.parse_multiplicative()?;
                left = self.env.sub(left, right)?;
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_multiplicative(&mut self) -> Result<VariableId, CompileError> {
        let mut left = self.parse_power()?;
        loop {
            let (token, _) = match self.peek() {
                Some(Token::Star | Token::Slash | Token::Mod) => {
                    self.advance().ok_or_else(|| self.unexpected("an operator"))?
                }
                _ => return Ok(left),
            };
            let right = self.parse_power()?;
            left = match token {
                Token::Star => self.env.mul(left, right)?,
                Token::Slash => self.env.div(left, right)?,
                _ => self.env.modulo(left, right)?,
            };
        }
    }

    fn parse_power(&mut self) -> Result<VariableId, CompileError> {
        let mut left = self.parse_unary()?;
        while self.match_token(&Token::Caret) {
            let right = self.parse_unary()?;
            left = self.env.power(left, right)?;
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<VariableId, CompileError> {
        if self.match_token(&Token::Minus) {
            let operand = self.parse_unary()?;
            return self.env.negate(operand);
        }
        if self.match_token(&Token::Plus) {
            return self.parse_unary();
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<VariableId, CompileError> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected("an expression"));
        };
        match token {
            Token::Integer(value) => {
                self.advance();
                Ok(self.env.integer_constant(value))
            }
            Token::Float(value) => {
                self.advance();
                Ok(self.env.float_constant(value))
            }
            Token::String(value) => {
                self.advance();
                Ok(self.env.string_constant(&value))
            }
            Token::LeftParen => {
                self.advance();
                let value = self.parse_expression()?;
                self.expect(&Token::RightParen, "')'")?;
                Ok(value)
            }
            Token::Load => self.parse_load(),
            Token::Spawn => {
                self.advance();
                let name = self.expect_identifier("a procedure name")?.to_ascii_uppercase();
                let args = self.parse_call_arguments()?;
                self.env.spawn(&name, &args)
            }
            Token::Thread => {
                self.advance();
                self.expect_word("ID")?;
                self.env.thread_id()
            }
            Token::Identifier(name) => {
                self.advance();
                let name = name.to_ascii_uppercase();
                if let Some(value) = self.parse_builtin(&name)? {
                    return Ok(value);
                }
                self.parse_name(&name)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    /// One parenthesized argument.
    fn single_argument(&mut self) -> Result<VariableId, CompileError> {
        self.expect(&Token::LeftParen, "'('")?;
        let value = self.parse_expression()?;
        self.expect(&Token::RightParen, "')'")?;
        Ok(value)
    }

    /// Exactly `count` parenthesized arguments.
    fn fixed_arguments(&mut self, name: &str, count: usize) -> Result<Vec<VariableId>, CompileError> {
        self.expect(&Token::LeftParen, "'('")?;
        let args = self.parse_arguments(&Token::RightParen)?;
        self.expect(&Token::RightParen, "')'")?;
        if args.len() != count {
            return Err(self.error(
                ErrorCode::WrongNumberOfParameters,
                format!("{} takes {} arguments, {} given", name, count, args.len()),
            ));
        }
        Ok(args)
    }

    /// Functions built into the language, `None` when `name` is not one.
    fn parse_builtin(&mut self, name: &str) -> Result<Option<VariableId>, CompileError> {
        let called = self.check(&Token::LeftParen);
        let value = match name {
            "TRUE" => self.env.typed_constant(255, VariableType::Byte),
            "FALSE" => self.env.typed_constant(0, VariableType::Byte),
            "INKEY$" => self.env.inkey()?,
            "RANDOM" => self.env.random(None)?,
            "TILE" => return self.parse_tile_query().map(Some),
            "RND" if called => {
                let max = self.single_argument()?;
                self.env.random(Some(max))?
            }
            "PEEK" if called => {
                let address = self.single_argument()?;
                self.env.peek(address)?
            }
            "LEN" if called => {
                let s = self.single_argument()?;
                self.env.len(s)?
            }
            "CHR$" if called => {
                let code = self.single_argument()?;
                self.env.chr(code)?
            }
            "ASC" if called => {
                let s = self.single_argument()?;
                self.env.asc(s)?
            }
            "STR$" if called => {
                let n = self.single_argument()?;
                self.env.str(n)?
            }
            "VAL" if called => {
                let s = self.single_argument()?;
                self.env.val(s)?
            }
            "INT" if called => {
                let n = self.single_argument()?;
                self.env.cast(n, VariableType::SWord)?
            }
            "RUNNING" if called => {
                let thread = self.single_argument()?;
                self.env.thread_running(thread)?
            }
            "LEFT$" if called => {
                let args = self.fixed_arguments(name, 2)?;
                self.env.left(args[0], args[1])?
            }
            "RIGHT$" if called => {
                let args = self.fixed_arguments(name, 2)?;
                self.env.right(args[0], args[1])?
            }
            "MID$" if called => {
                self.expect(&Token::LeftParen, "'('")?;
                let args = self.parse_arguments(&Token::RightParen)?;
                self.expect(&Token::RightParen, "')'")?;
                match args.as_slice() {
                    [s, position] => self.env.mid(*s, *position, None)?,
                    [s, position, length] => self.env.mid(*s, *position, Some(*length))?,
                    _ => {
                        return Err(self.error(
                            ErrorCode::WrongNumberOfParameters,
                            format!("MID$ takes 2 or 3 arguments, {} given", args.len()),
                        ))
                    }
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    /// `TILE CLASS(tileset, "class")`, `TILE PROBABILITY(tileset, id)`, `TILE ID(tileset, id)`.
    fn parse_tile_query(&mut self) -> Result<VariableId, CompileError> {
        let query = self
            .expect_identifier("CLASS, PROBABILITY or ID")?
            .to_ascii_uppercase();
        self.expect(&Token::LeftParen, "'('")?;
        let tileset = self.parse_expression()?;
        self.expect(&Token::Comma, "','")?;
        let value = match query.as_str() {
            "CLASS" => {
                let class = self.expect_string("a class name")?;
                self.env.tile_class(tileset, &class)?
            }
            "PROBABILITY" => {
                let id = self.parse_expression()?;
                self.env.tile_probability(tileset, id)?
            }
            "ID" => {
                let id = self.parse_expression()?;
                self.env.tile_id(tileset, id)?
            }
            _ => {
                return Err(CompileError::new(
                    ErrorCode::SyntaxError,
                    format!("expected CLASS, PROBABILITY or ID, found {}", query),
                    self.previous_span(),
                ))
            }
        };
        self.expect(&Token::RightParen, "')'")?;
        Ok(value)
    }

    /// A procedure call, an array element or a variable.
    fn parse_name(&mut self, name: &str) -> Result<VariableId, CompileError> {
        if self.check(&Token::LeftBracket) {
            let args = self.parse_call_arguments()?;
            return self.env.call_procedure(name, &args)?.ok_or_else(|| {
                self.env.error(
                    ErrorCode::TypeMismatch,
                    format!("procedure {} does not return a value", name),
                )
            });
        }
        if self.match_token(&Token::LeftParen) {
            let result = self.env.symbols.retrieve(name);
            let array = self.env.located(result)?;
            let indices = self.parse_arguments(&Token::RightParen)?;
            self.expect(&Token::RightParen, "')'")?;
            return self.env.array_element(array, &indices);
        }
        self.env.variable_reference(name)
    }
}

impl<'a> ExpressionParser for Parser<'a> {
    fn parse_expression(&mut self) -> Result<VariableId, CompileError> {
        self.parse_or()
    }

    fn parse_arguments(&mut self, close: &Token) -> Result<Vec<VariableId>, CompileError> {
        let mut args = Vec::new();
        if self.check(close) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if !self.match_token(&Token::Comma) {
                return Ok(args);
            }
        }
    }

    fn parse_call_arguments(&mut self) -> Result<Vec<VariableId>, CompileError> {
        if !self.match_token(&Token::LeftBracket) {
            return Ok(Vec::new());
        }
        let args = self.parse_arguments(&Token::RightBracket)?;
        self.expect(&Token::RightBracket, "']'")?;
        Ok(args)
    }

    fn parse_constant(&mut self, what: &str) -> Result<i64, CompileError> {
        let value = self.parse_expression()?;
        self.env.require_constant(value, what)
    }

    fn parse_static_string(&mut self, what: &str) -> Result<String, CompileError> {
        if let Some(Token::String(value)) = self.peek() {
            let value = value.clone();
            self.advance();
            return Ok(value);
        }
        let value = self.parse_expression()?;
        match self.env.constant_value_of(value) {
            Some(crate::symbols::ConstantValue::String(s)) => Ok(s),
            _ => Err(self.env.error(
                ErrorCode::StringExpected,
                format!("{} must be a constant string", what),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::testing::{c64, calls};
    use crate::environment::Environment;
    use crate::lexer::tokenize;

    fn evaluate(source: &str) -> (Environment, Result<VariableId, CompileError>) {
        let tokens = tokenize(source).unwrap();
        let mut env = c64();
        let result = {
            let mut parser = Parser::new(&tokens, &mut env, source);
            parser.parse_expression()
        };
        (env, result)
    }

    fn constant(source: &str) -> Option<i64> {
        let (env, result) = evaluate(source);
        env.constant_of(result.unwrap())
    }

    #[test]
    fn test_precedence() {
        assert_eq!(constant("1 + 2 * 3"), Some(7));
        assert_eq!(constant("(1 + 2) * 3"), Some(9));
        assert_eq!(constant("10 - 4 - 3"), Some(3));
        assert_eq!(constant("2 * 3 ^ 2"), Some(18));
        assert_eq!(constant("-2 ^ 2"), Some(4));
        assert_eq!(constant("10 MOD 4 + 1"), Some(3));
    }

    #[test]
    fn test_logic_binds_looser_than_arithmetic() {
        assert_eq!(constant("1 + 2 OR 4"), Some(7));
        assert_eq!(constant("6 AND 3 XOR 1"), Some(3));
    }

    #[test]
    fn test_comparison_produces_byte() {
        let (env, result) = evaluate("A < 10");
        let id = result.unwrap();
        assert_eq!(env.type_of(id), VariableType::Byte);
    }

    #[test]
    fn test_string_functions() {
        let (env, result) = evaluate("LEFT$(\"HELLO\", 2)");
        let id = result.unwrap();
        assert_eq!(
            env.constant_value_of(id),
            Some(crate::symbols::ConstantValue::String("HE".to_string()))
        );
    }

    #[test]
    fn test_mid_argument_count() {
        let (_, result) = evaluate("MID$(\"HELLO\")");
        assert_eq!(result.unwrap_err().code, ErrorCode::WrongNumberOfParameters);
    }

    #[test]
    fn test_rnd_calls_random_runtime() {
        let (env, result) = evaluate("RND(6)");
        result.unwrap();
        assert_eq!(calls(&env, "RANDOM"), 1);
    }

    #[test]
    fn test_builtin_name_without_parentheses_is_a_variable() {
        let (env, result) = evaluate("len");
        let id = result.unwrap();
        assert_eq!(env.symbols.variable(id).name, "LEN");
    }

    #[test]
    fn test_procedure_without_result() {
        let source = "noresult[]";
        let tokens = tokenize(source).unwrap();
        let mut env = c64();
        env.declare_external("NORESULT", 0xC000, Vec::new()).unwrap();
        let mut parser = Parser::new(&tokens, &mut env, source);
        assert_eq!(
            parser.parse_expression().unwrap_err().code,
            ErrorCode::TypeMismatch
        );
    }

    #[test]
    fn test_missing_operand() {
        let (_, result) = evaluate("1 +");
        assert_eq!(result.unwrap_err().code, ErrorCode::SyntaxError);
    }

    #[test]
    fn test_static_string_accepts_string_constants() {
        let source = "NAME";
        let tokens = tokenize(source).unwrap();
        let mut env = c64();
        env.define_constant("NAME", crate::symbols::ConstantValue::String("DATA.BIN".into()))
            .unwrap();
        let mut parser = Parser::new(&tokens, &mut env, source);
        assert_eq!(parser.parse_static_string("a file name").unwrap(), "DATA.BIN");
    }
}
