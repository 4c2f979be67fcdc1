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

//! Type names and parameter lists.

use super::helpers::ParserHelpers;
use super::Parser;
use crate::codegen::implicit_type;
use crate::error::{CompileError, ErrorCode};
use crate::lexer::Token;
use crate::symbols::Parameter;
use crate::types::VariableType;

/// Trait for type parsing operations.
pub trait TypeParser {
    /// Parse a type name such as `BYTE`, `SIGNED WORD` or `IMAGE`.
    fn parse_type(&mut self) -> Result<VariableType, CompileError>;

    /// Parse an optional `AS type` clause.
    fn parse_optional_type(&mut self) -> Result<Option<VariableType>, CompileError>;

    /// Parse `[name [AS type], ...]`; an absent list has no parameters.
    fn parse_parameters(&mut self) -> Result<Vec<Parameter>, CompileError>;

    /// Parse `[name AS type ON register, ...]` of `DECLARE PROC`.
    fn parse_register_parameters(&mut self) -> Result<Vec<Parameter>, CompileError>;
}

impl<'a> Parser<'a> {
    fn signedness(&mut self) -> Option<bool> {
        if self.match_token(&Token::Signed) {
            Some(true)
        } else if self.match_token(&Token::Unsigned) {
            Some(false)
        } else {
            None
        }
    }

    fn parameter(&mut self, ty_required: bool) -> Result<Parameter, CompileError> {
        let name = self.expect_identifier("a parameter name")?.to_ascii_uppercase();
        let ty = match self.parse_optional_type()? {
            Some(ty) => ty,
            None if ty_required => return Err(self.unexpected("AS")),
            None => implicit_type(&name),
        };
        Ok(Parameter::new(name, ty, self.env.precision()))
    }
}

impl<'a> TypeParser for Parser<'a> {
    fn parse_type(&mut self) -> Result<VariableType, CompileError> {
        let signed = self.signedness();
        let span = self.peek_span().unwrap_or_else(|| self.previous_span());
        let (token, _) = self
            .advance()
            .ok_or_else(|| self.unexpected("a type"))?;
        let word = match &token {
            Token::Identifier(name) => Some(name.as_str()),
            Token::IntegerType if signed.is_some() => Some("WORD"),
            Token::Long if signed.is_some() => Some("DWORD"),
            other => other.keyword(),
        };
        let ty = word
            .and_then(VariableType::from_keyword)
            .ok_or_else(|| {
                CompileError::new(
                    ErrorCode::UnknownType,
                    format!("unknown type {}", token),
                    span,
                )
            })?;
        Ok(match signed {
            Some(true) if ty.is_integer() => ty.signed(),
            Some(false) if ty.is_integer() => ty.unsigned(),
            Some(_) => {
                return Err(CompileError::new(
                    ErrorCode::UnknownType,
                    format!("{} cannot be signed or unsigned", ty),
                    span,
                ))
            }
            None => ty,
        })
    }

    fn parse_optional_type(&mut self) -> Result<Option<VariableType>, CompileError> {
        if self.match_token(&Token::As) {
            return self.parse_type().map(Some);
        }
        Ok(None)
    }

    fn parse_parameters(&mut self) -> Result<Vec<Parameter>, CompileError> {
        let mut parameters = Vec::new();
        if !self.match_token(&Token::LeftBracket) {
            return Ok(parameters);
        }
        if !self.match_token(&Token::RightBracket) {
            loop {
                parameters.push(self.parameter(false)?);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::RightBracket, "']'")?;
        }
        Ok(parameters)
    }

    fn parse_register_parameters(&mut self) -> Result<Vec<Parameter>, CompileError> {
        let mut parameters = Vec::new();
        if !self.match_token(&Token::LeftBracket) {
            return Ok(parameters);
        }
        if !self.match_token(&Token::RightBracket) {
            loop {
                let mut parameter = self.parameter(true)?;
                self.expect(&Token::On, "ON")?;
                parameter.register = Some(self.expect_identifier("a register")?.to_ascii_uppercase());
                parameters.push(parameter);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::RightBracket, "']'")?;
        }
        Ok(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::testing::c64;
    use crate::lexer::tokenize;

    fn type_of(source: &str) -> Result<VariableType, CompileError> {
        let tokens = tokenize(source).unwrap();
        let mut env = c64();
        let mut parser = Parser::new(&tokens, &mut env, source);
        parser.parse_type()
    }

    #[test]
    fn test_simple_types() {
        assert_eq!(type_of("BYTE").unwrap(), VariableType::Byte);
        assert_eq!(type_of("INTEGER").unwrap(), VariableType::SWord);
        assert_eq!(type_of("STRING").unwrap(), VariableType::DString);
        assert_eq!(type_of("IMAGE").unwrap(), VariableType::Image);
        assert_eq!(type_of("sword").unwrap(), VariableType::SWord);
    }

    #[test]
    fn test_signedness_prefix() {
        assert_eq!(type_of("SIGNED BYTE").unwrap(), VariableType::SByte);
        assert_eq!(type_of("UNSIGNED INTEGER").unwrap(), VariableType::Word);
        assert_eq!(type_of("SIGNED LONG").unwrap(), VariableType::SDWord);
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(type_of("WIDGET").unwrap_err().code, ErrorCode::UnknownType);
        assert_eq!(type_of("SIGNED FLOAT").unwrap_err().code, ErrorCode::UnknownType);
    }

    #[test]
    fn test_parameter_lists() {
        let source = "[x, y AS BYTE, n$]";
        let tokens = tokenize(source).unwrap();
        let mut env = c64();
        let mut parser = Parser::new(&tokens, &mut env, source);
        let parameters = parser.parse_parameters().unwrap();
        let types: Vec<_> = parameters.iter().map(|p| p.var_type).collect();
        assert_eq!(
            types,
            vec![VariableType::SWord, VariableType::Byte, VariableType::DString]
        );
        assert_eq!(parameters[0].name, "X");
    }

    #[test]
    fn test_register_parameters_need_types() {
        let source = "[a AS BYTE ON A, p AS ADDRESS ON x]";
        let tokens = tokenize(source).unwrap();
        let mut env = c64();
        let mut parser = Parser::new(&tokens, &mut env, source);
        let parameters = parser.parse_register_parameters().unwrap();
        assert_eq!(parameters[1].register.as_deref(), Some("X"));

        let source = "[a ON A]";
        let tokens = tokenize(source).unwrap();
        let mut parser = Parser::new(&tokens, &mut env, source);
        assert!(parser.parse_register_parameters().is_err());
    }
}
