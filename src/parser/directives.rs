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

//! OPTION and DEFINE: compiler settings changed from the program.
//!
//! Settings take effect for the statements that follow them.

use super::expressions::ExpressionParser;
use super::helpers::ParserHelpers;
use super::Parser;
use crate::config::GammaCorrection;
use crate::error::{CompileError, ErrorCode};
use crate::lexer::Token;
use crate::types::FloatPrecision;

/// Trait for directive parsing operations.
pub trait DirectiveParser {
    /// `OPTION EXPLICIT [ON|OFF]`, `OPTION CLIP`, `OPTION READ SAFE`.
    fn parse_option(&mut self) -> Result<(), CompileError>;

    /// `DEFINE FLOAT ...`, `DEFINE STRING ...`, `DEFINE INPUT ...`,
    /// `DEFINE DOUBLE BUFFER ...`, `DEFINE PALETTE GAMMA ...`.
    fn parse_define(&mut self) -> Result<(), CompileError>;
}

impl<'a> Parser<'a> {
    /// Optional `ON` / `OFF`, on when absent.
    fn switch(&mut self) -> bool {
        if self.match_token(&Token::Off) {
            return false;
        }
        self.match_token(&Token::On);
        true
    }

    fn bounded(&mut self, what: &str, max: i64) -> Result<i64, CompileError> {
        let value = self.parse_constant(what)?;
        if !(1..=max).contains(&value) {
            return Err(self.env.error(
                ErrorCode::InvalidOption,
                format!("{} must be between 1 and {}, found {}", what, max, value),
            ));
        }
        Ok(value)
    }

    fn invalid_option(&self, expected: &str) -> CompileError {
        let found = self.peek().map_or("end of line".to_string(), |t| t.name());
        self.error(
            ErrorCode::InvalidOption,
            format!("expected {}, found {}", expected, found),
        )
    }
}

impl<'a> DirectiveParser for Parser<'a> {
    fn parse_option(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Option, "OPTION")?;
        if self.match_word("EXPLICIT") {
            self.env.options.explicit = self.switch();
        } else if self.match_word("CLIP") {
            self.env.options.clip = self.switch();
        } else if self.match_token(&Token::Read) {
            self.expect_word("SAFE")?;
            self.env.options.read_safe = self.switch();
        } else {
            return Err(self.invalid_option("EXPLICIT, CLIP or READ SAFE"));
        }
        Ok(())
    }

    fn parse_define(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Define, "DEFINE")?;
        match self.peek() {
            Some(Token::FloatType) => {
                self.advance();
                self.env.options.float_precision = if self.match_word("FASTER") {
                    FloatPrecision::Fast
                } else if self.match_word("PRECISION") {
                    FloatPrecision::Single
                } else {
                    return Err(self.invalid_option("FASTER or PRECISION"));
                };
            }
            Some(Token::StringType) => {
                self.advance();
                if self.match_word("COUNT") {
                    self.env.options.dstring.count = self.bounded("STRING COUNT", 255)? as u16;
                } else if self.match_word("SPACE") {
                    self.env.options.dstring.space = self.bounded("STRING SPACE", 32767)? as u16;
                } else {
                    return Err(self.invalid_option("COUNT or SPACE"));
                }
            }
            Some(token) if token.is_word("INPUT") => {
                self.advance();
                if self.match_word("SIZE") {
                    self.env.options.input.size = self.bounded("INPUT SIZE", 255)? as u8;
                } else if self.match_word("SEPARATOR") {
                    let separator = self.bounded("INPUT SEPARATOR", 255)?;
                    self.env.options.input.separator = separator as u8;
                } else {
                    return Err(self.invalid_option("SIZE or SEPARATOR"));
                }
            }
            Some(token) if token.is_word("DOUBLE") => {
                self.advance();
                self.expect(&Token::Buffer, "BUFFER")?;
                self.env.options.double_buffer = self.switch();
            }
            Some(token) if token.is_word("PALETTE") => {
                self.advance();
                self.expect_word("GAMMA")?;
                self.env.options.gamma = if self.match_word("NONE") {
                    GammaCorrection::None
                } else if self.match_word("DEVULDER") {
                    GammaCorrection::Devulder
                } else if self.match_word("FLORENZI") {
                    GammaCorrection::Florenzi
                } else {
                    return Err(self.invalid_option("NONE, DEVULDER or FLORENZI"));
                };
            }
            _ => return Err(self.invalid_option("FLOAT, STRING, INPUT, DOUBLE BUFFER or PALETTE")),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::codegen::testing::c64;
    use crate::config::GammaCorrection;
    use crate::environment::Environment;
    use crate::error::{CompileError, ErrorCode};
    use crate::parser::parse_program;
    use crate::types::{FloatPrecision, VariableType};
    use test_case::test_case;

    fn compile(source: &str) -> Result<Environment, CompileError> {
        let mut env = c64();
        parse_program(&mut env, source)?;
        Ok(env)
    }

    #[test]
    fn test_options_switch() {
        let env = compile("OPTION EXPLICIT\nOPTION CLIP\nOPTION READ SAFE").unwrap();
        assert!(env.options.explicit && env.options.clip && env.options.read_safe);
        let env = compile("OPTION EXPLICIT ON\nOPTION EXPLICIT OFF\nx = 1").unwrap();
        assert!(!env.options.explicit);
    }

    #[test]
    fn test_define_values() {
        let source = "DEFINE STRING COUNT 64\nDEFINE STRING SPACE 2048\nDEFINE DOUBLE BUFFER ON\nDEFINE PALETTE GAMMA FLORENZI\nDEFINE INPUT SIZE 10";
        let env = compile(source).unwrap();
        assert_eq!(env.options.dstring.count, 64);
        assert_eq!(env.options.dstring.space, 2048);
        assert!(env.options.double_buffer);
        assert_eq!(env.options.gamma, GammaCorrection::Florenzi);
        assert_eq!(env.options.input.size, 10);
    }

    #[test]
    fn test_float_precision_applies_to_later_variables() {
        let env = compile("DEFINE FLOAT PRECISION\nDIM f AS FLOAT").unwrap();
        assert_eq!(env.options.float_precision, FloatPrecision::Single);
        let f = env.symbols.lookup("F").unwrap();
        assert_eq!(env.symbols.variable(f).var_type, VariableType::Float);
        assert_eq!(env.symbols.variable(f).precision, FloatPrecision::Single);
    }

    #[test_case("OPTION FAST" ; "unknown option")]
    #[test_case("DEFINE FLOAT SLOW" ; "unknown precision")]
    #[test_case("DEFINE STRING COUNT 0" ; "string count out of range")]
    #[test_case("DEFINE PALETTE GAMMA SRGB" ; "unknown gamma")]
    #[test_case("DEFINE COLORS 4" ; "unknown define")]
    fn test_invalid_directives(source: &str) {
        assert_eq!(compile(source).unwrap_err().code, ErrorCode::InvalidOption);
    }
}
