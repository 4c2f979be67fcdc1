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

//! Token stream navigation and error creation for the parser.

use super::Parser;
use crate::error::{CompileError, ErrorCode, Span};
use crate::lexer::Token;

/// Trait for parser helper operations.
pub trait ParserHelpers {
    /// Check if we've reached the end of the token stream.
    fn is_at_end(&self) -> bool;

    /// Peek at the current token without advancing.
    fn peek(&self) -> Option<&Token>;

    /// Peek at the current token's span.
    fn peek_span(&self) -> Option<Span>;

    /// Peek at a token ahead by n positions.
    fn peek_ahead(&self, n: usize) -> Option<&Token>;

    /// Get the previous token's span (for error reporting).
    fn previous_span(&self) -> Span;

    /// Advance to the next token and return the current one.
    fn advance(&mut self) -> Option<(Token, Span)>;

    /// Check if the current token matches the expected type.
    fn check(&self, expected: &Token) -> bool;

    /// Consume the current token if it matches the expected type.
    fn match_token(&mut self, expected: &Token) -> bool;

    /// Expect the current token to match, or return an error.
    fn expect(&mut self, expected: &Token, message: &str) -> Result<Span, CompileError>;

    /// Check for the unreserved word `word` (`FLIP`, `BORDER`, ...).
    fn check_word(&self, word: &str) -> bool;

    /// Consume the unreserved word `word` if present.
    fn match_word(&mut self, word: &str) -> bool;

    fn expect_word(&mut self, word: &str) -> Result<(), CompileError>;

    /// Consume an identifier and return its spelling.
    fn expect_identifier(&mut self, what: &str) -> Result<String, CompileError>;

    /// Consume a string literal.
    fn expect_string(&mut self, what: &str) -> Result<String, CompileError>;

    /// Consume an integer literal, optionally negated.
    fn expect_integer(&mut self, what: &str) -> Result<i64, CompileError>;

    /// Whether the current statement has no more tokens.
    fn at_statement_end(&self) -> bool;

    /// Skip newlines.
    fn skip_newlines(&mut self);

    /// Create an error at the current position.
    fn error(&self, code: ErrorCode, message: impl Into<String>) -> CompileError;

    /// A syntax error naming what was expected and what was found.
    fn unexpected(&self, expected: &str) -> CompileError;
}

impl<'a> ParserHelpers for Parser<'a> {
    fn is_at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Option<Span> {
        self.tokens.get(self.position).map(|(_, s)| *s)
    }

    fn peek_ahead(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.position + n).map(|(t, _)| t)
    }

    fn previous_span(&self) -> Span {
        if self.position > 0 {
            self.tokens[self.position - 1].1
        } else if !self.tokens.is_empty() {
            self.tokens[0].1
        } else {
            Span::new(0, 0)
        }
    }

    fn advance(&mut self) -> Option<(Token, Span)> {
        let result = self.tokens.get(self.position).cloned();
        if result.is_some() {
            self.position += 1;
        }
        result
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek()
            .is_some_and(|t| std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    fn match_token(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, message: &str) -> Result<Span, CompileError> {
        match self.advance() {
            Some((token, span))
                if std::mem::discriminant(&token) == std::mem::discriminant(expected) =>
            {
                Ok(span)
            }
            _ => {
                self.position = self.position.saturating_sub(1);
                Err(self.unexpected(message))
            }
        }
    }

    fn check_word(&self, word: &str) -> bool {
        self.peek().is_some_and(|t| t.is_word(word))
    }

    fn match_word(&mut self, word: &str) -> bool {
        if self.check_word(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_word(&mut self, word: &str) -> Result<(), CompileError> {
        if self.match_word(word) {
            Ok(())
        } else {
            Err(self.unexpected(word))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, CompileError> {
        match self.peek() {
            Some(Token::Identifier(name)) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn expect_string(&mut self, what: &str) -> Result<String, CompileError> {
        match self.peek() {
            Some(Token::String(value)) => {
                let value = value.clone();
                self.advance();
                Ok(value)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn expect_integer(&mut self, what: &str) -> Result<i64, CompileError> {
        let negative = self.match_token(&Token::Minus);
        match self.peek() {
            Some(Token::Integer(value)) => {
                let value = *value;
                self.advance();
                Ok(if negative { -value } else { value })
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn at_statement_end(&self) -> bool {
        match self.peek() {
            None => true,
            Some(token) => token.is_statement_end() || matches!(token, Token::Else | Token::EndIf),
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&Token::Newline) {
            self.advance();
        }
    }

    fn error(&self, code: ErrorCode, message: impl Into<String>) -> CompileError {
        let span = self.peek_span().unwrap_or_else(|| self.previous_span());
        CompileError::new(code, message, span)
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        let found = self
            .peek()
            .map_or("end of file".to_string(), |t| t.name());
        self.error(
            ErrorCode::SyntaxError,
            format!("expected {}, found {}", expected, found),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::testing::c64;
    use crate::lexer::tokenize;

    #[test]
    fn test_navigation() {
        let tokens = tokenize("PRINT A, 1").unwrap();
        let mut env = c64();
        let mut parser = Parser::new(&tokens, &mut env, "PRINT A, 1");
        assert!(parser.check(&Token::Print));
        assert!(parser.match_token(&Token::Print));
        assert_eq!(parser.expect_identifier("a name").unwrap(), "A");
        assert!(parser.expect(&Token::Colon, "':'").is_err());
        assert!(parser.match_token(&Token::Comma));
        assert_eq!(parser.expect_integer("a number").unwrap(), 1);
        assert!(parser.at_statement_end());
    }

    #[test]
    fn test_unexpected_names_the_token() {
        let tokens = tokenize("LOCATE \"x\"").unwrap();
        let mut env = c64();
        let mut parser = Parser::new(&tokens, &mut env, "LOCATE \"x\"");
        parser.advance();
        let err = parser.expect_identifier("a name").unwrap_err();
        assert_eq!(err.code, ErrorCode::SyntaxError);
        assert_eq!(err.message, "expected a name, found string \"x\"");
    }

    #[test]
    fn test_words_ignore_case() {
        let tokens = tokenize("border").unwrap();
        let mut env = c64();
        let mut parser = Parser::new(&tokens, &mut env, "border");
        assert!(parser.match_word("BORDER"));
        assert!(parser.expect_word("BORDER").is_err());
    }
}
