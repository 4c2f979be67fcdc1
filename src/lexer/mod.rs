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

//! Lexical analysis for ugBASIC.
//!
//! The tokenizer is generated by `logos` from the definitions in
//! [`tokens`]. This module turns its output into `(Token, Span)` pairs
//! and maps tokenizer failures to numbered compile errors.

mod tokens;

pub use tokens::{LexError, Token};

use crate::error::{CompileError, ErrorCode, Span};
use logos::Logos;

/// Tokenize source code into a vector of tokens with spans.
///
/// The result always ends with a `Newline` so that the last statement
/// is terminated like every other.
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>, CompileError> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = Span::from_range(lexer.span());
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(error) => return Err(lex_error(error, lexer.slice(), span)),
        }
    }

    if !matches!(tokens.last(), Some((Token::Newline, _))) {
        tokens.push((Token::Newline, Span::new(source.len(), source.len())));
    }

    Ok(tokens)
}

fn lex_error(error: LexError, slice: &str, span: Span) -> CompileError {
    match error {
        LexError::InvalidCharacter => CompileError::new(
            ErrorCode::InvalidCharacter,
            format!("invalid character '{}'", slice),
            span,
        ),
        LexError::UnterminatedString => CompileError::new(
            ErrorCode::UnterminatedString,
            "unterminated string",
            span,
        )
        .with_hint("close the string with '\"' before the end of the line"),
        LexError::NumberTooLarge => CompileError::new(
            ErrorCode::ValueOutOfRange,
            format!("number {} does not fit in 32 bits", slice),
            span,
        ),
    }
}

/// Check the BASIC 10 Liner rules: at most ten lines of at most 256 characters.
pub fn check_ten_liner(source: &str) -> Result<(), CompileError> {
    let mut offset = 0;
    let mut lines = 0;
    for line in source.split('\n') {
        let span = Span::new(offset, offset + line.len());
        offset += line.len() + 1;
        if line.trim().is_empty() {
            continue;
        }
        lines += 1;
        if lines > 10 {
            return Err(CompileError::new(
                ErrorCode::TenLinerViolation,
                "a 10 liner program cannot have more than 10 lines",
                span,
            ));
        }
        if line.trim_end().chars().count() > 256 {
            return Err(CompileError::new(
                ErrorCode::TenLinerViolation,
                "a 10 liner line cannot be longer than 256 characters",
                span,
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_statement() {
        let tokens = tokenize("DIM A AS BYTE : A = 10 : PRINT A").unwrap();
        let kinds: Vec<Token> = tokens.into_iter().map(|(t, _)| t).collect();
        assert_eq!(
            kinds,
            vec![
                Token::Dim,
                Token::Identifier("A".to_string()),
                Token::As,
                Token::Byte,
                Token::Colon,
                Token::Identifier("A".to_string()),
                Token::Equal,
                Token::Integer(10),
                Token::Colon,
                Token::Print,
                Token::Identifier("A".to_string()),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_spans() {
        let tokens = tokenize("A = $FF").unwrap();
        assert_eq!(tokens[0].1, Span::new(0, 1));
        assert_eq!(tokens[2].1, Span::new(4, 7));
    }

    #[test]
    fn test_string_literal() {
        let tokens = tokenize("PRINT \"HELLO, WORLD\"").unwrap();
        assert_eq!(tokens[1].0, Token::String("HELLO, WORLD".to_string()));
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("PRINT \"OOPS\nPRINT 1").unwrap_err();
        assert_eq!(err.code, ErrorCode::UnterminatedString);
    }

    #[test]
    fn test_invalid_character() {
        let err = tokenize("A = 1 ~ 2").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCharacter);
        assert_eq!(err.span, Span::new(6, 7));
    }

    #[test]
    fn test_number_too_large() {
        let err = tokenize("A = 99999999999").unwrap_err();
        assert_eq!(err.code, ErrorCode::ValueOutOfRange);
    }

    #[test]
    fn test_operators() {
        let tokens = tokenize("<> <= >= < > =").unwrap();
        let kinds: Vec<Token> = tokens.into_iter().map(|(t, _)| t).collect();
        assert_eq!(
            kinds,
            vec![
                Token::NotEqual,
                Token::LessEqual,
                Token::GreaterEqual,
                Token::Less,
                Token::Greater,
                Token::Equal,
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_ten_liner() {
        assert!(check_ten_liner("1 PRINT 1\n2 PRINT 2\n").is_ok());
        let long: String = (0..11).map(|i| format!("{} CLS\n", i)).collect();
        assert_eq!(
            check_ten_liner(&long).unwrap_err().code,
            ErrorCode::TenLinerViolation
        );
    }
}
