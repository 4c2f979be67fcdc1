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

//! Token definitions for ugBASIC.
//!
//! Keywords are case-insensitive. Identifiers keep their spelling and may
//! end with `$` to mark a string variable. Many command words (`FLIP`,
//! `ENABLE`, `AT`, ...) are not reserved: the parser recognizes them as
//! identifiers in context, so programs can still use them as names.

use logos::{Lexer, Logos};

/// Failure classes reported by the tokenizer.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LexError {
    #[default]
    InvalidCharacter,
    UnterminatedString,
    NumberTooLarge,
}

fn lex_string(lex: &mut Lexer<Token>) -> Result<String, LexError> {
    let rest = lex.remainder();
    match rest.find(['"', '\n']) {
        Some(end) if rest.as_bytes()[end] == b'"' => {
            let value = rest[..end].to_string();
            lex.bump(end + 1);
            Ok(value)
        }
        _ => {
            let end = rest.find('\n').unwrap_or(rest.len());
            lex.bump(end);
            Err(LexError::UnterminatedString)
        }
    }
}

fn lex_radix(lex: &mut Lexer<Token>, radix: u32) -> Result<i64, LexError> {
    let digits = &lex.slice()[1..];
    i64::from_str_radix(digits, radix)
        .ok()
        .filter(|v| *v <= 0xFFFF_FFFF)
        .ok_or(LexError::NumberTooLarge)
}

fn lex_decimal(lex: &mut Lexer<Token>) -> Result<i64, LexError> {
    lex.slice()
        .parse::<i64>()
        .ok()
        .filter(|v| *v <= 0xFFFF_FFFF)
        .ok_or(LexError::NumberTooLarge)
}

/// A token of ugBASIC source code.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexError)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r"'[^\n]*")]
#[logos(skip r"[Rr][Ee][Mm]([ \t][^\n]*)?")]
pub enum Token {
    // Literals
    #[regex("[0-9]+", lex_decimal)]
    #[regex(r"\$[0-9A-Fa-f]+", |lex| lex_radix(lex, 16))]
    #[regex("%[01]+", |lex| lex_radix(lex, 2))]
    Integer(i64),
    #[regex(r"[0-9]+\.[0-9]*", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),
    #[token("\"", lex_string)]
    String(String),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*\$?", |lex| lex.slice().to_string())]
    Identifier(String),

    // Statements
    #[token("print", ignore(ascii_case))]
    #[token("?")]
    Print,
    #[token("locate", ignore(ascii_case))]
    Locate,
    #[token("cls", ignore(ascii_case))]
    Cls,
    #[token("pen", ignore(ascii_case))]
    Pen,
    #[token("paper", ignore(ascii_case))]
    Paper,
    #[token("dim", ignore(ascii_case))]
    Dim,
    #[token("var", ignore(ascii_case))]
    Var,
    #[token("as", ignore(ascii_case))]
    As,
    #[token("const", ignore(ascii_case))]
    Const,
    #[token("let", ignore(ascii_case))]
    Let,
    #[token("if", ignore(ascii_case))]
    If,
    #[token("then", ignore(ascii_case))]
    Then,
    #[token("else", ignore(ascii_case))]
    Else,
    #[token("elseif", ignore(ascii_case))]
    ElseIf,
    #[token("endif", ignore(ascii_case))]
    EndIf,
    #[token("end", ignore(ascii_case))]
    End,
    #[token("for", ignore(ascii_case))]
    For,
    #[token("to", ignore(ascii_case))]
    To,
    #[token("step", ignore(ascii_case))]
    Step,
    #[token("next", ignore(ascii_case))]
    Next,
    #[token("do", ignore(ascii_case))]
    Do,
    #[token("loop", ignore(ascii_case))]
    Loop,
    #[token("while", ignore(ascii_case))]
    While,
    #[token("wend", ignore(ascii_case))]
    Wend,
    #[token("until", ignore(ascii_case))]
    Until,
    #[token("repeat", ignore(ascii_case))]
    Repeat,
    #[token("exit", ignore(ascii_case))]
    Exit,
    #[token("select", ignore(ascii_case))]
    Select,
    #[token("case", ignore(ascii_case))]
    Case,
    #[token("endselect", ignore(ascii_case))]
    EndSelect,
    #[token("goto", ignore(ascii_case))]
    Goto,
    #[token("gosub", ignore(ascii_case))]
    Gosub,
    #[token("return", ignore(ascii_case))]
    Return,
    #[token("on", ignore(ascii_case))]
    On,
    #[token("off", ignore(ascii_case))]
    Off,
    #[token("procedure", ignore(ascii_case))]
    Procedure,
    #[token("proc", ignore(ascii_case))]
    Proc,
    #[token("endproc", ignore(ascii_case))]
    EndProc,
    #[token("call", ignore(ascii_case))]
    Call,
    #[token("shared", ignore(ascii_case))]
    Shared,
    #[token("global", ignore(ascii_case))]
    Global,
    #[token("param", ignore(ascii_case))]
    Param,
    #[token("parallel", ignore(ascii_case))]
    Parallel,
    #[token("spawn", ignore(ascii_case))]
    Spawn,
    #[token("yield", ignore(ascii_case))]
    Yield,
    #[token("kill", ignore(ascii_case))]
    Kill,
    #[token("respawn", ignore(ascii_case))]
    Respawn,
    #[token("wait", ignore(ascii_case))]
    Wait,
    #[token("run", ignore(ascii_case))]
    Run,
    #[token("every", ignore(ascii_case))]
    Every,
    #[token("ticks", ignore(ascii_case))]
    Ticks,
    #[token("begin", ignore(ascii_case))]
    Begin,
    #[token("gameloop", ignore(ascii_case))]
    GameLoop,
    #[token("data", ignore(ascii_case))]
    Data,
    #[token("read", ignore(ascii_case))]
    Read,
    #[token("restore", ignore(ascii_case))]
    Restore,
    #[token("option", ignore(ascii_case))]
    Option,
    #[token("define", ignore(ascii_case))]
    Define,
    #[token("declare", ignore(ascii_case))]
    Declare,
    #[token("load", ignore(ascii_case))]
    Load,
    #[token("put", ignore(ascii_case))]
    Put,
    #[token("plot", ignore(ascii_case))]
    Plot,
    #[token("bitmap", ignore(ascii_case))]
    Bitmap,
    #[token("sprite", ignore(ascii_case))]
    Sprite,
    #[token("image", ignore(ascii_case))]
    Image,
    #[token("images", ignore(ascii_case))]
    Images,
    #[token("sequence", ignore(ascii_case))]
    Sequence,
    #[token("tiles", ignore(ascii_case))]
    Tiles,
    #[token("tileset", ignore(ascii_case))]
    Tileset,
    #[token("tilemap", ignore(ascii_case))]
    Tilemap,
    #[token("storage", ignore(ascii_case))]
    Storage,
    #[token("endstorage", ignore(ascii_case))]
    EndStorage,
    #[token("file", ignore(ascii_case))]
    File,
    #[token("dload", ignore(ascii_case))]
    Dload,
    #[token("volume", ignore(ascii_case))]
    Volume,
    #[token("play", ignore(ascii_case))]
    Play,
    #[token("sound", ignore(ascii_case))]
    Sound,
    #[token("poke", ignore(ascii_case))]
    Poke,

    // Type keywords
    #[token("bit", ignore(ascii_case))]
    Bit,
    #[token("byte", ignore(ascii_case))]
    Byte,
    #[token("char", ignore(ascii_case))]
    Char,
    #[token("word", ignore(ascii_case))]
    Word,
    #[token("dword", ignore(ascii_case))]
    DWord,
    #[token("integer", ignore(ascii_case))]
    IntegerType,
    #[token("long", ignore(ascii_case))]
    Long,
    #[token("signed", ignore(ascii_case))]
    Signed,
    #[token("unsigned", ignore(ascii_case))]
    Unsigned,
    #[token("float", ignore(ascii_case))]
    FloatType,
    #[token("string", ignore(ascii_case))]
    StringType,
    #[token("address", ignore(ascii_case))]
    Address,
    #[token("position", ignore(ascii_case))]
    Position,
    #[token("color", ignore(ascii_case))]
    #[token("colour", ignore(ascii_case))]
    Color,
    #[token("thread", ignore(ascii_case))]
    Thread,
    #[token("buffer", ignore(ascii_case))]
    Buffer,
    #[token("music", ignore(ascii_case))]
    Music,

    // Operators
    #[token("and", ignore(ascii_case))]
    And,
    #[token("or", ignore(ascii_case))]
    Or,
    #[token("xor", ignore(ascii_case))]
    Xor,
    #[token("not", ignore(ascii_case))]
    Not,
    #[token("mod", ignore(ascii_case))]
    Mod,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("^")]
    Caret,
    #[token("=")]
    Equal,
    #[token("<>")]
    NotEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,

    // Delimiters
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("#")]
    Hash,
    #[token("\n")]
    Newline,
}

impl Token {
    /// Get a human-readable name for diagnostics.
    pub fn name(&self) -> String {
        match self {
            Token::Integer(n) => format!("number {}", n),
            Token::Float(f) => format!("number {}", f),
            Token::String(s) => format!("string \"{}\"", s),
            Token::Identifier(s) => format!("identifier '{}'", s),
            Token::Newline => "end of line".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Semicolon => "';'".to_string(),
            Token::LeftParen => "'('".to_string(),
            Token::RightParen => "')'".to_string(),
            other => format!("'{}'", other.keyword().unwrap_or("?")),
        }
    }

    /// The canonical spelling of keyword and operator tokens.
    pub fn keyword(&self) -> Option<&'static str> {
        let text = match self {
            Token::Print => "PRINT",
            Token::Locate => "LOCATE",
            Token::Cls => "CLS",
            Token::Pen => "PEN",
            Token::Paper => "PAPER",
            Token::Dim => "DIM",
            Token::Var => "VAR",
            Token::As => "AS",
            Token::Const => "CONST",
            Token::Let => "LET",
            Token::If => "IF",
            Token::Then => "THEN",
            Token::Else => "ELSE",
            Token::ElseIf => "ELSEIF",
            Token::EndIf => "ENDIF",
            Token::End => "END",
            Token::For => "FOR",
            Token::To => "TO",
            Token::Step => "STEP",
            Token::Next => "NEXT",
            Token::Do => "DO",
            Token::Loop => "LOOP",
            Token::While => "WHILE",
            Token::Wend => "WEND",
            Token::Until => "UNTIL",
            Token::Repeat => "REPEAT",
            Token::Exit => "EXIT",
            Token::Select => "SELECT",
            Token::Case => "CASE",
            Token::EndSelect => "ENDSELECT",
            Token::Goto => "GOTO",
            Token::Gosub => "GOSUB",
            Token::Return => "RETURN",
            Token::On => "ON",
            Token::Off => "OFF",
            Token::Procedure => "PROCEDURE",
            Token::Proc => "PROC",
            Token::EndProc => "ENDPROC",
            Token::Call => "CALL",
            Token::Shared => "SHARED",
            Token::Global => "GLOBAL",
            Token::Param => "PARAM",
            Token::Parallel => "PARALLEL",
            Token::Spawn => "SPAWN",
            Token::Yield => "YIELD",
            Token::Kill => "KILL",
            Token::Respawn => "RESPAWN",
            Token::Wait => "WAIT",
            Token::Run => "RUN",
            Token::Every => "EVERY",
            Token::Ticks => "TICKS",
            Token::Begin => "BEGIN",
            Token::GameLoop => "GAMELOOP",
            Token::Data => "DATA",
            Token::Read => "READ",
            Token::Restore => "RESTORE",
            Token::Option => "OPTION",
            Token::Define => "DEFINE",
            Token::Declare => "DECLARE",
            Token::Load => "LOAD",
            Token::Put => "PUT",
            Token::Plot => "PLOT",
            Token::Bitmap => "BITMAP",
            Token::Sprite => "SPRITE",
            Token::Image => "IMAGE",
            Token::Images => "IMAGES",
            Token::Sequence => "SEQUENCE",
            Token::Tiles => "TILES",
            Token::Tileset => "TILESET",
            Token::Tilemap => "TILEMAP",
            Token::Storage => "STORAGE",
            Token::EndStorage => "ENDSTORAGE",
            Token::File => "FILE",
            Token::Dload => "DLOAD",
            Token::Volume => "VOLUME",
            Token::Play => "PLAY",
            Token::Sound => "SOUND",
            Token::Poke => "POKE",
            Token::Bit => "BIT",
            Token::Byte => "BYTE",
            Token::Char => "CHAR",
            Token::Word => "WORD",
            Token::DWord => "DWORD",
            Token::IntegerType => "INTEGER",
            Token::Long => "LONG",
            Token::Signed => "SIGNED",
            Token::Unsigned => "UNSIGNED",
            Token::FloatType => "FLOAT",
            Token::StringType => "STRING",
            Token::Address => "ADDRESS",
            Token::Position => "POSITION",
            Token::Color => "COLOR",
            Token::Thread => "THREAD",
            Token::Buffer => "BUFFER",
            Token::Music => "MUSIC",
            Token::And => "AND",
            Token::Or => "OR",
            Token::Xor => "XOR",
            Token::Not => "NOT",
            Token::Mod => "MOD",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Caret => "^",
            Token::Equal => "=",
            Token::NotEqual => "<>",
            Token::Less => "<",
            Token::LessEqual => "<=",
            Token::Greater => ">",
            Token::GreaterEqual => ">=",
            Token::LeftBracket => "[",
            Token::RightBracket => "]",
            Token::LeftBrace => "{",
            Token::RightBrace => "}",
            Token::Hash => "#",
            _ => return None,
        };
        Some(text)
    }

    /// Check whether this token names a type in a `DIM ... AS` clause.
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            Token::Bit
                | Token::Byte
                | Token::Char
                | Token::Word
                | Token::DWord
                | Token::IntegerType
                | Token::Long
                | Token::Signed
                | Token::Unsigned
                | Token::FloatType
                | Token::StringType
                | Token::Address
                | Token::Position
                | Token::Color
                | Token::Thread
                | Token::Buffer
                | Token::Music
                | Token::Image
                | Token::Images
                | Token::Sequence
                | Token::Tiles
                | Token::Tileset
                | Token::Tilemap
                | Token::Sprite
        )
    }

    /// Check whether this token ends a statement.
    pub fn is_statement_end(&self) -> bool {
        matches!(self, Token::Newline | Token::Colon)
    }

    /// Check whether the token is the identifier `word`, ignoring case.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(self, Token::Identifier(s) if s.eq_ignore_ascii_case(word))
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Integer(n) => write!(f, "{}", n),
            Token::Float(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::Newline => write!(f, "NEWLINE"),
            other => write!(f, "{}", other.keyword().unwrap_or("?")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        Token::lexer(source).map(|t| t.unwrap()).collect()
    }

    #[test]
    fn test_keywords_ignore_case() {
        assert_eq!(lex("print PRINT Print"), vec![Token::Print; 3]);
        assert_eq!(lex("?"), vec![Token::Print]);
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        assert_eq!(
            lex("PRINTER"),
            vec![Token::Identifier("PRINTER".to_string())]
        );
        assert_eq!(
            lex("REMAINING"),
            vec![Token::Identifier("REMAINING".to_string())]
        );
    }

    #[test]
    fn test_string_identifier() {
        assert_eq!(lex("A$"), vec![Token::Identifier("A$".to_string())]);
    }

    #[test]
    fn test_number_radixes() {
        assert_eq!(
            lex("10 $FF %101"),
            vec![Token::Integer(10), Token::Integer(255), Token::Integer(5)]
        );
        assert_eq!(lex("1.5"), vec![Token::Float(1.5)]);
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(lex("REM hello\nCLS ' bye"), vec![Token::Newline, Token::Cls]);
        assert_eq!(lex("REM"), Vec::<Token>::new());
    }

    #[test]
    fn test_is_type() {
        assert!(Token::Byte.is_type());
        assert!(Token::Image.is_type());
        assert!(!Token::Print.is_type());
    }

    #[test]
    fn test_is_word() {
        assert!(Token::Identifier("flip".to_string()).is_word("FLIP"));
        assert!(!Token::Print.is_word("PRINT"));
    }
}
