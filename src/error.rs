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

//! Error types and diagnostics for the ugBC compiler.
//!
//! Every critical error carries a stable, user-facing number (`E000` to `E262`)
//! and every warning a `W001` to `W008` number. Tests and users rely on these
//! numbers, so variants must never be renumbered.

use std::ops::Range;
use thiserror::Error;

/// A byte range in the source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl Span {
    /// Create a new span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Create a span from a range.
    pub fn from_range(range: Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }

    /// Get the length of this span.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Merge two spans into one that covers both.
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Self::from_range(range)
    }
}

impl From<Span> for Range<usize> {
    fn from(span: Span) -> Self {
        span.start..span.end
    }
}

/// Critical error numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Front end (E000-E002)
    SyntaxError,
    InvalidCharacter,
    UnterminatedString,

    // Type system (E003-E009)
    TypeMismatch,
    CannotCast,
    NumericExpected,
    StringExpected,
    ArrayExpected,
    ArrayDimensionMismatch,
    ArrayIndexOutOfBounds,

    // Unsupported operations on a type (E010-E022)
    AddUnsupported,
    SubUnsupported,
    MulUnsupported,
    DivUnsupported,
    LogicUnsupported,
    CompareUnsupported,
    StringFunctionUnsupported,
    NegationUnsupported,
    ShiftUnsupported,
    IncrementUnsupported,
    PrintUnsupported,
    ReadUnsupported,
    IndexUnsupported,

    // Scope, procedures and options (E037-E051)
    LabelAlreadyDefined,
    UndefinedLabel,
    ProcedureAlreadyDefined,
    NestedProcedure,
    EndProcOutsideProcedure,
    UndefinedProcedure,
    WrongNumberOfParameters,
    ReturnOutsideProcedure,
    ValueOutOfRange,
    DivisionByZero,
    CannotReadFile,
    InvalidOption,
    SandboxViolation,
    TenLinerViolation,

    // Asset pipeline (E053-E064)
    AssetFileNotFound,
    NotAnImage,
    BufferTooLargeForString,
    FrameOutOfRange,
    UnknownImageFormat,
    ImageTooLarge,
    TooManyColors,
    ImageWidthNotMultipleOf8,
    ImageHeightNotMultipleOf8,

    // Output and threads (E077-E094)
    CannotWriteOutput,
    CallOnParallelProcedure,
    SpawnOnNormalProcedure,
    FrameWidthMismatch,
    FrameHeightMismatch,
    FrameWidthNotMultipleOf8,
    FrameHeightNotMultipleOf8,
    TooManyFrames,
    OutputFormatMismatch,
    ArrayInitCountMismatch,

    // Tiles and sprites (E113-E118)
    TileOutOfRange,
    TilesExhausted,
    TileSizeInvalid,
    SpriteIdOutOfRange,
    VoiceOutOfRange,
    ScreenModeUnknown,

    // Memory model (E124-E127)
    ExpansionWindowExceeded,
    BankNotFound,
    BankFull,
    MemoryAreaExhausted,

    // Toolchain (E129-E131)
    ToolNotFound,
    ToolFailed,
    CannotReadAssemblerOutput,

    // Mismatched control flow (E141-E153)
    ElseWithoutIf,
    EndifWithoutIf,
    NextWithoutFor,
    LoopWithoutDo,
    ExitBeyondLoops,
    WendWithoutWhile,
    UntilWithoutRepeat,
    CaseWithoutSelect,
    DuplicateCaseElse,
    EndSelectWithoutSelect,
    EndGameloopWithoutGameloop,
    ElseIfAfterElse,

    // Symbols (E154-E159)
    VariableRedefined,
    ConstantRedefined,
    UnknownType,
    InvalidArrayElementType,
    UndefinedVariable,
    ReadOnlyVariable,

    // Arrays and floats (E172, E176)
    ArrayFileSizeMismatch,
    FloatPrecisionMismatch,

    // Tiled maps (E186-E210)
    TilemapInvalid,
    TilemapEncodingUnsupported,
    TiledFileUnreadable,
    TilesetMissing,
    LayerSizeMismatch,
    LayerNotFound,
    TileClassNotFound,
    TilesetTileSizeInvalid,
    TilesetTooManyTiles,
    NotATilemap,

    // Unclosed blocks at end of program (E220-E226)
    IfWithoutEndif,
    ForWithoutNext,
    DoWithoutLoop,
    WhileWithoutWend,
    RepeatWithoutUntil,
    SelectWithoutEndSelect,
    UnclosedBlock,

    // Storage (E247-E250)
    StorageFileNotFound,
    StorageNameDuplicate,
    StorageUnsupported,
    DloadUnsupported,

    // Miscellaneous (E253-E262)
    NextVariableMismatch,
    SpriteTooLarge,
    EmbeddedAssemblyMalformed,
    InternalError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl ErrorCode {
    /// Get the stable number for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::SyntaxError => "E000",
            ErrorCode::InvalidCharacter => "E001",
            ErrorCode::UnterminatedString => "E002",

            ErrorCode::TypeMismatch => "E003",
            ErrorCode::CannotCast => "E004",
            ErrorCode::NumericExpected => "E005",
            ErrorCode::StringExpected => "E006",
            ErrorCode::ArrayExpected => "E007",
            ErrorCode::ArrayDimensionMismatch => "E008",
            ErrorCode::ArrayIndexOutOfBounds => "E009",

            ErrorCode::AddUnsupported => "E010",
            ErrorCode::SubUnsupported => "E011",
            ErrorCode::MulUnsupported => "E012",
            ErrorCode::DivUnsupported => "E013",
            ErrorCode::LogicUnsupported => "E014",
            ErrorCode::CompareUnsupported => "E015",
            ErrorCode::StringFunctionUnsupported => "E016",
            ErrorCode::NegationUnsupported => "E017",
            ErrorCode::ShiftUnsupported => "E018",
            ErrorCode::IncrementUnsupported => "E019",
            ErrorCode::PrintUnsupported => "E020",
            ErrorCode::ReadUnsupported => "E021",
            ErrorCode::IndexUnsupported => "E022",

            ErrorCode::LabelAlreadyDefined => "E037",
            ErrorCode::UndefinedLabel => "E038",
            ErrorCode::ProcedureAlreadyDefined => "E039",
            ErrorCode::NestedProcedure => "E040",
            ErrorCode::EndProcOutsideProcedure => "E041",
            ErrorCode::UndefinedProcedure => "E042",
            ErrorCode::WrongNumberOfParameters => "E043",
            ErrorCode::ReturnOutsideProcedure => "E044",
            ErrorCode::ValueOutOfRange => "E045",
            ErrorCode::DivisionByZero => "E046",
            ErrorCode::CannotReadFile => "E047",
            ErrorCode::InvalidOption => "E049",
            ErrorCode::SandboxViolation => "E050",
            ErrorCode::TenLinerViolation => "E051",

            ErrorCode::AssetFileNotFound => "E053",
            ErrorCode::NotAnImage => "E054",
            ErrorCode::BufferTooLargeForString => "E055",
            ErrorCode::FrameOutOfRange => "E056",
            ErrorCode::UnknownImageFormat => "E057",
            ErrorCode::ImageTooLarge => "E058",
            ErrorCode::TooManyColors => "E059",
            ErrorCode::ImageWidthNotMultipleOf8 => "E063",
            ErrorCode::ImageHeightNotMultipleOf8 => "E064",

            ErrorCode::CannotWriteOutput => "E077",
            ErrorCode::CallOnParallelProcedure => "E078",
            ErrorCode::SpawnOnNormalProcedure => "E078bis",
            ErrorCode::FrameWidthMismatch => "E082",
            ErrorCode::FrameHeightMismatch => "E083",
            ErrorCode::FrameWidthNotMultipleOf8 => "E086",
            ErrorCode::FrameHeightNotMultipleOf8 => "E087",
            ErrorCode::TooManyFrames => "E088",
            ErrorCode::OutputFormatMismatch => "E093",
            ErrorCode::ArrayInitCountMismatch => "E094",

            ErrorCode::TileOutOfRange => "E113",
            ErrorCode::TilesExhausted => "E114",
            ErrorCode::TileSizeInvalid => "E115",
            ErrorCode::SpriteIdOutOfRange => "E116",
            ErrorCode::VoiceOutOfRange => "E117",
            ErrorCode::ScreenModeUnknown => "E118",

            ErrorCode::ExpansionWindowExceeded => "E124",
            ErrorCode::BankNotFound => "E125",
            ErrorCode::BankFull => "E126",
            ErrorCode::MemoryAreaExhausted => "E127",

            ErrorCode::ToolNotFound => "E129",
            ErrorCode::ToolFailed => "E130",
            ErrorCode::CannotReadAssemblerOutput => "E131",

            ErrorCode::ElseWithoutIf => "E141",
            ErrorCode::EndifWithoutIf => "E142",
            ErrorCode::NextWithoutFor => "E143",
            ErrorCode::LoopWithoutDo => "E144",
            ErrorCode::ExitBeyondLoops => "E145",
            ErrorCode::WendWithoutWhile => "E146",
            ErrorCode::UntilWithoutRepeat => "E147",
            ErrorCode::CaseWithoutSelect => "E148",
            ErrorCode::DuplicateCaseElse => "E149",
            ErrorCode::EndSelectWithoutSelect => "E150",
            ErrorCode::EndGameloopWithoutGameloop => "E151",
            ErrorCode::ElseIfAfterElse => "E153",

            ErrorCode::VariableRedefined => "E154",
            ErrorCode::ConstantRedefined => "E155",
            ErrorCode::UnknownType => "E156",
            ErrorCode::InvalidArrayElementType => "E157",
            ErrorCode::UndefinedVariable => "E158",
            ErrorCode::ReadOnlyVariable => "E159",

            ErrorCode::ArrayFileSizeMismatch => "E172",
            ErrorCode::FloatPrecisionMismatch => "E176",

            ErrorCode::TilemapInvalid => "E186",
            ErrorCode::TilemapEncodingUnsupported => "E187",
            ErrorCode::TiledFileUnreadable => "E188",
            ErrorCode::TilesetMissing => "E189",
            ErrorCode::LayerSizeMismatch => "E190",
            ErrorCode::LayerNotFound => "E191",
            ErrorCode::TileClassNotFound => "E192",
            ErrorCode::TilesetTileSizeInvalid => "E193",
            ErrorCode::TilesetTooManyTiles => "E194",
            ErrorCode::NotATilemap => "E210",

            ErrorCode::IfWithoutEndif => "E220",
            ErrorCode::ForWithoutNext => "E221",
            ErrorCode::DoWithoutLoop => "E222",
            ErrorCode::WhileWithoutWend => "E223",
            ErrorCode::RepeatWithoutUntil => "E224",
            ErrorCode::SelectWithoutEndSelect => "E225",
            ErrorCode::UnclosedBlock => "E226",

            ErrorCode::StorageFileNotFound => "E247",
            ErrorCode::StorageNameDuplicate => "E248",
            ErrorCode::StorageUnsupported => "E249",
            ErrorCode::DloadUnsupported => "E250",

            ErrorCode::NextVariableMismatch => "E253",
            ErrorCode::SpriteTooLarge => "E260",
            ErrorCode::EmbeddedAssemblyMalformed => "E261",
            ErrorCode::InternalError => "E262",
        }
    }
}

/// Warning numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningCode {
    PrecisionLossOnMultiplication,
    ImplicitDowncast,
    ScreenModeFallback,
    ExactFlagIgnored,
    DloadSizeIgnored,
    UnsupportedOnTarget,
    ValueTruncated,
    EveryHandlerReplaced,
}

impl std::fmt::Display for WarningCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl WarningCode {
    /// Get the stable number for this warning.
    pub fn code(&self) -> &'static str {
        match self {
            WarningCode::PrecisionLossOnMultiplication => "W001",
            WarningCode::ImplicitDowncast => "W002",
            WarningCode::ScreenModeFallback => "W003",
            WarningCode::ExactFlagIgnored => "W004",
            WarningCode::DloadSizeIgnored => "W005",
            WarningCode::UnsupportedOnTarget => "W006",
            WarningCode::ValueTruncated => "W007",
            WarningCode::EveryHandlerReplaced => "W008",
        }
    }
}

/// A critical compilation error.
#[derive(Debug, Error)]
#[error("[{code}] {message}")]
pub struct CompileError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// The source span where the error occurred.
    pub span: Span,
    /// Optional hint for fixing the error.
    pub hint: Option<String>,
}

impl CompileError {
    /// Create a new compile error.
    pub fn new(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            message: message.into(),
            span,
            hint: None,
        }
    }

    /// Add a hint to this error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Create an error whose location is filled in later with [`CompileError::or_at`].
    pub fn unlocated(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message, Span::default())
    }

    /// Attach `span` unless the error already carries a location.
    pub fn or_at(mut self, span: Span) -> Self {
        if self.span == Span::default() {
            self.span = span;
        }
        self
    }

    /// Get the error code string.
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;

/// An advisory diagnostic. Compilation proceeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub code: WarningCode,
    pub message: String,
    pub span: Span,
}

impl Warning {
    pub fn new(code: WarningCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            message: message.into(),
            span,
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// A resolved location in source code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub column: usize,
    /// The content of the line.
    pub line_content: String,
}

impl SourceLocation {
    /// Calculate line and column from a byte offset in source code.
    pub fn from_offset(source: &str, offset: usize) -> Self {
        let mut offset = offset.min(source.len());
        while !source.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &source[..offset];

        let line = before.chars().filter(|&c| c == '\n').count() + 1;

        let last_newline = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = before[last_newline..].chars().count() + 1;

        let line_end = source[offset..]
            .find('\n')
            .map(|i| offset + i)
            .unwrap_or(source.len());
        let line_content = source[last_newline..line_end].trim_end_matches('\r').to_string();

        Self {
            line,
            column,
            line_content,
        }
    }
}

/// Render a critical error in the single-line form the driver prints on stderr.
pub fn format_critical(error: &CompileError, source: &str, filename: &str) -> String {
    let loc = SourceLocation::from_offset(source, error.span.start);
    format!(
        "CRITICAL ERROR during compilation of {}: {} at {} column {}",
        filename, error, loc.line, loc.column
    )
}

fn format_diagnostic(
    kind: &str,
    code: &str,
    message: &str,
    span: Span,
    hint: Option<&str>,
    source: &str,
    filename: Option<&str>,
) -> String {
    let loc = SourceLocation::from_offset(source, span.start);
    let filename = filename.unwrap_or("<input>");

    let mut output = String::new();

    output.push_str(&format!("{}[{}]: {}\n", kind, code, message));
    output.push_str(&format!("  --> {}:{}:{}\n", filename, loc.line, loc.column));

    let line_num_width = loc.line.to_string().len();
    output.push_str(&format!("{:>width$} |\n", "", width = line_num_width));
    output.push_str(&format!(
        "{:>width$} | {}\n",
        loc.line,
        loc.line_content,
        width = line_num_width
    ));

    let underline_start = loc.column - 1;
    let underline_len = span
        .len()
        .max(1)
        .min(loc.line_content.len().saturating_sub(underline_start).max(1));
    output.push_str(&format!(
        "{:>width$} | {:>start$}{}\n",
        "",
        "",
        "^".repeat(underline_len),
        width = line_num_width,
        start = underline_start
    ));

    if let Some(hint) = hint {
        output.push_str(&format!(
            "{:>width$} = hint: {}\n",
            "",
            hint,
            width = line_num_width
        ));
    }

    output
}

/// Format an error with source context.
pub fn format_error(error: &CompileError, source: &str, filename: Option<&str>) -> String {
    format_diagnostic(
        "error",
        error.code_str(),
        &error.message,
        error.span,
        error.hint.as_deref(),
        source,
        filename,
    )
}

/// Format a warning with source context.
pub fn format_warning(warning: &Warning, source: &str, filename: Option<&str>) -> String {
    format_diagnostic(
        "warning",
        warning.code.code(),
        &warning.message,
        warning.span,
        None,
        source,
        filename,
    )
}

/// Render an error as an `ariadne` report without colors.
pub fn render_report(error: &CompileError, source: &str, filename: &str) -> String {
    use ariadne::{Config, Label, Report, ReportKind, Source};

    let range: Range<usize> = error.span.into();
    let range = range.start.min(source.len())..range.end.min(source.len());

    let mut report = Report::build(ReportKind::Error, filename, range.start)
        .with_config(Config::default().with_color(false))
        .with_code(error.code_str())
        .with_message(&error.message)
        .with_label(Label::new((filename, range)).with_message(&error.message));
    if let Some(hint) = &error.hint {
        report = report.with_help(hint);
    }

    let mut buffer = Vec::new();
    if report
        .finish()
        .write((filename, Source::from(source)), &mut buffer)
        .is_err()
    {
        return format_error(error, source, Some(filename));
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_merge() {
        let span1 = Span::new(5, 10);
        let span2 = Span::new(15, 20);
        let merged = span1.merge(&span2);
        assert_eq!(merged.start, 5);
        assert_eq!(merged.end, 20);
        assert_eq!(merged.len(), 15);
    }

    #[test]
    fn test_error_numbers_are_stable() {
        assert_eq!(ErrorCode::SyntaxError.code(), "E000");
        assert_eq!(ErrorCode::TooManyColors.code(), "E059");
        assert_eq!(ErrorCode::ExitBeyondLoops.code(), "E145");
        assert_eq!(ErrorCode::VariableRedefined.code(), "E154");
        assert_eq!(ErrorCode::UndefinedVariable.code(), "E158");
        assert_eq!(ErrorCode::SpawnOnNormalProcedure.code(), "E078bis");
        assert_eq!(ErrorCode::NextVariableMismatch.code(), "E253");
        assert_eq!(WarningCode::ImplicitDowncast.code(), "W002");
    }

    #[test]
    fn test_format_critical() {
        let source = "10 PRINT A\n20 EXIT 2\n";
        let error = CompileError::new(
            ErrorCode::ExitBeyondLoops,
            "EXIT 2 exceeds the 0 enclosing loops",
            Span::new(14, 18),
        );
        assert_eq!(
            format_critical(&error, source, "test.bas"),
            "CRITICAL ERROR during compilation of test.bas: [E145] EXIT 2 exceeds the 0 enclosing loops at 2 column 4"
        );
    }

    #[test]
    fn test_format_error_with_hint() {
        let source = "A = B\n";
        let error = CompileError::new(ErrorCode::UndefinedVariable, "undefined B", Span::new(4, 5))
            .with_hint("declare it with DIM");
        let text = format_error(&error, source, Some("x.bas"));
        assert!(text.starts_with("error[E158]: undefined B"));
        assert!(text.contains("x.bas:1:5"));
        assert!(text.contains("hint: declare it with DIM"));
    }

    #[test]
    fn test_source_location_multibyte() {
        let source = "PRINT \"é\"\nX";
        let loc = SourceLocation::from_offset(source, source.len() - 1);
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 1);
    }
}
