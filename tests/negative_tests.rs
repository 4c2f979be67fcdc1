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

//! Programs the compiler must reject, with the code it rejects them with.

use test_case::test_case;
use ugbc::{compile, lexer, CompilerOptions, ErrorCode, OutputFormat, TargetKind};

fn error_of(source: &str) -> ErrorCode {
    match compile(source, CompilerOptions::default(), TargetKind::C64) {
        Ok(_) => panic!("expected {:?} to fail", source),
        Err(error) => error.code,
    }
}

// ============================================================================
// Lexer
// ============================================================================

#[test_case("PRINT \"OOPS\nPRINT 1", ErrorCode::UnterminatedString; "newline_in_string")]
#[test_case("PRINT \"OOPS", ErrorCode::UnterminatedString; "eof_in_string")]
#[test_case("A = 1 ~ 2", ErrorCode::InvalidCharacter; "tilde")]
#[test_case("A = 99999999999", ErrorCode::ValueOutOfRange; "too_large")]
fn test_lexer_errors(source: &str, expected: ErrorCode) {
    let error = lexer::tokenize(source).unwrap_err();
    assert_eq!(error.code, expected);
}

// ============================================================================
// Block pairing
// ============================================================================

#[test_case("ENDIF", ErrorCode::EndifWithoutIf; "endif")]
#[test_case("ELSE", ErrorCode::ElseWithoutIf; "else")]
#[test_case("NEXT", ErrorCode::NextWithoutFor; "next")]
#[test_case("LOOP", ErrorCode::LoopWithoutDo; "loop")]
#[test_case("WEND", ErrorCode::WendWithoutWhile; "wend")]
#[test_case("UNTIL 1", ErrorCode::UntilWithoutRepeat; "until")]
#[test_case("CASE 1", ErrorCode::CaseWithoutSelect; "case")]
#[test_case("END GAMELOOP", ErrorCode::EndGameloopWithoutGameloop; "end_gameloop")]
#[test_case("DO\nNEXT\nLOOP", ErrorCode::NextWithoutFor; "next_closes_do")]
fn test_closer_without_opener(source: &str, expected: ErrorCode) {
    assert_eq!(error_of(source), expected);
}

#[test_case("IF 1 THEN\nCLS", ErrorCode::IfWithoutEndif; "if")]
#[test_case("FOR I = 1 TO 3\nPRINT I", ErrorCode::ForWithoutNext; "for")]
#[test_case("DO\nCLS", ErrorCode::DoWithoutLoop; "do")]
#[test_case("WHILE 1\nCLS", ErrorCode::WhileWithoutWend; "while")]
#[test_case("REPEAT\nCLS", ErrorCode::RepeatWithoutUntil; "repeat")]
#[test_case("DIM a AS BYTE\nSELECT CASE a\nCASE 1\nCLS", ErrorCode::SelectWithoutEndSelect; "select")]
fn test_opener_without_closer(source: &str, expected: ErrorCode) {
    assert_eq!(error_of(source), expected);
}

#[test]
fn test_unclosed_block_cites_opener_line() {
    let error = compile("CLS\nCLS\nWHILE 1\nCLS", CompilerOptions::default(), TargetKind::C64).unwrap_err();
    assert!(error.message.contains("line 3"), "{}", error.message);
}

// ============================================================================
// EXIT
// ============================================================================

#[test_case("EXIT", ErrorCode::ExitBeyondLoops; "outside")]
#[test_case("IF 1 THEN\nEXIT\nENDIF", ErrorCode::ExitBeyondLoops; "inside_if_only")]
#[test_case("PROCEDURE p\nEXIT\nEND PROC", ErrorCode::ExitBeyondLoops; "inside_procedure_only")]
#[test_case("DO\nEXIT 2\nLOOP", ErrorCode::ExitBeyondLoops; "beyond_one")]
#[test_case("DO\nREPEAT\nEXIT 3\nUNTIL 1\nLOOP", ErrorCode::ExitBeyondLoops; "beyond_two")]
#[test_case("DO\nEXIT 0\nLOOP", ErrorCode::ExitBeyondLoops; "zero")]
fn test_exit_errors(source: &str, expected: ErrorCode) {
    assert_eq!(error_of(source), expected);
}

// ============================================================================
// Symbols
// ============================================================================

#[test_case("DIM A AS BYTE\nDIM A AS WORD", ErrorCode::VariableRedefined; "redefined_type")]
#[test_case("OPTION EXPLICIT\nx = 1", ErrorCode::UndefinedVariable; "explicit")]
#[test_case("CONST c = 1\nc = 2", ErrorCode::ReadOnlyVariable; "assign_constant")]
#[test_case("DIM t(3) AS BYTE = #{1, 2}", ErrorCode::ArrayInitCountMismatch; "array_init")]
#[test_case("DIM w AS WIDGET", ErrorCode::UnknownType; "unknown_type")]
#[test_case("GOTO nowhere", ErrorCode::UndefinedLabel; "goto")]
#[test_case("DATA 1\nRESTORE nowhere", ErrorCode::UndefinedLabel; "restore")]
fn test_symbol_errors(source: &str, expected: ErrorCode) {
    assert_eq!(error_of(source), expected);
}

// ============================================================================
// Procedures
// ============================================================================

#[test_case("CALL nowhere", ErrorCode::UndefinedProcedure; "undefined")]
#[test_case("END PROC", ErrorCode::EndProcOutsideProcedure; "end_proc")]
#[test_case("PROCEDURE a\nPROCEDURE b\nEND PROC\nEND PROC", ErrorCode::NestedProcedure; "nested")]
#[test_case("PROCEDURE p[a]\nEND PROC\np[1, 2]", ErrorCode::WrongNumberOfParameters; "arity")]
#[test_case("PARALLEL PROCEDURE w\nEND PROC\nCALL w", ErrorCode::CallOnParallelProcedure; "call_parallel")]
#[test_case("PROCEDURE w\nEND PROC\nSPAWN w", ErrorCode::SpawnOnNormalProcedure; "spawn_normal")]
fn test_procedure_errors(source: &str, expected: ErrorCode) {
    assert_eq!(error_of(source), expected);
}

#[test]
fn test_parallel_codes_are_distinct() {
    assert_eq!(ErrorCode::CallOnParallelProcedure.code(), "E078");
    assert_eq!(ErrorCode::SpawnOnNormalProcedure.code(), "E078bis");
}

// ============================================================================
// Syntax
// ============================================================================

#[test_case("CLS 1"; "trailing_argument")]
#[test_case("PRINT 1 2"; "missing_separator")]
#[test_case("THEN"; "stray_keyword")]
#[test_case("WAIT FOREVER"; "unknown_wait")]
#[test_case("SOUND LOUD"; "unknown_sound")]
fn test_syntax_errors(source: &str) {
    assert_eq!(error_of(source), ErrorCode::SyntaxError);
}

// ============================================================================
// Targets and options
// ============================================================================

#[test_case(TargetKind::C64, OutputFormat::Xex; "xex_on_c64")]
#[test_case(TargetKind::Coco, OutputFormat::Prg; "prg_on_coco")]
#[test_case(TargetKind::Atari, OutputFormat::D64; "d64_on_atari")]
fn test_output_format_mismatch(target: TargetKind, format: OutputFormat) {
    let options = CompilerOptions {
        output_format: Some(format),
        ..CompilerOptions::default()
    };
    let error = compile("CLS", options, target).unwrap_err();
    assert_eq!(error.code, ErrorCode::OutputFormatMismatch);
}

#[test_case("LOAD IMAGE(\"../secret.png\") AS \"s\""; "parent")]
#[test_case("LOAD IMAGE(\"/etc/secret.png\") AS \"s\""; "absolute")]
fn test_sandbox_refuses_escaping_paths(source: &str) {
    let options = CompilerOptions {
        sandbox: true,
        ..CompilerOptions::default()
    };
    let error = compile(source, options, TargetKind::C64).unwrap_err();
    assert_eq!(error.code, ErrorCode::SandboxViolation);
}

#[test]
fn test_missing_asset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("game.bas");
    std::fs::write(&path, "LOAD IMAGE(\"missing.png\") AS \"s\"\n").unwrap();
    let error = ugbc::compile_file(&path, CompilerOptions::default(), TargetKind::C64).unwrap_err();
    assert_eq!(error.code, ErrorCode::AssetFileNotFound);
}

#[test]
fn test_missing_source() {
    let dir = tempfile::tempdir().unwrap();
    let error = ugbc::compile_file(
        &dir.path().join("nothing.bas"),
        CompilerOptions::default(),
        TargetKind::C64,
    )
    .unwrap_err();
    assert_eq!(error.code, ErrorCode::CannotReadFile);
}

#[test]
fn test_dload_unsupported_on_coco() {
    assert_eq!(
        compile("DLOAD \"X\" TO 1024", CompilerOptions::default(), TargetKind::Coco)
            .unwrap_err()
            .code,
        ErrorCode::DloadUnsupported
    );
}
