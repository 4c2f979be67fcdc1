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

//! Conditionals, loops and jumps.
//!
//! A `THEN` followed by the end of the statement opens a block closed by
//! `ENDIF`; anything else on the line is the body of a single-line `IF`,
//! closed at the end of the line.

use super::blocks::BlockParser;
use super::expressions::ExpressionParser;
use super::helpers::ParserHelpers;
use super::statements::StatementParser;
use super::Parser;
use crate::codegen::{FlowEmitter, ProcedureEmitter, StorageEmitter, VariableEmitter};
use crate::control::OnKind;
use crate::error::{CompileError, ErrorCode};
use crate::lexer::Token;
use crate::symbols::LabelTarget;

/// Trait for control flow parsing operations.
pub trait ControlFlowParser {
    /// Parse a GOTO/GOSUB/RESTORE target: a line number or a label name.
    fn parse_label_target(&mut self) -> Result<LabelTarget, CompileError>;

    fn parse_if(&mut self) -> Result<(), CompileError>;

    /// `ELSE`, `ELSE IF cond THEN` or the `ELSE` of a single-line `IF`.
    fn parse_else(&mut self) -> Result<(), CompileError>;

    /// `ELSEIF cond THEN`.
    fn parse_else_if(&mut self) -> Result<(), CompileError>;

    fn parse_end_if(&mut self) -> Result<(), CompileError>;

    /// `END`, `END IF`, `END SELECT`, `END PROC`, `END GAMELOOP`, `END STORAGE`.
    fn parse_end(&mut self) -> Result<(), CompileError>;

    fn parse_select(&mut self) -> Result<(), CompileError>;

    /// `CASE v1, v2, ...` or `CASE ELSE`.
    fn parse_case(&mut self) -> Result<(), CompileError>;

    fn parse_end_select(&mut self) -> Result<(), CompileError>;

    fn parse_for(&mut self) -> Result<(), CompileError>;

    fn parse_next(&mut self) -> Result<(), CompileError>;

    /// `DO [WHILE cond | UNTIL cond]`.
    fn parse_do(&mut self) -> Result<(), CompileError>;

    /// `LOOP [WHILE cond | UNTIL cond]`.
    fn parse_loop(&mut self) -> Result<(), CompileError>;

    fn parse_while(&mut self) -> Result<(), CompileError>;

    fn parse_wend(&mut self) -> Result<(), CompileError>;

    fn parse_repeat(&mut self) -> Result<(), CompileError>;

    fn parse_until(&mut self) -> Result<(), CompileError>;

    /// `EXIT [n]`, `EXIT IF cond [, n]` or `EXIT PROC`.
    fn parse_exit(&mut self) -> Result<(), CompileError>;

    /// `GOTO target` or `GOSUB target`.
    fn parse_jump(&mut self) -> Result<(), CompileError>;

    /// `RETURN` from a GOSUB, or `RETURN value` from a procedure.
    fn parse_return(&mut self) -> Result<(), CompileError>;

    /// `ON value GOTO|GOSUB|PROC t1, t2, ...`.
    fn parse_on(&mut self) -> Result<(), CompileError>;

    /// `BEGIN GAMELOOP`.
    fn parse_begin(&mut self) -> Result<(), CompileError>;
}

impl<'a> Parser<'a> {
    /// The body after `THEN` or `ELSE` on the same line: a line number to
    /// jump to, or the first statement of the branch.
    fn parse_inline_branch(&mut self) -> Result<(), CompileError> {
        if let Some(Token::Integer(_)) = self.peek() {
            let target = self.parse_label_target()?;
            self.env.goto(target);
            return Ok(());
        }
        self.parse_statement()
    }

    fn parse_then(&mut self) -> Result<bool, CompileError> {
        let condition = self.parse_expression()?;
        if self.match_token(&Token::Goto) {
            self.env.if_then(condition, true)?;
            let target = self.parse_label_target()?;
            self.env.goto(target);
            return Ok(false);
        }
        self.expect(&Token::Then, "THEN")?;
        let block = self.check(&Token::Newline) || self.check(&Token::Colon);
        self.env.if_then(condition, !block)?;
        Ok(!block)
    }

    /// Condition of `ELSE IF` / `ELSEIF`, after the keyword.
    fn parse_else_if_condition(&mut self) -> Result<(), CompileError> {
        self.env.else_if_begin()?;
        let condition = self.parse_expression()?;
        self.expect(&Token::Then, "THEN")?;
        self.env.else_if_then(condition)
    }

    fn levels(&mut self) -> Result<usize, CompileError> {
        let levels = self.expect_integer("a number of loops")?;
        usize::try_from(levels).map_err(|_| {
            self.env.error(
                ErrorCode::ValueOutOfRange,
                format!("cannot exit {} loops", levels),
            )
        })
    }

    /// `WHILE cond` or `UNTIL cond` after `DO` or `LOOP`.
    fn loop_condition(&mut self) -> Result<Option<(crate::symbols::VariableId, bool)>, CompileError> {
        let until = if self.match_token(&Token::While) {
            false
        } else if self.match_token(&Token::Until) {
            true
        } else {
            return Ok(None);
        };
        let condition = self.parse_expression()?;
        Ok(Some((condition, until)))
    }
}

impl<'a> ControlFlowParser for Parser<'a> {
    fn parse_label_target(&mut self) -> Result<LabelTarget, CompileError> {
        match self.peek() {
            Some(Token::Integer(line)) => {
                let line = u32::try_from(*line)
                    .map_err(|_| self.error(ErrorCode::ValueOutOfRange, "line number out of range"))?;
                self.advance();
                Ok(LabelTarget::Line(line))
            }
            Some(Token::Identifier(name)) => {
                let name = name.to_ascii_uppercase();
                self.advance();
                Ok(LabelTarget::Name(name))
            }
            _ => Err(self.unexpected("a line number or label")),
        }
    }

    fn parse_if(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::If, "IF")?;
        if self.parse_then()? && !self.at_statement_end() {
            self.parse_inline_branch()?;
        }
        Ok(())
    }

    fn parse_else(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Else, "ELSE")?;
        if self.match_token(&Token::If) {
            return self.parse_else_if_condition();
        }
        self.env.else_branch()?;
        if !self.at_statement_end() {
            self.parse_inline_branch()?;
        }
        Ok(())
    }

    fn parse_else_if(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::ElseIf, "ELSEIF")?;
        self.parse_else_if_condition()
    }

    fn parse_end_if(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::EndIf, "ENDIF")?;
        self.env.end_if()
    }

    fn parse_end(&mut self) -> Result<(), CompileError> {
        match self.peek_ahead(1) {
            Some(Token::If) => {
                self.advance();
                self.advance();
                self.env.end_if()
            }
            Some(Token::Select) => {
                self.advance();
                self.advance();
                self.env.end_select()
            }
            Some(Token::Proc) => self.parse_end_procedure(),
            Some(Token::GameLoop) => {
                self.advance();
                self.advance();
                self.env.end_gameloop()
            }
            Some(Token::Storage) => {
                self.advance();
                self.advance();
                self.env.end_storage()
            }
            _ => {
                self.advance();
                self.env.end_program();
                Ok(())
            }
        }
    }

    fn parse_select(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Select, "SELECT")?;
        self.expect(&Token::Case, "CASE")?;
        let value = self.parse_expression()?;
        self.env.select_case(value)
    }

    fn parse_case(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Case, "CASE")?;
        if self.match_token(&Token::Else) {
            return self.env.case_else();
        }
        self.env.case_begin()?;
        let mut values = vec![self.parse_expression()?];
        while self.match_token(&Token::Comma) {
            values.push(self.parse_expression()?);
        }
        self.env.case_values(&values)
    }

    fn parse_end_select(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::EndSelect, "ENDSELECT")?;
        self.env.end_select()
    }

    fn parse_for(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::For, "FOR")?;
        let name = self.expect_identifier("a loop variable")?.to_ascii_uppercase();
        let index = self.env.assignment_target(&name)?;
        self.expect(&Token::Equal, "'='")?;
        let from = self.parse_expression()?;
        self.expect(&Token::To, "TO")?;
        let to = self.parse_expression()?;
        let step = if self.match_token(&Token::Step) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.env.for_begin(index, from, to, step)
    }

    fn parse_next(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Next, "NEXT")?;
        let index = match self.peek() {
            Some(Token::Identifier(name)) => {
                let name = name.to_ascii_uppercase();
                self.advance();
                Some(self.env.assignment_target(&name)?)
            }
            _ => None,
        };
        self.env.next(index)
    }

    fn parse_do(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Do, "DO")?;
        self.env.do_begin();
        match self.loop_condition()? {
            Some((condition, until)) => self.env.do_condition(condition, until),
            None => Ok(()),
        }
    }

    fn parse_loop(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Loop, "LOOP")?;
        let condition = self.loop_condition()?;
        self.env.loop_end(condition)
    }

    fn parse_while(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::While, "WHILE")?;
        self.env.while_begin();
        let condition = self.parse_expression()?;
        self.env.while_condition(condition)
    }

    fn parse_wend(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Wend, "WEND")?;
        self.env.wend()
    }

    fn parse_repeat(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Repeat, "REPEAT")?;
        self.env.repeat_begin();
        Ok(())
    }

    fn parse_until(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Until, "UNTIL")?;
        let condition = self.parse_expression()?;
        self.env.until(condition)
    }

    fn parse_exit(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Exit, "EXIT")?;
        if self.match_token(&Token::Proc) {
            return self.env.return_value(None);
        }
        if self.match_token(&Token::If) {
            let condition = self.parse_expression()?;
            let levels = if self.match_token(&Token::Comma) {
                self.levels()?
            } else {
                1
            };
            return self.env.exit_loop_if(condition, levels);
        }
        let levels = if self.at_statement_end() {
            1
        } else {
            self.levels()?
        };
        self.env.exit_loop(levels)
    }

    fn parse_jump(&mut self) -> Result<(), CompileError> {
        let gosub = self.check(&Token::Gosub);
        self.advance();
        let target = self.parse_label_target()?;
        if gosub {
            self.env.gosub(target);
        } else {
            self.env.goto(target);
        }
        Ok(())
    }

    fn parse_return(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Return, "RETURN")?;
        if self.at_statement_end() {
            self.env.return_from_gosub();
            return Ok(());
        }
        let value = self.parse_expression()?;
        self.env.return_value(Some(value))
    }

    fn parse_on(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::On, "ON")?;
        let value = self.parse_expression()?;
        let kind = if self.match_token(&Token::Goto) {
            OnKind::Goto
        } else if self.match_token(&Token::Gosub) {
            OnKind::Gosub
        } else if self.match_token(&Token::Proc) {
            OnKind::Proc
        } else {
            return Err(self.unexpected("GOTO, GOSUB or PROC"));
        };
        self.env.on_begin(kind, value)?;
        loop {
            let target = self.parse_label_target()?;
            self.env.on_target(target)?;
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.env.on_end()
    }

    fn parse_begin(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Begin, "BEGIN")?;
        self.expect(&Token::GameLoop, "GAMELOOP")?;
        self.env.begin_gameloop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::codegen::testing::{c64, calls, code};
    use crate::emitter::LineKind;
    use crate::environment::Environment;
    use crate::error::{CompileError, ErrorCode};
    use crate::parser::parse_program;
    use crate::types::VariableType;

    fn compile(source: &str) -> Result<Environment, CompileError> {
        let mut env = c64();
        parse_program(&mut env, source)?;
        Ok(env)
    }

    fn error_of(source: &str) -> ErrorCode {
        compile(source).err().map(|e| e.code).unwrap()
    }

    /// Every line, labels suffixed with a colon.
    fn listing(env: &Environment) -> Vec<String> {
        env.out
            .lines()
            .iter()
            .filter_map(|line| match line.kind {
                LineKind::Label => Some(format!("{}:", line.text)),
                LineKind::Code => Some(line.text.clone()),
                _ => None,
            })
            .collect()
    }

    fn position(lines: &[String], prefix: &str) -> usize {
        lines
            .iter()
            .position(|l| l.starts_with(prefix))
            .unwrap_or_else(|| panic!("{} not found in {:?}", prefix, lines))
    }

    #[test]
    fn test_for_loop_index_is_signed_word() {
        let env = compile("FOR I = 1 TO 3 : PRINT I : NEXT").unwrap();
        let i = env.symbols.lookup("I").unwrap();
        assert_eq!(env.symbols.variable(i).var_type, VariableType::SWord);
        assert_eq!(calls(&env, "PRINTS16"), 1);
        assert!(env.control.is_empty());
    }

    #[test]
    fn test_block_if_else_layout() {
        let env = compile("DIM f AS BYTE\nIF f THEN\nPOKE 1024, 89\nELSE\nPOKE 1024, 78\nENDIF").unwrap();
        let lines = listing(&env);
        let to_else = position(&lines, "JMP _else");
        let yes = position(&lines, "LDA #$59");
        let to_end = position(&lines, "JMP _if");
        let else_label = lines.iter().position(|l| l.starts_with("_else") && l.ends_with(':')).unwrap();
        let no = position(&lines, "LDA #$4E");
        assert!(to_else < yes && yes < to_end && to_end < else_label && else_label < no);
        assert!(env.control.is_empty());
    }

    #[test]
    fn test_single_line_if_closes_at_end_of_line() {
        let env = compile("DIM f AS BYTE\nIF f THEN PRINT 1 ELSE PRINT 2\nCLS").unwrap();
        assert!(env.control.is_empty());
        assert_eq!(calls(&env, "TEXTCLS"), 1);
    }

    #[test]
    fn test_single_line_if_with_endif() {
        let env = compile("IF 2 > 1 THEN PRINT \"Y\" ELSE PRINT \"N\" ENDIF\nCLS").unwrap();
        assert!(env.control.is_empty());
        assert_eq!(calls(&env, "TEXTCLS"), 1);
    }

    #[test]
    fn test_if_then_line_number() {
        let env = compile("10 DIM f AS BYTE\n20 IF f THEN 10").unwrap();
        assert!(code(&env).contains(&"JMP _line10".to_string()));
        assert!(env.control.is_empty());
    }

    #[test]
    fn test_else_if_chain() {
        let source = "DIM a AS BYTE\nIF a = 1 THEN\nCLS\nELSE IF a = 2 THEN\nCLS\nELSEIF a = 3 THEN\nCLS\nELSE\nCLS\nEND IF";
        let env = compile(source).unwrap();
        assert_eq!(calls(&env, "TEXTCLS"), 4);
        assert!(env.control.is_empty());
    }

    #[test]
    fn test_select_case() {
        let source = "DIM a AS BYTE\nSELECT CASE a\nCASE 1, 2\nCLS\nCASE ELSE\nCLS\nENDSELECT";
        let env = compile(source).unwrap();
        assert!(env.control.is_empty());
        assert_eq!(error_of("CASE 1"), ErrorCode::CaseWithoutSelect);
    }

    #[test]
    fn test_loops_balance() {
        let source = "DIM a AS BYTE\nDO WHILE a < 3\nINC a\nLOOP\nWHILE a > 0\nDEC a\nWEND\nREPEAT\nINC a\nUNTIL a = 5\nDO\nLOOP UNTIL a = 0";
        let env = compile(source).unwrap();
        assert!(env.control.is_empty());
    }

    #[test]
    fn test_exit_beyond_enclosing_loops() {
        assert_eq!(error_of("DO\nEXIT 2\nLOOP"), ErrorCode::ExitBeyondLoops);
        assert_eq!(error_of("EXIT"), ErrorCode::ExitBeyondLoops);
        assert_eq!(error_of("IF 1 THEN\nEXIT\nENDIF"), ErrorCode::ExitBeyondLoops);
        assert_eq!(error_of("DO\nEXIT 0\nLOOP"), ErrorCode::ExitBeyondLoops);
    }

    #[test]
    fn test_exit_if() {
        let env = compile("DIM a AS BYTE\nDO\nDO\nEXIT IF a = 1, 2\nLOOP\nLOOP").unwrap();
        assert!(env.control.is_empty());
    }

    #[test]
    fn test_mismatched_closers() {
        assert_eq!(error_of("WEND"), ErrorCode::WendWithoutWhile);
        assert_eq!(error_of("NEXT"), ErrorCode::NextWithoutFor);
        assert_eq!(error_of("LOOP"), ErrorCode::LoopWithoutDo);
        assert_eq!(error_of("ENDIF"), ErrorCode::EndifWithoutIf);
    }

    #[test]
    fn test_gosub_and_return() {
        let env = compile("GOSUB sub\nEND\nsub:\nRETURN").unwrap();
        let lines = code(&env);
        assert!(lines.contains(&"JSR _label_SUB".to_string()));
        assert!(lines.contains(&"RTS".to_string()));
    }

    #[test]
    fn test_on_gosub() {
        let env = compile("DIM k AS BYTE\nON k GOSUB 100, 200\n100 RETURN\n200 RETURN").unwrap();
        let lines = code(&env);
        assert!(lines.contains(&"JSR _line100".to_string()));
        assert!(lines.contains(&"JSR _line200".to_string()));
        assert!(env.control.is_empty());
    }

    #[test]
    fn test_gameloop() {
        let env = compile("BEGIN GAMELOOP\nCLS\nEND GAMELOOP").unwrap();
        assert!(env.control.is_empty());
        assert_eq!(
            error_of("END GAMELOOP"),
            ErrorCode::EndGameloopWithoutGameloop
        );
    }

    #[test]
    fn test_end_halts() {
        let env = compile("END").unwrap();
        assert!(!code(&env).is_empty());
    }
}
