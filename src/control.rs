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

//! The control-flow stack.
//!
//! Every block opener (`IF`, `FOR`, `DO`, `SELECT CASE`, `PROCEDURE`, ...)
//! pushes a frame carrying the labels minted for the block. Closers pop the
//! frame and verify its kind; a mismatch is a dedicated error. Frames left
//! open at the end of the program are reported with the opener's line.

use crate::error::{CompileError, ErrorCode, Span};
use crate::symbols::{ProcedureId, VariableId};

/// What follows `ON expr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnKind {
    Goto,
    Gosub,
    Proc,
}

/// Kind-specific state of a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    If {
        /// Where the false branch of the current test jumps.
        else_label: String,
        else_seen: bool,
        /// Opened by a single-line `IF ... THEN` and closed at end of line.
        inline: bool,
    },
    On {
        kind: OnKind,
        value: VariableId,
        index: usize,
    },
    SelectCase {
        value: VariableId,
        /// Where a failing CASE test jumps.
        next_label: Option<String>,
        case_else: bool,
    },
    Do,
    While,
    Repeat,
    For {
        index: VariableId,
        to: VariableId,
        step: VariableId,
        /// Sign of a constant STEP; `None` when it is only known at runtime.
        step_positive: Option<bool>,
    },
    /// FOR inside a parallel procedure; bounds are per-thread.
    ForMt {
        index: VariableId,
        to: VariableId,
        step: VariableId,
        step_positive: Option<bool>,
    },
    GameLoop,
    Procedure {
        id: ProcedureId,
    },
}

impl FrameKind {
    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            FrameKind::Do
                | FrameKind::While
                | FrameKind::Repeat
                | FrameKind::For { .. }
                | FrameKind::ForMt { .. }
                | FrameKind::GameLoop
        )
    }

    pub fn opener(&self) -> &'static str {
        match self {
            FrameKind::If { .. } => "IF",
            FrameKind::On { .. } => "ON",
            FrameKind::SelectCase { .. } => "SELECT CASE",
            FrameKind::Do => "DO",
            FrameKind::While => "WHILE",
            FrameKind::Repeat => "REPEAT",
            FrameKind::For { .. } | FrameKind::ForMt { .. } => "FOR",
            FrameKind::GameLoop => "BEGIN GAMELOOP",
            FrameKind::Procedure { .. } => "PROCEDURE",
        }
    }

    fn closer(&self) -> &'static str {
        match self {
            FrameKind::If { .. } => "ENDIF",
            FrameKind::On { .. } => "end of ON",
            FrameKind::SelectCase { .. } => "END SELECT",
            FrameKind::Do => "LOOP",
            FrameKind::While => "WEND",
            FrameKind::Repeat => "UNTIL",
            FrameKind::For { .. } | FrameKind::ForMt { .. } => "NEXT",
            FrameKind::GameLoop => "END GAMELOOP",
            FrameKind::Procedure { .. } => "END PROC",
        }
    }

    fn unclosed_code(&self) -> ErrorCode {
        match self {
            FrameKind::If { .. } => ErrorCode::IfWithoutEndif,
            FrameKind::For { .. } | FrameKind::ForMt { .. } => ErrorCode::ForWithoutNext,
            FrameKind::Do => ErrorCode::DoWithoutLoop,
            FrameKind::While => ErrorCode::WhileWithoutWend,
            FrameKind::Repeat => ErrorCode::RepeatWithoutUntil,
            FrameKind::SelectCase { .. } => ErrorCode::SelectWithoutEndSelect,
            _ => ErrorCode::UnclosedBlock,
        }
    }
}

/// An open block.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: FrameKind,
    /// Label at the top of the block (loop restart point).
    pub start_label: String,
    /// Label after the block (EXIT, ENDIF, END SELECT target).
    pub end_label: String,
    pub procedure: Option<ProcedureId>,
    /// Source line of the opener.
    pub line: usize,
    pub span: Span,
}

#[derive(Debug, Default)]
pub struct ControlStack {
    frames: Vec<Frame>,
}

impl ControlStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a block whose labels derive from `base`.
    pub fn push(
        &mut self,
        kind: FrameKind,
        base: &str,
        procedure: Option<ProcedureId>,
        line: usize,
        span: Span,
    ) -> &Frame {
        self.frames.push(Frame {
            kind,
            start_label: base.to_string(),
            end_label: format!("{}_end", base),
            procedure,
            line,
            span,
        });
        &self.frames[self.frames.len() - 1]
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Pop the top frame if `accept` recognizes its kind, else fail with `code`.
    pub fn pop_expecting(
        &mut self,
        accept: impl Fn(&FrameKind) -> bool,
        code: ErrorCode,
        closer: &str,
    ) -> Result<Frame, CompileError> {
        match self.frames.pop() {
            Some(frame) if accept(&frame.kind) => Ok(frame),
            Some(frame) => {
                let error = CompileError::unlocated(
                    code,
                    format!(
                        "{} does not close {} opened at line {}",
                        closer,
                        frame.kind.opener(),
                        frame.line
                    ),
                );
                self.frames.push(frame);
                Err(error)
            }
            None => Err(CompileError::unlocated(
                code,
                format!("{} without an open block", closer),
            )),
        }
    }

    /// Check that the top frame has the expected kind without popping it.
    pub fn expect_top(
        &mut self,
        accept: impl Fn(&FrameKind) -> bool,
        code: ErrorCode,
        keyword: &str,
    ) -> Result<&mut Frame, CompileError> {
        match self.frames.last_mut() {
            Some(frame) if accept(&frame.kind) => Ok(frame),
            _ => Err(CompileError::unlocated(
                code,
                format!("{} outside of its block", keyword),
            )),
        }
    }

    /// End label of the `n`-th enclosing loop of the current procedure.
    ///
    /// Any `n` outside `1..=loops` is E145, including an `EXIT` with no loop
    /// around it and `EXIT 0`.
    pub fn exit_label(&self, n: usize) -> Result<String, CompileError> {
        let loops: Vec<&Frame> = self
            .frames
            .iter()
            .rev()
            .take_while(|f| !matches!(f.kind, FrameKind::Procedure { .. }))
            .filter(|f| f.kind.is_loop())
            .collect();
        if n == 0 || n > loops.len() {
            return Err(CompileError::unlocated(
                ErrorCode::ExitBeyondLoops,
                format!("EXIT {} exceeds the {} enclosing loop(s)", n, loops.len()),
            ));
        }
        Ok(loops[n - 1].end_label.clone())
    }

    /// Fail on the innermost block still open at the end of the program.
    pub fn verify_empty(&self) -> Result<(), CompileError> {
        match self.frames.last() {
            None => Ok(()),
            Some(frame) => Err(CompileError::new(
                frame.kind.unclosed_code(),
                format!(
                    "{} opened at line {} is never closed by {}",
                    frame.kind.opener(),
                    frame.line,
                    frame.kind.closer()
                ),
                frame.span,
            )),
        }
    }
}
