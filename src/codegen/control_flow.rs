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

//! Structured and unstructured control flow.
//!
//! Block openers push a frame on the control stack and emit the test at
//! the top of the block; closers pop the frame, verify its kind and emit
//! the back edge and the end label. Conditions are any numeric value,
//! zero being false.
//!
//! Statements whose test must be evaluated after a label (`ELSE IF`,
//! `CASE`, `DO WHILE`, `WHILE`) are split in two calls: the first places
//! the label, the parser then compiles the expression, the second emits
//! the branch.

use super::comparisons::ComparisonEmitter;
use super::variables::VariableEmitter;
use crate::backend::{Comparison, Value};
use crate::control::{FrameKind, OnKind};
use crate::environment::Environment;
use crate::error::{CompileError, ErrorCode, Result};
use crate::symbols::{LabelTarget, VariableId};
use crate::types::VariableType;

/// Extension trait for control flow.
pub trait FlowEmitter {
    /// A line number or `name:` label at the current position.
    fn define_label(&mut self, target: LabelTarget) -> Result<()>;

    fn goto(&mut self, target: LabelTarget);

    fn gosub(&mut self, target: LabelTarget);

    /// `RETURN` from a `GOSUB`.
    fn return_from_gosub(&mut self);

    /// `END`: stop the program.
    fn end_program(&mut self);

    /// `IF condition THEN`; `inline` for the single-line form.
    fn if_then(&mut self, condition: VariableId, inline: bool) -> Result<()>;

    /// `ELSE IF`, before its condition is compiled.
    fn else_if_begin(&mut self) -> Result<()>;

    /// `ELSE IF condition THEN`, after the condition is compiled.
    fn else_if_then(&mut self, condition: VariableId) -> Result<()>;

    fn else_branch(&mut self) -> Result<()>;

    fn end_if(&mut self) -> Result<()>;

    /// Close every single-line `IF` still open at the end of a line.
    fn end_inline_ifs(&mut self) -> Result<()>;

    fn select_case(&mut self, value: VariableId) -> Result<()>;

    /// `CASE`, before its values are compiled.
    fn case_begin(&mut self) -> Result<()>;

    /// The values of the current `CASE`; any of them matching enters the branch.
    fn case_values(&mut self, values: &[VariableId]) -> Result<()>;

    fn case_else(&mut self) -> Result<()>;

    fn end_select(&mut self) -> Result<()>;

    fn do_begin(&mut self);

    /// `DO WHILE condition` / `DO UNTIL condition`.
    fn do_condition(&mut self, condition: VariableId, until: bool) -> Result<()>;

    /// `LOOP`, optionally `LOOP WHILE condition` / `LOOP UNTIL condition`.
    fn loop_end(&mut self, condition: Option<(VariableId, bool)>) -> Result<()>;

    fn while_begin(&mut self);

    fn while_condition(&mut self, condition: VariableId) -> Result<()>;

    fn wend(&mut self) -> Result<()>;

    fn repeat_begin(&mut self);

    fn until(&mut self, condition: VariableId) -> Result<()>;

    /// `FOR index = from TO to [STEP step]`.
    fn for_begin(
        &mut self,
        index: VariableId,
        from: VariableId,
        to: VariableId,
        step: Option<VariableId>,
    ) -> Result<()>;

    /// `NEXT [index]`.
    fn next(&mut self, index: Option<VariableId>) -> Result<()>;

    /// `EXIT [levels]`.
    fn exit_loop(&mut self, levels: usize) -> Result<()>;

    /// `EXIT IF condition [, levels]`.
    fn exit_loop_if(&mut self, condition: VariableId, levels: usize) -> Result<()>;

    fn begin_gameloop(&mut self);

    fn end_gameloop(&mut self) -> Result<()>;

    /// `ON value GOTO|GOSUB|PROC`, before the targets.
    fn on_begin(&mut self, kind: OnKind, value: VariableId) -> Result<()>;

    /// One target of the current `ON`; the first is taken when value is 1.
    fn on_target(&mut self, target: LabelTarget) -> Result<()>;

    fn on_end(&mut self) -> Result<()>;
}

fn is_if(kind: &FrameKind) -> bool {
    matches!(kind, FrameKind::If { .. })
}

fn is_select(kind: &FrameKind) -> bool {
    matches!(kind, FrameKind::SelectCase { .. })
}

fn is_for(kind: &FrameKind) -> bool {
    matches!(kind, FrameKind::For { .. } | FrameKind::ForMt { .. })
}

fn is_on(kind: &FrameKind) -> bool {
    matches!(kind, FrameKind::On { .. })
}

impl Environment {
    /// Whether code is being generated for a parallel procedure.
    pub(crate) fn in_parallel_procedure(&self) -> bool {
        self.symbols
            .current_procedure()
            .map(|id| self.symbols.procedure(id).protothread)
            .unwrap_or(false)
    }

    fn truth(&mut self, condition: VariableId) -> Result<(Value, usize)> {
        let ty = self.type_of(condition);
        if !ty.is_numeric() {
            return Err(self.error(
                ErrorCode::TypeMismatch,
                format!("a condition must be numeric, found {}", ty),
            ));
        }
        self.touch(condition);
        Ok((self.value_of(condition), self.width(condition)))
    }

    /// Jump to `label` when `condition` is false.
    pub(crate) fn branch_unless(&mut self, condition: VariableId, label: &str) -> Result<()> {
        let (value, bytes) = self.truth(condition)?;
        self.target.cpu.branch_if_zero(&mut self.out, &value, bytes, label);
        Ok(())
    }

    /// Jump to `label` when `condition` is true.
    pub(crate) fn branch_when(&mut self, condition: VariableId, label: &str) -> Result<()> {
        let (value, bytes) = self.truth(condition)?;
        self.target.cpu.branch_if_not_zero(&mut self.out, &value, bytes, label);
        Ok(())
    }

    /// Keep `id` alive until the block it controls is closed.
    ///
    /// Constants are locked in place; anything else is copied into a
    /// resident (or, in a parallel procedure, a local saved with the thread).
    fn hold(&mut self, id: VariableId, ty: VariableType, purpose: &str) -> Result<VariableId> {
        if self.constant_of(id).is_some() {
            self.symbols.lock(id);
            return Ok(id);
        }
        let held = if self.in_parallel_procedure() {
            let name = format!("__{}{}", purpose, self.unique_id());
            self.define_variable(&name, ty)?
        } else {
            let precision = self.precision();
            self.symbols.resident(ty, precision, purpose)
        };
        self.symbols.lock(held);
        self.assign(held, id)?;
        Ok(held)
    }

    fn open(&mut self, kind: FrameKind, prefix: &str) -> String {
        let base = self.make_label(prefix);
        let procedure = self.symbols.current_procedure();
        self.control.push(kind, &base, procedure, self.line, self.span);
        base
    }

    fn pop_frame(
        &mut self,
        accept: fn(&FrameKind) -> bool,
        code: ErrorCode,
        closer: &str,
    ) -> Result<crate::control::Frame> {
        let popped = self.control.pop_expecting(accept, code, closer);
        self.located(popped)
    }

    fn internal(&self, what: &str) -> CompileError {
        self.error(ErrorCode::InternalError, format!("inconsistent {} frame", what))
    }

    fn close_if(&mut self, frame: crate::control::Frame) -> Result<()> {
        let FrameKind::If { else_label, else_seen, .. } = frame.kind else {
            return Err(self.internal("IF"));
        };
        if !else_seen {
            self.out.label(else_label);
        }
        self.out.label(frame.end_label);
        Ok(())
    }

    fn loop_test(
        &mut self,
        index: VariableId,
        to: VariableId,
        step: VariableId,
        step_positive: Option<bool>,
        end: &str,
    ) -> Result<()> {
        match step_positive {
            Some(true) => {
                let past = self.compare(Comparison::Gt, index, to)?;
                self.branch_when(past, end)
            }
            Some(false) => {
                let past = self.compare(Comparison::Lt, index, to)?;
                self.branch_when(past, end)
            }
            None => {
                let downward = self.make_label("fordown");
                let body = self.make_label("forbody");
                let zero = self.integer_constant(0);
                let negative = self.compare(Comparison::Lt, step, zero)?;
                self.branch_when(negative, &downward)?;
                let past = self.compare(Comparison::Gt, index, to)?;
                self.branch_when(past, end)?;
                self.target.cpu.jump(&mut self.out, &body);
                self.out.label(downward);
                let past = self.compare(Comparison::Lt, index, to)?;
                self.branch_when(past, end)?;
                self.out.label(body);
                Ok(())
            }
        }
    }
}

impl FlowEmitter for Environment {
    fn define_label(&mut self, target: LabelTarget) -> Result<()> {
        let defined = self.symbols.labels.define(target.clone(), self.span);
        let name = self.located(defined)?;
        self.out.label(name);
        self.last_label = Some(target);
        Ok(())
    }

    fn goto(&mut self, target: LabelTarget) {
        let name = self.symbols.labels.reference(target, self.span);
        self.target.cpu.jump(&mut self.out, &name);
    }

    fn gosub(&mut self, target: LabelTarget) {
        let name = self.symbols.labels.reference(target, self.span);
        self.target.cpu.call(&mut self.out, &name);
    }

    fn return_from_gosub(&mut self) {
        self.target.cpu.ret(&mut self.out);
    }

    fn end_program(&mut self) {
        self.target.cpu.halt(&mut self.out);
    }

    fn if_then(&mut self, condition: VariableId, inline: bool) -> Result<()> {
        let else_label = self.make_label("else");
        self.branch_unless(condition, &else_label)?;
        self.open(
            FrameKind::If {
                else_label,
                else_seen: false,
                inline,
            },
            "if",
        );
        Ok(())
    }

    fn else_if_begin(&mut self) -> Result<()> {
        let next = self.make_label("else");
        let span = self.span;
        let frame = self
            .control
            .expect_top(is_if, ErrorCode::ElseWithoutIf, "ELSE IF")
            .map_err(|e| e.or_at(span))?;
        let end = frame.end_label.clone();
        let FrameKind::If { else_label, else_seen, .. } = &mut frame.kind else {
            return Err(CompileError::new(ErrorCode::InternalError, "inconsistent IF frame", span));
        };
        if *else_seen {
            return Err(CompileError::new(
                ErrorCode::ElseIfAfterElse,
                "ELSE IF after ELSE",
                span,
            ));
        }
        let previous = std::mem::replace(else_label, next);
        self.target.cpu.jump(&mut self.out, &end);
        self.out.label(previous);
        Ok(())
    }

    fn else_if_then(&mut self, condition: VariableId) -> Result<()> {
        let span = self.span;
        let frame = self
            .control
            .expect_top(is_if, ErrorCode::ElseWithoutIf, "ELSE IF")
            .map_err(|e| e.or_at(span))?;
        let FrameKind::If { else_label, .. } = &frame.kind else {
            return Err(CompileError::new(ErrorCode::InternalError, "inconsistent IF frame", span));
        };
        let else_label = else_label.clone();
        self.branch_unless(condition, &else_label)
    }

    fn else_branch(&mut self) -> Result<()> {
        let span = self.span;
        let frame = self
            .control
            .expect_top(is_if, ErrorCode::ElseWithoutIf, "ELSE")
            .map_err(|e| e.or_at(span))?;
        let end = frame.end_label.clone();
        let FrameKind::If { else_label, else_seen, .. } = &mut frame.kind else {
            return Err(CompileError::new(ErrorCode::InternalError, "inconsistent IF frame", span));
        };
        if *else_seen {
            return Err(CompileError::new(
                ErrorCode::ElseWithoutIf,
                "ELSE already given for this IF",
                span,
            ));
        }
        *else_seen = true;
        let else_label = else_label.clone();
        self.target.cpu.jump(&mut self.out, &end);
        self.out.label(else_label);
        Ok(())
    }

    fn end_if(&mut self) -> Result<()> {
        let frame = self.pop_frame(is_if, ErrorCode::EndifWithoutIf, "ENDIF")?;
        self.close_if(frame)
    }

    fn end_inline_ifs(&mut self) -> Result<()> {
        while let Some(FrameKind::If { inline: true, .. }) = self.control.top().map(|f| &f.kind) {
            let frame = self.pop_frame(is_if, ErrorCode::EndifWithoutIf, "end of line")?;
            self.close_if(frame)?;
        }
        Ok(())
    }

    fn select_case(&mut self, value: VariableId) -> Result<()> {
        let ty = self.type_of(value);
        let value = self.hold(value, ty, "select")?;
        self.open(
            FrameKind::SelectCase {
                value,
                next_label: None,
                case_else: false,
            },
            "select",
        );
        Ok(())
    }

    fn case_begin(&mut self) -> Result<()> {
        let next = self.make_label("case");
        let span = self.span;
        let frame = self
            .control
            .expect_top(is_select, ErrorCode::CaseWithoutSelect, "CASE")
            .map_err(|e| e.or_at(span))?;
        let end = frame.end_label.clone();
        let FrameKind::SelectCase { next_label, case_else, .. } = &mut frame.kind else {
            return Err(CompileError::new(ErrorCode::InternalError, "inconsistent SELECT frame", span));
        };
        if *case_else {
            return Err(CompileError::new(
                ErrorCode::CaseWithoutSelect,
                "CASE after CASE ELSE",
                span,
            ));
        }
        if let Some(previous) = next_label.replace(next) {
            self.target.cpu.jump(&mut self.out, &end);
            self.out.label(previous);
        }
        Ok(())
    }

    fn case_values(&mut self, values: &[VariableId]) -> Result<()> {
        let span = self.span;
        let frame = self
            .control
            .expect_top(is_select, ErrorCode::CaseWithoutSelect, "CASE")
            .map_err(|e| e.or_at(span))?;
        let FrameKind::SelectCase { value, next_label: Some(next), .. } = &frame.kind else {
            return Err(CompileError::new(ErrorCode::CaseWithoutSelect, "CASE values without CASE", span));
        };
        let (selector, next) = (*value, next.clone());
        match values {
            [single] => {
                let matched = self.compare(Comparison::Eq, selector, *single)?;
                self.branch_unless(matched, &next)
            }
            _ => {
                let body = self.make_label("casebody");
                for candidate in values {
                    let matched = self.compare(Comparison::Eq, selector, *candidate)?;
                    self.branch_when(matched, &body)?;
                }
                self.target.cpu.jump(&mut self.out, &next);
                self.out.label(body);
                Ok(())
            }
        }
    }

    fn case_else(&mut self) -> Result<()> {
        let span = self.span;
        let frame = self
            .control
            .expect_top(is_select, ErrorCode::CaseWithoutSelect, "CASE ELSE")
            .map_err(|e| e.or_at(span))?;
        let end = frame.end_label.clone();
        let FrameKind::SelectCase { next_label, case_else, .. } = &mut frame.kind else {
            return Err(CompileError::new(ErrorCode::InternalError, "inconsistent SELECT frame", span));
        };
        if *case_else {
            return Err(CompileError::new(
                ErrorCode::DuplicateCaseElse,
                "CASE ELSE given twice",
                span,
            ));
        }
        *case_else = true;
        if let Some(previous) = next_label.take() {
            self.target.cpu.jump(&mut self.out, &end);
            self.out.label(previous);
        }
        Ok(())
    }

    fn end_select(&mut self) -> Result<()> {
        let frame = self.pop_frame(is_select, ErrorCode::EndSelectWithoutSelect, "END SELECT")?;
        let FrameKind::SelectCase { value, next_label, .. } = frame.kind else {
            return Err(self.internal("SELECT"));
        };
        if let Some(next) = next_label {
            self.out.label(next);
        }
        self.out.label(frame.end_label);
        self.symbols.release(value);
        Ok(())
    }

    fn do_begin(&mut self) {
        let base = self.open(FrameKind::Do, "do");
        self.out.label(base);
    }

    fn do_condition(&mut self, condition: VariableId, until: bool) -> Result<()> {
        let span = self.span;
        let end = self
            .control
            .expect_top(|k| *k == FrameKind::Do, ErrorCode::LoopWithoutDo, "DO WHILE")
            .map_err(|e| e.or_at(span))?
            .end_label
            .clone();
        if until {
            self.branch_when(condition, &end)
        } else {
            self.branch_unless(condition, &end)
        }
    }

    fn loop_end(&mut self, condition: Option<(VariableId, bool)>) -> Result<()> {
        let frame = self.pop_frame(|k| *k == FrameKind::Do, ErrorCode::LoopWithoutDo, "LOOP")?;
        match condition {
            None => self.target.cpu.jump(&mut self.out, &frame.start_label),
            Some((condition, false)) => self.branch_when(condition, &frame.start_label)?,
            Some((condition, true)) => self.branch_unless(condition, &frame.start_label)?,
        }
        self.out.label(frame.end_label);
        Ok(())
    }

    fn while_begin(&mut self) {
        let base = self.open(FrameKind::While, "while");
        self.out.label(base);
    }

    fn while_condition(&mut self, condition: VariableId) -> Result<()> {
        let span = self.span;
        let end = self
            .control
            .expect_top(|k| *k == FrameKind::While, ErrorCode::WendWithoutWhile, "WHILE")
            .map_err(|e| e.or_at(span))?
            .end_label
            .clone();
        self.branch_unless(condition, &end)
    }

    fn wend(&mut self) -> Result<()> {
        let frame = self.pop_frame(|k| *k == FrameKind::While, ErrorCode::WendWithoutWhile, "WEND")?;
        self.target.cpu.jump(&mut self.out, &frame.start_label);
        self.out.label(frame.end_label);
        Ok(())
    }

    fn repeat_begin(&mut self) {
        let base = self.open(FrameKind::Repeat, "repeat");
        self.out.label(base);
    }

    fn until(&mut self, condition: VariableId) -> Result<()> {
        let frame = self.pop_frame(|k| *k == FrameKind::Repeat, ErrorCode::UntilWithoutRepeat, "UNTIL")?;
        self.branch_unless(condition, &frame.start_label)?;
        self.out.label(frame.end_label);
        Ok(())
    }

    fn for_begin(
        &mut self,
        index: VariableId,
        from: VariableId,
        to: VariableId,
        step: Option<VariableId>,
    ) -> Result<()> {
        let ty = self.type_of(index);
        if !ty.is_integer() || ty == VariableType::Bit {
            return Err(self.error(
                ErrorCode::TypeMismatch,
                format!("the index of FOR must be an integer, found {}", ty),
            ));
        }
        self.expect_numeric(from)?;
        self.expect_numeric(to)?;
        self.assign(index, from)?;
        let to = self.hold(to, ty, "forto")?;
        let step = match step {
            Some(step) => {
                self.expect_numeric(step)?;
                step
            }
            None => self.integer_constant(1),
        };
        let step_positive = self.constant_of(step).map(|value| value >= 0);
        let step = self.hold(step, ty.signed(), "forstep")?;

        let kind = if self.in_parallel_procedure() {
            FrameKind::ForMt {
                index,
                to,
                step,
                step_positive,
            }
        } else {
            FrameKind::For {
                index,
                to,
                step,
                step_positive,
            }
        };
        let base = self.open(kind, "for");
        let end = format!("{}_end", base);
        self.out.label(base);
        self.loop_test(index, to, step, step_positive, &end)
    }

    fn next(&mut self, variable: Option<VariableId>) -> Result<()> {
        let frame = self.pop_frame(is_for, ErrorCode::NextWithoutFor, "NEXT")?;
        let (index, to, step) = match frame.kind {
            FrameKind::For { index, to, step, .. } | FrameKind::ForMt { index, to, step, .. } => {
                (index, to, step)
            }
            _ => return Err(self.internal("FOR")),
        };
        if let Some(variable) = variable {
            if variable != index {
                return Err(self.error(
                    ErrorCode::NextVariableMismatch,
                    format!(
                        "NEXT {} does not match FOR {} opened at line {}",
                        self.symbols.variable(variable).name,
                        self.symbols.variable(index).name,
                        frame.line
                    ),
                ));
            }
        }
        let (name, bytes, ty) = (self.real_name(index), self.width(index), self.type_of(index));
        match self.constant_of(step) {
            Some(1) => self.target.cpu.increment(&mut self.out, &name, bytes),
            Some(-1) => self.target.cpu.decrement(&mut self.out, &name, bytes),
            _ => {
                let amount = self.operand(step, ty);
                self.target
                    .cpu
                    .add(&mut self.out, &Value::mem(name.clone()), &amount, &name, bytes);
            }
        }
        self.target.cpu.jump(&mut self.out, &frame.start_label);
        self.out.label(frame.end_label);
        self.symbols.release(to);
        self.symbols.release(step);
        Ok(())
    }

    fn exit_loop(&mut self, levels: usize) -> Result<()> {
        let target = self.control.exit_label(levels);
        let label = self.located(target)?;
        self.target.cpu.jump(&mut self.out, &label);
        Ok(())
    }

    fn exit_loop_if(&mut self, condition: VariableId, levels: usize) -> Result<()> {
        let target = self.control.exit_label(levels);
        let label = self.located(target)?;
        self.branch_when(condition, &label)
    }

    fn begin_gameloop(&mut self) {
        let base = self.open(FrameKind::GameLoop, "gameloop");
        self.out.label(base);
    }

    fn end_gameloop(&mut self) -> Result<()> {
        let frame = self.pop_frame(
            |k| *k == FrameKind::GameLoop,
            ErrorCode::EndGameloopWithoutGameloop,
            "END GAMELOOP",
        )?;
        self.target.cpu.jump(&mut self.out, &frame.start_label);
        self.out.label(frame.end_label);
        Ok(())
    }

    fn on_begin(&mut self, kind: OnKind, value: VariableId) -> Result<()> {
        self.expect_numeric(value)?;
        let ty = self.type_of(value);
        if !ty.is_integer() {
            return Err(self.error(
                ErrorCode::TypeMismatch,
                format!("ON needs an integer selector, found {}", ty),
            ));
        }
        let value = self.hold(value, ty, "on")?;
        self.open(FrameKind::On { kind, value, index: 0 }, "on");
        Ok(())
    }

    fn on_target(&mut self, target: LabelTarget) -> Result<()> {
        let span = self.span;
        let frame = self
            .control
            .expect_top(is_on, ErrorCode::SyntaxError, "ON target")
            .map_err(|e| e.or_at(span))?;
        let end = frame.end_label.clone();
        let FrameKind::On { kind, value, index } = &mut frame.kind else {
            return Err(CompileError::new(ErrorCode::InternalError, "inconsistent ON frame", span));
        };
        *index += 1;
        let (kind, value, index) = (*kind, *value, *index);

        let skip = self.make_label("onnext");
        let (selector, bytes) = (self.value_of(value), self.width(value));
        self.target
            .cpu
            .branch_if_not_equal(&mut self.out, &selector, index as i64, bytes, &skip);
        match kind {
            OnKind::Goto => {
                let name = self.symbols.labels.reference(target, span);
                self.target.cpu.jump(&mut self.out, &name);
            }
            OnKind::Gosub => {
                let name = self.symbols.labels.reference(target, span);
                self.target.cpu.call(&mut self.out, &name);
                self.target.cpu.jump(&mut self.out, &end);
            }
            OnKind::Proc => {
                let name = match target {
                    LabelTarget::Name(name) => name,
                    LabelTarget::Line(line) => line.to_string(),
                };
                let entry = self.callable_procedure(&name)?;
                self.target.cpu.call(&mut self.out, &entry);
                self.target.cpu.jump(&mut self.out, &end);
            }
        }
        self.out.label(skip);
        Ok(())
    }

    fn on_end(&mut self) -> Result<()> {
        let frame = self.pop_frame(is_on, ErrorCode::SyntaxError, "end of ON")?;
        let FrameKind::On { value, .. } = frame.kind else {
            return Err(self.internal("ON"));
        };
        self.out.label(frame.end_label);
        self.symbols.release(value);
        Ok(())
    }
}
