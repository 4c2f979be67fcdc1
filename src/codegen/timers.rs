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

//! EVERY timers.
//!
//! There is one timer per program: installing a second handler replaces
//! the first. The handler runs from the frame interrupt and is skipped
//! while a previous tick is still running it.

use crate::backend::MachineOp;
use crate::environment::{EveryHandler, Environment};
use crate::error::{Result, WarningCode};
use crate::symbols::{LabelTarget, VariableId};
use crate::types::VariableType;

/// Extension trait for the timer statements.
pub trait TimerEmitter {
    /// `EVERY period TICKS GOSUB target`.
    fn every_gosub(&mut self, period: VariableId, target: LabelTarget) -> Result<()>;

    /// `EVERY period TICKS CALL procedure`.
    fn every_call(&mut self, period: VariableId, procedure: &str) -> Result<()>;

    /// `EVERY ON`.
    fn every_on(&mut self) -> Result<()>;

    /// `EVERY OFF`.
    fn every_off(&mut self) -> Result<()>;
}

impl Environment {
    fn install_timer(&mut self, period: VariableId, handler: String, shown: String) -> Result<()> {
        self.expect_numeric(period)?;
        if let Some(previous) = &self.every {
            if previous.label != shown {
                let message = format!(
                    "EVERY handler {} (line {}) replaced by {}",
                    previous.label, previous.line, shown
                );
                self.warn(WarningCode::EveryHandlerReplaced, message);
            }
        }
        let address = self.temporary(VariableType::Address, "timer handler");
        let name = self.real_name(address);
        self.target.cpu.address_of(&mut self.out, &handler, &name);
        if self.machine_call(MachineOp::TimerSet, &[period, address])? {
            self.every = Some(EveryHandler {
                label: shown,
                line: self.line,
            });
        }
        Ok(())
    }
}

impl TimerEmitter for Environment {
    fn every_gosub(&mut self, period: VariableId, target: LabelTarget) -> Result<()> {
        let handler = self.symbols.labels.reference(target.clone(), self.span);
        self.install_timer(period, handler, target.to_string())
    }

    fn every_call(&mut self, period: VariableId, procedure: &str) -> Result<()> {
        let handler = self.callable_procedure(procedure)?;
        self.install_timer(period, handler, procedure.to_ascii_uppercase())
    }

    fn every_on(&mut self) -> Result<()> {
        self.machine_call(MachineOp::TimerOn, &[]).map(|_| ())
    }

    fn every_off(&mut self) -> Result<()> {
        self.machine_call(MachineOp::TimerOff, &[]).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::super::procedures::ProcedureEmitter;
    use super::super::testing::{c64, calls, code, coco};
    use super::super::variables::VariableEmitter;
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_every_installs_handler_address() {
        let mut env = c64();
        let period = env.integer_constant(50);
        env.every_gosub(period, LabelTarget::Line(100)).unwrap();
        env.every_on().unwrap();
        let lines = code(&env);
        assert!(lines.contains(&"LDA #<_line100".to_string()));
        assert!(lines.contains(&"STA TIMERHANDLER".to_string()));
        assert_eq!(calls(&env, "TIMERSET"), 1);
        assert_eq!(calls(&env, "TIMERON"), 1);
        assert_eq!(env.every.as_ref().unwrap().label, "100");
    }

    #[test]
    fn test_second_handler_replaces_first_with_warning() {
        let mut env = c64();
        let period = env.integer_constant(10);
        env.every_gosub(period, LabelTarget::Name("TICK".into())).unwrap();
        env.every_gosub(period, LabelTarget::Name("TOCK".into())).unwrap();
        assert_eq!(env.warnings.len(), 1);
        assert_eq!(env.warnings[0].code, WarningCode::EveryHandlerReplaced);
        assert_eq!(env.every.as_ref().unwrap().label, "TOCK");
    }

    #[test]
    fn test_same_handler_does_not_warn() {
        let mut env = coco();
        let period = env.integer_constant(10);
        env.every_gosub(period, LabelTarget::Name("TICK".into())).unwrap();
        env.every_gosub(period, LabelTarget::Name("TICK".into())).unwrap();
        assert!(env.warnings.is_empty());
    }

    #[test]
    fn test_every_call_targets_procedure() {
        let mut env = c64();
        env.declare_procedure("BLINK", Vec::new(), false).unwrap();
        let period = env.integer_constant(25);
        env.every_call(period, "BLINK").unwrap();
        assert!(code(&env).contains(&"LDA #<PROC_BLINK".to_string()));
        env.every_off().unwrap();
        assert_eq!(calls(&env, "TIMEROFF"), 1);
    }

    #[test]
    fn test_every_call_rejects_parallel_procedure() {
        let mut env = c64();
        env.declare_procedure("WORKER", Vec::new(), true).unwrap();
        let period = env.integer_constant(25);
        let err = env.every_call(period, "WORKER").unwrap_err();
        assert_eq!(err.code, ErrorCode::CallOnParallelProcedure);
    }
}
