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

//! Protothreads.
//!
//! A parallel procedure is a state machine. The scheduler (`PTRUN`) calls
//! its entry once per round; the entry restores the locals of the running
//! instance, dispatches on the step saved by the last `YIELD`, runs to the
//! next `YIELD`, saves step and locals, and returns.
//!
//! Locals are kept per instance in save slots: one array per byte of each
//! local, indexed by the running thread (`PTCURRENT`).

use super::variables::VariableEmitter;
use crate::backend::Value;
use crate::environment::Environment;
use crate::error::{ErrorCode, Result};
use crate::symbols::{ProcedureId, VariableId, VariableScope};
use crate::types::VariableType;

/// Extension trait for protothreads.
pub trait ThreadEmitter {
    /// `SPAWN name[args]`: start an instance; the result is its thread id
    /// (255 when every slot is taken).
    fn spawn(&mut self, name: &str, args: &[VariableId]) -> Result<VariableId>;

    /// `YIELD`: suspend the running instance; in the main program, run one
    /// scheduler round.
    fn yield_thread(&mut self) -> Result<()>;

    /// `KILL [id]`; without an id, ends the running instance.
    fn kill(&mut self, thread: Option<VariableId>) -> Result<()>;

    /// `RESPAWN id`: restart an instance from its first step.
    fn respawn(&mut self, thread: VariableId) -> Result<()>;

    /// `WAIT PARALLEL id`: run rounds until the instance ends.
    fn wait_parallel(&mut self, thread: VariableId) -> Result<()>;

    /// `RUN PARALLEL`: one scheduler round.
    fn run_parallel(&mut self) -> Result<()>;

    /// `RUNNING(id)`: $FF while the instance is alive.
    fn thread_running(&mut self, thread: VariableId) -> Result<VariableId>;

    /// `THREAD ID`: the running instance.
    fn thread_id(&mut self) -> Result<VariableId>;
}

impl Environment {
    /// Save slot label of byte `byte` of local `variable`.
    fn slot(&mut self, variable: &str, byte: usize) -> String {
        let slot = format!("{}_PT{}", variable, byte);
        self.thread_slots.insert(slot.clone());
        slot
    }

    /// Real names and widths of the locals saved with each instance of `id`.
    fn threaded_locals(&self, id: ProcedureId) -> Vec<(String, usize)> {
        self.symbols
            .variables()
            .filter(|(_, v)| v.scope == VariableScope::Local(id) && v.threaded && v.array.is_none())
            .map(|(_, v)| (v.real_name.clone(), v.size().max(1)))
            .collect()
    }

    /// `PTCURRENT` widened to an offset.
    fn thread_offset(&mut self) -> Value {
        self.target
            .cpu
            .copy_extend(&mut self.out, &Value::mem("PTCURRENT"), 1, false, "PTOFFSET", 2);
        Value::mem("PTOFFSET")
    }

    fn set_step(&mut self, step: usize) -> Result<()> {
        self.target
            .cpu
            .copy(&mut self.out, &Value::imm(step as i64), "MATHA", 1);
        self.call_runtime("thread", "PTSETSTEP")
    }

    fn load_thread_id(&mut self, thread: VariableId) -> Result<()> {
        self.expect_numeric(thread)?;
        self.load(thread, "MATHA", 1);
        Ok(())
    }

    /// Entry of a parallel procedure: jump to the dispatcher placed after
    /// the body, where every resumption point is known.
    pub(crate) fn protothread_prologue(&mut self, id: ProcedureId) {
        let procedure = self.symbols.procedure(id);
        let (dispatch, first) = (
            format!("{}_dispatch", procedure.real_name),
            procedure.step_label(0),
        );
        self.target.cpu.jump(&mut self.out, &dispatch);
        self.out.label(first);
    }

    /// End the running instance and leave.
    pub(crate) fn protothread_finish(&mut self, id: ProcedureId) -> Result<()> {
        self.call_runtime("thread", "PTEND")?;
        let suspend = self.symbols.procedure(id).suspend_label();
        self.target.cpu.jump(&mut self.out, &suspend);
        Ok(())
    }

    /// Suspension point and dispatcher of a parallel procedure.
    pub(crate) fn protothread_epilogue(&mut self, id: ProcedureId) -> Result<()> {
        let locals = self.threaded_locals(id);
        let procedure = self.symbols.procedure(id).clone();

        self.out.label(procedure.suspend_label());
        if !locals.is_empty() {
            let offset = self.thread_offset();
            for (name, bytes) in &locals {
                for byte in 0..*bytes {
                    let slot = self.slot(name, byte);
                    let value = Value::mem(format!("{}+{}", name, byte));
                    self.target.cpu.store_indexed(&mut self.out, &slot, &offset, &value, 1);
                }
            }
        }
        self.target.cpu.ret(&mut self.out);

        self.out.label(format!("{}_dispatch", procedure.real_name));
        if !locals.is_empty() {
            let offset = self.thread_offset();
            for (name, bytes) in &locals {
                for byte in 0..*bytes {
                    let slot = self.slot(name, byte);
                    let dest = format!("{}+{}", name, byte);
                    self.target.cpu.load_indexed(&mut self.out, &slot, &offset, &dest, 1);
                }
            }
        }
        self.call_runtime("thread", "PTGETSTEP")?;
        for step in 1..=procedure.steps {
            let next = self.make_label("ptnext");
            self.target
                .cpu
                .branch_if_not_equal(&mut self.out, &Value::mem("MATHR"), step as i64, 1, &next);
            self.target.cpu.jump(&mut self.out, &procedure.step_label(step));
            self.out.label(next);
        }
        self.target.cpu.jump(&mut self.out, &procedure.step_label(0));
        Ok(())
    }
}

impl ThreadEmitter for Environment {
    fn spawn(&mut self, name: &str, args: &[VariableId]) -> Result<VariableId> {
        let id = self.find_procedure_or_fail(name)?;
        let procedure = self.symbols.procedure(id).clone();
        if !procedure.protothread {
            return Err(self.error(
                ErrorCode::SpawnOnNormalProcedure,
                format!("{} is not a parallel procedure and cannot be spawned", name),
            ));
        }
        if procedure.parameters.len() != args.len() {
            return Err(self.error(
                ErrorCode::WrongNumberOfParameters,
                format!(
                    "{} takes {} parameters, {} given",
                    name,
                    procedure.parameters.len(),
                    args.len()
                ),
            ));
        }
        for (parameter, arg) in procedure.parameters.iter().zip(args) {
            if let Some(variable) = parameter.variable {
                self.assign(variable, *arg)?;
            }
        }
        self.deploy("vars")?;
        self.deploy("thread")?;
        self.target
            .cpu
            .address_of(&mut self.out, &procedure.real_name, "PTADDR");
        self.call_runtime("thread", "PTSPAWN")?;

        // Arguments go to the save slots of the new instance.
        let parameters: Vec<(String, usize)> = procedure
            .parameters
            .iter()
            .filter_map(|p| p.variable)
            .map(|v| (self.real_name(v), self.width(v)))
            .collect();
        if !parameters.is_empty() {
            let (stored, full) = (self.make_label("spawned"), self.make_label("spawnfull"));
            self.target
                .cpu
                .branch_if_not_equal(&mut self.out, &Value::mem("MATHR"), 0xFF, 1, &stored);
            self.target.cpu.jump(&mut self.out, &full);
            self.out.label(stored);
            self.target
                .cpu
                .copy_extend(&mut self.out, &Value::mem("MATHR"), 1, false, "PTOFFSET", 2);
            let offset = Value::mem("PTOFFSET");
            for (name, bytes) in parameters {
                for byte in 0..bytes {
                    let slot = self.slot(&name, byte);
                    let value = Value::mem(format!("{}+{}", name, byte));
                    self.target.cpu.store_indexed(&mut self.out, &slot, &offset, &value, 1);
                }
            }
            self.out.label(full);
        }
        Ok(self.result_from("MATHR", 1, VariableType::Thread, "thread id"))
    }

    fn yield_thread(&mut self) -> Result<()> {
        let Some(id) = self.symbols.current_procedure().filter(|_| self.in_parallel_procedure()) else {
            return self.call_runtime("thread", "PTRUN");
        };
        let step = {
            let procedure = self.symbols.procedure_mut(id);
            procedure.steps += 1;
            procedure.steps
        };
        self.set_step(step)?;
        let procedure = self.symbols.procedure(id);
        let (suspend, resume) = (procedure.suspend_label(), procedure.step_label(step));
        self.target.cpu.jump(&mut self.out, &suspend);
        self.out.label(resume);
        Ok(())
    }

    fn kill(&mut self, thread: Option<VariableId>) -> Result<()> {
        match thread {
            Some(thread) => {
                self.load_thread_id(thread)?;
                self.call_runtime("thread", "PTKILL")
            }
            None => match self.symbols.current_procedure() {
                Some(id) if self.in_parallel_procedure() => self.protothread_finish(id),
                _ => Err(self.error(
                    ErrorCode::SpawnOnNormalProcedure,
                    "KILL without a thread outside of a parallel procedure",
                )),
            },
        }
    }

    fn respawn(&mut self, thread: VariableId) -> Result<()> {
        self.load_thread_id(thread)?;
        self.call_runtime("thread", "PTRESPAWN")
    }

    fn wait_parallel(&mut self, thread: VariableId) -> Result<()> {
        self.load_thread_id(thread)?;
        self.call_runtime("thread", "PTWAIT")
    }

    fn run_parallel(&mut self) -> Result<()> {
        self.call_runtime("thread", "PTRUN")
    }

    fn thread_running(&mut self, thread: VariableId) -> Result<VariableId> {
        self.load_thread_id(thread)?;
        self.call_runtime("thread", "PTRUNNING")?;
        Ok(self.result_from("MATHR", 1, VariableType::Byte, "running"))
    }

    fn thread_id(&mut self) -> Result<VariableId> {
        self.deploy("vars")?;
        self.deploy("thread")?;
        Ok(self.result_from("PTCURRENT", 1, VariableType::Thread, "thread id"))
    }
}

#[cfg(test)]
mod tests {
    use super::super::procedures::ProcedureEmitter;
    use super::super::testing::{c64, calls, code};
    use super::*;
    use crate::emitter::LineKind;
    use crate::symbols::Parameter;
    use crate::types::FloatPrecision;

    fn labels(env: &Environment) -> Vec<String> {
        env.out
            .lines()
            .iter()
            .filter(|l| l.kind == LineKind::Label)
            .map(|l| l.text.clone())
            .collect()
    }

    #[test]
    fn test_yield_mints_resumption_points() {
        let mut env = c64();
        env.declare_procedure("BLINK", vec![], true).unwrap();
        env.begin_procedure("BLINK").unwrap();
        env.yield_thread().unwrap();
        env.yield_thread().unwrap();
        env.end_procedure(None).unwrap();

        let labels = labels(&env);
        for wanted in [
            "PROC_BLINK_step0",
            "PROC_BLINK_step1",
            "PROC_BLINK_step2",
            "PROC_BLINK_suspend",
            "PROC_BLINK_dispatch",
        ] {
            assert!(labels.iter().any(|l| l == wanted), "{} missing", wanted);
        }
        let lines = code(&env);
        assert!(lines.contains(&"JMP PROC_BLINK_step2".to_string()));
        assert_eq!(calls(&env, "PTSETSTEP"), 2);
        assert_eq!(calls(&env, "PTGETSTEP"), 1);
        assert_eq!(calls(&env, "PTEND"), 1);
    }

    #[test]
    fn test_locals_are_saved_per_instance() {
        let mut env = c64();
        env.declare_procedure("COUNT", vec![], true).unwrap();
        env.begin_procedure("COUNT").unwrap();
        let n = env.define_variable("N", VariableType::Word).unwrap();
        assert!(env.symbols.variable(n).threaded);
        env.yield_thread().unwrap();
        env.end_procedure(None).unwrap();
        assert!(env.thread_slots.contains("_COUNT_N_PT0"));
        assert!(env.thread_slots.contains("_COUNT_N_PT1"));
    }

    #[test]
    fn test_spawn_requires_parallel_procedure() {
        let mut env = c64();
        env.declare_procedure("PLAIN", vec![], false).unwrap();
        let err = env.spawn("PLAIN", &[]).unwrap_err();
        assert_eq!(err.code, ErrorCode::SpawnOnNormalProcedure);
        assert_eq!(err.code_str(), "E078bis");
    }

    #[test]
    fn test_spawn_passes_arguments_through_slots() {
        let mut env = c64();
        let speed = Parameter::new("SPEED", VariableType::Byte, FloatPrecision::Fast);
        env.declare_procedure("MOVER", vec![speed], true).unwrap();
        let two = env.integer_constant(2);
        let id = env.spawn("MOVER", &[two]).unwrap();
        assert_eq!(env.type_of(id), VariableType::Thread);
        assert_eq!(calls(&env, "PTSPAWN"), 1);
        assert!(env.thread_slots.contains("_MOVER_SPEED_PT0"));
        let lines = code(&env);
        assert!(lines.contains(&"LDA #<PROC_MOVER".to_string()));
    }

    #[test]
    fn test_yield_in_main_program_runs_a_round() {
        let mut env = c64();
        env.yield_thread().unwrap();
        assert_eq!(calls(&env, "PTRUN"), 1);
    }

    #[test]
    fn test_kill_and_wait_take_the_id() {
        let mut env = c64();
        let t = env.define_variable("T", VariableType::Thread).unwrap();
        env.kill(Some(t)).unwrap();
        env.wait_parallel(t).unwrap();
        let running = env.thread_running(t).unwrap();
        assert_eq!(env.type_of(running), VariableType::Byte);
        assert!(code(&env).iter().filter(|l| *l == "STA MATHA").count() >= 3);
        assert_eq!(env.kill(None).unwrap_err().code, ErrorCode::SpawnOnNormalProcedure);
    }
}
