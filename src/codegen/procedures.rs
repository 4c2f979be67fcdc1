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

//! Procedures: definition, calls and results.
//!
//! A procedure body is emitted where it is written, jumped over by the
//! code around it. Parameters and locals are static variables named after
//! the procedure; arguments are copied into them before the call. The
//! value of `RETURN value` / `END PROC[value]` lands in a result variable
//! the caller copies out.

use super::variables::VariableEmitter;
use crate::backend::Value;
use crate::control::FrameKind;
use crate::environment::Environment;
use crate::error::{ErrorCode, Result};
use crate::symbols::{Parameter, Procedure, ProcedureId, Variable, VariableId, VariableScope};
use crate::types::VariableType;

/// Extension trait for procedures.
pub trait ProcedureEmitter {
    /// Register a procedure found by the pre-scan, before any call to it.
    fn declare_procedure(
        &mut self,
        name: &str,
        parameters: Vec<Parameter>,
        parallel: bool,
    ) -> Result<ProcedureId>;

    /// `DECLARE PROC name AT address [ON registers]`: an external routine.
    fn declare_external(
        &mut self,
        name: &str,
        address: u16,
        parameters: Vec<Parameter>,
    ) -> Result<ProcedureId>;

    /// `[PARALLEL] PROCEDURE name[...]`.
    fn begin_procedure(&mut self, name: &str) -> Result<ProcedureId>;

    /// `END PROC [value]`.
    fn end_procedure(&mut self, result: Option<VariableId>) -> Result<()>;

    /// `RETURN value` or `EXIT PROC` inside a procedure.
    fn return_value(&mut self, value: Option<VariableId>) -> Result<()>;

    /// `name[args]`, `CALL name[args]` or `PROC name[args]`.
    ///
    /// Returns a copy of the result when the procedure produces one.
    fn call_procedure(&mut self, name: &str, args: &[VariableId]) -> Result<Option<VariableId>>;
}

/// Registers accepted by `DECLARE PROC ... ON`, per processor.
fn registers(cpu: &str) -> &'static [&'static str] {
    match cpu {
        "6809" => &["A", "B", "D", "X", "Y", "U"],
        _ => &["A", "X", "Y"],
    }
}

impl Environment {
    /// Entry label of a parameterless procedure `name` that may be called.
    pub(crate) fn callable_procedure(&mut self, name: &str) -> Result<String> {
        let id = self.find_procedure_or_fail(name)?;
        let procedure = self.symbols.procedure(id);
        if procedure.protothread {
            return Err(self.error(
                ErrorCode::CallOnParallelProcedure,
                format!("{} is a parallel procedure and must be spawned", name),
            ));
        }
        Ok(self.entry_of(id))
    }

    pub(crate) fn find_procedure_or_fail(&self, name: &str) -> Result<ProcedureId> {
        self.symbols.find_procedure(name).ok_or_else(|| {
            self.error(
                ErrorCode::UndefinedProcedure,
                format!("undefined procedure {}", name),
            )
        })
    }

    fn entry_of(&self, id: ProcedureId) -> String {
        let procedure = self.symbols.procedure(id);
        match (procedure.declared, procedure.address) {
            (true, Some(address)) => format!("${:04X}", address),
            _ => procedure.real_name.clone(),
        }
    }

    /// Static locals receiving the arguments of `id`.
    fn bind_parameters(&mut self, id: ProcedureId) {
        let procedure = self.symbols.procedure(id).clone();
        let mut parameters = procedure.parameters;
        for parameter in parameters.iter_mut() {
            let real_name = format!(
                "_{}_{}",
                crate::symbols::sanitize(&procedure.name),
                crate::symbols::sanitize(&parameter.name)
            );
            let mut variable = Variable::new(
                parameter.name.clone(),
                real_name,
                parameter.var_type,
                parameter.precision,
                VariableScope::Local(id),
            );
            variable.threaded = procedure.protothread;
            variable.assigned = true;
            let variable = self.symbols.add_variable(variable);
            self.symbols.bind_local(id, &parameter.name, variable);
            parameter.variable = Some(variable);
        }
        self.symbols.procedure_mut(id).parameters = parameters;
    }

    /// The result variable of `id`, created with `ty` on first need.
    fn result_variable(&mut self, id: ProcedureId, ty: VariableType) -> VariableId {
        if let Some(result) = self.symbols.procedure(id).result {
            return result;
        }
        let ty = match ty {
            t if t.is_integer() && t.size(self.precision()) < 2 => {
                if t.is_signed() {
                    VariableType::SWord
                } else {
                    VariableType::Word
                }
            }
            VariableType::String => VariableType::DString,
            t => t,
        };
        let procedure = self.symbols.procedure(id);
        let mut variable = Variable::new(
            format!("{}[]", procedure.name),
            format!("{}_RESULT", procedure.real_name),
            ty,
            self.precision(),
            VariableScope::Local(id),
        );
        variable.used = true;
        let result = self.symbols.add_variable(variable);
        self.symbols.procedure_mut(id).result = Some(result);
        result
    }

    fn store_result(&mut self, id: ProcedureId, value: VariableId) -> Result<()> {
        let ty = self.type_of(value);
        let result = self.result_variable(id, ty);
        self.assign(result, value)
    }

    /// Leave the procedure being compiled.
    fn leave_procedure(&mut self, id: ProcedureId) -> Result<()> {
        if self.symbols.procedure(id).protothread {
            self.protothread_finish(id)
        } else {
            self.target.cpu.ret(&mut self.out);
            Ok(())
        }
    }

    fn load_register(&mut self, register: &str, value: VariableId) -> Result<()> {
        let cpu = self.target.cpu.name();
        let register = register.to_ascii_uppercase();
        if !registers(cpu).contains(&register.as_str()) {
            return Err(self.error(
                ErrorCode::SyntaxError,
                format!("{} has no register {}", cpu, register),
            ));
        }
        let wide = cpu == "6809" && matches!(register.as_str(), "D" | "X" | "Y" | "U");
        let operand = match self.value_of(value) {
            Value::Immediate(v) if wide => format!("#${:04X}", v & 0xFFFF),
            Value::Immediate(v) => format!("#${:02X}", v & 0xFF),
            Value::Memory(name) => name,
        };
        self.touch(value);
        self.out.code(format!("LD{} {}", register, operand));
        Ok(())
    }
}

impl ProcedureEmitter for Environment {
    fn declare_procedure(
        &mut self,
        name: &str,
        parameters: Vec<Parameter>,
        parallel: bool,
    ) -> Result<ProcedureId> {
        let mut procedure = Procedure::new(name, self.span);
        procedure.parameters = parameters;
        procedure.protothread = parallel;
        let declared = self.symbols.declare_procedure(procedure);
        let id = self.located(declared)?;
        self.bind_parameters(id);
        log::debug!("procedure {} declared (parallel: {})", name, parallel);
        Ok(id)
    }

    fn declare_external(
        &mut self,
        name: &str,
        address: u16,
        parameters: Vec<Parameter>,
    ) -> Result<ProcedureId> {
        let mut procedure = Procedure::new(name, self.span);
        procedure.parameters = parameters;
        procedure.declared = true;
        procedure.defined = true;
        procedure.address = Some(address);
        let declared = self.symbols.declare_procedure(procedure);
        let id = self.located(declared)?;
        self.bind_parameters(id);
        Ok(id)
    }

    fn begin_procedure(&mut self, name: &str) -> Result<ProcedureId> {
        let span = self.span;
        let begun = self.symbols.begin_procedure(name, span);
        let id = self.located(begun)?;
        let real_name = self.symbols.procedure(id).real_name.clone();
        self.control
            .push(FrameKind::Procedure { id }, &real_name, Some(id), self.line, span);
        self.target
            .cpu
            .jump(&mut self.out, &format!("{}_end", real_name));
        self.out.boundary(format!("procedure {}", name));
        self.out.label(real_name);
        if self.symbols.procedure(id).protothread {
            self.protothread_prologue(id);
        }
        Ok(id)
    }

    fn end_procedure(&mut self, result: Option<VariableId>) -> Result<()> {
        let popped = self.control.pop_expecting(
            |k| matches!(k, FrameKind::Procedure { .. }),
            ErrorCode::EndProcOutsideProcedure,
            "END PROC",
        );
        let frame = self.located(popped)?;
        let FrameKind::Procedure { id } = frame.kind else {
            return Err(self.error(ErrorCode::InternalError, "inconsistent PROCEDURE frame"));
        };
        if let Some(value) = result {
            self.store_result(id, value)?;
        }
        self.leave_procedure(id)?;
        if self.symbols.procedure(id).protothread {
            self.protothread_epilogue(id)?;
        }
        let name = self.symbols.procedure(id).name.clone();
        self.out.boundary(format!("end of procedure {}", name));
        self.out.label(frame.end_label);
        let ended = self.symbols.end_procedure();
        self.located(ended)?;
        Ok(())
    }

    fn return_value(&mut self, value: Option<VariableId>) -> Result<()> {
        let Some(id) = self.symbols.current_procedure() else {
            return Err(self.error(
                ErrorCode::ReturnOutsideProcedure,
                "RETURN with a value outside of a procedure",
            ));
        };
        if let Some(value) = value {
            self.store_result(id, value)?;
        }
        self.leave_procedure(id)
    }

    fn call_procedure(&mut self, name: &str, args: &[VariableId]) -> Result<Option<VariableId>> {
        let id = self.find_procedure_or_fail(name)?;
        let procedure = self.symbols.procedure(id).clone();
        if procedure.protothread {
            return Err(self.error(
                ErrorCode::CallOnParallelProcedure,
                format!("{} is a parallel procedure and must be spawned", name),
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
            match (&parameter.register, parameter.variable) {
                (Some(register), _) => self.load_register(register, *arg)?,
                (None, Some(variable)) => self.assign(variable, *arg)?,
                (None, None) => {}
            }
        }
        let entry = self.entry_of(id);
        self.target.cpu.call(&mut self.out, &entry);

        let result = match procedure.result {
            Some(result) => result,
            None if procedure.declared => return Ok(None),
            // Called before its body: the result is a signed word until proven otherwise.
            None => self.result_variable(id, VariableType::SWord),
        };
        let ty = self.type_of(result);
        let copy = self.temporary(ty, "procedure result");
        if ty == VariableType::DString {
            let name = self.real_name(copy);
            self.target.cpu.copy(&mut self.out, &Value::imm(0), &name, 1);
        }
        self.assign(copy, result)?;
        Ok(Some(copy))
    }
}
