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

//! Procedures: ordinary, parallel (protothreads) and declared (external).

use super::variable::VariableId;
use crate::error::Span;
use crate::types::{FloatPrecision, VariableType};

/// Index of a procedure in the symbol tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcedureId(pub usize);

/// A formal parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub var_type: VariableType,
    pub precision: FloatPrecision,
    pub by_value: bool,
    /// Register the value is passed in, for declared procedures.
    pub register: Option<String>,
    /// Local variable receiving the argument, once the body is compiled.
    pub variable: Option<VariableId>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, var_type: VariableType, precision: FloatPrecision) -> Self {
        Self {
            name: name.into(),
            var_type,
            precision,
            by_value: true,
            register: None,
            variable: None,
        }
    }
}

/// A procedure signature and its compilation state.
#[derive(Debug, Clone)]
pub struct Procedure {
    pub name: String,
    /// Entry label in the generated assembly.
    pub real_name: String,
    pub parameters: Vec<Parameter>,
    /// Types returned with `RETURN value` / `END PROC[value]`.
    pub returns: Vec<VariableType>,
    /// Parallel procedure compiled as a protothread.
    pub protothread: bool,
    /// External routine at a fixed address (`DECLARE PROC ... AT`).
    pub declared: bool,
    pub system: bool,
    pub address: Option<u16>,
    /// Body has been compiled.
    pub defined: bool,
    /// Variable receiving the result of the last call.
    pub result: Option<VariableId>,
    /// Number of YIELD points minted so far.
    pub steps: usize,
    pub span: Span,
}

impl Procedure {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        let name = name.into();
        Self {
            real_name: format!("PROC_{}", super::variable::sanitize(&name)),
            name,
            parameters: Vec::new(),
            returns: Vec::new(),
            protothread: false,
            declared: false,
            system: false,
            address: None,
            defined: false,
            result: None,
            steps: 0,
            span,
        }
    }

    /// Label of the protothread resumption point `step`.
    pub fn step_label(&self, step: usize) -> String {
        format!("{}_step{}", self.real_name, step)
    }

    /// Label every YIELD jumps to after saving its step.
    pub fn suspend_label(&self) -> String {
        format!("{}_suspend", self.real_name)
    }
}
