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

//! Symbol tables of a compilation.
//!
//! This module owns:
//! - constants and labels
//! - variables, split into globals, per-procedure locals, per-procedure
//!   temporary pools and the resident pool
//! - procedures and their signatures
//! - DATA segments, static strings and storage descriptors
//! - the `GLOBAL` / `SHARED` visibility patterns
//!
//! Every entity lives in a vector and is referenced by a typed index.

pub mod constant;
pub mod data;
pub mod labels;
pub mod patterns;
pub mod procedure;
pub mod storage;
pub mod strings;
pub mod variable;

pub use constant::{Constant, ConstantValue};
pub use data::{DataSegment, DataSegments, Datum, DatumValue};
pub use labels::{LabelTarget, Labels};
pub use patterns::Patterns;
pub use procedure::{Parameter, Procedure, ProcedureId};
pub use storage::{FileStorage, Storage};
pub use strings::{StaticString, StaticStrings, StringId};
pub use variable::{
    sanitize, ArrayInfo, BitSlot, ImageInfo, TemporaryGuard, TemporaryState, Variable,
    VariableId, VariableScope,
};

use crate::error::{CompileError, ErrorCode, Span};
use crate::types::{FloatPrecision, VariableType};
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

/// Prefix of temporaries in the generated assembly.
pub const TEMPORARY_PREFIX: &str = "Ttmp";
/// Prefix of resident temporaries in the generated assembly.
pub const RESIDENT_PREFIX: &str = "Trtmp";

#[derive(Debug, Default)]
pub struct SymbolTables {
    variables: Vec<Variable>,
    globals: HashMap<String, VariableId>,
    locals: HashMap<ProcedureId, HashMap<String, VariableId>>,
    temporaries: HashMap<Option<ProcedureId>, Vec<VariableId>>,
    residents: Vec<VariableId>,
    temporary_counter: usize,
    constants: Vec<Constant>,
    constant_index: HashMap<String, usize>,
    procedures: Vec<Procedure>,
    procedure_index: HashMap<String, ProcedureId>,
    current_procedure: Option<ProcedureId>,
    global_patterns: Patterns,
    shared_patterns: HashMap<ProcedureId, Patterns>,
    bits: usize,
    pub labels: Labels,
    pub data: DataSegments,
    pub strings: StaticStrings,
    pub storages: Vec<Storage>,
}

impl SymbolTables {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Constants
    // ------------------------------------------------------------------

    /// Define a constant. Redefining it with the same value is a no-op.
    pub fn define_constant(
        &mut self,
        name: &str,
        value: ConstantValue,
    ) -> Result<&Constant, CompileError> {
        if let Some(&index) = self.constant_index.get(name) {
            let existing = &self.constants[index];
            if existing.value != value {
                return Err(CompileError::unlocated(
                    ErrorCode::ConstantRedefined,
                    format!(
                        "constant {} already defined as {} {}",
                        name,
                        existing.value.kind(),
                        existing.value
                    ),
                ));
            }
            return Ok(&self.constants[index]);
        }
        let index = self.constants.len();
        self.constants.push(Constant {
            name: name.to_string(),
            real_name: format!("CONST_{}", sanitize(name)),
            value,
            imported: false,
        });
        self.constant_index.insert(name.to_string(), index);
        Ok(&self.constants[index])
    }

    pub fn constant(&self, name: &str) -> Option<&Constant> {
        self.constant_index.get(name).map(|&i| &self.constants[i])
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------

    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id.0]
    }

    pub fn variable_mut(&mut self, id: VariableId) -> &mut Variable {
        &mut self.variables[id.0]
    }

    pub fn variables(&self) -> impl Iterator<Item = (VariableId, &Variable)> {
        self.variables
            .iter()
            .enumerate()
            .map(|(i, v)| (VariableId(i), v))
    }

    /// Store a variable built by the caller (resources, arrays of data).
    pub fn add_variable(&mut self, variable: Variable) -> VariableId {
        let id = VariableId(self.variables.len());
        if variable.scope == VariableScope::Global && !variable.name.is_empty() {
            self.globals.insert(variable.name.clone(), id);
        }
        self.variables.push(variable);
        id
    }

    fn is_global_name(&self, name: &str) -> bool {
        if self.global_patterns.matches(name) {
            return true;
        }
        match self.current_procedure {
            Some(proc) => self
                .shared_patterns
                .get(&proc)
                .map(|p| p.matches(name))
                .unwrap_or(false),
            None => true,
        }
    }

    /// Find a variable visible from the current scope.
    pub fn lookup(&self, name: &str) -> Option<VariableId> {
        if let Some(proc) = self.current_procedure {
            if let Some(id) = self.locals.get(&proc).and_then(|t| t.get(name)) {
                return Some(*id);
            }
        }
        if self.is_global_name(name) {
            return self.globals.get(name).copied();
        }
        None
    }

    /// Define a variable in the current scope.
    ///
    /// An existing variable of the same type is returned unchanged; a
    /// different type is E154.
    pub fn define_variable(
        &mut self,
        name: &str,
        var_type: VariableType,
        precision: FloatPrecision,
    ) -> Result<VariableId, CompileError> {
        if let Some(id) = self.lookup(name) {
            let existing = &self.variables[id.0];
            if existing.var_type != var_type {
                return Err(CompileError::unlocated(
                    ErrorCode::VariableRedefined,
                    format!(
                        "variable {} redefined as {} (was {})",
                        name, var_type, existing.var_type
                    ),
                ));
            }
            return Ok(id);
        }

        let id = VariableId(self.variables.len());
        let global = self.is_global_name(name);
        let (scope, real_name) = match self.current_procedure {
            Some(proc) if !global => (
                VariableScope::Local(proc),
                format!(
                    "_{}_{}",
                    sanitize(&self.procedures[proc.0].name),
                    sanitize(name)
                ),
            ),
            _ => (VariableScope::Global, format!("_{}", sanitize(name))),
        };

        let mut variable = Variable::new(name, real_name, var_type, precision, scope);
        if var_type == VariableType::Bit {
            variable.bit_slot = Some(self.allocate_bit());
        }
        match scope {
            VariableScope::Local(proc) => {
                variable.threaded = self.procedures[proc.0].protothread;
                self.locals
                    .entry(proc)
                    .or_default()
                    .insert(name.to_string(), id);
            }
            _ => {
                self.globals.insert(name.to_string(), id);
            }
        }
        self.variables.push(variable);
        Ok(id)
    }

    /// Make `id` visible as `name` inside procedure `proc`.
    pub fn bind_local(&mut self, proc: ProcedureId, name: &str, id: VariableId) {
        self.locals
            .entry(proc)
            .or_default()
            .insert(name.to_string(), id);
    }

    /// Make the resource `id` reachable as `name` in the current scope.
    pub fn alias(&mut self, name: &str, id: VariableId) {
        match self.current_procedure {
            Some(proc) if !self.is_global_name(name) => self.bind_local(proc, name, id),
            _ => {
                self.globals.insert(name.to_string(), id);
            }
        }
    }

    /// Find a variable, failing with E158 when it does not exist.
    pub fn retrieve(&self, name: &str) -> Result<VariableId, CompileError> {
        self.lookup(name).ok_or_else(|| {
            CompileError::unlocated(
                ErrorCode::UndefinedVariable,
                format!("undefined variable {}", name),
            )
        })
    }

    /// Find a variable or define it with `default` when implicit definition is allowed.
    pub fn retrieve_or_define(
        &mut self,
        name: &str,
        default: VariableType,
        precision: FloatPrecision,
        explicit: bool,
    ) -> Result<VariableId, CompileError> {
        match self.lookup(name) {
            Some(id) => Ok(id),
            None if explicit => self.retrieve(name),
            None => self.define_variable(name, default, precision),
        }
    }

    /// Allocate the next slot of the shared bit bytes.
    pub fn allocate_bit(&mut self) -> BitSlot {
        let slot = BitSlot {
            byte: self.bits / 8,
            bit: (self.bits % 8) as u8,
        };
        self.bits += 1;
        slot
    }

    /// Number of bytes holding `BIT` variables.
    pub fn bit_bytes(&self) -> usize {
        self.bits.div_ceil(8)
    }

    // ------------------------------------------------------------------
    // Temporaries
    // ------------------------------------------------------------------

    /// Take a free temporary of `var_type` from the current procedure's pool,
    /// allocating a new one if none is free.
    pub fn temporary(
        &mut self,
        var_type: VariableType,
        precision: FloatPrecision,
        purpose: &str,
    ) -> VariableId {
        let pool = self.temporaries.entry(self.current_procedure).or_default();
        for &id in pool.iter() {
            let candidate = &self.variables[id.0];
            if candidate.var_type == var_type
                && candidate.precision == precision
                && candidate.temporary_state() == Some(TemporaryState::Free)
            {
                if let Some(state) = &candidate.temporary {
                    state.set(TemporaryState::InUse);
                }
                let variable = &mut self.variables[id.0];
                variable.value = None;
                variable.value_string = None;
                variable.value_float = None;
                variable.purpose = Some(purpose.to_string());
                return id;
            }
        }

        let id = VariableId(self.variables.len());
        let real_name = format!("{}{}", TEMPORARY_PREFIX, self.temporary_counter);
        self.temporary_counter += 1;
        let mut variable = Variable::new(
            real_name.clone(),
            real_name,
            var_type,
            precision,
            VariableScope::Temporary(self.current_procedure),
        );
        variable.temporary = Some(Rc::new(Cell::new(TemporaryState::InUse)));
        variable.purpose = Some(purpose.to_string());
        if var_type == VariableType::Bit {
            variable.bit_slot = Some(BitSlot {
                byte: self.bits / 8,
                bit: (self.bits % 8) as u8,
            });
            self.bits += 1;
        }
        pool.push(id);
        self.variables.push(variable);
        id
    }

    /// Same policy as [`SymbolTables::temporary`], against the global resident pool.
    pub fn resident(
        &mut self,
        var_type: VariableType,
        precision: FloatPrecision,
        purpose: &str,
    ) -> VariableId {
        for &id in &self.residents {
            let candidate = &self.variables[id.0];
            if candidate.var_type == var_type
                && candidate.precision == precision
                && candidate.temporary_state() == Some(TemporaryState::Free)
            {
                if let Some(state) = &candidate.temporary {
                    state.set(TemporaryState::InUse);
                }
                self.variables[id.0].purpose = Some(purpose.to_string());
                return id;
            }
        }

        let id = VariableId(self.variables.len());
        let real_name = format!("{}{}", RESIDENT_PREFIX, self.residents.len());
        let mut variable = Variable::new(
            real_name.clone(),
            real_name,
            var_type,
            precision,
            VariableScope::Resident,
        );
        variable.temporary = Some(Rc::new(Cell::new(TemporaryState::InUse)));
        variable.purpose = Some(purpose.to_string());
        self.residents.push(id);
        self.variables.push(variable);
        id
    }

    /// Borrow a temporary that returns to the pool when the guard drops.
    pub fn scratch(
        &mut self,
        var_type: VariableType,
        precision: FloatPrecision,
        purpose: &str,
    ) -> TemporaryGuard {
        let id = self.temporary(var_type, precision, purpose);
        let state = match &self.variables[id.0].temporary {
            Some(state) => state.clone(),
            None => Rc::new(Cell::new(TemporaryState::InUse)),
        };
        TemporaryGuard::new(id, state)
    }

    /// Keep a temporary reserved until it is explicitly released.
    pub fn lock(&mut self, id: VariableId) {
        if let Some(state) = &self.variables[id.0].temporary {
            state.set(TemporaryState::Locked);
        }
    }

    /// Return a temporary to its pool. Locked temporaries are unlocked.
    pub fn release(&mut self, id: VariableId) {
        if let Some(state) = &self.variables[id.0].temporary {
            state.set(TemporaryState::Free);
        }
    }

    /// Free every in-use temporary of the current scope. Called at the end
    /// of each statement; locked temporaries stay reserved.
    pub fn reset_temporaries(&mut self) {
        let pools = [
            self.temporaries.get(&self.current_procedure),
            Some(&self.residents),
        ];
        for pool in pools.into_iter().flatten() {
            for id in pool {
                if let Some(state) = &self.variables[id.0].temporary {
                    if state.get() == TemporaryState::InUse {
                        state.set(TemporaryState::Free);
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Visibility patterns
    // ------------------------------------------------------------------

    /// `GLOBAL pattern`: matching names are global from every procedure.
    pub fn add_global_pattern(&mut self, pattern: &str) {
        self.global_patterns.add(pattern);
    }

    /// `SHARED pattern`: matching names are global inside the current procedure.
    pub fn add_shared_pattern(&mut self, pattern: &str) {
        match self.current_procedure {
            Some(proc) => self.shared_patterns.entry(proc).or_default().add(pattern),
            None => self.global_patterns.add(pattern),
        }
    }

    // ------------------------------------------------------------------
    // Procedures
    // ------------------------------------------------------------------

    /// Register a procedure signature ahead of its body.
    pub fn declare_procedure(&mut self, procedure: Procedure) -> Result<ProcedureId, CompileError> {
        if self.procedure_index.contains_key(&procedure.name) {
            return Err(CompileError::new(
                ErrorCode::ProcedureAlreadyDefined,
                format!("procedure {} already defined", procedure.name),
                procedure.span,
            ));
        }
        let id = ProcedureId(self.procedures.len());
        self.procedure_index.insert(procedure.name.clone(), id);
        self.procedures.push(procedure);
        Ok(id)
    }

    pub fn find_procedure(&self, name: &str) -> Option<ProcedureId> {
        self.procedure_index.get(name).copied()
    }

    pub fn procedure(&self, id: ProcedureId) -> &Procedure {
        &self.procedures[id.0]
    }

    pub fn procedure_mut(&mut self, id: ProcedureId) -> &mut Procedure {
        &mut self.procedures[id.0]
    }

    pub fn procedures(&self) -> &[Procedure] {
        &self.procedures
    }

    pub fn current_procedure(&self) -> Option<ProcedureId> {
        self.current_procedure
    }

    /// Enter the body of `name`, declaring it if the pre-scan did not.
    pub fn begin_procedure(&mut self, name: &str, span: Span) -> Result<ProcedureId, CompileError> {
        if let Some(current) = self.current_procedure {
            return Err(CompileError::new(
                ErrorCode::NestedProcedure,
                format!(
                    "procedure {} cannot be defined inside procedure {}",
                    name, self.procedures[current.0].name
                ),
                span,
            ));
        }
        let id = match self.find_procedure(name) {
            Some(id) => id,
            None => self.declare_procedure(Procedure::new(name, span))?,
        };
        if self.procedures[id.0].defined {
            return Err(CompileError::new(
                ErrorCode::ProcedureAlreadyDefined,
                format!("procedure {} already defined", name),
                span,
            ));
        }
        self.procedures[id.0].defined = true;
        self.current_procedure = Some(id);
        Ok(id)
    }

    /// Leave the current procedure body.
    pub fn end_procedure(&mut self) -> Result<ProcedureId, CompileError> {
        self.current_procedure.take().ok_or_else(|| {
            CompileError::unlocated(
                ErrorCode::EndProcOutsideProcedure,
                "END PROC outside of a procedure",
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: FloatPrecision = FloatPrecision::Fast;

    #[test]
    fn test_define_is_idempotent() {
        let mut symbols = SymbolTables::new();
        let a = symbols.define_variable("A", VariableType::Byte, FAST).unwrap();
        assert_eq!(symbols.define_variable("A", VariableType::Byte, FAST).unwrap(), a);
        assert_eq!(symbols.retrieve("A").unwrap(), a);
        assert_eq!(symbols.variable(a).real_name, "_A");
    }

    #[test]
    fn test_redefinition_with_other_type() {
        let mut symbols = SymbolTables::new();
        symbols.define_variable("A", VariableType::Byte, FAST).unwrap();
        let err = symbols
            .define_variable("A", VariableType::Word, FAST)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::VariableRedefined);
        assert!(err.message.contains('A'));
    }

    #[test]
    fn test_explicit_retrieval() {
        let mut symbols = SymbolTables::new();
        let err = symbols
            .retrieve_or_define("X", VariableType::Word, FAST, true)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UndefinedVariable);
        assert!(symbols
            .retrieve_or_define("X", VariableType::Word, FAST, false)
            .is_ok());
    }

    #[test]
    fn test_temporary_reuse_after_release() {
        let mut symbols = SymbolTables::new();
        let t1 = symbols.temporary(VariableType::Word, FAST, "sum");
        let t2 = symbols.temporary(VariableType::Word, FAST, "sum");
        assert_ne!(t1, t2);
        symbols.release(t1);
        assert_eq!(symbols.temporary(VariableType::Word, FAST, "again"), t1);
    }

    #[test]
    fn test_locked_temporary_is_not_reused() {
        let mut symbols = SymbolTables::new();
        let t1 = symbols.temporary(VariableType::Byte, FAST, "bound");
        symbols.lock(t1);
        symbols.reset_temporaries();
        assert_ne!(symbols.temporary(VariableType::Byte, FAST, "other"), t1);
    }

    #[test]
    fn test_scratch_guard_returns_temporary() {
        let mut symbols = SymbolTables::new();
        let id = {
            let guard = symbols.scratch(VariableType::Byte, FAST, "scratch");
            guard.id()
        };
        assert_eq!(symbols.temporary(VariableType::Byte, FAST, "x"), id);
    }

    #[test]
    fn test_locals_and_shared() {
        let mut symbols = SymbolTables::new();
        let global = symbols.define_variable("SCORE", VariableType::Word, FAST).unwrap();
        symbols.begin_procedure("draw", Span::new(0, 4)).unwrap();
        assert!(symbols.lookup("SCORE").is_none());
        let local = symbols.define_variable("SCORE", VariableType::Word, FAST).unwrap();
        assert_ne!(local, global);
        assert_eq!(symbols.variable(local).real_name, "_draw_SCORE");
        symbols.end_procedure().unwrap();

        symbols.begin_procedure("update", Span::new(10, 16)).unwrap();
        symbols.add_shared_pattern("SC*");
        assert_eq!(symbols.lookup("SCORE"), Some(global));
    }

    #[test]
    fn test_nested_procedure() {
        let mut symbols = SymbolTables::new();
        symbols.begin_procedure("a", Span::new(0, 1)).unwrap();
        let err = symbols.begin_procedure("b", Span::new(5, 6)).unwrap_err();
        assert_eq!(err.code, ErrorCode::NestedProcedure);
    }

    #[test]
    fn test_constant_redefinition() {
        let mut symbols = SymbolTables::new();
        symbols
            .define_constant("LIVES", ConstantValue::Integer(3))
            .unwrap();
        assert!(symbols
            .define_constant("LIVES", ConstantValue::Integer(3))
            .is_ok());
        let err = symbols
            .define_constant("LIVES", ConstantValue::String("3".into()))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConstantRedefined);
    }

    #[test]
    fn test_bits_pack_eight_per_byte() {
        let mut symbols = SymbolTables::new();
        for i in 0..9 {
            let id = symbols
                .define_variable(&format!("F{}", i), VariableType::Bit, FAST)
                .unwrap();
            let slot = symbols.variable(id).bit_slot.unwrap();
            assert_eq!(slot.byte, i / 8);
            assert_eq!(slot.bit as usize, i % 8);
        }
        assert_eq!(symbols.bit_bytes(), 2);
    }
}
