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

//! The compilation environment.
//!
//! One [`Environment`] exists per compilation. It owns every table the
//! code generator touches (symbols, control stack, memory model, assets,
//! the output buffers) and is passed explicitly to each operation; the
//! code generation verbs are extension traits implemented on it.

use crate::assets::AssetPipeline;
use crate::backend::{MachineOp, RuntimeModule, Target, Value};
use crate::config::CompilerOptions;
use crate::control::ControlStack;
use crate::emitter::{parse_snippet, preprocess, AsmLine, Emitter};
use crate::error::{CompileError, ErrorCode, Result, Span, Warning, WarningCode};
use crate::memory::{BankType, ExpansionBanks, MemoryModel};
use crate::symbols::{LabelTarget, SymbolTables, VariableId};
use crate::types::FloatPrecision;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Facts about the whole program gathered before code generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgramFeatures {
    /// Some DATA statement holds a floating point literal.
    pub data_float: bool,
}

/// The handler currently installed by `EVERY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EveryHandler {
    pub label: String,
    pub line: usize,
}

pub struct Environment {
    pub options: CompilerOptions,
    pub target: Target,
    pub symbols: SymbolTables,
    pub control: ControlStack,
    pub memory: MemoryModel,
    pub assets: AssetPipeline,
    pub out: Emitter,
    pub warnings: Vec<Warning>,
    pub features: ProgramFeatures,
    /// Directory relative asset paths are resolved against.
    pub source_dir: PathBuf,
    /// Span of the statement being compiled.
    pub span: Span,
    /// Source line of the statement being compiled (1-based).
    pub line: usize,
    /// Mode selected by the last `BITMAP ENABLE`.
    pub screen_mode: Option<u8>,
    pub every: Option<EveryHandler>,
    /// Last label or line number defined; owns the following DATA.
    pub last_label: Option<LabelTarget>,
    /// Index of the STORAGE block being declared.
    pub storage: Option<usize>,
    /// Entries called once at startup, in deploy order.
    pub startup: Vec<&'static str>,
    /// Per-thread save slots already reserved.
    pub(crate) thread_slots: HashSet<String>,
    unique: usize,
    unique_resource: usize,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("target", &self.target)
            .field("line", &self.line)
            .field("warnings", &self.warnings.len())
            .finish()
    }
}

impl Environment {
    pub fn new(options: CompilerOptions, target: Target) -> Self {
        Self::with_assets(options, target, AssetPipeline::default())
    }

    /// Create an environment reading assets through `assets`.
    pub fn with_assets(options: CompilerOptions, target: Target, assets: AssetPipeline) -> Self {
        let mut memory = MemoryModel::new();
        for (start, end, kind) in target.machine.memory_areas() {
            memory.add_area(start, end, kind);
        }
        for area in &options.extra_areas {
            memory.add_area(area.start, area.end, area.kind);
        }
        let space = target.machine.ram_size();
        for bank_type in BankType::ALL {
            memory.add_bank(bank_type.segment(), bank_type, None, space);
        }
        if let Some(expansion) = options.expansion.clone().or_else(|| target.machine.expansion()) {
            let windows: Vec<usize> = expansion.windows.iter().map(|w| *w as usize).collect();
            memory.expansion = Some(ExpansionBanks::new(
                &windows,
                expansion.banks as usize,
                expansion.bank_size as usize,
            ));
        }
        let mut out = Emitter::new();
        for entry in &options.preferred_inline {
            out.prefer(&entry.to_ascii_uppercase());
        }
        Self {
            options,
            target,
            symbols: SymbolTables::new(),
            control: ControlStack::new(),
            memory,
            assets,
            out,
            warnings: Vec::new(),
            features: ProgramFeatures::default(),
            source_dir: PathBuf::from("."),
            span: Span::default(),
            line: 0,
            screen_mode: None,
            every: None,
            last_label: None,
            storage: None,
            startup: Vec::new(),
            thread_slots: HashSet::new(),
            unique: 0,
            unique_resource: 0,
        }
    }

    pub fn unique_id(&mut self) -> usize {
        self.unique += 1;
        self.unique
    }

    /// Identifier of the next loaded resource, starting at 1.
    pub fn unique_resource_id(&mut self) -> usize {
        self.unique_resource += 1;
        self.unique_resource
    }

    pub fn make_label(&mut self, prefix: &str) -> String {
        self.out.make_label(prefix)
    }

    pub fn set_position(&mut self, span: Span, line: usize) {
        self.span = span;
        self.line = line;
    }

    pub fn precision(&self) -> FloatPrecision {
        self.options.float_precision
    }

    /// A located error at the current statement.
    pub fn error(&self, code: ErrorCode, message: impl Into<String>) -> CompileError {
        CompileError::new(code, message, self.span)
    }

    /// Record an advisory diagnostic at the current statement.
    pub fn warn(&mut self, code: WarningCode, message: impl Into<String>) {
        if !self.options.warnings_enabled {
            return;
        }
        let warning = Warning::new(code, message, self.span);
        log::warn!("{} at line {}: {}", code.code(), self.line, warning.message);
        self.warnings.push(warning);
    }

    /// The operand reading variable `id`: its value when it is a known
    /// constant, its storage otherwise.
    pub fn value_of(&self, id: VariableId) -> Value {
        let variable = self.symbols.variable(id);
        match variable.constant_value() {
            Some(value) => Value::Immediate(value),
            None => Value::Memory(variable.real_name.clone()),
        }
    }

    pub fn in_procedure(&self) -> bool {
        self.symbols.current_procedure().is_some()
    }

    // ------------------------------------------------------------------
    // Runtime library
    // ------------------------------------------------------------------

    /// Preprocessor defines of the runtime modules.
    pub fn defines(&self) -> HashMap<String, String> {
        let mut defines: HashMap<String, String> = self
            .target
            .machine
            .defines()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let precision = self.options.float_precision;
        let flag = |set: bool| if set { "1" } else { "0" }.to_string();
        let threads = self.options.protothread_count as usize;
        let dstrings = self.options.dstring.count as usize;
        let entries = [
            ("FLOAT_SINGLE", flag(precision == FloatPrecision::Single)),
            ("FLOAT_BYTES", precision.bytes().to_string()),
            ("READ_SAFE", flag(self.options.read_safe)),
            ("DATA_FLOAT", flag(self.features.data_float)),
            ("DSCOUNT", dstrings.to_string()),
            ("DSSPACE", self.options.dstring.space.to_string()),
            ("DSTABLESIZE", (dstrings * 4).to_string()),
            ("THREADS", threads.to_string()),
            ("THREADWORDS", (threads * 2).to_string()),
        ];
        for (name, value) in entries {
            defines.insert(name.to_string(), value);
        }
        defines
    }

    fn module(&self, name: &str) -> Result<&'static RuntimeModule> {
        self.target.module(name).ok_or_else(|| {
            self.error(
                ErrorCode::InternalError,
                format!("runtime module {} is missing for {}", name, self.target.kind),
            )
        })
    }

    /// Preprocessed lines of a runtime module, framed by boundaries.
    fn module_lines(&self, module: &RuntimeModule) -> Result<Vec<AsmLine>> {
        let text = preprocess(module.name, module.source, &self.defines())?;
        let mut lines = vec![AsmLine::boundary(format!("runtime {}", module.name))];
        lines.extend(parse_snippet(&text, self.target.cpu.syntax()));
        lines.push(AsmLine::boundary(format!("end of {}", module.name)));
        Ok(lines)
    }

    /// Whether a first deployment may be emitted in place.
    fn can_inline(&self) -> bool {
        self.out.depth() == 1 && !self.in_procedure()
    }

    /// Make sure `module` (and what it requires) is part of the program.
    ///
    /// The first deployment in the main program emits the body where it
    /// is needed with a jump over it; inside procedures and captured
    /// buffers the body is queued for the end of the program.
    pub fn deploy(&mut self, module: &str) -> Result<()> {
        if self.out.is_deployed(module) {
            return Ok(());
        }
        let runtime = self.module(module)?;
        self.out.mark_deployed(module);
        for required in runtime.requires {
            self.deploy(required)?;
        }
        let body = self.module_lines(runtime)?;
        log::debug!("deploying runtime module {}", module);
        if self.can_inline() {
            let skip = self.make_label("skip");
            self.target.cpu.jump(&mut self.out, &skip);
            self.out.extend(body);
            self.out.label(skip);
        } else {
            self.out.defer(module, body);
        }
        if let Some(init) = runtime.init {
            self.startup.push(init);
        }
        Ok(())
    }

    /// Deploy `module` at the end of the program whatever the context.
    pub fn deploy_deferred(&mut self, module: &str) -> Result<()> {
        if self.out.is_deployed(module) {
            return Ok(());
        }
        let runtime = self.module(module)?;
        self.out.mark_deployed(module);
        for required in runtime.requires {
            self.deploy_deferred(required)?;
        }
        let body = self.module_lines(runtime)?;
        self.out.defer(module, body);
        if let Some(init) = runtime.init {
            self.startup.push(init);
        }
        Ok(())
    }

    /// Emit the inline form of `entry` if the processor has one and it is
    /// preferred. Returns `false` when the routine must be called.
    pub fn deploy_preferred(&mut self, entry: &str) -> Result<bool> {
        if !self.out.is_preferred(entry) {
            return Ok(false);
        }
        let Some(body) = self.target.cpu.inline_body(entry) else {
            return Ok(false);
        };
        let mut defines = self.defines();
        defines.insert("U".to_string(), self.unique_id().to_string());
        let text = preprocess(entry, body, &defines)?;
        let lines = parse_snippet(&text, self.target.cpu.syntax());
        self.out.extend(lines);
        Ok(true)
    }

    /// Call `entry` of runtime `module`, inline when preferred.
    pub fn call_runtime(&mut self, module: &str, entry: &str) -> Result<()> {
        self.deploy("vars")?;
        if self.deploy_preferred(entry)? {
            return Ok(());
        }
        self.deploy(module)?;
        self.target.cpu.call(&mut self.out, entry);
        Ok(())
    }

    /// Call a machine operation with `args` bound to its parameters.
    ///
    /// Returns `false`, after a W006 warning, when the machine lacks it.
    pub fn machine_call(&mut self, op: MachineOp, args: &[VariableId]) -> Result<bool> {
        let Some(routine) = self.target.machine.routine(op) else {
            self.warn(
                WarningCode::UnsupportedOnTarget,
                format!("{} is not available on {}", op.keyword(), self.target.machine.name()),
            );
            return Ok(false);
        };
        self.deploy(routine.module)?;
        for (&(param, width), &arg) in routine.params.iter().zip(args) {
            let variable = self.symbols.variable(arg);
            let size = variable.size().max(1);
            let signed = variable.var_type.is_signed();
            let value = self.value_of(arg);
            self.target
                .cpu
                .copy_extend(&mut self.out, &value, size, signed, param, width);
        }
        self.target.cpu.call(&mut self.out, routine.entry);
        Ok(true)
    }
}
