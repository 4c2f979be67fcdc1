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

//! Final program layout.
//!
//! The composer turns the generated code into one assembly source:
//! load stub and startup, the main program, deferred runtime bodies,
//! then the DATA area, static strings and the storage of every variable,
//! each in its own segment where the assembler knows segments.

use super::cfg::{linker_config, LinkerLayout};
use super::rom::CARTRIDGE_CODE_SIZE;
use crate::backend::{atari, MachineOp, Value};
use crate::codegen::BIT_BYTES_LABEL;
use crate::config::OutputFormat;
use crate::emitter::{render, AsmLine, Emitter, Syntax};
use crate::environment::Environment;
use crate::error::{CompileError, Result};
use crate::memory::BankType;
use crate::symbols::{DatumValue, Variable};
use crate::types::encode_float;

/// Label of the first DATA value.
pub const DATA_START_LABEL: &str = "DATASTART";
/// Label of the byte ending the DATA area.
pub const DATA_END_LABEL: &str = "DATAPTRE";
/// Label of the line number index used by computed RESTORE.
pub const DATA_INDEX_LABEL: &str = "DATAINDEX";

/// Label of the bytes each expansion resource is paged into.
pub fn window_label(window: usize) -> String {
    format!("BANKWINDOW{}", window)
}

/// The laid out program, ready for the assembler.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedProgram {
    pub lines: Vec<AsmLine>,
    pub assembly: String,
    /// ld65 configuration, for targets linked by ld65.
    pub linker_config: Option<String>,
    pub format: OutputFormat,
    pub load_address: u16,
    /// Contents of every expansion bank, in bank order.
    pub expansion: Vec<Vec<u8>>,
}

fn segment(out: &mut Emitter, syntax: &Syntax, bank_type: BankType) {
    if let Some(directive) = syntax.segment(bank_type.segment()) {
        out.directive(directive);
    }
}

fn data_lines(out: &mut Emitter, syntax: &Syntax, bytes: &[u8]) {
    out.extend(syntax.bytes(bytes).into_iter().map(AsmLine::directive));
}

/// Variables that live somewhere else than the variables segment.
fn placed_elsewhere(variable: &Variable) -> bool {
    variable.imported
        || variable.absolute_address.is_some()
        || variable.expansion.is_some()
        || variable.bit_slot.is_some()
        || variable.value_string.is_some()
}

/// Lay out the program of `env` around the optimized `code`.
///
/// `restores` binds each `RESTORE` symbol to the DATA segment it names.
pub fn compose(
    env: &mut Environment,
    code: Vec<AsmLine>,
    restores: &[(String, String)],
) -> Result<ComposedProgram> {
    let format = env
        .options
        .output_format
        .unwrap_or_else(|| env.target.machine.default_format());
    env.target.check_format(format).map_err(|code| {
        CompileError::unlocated(
            code,
            format!("{} cannot produce {} files", env.target.machine.name(), format),
        )
    })?;
    let load_address = env.target.machine.load_address(format);
    let rom = format == OutputFormat::Rom;

    let startup = env.target.machine.routine(MachineOp::Startup);
    if let Some(routine) = &startup {
        env.deploy_deferred(routine.module)?;
    }
    let deferred = env.out.take_deferred();
    let deployed: Vec<String> = env.out.deployed().into_iter().map(str::to_string).collect();
    let defines: Vec<(String, String)> = env.defines().into_iter().collect();
    let define_pairs: Vec<(&str, String)> = defines
        .iter()
        .map(|(name, value)| (name.as_str(), value.clone()))
        .collect();

    let cpu = env.target.cpu.as_ref();
    let machine = env.target.machine.as_ref();
    let syntax = cpu.syntax();
    let precision = env.options.float_precision;
    let mut out = Emitter::new();
    let mut equates: Vec<String> = Vec::new();
    let mut mapped: Vec<String> = Vec::new();

    log::info!(
        "composing {} program at ${:04X} as {}",
        machine.name(),
        load_address,
        format
    );

    // Code
    segment(&mut out, syntax, BankType::Code);
    out.extend(machine.prologue(load_address));
    if let Some(routine) = &startup {
        cpu.call(&mut out, routine.entry);
    }
    for init in &env.startup {
        cpu.call(&mut out, init);
    }
    let first_variable_store = out.lines().len();
    out.extend(code);

    // Variables
    let variables_bank = env.memory.default_bank(BankType::Variables)?;
    let temporary_bank = env.memory.default_bank(BankType::Temporary)?;
    let mut startup_stores = Emitter::new();
    let mut variables = Emitter::new();
    let mut temporaries = Emitter::new();
    for (_, variable) in env.symbols.variables() {
        if let Some(address) = variable.absolute_address {
            mapped.push(syntax.equate(&variable.real_name, &format!("${:04X}", address)));
            continue;
        }
        if let Some(slot) = &variable.expansion {
            equates.push(syntax.equate(&variable.real_name, &window_label(slot.window)));
            continue;
        }
        if placed_elsewhere(variable) || variable.value_buffer.is_some() {
            continue;
        }
        let (bank, section) = if variable.is_temporary() {
            (temporary_bank, &mut temporaries)
        } else {
            (variables_bank, &mut variables)
        };
        let name = &variable.real_name;
        let size = if variable.on_storage {
            variable.uncompressed_size
        } else {
            variable.size()
        }
        .max(1);
        env.memory.bank_mut(bank).allocate(name, size)?;
        section.label(name);

        let initial = match (&variable.array, variable.static_init) {
            (Some(array), _) => array.init.clone(),
            (None, true) => variable.value.map(|v| syntax.integer_bytes(v, size)),
            (None, false) => None,
        };
        match initial {
            Some(bytes) if rom => {
                section.directive(syntax.reserve_bytes(size));
                match (variable.array.is_some(), variable.value) {
                    (false, Some(value)) => cpu.copy(&mut startup_stores, &Value::Immediate(value), name, size),
                    _ => {
                        for (i, byte) in bytes.iter().enumerate() {
                            let dest = format!("{}+{}", name, i);
                            cpu.copy(&mut startup_stores, &Value::Immediate(*byte as i64), &dest, 1);
                        }
                    }
                }
            }
            Some(bytes) => data_lines(section, syntax, &bytes),
            None => section.directive(syntax.reserve_bytes(size)),
        }
    }

    for module in &deployed {
        let Some(runtime) = env.target.module(module) else {
            continue;
        };
        for (name, size) in runtime.variable_sizes(&define_pairs) {
            env.memory.bank_mut(variables_bank).allocate(name, size)?;
            variables.label(name);
            variables.directive(syntax.reserve_bytes(size));
        }
    }

    let threads = env.options.protothread_count as usize;
    let mut slots: Vec<&String> = env.thread_slots.iter().collect();
    slots.sort();
    for slot in slots {
        env.memory.bank_mut(variables_bank).allocate(slot, threads)?;
        variables.label(slot.as_str());
        variables.directive(syntax.reserve_bytes(threads));
    }

    let bits = env.symbols.bit_bytes();
    if bits > 0 {
        env.memory.bank_mut(variables_bank).allocate(BIT_BYTES_LABEL, bits)?;
        variables.label(BIT_BYTES_LABEL);
        variables.directive(syntax.reserve_bytes(bits));
    }

    let mut expansion = Vec::new();
    if let Some(banks) = &env.memory.expansion {
        for (window, info) in banks.windows.iter().enumerate() {
            if info.max_block > 0 {
                variables.label(window_label(window));
                variables.directive(syntax.reserve_bytes(info.max_block));
            }
        }
        expansion = banks.banks.iter().map(|b| b.data.clone()).collect();
    }

    if !variables.lines().is_empty() {
        segment(&mut out, syntax, BankType::Variables);
        out.extend(variables.take_lines());
    }
    if !temporaries.lines().is_empty() {
        segment(&mut out, syntax, BankType::Temporary);
        out.extend(temporaries.take_lines());
    }

    let offsets = env.assets.offsets.lines(syntax);
    if !offsets.is_empty() {
        segment(&mut out, syntax, BankType::Data);
        out.extend(offsets);
    }

    // Memory-mapped variables
    out.extend(mapped.into_iter().map(AsmLine::directive));

    // Read-only data
    let data_deployed = deployed.iter().any(|m| m == "data");
    if data_deployed {
        segment(&mut out, syntax, BankType::Data);
        out.label(DATA_START_LABEL);
        for data_segment in env.symbols.data.segments() {
            out.label(&data_segment.real_name);
            for datum in &data_segment.data {
                let mut bytes = vec![datum.tag()];
                match &datum.value {
                    DatumValue::Integer(value) => {
                        bytes.extend(syntax.integer_bytes(*value, datum.var_type.size(precision)))
                    }
                    DatumValue::Float(value) => bytes.extend(encode_float(*value, precision)),
                    DatumValue::String(text) => {
                        bytes.push(text.chars().count().min(255) as u8);
                        bytes.extend(text.chars().take(255).map(|c| machine.encode_char(c)));
                    }
                }
                data_lines(&mut out, syntax, &bytes);
            }
        }
        out.label(DATA_END_LABEL);
        data_lines(&mut out, syntax, &[0]);
        if env.symbols.data.dynamic_restore {
            let mut index = env.symbols.data.line_index();
            index.sort_by_key(|(line, _)| *line);
            out.label(DATA_INDEX_LABEL);
            for (line, name) in index {
                out.directive(syntax.word_value(&format!("${:04X},{}", line, name)));
            }
            out.directive(syntax.word_value(&format!("$FFFF,{}", DATA_END_LABEL)));
        }
    }
    for (symbol, data_segment) in restores {
        equates.push(syntax.equate(symbol, data_segment));
    }

    // Resources travel with the program image.
    let resources: Vec<&Variable> = env
        .symbols
        .variables()
        .map(|(_, v)| v)
        .filter(|v| !placed_elsewhere(v) && v.value_buffer.is_some())
        .collect();
    if !resources.is_empty() {
        segment(&mut out, syntax, BankType::Data);
        for variable in resources {
            if let Some(buffer) = &variable.value_buffer {
                out.label(&variable.real_name);
                data_lines(&mut out, syntax, buffer);
            }
        }
    }

    if !env.symbols.strings.is_empty() {
        segment(&mut out, syntax, BankType::Strings);
        for string in env.symbols.strings.iter() {
            let mut bytes = vec![string.value.chars().count().min(255) as u8];
            bytes.extend(string.value.chars().take(255).map(|c| machine.encode_char(c)));
            out.label(string.id.label());
            data_lines(&mut out, syntax, &bytes);
        }
    }

    // Runtime modules deployed at the end
    if !deferred.is_empty() {
        segment(&mut out, syntax, BankType::Code);
    }
    for (module, body) in deferred {
        log::debug!("appending runtime module {}", module);
        out.extend(body);
    }

    out.extend(equates.into_iter().map(AsmLine::directive));
    out.extend(machine.epilogue());

    let mut lines = out.take_lines();
    let stores = startup_stores.take_lines();
    if !stores.is_empty() {
        lines.splice(first_variable_store..first_variable_store, stores);
    }

    let linker_config = syntax.segments.then(|| {
        let (size, ram) = if rom {
            (
                CARTRIDGE_CODE_SIZE,
                Some((atari::LOAD_ADDRESS, machine.ram_size())),
            )
        } else {
            (machine.ram_size(), None)
        };
        linker_config(&LinkerLayout {
            load_address,
            size,
            ram,
        })
    });

    let assembly = render(&lines, syntax);
    Ok(ComposedProgram {
        lines,
        assembly,
        linker_config,
        format,
        load_address,
        expansion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Target;
    use crate::codegen::{FlowEmitter, VariableEmitter};
    use crate::config::{CompilerOptions, TargetKind};
    use crate::error::ErrorCode;
    use crate::types::VariableType;

    fn environment(kind: TargetKind) -> Environment {
        Environment::new(CompilerOptions::default(), Target::new(kind))
    }

    fn compose_env(env: &mut Environment) -> ComposedProgram {
        env.end_program();
        let code = env.out.take_lines();
        compose(env, code, &[]).unwrap()
    }

    #[test]
    fn test_c64_layout_starts_with_stub_and_startup() {
        let mut env = environment(TargetKind::C64);
        let program = compose_env(&mut env);
        assert_eq!(program.format, OutputFormat::Prg);
        assert_eq!(program.load_address, 0x0801);
        let first_code = program
            .lines
            .iter()
            .find(|l| l.kind == crate::emitter::LineKind::Code)
            .unwrap();
        assert_eq!(first_code.text, "JSR STARTUP");
        assert!(program.assembly.starts_with(".segment \"CODE\"\n"));
        assert!(program.linker_config.unwrap().contains("start = $0801"));
    }

    #[test]
    fn test_variables_are_reserved_in_their_segment() {
        let mut env = environment(TargetKind::C64);
        env.define_variable("A", VariableType::Byte).unwrap();
        let program = compose_env(&mut env);
        let variables = program.assembly.find(".segment \"VARIABLES\"").unwrap();
        let a = program.assembly.find("_A:\n    .res 1").unwrap();
        assert!(a > variables);
        let bank = env.memory.default_bank(BankType::Variables).unwrap();
        assert!(env.memory.bank(bank).allocations.iter().any(|(n, s)| n == "_A" && *s == 1));
    }

    #[test]
    fn test_static_initializer_is_assembled() {
        let mut env = environment(TargetKind::C64);
        let five = env.integer_constant(0x1234);
        env.define_initialized_variable("N", VariableType::Word, five).unwrap();
        let program = compose_env(&mut env);
        assert!(program.assembly.contains("_N:\n    .byte $34,$12"));
    }

    #[test]
    fn test_coco_has_no_linker_config_and_ends_with_entry() {
        let mut env = environment(TargetKind::Coco);
        env.define_variable("A", VariableType::Word).unwrap();
        let program = compose_env(&mut env);
        assert!(program.linker_config.is_none());
        assert!(program.assembly.starts_with("    ORG $2800\nCODESTART\n"));
        assert!(program.assembly.contains("_A\n    RZB 2"));
        assert!(program.assembly.trim_end().ends_with("END CODESTART"));
    }

    #[test]
    fn test_sections_follow_layout_order() {
        let source = "DIM a AS BYTE\nDIM border AS BYTE AT $D020\nDATA 1\nREAD a\nPRINT \"HI\"\nborder = a";
        let compilation = crate::compile(source, CompilerOptions::default(), TargetKind::C64).unwrap();
        let assembly = compilation.program.assembly;
        let at = |needle: &str| assembly.find(needle).unwrap_or_else(|| panic!("{} missing", needle));
        let code = at("JSR DATAREADNUMBER");
        let variables = at(".segment \"VARIABLES\"");
        let mapped = at("_BORDER = $D020");
        let data = at("DATASTART:");
        let strings = at("_STR0:");
        let runtime = at("STARTUP:");
        assert!(code < variables);
        assert!(variables < mapped);
        assert!(mapped < data);
        assert!(data < strings);
        assert!(strings < runtime);
    }

    #[test]
    fn test_format_not_available_on_machine() {
        let mut options = CompilerOptions::default();
        options.output_format = Some(OutputFormat::Xex);
        let mut env = Environment::new(options, Target::new(TargetKind::C64));
        let error = compose(&mut env, Vec::new(), &[]).unwrap_err();
        assert_eq!(error.code, ErrorCode::OutputFormatMismatch);
    }

    #[test]
    fn test_cartridge_initializes_variables_at_startup() {
        let mut options = CompilerOptions::default();
        options.output_format = Some(OutputFormat::Rom);
        let mut env = Environment::new(options, Target::new(TargetKind::Atari));
        let seven = env.integer_constant(7);
        env.define_initialized_variable("N", VariableType::Byte, seven).unwrap();
        let program = compose_env(&mut env);
        assert_eq!(program.load_address, atari::CARTRIDGE_START);
        assert!(program.assembly.contains("_N:\n    .res 1"));
        let store = program.assembly.find("STA _N").unwrap();
        let startup = program.assembly.find("JSR STARTUP").unwrap();
        assert!(store > startup);
        let cfg = program.linker_config.unwrap();
        assert!(cfg.contains("VARIABLES: load = RAM, type = bss"));
    }
}
