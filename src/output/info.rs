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

//! The `-I` compilation report.

use super::composer::ComposedProgram;
use crate::environment::Environment;
use crate::optimizer::OptimizerStats;
use std::fmt::Write;

/// Bytes of resource data shown per dump line.
const DUMP_WIDTH: usize = 16;

fn hex_dump(report: &mut String, data: &[u8]) {
    for (row, chunk) in data.chunks(DUMP_WIDTH).enumerate() {
        let bytes: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
        let _ = writeln!(report, "    {:04X}: {}", row * DUMP_WIDTH, bytes.join(" "));
    }
}

/// Render the report of a finished compilation.
pub fn render_info(env: &Environment, program: &ComposedProgram, stats: &OptimizerStats) -> String {
    let mut report = String::new();
    let _ = writeln!(report, "ugBC compilation report");
    let _ = writeln!(
        report,
        "target: {} ({})",
        env.target.kind,
        env.target.machine.name()
    );
    let _ = writeln!(report, "cpu: {}", env.target.cpu.name());
    let _ = writeln!(report, "format: {}", program.format);
    let _ = writeln!(report, "load address: ${:04X}", program.load_address);
    let _ = writeln!(
        report,
        "optimizer: {} cycle(s), {} line(s) removed, about {} byte(s) saved",
        stats.cycles, stats.removed_lines, stats.saved_bytes
    );

    let _ = writeln!(report, "\nbanks:");
    for bank in env.memory.banks() {
        let _ = writeln!(
            report,
            "  {:<10} {:>6} / {:>6} bytes",
            bank.name,
            bank.allocated(),
            bank.space
        );
    }

    let modules = env.out.deployed();
    if !modules.is_empty() {
        let _ = writeln!(report, "\nruntime modules: {}", modules.join(", "));
    }

    let resources: Vec<_> = env
        .symbols
        .variables()
        .map(|(_, v)| v)
        .filter(|v| v.value_buffer.is_some())
        .collect();
    if !resources.is_empty() {
        let _ = writeln!(report, "\nresources:");
    }
    for variable in resources {
        let size = variable.value_buffer.as_ref().map(Vec::len).unwrap_or(0);
        let _ = writeln!(
            report,
            "  {} {} {}, {} byte(s)",
            variable.real_name,
            variable.purpose.as_deref().unwrap_or("-"),
            variable.var_type,
            size
        );
        if let Some(image) = &variable.image {
            let _ = writeln!(
                report,
                "    {}x{} mode {}, {} color(s), {} frame(s)",
                image.width,
                image.height,
                image.mode,
                image.colors,
                image.frame_count.max(1)
            );
            for entry in &image.palette {
                let [r, g, b] = entry.rgb;
                let _ = writeln!(
                    report,
                    "    color ${:02X} #{:02X}{:02X}{:02X} x{}",
                    entry.hardware, r, g, b, entry.count
                );
            }
        }
        if let Some(buffer) = &variable.value_buffer {
            hex_dump(&mut report, buffer);
        }
    }

    if let Some(expansion) = &env.memory.expansion {
        let _ = writeln!(report, "\nexpansion:");
        for bank in &expansion.banks {
            let _ = writeln!(
                report,
                "  bank {}: {} / {} bytes",
                bank.index,
                bank.size - bank.remains,
                bank.size
            );
            for block in &bank.blocks {
                let _ = writeln!(
                    report,
                    "    {} at {} ({} bytes, window {})",
                    block.name, block.offset, block.size, block.window
                );
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Target;
    use crate::config::{CompilerOptions, TargetKind};
    use crate::output::composer::compose;

    #[test]
    fn test_report_names_target_and_banks() {
        let mut env = Environment::new(CompilerOptions::default(), Target::new(TargetKind::C64));
        let program = compose(&mut env, Vec::new(), &[]).unwrap();
        let stats = OptimizerStats {
            cycles: 2,
            removed_lines: 3,
            saved_bytes: 6,
        };
        let report = render_info(&env, &program, &stats);
        assert!(report.contains("target: c64 (Commodore 64)"));
        assert!(report.contains("load address: $0801"));
        assert!(report.contains("optimizer: 2 cycle(s), 3 line(s) removed, about 6 byte(s) saved"));
        assert!(report.contains("VARIABLES"));
        assert!(report.contains("runtime modules: "));
    }

    #[test]
    fn test_hex_dump_rows() {
        let mut report = String::new();
        hex_dump(&mut report, &(0..18u8).collect::<Vec<_>>());
        assert_eq!(
            report,
            "    0000: 00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F\n    0010: 10 11\n"
        );
    }
}
