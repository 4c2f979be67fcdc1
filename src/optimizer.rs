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

//! Assembly-level optimizer.
//!
//! Runs cycles of four passes over the generated lines until a cycle
//! changes nothing or the cycle limit is reached:
//! - peephole: the rewrite table of the processor
//! - dead stores: stores into temporaries that nothing reads
//! - jump threading: jumps to jumps, and jumps to the next label
//! - unreachable code after an unconditional transfer
//!
//! No pass moves code across a label or a boundary line.

use crate::backend::{Cpu, PeepholeRule};
use crate::emitter::{AsmLine, LineKind};
use std::collections::{HashMap, HashSet};

/// Prefixes of the compiler-generated temporaries.
const TEMPORARY_PREFIXES: [&str; 2] = ["Ttmp", "Trtmp"];

/// What the optimizer achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizerStats {
    pub cycles: usize,
    pub removed_lines: usize,
    /// Estimated bytes saved, from the size estimates of the processor.
    pub saved_bytes: usize,
}

/// Optimize `lines` with at most `limit` cycles.
pub fn optimize(lines: Vec<AsmLine>, cpu: &dyn Cpu, limit: usize) -> (Vec<AsmLine>, OptimizerStats) {
    let mut stats = OptimizerStats::default();
    let mut lines = lines;
    let before_lines = lines.len();
    let before_bytes = estimated_size(&lines, cpu);

    while stats.cycles < limit {
        stats.cycles += 1;
        let mut changed = false;
        changed |= peephole(&mut lines, cpu);
        changed |= dead_stores(&mut lines, cpu);
        changed |= thread_jumps(&mut lines, cpu);
        changed |= drop_unreachable(&mut lines, cpu);
        if !changed {
            break;
        }
    }

    stats.removed_lines = before_lines.saturating_sub(lines.len());
    stats.saved_bytes = before_bytes.saturating_sub(estimated_size(&lines, cpu));
    log::debug!(
        "optimizer: {} cycle(s), {} line(s) removed, ~{} byte(s) saved",
        stats.cycles,
        stats.removed_lines,
        stats.saved_bytes
    );
    (lines, stats)
}

fn estimated_size(lines: &[AsmLine], cpu: &dyn Cpu) -> usize {
    lines.iter().map(|line| cpu.estimate_size(line)).sum()
}

/// Match `text` against `template`, binding `%n` captures.
fn match_template(template: &str, text: &str, captures: &mut [Option<String>; 10]) -> bool {
    let Some(position) = template.find('%') else {
        return template.eq_ignore_ascii_case(text);
    };
    let digit = template[position + 1..].chars().next().and_then(|c| c.to_digit(10));
    let Some(slot) = digit.map(|d| d as usize) else {
        return template.eq_ignore_ascii_case(text);
    };
    let (literal, rest) = (&template[..position], &template[position + 2..]);
    if text.len() < literal.len() || !text[..literal.len()].eq_ignore_ascii_case(literal) {
        return false;
    }
    let text = &text[literal.len()..];

    if let Some(bound) = captures[slot].clone() {
        return text.starts_with(bound.as_str())
            && match_template(rest, &text[bound.len()..], captures);
    }
    // Shortest capture that lets the remainder match.
    for end in 1..=text.len() {
        if !text.is_char_boundary(end) {
            continue;
        }
        let mut trial = captures.clone();
        trial[slot] = Some(text[..end].to_string());
        if match_template(rest, &text[end..], &mut trial) {
            *captures = trial;
            return true;
        }
    }
    false
}

fn match_instruction(pattern: &str, line: &AsmLine, captures: &mut [Option<String>; 10]) -> bool {
    let Some(mnemonic) = line.mnemonic() else {
        return false;
    };
    let (expected, operand) = match pattern.split_once(' ') {
        Some((m, o)) => (m, o.trim()),
        None => (pattern, ""),
    };
    expected.eq_ignore_ascii_case(&mnemonic) && match_template(operand, line.operand(), captures)
}

fn substitute(template: &str, captures: &[Option<String>; 10]) -> String {
    let mut result = template.to_string();
    for (slot, value) in captures.iter().enumerate() {
        if let Some(value) = value {
            result = result.replace(&format!("%{}", slot), value);
        }
    }
    result
}

fn next_code<'a>(lines: &'a [AsmLine], from: usize) -> Option<&'a AsmLine> {
    lines[from..]
        .iter()
        .find(|line| line.kind != LineKind::Comment)
        .filter(|line| line.kind == LineKind::Code)
}

fn try_rule(rule: &PeepholeRule, lines: &[AsmLine], at: usize, cpu: &dyn Cpu) -> Option<Vec<AsmLine>> {
    let window = lines.get(at..at + rule.pattern.len())?;
    let mut captures: [Option<String>; 10] = Default::default();
    for (pattern, line) in rule.pattern.iter().zip(window) {
        if line.kind != LineKind::Code || !match_instruction(pattern, line, &mut captures) {
            return None;
        }
    }
    if rule.changes_flags {
        let follower = next_code(lines, at + rule.pattern.len()).and_then(AsmLine::mnemonic);
        if follower.is_some_and(|m| cpu.conditional_branches().contains(&m.as_str())) {
            return None;
        }
    }
    Some(
        rule.replacement
            .iter()
            .map(|r| AsmLine::code(substitute(r, &captures)))
            .collect(),
    )
}

/// Apply the rewrite table once over all windows.
fn peephole(lines: &mut Vec<AsmLine>, cpu: &dyn Cpu) -> bool {
    let mut changed = false;
    let mut at = 0;
    while at < lines.len() {
        let rewrite = cpu
            .peephole_rules()
            .iter()
            .find_map(|rule| try_rule(rule, lines, at, cpu).map(|r| (rule, r)));
        match rewrite {
            Some((rule, replacement)) => {
                log::trace!("peephole {} at line {}", rule.name, at);
                lines.splice(at..at + rule.pattern.len(), replacement);
                changed = true;
            }
            None => at += 1,
        }
    }
    changed
}

/// The symbol an operand starts with, ignoring addressing-mode decoration.
fn base_symbol(operand: &str) -> &str {
    let operand = operand.trim_start_matches(['#', '<', '>', '(', '[']);
    let end = operand
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(operand.len());
    &operand[..end]
}

fn is_temporary(symbol: &str) -> bool {
    TEMPORARY_PREFIXES.iter().any(|prefix| symbol.starts_with(prefix))
}

fn dead_store_target<'a>(line: &'a AsmLine, cpu: &dyn Cpu) -> Option<&'a str> {
    let mnemonic = line.mnemonic()?;
    if !cpu.store_mnemonics().contains(&mnemonic.as_str()) {
        return None;
    }
    let operand = line.operand();
    // Indexed and indirect stores write through the symbol, not into it.
    if operand.contains(',') || operand.starts_with('(') || operand.starts_with('[') {
        return None;
    }
    let symbol = base_symbol(operand);
    is_temporary(symbol).then_some(symbol)
}

/// Remove stores into temporaries that no other line mentions.
fn dead_stores(lines: &mut Vec<AsmLine>, cpu: &dyn Cpu) -> bool {
    let mut read: HashSet<String> = HashSet::new();
    for line in lines.iter() {
        if line.kind == LineKind::Comment || dead_store_target(line, cpu).is_some() {
            continue;
        }
        for word in line.text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_')) {
            if is_temporary(word) {
                read.insert(word.to_string());
            }
        }
    }
    let before = lines.len();
    lines.retain(|line| match dead_store_target(line, cpu) {
        Some(symbol) if !read.contains(symbol) => {
            log::trace!("dead store {}", line.text);
            false
        }
        _ => true,
    });
    lines.len() != before
}

/// Rewrite jumps whose target only jumps on, and drop jumps to the next line.
fn thread_jumps(lines: &mut Vec<AsmLine>, cpu: &dyn Cpu) -> bool {
    let mut forwards: HashMap<String, String> = HashMap::new();
    for (index, line) in lines.iter().enumerate() {
        if line.kind != LineKind::Label {
            continue;
        }
        let next = lines[index + 1..]
            .iter()
            .find(|l| !matches!(l.kind, LineKind::Comment | LineKind::Label));
        if let Some(target) = next.and_then(|l| cpu.jump_target(l)) {
            if target != line.text {
                forwards.insert(line.text.clone(), target.to_string());
            }
        }
    }

    let mut changed = false;
    for line in lines.iter_mut() {
        let Some(target) = cpu.jump_target(line) else {
            continue;
        };
        let mnemonic = line.mnemonic().unwrap_or_default();
        // Short branches keep their target to stay in range.
        if mnemonic == "BRA" {
            continue;
        }
        let mut destination = target.to_string();
        let mut seen = HashSet::from([destination.clone()]);
        let mut cyclic = false;
        while let Some(next) = forwards.get(&destination) {
            if !seen.insert(next.clone()) {
                cyclic = true;
                break;
            }
            destination = next.clone();
        }
        if !cyclic && destination != target {
            log::trace!("thread {} -> {}", line.text, destination);
            *line = AsmLine::code(format!("{} {}", mnemonic, destination));
            changed = true;
        }
    }

    let mut index = 0;
    while index < lines.len() {
        let falls_through = cpu.jump_target(&lines[index]).is_some_and(|target| {
            lines[index + 1..]
                .iter()
                .take_while(|l| matches!(l.kind, LineKind::Comment | LineKind::Label))
                .any(|l| l.kind == LineKind::Label && l.text == target)
        });
        if falls_through {
            log::trace!("jump to next label {}", lines[index].text);
            lines.remove(index);
            changed = true;
        } else {
            index += 1;
        }
    }
    changed
}

/// Remove code between an unconditional transfer and the next label.
fn drop_unreachable(lines: &mut Vec<AsmLine>, cpu: &dyn Cpu) -> bool {
    let before = lines.len();
    let mut reachable = true;
    lines.retain(|line| match line.kind {
        LineKind::Label | LineKind::Boundary | LineKind::Directive => {
            reachable = true;
            true
        }
        LineKind::Comment => true,
        LineKind::Code if !reachable => {
            log::trace!("unreachable {}", line.text);
            false
        }
        LineKind::Code => {
            reachable = !cpu.is_unconditional(line);
            true
        }
    });
    lines.len() != before
}
