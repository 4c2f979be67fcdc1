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

//! Buffered assembly output.
//!
//! Code generation writes into a stack of line buffers:
//! - `push_output` starts capturing into a fresh buffer
//! - `pop_output` closes the buffer and hands its lines back
//! - `prepend_output` closes the buffer and splices it in front of the
//!   enclosing one
//!
//! Runtime routines are deployed once: the first use emits the body
//! (inline with a jump over it, or queued for the end of the program),
//! later uses only call it.

pub mod preprocess;
pub mod syntax;

pub use preprocess::preprocess;
pub use syntax::{Syntax, ASM6809, CA65};

use std::collections::HashSet;

/// Classification of an emitted line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Code,
    Label,
    Comment,
    Directive,
    /// Marks the start or end of a procedure or runtime module. The
    /// optimizer never moves code across a boundary.
    Boundary,
}

/// One line of assembly, without layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmLine {
    pub kind: LineKind,
    pub text: String,
}

impl AsmLine {
    pub fn code(text: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Code,
            text: text.into(),
        }
    }

    pub fn label(name: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Label,
            text: name.into(),
        }
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Comment,
            text: text.into(),
        }
    }

    pub fn directive(text: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Directive,
            text: text.into(),
        }
    }

    pub fn boundary(text: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Boundary,
            text: text.into(),
        }
    }

    /// Upper-cased mnemonic of a code line.
    pub fn mnemonic(&self) -> Option<String> {
        if self.kind != LineKind::Code {
            return None;
        }
        self.text
            .split_whitespace()
            .next()
            .map(|m| m.to_ascii_uppercase())
    }

    /// Operand text of a code line, trimmed.
    pub fn operand(&self) -> &str {
        match self.text.trim().split_once(char::is_whitespace) {
            Some((_, operand)) => operand.trim(),
            None => "",
        }
    }
}

/// Lay `lines` out for `syntax`.
pub fn render(lines: &[AsmLine], syntax: &Syntax) -> String {
    let mut out = String::new();
    for line in lines {
        match line.kind {
            LineKind::Label => out.push_str(&syntax.label(&line.text)),
            LineKind::Comment => {
                out.push_str("; ");
                out.push_str(&line.text);
            }
            LineKind::Boundary => {
                out.push_str("; ---- ");
                out.push_str(&line.text);
                out.push_str(" ----");
            }
            LineKind::Directive if syntax.is_equate(&line.text) => out.push_str(&line.text),
            LineKind::Directive if line.text.starts_with(".segment") => {
                out.push_str(&line.text)
            }
            LineKind::Directive | LineKind::Code => {
                out.push_str("    ");
                out.push_str(&line.text);
            }
        }
        out.push('\n');
    }
    out
}

/// Split preprocessed assembly text into classified lines.
///
/// Labels start at column 0 and stand on their own line (`name:` for
/// ca65, `name` for asm6809). Equates are directives.
pub fn parse_snippet(text: &str, syntax: &Syntax) -> Vec<AsmLine> {
    let mut lines = Vec::new();
    for raw in text.lines() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(comment) = trimmed.strip_prefix(';') {
            lines.push(AsmLine::comment(comment.trim()));
            continue;
        }
        let body = strip_comment(trimmed);
        let at_column_zero = !raw.starts_with([' ', '\t']);
        if syntax.is_equate(body) {
            lines.push(AsmLine::directive(body));
        } else if at_column_zero {
            let name = body.strip_suffix(':').unwrap_or(body);
            lines.push(AsmLine::label(name.trim()));
        } else {
            let mnemonic = body.split_whitespace().next().unwrap_or("");
            if syntax.is_directive(mnemonic) {
                lines.push(AsmLine::directive(body));
            } else {
                lines.push(AsmLine::code(body));
            }
        }
    }
    lines
}

fn strip_comment(text: &str) -> &str {
    let mut in_string = false;
    let mut in_char = false;
    for (i, c) in text.char_indices() {
        match c {
            '"' if !in_char => in_string = !in_string,
            '\'' if !in_string => in_char = !in_char,
            ';' if !in_string && !in_char => return text[..i].trim_end(),
            _ => {}
        }
    }
    text
}

/// How the first use of a runtime module is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployMode {
    /// Emit the body where it is first needed, jumping over it.
    Inline,
    /// Queue the body for the end of the program.
    Deferred,
}

/// The stack of output buffers and the deploy bookkeeping.
#[derive(Debug)]
pub struct Emitter {
    stack: Vec<Vec<AsmLine>>,
    deployed: HashSet<String>,
    deferred: Vec<(String, Vec<AsmLine>)>,
    preferred: HashSet<String>,
    label_counter: usize,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            stack: vec![Vec::new()],
            deployed: HashSet::new(),
            deferred: Vec::new(),
            preferred: HashSet::new(),
            label_counter: 0,
        }
    }

    fn current(&mut self) -> &mut Vec<AsmLine> {
        if self.stack.is_empty() {
            self.stack.push(Vec::new());
        }
        let top = self.stack.len() - 1;
        &mut self.stack[top]
    }

    pub fn line(&mut self, line: AsmLine) {
        self.current().push(line);
    }

    pub fn code(&mut self, text: impl Into<String>) {
        self.line(AsmLine::code(text));
    }

    pub fn label(&mut self, name: impl Into<String>) {
        self.line(AsmLine::label(name));
    }

    pub fn comment(&mut self, text: impl Into<String>) {
        self.line(AsmLine::comment(text));
    }

    pub fn directive(&mut self, text: impl Into<String>) {
        self.line(AsmLine::directive(text));
    }

    pub fn boundary(&mut self, text: impl Into<String>) {
        self.line(AsmLine::boundary(text));
    }

    pub fn extend(&mut self, lines: impl IntoIterator<Item = AsmLine>) {
        self.current().extend(lines);
    }

    /// Mint a fresh label `_{prefix}{n}`.
    pub fn make_label(&mut self, prefix: &str) -> String {
        let label = format!("_{}{}", prefix, self.label_counter);
        self.label_counter += 1;
        label
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Start capturing into a new buffer.
    pub fn push_output(&mut self) {
        self.stack.push(Vec::new());
    }

    /// Stop capturing and return the captured lines.
    pub fn pop_output(&mut self) -> Vec<AsmLine> {
        if self.stack.len() <= 1 {
            return std::mem::take(self.current());
        }
        self.stack.pop().unwrap_or_default()
    }

    /// Stop capturing and insert the captured lines before the enclosing
    /// buffer's contents.
    pub fn prepend_output(&mut self) {
        let captured = self.pop_output();
        let enclosing = self.current();
        let rest = std::mem::take(enclosing);
        enclosing.extend(captured);
        enclosing.extend(rest);
    }

    /// Insert `lines` at the start of the current buffer.
    pub fn prepend_lines(&mut self, lines: Vec<AsmLine>) {
        self.push_output();
        self.extend(lines);
        self.prepend_output();
    }

    /// Lines of the current buffer.
    pub fn lines(&self) -> &[AsmLine] {
        self.stack.last().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Take every buffered line, collapsing buffers left open.
    pub fn take_lines(&mut self) -> Vec<AsmLine> {
        while self.stack.len() > 1 {
            let lines = self.pop_output();
            self.extend(lines);
        }
        std::mem::take(self.current())
    }

    pub fn is_deployed(&self, module: &str) -> bool {
        self.deployed.contains(module)
    }

    /// Record the first deployment of `module`. Returns `false` if it was
    /// already deployed.
    pub fn mark_deployed(&mut self, module: &str) -> bool {
        self.deployed.insert(module.to_string())
    }

    /// Deployed modules, sorted.
    pub fn deployed(&self) -> Vec<&str> {
        let mut modules: Vec<&str> = self.deployed.iter().map(String::as_str).collect();
        modules.sort_unstable();
        modules
    }

    /// Queue the body of `module` for the end of the program.
    pub fn defer(&mut self, module: &str, body: Vec<AsmLine>) {
        self.deferred.push((module.to_string(), body));
    }

    pub fn take_deferred(&mut self) -> Vec<(String, Vec<AsmLine>)> {
        std::mem::take(&mut self.deferred)
    }

    /// Mark a primitive as emitted inline at every use.
    pub fn prefer(&mut self, module: &str) {
        self.preferred.insert(module.to_string());
    }

    pub fn is_preferred(&self, module: &str) -> bool {
        self.preferred.contains(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pop_returns_captured_lines() {
        let mut emitter = Emitter::new();
        emitter.code("LDA #1");
        emitter.push_output();
        emitter.code("LDA #2");
        let captured = emitter.pop_output();
        assert_eq!(captured, vec![AsmLine::code("LDA #2")]);
        assert_eq!(emitter.lines(), &[AsmLine::code("LDA #1")]);
    }

    #[test]
    fn test_prepend_output_splices_before_enclosing() {
        let mut emitter = Emitter::new();
        emitter.code("body");
        emitter.push_output();
        emitter.code("prologue");
        emitter.prepend_output();
        assert_eq!(
            emitter.lines(),
            &[AsmLine::code("prologue"), AsmLine::code("body")]
        );
        assert_eq!(emitter.depth(), 1);
    }

    #[test]
    fn test_make_label_is_unique() {
        let mut emitter = Emitter::new();
        assert_eq!(emitter.make_label("if"), "_if0");
        assert_eq!(emitter.make_label("if"), "_if1");
        assert_eq!(emitter.make_label("for"), "_for2");
    }

    #[test]
    fn test_deploy_once() {
        let mut emitter = Emitter::new();
        assert!(emitter.mark_deployed("math"));
        assert!(!emitter.mark_deployed("math"));
        assert!(emitter.is_deployed("math"));
    }

    #[test]
    fn test_take_lines_collapses_open_buffers() {
        let mut emitter = Emitter::new();
        emitter.code("a");
        emitter.push_output();
        emitter.code("b");
        assert_eq!(
            emitter.take_lines(),
            vec![AsmLine::code("a"), AsmLine::code("b")]
        );
    }

    #[test]
    fn test_parse_snippet_classifies_lines() {
        let text = "; multiply\nMUL8:\n    LDA #0 ; clear\n    .byte 1,2\nTMP = $22\n";
        let lines = parse_snippet(text, &CA65);
        assert_eq!(
            lines,
            vec![
                AsmLine::comment("multiply"),
                AsmLine::label("MUL8"),
                AsmLine::code("LDA #0"),
                AsmLine::directive(".byte 1,2"),
                AsmLine::directive("TMP = $22"),
            ]
        );
    }

    #[test]
    fn test_parse_snippet_asm6809() {
        let text = "MUL8\n    LDA ,X\n    FCB 1\nTMP EQU $22\n";
        let lines = parse_snippet(text, &ASM6809);
        assert_eq!(lines[0], AsmLine::label("MUL8"));
        assert_eq!(lines[1], AsmLine::code("LDA ,X"));
        assert_eq!(lines[2].kind, LineKind::Directive);
        assert_eq!(lines[3].kind, LineKind::Directive);
    }

    #[test]
    fn test_render_layout() {
        let lines = vec![
            AsmLine::label("main"),
            AsmLine::code("RTS"),
            AsmLine::boundary("PROC_X"),
        ];
        assert_eq!(render(&lines, &CA65), "main:\n    RTS\n; ---- PROC_X ----\n");
        assert_eq!(render(&lines[..1], &ASM6809), "main\n");
    }

    #[test]
    fn test_operand() {
        assert_eq!(AsmLine::code("LDA  _A").operand(), "_A");
        assert_eq!(AsmLine::code("RTS").operand(), "");
        assert_eq!(AsmLine::code("lda #1").mnemonic().as_deref(), Some("LDA"));
    }
}
