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

//! Preprocessor for embedded assembly.
//!
//! Runtime modules are stored as assembly text with a few directives:
//!
//! - `@IF NAME` / `@IFNOT NAME` / `@ELSE` / `@ENDIF` include lines when the
//!   define `NAME` is set to something other than `0`
//! - `@MACRO name` ... `@ENDM` defines a macro; `\1` to `\9` are replaced
//!   by the arguments of an invocation `@name a, b`
//! - `{NAME}` is replaced by the value of the define `NAME`

use crate::error::{CompileError, ErrorCode};
use std::collections::HashMap;

const MAX_EXPANSION_DEPTH: usize = 16;

fn malformed(module: &str, line: usize, message: impl std::fmt::Display) -> CompileError {
    CompileError::unlocated(
        ErrorCode::EmbeddedAssemblyMalformed,
        format!("embedded assembly {} line {}: {}", module, line, message),
    )
}

#[derive(Debug, Clone, Copy)]
struct Conditional {
    /// The enclosing block is active.
    parent: bool,
    /// The condition held.
    taken: bool,
    in_else: bool,
    line: usize,
}

impl Conditional {
    fn active(&self) -> bool {
        self.parent && (self.taken != self.in_else)
    }
}

struct Preprocessor<'a> {
    module: &'a str,
    defines: &'a HashMap<String, String>,
    macros: HashMap<String, Vec<String>>,
    output: Vec<String>,
}

/// Run the preprocessor over `source`, the text of `module`.
pub fn preprocess(
    module: &str,
    source: &str,
    defines: &HashMap<String, String>,
) -> Result<String, CompileError> {
    let mut preprocessor = Preprocessor {
        module,
        defines,
        macros: HashMap::new(),
        output: Vec::new(),
    };
    let lines: Vec<String> = source.lines().map(str::to_string).collect();
    preprocessor.process(&lines, 0)?;
    let mut text = preprocessor.output.join("\n");
    text.push('\n');
    Ok(text)
}

impl Preprocessor<'_> {
    fn is_set(&self, name: &str) -> bool {
        self.defines
            .get(name)
            .map(|v| !v.is_empty() && v != "0")
            .unwrap_or(false)
    }

    fn process(&mut self, lines: &[String], depth: usize) -> Result<(), CompileError> {
        if depth > MAX_EXPANSION_DEPTH {
            return Err(malformed(self.module, 0, "macro expansion too deep"));
        }
        let mut conditionals: Vec<Conditional> = Vec::new();
        let mut recording: Option<(String, Vec<String>, usize)> = None;

        for (index, raw) in lines.iter().enumerate() {
            let number = index + 1;
            let trimmed = raw.trim();

            if let Some((name, body, start)) = recording.take() {
                if trimmed.eq_ignore_ascii_case("@ENDM") {
                    self.macros.insert(name.to_ascii_uppercase(), body);
                } else if trimmed.to_ascii_uppercase().starts_with("@MACRO") {
                    return Err(malformed(self.module, number, "nested @MACRO"));
                } else {
                    let mut body = body;
                    body.push(raw.clone());
                    recording = Some((name, body, start));
                }
                continue;
            }

            let active = conditionals.last().map(Conditional::active).unwrap_or(true);

            let Some(directive) = trimmed.strip_prefix('@') else {
                if active {
                    let line = self.substitute(raw, number)?;
                    self.output.push(line);
                }
                continue;
            };

            let (word, rest) = match directive.split_once(char::is_whitespace) {
                Some((word, rest)) => (word, rest.trim()),
                None => (directive, ""),
            };
            match word.to_ascii_uppercase().as_str() {
                "IF" | "IFNOT" => {
                    if rest.is_empty() {
                        return Err(malformed(self.module, number, "@IF without a name"));
                    }
                    let set = self.is_set(rest);
                    conditionals.push(Conditional {
                        parent: active,
                        taken: if word.eq_ignore_ascii_case("IF") { set } else { !set },
                        in_else: false,
                        line: number,
                    });
                }
                "ELSE" => match conditionals.last_mut() {
                    Some(c) if !c.in_else => c.in_else = true,
                    Some(_) => return Err(malformed(self.module, number, "second @ELSE")),
                    None => return Err(malformed(self.module, number, "@ELSE without @IF")),
                },
                "ENDIF" => {
                    if conditionals.pop().is_none() {
                        return Err(malformed(self.module, number, "@ENDIF without @IF"));
                    }
                }
                "MACRO" => {
                    if rest.is_empty() {
                        return Err(malformed(self.module, number, "@MACRO without a name"));
                    }
                    if active {
                        recording = Some((rest.to_string(), Vec::new(), number));
                    } else {
                        recording = Some((String::new(), Vec::new(), number));
                    }
                }
                "ENDM" => return Err(malformed(self.module, number, "@ENDM without @MACRO")),
                name => {
                    if !active {
                        continue;
                    }
                    let body = self.macros.get(name).cloned().ok_or_else(|| {
                        malformed(self.module, number, format!("unknown directive @{}", word))
                    })?;
                    let arguments: Vec<String> = if rest.is_empty() {
                        Vec::new()
                    } else {
                        rest.split(',').map(|a| a.trim().to_string()).collect()
                    };
                    let expanded: Vec<String> = body
                        .iter()
                        .map(|line| expand_arguments(line, &arguments))
                        .collect();
                    self.process(&expanded, depth + 1)?;
                }
            }
        }

        if let Some((_, _, start)) = recording {
            return Err(malformed(self.module, start, "@MACRO without @ENDM"));
        }
        if let Some(open) = conditionals.last() {
            return Err(malformed(self.module, open.line, "@IF without @ENDIF"));
        }
        // Macros recorded in a skipped block are discarded.
        self.macros.remove("");
        Ok(())
    }

    fn substitute(&self, line: &str, number: usize) -> Result<String, CompileError> {
        if !line.contains('{') {
            return Ok(line.to_string());
        }
        let mut out = String::with_capacity(line.len());
        let mut rest = line;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| malformed(self.module, number, "unclosed '{'"))?;
            let name = &after[..close];
            let value = self.defines.get(name).ok_or_else(|| {
                malformed(self.module, number, format!("undefined name {{{}}}", name))
            })?;
            out.push_str(value);
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn expand_arguments(line: &str, arguments: &[String]) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(digit) = chars.peek().and_then(|d| d.to_digit(10)) {
                if digit >= 1 {
                    chars.next();
                    if let Some(argument) = arguments.get(digit as usize - 1) {
                        out.push_str(argument);
                    }
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn defines(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_conditionals() {
        let source = "@IF CLIP\n  A\n@ELSE\n  B\n@ENDIF\n  C";
        let on = preprocess("t", source, &defines(&[("CLIP", "1")])).unwrap();
        assert_eq!(on, "  A\n  C\n");
        let off = preprocess("t", source, &defines(&[])).unwrap();
        assert_eq!(off, "  B\n  C\n");
    }

    #[test]
    fn test_nested_conditionals() {
        let source = "@IFNOT A\n@IF B\n  X\n@ENDIF\n@ENDIF";
        assert_eq!(
            preprocess("t", source, &defines(&[("B", "1")])).unwrap(),
            "  X\n"
        );
        assert_eq!(
            preprocess("t", source, &defines(&[("A", "1"), ("B", "1")])).unwrap(),
            "\n"
        );
    }

    #[test]
    fn test_macro_expansion() {
        let source = "@MACRO ADD16\n    LDA \\1\n    ADC \\2\n@ENDM\n@ADD16 _A, #1";
        assert_eq!(
            preprocess("t", source, &defines(&[])).unwrap(),
            "    LDA _A\n    ADC #1\n"
        );
    }

    #[test]
    fn test_substitution() {
        let source = "    LDA #{SIZE}";
        assert_eq!(
            preprocess("t", source, &defines(&[("SIZE", "32")])).unwrap(),
            "    LDA #32\n"
        );
    }

    #[test]
    fn test_malformed_inputs() {
        for source in [
            "@IF X\n A",
            "@ENDIF",
            "@ELSE",
            "@MACRO M\n A",
            "@ENDM",
            "@UNKNOWN",
            "  LDA {MISSING}",
        ] {
            let err = preprocess("t", source, &defines(&[])).unwrap_err();
            assert_eq!(err.code, ErrorCode::EmbeddedAssemblyMalformed, "{}", source);
        }
    }
}
