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

//! Program labels: named (`loop:`) and line numbers.

use crate::error::{CompileError, ErrorCode, Span};
use std::collections::{BTreeMap, HashMap};

/// A branch target written in the program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LabelTarget {
    Name(String),
    Line(u32),
}

impl LabelTarget {
    /// Symbol of the target in the generated assembly.
    pub fn asm_name(&self) -> String {
        match self {
            LabelTarget::Name(name) => format!("_label_{}", super::variable::sanitize(name)),
            LabelTarget::Line(line) => format!("_line{}", line),
        }
    }
}

impl std::fmt::Display for LabelTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelTarget::Name(name) => write!(f, "{}", name),
            LabelTarget::Line(line) => write!(f, "{}", line),
        }
    }
}

/// Defined labels and every reference to them.
#[derive(Debug, Default)]
pub struct Labels {
    named: HashMap<String, Span>,
    lines: BTreeMap<u32, Span>,
    references: Vec<(LabelTarget, Span)>,
}

impl Labels {
    pub fn define(&mut self, target: LabelTarget, span: Span) -> Result<String, CompileError> {
        let name = target.asm_name();
        let duplicate = match &target {
            LabelTarget::Name(n) => self.named.insert(n.clone(), span).is_some(),
            LabelTarget::Line(l) => self.lines.insert(*l, span).is_some(),
        };
        if duplicate {
            return Err(CompileError::new(
                ErrorCode::LabelAlreadyDefined,
                format!("label {} already defined", target),
                span,
            ));
        }
        Ok(name)
    }

    /// Record a use of `target`; it must be defined by the end of the program.
    pub fn reference(&mut self, target: LabelTarget, span: Span) -> String {
        let name = target.asm_name();
        self.references.push((target, span));
        name
    }

    pub fn is_defined(&self, target: &LabelTarget) -> bool {
        match target {
            LabelTarget::Name(n) => self.named.contains_key(n),
            LabelTarget::Line(l) => self.lines.contains_key(l),
        }
    }

    /// Defined line numbers in ascending order.
    pub fn lines(&self) -> impl Iterator<Item = u32> + '_ {
        self.lines.keys().copied()
    }

    /// Fail with E038 on the first reference to an undefined label.
    pub fn verify(&self) -> Result<(), CompileError> {
        for (target, span) in &self.references {
            if !self.is_defined(target) {
                return Err(CompileError::new(
                    ErrorCode::UndefinedLabel,
                    format!("undefined label {}", target),
                    *span,
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_label() {
        let mut labels = Labels::default();
        labels
            .define(LabelTarget::Name("start".into()), Span::new(0, 5))
            .unwrap();
        let err = labels
            .define(LabelTarget::Name("start".into()), Span::new(10, 15))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::LabelAlreadyDefined);
    }

    #[test]
    fn test_forward_reference_verified_at_end() {
        let mut labels = Labels::default();
        assert_eq!(labels.reference(LabelTarget::Line(100), Span::new(3, 6)), "_line100");
        assert_eq!(labels.verify().unwrap_err().code, ErrorCode::UndefinedLabel);
        labels.define(LabelTarget::Line(100), Span::new(20, 23)).unwrap();
        assert!(labels.verify().is_ok());
    }
}
