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

//! Text output and keyboard input.

use super::strings::StringEmitter;
use super::variables::VariableEmitter;
use crate::backend::MachineOp;
use crate::environment::Environment;
use crate::error::{ErrorCode, Result};
use crate::symbols::VariableId;
use crate::types::VariableType;

/// One element of a PRINT statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintItem {
    /// An expression.
    Value(VariableId),
    /// `,`: advance to the next tab column.
    Tab,
    /// `;`: no separation.
    Join,
}

/// Extension trait for the text statements.
pub trait TextEmitter {
    /// `PRINT items`; a newline follows unless the list ends with a separator.
    fn print(&mut self, items: &[PrintItem]) -> Result<()>;

    /// Print a single value.
    fn print_value(&mut self, value: VariableId) -> Result<()>;

    /// `LOCATE x, y`.
    fn locate(&mut self, x: VariableId, y: VariableId) -> Result<()>;

    /// `CLS`: clears the bitmap when one is enabled, the text screen otherwise.
    fn cls(&mut self) -> Result<()>;

    fn pen(&mut self, color: VariableId) -> Result<()>;

    fn paper(&mut self, color: VariableId) -> Result<()>;

    /// `INKEY$`: the pending key as a string, empty when none.
    fn inkey(&mut self) -> Result<VariableId>;

    /// `WAIT KEY`.
    fn wait_key(&mut self) -> Result<()>;
}

impl Environment {
    fn print_number(&mut self, value: VariableId, bytes: usize, signed: bool) -> Result<()> {
        let entry = match (bytes, signed) {
            (1, false) => "PRINTN8",
            (1, true) => "PRINTS8",
            (2, false) => "PRINTN16",
            (2, true) => "PRINTS16",
            (_, false) => "PRINTN32",
            (_, true) => "PRINTS32",
        };
        self.load(value, "MATHA", bytes.min(4));
        self.call_runtime("print", entry)
    }
}

impl TextEmitter for Environment {
    fn print(&mut self, items: &[PrintItem]) -> Result<()> {
        for item in items {
            match *item {
                PrintItem::Value(value) => self.print_value(value)?,
                PrintItem::Tab => {
                    self.machine_call(MachineOp::PrintTab, &[])?;
                }
                PrintItem::Join => {}
            }
        }
        if !matches!(items.last(), Some(PrintItem::Tab | PrintItem::Join)) {
            self.machine_call(MachineOp::PrintNewline, &[])?;
        }
        Ok(())
    }

    fn print_value(&mut self, value: VariableId) -> Result<()> {
        match self.type_of(value) {
            VariableType::Bit => {
                let byte = self.read_bit(value)?;
                self.print_number(byte, 1, false)
            }
            VariableType::Float => {
                let bytes = self.width(value);
                self.load(value, "FPA", bytes);
                self.call_runtime("float", "FPPRINT")
            }
            VariableType::String => {
                self.deploy("vars")?;
                self.string_pointer(value, "DSPTR");
                self.call_runtime("print", "PRINTSTR")
            }
            VariableType::DString => {
                self.load(value, "DSA", 1);
                self.call_runtime("dstring", "DSPRINT")?;
                self.consume_dstring(value)
            }
            ty if ty.is_integer() => {
                let bytes = self.width(value);
                self.print_number(value, bytes, ty.is_signed())
            }
            other => Err(self.error(
                ErrorCode::PrintUnsupported,
                format!("cannot PRINT a {}", other),
            )),
        }
    }

    fn locate(&mut self, x: VariableId, y: VariableId) -> Result<()> {
        self.expect_numeric(x)?;
        self.expect_numeric(y)?;
        self.machine_call(MachineOp::Locate, &[x, y]).map(|_| ())
    }

    fn cls(&mut self) -> Result<()> {
        let op = match self.screen_mode {
            Some(_) => MachineOp::BitmapClear,
            None => MachineOp::Cls,
        };
        self.machine_call(op, &[]).map(|_| ())
    }

    fn pen(&mut self, color: VariableId) -> Result<()> {
        self.expect_numeric(color)?;
        self.machine_call(MachineOp::Pen, &[color]).map(|_| ())
    }

    fn paper(&mut self, color: VariableId) -> Result<()> {
        self.expect_numeric(color)?;
        self.machine_call(MachineOp::Paper, &[color]).map(|_| ())
    }

    fn inkey(&mut self) -> Result<VariableId> {
        if !self.machine_call(MachineOp::Inkey, &[])? {
            return Ok(self.string_constant(""));
        }
        let key = self.result_from("MATHR", 1, VariableType::Byte, "key");
        self.chr(key)
    }

    fn wait_key(&mut self) -> Result<()> {
        self.machine_call(MachineOp::WaitKey, &[]).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{c64, calls, code, coco};
    use super::*;

    #[test]
    fn test_byte_uses_print_byte_helper() {
        let mut env = c64();
        let a = env.define_variable("A", VariableType::Byte).unwrap();
        env.print(&[PrintItem::Value(a)]).unwrap();
        assert_eq!(calls(&env, "PRINTN8"), 1);
        assert_eq!(calls(&env, "TEXTNEWLINE"), 1);
        let lines = code(&env);
        assert_eq!(lines[0], "LDA _A");
        assert_eq!(lines[1], "STA MATHA");
    }

    #[test]
    fn test_helper_follows_width_and_sign() {
        let mut env = c64();
        let w = env.define_variable("W", VariableType::Word).unwrap();
        let s = env.define_variable("S", VariableType::SWord).unwrap();
        let d = env.define_variable("D", VariableType::SDWord).unwrap();
        env.print(&[PrintItem::Value(w), PrintItem::Join, PrintItem::Value(s), PrintItem::Join, PrintItem::Value(d)])
            .unwrap();
        assert_eq!(calls(&env, "PRINTN16"), 1);
        assert_eq!(calls(&env, "PRINTS16"), 1);
        assert_eq!(calls(&env, "PRINTS32"), 1);
    }

    #[test]
    fn test_trailing_separator_suppresses_newline() {
        let mut env = c64();
        let text = env.string_constant("HI");
        env.print(&[PrintItem::Value(text), PrintItem::Tab]).unwrap();
        assert_eq!(calls(&env, "PRINTSTR"), 1);
        assert_eq!(calls(&env, "TEXTTAB"), 1);
        assert_eq!(calls(&env, "TEXTNEWLINE"), 0);
    }

    #[test]
    fn test_dynamic_string_is_printed_from_pool() {
        let mut env = c64();
        let s = env.define_variable("S$", VariableType::DString).unwrap();
        env.print(&[PrintItem::Value(s)]).unwrap();
        assert_eq!(calls(&env, "DSPRINT"), 1);
        assert_eq!(calls(&env, "DSFREE"), 0);
    }

    #[test]
    fn test_float_prints_through_runtime() {
        let mut env = coco();
        let f = env.define_variable("F", VariableType::Float).unwrap();
        env.print_value(f).unwrap();
        assert_eq!(calls(&env, "FPPRINT"), 1);
    }

    #[test]
    fn test_image_cannot_be_printed() {
        let mut env = c64();
        let img = env.define_variable("IMG", VariableType::Image).unwrap();
        let err = env.print_value(img).unwrap_err();
        assert_eq!(err.code, ErrorCode::PrintUnsupported);
    }

    #[test]
    fn test_locate_binds_coordinates() {
        let mut env = c64();
        let x = env.integer_constant(3);
        let y = env.integer_constant(4);
        env.locate(x, y).unwrap();
        let lines = code(&env);
        assert!(lines.contains(&"STA TEXTX".to_string()));
        assert!(lines.contains(&"STA TEXTY".to_string()));
        assert_eq!(calls(&env, "TEXTAT"), 1);
    }

    #[test]
    fn test_inkey_builds_a_string() {
        let mut env = c64();
        let key = env.inkey().unwrap();
        assert_eq!(env.type_of(key), VariableType::DString);
        assert_eq!(calls(&env, "INKEY"), 1);
        assert_eq!(calls(&env, "DSCHR"), 1);
    }

    #[test]
    fn test_cls_follows_screen_mode() {
        let mut env = c64();
        env.cls().unwrap();
        env.screen_mode = Some(2);
        env.cls().unwrap();
        assert_eq!(calls(&env, "TEXTCLS"), 1);
        assert_eq!(calls(&env, "BITMAPCLEAR"), 1);
    }
}
