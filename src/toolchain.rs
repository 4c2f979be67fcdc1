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

//! External tools: assemblers, linkers and disk imagers.
//!
//! The compiler never links against the tools; it runs them as blocking
//! child processes through the [`Toolchain`] trait. [`ProcessToolchain`]
//! runs the real programs found in `PATH`, [`RecordingToolchain`] only
//! records the commands and fakes their output files.

use crate::backend::ToolCommand;
use crate::error::{CompileError, ErrorCode};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

/// Programs a sandboxed compilation may run.
pub const SANDBOX_ALLOWED: &[&str] = &["ca65", "ld65", "asm6809", "decb", "dir2atr"];

#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("{0} not found in PATH")]
    NotFound(String),

    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` failed with exit code {code}: {stderr}")]
    Failed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("{0} may not run in sandbox mode")]
    Sandboxed(String),
}

impl From<ToolchainError> for CompileError {
    fn from(error: ToolchainError) -> Self {
        let code = match &error {
            ToolchainError::NotFound(_) => ErrorCode::ToolNotFound,
            ToolchainError::Io { .. } | ToolchainError::Failed { .. } => ErrorCode::ToolFailed,
            ToolchainError::Sandboxed(_) => ErrorCode::SandboxViolation,
        };
        CompileError::unlocated(code, error.to_string())
    }
}

/// What a tool printed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

pub trait Toolchain {
    /// Run `command` to completion.
    fn run(&mut self, command: &ToolCommand) -> Result<ToolOutput, ToolchainError>;
}

/// Runs the tools as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessToolchain {
    pub sandbox: bool,
}

impl ProcessToolchain {
    pub fn new(sandbox: bool) -> Self {
        Self { sandbox }
    }
}

impl Toolchain for ProcessToolchain {
    fn run(&mut self, command: &ToolCommand) -> Result<ToolOutput, ToolchainError> {
        if self.sandbox && !SANDBOX_ALLOWED.contains(&command.program.as_str()) {
            return Err(ToolchainError::Sandboxed(command.program.clone()));
        }
        let program = which::which(&command.program)
            .map_err(|_| ToolchainError::NotFound(command.program.clone()))?;
        log::info!("running {}", command);

        let output = Command::new(&program)
            .args(&command.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| ToolchainError::Io {
                program: command.program.clone(),
                source,
            })?;

        let result = ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !output.status.success() {
            return Err(ToolchainError::Failed {
                command: command.to_string(),
                code: output.status.code().unwrap_or(-1),
                stderr: result.stderr.trim().to_string(),
            });
        }
        Ok(result)
    }
}

/// Flags whose next argument is a file the tool writes.
const OUTPUT_FLAGS: &[&str] = &["-o", "-Ln", "-s", "-l"];

/// Image files written by the disk imagers.
const IMAGE_EXTENSIONS: &[&str] = &["dsk", "atr"];

/// Records every command and writes stand-ins for the files it would create.
#[derive(Debug, Clone, Default)]
pub struct RecordingToolchain {
    pub commands: Vec<ToolCommand>,
    /// Bytes written to every `-o` output.
    pub binary: Vec<u8>,
    /// Text written to symbol files.
    pub symbols: String,
    /// Make the command of this program fail.
    pub failing: Option<String>,
}

impl RecordingToolchain {
    pub fn new() -> Self {
        Self {
            binary: vec![0x60],
            ..Self::default()
        }
    }

    pub fn programs(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.program.as_str()).collect()
    }

    fn outputs(command: &ToolCommand) -> Vec<(String, PathBuf)> {
        let mut outputs = Vec::new();
        for pair in command.args.windows(2) {
            if OUTPUT_FLAGS.contains(&pair[0].as_str()) {
                outputs.push((pair[0].clone(), PathBuf::from(&pair[1])));
            }
        }
        for arg in &command.args {
            let path = Path::new(arg);
            let image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| IMAGE_EXTENSIONS.contains(&e))
                .unwrap_or(false);
            if image && !path.exists() {
                outputs.push(("image".to_string(), path.to_path_buf()));
            }
        }
        outputs
    }
}

impl Toolchain for RecordingToolchain {
    fn run(&mut self, command: &ToolCommand) -> Result<ToolOutput, ToolchainError> {
        self.commands.push(command.clone());
        if self.failing.as_deref() == Some(command.program.as_str()) {
            return Err(ToolchainError::Failed {
                command: command.to_string(),
                code: 1,
                stderr: "recorded failure".to_string(),
            });
        }
        for (flag, path) in Self::outputs(command) {
            let contents: &[u8] = match flag.as_str() {
                "-o" | "image" => &self.binary,
                "-Ln" | "-s" => self.symbols.as_bytes(),
                _ => b"",
            };
            fs::write(&path, contents).map_err(|source| ToolchainError::Io {
                program: command.program.clone(),
                source,
            })?;
        }
        Ok(ToolOutput::default())
    }
}
