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

//! Compiler options and compilation profiles.
//!
//! `CompilerOptions` is the single options record the environment carries.
//! It is filled from three sources, in order:
//! - built-in defaults
//! - an optional YAML profile (`--profile`)
//! - command line flags and `OPTION` / `DEFINE` statements in the program

use crate::memory::MemoryAreaKind;
use crate::types::FloatPrecision;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Machines the compiler can generate code for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    C64,
    Atari,
    Coco,
}

impl TargetKind {
    /// Every supported target, in the order they are listed by `--help`.
    pub const ALL: [TargetKind; 3] = [TargetKind::C64, TargetKind::Atari, TargetKind::Coco];

    /// Parse a target name as accepted by `-T`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "c64" => Some(TargetKind::C64),
            "atari" | "atarixl" => Some(TargetKind::Atari),
            "coco" => Some(TargetKind::Coco),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TargetKind::C64 => "c64",
            TargetKind::Atari => "atari",
            TargetKind::Coco => "coco",
        }
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Final binary formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Bin,
    Prg,
    Xex,
    K7,
    Tap,
    Cas,
    Rom,
    D64,
    Dsk,
    Atr,
}

impl OutputFormat {
    /// Parse a format name as accepted by `-O`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "bin" => Some(OutputFormat::Bin),
            "prg" => Some(OutputFormat::Prg),
            "xex" => Some(OutputFormat::Xex),
            "k7" => Some(OutputFormat::K7),
            "tap" => Some(OutputFormat::Tap),
            "cas" => Some(OutputFormat::Cas),
            "rom" => Some(OutputFormat::Rom),
            "d64" => Some(OutputFormat::D64),
            "dsk" => Some(OutputFormat::Dsk),
            "atr" => Some(OutputFormat::Atr),
            _ => None,
        }
    }

    /// Guess the format from the extension of an output path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_name)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Bin => "bin",
            OutputFormat::Prg => "prg",
            OutputFormat::Xex => "xex",
            OutputFormat::K7 => "k7",
            OutputFormat::Tap => "tap",
            OutputFormat::Cas => "cas",
            OutputFormat::Rom => "rom",
            OutputFormat::D64 => "d64",
            OutputFormat::Dsk => "dsk",
            OutputFormat::Atr => "atr",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Gamma correction applied to image colors before palette matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GammaCorrection {
    #[default]
    None,
    Devulder,
    Florenzi,
}

/// Dynamic string pool sizing (`DEFINE STRING COUNT / SPACE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DStringConfig {
    /// Number of string descriptors.
    pub count: u16,
    /// Bytes of string heap.
    pub space: u16,
}

impl Default for DStringConfig {
    fn default() -> Self {
        Self {
            count: 32,
            space: 1024,
        }
    }
}

/// `INPUT` buffer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputConfig {
    /// Maximum characters accepted by one `INPUT`.
    pub size: u8,
    /// Character separating multiple values.
    pub separator: u8,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            size: 32,
            separator: b',',
        }
    }
}

/// An additional memory area registered by a profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AreaProfile {
    pub start: u16,
    pub end: u16,
    #[serde(default = "default_area_kind")]
    pub kind: MemoryAreaKind,
}

fn default_area_kind() -> MemoryAreaKind {
    MemoryAreaKind::Direct
}

/// An expansion memory layout registered by a profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpansionProfile {
    /// Size of every resident window, in bytes.
    pub windows: Vec<u16>,
    /// Number of expansion banks.
    pub banks: u8,
    /// Size of every expansion bank, in bytes.
    pub bank_size: u16,
}

/// The options record held by the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerOptions {
    /// `OPTION EXPLICIT`: undeclared variables are an error.
    pub explicit: bool,
    /// `OPTION CLIP`: graphic primitives clip to the screen.
    pub clip: bool,
    /// `OPTION READ SAFE`: READ converts mismatching DATA instead of misreading it.
    pub read_safe: bool,
    /// Precision used for `FLOAT` variables.
    pub float_precision: FloatPrecision,
    pub dstring: DStringConfig,
    pub input: InputConfig,
    /// Requested binary format. `None` picks the machine's default.
    pub output_format: Option<OutputFormat>,
    /// Refuse to touch files outside the source directory and to run tools.
    pub sandbox: bool,
    /// Enforce the BASIC 10 Liner contest rules.
    pub ten_liner_rules: bool,
    pub double_buffer: bool,
    pub gamma: GammaCorrection,
    /// Maximum number of optimizer cycles. Zero disables the optimizer.
    pub peephole_limit: usize,
    pub warnings_enabled: bool,
    /// Directory for intermediate files.
    pub temporary_path: PathBuf,
    /// Maximum number of concurrently running protothreads.
    pub protothread_count: u8,
    /// Runtime modules that are emitted inline at every use.
    pub preferred_inline: Vec<String>,
    pub extra_areas: Vec<AreaProfile>,
    pub expansion: Option<ExpansionProfile>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            explicit: false,
            clip: false,
            read_safe: false,
            float_precision: FloatPrecision::Fast,
            dstring: DStringConfig::default(),
            input: InputConfig::default(),
            output_format: None,
            sandbox: false,
            ten_liner_rules: false,
            double_buffer: false,
            gamma: GammaCorrection::None,
            peephole_limit: 5,
            warnings_enabled: true,
            temporary_path: std::env::temp_dir(),
            protothread_count: 8,
            preferred_inline: Vec::new(),
            extra_areas: Vec::new(),
            expansion: None,
        }
    }
}

/// Errors raised while reading a compilation profile.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read profile {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid profile: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid profile value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// A YAML overlay of compiler options.
///
/// Every field is optional; present fields replace the defaults.
///
/// ```yaml
/// explicit: true
/// float_precision: single
/// dstring_count: 64
/// memory_areas:
///   - { start: 0xC000, end: 0xCFFF }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    pub explicit: Option<bool>,
    pub clip: Option<bool>,
    pub read_safe: Option<bool>,
    pub float_precision: Option<FloatPrecision>,
    pub dstring_count: Option<u16>,
    pub dstring_space: Option<u16>,
    pub input_size: Option<u8>,
    pub double_buffer: Option<bool>,
    pub gamma: Option<GammaCorrection>,
    pub peephole_limit: Option<usize>,
    pub protothread_count: Option<u8>,
    pub output_format: Option<OutputFormat>,
    pub preferred_inline: Option<Vec<String>>,
    pub memory_areas: Vec<AreaProfile>,
    pub expansion: Option<ExpansionProfile>,
}

impl Profile {
    /// Parse a profile from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let profile: Profile = serde_yaml::from_str(text)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Read and parse a profile file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(count) = self.dstring_count {
            if count == 0 || count > 255 {
                return Err(ConfigError::Invalid {
                    field: "dstring_count",
                    reason: format!("{} is not in 1..=255", count),
                });
            }
        }
        if let Some(count) = self.protothread_count {
            if count == 0 {
                return Err(ConfigError::Invalid {
                    field: "protothread_count",
                    reason: "at least one thread is required".to_string(),
                });
            }
        }
        for area in &self.memory_areas {
            if area.end <= area.start {
                return Err(ConfigError::Invalid {
                    field: "memory_areas",
                    reason: format!("${:04X}-${:04X} is empty", area.start, area.end),
                });
            }
        }
        if let Some(expansion) = &self.expansion {
            if let Some(window) = expansion.windows.iter().find(|w| **w > expansion.bank_size) {
                return Err(ConfigError::Invalid {
                    field: "expansion",
                    reason: format!(
                        "window of {} bytes is larger than a bank ({} bytes)",
                        window, expansion.bank_size
                    ),
                });
            }
        }
        Ok(())
    }

    /// Overlay this profile on top of `options`.
    pub fn apply(&self, options: &mut CompilerOptions) {
        if let Some(v) = self.explicit {
            options.explicit = v;
        }
        if let Some(v) = self.clip {
            options.clip = v;
        }
        if let Some(v) = self.read_safe {
            options.read_safe = v;
        }
        if let Some(v) = self.float_precision {
            options.float_precision = v;
        }
        if let Some(v) = self.dstring_count {
            options.dstring.count = v;
        }
        if let Some(v) = self.dstring_space {
            options.dstring.space = v;
        }
        if let Some(v) = self.input_size {
            options.input.size = v;
        }
        if let Some(v) = self.double_buffer {
            options.double_buffer = v;
        }
        if let Some(v) = self.gamma {
            options.gamma = v;
        }
        if let Some(v) = self.peephole_limit {
            options.peephole_limit = v;
        }
        if let Some(v) = self.protothread_count {
            options.protothread_count = v;
        }
        if let Some(v) = self.output_format {
            options.output_format = Some(v);
        }
        if let Some(v) = &self.preferred_inline {
            options.preferred_inline = v.clone();
        }
        options.extra_areas.extend(self.memory_areas.iter().cloned());
        if let Some(expansion) = &self.expansion {
            options.expansion = Some(expansion.clone());
        }
    }
}
