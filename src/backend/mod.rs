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

//! Target backends.
//!
//! A [`Target`] pairs a [`Cpu`] (instruction-level primitives, runtime
//! library for the processor family) with a [`Machine`] (memory layout,
//! palette, screen modes, video and audio routines, image conversion and
//! the toolchain recipe).
//!
//! Machine operations are table driven: [`Machine::routine`] maps a
//! [`MachineOp`] to the runtime entry implementing it and the runtime
//! variables its parameters are passed in. A machine that lacks an
//! operation returns `None` and the code generator warns instead.

pub mod atari;
pub mod c64;
pub mod coco;
pub mod cpu;
pub mod library;
pub mod mc6809;
pub mod mos6502;

pub use cpu::{Comparison, Cpu, LogicOp, PeepholeRule, Value};

use crate::assets::IndexedFrame;
use crate::config::{ExpansionProfile, OutputFormat, TargetKind};
use crate::emitter::AsmLine;
use crate::error::ErrorCode;
use crate::memory::MemoryAreaKind;
use std::path::PathBuf;

/// A runtime module: assembly text deployed at most once per program.
#[derive(Debug)]
pub struct RuntimeModule {
    pub name: &'static str,
    /// Preprocessor input, see [`crate::emitter::preprocess`].
    pub source: &'static str,
    /// Modules that must be deployed before this one.
    pub requires: &'static [&'static str],
    /// Storage the module works on, emitted into the variables segment.
    /// A size is either a number or the name of a define.
    pub variables: &'static [(&'static str, &'static str)],
    /// Entry called once at startup.
    pub init: Option<&'static str>,
}

impl RuntimeModule {
    /// Byte size of each variable once defines are known.
    pub fn variable_sizes(&self, defines: &[(&str, String)]) -> Vec<(&'static str, usize)> {
        self.variables
            .iter()
            .map(|(name, size)| {
                let resolved = defines
                    .iter()
                    .find(|(define, _)| define == size)
                    .map(|(_, value)| value.as_str())
                    .unwrap_or(size);
                (*name, resolved.parse().unwrap_or(1))
            })
            .collect()
    }
}

/// A color the video hardware can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareColor {
    /// Value written to the color registers.
    pub index: u8,
    pub rgb: [u8; 3],
    pub name: &'static str,
}

/// A screen mode of a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenMode {
    pub id: u8,
    pub name: &'static str,
    /// Width in pixels (characters for text modes).
    pub width: u16,
    pub height: u16,
    /// Colors an image may use in this mode.
    pub colors: usize,
    pub bits_per_pixel: u8,
    pub bitmap: bool,
}

impl ScreenMode {
    /// Pixels packed into one byte of converted image data.
    pub fn pixels_per_byte(&self) -> usize {
        match self.bits_per_pixel {
            0 => 1,
            bpp => 8 / bpp as usize,
        }
    }
}

/// Operations implemented by machine runtime modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineOp {
    Startup,
    PrintChar,
    PrintNewline,
    PrintTab,
    Locate,
    Cls,
    Pen,
    Paper,
    Inkey,
    WaitKey,
    BitmapEnable,
    BitmapClear,
    Plot,
    ColorBorder,
    ColorBackground,
    WaitVbl,
    PutImage,
    SpriteEnable,
    SpriteDisable,
    SpriteAt,
    SpriteColor,
    SpriteMulticolor,
    SpriteMonocolor,
    SpriteExpand,
    SpriteCompress,
    SpriteData,
    PutTilemap,
    Volume,
    Play,
    SoundOn,
    SoundOff,
    Dload,
    TimerSet,
    TimerOn,
    TimerOff,
}

impl MachineOp {
    /// BASIC spelling, used in diagnostics.
    pub fn keyword(&self) -> &'static str {
        match self {
            MachineOp::Startup => "startup",
            MachineOp::PrintChar | MachineOp::PrintNewline | MachineOp::PrintTab => "PRINT",
            MachineOp::Locate => "LOCATE",
            MachineOp::Cls => "CLS",
            MachineOp::Pen => "PEN",
            MachineOp::Paper => "PAPER",
            MachineOp::Inkey => "INKEY$",
            MachineOp::WaitKey => "WAIT KEY",
            MachineOp::BitmapEnable => "BITMAP ENABLE",
            MachineOp::BitmapClear => "CLS",
            MachineOp::Plot => "PLOT",
            MachineOp::ColorBorder => "COLOR BORDER",
            MachineOp::ColorBackground => "COLOR BACKGROUND",
            MachineOp::WaitVbl => "WAIT VBL",
            MachineOp::PutImage => "PUT IMAGE",
            MachineOp::SpriteEnable => "SPRITE ENABLE",
            MachineOp::SpriteDisable => "SPRITE DISABLE",
            MachineOp::SpriteAt => "SPRITE AT",
            MachineOp::SpriteColor => "SPRITE COLOR",
            MachineOp::SpriteMulticolor => "SPRITE MULTICOLOR",
            MachineOp::SpriteMonocolor => "SPRITE MONOCOLOR",
            MachineOp::SpriteExpand => "SPRITE EXPAND",
            MachineOp::SpriteCompress => "SPRITE COMPRESS",
            MachineOp::SpriteData => "SPRITE IMAGE",
            MachineOp::PutTilemap => "PUT TILEMAP",
            MachineOp::Volume => "VOLUME",
            MachineOp::Play => "PLAY",
            MachineOp::SoundOn => "SOUND ON",
            MachineOp::SoundOff => "SOUND OFF",
            MachineOp::Dload => "DLOAD",
            MachineOp::TimerSet => "EVERY",
            MachineOp::TimerOn => "EVERY ON",
            MachineOp::TimerOff => "EVERY OFF",
        }
    }
}

/// Where a machine operation lives and how its parameters are passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutineCall {
    pub module: &'static str,
    pub entry: &'static str,
    /// Runtime variables receiving the arguments, with their width in bytes.
    pub params: &'static [(&'static str, usize)],
}

impl RoutineCall {
    pub const fn new(
        module: &'static str,
        entry: &'static str,
        params: &'static [(&'static str, usize)],
    ) -> Self {
        Self {
            module,
            entry,
            params,
        }
    }
}

/// An external program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl std::fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.program, self.args.join(" "))
    }
}

/// Files involved in assembling and linking one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPaths {
    pub source: PathBuf,
    pub linker_config: PathBuf,
    pub object: PathBuf,
    /// Raw binary produced by the assembler or linker.
    pub binary: PathBuf,
    /// Symbol file in the assembler's native format.
    pub symbols: PathBuf,
    pub listing: Option<PathBuf>,
}

fn path(p: &std::path::Path) -> String {
    p.to_string_lossy().into_owned()
}

/// The machine half of a target.
pub trait Machine {
    fn kind(&self) -> TargetKind;

    /// Human readable name.
    fn name(&self) -> &'static str;

    fn palette(&self) -> &'static [HardwareColor];

    fn screen_modes(&self) -> &'static [ScreenMode];

    /// Bitmap mode used for images loaded before any `BITMAP ENABLE`.
    fn default_mode(&self) -> u8;

    fn screen_mode(&self, id: u8) -> Option<&'static ScreenMode> {
        self.screen_modes().iter().find(|m| m.id == id)
    }

    /// Areas where variables with a fixed address may be placed.
    fn memory_areas(&self) -> Vec<(u16, u16, MemoryAreaKind)>;

    /// Address the program is loaded at for `format`.
    fn load_address(&self, format: OutputFormat) -> u16;

    /// Free RAM between the load address and the end of usable memory.
    fn ram_size(&self) -> usize;

    fn output_formats(&self) -> &'static [OutputFormat];

    fn default_format(&self) -> OutputFormat;

    /// Preprocessor defines of the machine's runtime modules.
    fn defines(&self) -> Vec<(&'static str, String)>;

    fn library(&self) -> &'static [RuntimeModule];

    fn routine(&self, op: MachineOp) -> Option<RoutineCall>;

    /// Character code of `c` in the machine's character set.
    fn encode_char(&self, c: char) -> u8;

    fn sprite_count(&self) -> u8 {
        0
    }

    /// Largest sprite image, in pixels.
    fn sprite_size(&self) -> (usize, usize) {
        (0, 0)
    }

    fn voices(&self) -> u8;

    /// Lines placed before the program (load stubs, headers).
    fn prologue(&self, load_address: u16) -> Vec<AsmLine>;

    /// Lines placed after the main program.
    fn epilogue(&self) -> Vec<AsmLine> {
        Vec::new()
    }

    /// Convert one frame of palette-indexed pixels to the layout of `mode`.
    fn convert_frame(&self, mode: &ScreenMode, frame: &IndexedFrame) -> Result<Vec<u8>, ErrorCode>;

    /// Convert one frame to the machine's sprite layout.
    fn convert_sprite(&self, _frame: &IndexedFrame) -> Result<Vec<u8>, ErrorCode> {
        Err(ErrorCode::SpriteIdOutOfRange)
    }

    /// Commands assembling (and linking) the program into a raw binary.
    fn build_commands(&self, paths: &BuildPaths) -> Vec<ToolCommand>;

    /// Memory expansion available without a profile.
    fn expansion(&self) -> Option<ExpansionProfile> {
        None
    }
}

/// The assembler and linker commands shared by the cc65 machines.
pub(crate) fn cc65_commands(paths: &BuildPaths) -> Vec<ToolCommand> {
    let mut assemble = vec![
        "--cpu".to_string(),
        "6502".to_string(),
        "-o".to_string(),
        path(&paths.object),
    ];
    if let Some(listing) = &paths.listing {
        assemble.push("-l".to_string());
        assemble.push(path(listing));
    }
    assemble.push(path(&paths.source));
    vec![
        ToolCommand {
            program: "ca65".to_string(),
            args: assemble,
        },
        ToolCommand {
            program: "ld65".to_string(),
            args: vec![
                "-C".to_string(),
                path(&paths.linker_config),
                "-o".to_string(),
                path(&paths.binary),
                "-Ln".to_string(),
                path(&paths.symbols),
                path(&paths.object),
            ],
        },
    ]
}

/// A CPU paired with a machine.
pub struct Target {
    pub kind: TargetKind,
    pub cpu: Box<dyn Cpu>,
    pub machine: Box<dyn Machine>,
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target")
            .field("kind", &self.kind)
            .field("cpu", &self.cpu.name())
            .field("machine", &self.machine.name())
            .finish()
    }
}

impl Target {
    pub fn new(kind: TargetKind) -> Self {
        match kind {
            TargetKind::C64 => Self {
                kind,
                cpu: Box::new(mos6502::Mos6502::new()),
                machine: Box::new(c64::Commodore64),
            },
            TargetKind::Atari => Self {
                kind,
                cpu: Box::new(mos6502::Mos6502::new()),
                machine: Box::new(atari::Atari),
            },
            TargetKind::Coco => Self {
                kind,
                cpu: Box::new(mc6809::Mc6809::new()),
                machine: Box::new(coco::ColorComputer),
            },
        }
    }

    /// Find a runtime module in the machine library, then in the CPU library.
    pub fn module(&self, name: &str) -> Option<&'static RuntimeModule> {
        self.machine
            .library()
            .iter()
            .chain(self.cpu.library().iter())
            .find(|m| m.name == name)
    }

    /// Check that the machine can produce `format`.
    pub fn check_format(&self, format: OutputFormat) -> Result<(), ErrorCode> {
        if self.machine.output_formats().contains(&format) {
            Ok(())
        } else {
            Err(ErrorCode::OutputFormatMismatch)
        }
    }
}

/// Nearest-match helpers shared by the machines' palettes.
pub fn palette_index(palette: &[HardwareColor], index: u8) -> Option<&HardwareColor> {
    palette.iter().find(|c| c.index == index)
}
