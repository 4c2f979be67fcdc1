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

//! TRS-80 Color Computer: Motorola 6809, MC6847 VDG, SAM.
//!
//! Programs are DECB binaries loaded at `$2800`. The graphics page sits
//! at `$0E00-$25FF`; the text screen at `$0400`.

use super::library::COCO_LIBRARY;
use super::atari::pack;
use super::{BuildPaths, HardwareColor, Machine, MachineOp, RoutineCall, RuntimeModule, ScreenMode, ToolCommand};
use crate::assets::IndexedFrame;
use crate::config::{OutputFormat, TargetKind};
use crate::emitter::AsmLine;
use crate::error::ErrorCode;
use crate::memory::MemoryAreaKind;

pub const LOAD_ADDRESS: u16 = 0x2800;

/// Label of the first program instruction, used as the exec address.
pub const ENTRY_LABEL: &str = "CODESTART";

#[derive(Debug, Default, Clone, Copy)]
pub struct ColorComputer;

static PALETTE: &[HardwareColor] = &[
    HardwareColor { index: 0, rgb: [0x00, 0xFF, 0x00], name: "GREEN" },
    HardwareColor { index: 1, rgb: [0xFF, 0xFF, 0x00], name: "YELLOW" },
    HardwareColor { index: 2, rgb: [0x00, 0x00, 0xFF], name: "BLUE" },
    HardwareColor { index: 3, rgb: [0xFF, 0x00, 0x00], name: "RED" },
    HardwareColor { index: 4, rgb: [0xFF, 0xFF, 0xFF], name: "BUFF" },
    HardwareColor { index: 5, rgb: [0x00, 0xFF, 0xFF], name: "CYAN" },
    HardwareColor { index: 6, rgb: [0xFF, 0x00, 0xFF], name: "MAGENTA" },
    HardwareColor { index: 7, rgb: [0xFF, 0x80, 0x00], name: "ORANGE" },
    HardwareColor { index: 8, rgb: [0x00, 0x00, 0x00], name: "BLACK" },
];

static MODES: &[ScreenMode] = &[
    ScreenMode { id: 0, name: "TEXT", width: 32, height: 16, colors: 2, bits_per_pixel: 0, bitmap: false },
    ScreenMode { id: 3, name: "PMODE 3", width: 128, height: 192, colors: 4, bits_per_pixel: 2, bitmap: true },
    ScreenMode { id: 4, name: "PMODE 4", width: 256, height: 192, colors: 2, bits_per_pixel: 1, bitmap: true },
];

static FORMATS: &[OutputFormat] = &[OutputFormat::Bin, OutputFormat::Dsk];

impl Machine for ColorComputer {
    fn kind(&self) -> TargetKind {
        TargetKind::Coco
    }

    fn name(&self) -> &'static str {
        "TRS-80 Color Computer"
    }

    fn palette(&self) -> &'static [HardwareColor] {
        PALETTE
    }

    fn screen_modes(&self) -> &'static [ScreenMode] {
        MODES
    }

    fn default_mode(&self) -> u8 {
        4
    }

    fn memory_areas(&self) -> Vec<(u16, u16, MemoryAreaKind)> {
        vec![(0x7E00, 0x7FFF, MemoryAreaKind::Direct)]
    }

    fn load_address(&self, _format: OutputFormat) -> u16 {
        LOAD_ADDRESS
    }

    fn ram_size(&self) -> usize {
        (0x7E00 - LOAD_ADDRESS) as usize
    }

    fn output_formats(&self) -> &'static [OutputFormat] {
        FORMATS
    }

    fn default_format(&self) -> OutputFormat {
        OutputFormat::Bin
    }

    fn defines(&self) -> Vec<(&'static str, String)> {
        vec![("RANDOM_SOURCE", "$0113".to_string())]
    }

    fn library(&self) -> &'static [RuntimeModule] {
        COCO_LIBRARY
    }

    fn routine(&self, op: MachineOp) -> Option<RoutineCall> {
        use MachineOp::*;
        let call = match op {
            Startup => RoutineCall::new("startup", "STARTUP", &[]),
            PrintChar => RoutineCall::new("text", "TEXTPUT", &[("TEXTC", 1)]),
            PrintNewline => RoutineCall::new("text", "TEXTNEWLINE", &[]),
            PrintTab => RoutineCall::new("text", "TEXTTAB", &[]),
            Locate => RoutineCall::new("text", "TEXTAT", &[("TEXTX", 1), ("TEXTY", 1)]),
            Cls => RoutineCall::new("text", "TEXTCLS", &[]),
            Inkey => RoutineCall::new("input", "INKEY", &[]),
            WaitKey => RoutineCall::new("input", "WAITKEY", &[]),
            BitmapEnable => RoutineCall::new("bitmap", "BITMAPENABLE", &[("BITMAPMODE", 1)]),
            BitmapClear => RoutineCall::new("bitmap", "BITMAPCLEAR", &[]),
            Plot => RoutineCall::new("bitmap", "PLOT", &[("PLOTX", 2), ("PLOTY", 1), ("PLOTC", 1)]),
            ColorBackground => RoutineCall::new("video", "COLORBACKGROUND", &[("VIDEOC", 1)]),
            WaitVbl => RoutineCall::new("video", "WAITVBL", &[]),
            PutImage => RoutineCall::new(
                "image",
                "PUTIMAGE",
                &[("IMAGEPTR", 2), ("IMAGEX", 2), ("IMAGEY", 1)],
            ),
            PutTilemap => RoutineCall::new(
                "tiles",
                "PUTTILEMAP",
                &[("TILEMAPPTR", 2), ("TILEX", 1), ("TILEY", 1)],
            ),
            Volume => RoutineCall::new("audio", "AUDIOVOLUME", &[("AUDIOV", 1)]),
            Play => RoutineCall::new(
                "audio",
                "AUDIOPLAY",
                &[("AUDIOVOICES", 1), ("AUDIONOTE", 1), ("AUDIODURATION", 2)],
            ),
            SoundOn => RoutineCall::new("audio", "AUDIOON", &[]),
            SoundOff => RoutineCall::new("audio", "AUDIOOFF", &[]),
            TimerSet => RoutineCall::new(
                "timer",
                "TIMERSET",
                &[("TIMERPERIOD", 2), ("TIMERHANDLER", 2)],
            ),
            TimerOn => RoutineCall::new("timertick", "TIMERON", &[]),
            TimerOff => RoutineCall::new("timertick", "TIMEROFF", &[]),
            Pen | Paper | ColorBorder | SpriteEnable | SpriteDisable | SpriteAt | SpriteColor
            | SpriteMulticolor | SpriteMonocolor | SpriteExpand | SpriteCompress | SpriteData
            | Dload => return None,
        };
        Some(call)
    }

    /// The ROM prints lower case as inverse video, so letters are folded.
    fn encode_char(&self, c: char) -> u8 {
        match c {
            '\n' => 13,
            'a'..='z' => c.to_ascii_uppercase() as u8,
            ' '..='~' => c as u8,
            _ => b'?',
        }
    }

    fn voices(&self) -> u8 {
        1
    }

    fn prologue(&self, load_address: u16) -> Vec<AsmLine> {
        vec![
            AsmLine::directive(format!("ORG ${:04X}", load_address)),
            AsmLine::label(ENTRY_LABEL),
        ]
    }

    fn epilogue(&self) -> Vec<AsmLine> {
        vec![AsmLine::directive(format!("END {}", ENTRY_LABEL))]
    }

    fn convert_frame(&self, mode: &ScreenMode, frame: &IndexedFrame) -> Result<Vec<u8>, ErrorCode> {
        match mode.id {
            4 => Ok(pack(frame, 1, 4)),
            3 => Ok(pack(frame, 2, 3)),
            _ => Err(ErrorCode::ScreenModeUnknown),
        }
    }

    fn build_commands(&self, paths: &BuildPaths) -> Vec<ToolCommand> {
        let path = |p: &std::path::Path| p.to_string_lossy().into_owned();
        let mut args = vec![
            "-B".to_string(),
            "-o".to_string(),
            path(&paths.binary),
            "-s".to_string(),
            path(&paths.symbols),
        ];
        if let Some(listing) = &paths.listing {
            args.push("-l".to_string());
            args.push(path(listing));
        }
        args.push(path(&paths.source));
        vec![ToolCommand {
            program: "asm6809".to_string(),
            args,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_pmode_packing() {
        let frame = IndexedFrame {
            width: 8,
            height: 1,
            pixels: vec![1, 0, 1, 0, 1, 0, 1, 0],
            palette: Vec::new(),
        };
        let pmode4 = ColorComputer.screen_mode(4).unwrap();
        assert_eq!(ColorComputer.convert_frame(pmode4, &frame).unwrap(), vec![1, 1, 4, 0xAA]);
        let pmode3 = ColorComputer.screen_mode(3).unwrap();
        assert_eq!(
            ColorComputer.convert_frame(pmode3, &frame).unwrap(),
            vec![2, 1, 3, 0b01_00_01_00, 0b01_00_01_00]
        );
    }

    #[test]
    fn test_missing_hardware() {
        assert_eq!(ColorComputer.sprite_count(), 0);
        assert!(ColorComputer.routine(MachineOp::SpriteAt).is_none());
        assert!(ColorComputer.routine(MachineOp::Dload).is_none());
        assert!(ColorComputer.routine(MachineOp::Pen).is_none());
        assert!(ColorComputer.routine(MachineOp::Play).is_some());
    }

    #[test]
    fn test_build_command() {
        let paths = BuildPaths {
            source: PathBuf::from("main.asm"),
            linker_config: PathBuf::from("main.cfg"),
            object: PathBuf::from("main.o"),
            binary: PathBuf::from("main.bin"),
            symbols: PathBuf::from("main.sym"),
            listing: None,
        };
        let commands = ColorComputer.build_commands(&paths);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].to_string(), "asm6809 -B -o main.bin -s main.sym main.asm");
    }

    #[test]
    fn test_origin() {
        let lines = ColorComputer.prologue(LOAD_ADDRESS);
        assert_eq!(lines[0].text, "ORG $2800");
        assert_eq!(ColorComputer.epilogue()[0].text, "END CODESTART");
    }
}
