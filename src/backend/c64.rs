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

//! Commodore 64: MOS 6510, VIC-II, SID.
//!
//! Memory map used by the generated programs:
//!
//! | Range         | Use                                   |
//! |---------------|---------------------------------------|
//! | `$0801-$7FFF` | BASIC stub, program, variables        |
//! | `$8000-$83FF` | sprite images (VIC bank 2)            |
//! | `$8400-$87FF` | text screen / color matrix            |
//! | `$A000-$BF3F` | bitmap (BASIC ROM banked out)         |
//! | `$CC00-$CFFF` | free area for placed variables        |

use super::{
    cc65_commands, BuildPaths, HardwareColor, Machine, MachineOp, RoutineCall, RuntimeModule,
    ScreenMode, ToolCommand,
};
use super::library::C64_LIBRARY;
use crate::assets::IndexedFrame;
use crate::config::{OutputFormat, TargetKind};
use crate::emitter::AsmLine;
use crate::error::ErrorCode;
use crate::memory::MemoryAreaKind;

/// Start of BASIC memory, where a PRG is loaded.
pub const BASIC_START: u16 = 0x0801;

#[derive(Debug, Default, Clone, Copy)]
pub struct Commodore64;

static PALETTE: &[HardwareColor] = &[
    HardwareColor { index: 0, rgb: [0x00, 0x00, 0x00], name: "BLACK" },
    HardwareColor { index: 1, rgb: [0xFF, 0xFF, 0xFF], name: "WHITE" },
    HardwareColor { index: 2, rgb: [0x68, 0x37, 0x2B], name: "RED" },
    HardwareColor { index: 3, rgb: [0x70, 0xA4, 0xB2], name: "CYAN" },
    HardwareColor { index: 4, rgb: [0x6F, 0x3D, 0x86], name: "VIOLET" },
    HardwareColor { index: 5, rgb: [0x58, 0x8D, 0x43], name: "GREEN" },
    HardwareColor { index: 6, rgb: [0x35, 0x28, 0x79], name: "BLUE" },
    HardwareColor { index: 7, rgb: [0xB8, 0xC7, 0x6F], name: "YELLOW" },
    HardwareColor { index: 8, rgb: [0x6F, 0x4F, 0x25], name: "ORANGE" },
    HardwareColor { index: 9, rgb: [0x43, 0x39, 0x00], name: "BROWN" },
    HardwareColor { index: 10, rgb: [0x9A, 0x67, 0x59], name: "LIGHT RED" },
    HardwareColor { index: 11, rgb: [0x44, 0x44, 0x44], name: "DARK GREY" },
    HardwareColor { index: 12, rgb: [0x6C, 0x6C, 0x6C], name: "GREY" },
    HardwareColor { index: 13, rgb: [0x9A, 0xD2, 0x84], name: "LIGHT GREEN" },
    HardwareColor { index: 14, rgb: [0x6C, 0x5E, 0xB5], name: "LIGHT BLUE" },
    HardwareColor { index: 15, rgb: [0x95, 0x95, 0x95], name: "LIGHT GREY" },
];

static MODES: &[ScreenMode] = &[
    ScreenMode { id: 0, name: "TEXT", width: 40, height: 25, colors: 16, bits_per_pixel: 0, bitmap: false },
    ScreenMode { id: 1, name: "HIRES", width: 320, height: 200, colors: 16, bits_per_pixel: 1, bitmap: true },
    ScreenMode { id: 2, name: "MULTICOLOR", width: 160, height: 200, colors: 16, bits_per_pixel: 2, bitmap: true },
];

static FORMATS: &[OutputFormat] = &[OutputFormat::Prg, OutputFormat::D64, OutputFormat::Bin];

/// Distinct hardware colors of one cell, in order of first appearance.
fn cell_colors(frame: &IndexedFrame, x0: usize, y0: usize, width: usize) -> Vec<u8> {
    let mut colors = Vec::new();
    for y in y0..y0 + 8 {
        for x in x0..x0 + width {
            let color = frame.hardware(x, y);
            if !colors.contains(&color) {
                colors.push(color);
            }
        }
    }
    colors
}

fn background(frame: &IndexedFrame) -> u8 {
    frame.palette.first().map(|e| e.hardware).unwrap_or(0)
}

/// Hires cells: one bit per pixel, two colors per 8x8 cell.
fn convert_hires(frame: &IndexedFrame) -> Result<Vec<u8>, ErrorCode> {
    let columns = frame.width / 8;
    let rows = frame.height / 8;
    let background = background(frame);
    let mut bitmap = Vec::with_capacity(columns * rows * 8);
    let mut screen = Vec::with_capacity(columns * rows);
    for row in 0..rows {
        for column in 0..columns {
            let colors = cell_colors(frame, column * 8, row * 8, 8);
            if colors.len() > 2 {
                return Err(ErrorCode::TooManyColors);
            }
            let (fg, bg) = match colors.as_slice() {
                [only] => (*only, *only),
                [a, b] if *a == background => (*b, *a),
                [a, b] => (*a, *b),
                _ => (background, background),
            };
            for y in row * 8..row * 8 + 8 {
                let mut byte = 0u8;
                for x in 0..8 {
                    if fg != bg && frame.hardware(column * 8 + x, y) == fg {
                        byte |= 0x80 >> x;
                    }
                }
                bitmap.push(byte);
            }
            screen.push(fg << 4 | bg);
        }
    }
    let mut data = vec![columns as u8, rows as u8, 1];
    data.extend(bitmap);
    data.extend(screen);
    Ok(data)
}

/// Multicolor cells: 4x8 double-wide pixels, the shared background
/// plus three colors per cell.
fn convert_multicolor(frame: &IndexedFrame) -> Result<Vec<u8>, ErrorCode> {
    let columns = frame.width / 4;
    let rows = frame.height / 8;
    let background = background(frame);
    let mut bitmap = Vec::with_capacity(columns * rows * 8);
    let mut screen = Vec::with_capacity(columns * rows);
    let mut colorram = Vec::with_capacity(columns * rows);
    for row in 0..rows {
        for column in 0..columns {
            let mut colors = cell_colors(frame, column * 4, row * 8, 4);
            colors.retain(|c| *c != background);
            if colors.len() > 3 {
                return Err(ErrorCode::TooManyColors);
            }
            let code = |color: u8| -> u8 {
                if color == background {
                    0
                } else {
                    colors.iter().position(|c| *c == color).map(|p| p as u8 + 1).unwrap_or(0)
                }
            };
            for y in row * 8..row * 8 + 8 {
                let mut byte = 0u8;
                for x in 0..4 {
                    byte |= code(frame.hardware(column * 4 + x, y)) << (6 - 2 * x);
                }
                bitmap.push(byte);
            }
            let color = |n: usize| colors.get(n).copied().unwrap_or(0);
            screen.push(color(0) << 4 | color(1));
            colorram.push(color(2));
        }
    }
    let mut data = vec![columns as u8, rows as u8, 2];
    data.extend(bitmap);
    data.extend(screen);
    data.extend(colorram);
    data.push(background);
    Ok(data)
}

impl Machine for Commodore64 {
    fn kind(&self) -> TargetKind {
        TargetKind::C64
    }

    fn name(&self) -> &'static str {
        "Commodore 64"
    }

    fn palette(&self) -> &'static [HardwareColor] {
        PALETTE
    }

    fn screen_modes(&self) -> &'static [ScreenMode] {
        MODES
    }

    fn default_mode(&self) -> u8 {
        1
    }

    fn memory_areas(&self) -> Vec<(u16, u16, MemoryAreaKind)> {
        vec![(0xCC00, 0xCFFF, MemoryAreaKind::Direct)]
    }

    fn load_address(&self, _format: OutputFormat) -> u16 {
        BASIC_START
    }

    fn ram_size(&self) -> usize {
        0x8000 - BASIC_START as usize
    }

    fn output_formats(&self) -> &'static [OutputFormat] {
        FORMATS
    }

    fn default_format(&self) -> OutputFormat {
        OutputFormat::Prg
    }

    fn defines(&self) -> Vec<(&'static str, String)> {
        vec![
            ("ZP_PTR0", "$FB".to_string()),
            ("ZP_PTR1", "$FD".to_string()),
            ("RANDOM_SOURCE", "$D012".to_string()),
        ]
    }

    fn library(&self) -> &'static [RuntimeModule] {
        C64_LIBRARY
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
            Pen => RoutineCall::new("text", "TEXTPEN", &[("TEXTC", 1)]),
            Paper => RoutineCall::new("text", "TEXTPAPER", &[("TEXTC", 1)]),
            Inkey => RoutineCall::new("input", "INKEY", &[]),
            WaitKey => RoutineCall::new("input", "WAITKEY", &[]),
            BitmapEnable => RoutineCall::new("bitmap", "BITMAPENABLE", &[("BITMAPMODE", 1)]),
            BitmapClear => RoutineCall::new("bitmap", "BITMAPCLEAR", &[]),
            Plot => RoutineCall::new("bitmap", "PLOT", &[("PLOTX", 2), ("PLOTY", 1), ("PLOTC", 1)]),
            ColorBorder => RoutineCall::new("video", "COLORBORDER", &[("VIDEOC", 1)]),
            ColorBackground => RoutineCall::new("video", "COLORBACKGROUND", &[("VIDEOC", 1)]),
            WaitVbl => RoutineCall::new("video", "WAITVBL", &[]),
            PutImage => RoutineCall::new(
                "image",
                "PUTIMAGE",
                &[("IMAGEPTR", 2), ("IMAGEX", 2), ("IMAGEY", 1)],
            ),
            SpriteEnable => RoutineCall::new("sprite", "SPRITEENABLE", &[("SPRITEN", 1)]),
            SpriteDisable => RoutineCall::new("sprite", "SPRITEDISABLE", &[("SPRITEN", 1)]),
            SpriteAt => RoutineCall::new(
                "sprite",
                "SPRITEAT",
                &[("SPRITEN", 1), ("SPRITEX", 2), ("SPRITEY", 1)],
            ),
            SpriteColor => RoutineCall::new("sprite", "SPRITECOLOR", &[("SPRITEN", 1), ("SPRITEC", 1)]),
            SpriteMulticolor => RoutineCall::new("sprite", "SPRITEMULTICOLOR", &[("SPRITEN", 1)]),
            SpriteMonocolor => RoutineCall::new("sprite", "SPRITEMONOCOLOR", &[("SPRITEN", 1)]),
            SpriteExpand => RoutineCall::new("sprite", "SPRITEEXPAND", &[("SPRITEN", 1)]),
            SpriteCompress => RoutineCall::new("sprite", "SPRITECOMPRESS", &[("SPRITEN", 1)]),
            SpriteData => RoutineCall::new("sprite", "SPRITEDATA", &[("SPRITEN", 1), ("SPRITEPTR", 2)]),
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
            Dload => RoutineCall::new("dload", "DLOAD", &[("DLOADNAME", 2), ("DLOADADDR", 2)]),
            TimerSet => RoutineCall::new(
                "timer",
                "TIMERSET",
                &[("TIMERPERIOD", 2), ("TIMERHANDLER", 2)],
            ),
            TimerOn => RoutineCall::new("timertick", "TIMERON", &[]),
            TimerOff => RoutineCall::new("timertick", "TIMEROFF", &[]),
        };
        Some(call)
    }

    fn encode_char(&self, c: char) -> u8 {
        match c {
            '\n' => 13,
            'a'..='z' => c.to_ascii_uppercase() as u8,
            ' '..='~' => c as u8,
            _ => b'?',
        }
    }

    fn sprite_count(&self) -> u8 {
        8
    }

    fn sprite_size(&self) -> (usize, usize) {
        (24, 21)
    }

    fn voices(&self) -> u8 {
        3
    }

    fn prologue(&self, load_address: u16) -> Vec<AsmLine> {
        if load_address != BASIC_START {
            return Vec::new();
        }
        // 10 SYS 2062
        vec![
            AsmLine::comment("BASIC stub: 10 SYS 2062"),
            AsmLine::directive(".word $080C"),
            AsmLine::directive(".word 10"),
            AsmLine::directive(".byte $9E,$20,$32,$30,$36,$32,$00"),
            AsmLine::directive(".word $0000"),
        ]
    }

    fn convert_frame(&self, mode: &ScreenMode, frame: &IndexedFrame) -> Result<Vec<u8>, ErrorCode> {
        match mode.id {
            1 => convert_hires(frame),
            2 => convert_multicolor(frame),
            _ => Err(ErrorCode::ScreenModeUnknown),
        }
    }

    fn convert_sprite(&self, frame: &IndexedFrame) -> Result<Vec<u8>, ErrorCode> {
        if frame.width > 24 || frame.height > 21 {
            return Err(ErrorCode::SpriteTooLarge);
        }
        let mut data = vec![0u8; 63];
        for y in 0..frame.height {
            for x in 0..frame.width {
                if frame.slot(x, y) != 0 {
                    data[y * 3 + x / 8] |= 0x80 >> (x % 8);
                }
            }
        }
        Ok(data)
    }

    fn build_commands(&self, paths: &BuildPaths) -> Vec<ToolCommand> {
        cc65_commands(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::PaletteEntry;
    use pretty_assertions::assert_eq;

    fn entry(hardware: u8) -> PaletteEntry {
        PaletteEntry {
            hardware,
            rgb: [0, 0, 0],
            count: 0,
        }
    }

    fn frame(width: usize, height: usize, pixels: Vec<u8>, palette: &[u8]) -> IndexedFrame {
        IndexedFrame {
            width,
            height,
            pixels,
            palette: palette.iter().map(|h| entry(*h)).collect(),
        }
    }

    #[test]
    fn test_hires_cell() {
        let mut pixels = vec![0u8; 64];
        pixels[0] = 1;
        pixels[63] = 1;
        let data = convert_hires(&frame(8, 8, pixels, &[6, 1])).unwrap();
        assert_eq!(&data[..3], &[1, 1, 1]);
        assert_eq!(data[3], 0x80);
        assert_eq!(data[10], 0x01);
        assert_eq!(data[11], 0x16);
        assert_eq!(data.len(), 3 + 8 + 1);
    }

    #[test]
    fn test_hires_rejects_three_colors() {
        let mut pixels = vec![0u8; 64];
        pixels[1] = 1;
        pixels[2] = 2;
        assert_eq!(
            convert_hires(&frame(8, 8, pixels, &[0, 1, 2])),
            Err(ErrorCode::TooManyColors)
        );
    }

    #[test]
    fn test_multicolor_cells() {
        let mut pixels = vec![0u8; 64];
        pixels[0] = 1;
        pixels[1] = 2;
        pixels[2] = 3;
        let data = convert_multicolor(&frame(8, 8, pixels, &[0, 5, 7, 2])).unwrap();
        assert_eq!(&data[..3], &[2, 1, 2]);
        assert_eq!(data[3], 0b01_10_11_00);
        let screen = 3 + 16;
        assert_eq!(data[screen], 0x57);
        assert_eq!(data[screen + 2], 2);
        assert_eq!(*data.last().unwrap(), 0);
        assert_eq!(data.len(), 3 + 16 + 2 + 2 + 1);
    }

    #[test]
    fn test_sprite_layout() {
        let mut pixels = vec![0u8; 24 * 21];
        pixels[0] = 1;
        pixels[24 * 21 - 1] = 1;
        let data = Commodore64
            .convert_sprite(&frame(24, 21, pixels, &[0, 1]))
            .unwrap();
        assert_eq!(data.len(), 63);
        assert_eq!(data[0], 0x80);
        assert_eq!(data[62], 0x01);
    }

    #[test]
    fn test_prologue_is_a_basic_stub() {
        let lines = Commodore64.prologue(BASIC_START);
        assert_eq!(lines.len(), 5);
        assert!(Commodore64.prologue(0xC000).is_empty());
    }

    #[test]
    fn test_petscii() {
        assert_eq!(Commodore64.encode_char('a'), b'A');
        assert_eq!(Commodore64.encode_char('\n'), 13);
        assert_eq!(Commodore64.encode_char('é'), b'?');
    }

    #[test]
    fn test_every_operation_is_available() {
        assert!(Commodore64.routine(MachineOp::Dload).is_some());
        assert!(Commodore64.routine(MachineOp::SpriteMulticolor).is_some());
    }
}
