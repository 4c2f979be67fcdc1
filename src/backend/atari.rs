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

//! Atari 8-bit computers: MOS 6502, ANTIC / GTIA, POKEY.
//!
//! Programs load at `$2000` and must end below the player-missile
//! memory at `$7800`. Screens are opened through the OS `S:` device,
//! so the display list and screen memory belong to the OS.

use super::library::ATARI_LIBRARY;
use super::{
    cc65_commands, BuildPaths, HardwareColor, Machine, MachineOp, RoutineCall, RuntimeModule,
    ScreenMode, ToolCommand,
};
use crate::assets::IndexedFrame;
use crate::config::{OutputFormat, TargetKind};
use crate::emitter::AsmLine;
use crate::error::ErrorCode;
use crate::memory::MemoryAreaKind;
use std::sync::OnceLock;

pub const LOAD_ADDRESS: u16 = 0x2000;

/// Load address of the left cartridge.
pub const CARTRIDGE_START: u16 = 0xA000;

/// First byte of player-missile memory.
const PMBASE: u16 = 0x7800;

#[derive(Debug, Default, Clone, Copy)]
pub struct Atari;

const HUES: [&str; 16] = [
    "GREY", "GOLD", "ORANGE", "RED ORANGE", "PINK", "PURPLE", "PURPLE BLUE", "BLUE",
    "BLUE2", "LIGHT BLUE", "TURQUOISE", "GREEN BLUE", "GREEN", "YELLOW GREEN", "ORANGE GREEN",
    "LIGHT ORANGE",
];

/// The 128 GTIA colors: hue in the high nibble, even luminance in the low one.
fn build_palette() -> Vec<HardwareColor> {
    let mut colors = Vec::with_capacity(128);
    for hue in 0..16u8 {
        for lum in (0..16u8).step_by(2) {
            let y = (f64::from(lum) + 1.0) / 16.0;
            let (i, q) = if hue == 0 {
                (0.0, 0.0)
            } else {
                let angle = (f64::from(hue - 1) * 24.0 - 57.0).to_radians();
                (0.2 * angle.cos(), 0.2 * angle.sin())
            };
            let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            colors.push(HardwareColor {
                index: hue << 4 | lum,
                rgb: [
                    channel(y + 0.956 * i + 0.621 * q),
                    channel(y - 0.272 * i - 0.647 * q),
                    channel(y - 1.106 * i + 1.703 * q),
                ],
                name: HUES[hue as usize],
            });
        }
    }
    colors
}

static PALETTE: OnceLock<Vec<HardwareColor>> = OnceLock::new();

static MODES: &[ScreenMode] = &[
    ScreenMode { id: 0, name: "GRAPHICS 0", width: 40, height: 24, colors: 2, bits_per_pixel: 0, bitmap: false },
    ScreenMode { id: 8, name: "GRAPHICS 8", width: 320, height: 192, colors: 2, bits_per_pixel: 1, bitmap: true },
    ScreenMode { id: 15, name: "GRAPHICS 15", width: 160, height: 192, colors: 4, bits_per_pixel: 2, bitmap: true },
];

static FORMATS: &[OutputFormat] = &[
    OutputFormat::Xex,
    OutputFormat::Atr,
    OutputFormat::Rom,
    OutputFormat::Bin,
];

/// Pack palette slots MSB first, `bits` bits per pixel.
pub(crate) fn pack(frame: &IndexedFrame, bits: u8, mode: u8) -> Vec<u8> {
    let per_byte = 8 / bits as usize;
    let bytes_per_row = frame.width.div_ceil(per_byte);
    let mask = (1u8 << bits) - 1;
    let mut data = vec![bytes_per_row as u8, frame.height as u8, mode];
    for y in 0..frame.height {
        for column in 0..bytes_per_row {
            let mut byte = 0u8;
            for p in 0..per_byte {
                let x = column * per_byte + p;
                if x < frame.width {
                    let value = frame.slot(x, y) & mask;
                    byte |= value << (8 - bits as usize * (p + 1));
                }
            }
            data.push(byte);
        }
    }
    data
}

impl Machine for Atari {
    fn kind(&self) -> TargetKind {
        TargetKind::Atari
    }

    fn name(&self) -> &'static str {
        "Atari 8-bit"
    }

    fn palette(&self) -> &'static [HardwareColor] {
        PALETTE.get_or_init(build_palette).as_slice()
    }

    fn screen_modes(&self) -> &'static [ScreenMode] {
        MODES
    }

    fn default_mode(&self) -> u8 {
        8
    }

    fn memory_areas(&self) -> Vec<(u16, u16, MemoryAreaKind)> {
        vec![(0x0600, 0x06FF, MemoryAreaKind::Direct)]
    }

    fn load_address(&self, format: OutputFormat) -> u16 {
        match format {
            OutputFormat::Rom => CARTRIDGE_START,
            _ => LOAD_ADDRESS,
        }
    }

    fn ram_size(&self) -> usize {
        (PMBASE - LOAD_ADDRESS) as usize
    }

    fn output_formats(&self) -> &'static [OutputFormat] {
        FORMATS
    }

    fn default_format(&self) -> OutputFormat {
        OutputFormat::Xex
    }

    fn defines(&self) -> Vec<(&'static str, String)> {
        vec![
            ("ZP_PTR0", "$CB".to_string()),
            ("ZP_PTR1", "$CD".to_string()),
            ("RANDOM_SOURCE", "$D20A".to_string()),
        ]
    }

    fn library(&self) -> &'static [RuntimeModule] {
        ATARI_LIBRARY
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
            SpriteMulticolor | SpriteMonocolor => return None,
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

    /// ATASCII is ASCII for printable characters; the end of line is `$9B`.
    fn encode_char(&self, c: char) -> u8 {
        match c {
            '\n' => 0x9B,
            ' '..='~' => c as u8,
            _ => b'?',
        }
    }

    fn sprite_count(&self) -> u8 {
        4
    }

    fn sprite_size(&self) -> (usize, usize) {
        (8, 128)
    }

    fn voices(&self) -> u8 {
        4
    }

    fn prologue(&self, _load_address: u16) -> Vec<AsmLine> {
        Vec::new()
    }

    fn convert_frame(&self, mode: &ScreenMode, frame: &IndexedFrame) -> Result<Vec<u8>, ErrorCode> {
        match mode.id {
            8 => Ok(pack(frame, 1, 8)),
            15 => Ok(pack(frame, 2, 15)),
            _ => Err(ErrorCode::ScreenModeUnknown),
        }
    }

    fn convert_sprite(&self, frame: &IndexedFrame) -> Result<Vec<u8>, ErrorCode> {
        if frame.width > 8 || frame.height > 128 {
            return Err(ErrorCode::SpriteTooLarge);
        }
        let mut data = vec![frame.height as u8];
        for y in 0..frame.height {
            let mut byte = 0u8;
            for x in 0..frame.width {
                if frame.slot(x, y) != 0 {
                    byte |= 0x80 >> x;
                }
            }
            data.push(byte);
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

    fn frame(width: usize, height: usize, pixels: Vec<u8>) -> IndexedFrame {
        IndexedFrame {
            width,
            height,
            pixels,
            palette: Vec::new(),
        }
    }

    #[test]
    fn test_palette() {
        let palette = Atari.palette();
        assert_eq!(palette.len(), 128);
        assert_eq!(palette[0].index, 0x00);
        assert_eq!(palette[1].index, 0x02);
        assert_eq!(palette[8].index, 0x10);
        let black = palette[0].rgb;
        let white = palette[7].rgb;
        assert!(black[0] < 32 && white[0] > 224);
    }

    #[test]
    fn test_graphics_8_packing() {
        let mut pixels = vec![0u8; 16];
        pixels[0] = 1;
        pixels[15] = 1;
        let data = Atari.convert_frame(&MODES[1], &frame(8, 2, pixels)).unwrap();
        assert_eq!(data, vec![1, 2, 8, 0x80, 0x01]);
    }

    #[test]
    fn test_graphics_15_packing() {
        let pixels = vec![1, 2, 3, 0, 0, 0, 0, 3];
        let data = Atari.convert_frame(&MODES[2], &frame(8, 1, pixels)).unwrap();
        assert_eq!(data, vec![2, 1, 15, 0b01_10_11_00, 0b00_00_00_11]);
    }

    #[test]
    fn test_sprite_layout() {
        let data = Atari.convert_sprite(&frame(8, 2, vec![1, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0])).unwrap();
        assert_eq!(data, vec![2, 0x81, 0x00]);
        assert_eq!(
            Atari.convert_sprite(&frame(16, 1, vec![0; 16])),
            Err(ErrorCode::SpriteTooLarge)
        );
    }

    #[test]
    fn test_players_have_a_single_color() {
        assert!(Atari.routine(MachineOp::SpriteMulticolor).is_none());
        assert!(Atari.routine(MachineOp::SpriteAt).is_some());
        assert_eq!(Atari.encode_char('\n'), 0x9B);
    }
}
