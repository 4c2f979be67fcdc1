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

//! Palette extraction and nearest-color matching.
//!
//! Every pixel is matched to the closest hardware color (Euclidean
//! distance in RGB after gamma correction). The distinct hardware colors
//! of an image form its palette; pixels are stored as indices into it.

use crate::backend::HardwareColor;
use crate::config::GammaCorrection;
use crate::error::ErrorCode;

/// One color of an image palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    /// Hardware color value.
    pub hardware: u8,
    pub rgb: [u8; 3],
    /// Pixels using this color.
    pub count: usize,
}

/// Options of [`extract`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PaletteOptions {
    pub gamma: GammaCorrection,
    /// Order the palette by decreasing use instead of first appearance.
    pub sort_by_popularity: bool,
    /// Hardware color forced into slot 0.
    pub background: Option<u8>,
    /// Hardware color forced into slot 1.
    pub foreground: Option<u8>,
    /// Pixels with an alpha below 128 take the background slot.
    pub transparency: bool,
}

/// Apply the gamma correction of `DEFINE PALETTE GAMMA`.
pub fn correct(rgb: [u8; 3], gamma: GammaCorrection) -> [u8; 3] {
    let apply = |c: u8, exponent: f64| -> u8 {
        let normalized = f64::from(c) / 255.0;
        (normalized.powf(exponent) * 255.0).round().clamp(0.0, 255.0) as u8
    };
    match gamma {
        GammaCorrection::None => rgb,
        GammaCorrection::Devulder => rgb.map(|c| apply(c, 1.0 / 1.4)),
        GammaCorrection::Florenzi => rgb.map(|c| apply(c, 1.0 / 2.2)),
    }
}

fn distance(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = i32::from(x) - i32::from(y);
            (d * d) as u32
        })
        .sum()
}

/// The hardware color closest to `rgb`.
///
/// An exact match wins at once; among equally distant colors the one
/// listed first wins.
pub fn nearest(palette: &[HardwareColor], rgb: [u8; 3]) -> Option<&HardwareColor> {
    let mut best: Option<(&HardwareColor, u32)> = None;
    for color in palette {
        let d = distance(color.rgb, rgb);
        if d == 0 {
            return Some(color);
        }
        if best.map(|(_, b)| d < b).unwrap_or(true) {
            best = Some((color, d));
        }
    }
    best.map(|(color, _)| color)
}

/// Slot of hardware color `hardware` in an image palette.
pub fn reverse_index(palette: &[PaletteEntry], hardware: u8) -> Option<usize> {
    palette.iter().position(|e| e.hardware == hardware)
}

/// Build the palette of an RGBA image and index its pixels.
///
/// Fails with E059 when more than `budget` distinct hardware colors are needed.
pub fn extract(
    pixels: &[[u8; 4]],
    hardware: &[HardwareColor],
    budget: usize,
    options: &PaletteOptions,
) -> Result<(Vec<PaletteEntry>, Vec<u8>), ErrorCode> {
    let mut palette: Vec<PaletteEntry> = Vec::new();
    let mut matched: Vec<Option<u8>> = Vec::with_capacity(pixels.len());

    for pixel in pixels {
        if options.transparency && pixel[3] < 128 {
            matched.push(None);
            continue;
        }
        let rgb = correct([pixel[0], pixel[1], pixel[2]], options.gamma);
        let color = nearest(hardware, rgb).ok_or(ErrorCode::TooManyColors)?;
        match palette.iter_mut().find(|e| e.hardware == color.index) {
            Some(entry) => entry.count += 1,
            None => palette.push(PaletteEntry {
                hardware: color.index,
                rgb: color.rgb,
                count: 1,
            }),
        }
        matched.push(Some(color.index));
    }

    if options.sort_by_popularity {
        palette.sort_by(|a, b| b.count.cmp(&a.count));
    }

    let transparent = matched.iter().filter(|m| m.is_none()).count();
    let background = options
        .background
        .or_else(|| (transparent > 0).then(|| palette.first().map(|e| e.hardware)).flatten());
    for (slot, forced) in [(0usize, background), (1usize, options.foreground)] {
        let Some(forced) = forced else { continue };
        let entry = match palette.iter().position(|e| e.hardware == forced) {
            Some(at) => palette.remove(at),
            None => PaletteEntry {
                hardware: forced,
                rgb: hardware
                    .iter()
                    .find(|c| c.index == forced)
                    .map(|c| c.rgb)
                    .unwrap_or([0, 0, 0]),
                count: 0,
            },
        };
        palette.insert(slot.min(palette.len()), entry);
    }

    if palette.len() > budget {
        return Err(ErrorCode::TooManyColors);
    }

    let indices = matched
        .iter()
        .map(|m| match m {
            Some(hw) => reverse_index(&palette, *hw).unwrap_or(0) as u8,
            None => 0,
        })
        .collect();
    Ok((palette, indices))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLORS: &[HardwareColor] = &[
        HardwareColor { index: 0, rgb: [0, 0, 0], name: "black" },
        HardwareColor { index: 1, rgb: [255, 255, 255], name: "white" },
        HardwareColor { index: 2, rgb: [136, 0, 0], name: "red" },
        HardwareColor { index: 3, rgb: [136, 0, 0], name: "red again" },
    ];

    fn px(rgb: [u8; 3]) -> [u8; 4] {
        [rgb[0], rgb[1], rgb[2], 255]
    }

    #[test]
    fn test_nearest_prefers_exact_then_first() {
        assert_eq!(nearest(COLORS, [136, 0, 0]).map(|c| c.index), Some(2));
        assert_eq!(nearest(COLORS, [10, 10, 10]).map(|c| c.index), Some(0));
        assert_eq!(nearest(COLORS, [250, 240, 250]).map(|c| c.index), Some(1));
    }

    #[test]
    fn test_extract_in_order_of_appearance() {
        let pixels = [px([255, 255, 255]), px([0, 0, 0]), px([250, 250, 250])];
        let (palette, indices) = extract(&pixels, COLORS, 4, &PaletteOptions::default()).unwrap();
        assert_eq!(palette.iter().map(|e| e.hardware).collect::<Vec<_>>(), vec![1, 0]);
        assert_eq!(indices, vec![0, 1, 0]);
        assert_eq!(palette[0].count, 2);
    }

    #[test]
    fn test_popularity_and_background() {
        let pixels = [px([0, 0, 0]), px([136, 0, 0]), px([136, 0, 0])];
        let options = PaletteOptions {
            sort_by_popularity: true,
            ..Default::default()
        };
        let (palette, _) = extract(&pixels, COLORS, 4, &options).unwrap();
        assert_eq!(palette[0].hardware, 2);

        let options = PaletteOptions {
            background: Some(1),
            ..Default::default()
        };
        let (palette, indices) = extract(&pixels, COLORS, 4, &options).unwrap();
        assert_eq!(palette[0].hardware, 1);
        assert_eq!(palette[0].count, 0);
        assert_eq!(indices, vec![1, 2, 2]);
    }

    #[test]
    fn test_budget_exceeded() {
        let pixels = [px([0, 0, 0]), px([255, 255, 255]), px([136, 0, 0])];
        assert_eq!(
            extract(&pixels, COLORS, 2, &PaletteOptions::default()),
            Err(ErrorCode::TooManyColors)
        );
    }

    #[test]
    fn test_transparent_pixels_take_slot_zero() {
        let pixels = [[9, 9, 9, 0], px([255, 255, 255])];
        let options = PaletteOptions {
            transparency: true,
            background: Some(0),
            ..Default::default()
        };
        let (palette, indices) = extract(&pixels, COLORS, 2, &options).unwrap();
        assert_eq!(palette[0].hardware, 0);
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_gamma() {
        assert_eq!(correct([10, 20, 30], GammaCorrection::None), [10, 20, 30]);
        let bright = correct([64, 64, 64], GammaCorrection::Florenzi);
        assert!(bright[0] > 64);
        assert_eq!(correct([255, 0, 255], GammaCorrection::Devulder), [255, 0, 255]);
    }
}
