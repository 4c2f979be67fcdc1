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

//! Image decoding.

use super::DecodedImage;
use crate::error::{CompileError, ErrorCode, Result};
use std::path::Path;

/// Turns an image file into RGBA pixels.
pub trait ImageDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage>;
}

/// Decoder over the `image` crate (PNG, JPEG, GIF, BMP, TGA, PNM, HDR).
#[derive(Debug, Default, Clone, Copy)]
pub struct FileDecoder;

impl ImageDecoder for FileDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage> {
        let display = path.display();
        if !path.exists() {
            return Err(CompileError::unlocated(
                ErrorCode::AssetFileNotFound,
                format!("image file {} not found", display),
            ));
        }
        let reader = image::io::Reader::open(path)
            .map_err(|e| {
                CompileError::unlocated(
                    ErrorCode::CannotReadFile,
                    format!("cannot read {}: {}", display, e),
                )
            })?
            .with_guessed_format()
            .map_err(|e| {
                CompileError::unlocated(
                    ErrorCode::CannotReadFile,
                    format!("cannot read {}: {}", display, e),
                )
            })?;
        if reader.format().is_none() {
            return Err(CompileError::unlocated(
                ErrorCode::UnknownImageFormat,
                format!("{} is not in a known image format", display),
            ));
        }
        let decoded = reader.decode().map_err(|e| match e {
            image::ImageError::Unsupported(_) => CompileError::unlocated(
                ErrorCode::UnknownImageFormat,
                format!("{} is not in a known image format", display),
            ),
            other => CompileError::unlocated(
                ErrorCode::NotAnImage,
                format!("{} cannot be decoded: {}", display, other),
            ),
        })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::debug!("decoded {} ({}x{})", display, width, height);
        Ok(DecodedImage {
            width: width as usize,
            height: height as usize,
            pixels: rgba.pixels().map(|p| p.0).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_decode_png() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dot.png");
        let mut img = image::RgbaImage::new(8, 4);
        img.put_pixel(1, 2, image::Rgba([255, 255, 255, 255]));
        img.save(&path).unwrap();

        let decoded = FileDecoder.decode(&path).unwrap();
        assert_eq!((decoded.width, decoded.height), (8, 4));
        assert_eq!(decoded.pixel(1, 2), [255, 255, 255, 255]);
        assert_eq!(decoded.pixel(0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_missing_file() {
        let err = FileDecoder.decode(Path::new("/nonexistent/x.png")).unwrap_err();
        assert_eq!(err.code, ErrorCode::AssetFileNotFound);
    }

    #[test]
    fn test_unknown_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "just some text").unwrap();
        let err = FileDecoder.decode(&path).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownImageFormat);
    }
}
