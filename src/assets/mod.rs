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

//! The graphic asset pipeline.
//!
//! `LOAD IMAGE`, `LOAD IMAGES`, `LOAD SEQUENCE`, sprites, tiles and Tiled
//! files all go through here: decode, check geometry, transform, extract
//! the palette, slice frames and let the machine convert each frame to
//! its native layout. The code generator owns the resulting variables;
//! this module only produces bytes and metadata.

pub mod decoder;
pub mod offsets;
pub mod palette;
pub mod tiled;
pub mod tiles;
pub mod transform;

pub use decoder::{FileDecoder, ImageDecoder};
pub use offsets::{Offsetting, Offsettings};
pub use palette::{PaletteEntry, PaletteOptions};
pub use tiled::{Tilemap, TilemapId, TiledLoader, Tileset, TilesetId, XmlTiledLoader};
pub use tiles::{TileDescriptor, TileDescriptors};

use crate::backend::{Machine, ScreenMode};
use crate::config::GammaCorrection;
use crate::error::{CompileError, ErrorCode, Result};
use crate::symbols::variable::ImageInfo;
use crate::symbols::VariableId;
use std::collections::HashMap;
use std::path::Path;

/// Most frames a multi-frame resource may hold.
pub const MAX_FRAMES: usize = 255;

/// An image as RGBA pixels, row by row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<[u8; 4]>,
}

impl DecodedImage {
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        self.pixels[y * self.width + x]
    }
}

/// A frame whose pixels are indices into its palette.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedFrame {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
    pub palette: Vec<PaletteEntry>,
}

impl IndexedFrame {
    /// Palette slot of a pixel.
    pub fn slot(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.width + x]
    }

    /// Hardware color of a pixel.
    pub fn hardware(&self, x: usize, y: usize) -> u8 {
        self.palette
            .get(self.slot(x, y) as usize)
            .map(|e| e.hardware)
            .unwrap_or(0)
    }

    /// Cut a `width` x `height` frame at `(x, y)` out of a larger frame.
    pub fn crop(&self, x: usize, y: usize, width: usize, height: usize) -> IndexedFrame {
        let mut pixels = Vec::with_capacity(width * height);
        for row in y..y + height {
            let start = row * self.width + x;
            pixels.extend_from_slice(&self.pixels[start..start + width]);
        }
        IndexedFrame {
            width,
            height,
            pixels,
            palette: self.palette.clone(),
        }
    }
}

/// Modifiers of an image load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageFlags {
    pub flip_x: bool,
    pub flip_y: bool,
    pub roll_x: bool,
    pub roll_y: bool,
    /// Keep colors in order of appearance instead of popularity.
    pub exact: bool,
    pub transparency: bool,
}

/// How to slice an image into frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Single,
    /// `LOAD IMAGES`: a grid of frames read row by row.
    Frames { width: usize, height: usize },
    /// `LOAD SEQUENCE`: each row of the grid is one sequence.
    Sequence { width: usize, height: usize },
}

/// Everything `load_image` needs besides the decoded pixels.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub mode: u8,
    pub flags: ImageFlags,
    pub framing: Framing,
    /// Hardware color treated as transparent.
    pub transparent: Option<u8>,
    /// Hardware color forced into palette slot 0.
    pub background: Option<u8>,
    pub gamma: GammaCorrection,
}

/// Converted bytes and geometry of an image resource.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedImage {
    pub info: ImageInfo,
    pub buffer: Vec<u8>,
    /// Bytes of one full row of frames.
    pub row_size: usize,
}

/// Bytes before the first frame of a multi-frame buffer.
pub const FRAMES_HEADER: usize = 3;

fn check_geometry(image: &DecodedImage, mode: &ScreenMode, framing: Framing) -> Result<(usize, usize)> {
    if image.width % 8 != 0 {
        return Err(CompileError::unlocated(
            ErrorCode::ImageWidthNotMultipleOf8,
            format!("image width {} is not a multiple of 8", image.width),
        ));
    }
    if image.height % 8 != 0 {
        return Err(CompileError::unlocated(
            ErrorCode::ImageHeightNotMultipleOf8,
            format!("image height {} is not a multiple of 8", image.height),
        ));
    }
    let (frame_width, frame_height) = match framing {
        Framing::Single => (image.width, image.height),
        Framing::Frames { width, height } | Framing::Sequence { width, height } => (width, height),
    };
    if frame_width == 0 || frame_width % 8 != 0 {
        return Err(CompileError::unlocated(
            ErrorCode::FrameWidthNotMultipleOf8,
            format!("frame width {} is not a multiple of 8", frame_width),
        ));
    }
    if frame_height == 0 || frame_height % 8 != 0 {
        return Err(CompileError::unlocated(
            ErrorCode::FrameHeightNotMultipleOf8,
            format!("frame height {} is not a multiple of 8", frame_height),
        ));
    }
    if image.width % frame_width != 0 {
        return Err(CompileError::unlocated(
            ErrorCode::FrameWidthMismatch,
            format!("image width {} is not a multiple of the frame width {}", image.width, frame_width),
        ));
    }
    if image.height % frame_height != 0 {
        return Err(CompileError::unlocated(
            ErrorCode::FrameHeightMismatch,
            format!("image height {} is not a multiple of the frame height {}", image.height, frame_height),
        ));
    }
    if mode.bitmap && (frame_width > mode.width as usize || frame_height > mode.height as usize) {
        return Err(CompileError::unlocated(
            ErrorCode::ImageTooLarge,
            format!(
                "frames of {}x{} do not fit the {}x{} of {}",
                frame_width, frame_height, mode.width, mode.height, mode.name
            ),
        ));
    }
    Ok((frame_width, frame_height))
}

fn transform(image: &mut DecodedImage, flags: ImageFlags) {
    if flags.flip_x {
        transform::flip_x(image);
    }
    if flags.flip_y {
        transform::flip_y(image);
    }
    if flags.roll_x {
        transform::roll_x(image, image.width / 2);
    }
    if flags.roll_y {
        transform::roll_y(image, image.height / 2);
    }
}

/// Palette-index an image for `mode` of `machine`.
pub fn index_image(
    image: &DecodedImage,
    machine: &dyn Machine,
    budget: usize,
    request: &ImageRequest,
) -> Result<IndexedFrame> {
    let options = PaletteOptions {
        gamma: request.gamma,
        sort_by_popularity: !request.flags.exact,
        background: request.background.or(request.transparent),
        foreground: None,
        transparency: request.flags.transparency || request.transparent.is_some(),
    };
    let (palette, pixels) = palette::extract(&image.pixels, machine.palette(), budget, &options)
        .map_err(|code| {
            CompileError::unlocated(
                code,
                format!("the image needs more than the {} colors available", budget),
            )
        })?;
    Ok(IndexedFrame {
        width: image.width,
        height: image.height,
        pixels,
        palette,
    })
}

/// Run an image through geometry checks, transforms, palette extraction
/// and per-frame conversion.
pub fn prepare_image(
    mut image: DecodedImage,
    machine: &dyn Machine,
    request: &ImageRequest,
) -> Result<PreparedImage> {
    let mode = machine.screen_mode(request.mode).ok_or_else(|| {
        CompileError::unlocated(
            ErrorCode::ScreenModeUnknown,
            format!("{} has no screen mode {}", machine.name(), request.mode),
        )
    })?;
    let (frame_width, frame_height) = check_geometry(&image, mode, request.framing)?;
    let frames_per_row = image.width / frame_width;
    let rows = image.height / frame_height;
    let frame_count = frames_per_row * rows;
    if frame_count > MAX_FRAMES {
        return Err(CompileError::unlocated(
            ErrorCode::TooManyFrames,
            format!("{} frames exceed the limit of {}", frame_count, MAX_FRAMES),
        ));
    }

    transform(&mut image, request.flags);
    let indexed = index_image(&image, machine, mode.colors, request)?;

    let mut frames = Vec::with_capacity(frame_count);
    for row in 0..rows {
        for column in 0..frames_per_row {
            let frame = indexed.crop(
                column * frame_width,
                row * frame_height,
                frame_width,
                frame_height,
            );
            let bytes = machine.convert_frame(mode, &frame).map_err(|code| {
                CompileError::unlocated(code, format!("frame {} cannot be converted", frames.len()))
            })?;
            frames.push(bytes);
        }
    }
    let frame_size = frames.first().map(Vec::len).unwrap_or(0);

    let mut buffer = Vec::new();
    if request.framing != Framing::Single {
        buffer.extend_from_slice(&[frame_count as u8, frames_per_row as u8, rows as u8]);
    }
    for frame in &frames {
        buffer.extend_from_slice(frame);
    }

    Ok(PreparedImage {
        info: ImageInfo {
            width: image.width,
            height: image.height,
            mode: request.mode,
            colors: indexed.palette.len(),
            palette: indexed.palette,
            frame_width,
            frame_height,
            frame_count,
            frames_per_row,
            rows,
            frame_size,
            ..Default::default()
        },
        buffer,
        row_size: frame_size * frames_per_row,
    })
}

/// Convert an image to the machine's sprite layout.
pub fn prepare_sprite(mut image: DecodedImage, machine: &dyn Machine, request: &ImageRequest) -> Result<PreparedImage> {
    let (max_width, max_height) = machine.sprite_size();
    if machine.sprite_count() == 0 {
        return Err(CompileError::unlocated(
            ErrorCode::SpriteIdOutOfRange,
            format!("{} has no hardware sprites", machine.name()),
        ));
    }
    if image.width > max_width || image.height > max_height {
        return Err(CompileError::unlocated(
            ErrorCode::SpriteTooLarge,
            format!(
                "a sprite of {}x{} exceeds the {}x{} of {}",
                image.width,
                image.height,
                max_width,
                max_height,
                machine.name()
            ),
        ));
    }
    transform(&mut image, request.flags);
    let indexed = index_image(&image, machine, 4, request)?;
    let buffer = machine.convert_sprite(&indexed).map_err(|code| {
        CompileError::unlocated(code, "the sprite cannot be converted")
    })?;
    Ok(PreparedImage {
        info: ImageInfo {
            width: image.width,
            height: image.height,
            colors: indexed.palette.len(),
            palette: indexed.palette,
            frame_width: image.width,
            frame_height: image.height,
            frame_count: 1,
            frames_per_row: 1,
            rows: 1,
            frame_size: buffer.len(),
            ..Default::default()
        },
        row_size: buffer.len(),
        buffer,
    })
}

/// Read a file as raw bytes for `LOAD ... AS BUFFER` and array initializers.
pub fn load_buffer(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(CompileError::unlocated(
            ErrorCode::AssetFileNotFound,
            format!("file {} not found", path.display()),
        ));
    }
    std::fs::read(path).map_err(|e| {
        CompileError::unlocated(
            ErrorCode::CannotReadFile,
            format!("cannot read {}: {}", path.display(), e),
        )
    })
}

/// Loaded resources and the collaborators used to read them.
pub struct AssetPipeline {
    pub decoder: Box<dyn ImageDecoder>,
    pub tiled: Box<dyn TiledLoader>,
    loaded: HashMap<String, VariableId>,
    resource_ids: HashMap<VariableId, usize>,
    pub offsets: Offsettings,
    pub tiles: TileDescriptors,
    tilesets: Vec<Tileset>,
    tilemaps: Vec<Tilemap>,
}

impl std::fmt::Debug for AssetPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetPipeline")
            .field("loaded", &self.loaded)
            .field("offsets", &self.offsets)
            .field("tilesets", &self.tilesets.len())
            .field("tilemaps", &self.tilemaps.len())
            .finish()
    }
}

impl Default for AssetPipeline {
    fn default() -> Self {
        Self::new(Box::new(FileDecoder), Box::new(XmlTiledLoader))
    }
}

impl AssetPipeline {
    pub fn new(decoder: Box<dyn ImageDecoder>, tiled: Box<dyn TiledLoader>) -> Self {
        Self {
            decoder,
            tiled,
            loaded: HashMap::new(),
            resource_ids: HashMap::new(),
            offsets: Offsettings::new(),
            tiles: TileDescriptors::new(128, 255),
            tilesets: Vec::new(),
            tilemaps: Vec::new(),
        }
    }

    /// Variable holding the resource loaded under `key` (alias or path).
    pub fn cached(&self, key: &str) -> Option<VariableId> {
        self.loaded.get(key).copied()
    }

    pub fn remember(&mut self, key: &str, variable: VariableId) {
        self.loaded.insert(key.to_string(), variable);
    }

    /// Record the unique resource number of `variable`.
    pub fn number(&mut self, variable: VariableId, id: usize) {
        self.resource_ids.insert(variable, id);
    }

    pub fn resource_id(&self, variable: VariableId) -> Option<usize> {
        self.resource_ids.get(&variable).copied()
    }

    pub fn add_tileset(&mut self, tileset: Tileset) -> TilesetId {
        self.tilesets.push(tileset);
        TilesetId(self.tilesets.len() - 1)
    }

    pub fn tileset(&self, id: TilesetId) -> Option<&Tileset> {
        self.tilesets.get(id.0)
    }

    pub fn add_tilemap(&mut self, tilemap: Tilemap) -> TilemapId {
        self.tilemaps.push(tilemap);
        TilemapId(self.tilemaps.len() - 1)
    }

    pub fn tilemap(&self, id: TilemapId) -> Option<&Tilemap> {
        self.tilemaps.get(id.0)
    }
}
