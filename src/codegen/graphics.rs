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

//! Bitmaps, images, sprites and tiles.
//!
//! Resources are read at compile time through the asset pipeline and
//! become read-only variables whose contents are the converted bytes.
//! Every resource gets a unique number; `LOAD ... AS "alias"` makes the
//! alias a constant holding that number. Loading the same file twice
//! returns the variable of the first load.

use super::variables::VariableEmitter;
use crate::assets::offsets::table_label;
use crate::assets::{
    index_image, prepare_image, prepare_sprite, DecodedImage, Framing, ImageFlags, ImageRequest,
    Tileset, FRAMES_HEADER,
};
use crate::backend::{MachineOp, Value};
use crate::environment::Environment;
use crate::error::{CompileError, ErrorCode, Result, WarningCode};
use crate::symbols::{ConstantValue, ImageInfo, Variable, VariableId, VariableScope};
use crate::types::VariableType;
use std::collections::HashMap;

/// Arguments of `LOAD IMAGE`, `LOAD IMAGES`, `LOAD SEQUENCE`, `LOAD TILES`
/// and sprite loads.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageLoad {
    pub path: String,
    pub alias: Option<String>,
    /// Screen mode to convert for; the current one when absent.
    pub mode: Option<u8>,
    pub flags: ImageFlags,
    pub framing: Framing,
    pub transparent: Option<u8>,
    pub background: Option<u8>,
    /// Expansion window the resource is paged into, when banked.
    pub bank: Option<usize>,
}

impl ImageLoad {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            alias: None,
            mode: None,
            flags: ImageFlags::default(),
            framing: Framing::Single,
            transparent: None,
            background: None,
            bank: None,
        }
    }

    /// Cache key: the same file converted the same way.
    fn key(&self, mode: u8) -> String {
        format!("{}|{:?}|{:?}|{}", self.path, self.framing, self.flags, mode)
    }
}

/// Sprite attributes switched by a single statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteMode {
    Multicolor,
    Monocolor,
    Expand,
    Compress,
}

/// Extension trait for the graphic statements.
pub trait GraphicsEmitter {
    /// `BITMAP ENABLE`, optionally with a mode number.
    fn bitmap_enable(&mut self, mode: Option<u8>) -> Result<()>;

    /// `PLOT x, y [, color]`.
    fn plot(&mut self, x: VariableId, y: VariableId, color: Option<VariableId>) -> Result<()>;

    fn color_border(&mut self, color: VariableId) -> Result<()>;

    fn color_background(&mut self, color: VariableId) -> Result<()>;

    fn wait_vbl(&mut self) -> Result<()>;

    /// `LOAD IMAGE`, `LOAD IMAGES` or `LOAD SEQUENCE`, after the framing.
    fn load_image(&mut self, load: &ImageLoad) -> Result<VariableId>;

    /// `LOAD "file" AS BUFFER`.
    fn load_raw(&mut self, path: &str, alias: Option<&str>) -> Result<VariableId>;

    /// `PUT IMAGE image [FRAME f] [SEQUENCE s] AT x, y`.
    fn put_image(
        &mut self,
        image: VariableId,
        x: VariableId,
        y: VariableId,
        frame: Option<VariableId>,
        sequence: Option<VariableId>,
    ) -> Result<()>;

    /// `LOAD SPRITE(...)`: an image converted to the sprite layout.
    fn load_sprite(&mut self, load: &ImageLoad) -> Result<VariableId>;

    /// `SPRITE n ENABLE` / `SPRITE n DISABLE`.
    fn sprite_enable(&mut self, sprite: VariableId, enable: bool) -> Result<()>;

    /// `SPRITE n AT x, y`.
    fn sprite_at(&mut self, sprite: VariableId, x: VariableId, y: VariableId) -> Result<()>;

    /// `SPRITE n COLOR c`.
    fn sprite_color(&mut self, sprite: VariableId, color: VariableId) -> Result<()>;

    fn sprite_mode(&mut self, sprite: VariableId, mode: SpriteMode) -> Result<()>;

    /// `SPRITE n IMAGE data`.
    fn sprite_image(&mut self, sprite: VariableId, data: VariableId) -> Result<()>;

    /// `LOAD TILES`: every 8x8 cell of an image becomes a character tile.
    fn load_tiles(&mut self, load: &ImageLoad) -> Result<VariableId>;

    /// `LOAD TILESET "file.tsx"`.
    fn load_tileset(&mut self, path: &str, alias: Option<&str>) -> Result<VariableId>;

    /// `LOAD TILEMAP "file.tmx" [LAYER name]`.
    fn load_tilemap(&mut self, path: &str, layer: Option<&str>, alias: Option<&str>) -> Result<VariableId>;

    /// `PUT TILEMAP map AT x, y`.
    fn put_tilemap(&mut self, map: VariableId, x: VariableId, y: VariableId) -> Result<()>;

    /// `TILE CLASS(tileset, "class")`.
    fn tile_class(&mut self, tileset: VariableId, class: &str) -> Result<VariableId>;

    /// `TILE PROBABILITY(tileset, id)`.
    fn tile_probability(&mut self, tileset: VariableId, id: VariableId) -> Result<VariableId>;

    /// `TILE ID(tileset, id)`.
    fn tile_id(&mut self, tileset: VariableId, id: VariableId) -> Result<VariableId>;
}

/// What a new resource variable carries.
struct Resource {
    key: String,
    alias: Option<String>,
    var_type: VariableType,
    buffer: Vec<u8>,
    image: Option<ImageInfo>,
    bank: Option<usize>,
}

impl Environment {
    fn current_mode(&self, requested: Option<u8>) -> u8 {
        requested
            .or(self.screen_mode)
            .unwrap_or_else(|| self.target.machine.default_mode())
    }

    fn image_request(&self, load: &ImageLoad, mode: u8) -> ImageRequest {
        ImageRequest {
            mode,
            flags: load.flags,
            framing: load.framing,
            transparent: load.transparent,
            background: load.background,
            gamma: self.options.gamma,
        }
    }

    fn decode(&self, path: &str) -> Result<DecodedImage> {
        let full = self.asset_path(path)?;
        self.located(self.assets.decoder.decode(&full))
    }

    /// A previously loaded resource; a new alias still becomes a constant.
    fn reuse(&mut self, key: &str, alias: Option<&str>) -> Result<Option<VariableId>> {
        let Some(id) = self.assets.cached(key) else {
            return Ok(None);
        };
        log::debug!("{} already loaded", key);
        if let (Some(alias), Some(number)) = (alias, self.assets.resource_id(id)) {
            self.define_alias(alias, number)?;
        }
        Ok(Some(id))
    }

    fn define_alias(&mut self, alias: &str, number: usize) -> Result<()> {
        let defined = self
            .symbols
            .define_constant(alias, ConstantValue::Integer(number as i64))
            .map(|_| ());
        self.located(defined)
    }

    fn register_resource(&mut self, resource: Resource) -> Result<VariableId> {
        let number = self.unique_resource_id();
        let real_name = format!("_res{}", number);
        let mut variable = Variable::new(
            "",
            real_name.clone(),
            resource.var_type,
            self.precision(),
            VariableScope::Global,
        );
        variable.purpose = Some(resource.key.clone());
        variable.uncompressed_size = resource.buffer.len();
        variable.readonly = true;
        variable.assigned = true;
        variable.image = resource.image;
        if let Some(window) = resource.bank {
            let slot = match self.memory.expansion.as_mut() {
                Some(expansion) => expansion.allocate(&real_name, &resource.buffer, window),
                None => Err(CompileError::unlocated(
                    ErrorCode::BankNotFound,
                    format!("{} has no expansion memory", self.target.machine.name()),
                )),
            };
            variable.expansion = Some(self.located(slot)?);
        }
        variable.value_buffer = Some(resource.buffer);
        let id = self.symbols.add_variable(variable);
        self.assets.remember(&resource.key, id);
        self.assets.number(id, number);
        if let Some(alias) = &resource.alias {
            self.define_alias(alias, number)?;
        }
        log::info!("loaded {} as {} ({})", resource.key, real_name, resource.var_type);
        Ok(id)
    }

    fn image_info(&self, id: VariableId) -> Result<ImageInfo> {
        let variable = self.symbols.variable(id);
        variable.image.clone().ok_or_else(|| {
            self.error(
                ErrorCode::NotAnImage,
                format!("{} is not an image", variable.name),
            )
        })
    }

    /// Add the offset of entry `index` of the table of `stride` to `pointer`.
    fn add_table_offset(&mut self, pointer: &str, index: VariableId, stride: usize) {
        let offset = self.temporary(VariableType::Word, "frame offset");
        let name = self.real_name(offset);
        self.load(index, &name, 2);
        let cpu = &self.target.cpu;
        cpu.shift_left(&mut self.out, &name, 2);
        cpu.load_indexed(&mut self.out, &table_label(stride), &Value::mem(name.clone()), &name, 2);
        cpu.add(&mut self.out, &Value::mem(pointer), &Value::mem(name), pointer, 2);
    }

    fn check_index(&self, index: VariableId, count: usize, what: &str) -> Result<Option<usize>> {
        match self.constant_of(index) {
            Some(value) if value < 0 || value as usize >= count => Err(self.error(
                ErrorCode::ValueOutOfRange,
                format!("{} {} is outside 0..{}", what, value, count.saturating_sub(1)),
            )),
            Some(value) => Ok(Some(value as usize)),
            None => Ok(None),
        }
    }

    /// Address of the frame of `image` to draw.
    fn frame_pointer(
        &mut self,
        image: VariableId,
        frame: Option<VariableId>,
        sequence: Option<VariableId>,
    ) -> Result<VariableId> {
        let info = self.image_info(image)?;
        let ty = self.type_of(image);
        self.touch(image);
        let pointer = self.temporary(VariableType::Address, "image pointer");
        let name = self.real_name(pointer);
        let label = self.real_name(image);
        self.target.cpu.address_of(&mut self.out, &label, &name);
        if ty == VariableType::Image {
            return Ok(pointer);
        }
        let mut offset = FRAMES_HEADER;
        let frames = if ty == VariableType::Sequence {
            info.frames_per_row
        } else {
            info.frame_count
        };
        if let (VariableType::Sequence, Some(sequence)) = (ty, sequence) {
            let row_size = info.frame_size * info.frames_per_row;
            match self.check_index(sequence, info.rows, "sequence")? {
                Some(s) => offset += s * row_size,
                None => self.add_table_offset(&name, sequence, row_size),
            }
        }
        if let Some(frame) = frame {
            match self.check_index(frame, frames, "frame")? {
                Some(f) => offset += f * info.frame_size,
                None => self.add_table_offset(&name, frame, info.frame_size),
            }
        }
        self.target.cpu.add(
            &mut self.out,
            &Value::mem(name.clone()),
            &Value::imm(offset as i64),
            &name,
            2,
        );
        Ok(pointer)
    }

    fn check_sprite(&self, sprite: VariableId) -> Result<()> {
        self.expect_numeric(sprite)?;
        let count = self.target.machine.sprite_count();
        if count == 0 {
            return Err(self.error(
                ErrorCode::SpriteIdOutOfRange,
                format!("{} has no hardware sprites", self.target.machine.name()),
            ));
        }
        match self.constant_of(sprite) {
            Some(n) if n < 0 || n >= i64::from(count) => Err(self.error(
                ErrorCode::SpriteIdOutOfRange,
                format!("sprite {} is outside 0..{}", n, count - 1),
            )),
            _ => Ok(()),
        }
    }

    /// One character tile per 8x8 cell of a two color frame.
    fn cell_tiles(&mut self, image: &DecodedImage, request: &ImageRequest) -> Result<Vec<u8>> {
        if image.width % 8 != 0 || image.height % 8 != 0 {
            return Err(self.error(
                ErrorCode::TileSizeInvalid,
                format!("{}x{} is not made of 8x8 tiles", image.width, image.height),
            ));
        }
        let indexed = self.located(index_image(image, self.target.machine.as_ref(), 2, request))?;
        let mut codes = Vec::new();
        for row in 0..image.height / 8 {
            for column in 0..image.width / 8 {
                let mut data = [0u8; 8];
                for (y, byte) in data.iter_mut().enumerate() {
                    for x in 0..8 {
                        if indexed.slot(column * 8 + x, row * 8 + y) != 0 {
                            *byte |= 0x80 >> x;
                        }
                    }
                }
                let code = self.assets.tiles.allocate(&data).map_err(|code| {
                    self.error(code, "no character tile is left")
                })?;
                codes.push(code);
            }
        }
        Ok(codes)
    }

    /// Character code of every tile of `tileset`, by local id.
    fn tileset_codes(&mut self, tileset: &Tileset) -> Result<Vec<u8>> {
        let Some(path) = &tileset.image else {
            return Ok((0..tileset.tile_count).map(|id| id as u8).collect());
        };
        if tileset.tile_width != 8 || tileset.tile_height != 8 {
            return Err(self.error(
                ErrorCode::TileSizeInvalid,
                format!(
                    "tiles of {} are {}x{}, only 8x8 tiles become characters",
                    tileset.name, tileset.tile_width, tileset.tile_height
                ),
            ));
        }
        let image = self.located(self.assets.decoder.decode(path))?;
        let request = ImageRequest {
            mode: self.current_mode(None),
            flags: ImageFlags::default(),
            framing: Framing::Single,
            transparent: None,
            background: None,
            gamma: self.options.gamma,
        };
        let codes = self.cell_tiles(&image, &request)?;
        Ok(codes.into_iter().take(tileset.tile_count as usize).collect())
    }

    fn tileset_of(&self, id: VariableId) -> Result<Tileset> {
        let variable = self.symbols.variable(id);
        variable
            .image
            .as_ref()
            .and_then(|info| info.tileset)
            .and_then(|ts| self.assets.tileset(ts))
            .cloned()
            .ok_or_else(|| {
                self.error(
                    ErrorCode::TilesetMissing,
                    format!("{} is not a tileset", variable.name),
                )
            })
    }
}

impl GraphicsEmitter for Environment {
    fn bitmap_enable(&mut self, mode: Option<u8>) -> Result<()> {
        let default = self.target.machine.default_mode();
        let mut selected = mode.unwrap_or(default);
        let known = self
            .target
            .machine
            .screen_mode(selected)
            .map(|m| m.bitmap)
            .unwrap_or(false);
        if !known {
            self.warn(
                WarningCode::ScreenModeFallback,
                format!("{} has no bitmap mode {}, using {}", self.target.machine.name(), selected, default),
            );
            selected = default;
        }
        self.screen_mode = Some(selected);
        let mode = self.typed_constant(i64::from(selected), VariableType::Byte);
        self.machine_call(MachineOp::BitmapEnable, &[mode]).map(|_| ())
    }

    fn plot(&mut self, x: VariableId, y: VariableId, color: Option<VariableId>) -> Result<()> {
        self.expect_numeric(x)?;
        self.expect_numeric(y)?;
        let color = match color {
            Some(color) => {
                self.expect_numeric(color)?;
                color
            }
            None => self.typed_constant(1, VariableType::Color),
        };
        self.machine_call(MachineOp::Plot, &[x, y, color]).map(|_| ())
    }

    fn color_border(&mut self, color: VariableId) -> Result<()> {
        self.expect_numeric(color)?;
        self.machine_call(MachineOp::ColorBorder, &[color]).map(|_| ())
    }

    fn color_background(&mut self, color: VariableId) -> Result<()> {
        self.expect_numeric(color)?;
        self.machine_call(MachineOp::ColorBackground, &[color]).map(|_| ())
    }

    fn wait_vbl(&mut self) -> Result<()> {
        self.machine_call(MachineOp::WaitVbl, &[]).map(|_| ())
    }

    fn load_image(&mut self, load: &ImageLoad) -> Result<VariableId> {
        let mode = self.current_mode(load.mode);
        let key = load.key(mode);
        if let Some(id) = self.reuse(&key, load.alias.as_deref())? {
            return Ok(id);
        }
        let image = self.decode(&load.path)?;
        let request = self.image_request(load, mode);
        let prepared = self.located(prepare_image(image, self.target.machine.as_ref(), &request))?;
        let var_type = match load.framing {
            Framing::Single => VariableType::Image,
            Framing::Frames { .. } => VariableType::Images,
            Framing::Sequence { .. } => VariableType::Sequence,
        };
        let info = prepared.info.clone();
        let id = self.register_resource(Resource {
            key,
            alias: load.alias.clone(),
            var_type,
            buffer: prepared.buffer,
            image: Some(prepared.info),
            bank: load.bank,
        })?;
        let offsets = &mut self.assets.offsets;
        let registered = match load.framing {
            Framing::Single => Ok(()),
            Framing::Frames { .. } => offsets.register(info.frame_size, info.frame_count, id, false),
            Framing::Sequence { .. } => offsets
                .register(info.frame_size, info.frames_per_row, id, false)
                .and_then(|_| offsets.register(prepared.row_size, info.rows, id, true)),
        };
        registered.map_err(|code| {
            self.error(
                code,
                format!("{} cannot be addressed with 16 bit frame offsets", load.path),
            )
        })?;
        Ok(id)
    }

    fn load_raw(&mut self, path: &str, alias: Option<&str>) -> Result<VariableId> {
        let key = format!("{}|buffer", path);
        if let Some(id) = self.reuse(&key, alias)? {
            return Ok(id);
        }
        let full = self.asset_path(path)?;
        let buffer = self.located(crate::assets::load_buffer(&full))?;
        self.register_resource(Resource {
            key,
            alias: alias.map(str::to_string),
            var_type: VariableType::Buffer,
            buffer,
            image: None,
            bank: None,
        })
    }

    fn put_image(
        &mut self,
        image: VariableId,
        x: VariableId,
        y: VariableId,
        frame: Option<VariableId>,
        sequence: Option<VariableId>,
    ) -> Result<()> {
        self.expect_numeric(x)?;
        self.expect_numeric(y)?;
        let pointer = self.frame_pointer(image, frame, sequence)?;
        self.machine_call(MachineOp::PutImage, &[pointer, x, y]).map(|_| ())
    }

    fn load_sprite(&mut self, load: &ImageLoad) -> Result<VariableId> {
        let key = format!("{}|sprite|{:?}", load.path, load.flags);
        if let Some(id) = self.reuse(&key, load.alias.as_deref())? {
            return Ok(id);
        }
        let image = self.decode(&load.path)?;
        let request = self.image_request(load, self.current_mode(load.mode));
        let prepared = self.located(prepare_sprite(image, self.target.machine.as_ref(), &request))?;
        self.register_resource(Resource {
            key,
            alias: load.alias.clone(),
            var_type: VariableType::Sprite,
            buffer: prepared.buffer,
            image: Some(prepared.info),
            bank: load.bank,
        })
    }

    fn sprite_enable(&mut self, sprite: VariableId, enable: bool) -> Result<()> {
        self.check_sprite(sprite)?;
        let op = if enable {
            MachineOp::SpriteEnable
        } else {
            MachineOp::SpriteDisable
        };
        self.machine_call(op, &[sprite]).map(|_| ())
    }

    fn sprite_at(&mut self, sprite: VariableId, x: VariableId, y: VariableId) -> Result<()> {
        self.check_sprite(sprite)?;
        self.expect_numeric(x)?;
        self.expect_numeric(y)?;
        self.machine_call(MachineOp::SpriteAt, &[sprite, x, y]).map(|_| ())
    }

    fn sprite_color(&mut self, sprite: VariableId, color: VariableId) -> Result<()> {
        self.check_sprite(sprite)?;
        self.expect_numeric(color)?;
        self.machine_call(MachineOp::SpriteColor, &[sprite, color]).map(|_| ())
    }

    fn sprite_mode(&mut self, sprite: VariableId, mode: SpriteMode) -> Result<()> {
        self.check_sprite(sprite)?;
        let op = match mode {
            SpriteMode::Multicolor => MachineOp::SpriteMulticolor,
            SpriteMode::Monocolor => MachineOp::SpriteMonocolor,
            SpriteMode::Expand => MachineOp::SpriteExpand,
            SpriteMode::Compress => MachineOp::SpriteCompress,
        };
        self.machine_call(op, &[sprite]).map(|_| ())
    }

    fn sprite_image(&mut self, sprite: VariableId, data: VariableId) -> Result<()> {
        self.check_sprite(sprite)?;
        if self.symbols.variable(data).value_buffer.is_none() {
            return Err(self.error(
                ErrorCode::NotAnImage,
                format!("{} holds no sprite data", self.symbols.variable(data).name),
            ));
        }
        self.touch(data);
        let pointer = self.temporary(VariableType::Address, "sprite data");
        let name = self.real_name(pointer);
        let label = self.real_name(data);
        self.target.cpu.address_of(&mut self.out, &label, &name);
        self.machine_call(MachineOp::SpriteData, &[sprite, pointer]).map(|_| ())
    }

    fn load_tiles(&mut self, load: &ImageLoad) -> Result<VariableId> {
        let key = format!("{}|tiles", load.path);
        if let Some(id) = self.reuse(&key, load.alias.as_deref())? {
            return Ok(id);
        }
        let image = self.decode(&load.path)?;
        let request = self.image_request(load, self.current_mode(load.mode));
        let codes = self.cell_tiles(&image, &request)?;
        let mut buffer = vec![(image.width / 8) as u8, (image.height / 8) as u8];
        buffer.extend(codes);
        self.register_resource(Resource {
            key,
            alias: load.alias.clone(),
            var_type: VariableType::Tiles,
            buffer,
            image: None,
            bank: load.bank,
        })
    }

    fn load_tileset(&mut self, path: &str, alias: Option<&str>) -> Result<VariableId> {
        let key = format!("{}|tileset", path);
        if let Some(id) = self.reuse(&key, alias)? {
            return Ok(id);
        }
        let full = self.asset_path(path)?;
        let tileset = self.located(self.assets.tiled.load_tileset(&full))?;
        let codes = self.tileset_codes(&tileset)?;
        let tileset_id = self.assets.add_tileset(tileset);
        self.register_resource(Resource {
            key,
            alias: alias.map(str::to_string),
            var_type: VariableType::Tileset,
            buffer: codes,
            image: Some(ImageInfo {
                tileset: Some(tileset_id),
                ..Default::default()
            }),
            bank: None,
        })
    }

    fn load_tilemap(&mut self, path: &str, layer: Option<&str>, alias: Option<&str>) -> Result<VariableId> {
        let key = format!("{}|tilemap|{}", path, layer.unwrap_or(""));
        if let Some(id) = self.reuse(&key, alias)? {
            return Ok(id);
        }
        let full = self.asset_path(path)?;
        let tilemap = self.located(self.assets.tiled.load_tilemap(&full))?;
        let chosen = match layer {
            Some(name) => self.located(tilemap.layer(name))?.clone(),
            None => tilemap.layers.first().cloned().ok_or_else(|| {
                self.error(ErrorCode::NotATilemap, format!("{} has no layers", path))
            })?,
        };
        let mut codes: HashMap<u32, Vec<u8>> = HashMap::new();
        for reference in &tilemap.tilesets {
            let mapped = self.tileset_codes(&reference.tileset)?;
            codes.insert(reference.first_gid, mapped);
        }
        let mut buffer = vec![chosen.width as u8, chosen.height as u8];
        for &gid in &chosen.data {
            let gid = gid & 0x0FFF_FFFF;
            let code = match tilemap.resolve(gid) {
                Some((reference, local)) if gid != 0 => codes
                    .get(&reference.first_gid)
                    .and_then(|c| c.get(local as usize).copied())
                    .unwrap_or(local as u8),
                _ => 0,
            };
            buffer.push(code);
        }
        let first_gid = tilemap.tilesets.first().map(|t| t.first_gid).unwrap_or(1);
        let tilemap_id = self.assets.add_tilemap(tilemap);
        self.register_resource(Resource {
            key,
            alias: alias.map(str::to_string),
            var_type: VariableType::Tilemap,
            buffer,
            image: Some(ImageInfo {
                width: chosen.width as usize,
                height: chosen.height as usize,
                tilemap: Some(tilemap_id),
                first_gid,
                ..Default::default()
            }),
            bank: None,
        })
    }

    fn put_tilemap(&mut self, map: VariableId, x: VariableId, y: VariableId) -> Result<()> {
        if !matches!(self.type_of(map), VariableType::Tilemap | VariableType::Tiles) {
            return Err(self.error(
                ErrorCode::NotATilemap,
                format!("{} is not a tilemap", self.symbols.variable(map).name),
            ));
        }
        self.expect_numeric(x)?;
        self.expect_numeric(y)?;
        self.touch(map);
        let pointer = self.temporary(VariableType::Address, "tilemap");
        let name = self.real_name(pointer);
        let label = self.real_name(map);
        self.target.cpu.address_of(&mut self.out, &label, &name);
        self.machine_call(MachineOp::PutTilemap, &[pointer, x, y]).map(|_| ())
    }

    fn tile_class(&mut self, tileset: VariableId, class: &str) -> Result<VariableId> {
        let tiles = self.tileset_of(tileset)?;
        let id = self.located(tiles.tile_class(class))?;
        Ok(self.integer_constant(i64::from(id)))
    }

    fn tile_probability(&mut self, tileset: VariableId, id: VariableId) -> Result<VariableId> {
        let tiles = self.tileset_of(tileset)?;
        let id = self.require_constant(id, "the tile id")?;
        let probability = self.located(tiles.tile_probability(id as u32))?;
        Ok(self.float_constant(f64::from(probability)))
    }

    fn tile_id(&mut self, tileset: VariableId, id: VariableId) -> Result<VariableId> {
        let tiles = self.tileset_of(tileset)?;
        let id = self.require_constant(id, "the tile id")?;
        let id = self.located(tiles.tile_id(id as u32))?;
        Ok(self.integer_constant(i64::from(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{c64, calls, code};
    use super::*;
    use crate::assets::tiled::{Layer, TileInfo, TilesetRef};
    use crate::assets::{AssetPipeline, ImageDecoder, TiledLoader, Tilemap, XmlTiledLoader};
    use crate::backend::Target;
    use crate::config::{CompilerOptions, TargetKind};
    use std::path::Path;

    const WHITE: [u8; 4] = [255, 255, 255, 255];
    const BLACK: [u8; 4] = [0, 0, 0, 255];

    struct Fixed(DecodedImage);

    impl ImageDecoder for Fixed {
        fn decode(&self, _path: &Path) -> Result<DecodedImage> {
            Ok(self.0.clone())
        }
    }

    struct FixedMap(Tilemap);

    impl TiledLoader for FixedMap {
        fn load_tileset(&self, _path: &Path) -> Result<Tileset> {
            Ok(self.0.tilesets[0].tileset.clone())
        }

        fn load_tilemap(&self, _path: &Path) -> Result<Tilemap> {
            Ok(self.0.clone())
        }
    }

    fn checker(width: usize, height: usize) -> DecodedImage {
        let pixels = (0..width * height)
            .map(|i| if (i % width + i / width) % 2 == 0 { WHITE } else { BLACK })
            .collect();
        DecodedImage { width, height, pixels }
    }

    fn with_image(image: DecodedImage) -> Environment {
        let assets = AssetPipeline::new(Box::new(Fixed(image)), Box::new(XmlTiledLoader));
        Environment::with_assets(CompilerOptions::default(), Target::new(TargetKind::C64), assets)
    }

    fn map() -> Tilemap {
        Tilemap {
            width: 2,
            height: 1,
            tile_width: 8,
            tile_height: 8,
            tilesets: vec![TilesetRef {
                first_gid: 1,
                tileset: Tileset {
                    name: "terrain".into(),
                    tile_width: 8,
                    tile_height: 8,
                    tile_count: 4,
                    columns: 2,
                    image: None,
                    tiles: vec![TileInfo {
                        id: 2,
                        class: Some("water".into()),
                        probability: 0.5,
                    }],
                },
            }],
            layers: vec![Layer {
                name: "ground".into(),
                width: 2,
                height: 1,
                data: vec![3, 0],
            }],
        }
    }

    fn with_map() -> Environment {
        let assets = AssetPipeline::new(Box::new(Fixed(checker(8, 8))), Box::new(FixedMap(map())));
        Environment::with_assets(CompilerOptions::default(), Target::new(TargetKind::C64), assets)
    }

    #[test]
    fn test_image_is_cached_and_aliased() {
        let mut env = with_image(checker(8, 8));
        let mut load = ImageLoad::new("8x8.png");
        load.alias = Some("s".into());
        let first = env.load_image(&load).unwrap();
        let second = env.load_image(&ImageLoad::new("8x8.png")).unwrap();
        assert_eq!(first, second);
        let constant = env.symbols.constant("s").unwrap();
        assert_eq!(constant.value, ConstantValue::Integer(1));
        let variable = env.symbols.variable(first);
        assert_eq!(variable.var_type, VariableType::Image);
        assert!(variable.readonly);
        assert_eq!(variable.image.as_ref().unwrap().colors, 2);
        assert!(!variable.value_buffer.as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_distinct_files_get_distinct_numbers() {
        let mut env = with_image(checker(8, 8));
        let mut a = ImageLoad::new("a.png");
        a.alias = Some("A".into());
        let mut b = ImageLoad::new("b.png");
        b.alias = Some("B".into());
        env.load_image(&a).unwrap();
        env.load_image(&b).unwrap();
        assert_eq!(env.symbols.constant("B").unwrap().value, ConstantValue::Integer(2));
    }

    #[test]
    fn test_frames_register_offset_table() {
        let mut env = with_image(checker(16, 8));
        let mut load = ImageLoad::new("frames.png");
        load.framing = Framing::Frames { width: 8, height: 8 };
        let id = env.load_image(&load).unwrap();
        let info = env.symbols.variable(id).image.clone().unwrap();
        assert_eq!(info.frame_count, 2);
        assert!(env.assets.offsets.get(info.frame_size).is_some());
    }

    #[test]
    fn test_put_image_frame_uses_table_at_runtime() {
        let mut env = with_image(checker(16, 8));
        let mut load = ImageLoad::new("frames.png");
        load.framing = Framing::Frames { width: 8, height: 8 };
        let id = env.load_image(&load).unwrap();
        let size = env.symbols.variable(id).image.as_ref().unwrap().frame_size;
        let x = env.integer_constant(0);
        let f = env.define_variable("F", VariableType::Byte).unwrap();
        env.put_image(id, x, x, Some(f), None).unwrap();
        let table = table_label(size);
        assert!(code(&env).iter().any(|l| l.contains(&table)));
        assert_eq!(calls(&env, "PUTIMAGE"), 1);
    }

    #[test]
    fn test_put_image_constant_frame_out_of_range() {
        let mut env = with_image(checker(16, 8));
        let mut load = ImageLoad::new("frames.png");
        load.framing = Framing::Frames { width: 8, height: 8 };
        let id = env.load_image(&load).unwrap();
        let x = env.integer_constant(0);
        let f = env.integer_constant(2);
        let err = env.put_image(id, x, x, Some(f), None).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValueOutOfRange);
    }

    #[test]
    fn test_put_image_requires_an_image() {
        let mut env = c64();
        let n = env.define_variable("N", VariableType::Word).unwrap();
        let x = env.integer_constant(0);
        let err = env.put_image(n, x, x, None, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotAnImage);
    }

    #[test]
    fn test_unknown_bitmap_mode_falls_back() {
        let mut env = c64();
        env.bitmap_enable(Some(9)).unwrap();
        assert_eq!(env.screen_mode, Some(1));
        assert_eq!(env.warnings[0].code, WarningCode::ScreenModeFallback);
        assert_eq!(calls(&env, "BITMAPENABLE"), 1);
    }

    #[test]
    fn test_sprite_number_is_checked() {
        let mut env = c64();
        let n = env.integer_constant(8);
        let err = env.sprite_enable(n, true).unwrap_err();
        assert_eq!(err.code, ErrorCode::SpriteIdOutOfRange);
        let n = env.integer_constant(7);
        env.sprite_enable(n, true).unwrap();
        assert_eq!(calls(&env, "SPRITEENABLE"), 1);
    }

    #[test]
    fn test_sprite_image_points_at_data() {
        let mut env = with_image(checker(8, 8));
        let sprite = env.load_sprite(&ImageLoad::new("ship.png")).unwrap();
        assert_eq!(env.symbols.variable(sprite).value_buffer.as_ref().unwrap().len(), 63);
        let n = env.integer_constant(0);
        env.sprite_image(n, sprite).unwrap();
        let label = env.real_name(sprite);
        assert!(code(&env).contains(&format!("LDA #<{}", label)));
        assert_eq!(calls(&env, "SPRITEDATA"), 1);
    }

    #[test]
    fn test_tiles_are_deduplicated() {
        let mut env = with_image(checker(16, 8));
        let tiles = env.load_tiles(&ImageLoad::new("tiles.png")).unwrap();
        let buffer = env.symbols.variable(tiles).value_buffer.clone().unwrap();
        assert_eq!(buffer[..2], [2, 1]);
        assert_eq!(buffer[2], buffer[3]);
        assert_eq!(env.assets.tiles.count, 1);
    }

    #[test]
    fn test_tilemap_layer_codes() {
        let mut env = with_map();
        let map = env.load_tilemap("level.tmx", Some("ground"), None).unwrap();
        let buffer = env.symbols.variable(map).value_buffer.clone().unwrap();
        assert_eq!(buffer, vec![2, 1, 2, 0]);
        let x = env.integer_constant(0);
        env.put_tilemap(map, x, x).unwrap();
        assert_eq!(calls(&env, "PUTTILEMAP"), 1);
    }

    #[test]
    fn test_missing_layer_is_reported() {
        let mut env = with_map();
        let err = env.load_tilemap("level.tmx", Some("sky"), None).unwrap_err();
        assert_eq!(err.code, ErrorCode::LayerNotFound);
    }

    #[test]
    fn test_tileset_queries_fold_to_constants() {
        let mut env = with_map();
        let tileset = env.load_tileset("terrain.tsx", None).unwrap();
        let water = env.tile_class(tileset, "water").unwrap();
        assert_eq!(env.constant_of(water), Some(2));
        let two = env.integer_constant(2);
        let p = env.tile_probability(tileset, two).unwrap();
        assert_eq!(env.symbols.variable(p).value_float, Some(0.5));
        let nine = env.integer_constant(9);
        let err = env.tile_id(tileset, nine).unwrap_err();
        assert_eq!(err.code, ErrorCode::TileOutOfRange);
    }

    #[test]
    fn test_sandbox_refuses_parent_paths() {
        let mut env = with_image(checker(8, 8));
        env.options.sandbox = true;
        let err = env.load_image(&ImageLoad::new("../secret.png")).unwrap_err();
        assert_eq!(err.code, ErrorCode::SandboxViolation);
    }
}
