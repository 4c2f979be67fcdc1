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

//! Graphics, sprites, tiles and sound statements.

use super::expressions::ExpressionParser;
use super::helpers::ParserHelpers;
use super::Parser;
use crate::assets::Framing;
use crate::codegen::{AudioEmitter, GraphicsEmitter, ImageLoad, SpriteMode};
use crate::error::{CompileError, ErrorCode};
use crate::lexer::Token;
use crate::symbols::VariableId;

/// Trait for media statement parsing operations.
pub trait MediaParser {
    /// Any `LOAD` form, returning the resource variable.
    ///
    /// - `LOAD IMAGE|IMAGES|SEQUENCE|TILES|SPRITE("file" [, mode]) [modifiers] [AS "alias"]`
    /// - `LOAD TILESET("file") [AS "alias"]`
    /// - `LOAD TILEMAP("file") [LAYER "name"] [AS "alias"]`
    /// - `LOAD "file" [AS BUFFER] [AS "alias"]`
    fn parse_load(&mut self) -> Result<VariableId, CompileError>;

    /// `BITMAP ENABLE [(mode)]`.
    fn parse_bitmap(&mut self) -> Result<(), CompileError>;

    /// `PLOT x, y [, color]`.
    fn parse_plot(&mut self) -> Result<(), CompileError>;

    /// `COLOR BORDER c` / `COLOR BACKGROUND c`.
    fn parse_color(&mut self) -> Result<(), CompileError>;

    /// `PUT IMAGE img [FRAME f] [SEQUENCE s] AT x, y` / `PUT TILEMAP m AT x, y`.
    fn parse_put(&mut self) -> Result<(), CompileError>;

    /// `SPRITE n ENABLE|DISABLE|AT x, y|COLOR c|IMAGE data|MULTICOLOR|...`.
    fn parse_sprite(&mut self) -> Result<(), CompileError>;

    /// `VOLUME n`, `PLAY note, duration [ON voices]`, `SOUND ON|OFF [voices]`.
    fn parse_audio(&mut self) -> Result<(), CompileError>;
}

impl<'a> Parser<'a> {
    fn byte_constant(&mut self, what: &str) -> Result<u8, CompileError> {
        let value = self.parse_constant(what)?;
        u8::try_from(value).map_err(|_| {
            self.error(
                ErrorCode::ValueOutOfRange,
                format!("{} must be between 0 and 255, found {}", what, value),
            )
        })
    }

    fn size_pair(&mut self) -> Result<(usize, usize), CompileError> {
        self.expect(&Token::LeftParen, "'('")?;
        let width = self.parse_constant("a frame width")?;
        self.expect(&Token::Comma, "','")?;
        let height = self.parse_constant("a frame height")?;
        self.expect(&Token::RightParen, "')'")?;
        if width <= 0 || height <= 0 {
            return Err(self.error(
                ErrorCode::ValueOutOfRange,
                format!("frame size {}x{} is empty", width, height),
            ));
        }
        Ok((width as usize, height as usize))
    }

    fn load_alias(&mut self) -> Result<Option<String>, CompileError> {
        if !self.match_token(&Token::As) {
            return Ok(None);
        }
        let alias = self.parse_static_string("an alias")?;
        Ok(Some(alias.to_ascii_uppercase()))
    }

    /// `("file" [, mode])` and the modifiers of an image load.
    fn image_load(&mut self, kind: &Token) -> Result<ImageLoad, CompileError> {
        self.expect(&Token::LeftParen, "'('")?;
        let mut load = ImageLoad::new(self.parse_static_string("a file name")?);
        if self.match_token(&Token::Comma) {
            load.mode = Some(self.byte_constant("a screen mode")?);
        }
        self.expect(&Token::RightParen, "')'")?;

        let mut frame = None;
        loop {
            if self.match_word("FRAME") {
                self.expect_word("SIZE")?;
                frame = Some(self.size_pair()?);
            } else if self.match_word("FLIP") {
                let axis = self.expect_identifier("X, Y or XY")?.to_ascii_uppercase();
                match axis.as_str() {
                    "X" => load.flags.flip_x = true,
                    "Y" => load.flags.flip_y = true,
                    "XY" | "YX" => {
                        load.flags.flip_x = true;
                        load.flags.flip_y = true;
                    }
                    _ => return Err(self.unexpected("X, Y or XY")),
                }
            } else if self.match_word("ROLL") {
                let axis = self.expect_identifier("X or Y")?.to_ascii_uppercase();
                match axis.as_str() {
                    "X" => load.flags.roll_x = true,
                    "Y" => load.flags.roll_y = true,
                    _ => return Err(self.unexpected("X or Y")),
                }
            } else if self.match_word("EXACT") {
                load.flags.exact = true;
            } else if self.match_word("TRANSPARENCY") {
                load.flags.transparency = true;
                if matches!(self.peek(), Some(Token::Integer(_))) {
                    load.transparent = Some(self.byte_constant("a transparent color")?);
                }
            } else if self.match_word("BACKGROUND") {
                load.background = Some(self.byte_constant("a background color")?);
            } else if self.match_word("BANK") {
                let bank = self.parse_constant("a bank")?;
                load.bank = Some(usize::try_from(bank).map_err(|_| {
                    self.error(ErrorCode::BankNotFound, format!("bank {} does not exist", bank))
                })?);
            } else {
                break;
            }
        }
        load.alias = self.load_alias()?;

        load.framing = match (kind, frame) {
            (Token::Images, Some((width, height))) => Framing::Frames { width, height },
            (Token::Sequence, Some((width, height))) => Framing::Sequence { width, height },
            (Token::Images | Token::Sequence, None) => {
                return Err(self.unexpected("FRAME SIZE (width, height)"));
            }
            (_, Some(_)) => return Err(self.unexpected("AS or end of statement")),
            (_, None) => Framing::Single,
        };
        Ok(load)
    }

    fn file_argument(&mut self) -> Result<String, CompileError> {
        self.expect(&Token::LeftParen, "'('")?;
        let path = self.parse_static_string("a file name")?;
        self.expect(&Token::RightParen, "')'")?;
        Ok(path)
    }

    fn put_position(&mut self) -> Result<(VariableId, VariableId), CompileError> {
        self.expect_word("AT")?;
        let x = self.parse_expression()?;
        self.expect(&Token::Comma, "','")?;
        let y = self.parse_expression()?;
        Ok((x, y))
    }
}

impl<'a> MediaParser for Parser<'a> {
    fn parse_load(&mut self) -> Result<VariableId, CompileError> {
        self.expect(&Token::Load, "LOAD")?;
        let kind = self.peek().cloned();
        match kind {
            Some(kind @ (Token::Image | Token::Images | Token::Sequence)) => {
                self.advance();
                let load = self.image_load(&kind)?;
                self.env.load_image(&load)
            }
            Some(Token::Tiles) => {
                self.advance();
                let load = self.image_load(&Token::Tiles)?;
                self.env.load_tiles(&load)
            }
            Some(Token::Sprite) => {
                self.advance();
                let load = self.image_load(&Token::Sprite)?;
                self.env.load_sprite(&load)
            }
            Some(Token::Tileset) => {
                self.advance();
                let path = self.file_argument()?;
                let alias = self.load_alias()?;
                self.env.load_tileset(&path, alias.as_deref())
            }
            Some(Token::Tilemap) => {
                self.advance();
                let path = self.file_argument()?;
                let layer = if self.match_word("LAYER") {
                    Some(self.parse_static_string("a layer name")?)
                } else {
                    None
                };
                let alias = self.load_alias()?;
                self.env.load_tilemap(&path, layer.as_deref(), alias.as_deref())
            }
            Some(Token::String(_)) | Some(Token::LeftParen) => {
                let path = if self.check(&Token::LeftParen) {
                    self.file_argument()?
                } else {
                    self.parse_static_string("a file name")?
                };
                if self.check(&Token::As) && matches!(self.peek_ahead(1), Some(Token::Buffer)) {
                    self.advance();
                    self.advance();
                }
                let alias = self.load_alias()?;
                self.env.load_raw(&path, alias.as_deref())
            }
            _ => Err(self.unexpected("IMAGE, IMAGES, SEQUENCE, TILES, SPRITE, TILESET, TILEMAP or a file name")),
        }
    }

    fn parse_bitmap(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Bitmap, "BITMAP")?;
        self.expect_word("ENABLE")?;
        let mode = if self.match_token(&Token::LeftParen) {
            let mode = self.byte_constant("a screen mode")?;
            self.expect(&Token::RightParen, "')'")?;
            Some(mode)
        } else {
            None
        };
        self.env.bitmap_enable(mode)
    }

    fn parse_plot(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Plot, "PLOT")?;
        let x = self.parse_expression()?;
        self.expect(&Token::Comma, "','")?;
        let y = self.parse_expression()?;
        let color = if self.match_token(&Token::Comma) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.env.plot(x, y, color)
    }

    fn parse_color(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Color, "COLOR")?;
        if self.match_word("BORDER") {
            let color = self.parse_expression()?;
            self.env.color_border(color)
        } else if self.match_word("BACKGROUND") {
            let color = self.parse_expression()?;
            self.env.color_background(color)
        } else {
            Err(self.unexpected("BORDER or BACKGROUND"))
        }
    }

    fn parse_put(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Put, "PUT")?;
        if self.match_token(&Token::Tilemap) {
            let map = self.parse_expression()?;
            let (x, y) = self.put_position()?;
            return self.env.put_tilemap(map, x, y);
        }
        self.expect(&Token::Image, "IMAGE or TILEMAP")?;
        let image = self.parse_expression()?;
        let frame = if self.match_word("FRAME") {
            Some(self.parse_expression()?)
        } else {
            None
        };
        let sequence = if self.match_token(&Token::Sequence) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        let (x, y) = self.put_position()?;
        self.env.put_image(image, x, y, frame, sequence)
    }

    fn parse_sprite(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Sprite, "SPRITE")?;
        let sprite = self.parse_expression()?;
        loop {
            if self.match_word("ENABLE") {
                self.env.sprite_enable(sprite, true)?;
            } else if self.match_word("DISABLE") {
                self.env.sprite_enable(sprite, false)?;
            } else if self.match_word("AT") {
                let x = self.parse_expression()?;
                self.expect(&Token::Comma, "','")?;
                let y = self.parse_expression()?;
                self.env.sprite_at(sprite, x, y)?;
            } else if self.match_token(&Token::Color) {
                let color = self.parse_expression()?;
                self.env.sprite_color(sprite, color)?;
            } else if self.match_token(&Token::Image) {
                let data = self.parse_expression()?;
                self.env.sprite_image(sprite, data)?;
            } else if self.match_word("MULTICOLOR") {
                self.env.sprite_mode(sprite, SpriteMode::Multicolor)?;
            } else if self.match_word("MONOCOLOR") {
                self.env.sprite_mode(sprite, SpriteMode::Monocolor)?;
            } else if self.match_word("EXPAND") {
                self.env.sprite_mode(sprite, SpriteMode::Expand)?;
            } else if self.match_word("COMPRESS") {
                self.env.sprite_mode(sprite, SpriteMode::Compress)?;
            } else {
                return Err(self.unexpected("a sprite command"));
            }
            if self.at_statement_end() {
                return Ok(());
            }
        }
    }

    fn parse_audio(&mut self) -> Result<(), CompileError> {
        match self.advance() {
            Some((Token::Volume, _)) => {
                let level = self.parse_expression()?;
                self.env.volume(level)
            }
            Some((Token::Play, _)) => {
                let note = self.parse_expression()?;
                self.expect(&Token::Comma, "','")?;
                let duration = self.parse_expression()?;
                let voices = if self.match_token(&Token::On) {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                self.env.play(note, duration, voices)
            }
            Some((Token::Sound, _)) => {
                let on = if self.match_token(&Token::On) {
                    true
                } else if self.match_token(&Token::Off) {
                    false
                } else {
                    return Err(self.unexpected("ON or OFF"));
                };
                let voices = if self.at_statement_end() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.env.sound(on, voices)
            }
            _ => Err(self.unexpected("VOLUME, PLAY or SOUND")),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::assets::{AssetPipeline, DecodedImage, ImageDecoder, XmlTiledLoader};
    use crate::backend::Target;
    use crate::codegen::testing::{c64, calls, code};
    use crate::config::{CompilerOptions, TargetKind};
    use crate::environment::Environment;
    use crate::error::{ErrorCode, Result};
    use crate::parser::parse_program;
    use crate::symbols::ConstantValue;
    use crate::types::VariableType;
    use std::path::Path;

    struct Fixed(DecodedImage);

    impl ImageDecoder for Fixed {
        fn decode(&self, _path: &Path) -> Result<DecodedImage> {
            Ok(self.0.clone())
        }
    }

    fn checker(width: usize, height: usize) -> DecodedImage {
        let pixels = (0..width * height)
            .map(|i| {
                if (i % width + i / width) % 2 == 0 {
                    [255, 255, 255, 255]
                } else {
                    [0, 0, 0, 255]
                }
            })
            .collect();
        DecodedImage { width, height, pixels }
    }

    fn with_image(width: usize, height: usize) -> Environment {
        let assets = AssetPipeline::new(Box::new(Fixed(checker(width, height))), Box::new(XmlTiledLoader));
        Environment::with_assets(CompilerOptions::default(), Target::new(TargetKind::C64), assets)
    }

    #[test]
    fn test_load_image_alias_and_cache() {
        let mut env = with_image(8, 8);
        parse_program(&mut env, "LOAD IMAGE(\"8x8.png\") AS \"s\"\nimg = LOAD IMAGE(\"8x8.png\")").unwrap();
        let alias = env.symbols.constant("S").unwrap();
        assert_eq!(alias.value, ConstantValue::Integer(1));
        let img = env.symbols.lookup("IMG").unwrap();
        assert_eq!(env.symbols.variable(img).var_type, VariableType::Image);
        assert_eq!(env.assets.resource_id(img), Some(1));
    }

    #[test]
    fn test_load_images_needs_frame_size() {
        let mut env = with_image(16, 8);
        let err = parse_program(&mut env, "x = LOAD IMAGES(\"f.png\")").unwrap_err();
        assert_eq!(err.code, ErrorCode::SyntaxError);

        let mut env = with_image(16, 8);
        parse_program(&mut env, "x = LOAD IMAGES(\"f.png\") FRAME SIZE (8, 8) FLIP X\nPUT IMAGE x FRAME 1 AT 0, 0").unwrap();
        let x = env.symbols.lookup("X").unwrap();
        assert_eq!(env.symbols.variable(x).var_type, VariableType::Images);
        assert_eq!(env.symbols.variable(x).image.as_ref().unwrap().frame_count, 2);
        assert_eq!(calls(&env, "PUTIMAGE"), 1);
    }

    #[test]
    fn test_bitmap_plot_and_colors() {
        let mut env = c64();
        parse_program(&mut env, "BITMAP ENABLE\nPLOT 10, 20, 1\nCOLOR BORDER 2\nCOLOR BACKGROUND 0").unwrap();
        assert!(env.screen_mode.is_some());
        assert_eq!(calls(&env, "BITMAPENABLE"), 1);
        assert_eq!(calls(&env, "PLOT"), 1);
    }

    #[test]
    fn test_sprite_commands_chain() {
        let mut env = c64();
        parse_program(&mut env, "SPRITE 0 ENABLE AT 100, 50 COLOR 7 EXPAND").unwrap();
        assert_eq!(calls(&env, "SPRITEENABLE"), 1);
        assert!(!code(&env).is_empty());
    }

    #[test]
    fn test_sprite_on_machine_without_sprites() {
        let mut env = crate::codegen::testing::coco();
        let err = parse_program(&mut env, "SPRITE 0 ENABLE").unwrap_err();
        assert_eq!(err.code, ErrorCode::SpriteIdOutOfRange);
    }

    #[test]
    fn test_sprite_needs_a_command() {
        let mut env = c64();
        let err = parse_program(&mut env, "SPRITE 0 FLY").unwrap_err();
        assert_eq!(err.code, ErrorCode::SyntaxError);
    }

    #[test]
    fn test_sound_statements() {
        let mut env = c64();
        parse_program(&mut env, "VOLUME 15\nPLAY 40, 10 ON 1\nSOUND OFF").unwrap();
        let err = parse_program(&mut c64(), "SOUND LOUD").unwrap_err();
        assert_eq!(err.code, ErrorCode::SyntaxError);
    }

    #[test]
    fn test_load_buffer_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.bin"), [1u8, 2, 3]).unwrap();
        let mut env = c64();
        env.source_dir = dir.path().to_path_buf();
        parse_program(&mut env, "b = LOAD \"data.bin\" AS BUFFER AS \"raw\"").unwrap();
        let b = env.symbols.lookup("B").unwrap();
        let variable = env.symbols.variable(b);
        assert_eq!(variable.var_type, VariableType::Buffer);
        assert_eq!(variable.value_buffer.as_deref(), Some(&[1u8, 2, 3][..]));
        assert!(env.symbols.constant("RAW").is_some());
    }
}
