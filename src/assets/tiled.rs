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

//! Tiled (`.tsx` / `.tmx`) tilesets and tilemaps.
//!
//! Only orthogonal maps with CSV or plain XML layer data are accepted;
//! base64 and compressed layers are rejected with E187.

use crate::error::{CompileError, ErrorCode, Result};
use std::path::{Path, PathBuf};

/// Index of a loaded tileset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TilesetId(pub usize);

/// Index of a loaded tilemap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TilemapId(pub usize);

/// Metadata of one tile of a tileset.
#[derive(Debug, Clone, PartialEq)]
pub struct TileInfo {
    pub id: u32,
    pub class: Option<String>,
    pub probability: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tileset {
    pub name: String,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tile_count: u32,
    pub columns: u32,
    /// Image holding the tiles, relative to the working directory.
    pub image: Option<PathBuf>,
    pub tiles: Vec<TileInfo>,
}

impl Tileset {
    /// First tile whose class (or legacy type) is `class`.
    pub fn tile_class(&self, class: &str) -> Result<u32> {
        self.tiles
            .iter()
            .find(|t| t.class.as_deref() == Some(class))
            .map(|t| t.id)
            .ok_or_else(|| {
                CompileError::unlocated(
                    ErrorCode::TileClassNotFound,
                    format!("tileset {} has no tile of class {}", self.name, class),
                )
            })
    }

    /// Probability of tile `id`; tiles without the attribute weigh 1.
    pub fn tile_probability(&self, id: u32) -> Result<f32> {
        self.check_id(id)?;
        Ok(self
            .tiles
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.probability)
            .unwrap_or(1.0))
    }

    /// Validate a tile id local to the tileset.
    pub fn tile_id(&self, id: u32) -> Result<u32> {
        self.check_id(id)?;
        Ok(id)
    }

    fn check_id(&self, id: u32) -> Result<()> {
        if id >= self.tile_count {
            return Err(CompileError::unlocated(
                ErrorCode::TileOutOfRange,
                format!("tile {} is outside tileset {} ({} tiles)", id, self.name, self.tile_count),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Global tile ids, row by row; 0 is an empty cell.
    pub data: Vec<u32>,
}

/// A reference from a map to a tileset.
#[derive(Debug, Clone, PartialEq)]
pub struct TilesetRef {
    pub first_gid: u32,
    pub tileset: Tileset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tilemap {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tilesets: Vec<TilesetRef>,
    pub layers: Vec<Layer>,
}

impl Tilemap {
    pub fn layer(&self, name: &str) -> Result<&Layer> {
        self.layers
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                CompileError::unlocated(ErrorCode::LayerNotFound, format!("no layer named {}", name))
            })
    }

    /// The tileset a global id belongs to, with the id local to it.
    pub fn resolve(&self, gid: u32) -> Option<(&TilesetRef, u32)> {
        self.tilesets
            .iter()
            .rev()
            .find(|t| gid >= t.first_gid)
            .map(|t| (t, gid - t.first_gid))
    }

    /// Layer data as one byte per cell: local tile ids, `0` for empty cells.
    pub fn codes(&self, layer: &Layer) -> Vec<u8> {
        layer
            .data
            .iter()
            .map(|&gid| match self.resolve(gid & 0x0FFF_FFFF) {
                Some((_, local)) if gid != 0 => local as u8,
                _ => 0,
            })
            .collect()
    }
}

/// Reads Tiled documents.
pub trait TiledLoader {
    fn load_tileset(&self, path: &Path) -> Result<Tileset>;

    fn load_tilemap(&self, path: &Path) -> Result<Tilemap>;
}

/// Loader over `roxmltree`.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlTiledLoader;

fn unreadable(path: &Path, reason: impl std::fmt::Display) -> CompileError {
    CompileError::unlocated(
        ErrorCode::TiledFileUnreadable,
        format!("cannot read {}: {}", path.display(), reason),
    )
}

fn invalid(path: &Path, reason: impl std::fmt::Display) -> CompileError {
    CompileError::unlocated(
        ErrorCode::TilemapInvalid,
        format!("{} is not a valid Tiled file: {}", path.display(), reason),
    )
}

fn number(node: roxmltree::Node, name: &str, path: &Path) -> Result<u32> {
    node.attribute(name)
        .ok_or_else(|| invalid(path, format!("<{}> without {}", node.tag_name().name(), name)))?
        .trim()
        .parse()
        .map_err(|_| invalid(path, format!("{} is not a number", name)))
}

fn parse_tileset(node: roxmltree::Node, path: &Path) -> Result<Tileset> {
    let tile_width = number(node, "tilewidth", path)?;
    let tile_height = number(node, "tileheight", path)?;
    if tile_width == 0 || tile_height == 0 || tile_width % 8 != 0 || tile_height % 8 != 0 {
        return Err(CompileError::unlocated(
            ErrorCode::TilesetTileSizeInvalid,
            format!(
                "tiles of {} are {}x{}, not a multiple of 8",
                path.display(),
                tile_width,
                tile_height
            ),
        ));
    }
    let tile_count = number(node, "tilecount", path)?;
    if tile_count > 256 {
        return Err(CompileError::unlocated(
            ErrorCode::TilesetTooManyTiles,
            format!("{} has {} tiles, at most 256 fit", path.display(), tile_count),
        ));
    }
    let columns = node
        .attribute("columns")
        .and_then(|c| c.parse().ok())
        .unwrap_or(1);
    let base = path.parent().unwrap_or(Path::new(""));
    let image = node
        .children()
        .find(|c| c.has_tag_name("image"))
        .and_then(|i| i.attribute("source"))
        .map(|s| base.join(s));
    let mut tiles = Vec::new();
    for tile in node.children().filter(|c| c.has_tag_name("tile")) {
        tiles.push(TileInfo {
            id: number(tile, "id", path)?,
            class: tile
                .attribute("class")
                .or_else(|| tile.attribute("type"))
                .map(str::to_string),
            probability: tile
                .attribute("probability")
                .and_then(|p| p.parse().ok())
                .unwrap_or(1.0),
        });
    }
    Ok(Tileset {
        name: node.attribute("name").unwrap_or("").to_string(),
        tile_width,
        tile_height,
        tile_count,
        columns,
        image,
        tiles,
    })
}

fn parse_layer(node: roxmltree::Node, path: &Path) -> Result<Layer> {
    let width = number(node, "width", path)?;
    let height = number(node, "height", path)?;
    let name = node.attribute("name").unwrap_or("").to_string();
    let data = node
        .children()
        .find(|c| c.has_tag_name("data"))
        .ok_or_else(|| invalid(path, format!("layer {} has no data", name)))?;
    if data.attribute("compression").is_some() {
        return Err(CompileError::unlocated(
            ErrorCode::TilemapEncodingUnsupported,
            format!("layer {} of {} is compressed", name, path.display()),
        ));
    }
    let cells: Vec<u32> = match data.attribute("encoding") {
        Some("csv") => data
            .text()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse().map_err(|_| invalid(path, format!("bad cell {}", s))))
            .collect::<Result<_>>()?,
        None => data
            .children()
            .filter(|c| c.has_tag_name("tile"))
            .map(|t| Ok(t.attribute("gid").and_then(|g| g.parse().ok()).unwrap_or(0)))
            .collect::<Result<_>>()?,
        Some(other) => {
            return Err(CompileError::unlocated(
                ErrorCode::TilemapEncodingUnsupported,
                format!("layer {} of {} uses the {} encoding", name, path.display(), other),
            ))
        }
    };
    if cells.len() != (width * height) as usize {
        return Err(CompileError::unlocated(
            ErrorCode::LayerSizeMismatch,
            format!(
                "layer {} holds {} cells instead of {}x{}",
                name,
                cells.len(),
                width,
                height
            ),
        ));
    }
    Ok(Layer {
        name,
        width,
        height,
        data: cells,
    })
}

impl XmlTiledLoader {
    fn read(path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| unreadable(path, e))
    }
}

impl TiledLoader for XmlTiledLoader {
    fn load_tileset(&self, path: &Path) -> Result<Tileset> {
        let text = Self::read(path)?;
        let doc = roxmltree::Document::parse(&text).map_err(|e| invalid(path, e))?;
        let root = doc.root_element();
        if !root.has_tag_name("tileset") {
            return Err(invalid(path, "the root element is not <tileset>"));
        }
        parse_tileset(root, path)
    }

    fn load_tilemap(&self, path: &Path) -> Result<Tilemap> {
        let text = Self::read(path)?;
        let doc = roxmltree::Document::parse(&text).map_err(|e| invalid(path, e))?;
        let root = doc.root_element();
        if !root.has_tag_name("map") {
            return Err(CompileError::unlocated(
                ErrorCode::NotATilemap,
                format!("{} is not a tilemap", path.display()),
            ));
        }
        if root.attribute("orientation").unwrap_or("orthogonal") != "orthogonal" {
            return Err(invalid(path, "only orthogonal maps are supported"));
        }
        let base = path.parent().unwrap_or(Path::new(""));
        let mut tilesets = Vec::new();
        for node in root.children().filter(|c| c.has_tag_name("tileset")) {
            let first_gid = number(node, "firstgid", path)?;
            let tileset = match node.attribute("source") {
                Some(source) => {
                    let file = base.join(source);
                    if !file.exists() {
                        return Err(CompileError::unlocated(
                            ErrorCode::TilesetMissing,
                            format!("tileset {} used by {} not found", source, path.display()),
                        ));
                    }
                    self.load_tileset(&file)?
                }
                None => parse_tileset(node, path)?,
            };
            tilesets.push(TilesetRef { first_gid, tileset });
        }
        if tilesets.is_empty() {
            return Err(CompileError::unlocated(
                ErrorCode::TilesetMissing,
                format!("{} references no tileset", path.display()),
            ));
        }
        let layers = root
            .children()
            .filter(|c| c.has_tag_name("layer"))
            .map(|l| parse_layer(l, path))
            .collect::<Result<Vec<_>>>()?;
        Ok(Tilemap {
            width: number(root, "width", path)?,
            height: number(root, "height", path)?,
            tile_width: number(root, "tilewidth", path)?,
            tile_height: number(root, "tileheight", path)?,
            tilesets,
            layers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use test_case::test_case;

    const TILESET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tileset version="1.10" name="ground" tilewidth="8" tileheight="8" tilecount="4" columns="2">
 <image source="ground.png" width="16" height="16"/>
 <tile id="1" class="wall"/>
 <tile id="2" type="water" probability="0.25"/>
</tileset>"#;

    fn map(data: &str, encoding: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" width="2" height="2" tilewidth="8" tileheight="8">
 <tileset firstgid="1" source="ground.tsx"/>
 <layer id="1" name="floor" width="2" height="2">
  <data {}>{}</data>
 </layer>
</map>"#,
            encoding, data
        )
    }

    fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_tileset_metadata() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "ground.tsx", TILESET);
        let tileset = XmlTiledLoader.load_tileset(&path).unwrap();
        assert_eq!(tileset.tile_count, 4);
        assert_eq!(tileset.tile_class("wall").unwrap(), 1);
        assert_eq!(tileset.tile_class("water").unwrap(), 2);
        assert_eq!(tileset.tile_probability(2).unwrap(), 0.25);
        assert_eq!(tileset.tile_probability(0).unwrap(), 1.0);
        assert_eq!(tileset.tile_id(3).unwrap(), 3);
        assert_eq!(tileset.tile_id(4).unwrap_err().code, ErrorCode::TileOutOfRange);
        assert_eq!(
            tileset.tile_class("lava").unwrap_err().code,
            ErrorCode::TileClassNotFound
        );
        assert_eq!(tileset.image, Some(dir.path().join("ground.png")));
    }

    #[test]
    fn test_tilemap_csv() {
        let dir = TempDir::new().unwrap();
        write(&dir, "ground.tsx", TILESET);
        let path = write(&dir, "level.tmx", &map("1,2,\n0,4", r#"encoding="csv""#));
        let tilemap = XmlTiledLoader.load_tilemap(&path).unwrap();
        assert_eq!((tilemap.width, tilemap.height), (2, 2));
        let layer = tilemap.layer("FLOOR").unwrap();
        assert_eq!(layer.data, vec![1, 2, 0, 4]);
        assert_eq!(tilemap.codes(layer), vec![0, 1, 0, 3]);
        assert_eq!(tilemap.layer("sky").unwrap_err().code, ErrorCode::LayerNotFound);
    }

    #[test]
    fn test_tilemap_xml_cells() {
        let dir = TempDir::new().unwrap();
        write(&dir, "ground.tsx", TILESET);
        let cells = r#"<tile gid="2"/><tile/><tile gid="3"/><tile gid="1"/>"#;
        let path = write(&dir, "level.tmx", &map(cells, ""));
        let tilemap = XmlTiledLoader.load_tilemap(&path).unwrap();
        assert_eq!(tilemap.layers[0].data, vec![2, 0, 3, 1]);
    }

    #[test_case("1,2,3", r#"encoding="csv""#, ErrorCode::LayerSizeMismatch ; "short layer")]
    #[test_case("AAAA", r#"encoding="base64""#, ErrorCode::TilemapEncodingUnsupported ; "base64")]
    #[test_case("AAAA", r#"encoding="base64" compression="zlib""#, ErrorCode::TilemapEncodingUnsupported ; "compressed")]
    fn test_bad_layers(data: &str, encoding: &str, code: ErrorCode) {
        let dir = TempDir::new().unwrap();
        write(&dir, "ground.tsx", TILESET);
        let path = write(&dir, "level.tmx", &map(data, encoding));
        assert_eq!(XmlTiledLoader.load_tilemap(&path).unwrap_err().code, code);
    }

    #[test]
    fn test_document_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("none.tmx");
        assert_eq!(
            XmlTiledLoader.load_tilemap(&missing).unwrap_err().code,
            ErrorCode::TiledFileUnreadable
        );
        let tileset = write(&dir, "ground.tsx", TILESET);
        assert_eq!(
            XmlTiledLoader.load_tilemap(&tileset).unwrap_err().code,
            ErrorCode::NotATilemap
        );
        let broken = write(&dir, "broken.tmx", "<map");
        assert_eq!(
            XmlTiledLoader.load_tilemap(&broken).unwrap_err().code,
            ErrorCode::TilemapInvalid
        );
        let orphan = write(&dir, "orphan.tmx", &map("1,1,1,1", r#"encoding="csv""#).replace("ground.tsx", "gone.tsx"));
        assert_eq!(
            XmlTiledLoader.load_tilemap(&orphan).unwrap_err().code,
            ErrorCode::TilesetMissing
        );
    }

    #[test]
    fn test_tileset_limits() {
        let dir = TempDir::new().unwrap();
        let odd = write(&dir, "odd.tsx", &TILESET.replace(r#"tilewidth="8""#, r#"tilewidth="6""#));
        assert_eq!(
            XmlTiledLoader.load_tileset(&odd).unwrap_err().code,
            ErrorCode::TilesetTileSizeInvalid
        );
        let big = write(&dir, "big.tsx", &TILESET.replace(r#"tilecount="4""#, r#"tilecount="300""#));
        assert_eq!(
            XmlTiledLoader.load_tileset(&big).unwrap_err().code,
            ErrorCode::TilesetTooManyTiles
        );
    }
}
