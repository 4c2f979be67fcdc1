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

//! The BASIC type system.
//!
//! This module defines:
//! - `VariableType`, the closed set of variable types
//! - bit widths, signedness and the signed/unsigned mapping
//! - promotion (`widen`) and cast checking
//! - size checks for buffers and array initializers

use crate::error::ErrorCode;
use serde::Deserialize;

/// Precision of `FLOAT` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FloatPrecision {
    /// 24 bits: 8 bit exponent, 16 bit mantissa.
    #[default]
    Fast,
    /// 32 bits: 8 bit exponent, 24 bit mantissa.
    Single,
}

impl FloatPrecision {
    pub fn bits(&self) -> u32 {
        match self {
            FloatPrecision::Fast => 24,
            FloatPrecision::Single => 32,
        }
    }

    pub fn bytes(&self) -> usize {
        (self.bits() / 8) as usize
    }
}

/// Type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableType {
    Bit,
    Byte,
    SByte,
    Char,
    Color,
    Thread,
    Word,
    SWord,
    Position,
    Address,
    DWord,
    SDWord,
    Float,
    /// Pointer to a static, length-prefixed string.
    String,
    /// Index of a dynamic string descriptor.
    DString,
    Buffer,
    Array,
    Image,
    Images,
    Sequence,
    Tiles,
    Tileset,
    Tilemap,
    Sprite,
    Music,
}

impl VariableType {
    /// Parse a type keyword of a `DIM ... AS` clause.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let ty = match keyword.to_ascii_uppercase().as_str() {
            "BIT" | "BOOLEAN" => VariableType::Bit,
            "BYTE" => VariableType::Byte,
            "SBYTE" => VariableType::SByte,
            "CHAR" => VariableType::Char,
            "COLOR" | "COLOUR" => VariableType::Color,
            "THREAD" => VariableType::Thread,
            "WORD" => VariableType::Word,
            "SWORD" | "INTEGER" | "INT" => VariableType::SWord,
            "POSITION" => VariableType::Position,
            "ADDRESS" => VariableType::Address,
            "DWORD" => VariableType::DWord,
            "SDWORD" | "LONG" => VariableType::SDWord,
            "FLOAT" => VariableType::Float,
            "STRING" => VariableType::DString,
            "BUFFER" => VariableType::Buffer,
            "IMAGE" => VariableType::Image,
            "IMAGES" => VariableType::Images,
            "SEQUENCE" => VariableType::Sequence,
            "TILES" => VariableType::Tiles,
            "TILESET" => VariableType::Tileset,
            "TILEMAP" => VariableType::Tilemap,
            "SPRITE" => VariableType::Sprite,
            "MUSIC" => VariableType::Music,
            _ => return None,
        };
        Some(ty)
    }

    /// Name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            VariableType::Bit => "BIT",
            VariableType::Byte => "BYTE",
            VariableType::SByte => "SIGNED BYTE",
            VariableType::Char => "CHAR",
            VariableType::Color => "COLOR",
            VariableType::Thread => "THREAD",
            VariableType::Word => "WORD",
            VariableType::SWord => "SIGNED WORD",
            VariableType::Position => "POSITION",
            VariableType::Address => "ADDRESS",
            VariableType::DWord => "DWORD",
            VariableType::SDWord => "SIGNED DWORD",
            VariableType::Float => "FLOAT",
            VariableType::String => "STRING",
            VariableType::DString => "DSTRING",
            VariableType::Buffer => "BUFFER",
            VariableType::Array => "ARRAY",
            VariableType::Image => "IMAGE",
            VariableType::Images => "IMAGES",
            VariableType::Sequence => "SEQUENCE",
            VariableType::Tiles => "TILES",
            VariableType::Tileset => "TILESET",
            VariableType::Tilemap => "TILEMAP",
            VariableType::Sprite => "SPRITE",
            VariableType::Music => "MUSIC",
        }
    }

    /// Width in bits of the value, for scalar types.
    ///
    /// Resource types are addressed through a 16 bit pointer, dynamic
    /// strings through an 8 bit descriptor index. Arrays have no width.
    pub fn bits(&self, precision: FloatPrecision) -> u32 {
        match self {
            VariableType::Bit => 1,
            VariableType::Byte
            | VariableType::SByte
            | VariableType::Char
            | VariableType::Color
            | VariableType::Thread
            | VariableType::DString => 8,
            VariableType::Word
            | VariableType::SWord
            | VariableType::Position
            | VariableType::Address
            | VariableType::String
            | VariableType::Buffer
            | VariableType::Image
            | VariableType::Images
            | VariableType::Sequence
            | VariableType::Tiles
            | VariableType::Tileset
            | VariableType::Tilemap
            | VariableType::Music => 16,
            VariableType::Sprite => 8,
            VariableType::DWord | VariableType::SDWord => 32,
            VariableType::Float => precision.bits(),
            VariableType::Array => 0,
        }
    }

    /// Storage size in bytes. A `BIT` occupies a slot of a shared byte.
    pub fn size(&self, precision: FloatPrecision) -> usize {
        match self {
            VariableType::Bit => 0,
            VariableType::Array => 0,
            other => (other.bits(precision) / 8) as usize,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            VariableType::Bit
                | VariableType::Byte
                | VariableType::SByte
                | VariableType::Char
                | VariableType::Color
                | VariableType::Thread
                | VariableType::Word
                | VariableType::SWord
                | VariableType::Position
                | VariableType::Address
                | VariableType::DWord
                | VariableType::SDWord
                | VariableType::Sprite
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, VariableType::Float)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_string(&self) -> bool {
        matches!(self, VariableType::String | VariableType::DString)
    }

    /// Types whose value is the address of compiled-in data.
    pub fn is_resource(&self) -> bool {
        matches!(
            self,
            VariableType::Buffer
                | VariableType::Image
                | VariableType::Images
                | VariableType::Sequence
                | VariableType::Tiles
                | VariableType::Tileset
                | VariableType::Tilemap
                | VariableType::Music
        )
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            VariableType::SByte | VariableType::SWord | VariableType::SDWord | VariableType::Float
        )
    }

    /// The signed type of the same width.
    pub fn signed(&self) -> VariableType {
        match self {
            VariableType::Bit
            | VariableType::Byte
            | VariableType::Char
            | VariableType::Color
            | VariableType::Thread
            | VariableType::Sprite => VariableType::SByte,
            VariableType::Word | VariableType::Position | VariableType::Address => {
                VariableType::SWord
            }
            VariableType::DWord => VariableType::SDWord,
            other => *other,
        }
    }

    /// The unsigned type of the same width.
    pub fn unsigned(&self) -> VariableType {
        match self {
            VariableType::SByte => VariableType::Byte,
            VariableType::SWord => VariableType::Word,
            VariableType::SDWord => VariableType::DWord,
            other => *other,
        }
    }

    /// Smallest integer type able to hold `value`.
    pub fn for_constant(value: i64) -> VariableType {
        match value {
            0..=0xFF => VariableType::Byte,
            -0x80..=-1 => VariableType::SByte,
            0x100..=0xFFFF => VariableType::Word,
            -0x8000..=-0x81 => VariableType::SWord,
            v if v >= 0 => VariableType::DWord,
            _ => VariableType::SDWord,
        }
    }

    /// Range of values representable by an integer type.
    pub fn range(&self) -> Option<(i64, i64)> {
        match self {
            VariableType::Bit => Some((0, 1)),
            VariableType::SByte => Some((-0x80, 0x7F)),
            VariableType::SWord => Some((-0x8000, 0x7FFF)),
            VariableType::SDWord => Some((-0x8000_0000, 0x7FFF_FFFF)),
            VariableType::DWord => Some((0, 0xFFFF_FFFF)),
            t if t.is_integer() && t.bits(FloatPrecision::Fast) == 8 => Some((0, 0xFF)),
            t if t.is_integer() && t.bits(FloatPrecision::Fast) == 16 => Some((0, 0xFFFF)),
            _ => None,
        }
    }
}

impl std::fmt::Display for VariableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A type together with its float precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    pub ty: VariableType,
    pub precision: FloatPrecision,
}

impl TypeInfo {
    pub fn new(ty: VariableType, precision: FloatPrecision) -> Self {
        Self { ty, precision }
    }

    pub fn bits(&self) -> u32 {
        self.ty.bits(self.precision)
    }
}

/// Promote two operand types to the type of the result.
///
/// A float operand makes the result a float of the wider precision.
/// Otherwise the wider type wins; at equal width a signed operand makes
/// the result signed.
pub fn widen(a: TypeInfo, b: TypeInfo) -> TypeInfo {
    if a.ty.is_float() || b.ty.is_float() {
        let precision = match (a.ty.is_float(), b.ty.is_float()) {
            (true, true) => a.precision.max(b.precision),
            (true, false) => a.precision,
            _ => b.precision,
        };
        return TypeInfo::new(VariableType::Float, precision);
    }
    let (wa, wb) = (a.bits(), b.bits());
    let ty = if wa > wb {
        a.ty
    } else if wb > wa {
        b.ty
    } else if a.ty.is_signed() || b.ty.is_signed() {
        a.ty.signed()
    } else {
        a.ty
    };
    let ty = if ty == VariableType::Bit {
        VariableType::Byte
    } else {
        ty
    };
    TypeInfo::new(ty, a.precision)
}

/// How a value is converted by a cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    /// Same representation; a plain move.
    Same,
    /// Widening integer conversion, with sign extension when the source is signed.
    Widen,
    /// Narrowing integer conversion; the caller warns.
    Narrow,
    IntegerToFloat,
    FloatToInteger,
    BufferToString,
    StringToString,
}

/// Decide how `from` converts to `to`.
pub fn check_cast(from: TypeInfo, to: TypeInfo) -> Result<CastKind, ErrorCode> {
    if from.ty.is_float() && to.ty.is_float() {
        return if from.precision == to.precision {
            Ok(CastKind::Same)
        } else {
            Err(ErrorCode::FloatPrecisionMismatch)
        };
    }
    if from.ty.is_integer() && to.ty.is_float() {
        return Ok(CastKind::IntegerToFloat);
    }
    if from.ty.is_float() && to.ty.is_integer() {
        return Ok(CastKind::FloatToInteger);
    }
    if from.ty.is_integer() && to.ty.is_integer() {
        let (wf, wt) = (from.bits(), to.bits());
        return Ok(if wf == wt {
            CastKind::Same
        } else if wf < wt {
            CastKind::Widen
        } else {
            CastKind::Narrow
        });
    }
    if from.ty.is_string() && to.ty.is_string() {
        return Ok(if from.ty == to.ty {
            CastKind::Same
        } else {
            CastKind::StringToString
        });
    }
    if from.ty == VariableType::Buffer && to.ty.is_string() {
        return Ok(CastKind::BufferToString);
    }
    if from.ty == to.ty {
        return Ok(CastKind::Same);
    }
    // Resources are interchangeable with plain addresses.
    if (from.ty.is_resource() && matches!(to.ty, VariableType::Address | VariableType::Word))
        || (to.ty.is_resource() && matches!(from.ty, VariableType::Address | VariableType::Word))
    {
        return Ok(CastKind::Same);
    }
    Err(ErrorCode::CannotCast)
}

/// A BUFFER can become a STRING only if it fits the length byte.
pub fn check_buffer_to_string(size: usize) -> Result<(), ErrorCode> {
    if size > 255 {
        Err(ErrorCode::BufferTooLargeForString)
    } else {
        Ok(())
    }
}

/// An array constant list must provide exactly one value per element.
pub fn check_array_init(elements: usize, given: usize) -> Result<(), ErrorCode> {
    if elements == given {
        Ok(())
    } else {
        Err(ErrorCode::ArrayInitCountMismatch)
    }
}

/// An array loaded from a file must match the declared size in bytes.
pub fn check_array_file(array_size: usize, file_size: usize) -> Result<(), ErrorCode> {
    if array_size == file_size {
        Ok(())
    } else {
        Err(ErrorCode::ArrayFileSizeMismatch)
    }
}

/// Encode a float in the runtime's format.
///
/// The first byte is the exponent biased by 128 (zero for the value 0);
/// the mantissa follows most significant byte first, normalized so that
/// the implicit leading one is replaced by the sign bit.
pub fn encode_float(value: f64, precision: FloatPrecision) -> Vec<u8> {
    let mantissa_bytes = precision.bytes() - 1;
    let mut bytes = vec![0u8; precision.bytes()];
    if value == 0.0 || !value.is_finite() {
        return bytes;
    }
    let negative = value < 0.0;
    let mut m = value.abs();
    let mut exponent: i32 = 0;
    while m >= 1.0 {
        m /= 2.0;
        exponent += 1;
    }
    while m < 0.5 {
        m *= 2.0;
        exponent -= 1;
    }
    let bits = (mantissa_bytes * 8) as i32;
    let mut scaled = (m * 2f64.powi(bits)).round() as u64;
    if scaled >> bits != 0 {
        scaled >>= 1;
        exponent += 1;
    }
    let biased = exponent + 128;
    if biased <= 0 {
        return bytes;
    }
    bytes[0] = biased.min(255) as u8;
    for i in 0..mantissa_bytes {
        bytes[1 + i] = (scaled >> (8 * (mantissa_bytes - 1 - i))) as u8;
    }
    bytes[1] &= 0x7F;
    if negative {
        bytes[1] |= 0x80;
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(ty: VariableType) -> TypeInfo {
        TypeInfo::new(ty, FloatPrecision::Fast)
    }

    #[test]
    fn test_widths() {
        assert_eq!(VariableType::Bit.bits(FloatPrecision::Fast), 1);
        assert_eq!(VariableType::Color.bits(FloatPrecision::Fast), 8);
        assert_eq!(VariableType::Position.bits(FloatPrecision::Fast), 16);
        assert_eq!(VariableType::SDWord.bits(FloatPrecision::Fast), 32);
        assert_eq!(VariableType::Float.bits(FloatPrecision::Fast), 24);
        assert_eq!(VariableType::Float.bits(FloatPrecision::Single), 32);
    }

    #[test]
    fn test_signed_mapping_roundtrip() {
        for ty in [VariableType::Byte, VariableType::Word, VariableType::DWord] {
            assert!(ty.signed().is_signed());
            assert_eq!(ty.signed().unsigned(), ty);
        }
    }

    #[test]
    fn test_widen() {
        assert_eq!(
            widen(t(VariableType::Byte), t(VariableType::Word)).ty,
            VariableType::Word
        );
        assert_eq!(
            widen(t(VariableType::Byte), t(VariableType::SByte)).ty,
            VariableType::SByte
        );
        let single = TypeInfo::new(VariableType::Float, FloatPrecision::Single);
        let w = widen(t(VariableType::Float), single);
        assert_eq!(w.ty, VariableType::Float);
        assert_eq!(w.precision, FloatPrecision::Single);
        assert_eq!(
            widen(t(VariableType::DWord), t(VariableType::Float)).ty,
            VariableType::Float
        );
    }

    #[test]
    fn test_cast_rules() {
        assert_eq!(
            check_cast(t(VariableType::Word), t(VariableType::Byte)),
            Ok(CastKind::Narrow)
        );
        assert_eq!(
            check_cast(t(VariableType::Byte), t(VariableType::SDWord)),
            Ok(CastKind::Widen)
        );
        assert_eq!(
            check_cast(
                t(VariableType::Float),
                TypeInfo::new(VariableType::Float, FloatPrecision::Single)
            ),
            Err(ErrorCode::FloatPrecisionMismatch)
        );
        assert_eq!(
            check_cast(t(VariableType::DString), t(VariableType::Byte)),
            Err(ErrorCode::CannotCast)
        );
    }

    #[test]
    fn test_size_checks() {
        assert!(check_buffer_to_string(255).is_ok());
        assert_eq!(
            check_buffer_to_string(256),
            Err(ErrorCode::BufferTooLargeForString)
        );
        assert_eq!(
            check_array_init(4, 3),
            Err(ErrorCode::ArrayInitCountMismatch)
        );
        assert_eq!(check_array_file(8, 9), Err(ErrorCode::ArrayFileSizeMismatch));
    }

    #[test]
    fn test_constant_types() {
        assert_eq!(VariableType::for_constant(10), VariableType::Byte);
        assert_eq!(VariableType::for_constant(-1), VariableType::SByte);
        assert_eq!(VariableType::for_constant(1000), VariableType::Word);
        assert_eq!(VariableType::for_constant(-1000), VariableType::SWord);
        assert_eq!(VariableType::for_constant(70000), VariableType::DWord);
    }

    #[test]
    fn test_encode_float() {
        assert_eq!(encode_float(0.0, FloatPrecision::Single), vec![0, 0, 0, 0]);
        assert_eq!(
            encode_float(1.0, FloatPrecision::Single),
            vec![0x81, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            encode_float(-1.0, FloatPrecision::Single),
            vec![0x81, 0x80, 0x00, 0x00]
        );
        assert_eq!(encode_float(10.0, FloatPrecision::Fast), vec![0x84, 0x20, 0x00]);
        assert_eq!(encode_float(0.5, FloatPrecision::Fast), vec![0x80, 0x00, 0x00]);
    }
}
