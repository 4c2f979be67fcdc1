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

//! Invariants of the compiler tables, checked on generated inputs.

use proptest::prelude::*;
use ugbc::assets::palette::{extract, nearest, reverse_index, PaletteOptions};
use ugbc::assets::tiles::TileDescriptors;
use ugbc::assets::Offsettings;
use ugbc::backend::Target;
use ugbc::control::{ControlStack, FrameKind};
use ugbc::emitter::syntax::CA65;
use ugbc::memory::{BankType, MemoryModel};
use ugbc::symbols::{SymbolTables, VariableId};
use ugbc::types::{FloatPrecision, VariableType};
use ugbc::{compile, CompilerOptions, ErrorCode, Span, TargetKind};

const INTEGER_TYPES: &[VariableType] = &[
    VariableType::Byte,
    VariableType::SByte,
    VariableType::Word,
    VariableType::SWord,
    VariableType::DWord,
    VariableType::SDWord,
];

fn integer_type() -> impl Strategy<Value = VariableType> {
    prop::sample::select(INTEGER_TYPES)
}

/// A block opener, its closer and the code of the error raised when the
/// closer is missing.
#[derive(Debug, Clone, Copy)]
enum Block {
    Do,
    While,
    Repeat,
    For,
    If,
}

impl Block {
    fn opener(&self, depth: usize) -> String {
        match self {
            Block::Do => "DO".to_string(),
            Block::While => "WHILE 1".to_string(),
            Block::Repeat => "REPEAT".to_string(),
            Block::For => format!("FOR I{} = 1 TO 2", depth),
            Block::If => "IF 1 THEN".to_string(),
        }
    }

    fn closer(&self) -> &'static str {
        match self {
            Block::Do => "LOOP",
            Block::While => "WEND",
            Block::Repeat => "UNTIL 1",
            Block::For => "NEXT",
            Block::If => "ENDIF",
        }
    }

    fn unclosed(&self) -> ErrorCode {
        match self {
            Block::Do => ErrorCode::DoWithoutLoop,
            Block::While => ErrorCode::WhileWithoutWend,
            Block::Repeat => ErrorCode::RepeatWithoutUntil,
            Block::For => ErrorCode::ForWithoutNext,
            Block::If => ErrorCode::IfWithoutEndif,
        }
    }
}

fn block() -> impl Strategy<Value = Block> {
    prop_oneof![
        Just(Block::Do),
        Just(Block::While),
        Just(Block::Repeat),
        Just(Block::For),
        Just(Block::If),
    ]
}

/// Nested blocks around a `CLS`, one statement per line.
fn nested(blocks: &[Block]) -> Vec<String> {
    let mut lines: Vec<String> = blocks.iter().enumerate().map(|(d, b)| b.opener(d)).collect();
    lines.push("CLS".to_string());
    lines.extend(blocks.iter().rev().map(|b| b.closer().to_string()));
    lines
}

proptest! {
    #[test]
    fn prop_define_variable_is_idempotent(
        name in "[A-Z][A-Z0-9]{0,6}",
        ty in integer_type(),
        other in integer_type(),
    ) {
        let mut symbols = SymbolTables::new();
        let id = symbols.define_variable(&name, ty, FloatPrecision::Fast).unwrap();
        prop_assert_eq!(symbols.retrieve(&name).unwrap(), id);
        prop_assert_eq!(symbols.variable(id).var_type, ty);

        let count = symbols.variables().count();
        prop_assert_eq!(symbols.define_variable(&name, ty, FloatPrecision::Fast).unwrap(), id);
        prop_assert_eq!(symbols.variables().count(), count);

        let redefined = symbols.define_variable(&name, other, FloatPrecision::Fast);
        if other == ty {
            prop_assert!(redefined.is_ok());
        } else {
            prop_assert_eq!(redefined.unwrap_err().code, ErrorCode::VariableRedefined);
        }
    }

    #[test]
    fn prop_released_temporary_is_reused(ty in integer_type(), held in 0usize..4) {
        let mut symbols = SymbolTables::new();
        for _ in 0..held {
            symbols.temporary(ty, FloatPrecision::Fast, "held");
        }
        let first = symbols.temporary(ty, FloatPrecision::Fast, "first");
        let name = symbols.variable(first).real_name.clone();
        symbols.release(first);
        let second = symbols.temporary(ty, FloatPrecision::Fast, "second");
        prop_assert_eq!(&symbols.variable(second).real_name, &name);
    }

    #[test]
    fn prop_well_formed_blocks_compile(blocks in prop::collection::vec(block(), 1..6)) {
        let source = nested(&blocks).join("\n");
        let result = compile(&source, CompilerOptions::default(), TargetKind::C64);
        prop_assert!(result.is_ok(), "{}: {:?}", source, result.err().map(|e| e.to_string()));
    }

    #[test]
    fn prop_missing_closer_names_the_opener(
        blocks in prop::collection::vec(block(), 1..6),
        blank in 0usize..3,
    ) {
        let mut lines = vec![String::new(); blank];
        lines.extend(nested(&blocks));
        lines.pop();
        let source = lines.join("\n");
        let error = compile(&source, CompilerOptions::default(), TargetKind::C64).unwrap_err();
        prop_assert_eq!(error.code, blocks[0].unclosed());
        let expected_line = format!("line {}", blank + 1);
        prop_assert!(error.message.contains(&expected_line), "{}", error.message);
    }

    #[test]
    fn prop_exit_targets_the_kth_loop(depth in 1usize..8, k in 1usize..9) {
        let mut stack = ControlStack::new();
        let mut ends = Vec::new();
        for level in 0..depth {
            let frame = stack.push(FrameKind::Do, &format!("_do{}", level), None, level + 1, Span::default());
            ends.push(frame.end_label.clone());
        }
        match stack.exit_label(k) {
            Ok(label) => {
                prop_assert!(k <= depth);
                prop_assert_eq!(&label, &ends[depth - k]);
            }
            Err(error) => {
                prop_assert!(k > depth);
                prop_assert_eq!(error.code, ErrorCode::ExitBeyondLoops);
            }
        }
    }

    #[test]
    fn prop_exit_past_the_outermost_loop_fails(depth in 1usize..5) {
        let mut source = "DO\n".repeat(depth);
        source.push_str(&format!("EXIT {}\n", depth + 1));
        source.push_str(&"LOOP\n".repeat(depth));
        let error = compile(&source, CompilerOptions::default(), TargetKind::C64).unwrap_err();
        prop_assert_eq!(error.code, ErrorCode::ExitBeyondLoops);

        let mut source = "DO\n".repeat(depth);
        source.push_str(&format!("EXIT {}\n", depth));
        source.push_str(&"LOOP\n".repeat(depth));
        prop_assert!(compile(&source, CompilerOptions::default(), TargetKind::C64).is_ok());
    }

    #[test]
    fn prop_palette_keeps_every_pixel(
        choices in prop::collection::vec(0usize..16, 1..64),
        budget in 1usize..5,
    ) {
        let target = Target::new(TargetKind::C64);
        let hardware = target.machine.palette();
        // At most `budget` distinct colors.
        let colors: Vec<usize> = choices.iter().map(|c| c % budget).collect();
        let pixels: Vec<[u8; 4]> = colors
            .iter()
            .map(|&c| {
                let [r, g, b] = hardware[c].rgb;
                [r, g, b, 255]
            })
            .collect();
        let (palette, indices) = extract(&pixels, hardware, budget, &PaletteOptions::default()).unwrap();
        prop_assert!(palette.len() <= budget);
        for (pixel, index) in pixels.iter().zip(&indices) {
            let matched = nearest(hardware, [pixel[0], pixel[1], pixel[2]]).unwrap();
            let slot = reverse_index(&palette, matched.index).unwrap();
            prop_assert_eq!(slot, *index as usize);
        }
    }

    #[test]
    fn prop_tiles_are_deduplicated(data in prop::array::uniform8(any::<u8>()), bit in 0usize..64) {
        let mut tiles = TileDescriptors::new(0, 255);
        let first = tiles.allocate(&data).unwrap();
        prop_assert_eq!(tiles.allocate(&data).unwrap(), first);

        let mut flipped = data;
        flipped[bit / 8] ^= 1 << (bit % 8);
        prop_assert_ne!(tiles.allocate(&flipped).unwrap(), first);
    }

    #[test]
    fn prop_offset_table_strides(size in 1usize..512, frames in 1usize..32) {
        let mut offsets = Offsettings::new();
        offsets.register(size, frames, VariableId(0), false).unwrap();
        let table = offsets.get(size).unwrap();
        let expected: Vec<usize> = (0..frames).map(|i| i * size).collect();
        prop_assert_eq!(table.values(), expected);

        let words: usize = offsets
            .lines(&CA65)
            .iter()
            .take_while(|l| l.text != "OFFSETTABLES")
            .filter(|l| l.text.starts_with(".word"))
            .map(|l| l.text.matches(',').count() + 1)
            .sum();
        prop_assert_eq!(words, frames);
    }

    #[test]
    fn prop_bank_remains_track_allocations(
        space in 1usize..512,
        sizes in prop::collection::vec(0usize..128, 0..16),
    ) {
        let mut memory = MemoryModel::new();
        let id = memory.add_bank("DATA", BankType::Data, None, space);
        let mut total = 0;
        for (i, size) in sizes.iter().enumerate() {
            if memory.bank_mut(id).allocate(&format!("s{}", i), *size).is_ok() {
                total += size;
            }
            let bank = memory.bank(id);
            prop_assert_eq!(bank.space - bank.remains, total);
            prop_assert_eq!(bank.allocated(), total);
        }
    }
}
