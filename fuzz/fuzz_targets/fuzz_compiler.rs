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

//! Fuzz target for the complete ugBC compiler pipeline.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_compiler
//!
//! Run for a specific duration:
//!   cargo +nightly fuzz run fuzz_compiler -- -max_total_time=60

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ugbc::{CompilerOptions, TargetKind};

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    target: u8,
    peephole_limit: u8,
    explicit: bool,
    source: &'a str,
}

fuzz_target!(|input: Input| {
    let target = TargetKind::ALL[input.target as usize % TargetKind::ALL.len()];
    let options = CompilerOptions {
        peephole_limit: usize::from(input.peephole_limit % 8),
        explicit: input.explicit,
        ..CompilerOptions::default()
    };
    let _ = ugbc::compile(input.source, options, target);
});
