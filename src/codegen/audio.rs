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

//! VOLUME, PLAY and SOUND.

use super::variables::VariableEmitter;
use crate::backend::MachineOp;
use crate::environment::Environment;
use crate::error::{ErrorCode, Result};
use crate::symbols::VariableId;
use crate::types::VariableType;

const MAX_VOLUME: i64 = 15;

/// Extension trait for the sound statements.
pub trait AudioEmitter {
    /// `VOLUME level`, 0 to 15.
    fn volume(&mut self, level: VariableId) -> Result<()>;

    /// `PLAY note, duration [ON voices]`.
    fn play(&mut self, note: VariableId, duration: VariableId, voices: Option<VariableId>) -> Result<()>;

    /// `SOUND ON [voices]` / `SOUND OFF [voices]`.
    fn sound(&mut self, on: bool, voices: Option<VariableId>) -> Result<()>;
}

impl Environment {
    /// Bitmask of the voices to drive; all of them when absent.
    fn voice_mask(&mut self, voices: Option<VariableId>) -> Result<VariableId> {
        let count = self.target.machine.voices();
        let all = (1i64 << count) - 1;
        let Some(voices) = voices else {
            return Ok(self.typed_constant(all, VariableType::Byte));
        };
        self.expect_numeric(voices)?;
        if let Some(mask) = self.constant_of(voices) {
            if mask <= 0 || mask & !all != 0 {
                return Err(self.error(
                    ErrorCode::VoiceOutOfRange,
                    format!("voices {:#b} outside the {} of {}", mask, count, self.target.machine.name()),
                ));
            }
        }
        Ok(voices)
    }
}

impl AudioEmitter for Environment {
    fn volume(&mut self, level: VariableId) -> Result<()> {
        self.expect_numeric(level)?;
        if let Some(value) = self.constant_of(level) {
            if !(0..=MAX_VOLUME).contains(&value) {
                return Err(self.error(
                    ErrorCode::ValueOutOfRange,
                    format!("volume {} is outside 0..{}", value, MAX_VOLUME),
                ));
            }
        }
        self.machine_call(MachineOp::Volume, &[level]).map(|_| ())
    }

    fn play(&mut self, note: VariableId, duration: VariableId, voices: Option<VariableId>) -> Result<()> {
        self.expect_numeric(note)?;
        self.expect_numeric(duration)?;
        let voices = self.voice_mask(voices)?;
        self.machine_call(MachineOp::Play, &[voices, note, duration]).map(|_| ())
    }

    fn sound(&mut self, on: bool, voices: Option<VariableId>) -> Result<()> {
        let op = if on { MachineOp::SoundOn } else { MachineOp::SoundOff };
        let voices = self.voice_mask(voices)?;
        if self.target.machine.routine(op).is_some() {
            self.load(voices, "AUDIOVOICES", 1);
        }
        self.machine_call(op, &[]).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{c64, calls, code, coco};
    use super::*;

    #[test]
    fn test_play_defaults_to_every_voice() {
        let mut env = c64();
        let note = env.integer_constant(40);
        let duration = env.integer_constant(50);
        env.play(note, duration, None).unwrap();
        let lines = code(&env);
        assert!(lines.contains(&"LDA #$07".to_string()));
        assert!(lines.contains(&"STA AUDIOVOICES".to_string()));
        assert!(lines.contains(&"STA AUDIODURATION+1".to_string()));
        assert_eq!(calls(&env, "AUDIOPLAY"), 1);
    }

    #[test]
    fn test_voice_outside_machine_is_rejected() {
        let mut env = coco();
        let note = env.integer_constant(40);
        let mask = env.integer_constant(2);
        let err = env.play(note, note, Some(mask)).unwrap_err();
        assert_eq!(err.code, ErrorCode::VoiceOutOfRange);
    }

    #[test]
    fn test_volume_range() {
        let mut env = c64();
        let loud = env.integer_constant(16);
        assert_eq!(env.volume(loud).unwrap_err().code, ErrorCode::ValueOutOfRange);
        let level = env.define_variable("V", VariableType::Byte).unwrap();
        env.volume(level).unwrap();
        assert_eq!(calls(&env, "AUDIOVOLUME"), 1);
    }

    #[test]
    fn test_sound_off_selected_voices() {
        let mut env = c64();
        let mask = env.integer_constant(2);
        env.sound(false, Some(mask)).unwrap();
        env.sound(true, None).unwrap();
        assert_eq!(calls(&env, "AUDIOOFF"), 1);
        assert_eq!(calls(&env, "AUDIOON"), 1);
    }
}
