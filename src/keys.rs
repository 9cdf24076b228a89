// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use tracing::debug;

use crate::config::{Config, PinkyMode};

/// The note sounded by the open fingering before any adjustment (D4).
pub const BASE_NOTE: i32 = 62;

/// Semitone offset of each fingering key: the three valves, the left-hand
/// index key and the three trill keys.
const KEY_OFFSETS: [i32; 7] = [-2, -1, -3, -5, 2, 1, 4];

/// Ticks of rotator inactivity after which a priority-1 cycle restarts.
const ROTATION_RESET_TICKS: u32 = 2000;

const LINE_COUNT: usize = 10;

/// Raw key levels for one tick: seven fingering keys plus the special, pinky
/// and half-bend modifier keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Keys {
    pub k1: bool,
    pub k2: bool,
    pub k3: bool,
    pub k4: bool,
    pub k5: bool,
    pub k6: bool,
    pub k7: bool,
    pub special: bool,
    pub pinky: bool,
    pub half_bend: bool,
}

impl Keys {
    /// The 7-bit fingering pattern, K1 in the low bit.
    pub fn fingering_mask(&self) -> u8 {
        let fingering = [
            self.k1, self.k2, self.k3, self.k4, self.k5, self.k6, self.k7,
        ];
        fingering
            .iter()
            .enumerate()
            .fold(0, |mask, (i, held)| mask | (u8::from(*held) << i))
    }

    fn levels(&self) -> [bool; LINE_COUNT] {
        [
            self.k1,
            self.k2,
            self.k3,
            self.k4,
            self.k5,
            self.k6,
            self.k7,
            self.special,
            self.pinky,
            self.half_bend,
        ]
    }

    fn from_levels(levels: [bool; LINE_COUNT]) -> Keys {
        Keys {
            k1: levels[0],
            k2: levels[1],
            k3: levels[2],
            k4: levels[3],
            k5: levels[4],
            k6: levels[5],
            k7: levels[6],
            special: levels[7],
            pinky: levels[8],
            half_bend: levels[9],
        }
    }
}

/// Debounces a single key line: a candidate level must persist for the whole
/// window before it becomes the stable level.
#[derive(Debug, Clone, Copy, Default)]
struct Debouncer {
    stable: bool,
    candidate: bool,
    ticks: u16,
}

impl Debouncer {
    fn update(&mut self, level: bool, window: u16) -> bool {
        if level == self.stable {
            self.candidate = level;
            self.ticks = 0;
            return self.stable;
        }

        if level != self.candidate {
            self.candidate = level;
            self.ticks = 0;
        }
        self.ticks += 1;
        if self.ticks >= window.max(1) {
            self.stable = level;
            self.ticks = 0;
        }
        self.stable
    }
}

/// Immutable mapping from a 7-key fingering pattern to a semitone offset.
/// Valve-style fingerings are additive, so the table covers every
/// combination.
pub struct PitchOffsetTable {
    offsets: [i8; 128],
}

impl PitchOffsetTable {
    pub fn standard() -> PitchOffsetTable {
        let mut offsets = [0i8; 128];
        for (mask, entry) in offsets.iter_mut().enumerate() {
            let mut offset = 0i32;
            for (key, key_offset) in KEY_OFFSETS.iter().enumerate() {
                if mask & (1 << key) != 0 {
                    offset += key_offset;
                }
            }
            *entry = offset as i8;
        }
        PitchOffsetTable { offsets }
    }

    pub fn offset(&self, mask: u8) -> i32 {
        self.offsets[(mask & 0x7f) as usize] as i32
    }
}

/// Rotation position for the mono chord-cycling mode. The index starts on
/// the last slot so the first articulation's advance lands on the first.
#[derive(Debug)]
struct RotationState {
    index: usize,
    idle_ticks: u32,
}

impl Default for RotationState {
    fn default() -> RotationState {
        RotationState {
            index: 3,
            idle_ticks: 0,
        }
    }
}

/// Debounces the key lines, resolves the fingering to a note number and
/// applies rotation, quick-transpose and the global registers.
pub struct KeyResolver {
    table: PitchOffsetTable,
    lines: [Debouncer; LINE_COUNT],
    stable: Keys,
    rotation: RotationState,
}

impl KeyResolver {
    pub fn new() -> KeyResolver {
        KeyResolver {
            table: PitchOffsetTable::standard(),
            lines: [Debouncer::default(); LINE_COUNT],
            stable: Keys::default(),
            rotation: RotationState::default(),
        }
    }

    /// Debounces this tick's raw key levels. Must run before the note state
    /// machine and the controller engine consume pitch.
    ///
    /// Releasing the special key with a trill combination held recalls one of
    /// the quick patch slots; the selected zero-based program is returned.
    pub fn update(&mut self, raw: Keys, note_sounding: bool, config: &Config) -> Option<u8> {
        let special_was_held = self.stable.special;

        let window = config.deglitch.min(70);
        let levels = raw.levels();
        let mut stable = [false; LINE_COUNT];
        for (i, line) in self.lines.iter_mut().enumerate() {
            stable[i] = line.update(levels[i], window);
        }
        self.stable = Keys::from_levels(stable);

        if note_sounding {
            self.rotation.idle_ticks = 0;
        } else {
            self.rotation.idle_ticks = self.rotation.idle_ticks.saturating_add(1);
        }

        if special_was_held && !self.stable.special {
            let slot = usize::from(self.stable.k5)
                | (usize::from(self.stable.k6) << 1)
                | (usize::from(self.stable.k7) << 2);
            if slot > 0 {
                let program = config.fast_patch[slot - 1].min(128);
                if program > 0 {
                    debug!(slot, program, "Quick patch recall.");
                    return Some((program - 1) as u8);
                }
            }
        }

        None
    }

    /// The debounced key levels.
    pub fn stable(&self) -> Keys {
        self.stable
    }

    /// Resolves the stable fingering to a MIDI note number, clamped to the
    /// playable range.
    pub fn note(&self, config: &Config) -> u8 {
        let mut note = BASE_NOTE + self.table.offset(self.stable.fingering_mask());
        note += config.semitone_shift();

        if self.stable.pinky {
            match config.pinky_mode() {
                PinkyMode::QuickTransposeDown(interval) => note -= interval as i32,
                PinkyMode::QuickTransposeUp(interval) => note += interval as i32,
                PinkyMode::PitchBendHalving => {}
            }
        }

        if config.rotator_on != 0 {
            note += self.rotation_offset(config);
            note += config.parallel.min(48) as i32 - 24;
        }

        note.clamp(0, 127) as u8
    }

    /// Whether pitch bend magnitude should be halved this tick: the dedicated
    /// half-bend key, or the pinky key in bend-halving mode.
    pub fn half_bend_scaling(&self, config: &Config) -> bool {
        self.stable.half_bend
            || (self.stable.pinky && config.pinky_mode() == PinkyMode::PitchBendHalving)
    }

    /// Advances the rotation cycle. Called once per accepted articulation;
    /// neutral table entries are skipped.
    pub fn advance_rotation(&mut self, config: &Config) {
        if config.rotator_on == 0 {
            return;
        }

        let restart =
            config.priority != 0 && self.rotation.idle_ticks >= ROTATION_RESET_TICKS;
        let mut index = if restart {
            0
        } else {
            (self.rotation.index + 1) % config.rotations.len()
        };

        for _ in 0..config.rotations.len() {
            if config.rotations[index].min(48) != 24 {
                break;
            }
            index = (index + 1) % config.rotations.len();
        }

        self.rotation.index = index;
        self.rotation.idle_ticks = 0;
    }

    fn rotation_offset(&self, config: &Config) -> i32 {
        config.rotations[self.rotation.index].min(48) as i32 - 24
    }
}

impl Default for KeyResolver {
    fn default() -> KeyResolver {
        KeyResolver::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_window(deglitch: u16) -> Config {
        Config {
            deglitch,
            ..Config::default()
        }
    }

    fn settle(resolver: &mut KeyResolver, keys: Keys, ticks: u16, config: &Config) {
        for _ in 0..ticks {
            resolver.update(keys, false, config);
        }
    }

    #[test]
    fn test_fingering_offsets_are_additive() {
        let table = PitchOffsetTable::standard();
        assert_eq!(table.offset(0), 0);
        assert_eq!(table.offset(0b0000001), -2);
        assert_eq!(table.offset(0b0000011), -3);
        assert_eq!(table.offset(0b1110000), 7);
        assert_eq!(table.offset(0b0001111), -11);
    }

    #[test]
    fn test_debounce_rejects_short_flicker() {
        let config = config_with_window(3);
        let mut resolver = KeyResolver::new();

        let pressed = Keys {
            k1: true,
            ..Keys::default()
        };

        // Two ticks of a three-tick window is not enough.
        resolver.update(pressed, false, &config);
        resolver.update(pressed, false, &config);
        resolver.update(Keys::default(), false, &config);
        assert!(!resolver.stable().k1);

        // A full window's worth of ticks is.
        settle(&mut resolver, pressed, 3, &config);
        assert!(resolver.stable().k1);
    }

    #[test]
    fn test_zero_window_accepts_immediately() {
        let config = config_with_window(0);
        let mut resolver = KeyResolver::new();
        resolver.update(
            Keys {
                k2: true,
                ..Keys::default()
            },
            false,
            &config,
        );
        assert!(resolver.stable().k2);
    }

    #[test]
    fn test_note_resolution_with_registers() {
        let mut config = config_with_window(0);
        let mut resolver = KeyResolver::new();

        settle(
            &mut resolver,
            Keys {
                k1: true,
                k2: true,
                ..Keys::default()
            },
            1,
            &config,
        );
        assert_eq!(resolver.note(&config), (BASE_NOTE - 3) as u8);

        config.transpose = 14;
        config.octave = 4;
        assert_eq!(resolver.note(&config), (BASE_NOTE - 3 + 2 + 12) as u8);
    }

    #[test]
    fn test_pinky_quick_transpose() {
        let mut config = config_with_window(0);
        config.pinky_setting = 0; // -12
        let mut resolver = KeyResolver::new();
        settle(
            &mut resolver,
            Keys {
                pinky: true,
                ..Keys::default()
            },
            1,
            &config,
        );
        assert_eq!(resolver.note(&config), (BASE_NOTE - 12) as u8);

        config.pinky_setting = 17; // +5
        assert_eq!(resolver.note(&config), (BASE_NOTE + 5) as u8);

        // Halving mode does not transpose.
        config.pinky_setting = 12;
        assert_eq!(resolver.note(&config), BASE_NOTE as u8);
        assert!(resolver.half_bend_scaling(&config));
    }

    #[test]
    fn test_note_is_clamped_to_midi_range() {
        let mut config = config_with_window(0);
        config.octave = 6;
        config.transpose = 24;
        let mut resolver = KeyResolver::new();
        settle(&mut resolver, Keys::default(), 1, &config);
        let note = resolver.note(&config);
        assert!(note <= 127);
    }

    #[test]
    fn test_fast_patch_recall_on_special_release() {
        let mut config = config_with_window(0);
        config.fast_patch[2] = 42;
        let mut resolver = KeyResolver::new();

        // Hold special plus the K5+K6 trill combination (slot 3).
        let held = Keys {
            special: true,
            k5: true,
            k6: true,
            ..Keys::default()
        };
        assert_eq!(resolver.update(held, false, &config), None);

        // Release the special key, keeping the trills down.
        let released = Keys {
            k5: true,
            k6: true,
            ..Keys::default()
        };
        assert_eq!(resolver.update(released, false, &config), Some(41));

        // The recall fires exactly once.
        assert_eq!(resolver.update(released, false, &config), None);
    }

    #[test]
    fn test_empty_fast_patch_slot_is_ignored() {
        let config = config_with_window(0);
        let mut resolver = KeyResolver::new();
        resolver.update(
            Keys {
                special: true,
                k5: true,
                ..Keys::default()
            },
            false,
            &config,
        );
        assert_eq!(
            resolver.update(
                Keys {
                    k5: true,
                    ..Keys::default()
                },
                false,
                &config
            ),
            None
        );
    }

    #[test]
    fn test_rotation_cycles_and_skips_neutral() {
        let mut config = config_with_window(0);
        config.rotator_on = 1;
        config.rotations = [19, 24, 31, 24]; // -5, neutral, +7, neutral
        let mut resolver = KeyResolver::new();
        settle(&mut resolver, Keys::default(), 1, &config);

        resolver.advance_rotation(&config);
        assert_eq!(resolver.note(&config), (BASE_NOTE - 5) as u8);
        resolver.advance_rotation(&config);
        assert_eq!(resolver.note(&config), (BASE_NOTE + 7) as u8);
        resolver.advance_rotation(&config);
        assert_eq!(resolver.note(&config), (BASE_NOTE - 5) as u8);
    }

    #[test]
    fn test_rotation_parallel_shift() {
        let mut config = config_with_window(0);
        config.rotator_on = 1;
        config.rotations = [24, 24, 24, 24];
        config.parallel = 31; // +7
        let mut resolver = KeyResolver::new();
        settle(&mut resolver, Keys::default(), 1, &config);
        resolver.advance_rotation(&config);
        assert_eq!(resolver.note(&config), (BASE_NOTE + 7) as u8);
    }

    #[test]
    fn test_priority_restart_after_idle_gap() {
        let mut config = config_with_window(0);
        config.rotator_on = 1;
        config.priority = 1;
        config.rotations = [19, 31, 12, 36];
        let mut resolver = KeyResolver::new();

        resolver.advance_rotation(&config);
        resolver.advance_rotation(&config);
        assert_eq!(resolver.note(&config), (BASE_NOTE + 7) as u8);

        // A long silent stretch restarts the cycle at the first entry.
        settle(&mut resolver, Keys::default(), 2500, &config);
        resolver.advance_rotation(&config);
        assert_eq!(resolver.note(&config), (BASE_NOTE - 5) as u8);
    }
}
