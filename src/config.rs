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
use std::fmt;

mod dump;
mod error;
mod store;

pub use dump::{apply_frame, dump_frame, FRAME_LEN, SIGNATURE, VENDOR_ID};
pub use error::ConfigError;
pub use store::{FileNvs, MemoryNvs, Nvs, Store};

/// Full-scale value of the 12-bit sensor ADCs.
pub const SENSOR_MAX: u16 = 4095;

/// Dip switch bit: mirror the breath stream to CC2 for legacy patches.
pub const DIP_LEGACY: u16 = 1 << 0;
/// Dip switch bit: breath CC tracks the full sensor range instead of being
/// gated at the note-on threshold.
pub const DIP_LEGACY_BREATH: u16 = 1 << 1;
/// Dip switch bit: widen the controller deadbands for slow serial transports.
pub const DIP_SLOW_MIDI: u16 = 1 << 2;
/// Dip switch bit: the bite sensor is wired as a touch gate and the auxiliary
/// sensor drives pitch bend.
pub const DIP_BITE_JUMPER: u16 = 1 << 3;

const DIP_MASK: u16 = DIP_LEGACY | DIP_LEGACY_BREATH | DIP_SLOW_MIDI | DIP_BITE_JUMPER;

/// Interpretation of the overloaded pinky key setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinkyMode {
    /// Holding the pinky key transposes down by the given interval.
    QuickTransposeDown(u8),
    /// Holding the pinky key halves the pitch bend magnitude.
    PitchBendHalving,
    /// Holding the pinky key transposes up by the given interval.
    QuickTransposeUp(u8),
}

/// Response curve applied to normalized breath values for both onset velocity
/// and the breath controller stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    Linear,
    /// Rises quickly at low pressure.
    Soft,
    /// Rises slowly at low pressure.
    Hard,
    /// Smoothstep between the two.
    SCurve,
}

impl Curve {
    /// Decodes the persisted curve selector, out-of-range values read as linear.
    pub fn from_setting(setting: u16) -> Curve {
        match setting {
            1 => Curve::Soft,
            2 => Curve::Hard,
            3 => Curve::SCurve,
            _ => Curve::Linear,
        }
    }

    /// Applies the curve shape to a normalized value. All shapes are monotonic
    /// and map [0,1] onto [0,1].
    pub fn apply(&self, x: f32) -> f32 {
        let x = x.clamp(0.0, 1.0);
        match self {
            Curve::Linear => x,
            Curve::Soft => x.sqrt(),
            Curve::Hard => x * x,
            Curve::SCurve => x * x * (3.0 - 2.0 * x),
        }
    }
}

/// The complete instrument configuration.
///
/// Fields are public: the menu UI and the CLI mutate them directly between
/// ticks and call [`Config::sanitize`] afterwards. Every consumer additionally
/// clamps on use, so an out-of-range value read back from storage can never
/// fault the control pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Breath level that starts a note.
    pub breath_thr: u16,
    /// Breath level mapping to full-scale output.
    pub breath_max: u16,
    /// Portamento gate threshold.
    pub portam_thr: u16,
    /// Portamento full-rate level.
    pub portam_max: u16,
    /// Pitch bend sensor window.
    pub pitchb_thr: u16,
    pub pitchb_max: u16,
    /// Auxiliary sensor window.
    pub extrac_thr: u16,
    pub extrac_max: u16,
    /// Capacitive bite touch threshold.
    pub ctouch_thr: u16,
    /// Global transpose in semitones, 12 = no shift.
    pub transpose: u16,
    /// MIDI channel, 1-16.
    pub midi_channel: u16,
    /// Breath routing: Off:MW:BR:VL:EX:MW+:BR+:VL+:EX+:CF.
    pub breath_cc: u16,
    /// Also send channel aftertouch from breath.
    pub breath_at: u16,
    /// 0 = dynamic velocity from the rise slope, 1-127 = fixed.
    pub velocity: u16,
    /// 0 = off, 1 = on, 2 = switched by the bite touch.
    pub portamento: u16,
    /// Pitch bend divider 1-12, 0 = off.
    pub pb_depth: u16,
    /// Auxiliary routing: Off:MW:FP:CF:SP.
    pub extra_ct: u16,
    /// Vibrato depth step, 0 = off.
    pub vibrato: u16,
    /// Debounce/deglitch window in ticks, 0-70 in steps of 5.
    pub deglitch: u16,
    /// Current program, 1-128.
    pub patch: u16,
    /// Octave register, 3 = no shift.
    pub octave: u16,
    /// Response curve selector.
    pub curve: u16,
    /// Velocity sample delay (rise observation window) in ticks.
    pub vel_smp_dl: u16,
    /// Velocity floor bias, 0-9.
    pub vel_bias: u16,
    /// 0-11 quick-transpose down, 12 bend halving, 13-24 quick-transpose up.
    pub pinky_setting: u16,
    /// Virtual dip switches, see the `DIP_*` constants.
    pub dip_sw_bits: u16,
    /// Rotator restart behavior: 1 restarts the cycle after an idle gap.
    pub priority: u16,
    /// Vibrato sensitivity, 1-12.
    pub vib_sens: u16,
    /// Vibrato return (decay) speed, 0-4.
    pub vib_retn: u16,
    /// Vibrato squelch band, 1-30.
    pub vib_squelch: u16,
    /// First vibrato half-cycle direction, 0 down, 1 up.
    pub vib_direction: u16,
    /// Quick patch slots recalled with the special key, 0 = empty.
    pub fast_patch: [u16; 7],
    /// Rotator enable.
    pub rotator_on: u16,
    /// Rotation offsets in semitones, stored with a +24 offset.
    pub rotations: [u16; 4],
    /// Parallel interval in semitones, stored with a +24 offset.
    pub parallel: u16,
}

/// Neutral stored value for rotation and parallel offsets.
pub const OFFSET_NEUTRAL: u16 = 24;

/// Number of persisted u16 fields.
const FIELD_COUNT: usize = 44;

impl Config {
    /// Size of the packed configuration record in bytes.
    pub const RECORD_LEN: usize = FIELD_COUNT * 2;

    /// The vibrato direction value meaning "first half-cycle goes up".
    pub const VIB_UP: u16 = 1;

    /// Clamps every field into its documented range. Threshold/maximum pairs
    /// are additionally forced into ascending order so scaling never divides
    /// by zero.
    pub fn sanitize(&mut self) {
        self.breath_thr = self.breath_thr.min(SENSOR_MAX);
        self.breath_max = self.breath_max.min(SENSOR_MAX);
        self.portam_thr = self.portam_thr.min(SENSOR_MAX);
        self.portam_max = self.portam_max.min(SENSOR_MAX);
        self.pitchb_thr = self.pitchb_thr.min(SENSOR_MAX);
        self.pitchb_max = self.pitchb_max.min(SENSOR_MAX);
        self.extrac_thr = self.extrac_thr.min(SENSOR_MAX);
        self.extrac_max = self.extrac_max.min(SENSOR_MAX);
        self.ctouch_thr = self.ctouch_thr.min(SENSOR_MAX);
        if self.breath_max <= self.breath_thr {
            self.breath_max = (self.breath_thr + 1).min(SENSOR_MAX);
        }
        if self.portam_max <= self.portam_thr {
            self.portam_max = (self.portam_thr + 1).min(SENSOR_MAX);
        }
        if self.pitchb_max <= self.pitchb_thr {
            self.pitchb_max = (self.pitchb_thr + 1).min(SENSOR_MAX);
        }
        if self.extrac_max <= self.extrac_thr {
            self.extrac_max = (self.extrac_thr + 1).min(SENSOR_MAX);
        }
        self.transpose = self.transpose.min(24);
        self.midi_channel = self.midi_channel.clamp(1, 16);
        self.breath_cc = self.breath_cc.min(9);
        self.breath_at = self.breath_at.min(1);
        self.velocity = self.velocity.min(127);
        self.portamento = self.portamento.min(2);
        self.pb_depth = self.pb_depth.min(12);
        self.extra_ct = self.extra_ct.min(4);
        self.vibrato = self.vibrato.min(9);
        self.deglitch = self.deglitch.min(70);
        self.patch = self.patch.clamp(1, 128);
        self.octave = self.octave.min(6);
        self.curve = self.curve.min(3);
        self.vel_smp_dl = self.vel_smp_dl.min(30);
        self.vel_bias = self.vel_bias.min(9);
        self.pinky_setting = self.pinky_setting.min(24);
        self.dip_sw_bits &= DIP_MASK;
        self.priority = self.priority.min(1);
        self.vib_sens = self.vib_sens.clamp(1, 12);
        self.vib_retn = self.vib_retn.min(4);
        self.vib_squelch = self.vib_squelch.clamp(1, 30);
        self.vib_direction = self.vib_direction.min(1);
        for patch in self.fast_patch.iter_mut() {
            *patch = (*patch).min(128);
        }
        self.rotator_on = self.rotator_on.min(1);
        for rotation in self.rotations.iter_mut() {
            *rotation = (*rotation).min(48);
        }
        self.parallel = self.parallel.min(48);
    }

    /// The zero-based MIDI channel used on the wire.
    pub fn channel(&self) -> u8 {
        (self.midi_channel.clamp(1, 16) - 1) as u8
    }

    /// Decodes the pinky key setting, collapsing the numeric sentinel into an
    /// explicit mode.
    pub fn pinky_mode(&self) -> PinkyMode {
        match self.pinky_setting.min(24) {
            setting @ 0..=11 => PinkyMode::QuickTransposeDown(12 - setting as u8),
            12 => PinkyMode::PitchBendHalving,
            setting => PinkyMode::QuickTransposeUp(setting as u8 - 12),
        }
    }

    /// The configured response curve.
    pub fn response_curve(&self) -> Curve {
        Curve::from_setting(self.curve)
    }

    /// Global semitone adjustment from the transpose and octave registers.
    pub fn semitone_shift(&self) -> i32 {
        (self.transpose.min(24) as i32 - 12) + (self.octave.min(6) as i32 - 3) * 12
    }

    /// Release hysteresis below the breath threshold, derived from the
    /// configured span so the margin scales with the playing range.
    pub fn breath_hysteresis(&self) -> i32 {
        let span = self.breath_max.saturating_sub(self.breath_thr) as i32;
        (span / 16).max(8)
    }

    pub fn dip(&self, bit: u16) -> bool {
        self.dip_sw_bits & bit != 0
    }

    /// Packs the record as consecutive little-endian u16 values.
    pub fn to_bytes(&self) -> [u8; Config::RECORD_LEN] {
        let mut bytes = [0u8; Config::RECORD_LEN];
        for (chunk, value) in bytes.chunks_exact_mut(2).zip(self.field_values()) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Unpacks a record, clamping every field into range. The record length
    /// must match exactly; partial records are never applied.
    pub fn from_bytes(bytes: &[u8]) -> Result<Config, ConfigError> {
        if bytes.len() != Config::RECORD_LEN {
            return Err(ConfigError::RecordLength {
                expected: Config::RECORD_LEN,
                actual: bytes.len(),
            });
        }

        let mut fields = [0u16; FIELD_COUNT];
        for (field, chunk) in fields.iter_mut().zip(bytes.chunks_exact(2)) {
            *field = u16::from_le_bytes([chunk[0], chunk[1]]);
        }

        let mut config = Config::from_fields(&fields);
        config.sanitize();
        Ok(config)
    }

    fn field_values(&self) -> [u16; FIELD_COUNT] {
        let mut fields = [0u16; FIELD_COUNT];
        let scalars = [
            self.breath_thr,
            self.breath_max,
            self.portam_thr,
            self.portam_max,
            self.pitchb_thr,
            self.pitchb_max,
            self.extrac_thr,
            self.extrac_max,
            self.ctouch_thr,
            self.transpose,
            self.midi_channel,
            self.breath_cc,
            self.breath_at,
            self.velocity,
            self.portamento,
            self.pb_depth,
            self.extra_ct,
            self.vibrato,
            self.deglitch,
            self.patch,
            self.octave,
            self.curve,
            self.vel_smp_dl,
            self.vel_bias,
            self.pinky_setting,
            self.dip_sw_bits,
            self.priority,
            self.vib_sens,
            self.vib_retn,
            self.vib_squelch,
            self.vib_direction,
        ];
        fields[..scalars.len()].copy_from_slice(&scalars);
        fields[31..38].copy_from_slice(&self.fast_patch);
        fields[38] = self.rotator_on;
        fields[39..43].copy_from_slice(&self.rotations);
        fields[43] = self.parallel;
        fields
    }

    fn from_fields(fields: &[u16; FIELD_COUNT]) -> Config {
        let mut fast_patch = [0u16; 7];
        fast_patch.copy_from_slice(&fields[31..38]);
        let mut rotations = [0u16; 4];
        rotations.copy_from_slice(&fields[39..43]);

        Config {
            breath_thr: fields[0],
            breath_max: fields[1],
            portam_thr: fields[2],
            portam_max: fields[3],
            pitchb_thr: fields[4],
            pitchb_max: fields[5],
            extrac_thr: fields[6],
            extrac_max: fields[7],
            ctouch_thr: fields[8],
            transpose: fields[9],
            midi_channel: fields[10],
            breath_cc: fields[11],
            breath_at: fields[12],
            velocity: fields[13],
            portamento: fields[14],
            pb_depth: fields[15],
            extra_ct: fields[16],
            vibrato: fields[17],
            deglitch: fields[18],
            patch: fields[19],
            octave: fields[20],
            curve: fields[21],
            vel_smp_dl: fields[22],
            vel_bias: fields[23],
            pinky_setting: fields[24],
            dip_sw_bits: fields[25],
            priority: fields[26],
            vib_sens: fields[27],
            vib_retn: fields[28],
            vib_squelch: fields[29],
            vib_direction: fields[30],
            fast_patch,
            rotator_on: fields[38],
            rotations,
            parallel: fields[43],
        }
    }
}

impl Default for Config {
    /// Factory defaults, substituted whenever non-volatile storage reads back
    /// blank or from an unknown format.
    fn default() -> Config {
        Config {
            breath_thr: 400,
            breath_max: 2000,
            portam_thr: 1000,
            portam_max: 2800,
            pitchb_thr: 1200,
            pitchb_max: 2400,
            extrac_thr: 1200,
            extrac_max: 2400,
            ctouch_thr: 1300,
            transpose: 12,
            midi_channel: 1,
            breath_cc: 2,
            breath_at: 0,
            velocity: 0,
            portamento: 0,
            pb_depth: 1,
            extra_ct: 0,
            vibrato: 4,
            deglitch: 20,
            patch: 1,
            octave: 3,
            curve: 0,
            vel_smp_dl: 15,
            vel_bias: 0,
            pinky_setting: 12,
            dip_sw_bits: 0,
            priority: 0,
            vib_sens: 6,
            vib_retn: 2,
            vib_squelch: 12,
            vib_direction: 0,
            fast_patch: [0; 7],
            rotator_on: 0,
            rotations: [19, 15, 12, OFFSET_NEUTRAL],
            parallel: OFFSET_NEUTRAL,
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "channel {} breath {}..{} curve {:?} deglitch {}",
            self.midi_channel,
            self.breath_thr,
            self.breath_max,
            self.response_curve(),
            self.deglitch
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_round_trip() {
        let config = Config::default();
        let restored = Config::from_bytes(&config.to_bytes()).unwrap();
        assert_eq!(config, restored);
        assert_eq!(config.to_bytes(), restored.to_bytes());
    }

    #[test]
    fn test_from_bytes_rejects_wrong_length() {
        let bytes = Config::default().to_bytes();
        assert!(matches!(
            Config::from_bytes(&bytes[..bytes.len() - 1]),
            Err(ConfigError::RecordLength { .. })
        ));
    }

    #[test]
    fn test_sanitize_clamps_out_of_range_fields() {
        let mut config = Config {
            breath_thr: 9000,
            midi_channel: 0,
            pb_depth: 200,
            vib_sens: 0,
            patch: 500,
            ..Config::default()
        };
        config.sanitize();
        assert_eq!(config.breath_thr, SENSOR_MAX);
        // A clamped threshold above the maximum forces the pair apart again.
        assert!(config.breath_max > config.breath_thr || config.breath_thr == SENSOR_MAX);
        assert_eq!(config.midi_channel, 1);
        assert_eq!(config.pb_depth, 12);
        assert_eq!(config.vib_sens, 1);
        assert_eq!(config.patch, 128);
    }

    #[test]
    fn test_sanitize_orders_threshold_pairs() {
        let mut config = Config {
            breath_thr: 2000,
            breath_max: 1000,
            ..Config::default()
        };
        config.sanitize();
        assert!(config.breath_max > config.breath_thr);
    }

    #[test]
    fn test_pinky_mode_decoding() {
        let mut config = Config::default();

        config.pinky_setting = 0;
        assert_eq!(config.pinky_mode(), PinkyMode::QuickTransposeDown(12));
        config.pinky_setting = 11;
        assert_eq!(config.pinky_mode(), PinkyMode::QuickTransposeDown(1));
        config.pinky_setting = 12;
        assert_eq!(config.pinky_mode(), PinkyMode::PitchBendHalving);
        config.pinky_setting = 13;
        assert_eq!(config.pinky_mode(), PinkyMode::QuickTransposeUp(1));
        config.pinky_setting = 24;
        assert_eq!(config.pinky_mode(), PinkyMode::QuickTransposeUp(12));
    }

    #[test]
    fn test_curves_are_monotonic() {
        for curve in [Curve::Linear, Curve::Soft, Curve::Hard, Curve::SCurve] {
            let mut last = curve.apply(0.0);
            for i in 1..=100 {
                let value = curve.apply(i as f32 / 100.0);
                assert!(value >= last, "{:?} not monotonic at {}", curve, i);
                last = value;
            }
            assert_eq!(curve.apply(0.0), 0.0);
            assert!((curve.apply(1.0) - 1.0).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn test_semitone_shift() {
        let mut config = Config::default();
        assert_eq!(config.semitone_shift(), 0);
        config.transpose = 14;
        config.octave = 2;
        assert_eq!(config.semitone_shift(), 2 - 12);
    }
}
