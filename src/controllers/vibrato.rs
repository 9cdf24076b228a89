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

use crate::config::Config;

/// Ticks of sensor samples averaged to establish the zero baseline.
pub const CALIBRATION_TICKS: u32 = 64;

/// Bend units produced per sensor count of excursion at full sensitivity.
const UNITS_PER_COUNT: f32 = 4.0;

/// The modulation wave never exceeds one semitone of bend.
const WAVE_LIMIT: f32 = 4096.0;

/// Converts oscillation of the capacitive vibrato sensor around an
/// auto-calibrated baseline into a smoothed pitch modulation wave.
///
/// The first `CALIBRATION_TICKS` samples establish the zero point; excursions
/// outside the squelch band around it drive the wave, which decays back to
/// center at the configured return speed.
pub struct Vibrato {
    zero: i32,
    cal_sum: i64,
    cal_ticks: u32,
    wave: f32,
    gesture_sign: f32,
    active: bool,
}

impl Vibrato {
    pub fn new() -> Vibrato {
        Vibrato {
            zero: 0,
            cal_sum: 0,
            cal_ticks: 0,
            wave: 0.0,
            gesture_sign: 1.0,
            active: false,
        }
    }

    /// Whether the boot-time baseline calibration has completed.
    pub fn calibrated(&self) -> bool {
        self.cal_ticks >= CALIBRATION_TICKS
    }

    /// The calibrated zero baseline.
    pub fn zero(&self) -> i32 {
        self.zero
    }

    /// The upper and lower squelch thresholds around the baseline.
    pub fn thresholds(&self, config: &Config) -> (i32, i32) {
        let band = Self::band(config);
        (self.zero + band, self.zero - band)
    }

    fn band(config: &Config) -> i32 {
        config.vib_squelch.clamp(1, 30) as i32 * 4
    }

    /// Advances the wave by one tick and returns the modulation in bend
    /// units. Returns zero until calibration completes.
    pub fn advance(&mut self, sample: i32, gate: bool, config: &Config) -> i32 {
        if !self.calibrated() {
            self.cal_sum += sample as i64;
            self.cal_ticks += 1;
            if self.calibrated() {
                self.zero = (self.cal_sum / self.cal_ticks as i64) as i32;
                debug!(zero = self.zero, "Vibrato baseline calibrated.");
            }
            return 0;
        }

        let depth = config.vibrato.min(9);
        let deviation = sample - self.zero;
        let band = Self::band(config);

        if !gate || depth == 0 || deviation.abs() <= band {
            // Inside the squelch band (or gated off): decay toward center.
            let retain = 1.0 - 0.12 * (config.vib_retn.min(4) as f32 + 1.0);
            self.wave *= retain.max(0.0);
            if self.wave.abs() < 1.0 {
                self.wave = 0.0;
                self.active = false;
            }
        } else {
            let excess = (deviation.abs() - band) * deviation.signum();
            if !self.active {
                // Force the first half-cycle direction so onset never snaps
                // the wrong way.
                self.active = true;
                let wanted = if config.vib_direction == Config::VIB_UP {
                    1.0
                } else {
                    -1.0
                };
                self.gesture_sign = if excess >= 0 { wanted } else { -wanted };
            }

            let sensitivity = config.vib_sens.clamp(1, 12) as f32 / 12.0;
            let scale = depth as f32 / 9.0;
            let target =
                excess as f32 * self.gesture_sign * sensitivity * scale * UNITS_PER_COUNT;
            self.wave += (target - self.wave) * 0.5;
            self.wave = self.wave.clamp(-WAVE_LIMIT, WAVE_LIMIT);
        }

        self.wave as i32
    }
}

impl Default for Vibrato {
    fn default() -> Vibrato {
        Vibrato::new()
    }
}
