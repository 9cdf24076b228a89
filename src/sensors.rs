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
use serde::Deserialize;

/// One tick's worth of digitized sensor readings. The core consumes integers
/// straight off the ADCs; it never touches the hardware itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct SensorFrame {
    /// Breath pressure from the mouthpiece sensor.
    pub breath: i32,
    /// Capacitance from the bite sensor.
    pub bite: i32,
    /// The auxiliary control sensor.
    pub extra: i32,
    /// The capacitive vibrato sensor.
    pub vibrato: i32,
}

/// Normalizes raw per-tick readings and retains the previous tick's values,
/// the only sensor history the core keeps. Breath is smoothed with a
/// two-sample average to knock down single-tick ADC noise.
#[derive(Debug, Default)]
pub struct SensorSampler {
    current: SensorFrame,
    previous: SensorFrame,
    last_raw_breath: i32,
    primed: bool,
}

impl SensorSampler {
    pub fn new() -> SensorSampler {
        SensorSampler::default()
    }

    /// Ingests a raw frame. Must run before any consumer within the tick.
    pub fn update(&mut self, raw: SensorFrame) {
        self.previous = self.current;

        let mut frame = raw;
        if self.primed {
            frame.breath = (raw.breath + self.last_raw_breath) / 2;
        }
        self.last_raw_breath = raw.breath;
        self.primed = true;
        self.current = frame;
    }

    pub fn current(&self) -> SensorFrame {
        self.current
    }

    pub fn previous(&self) -> SensorFrame {
        self.previous
    }

    /// Breath change since the previous tick.
    pub fn breath_delta(&self) -> i32 {
        self.current.breath - self.previous.breath
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(breath: i32) -> SensorFrame {
        SensorFrame {
            breath,
            ..SensorFrame::default()
        }
    }

    #[test]
    fn test_first_frame_passes_through() {
        let mut sampler = SensorSampler::new();
        sampler.update(frame(800));
        assert_eq!(sampler.current().breath, 800);
        assert_eq!(sampler.previous(), SensorFrame::default());
    }

    #[test]
    fn test_breath_is_smoothed_over_two_samples() {
        let mut sampler = SensorSampler::new();
        sampler.update(frame(100));
        sampler.update(frame(300));
        assert_eq!(sampler.current().breath, 200);
        sampler.update(frame(300));
        assert_eq!(sampler.current().breath, 300);
    }

    #[test]
    fn test_previous_frame_is_retained() {
        let mut sampler = SensorSampler::new();
        sampler.update(frame(100));
        sampler.update(frame(100));
        sampler.update(frame(500));
        assert_eq!(sampler.previous().breath, 100);
        assert_eq!(sampler.breath_delta(), 200);
    }

    #[test]
    fn test_other_channels_are_unsmoothed() {
        let mut sampler = SensorSampler::new();
        sampler.update(SensorFrame {
            breath: 0,
            bite: 100,
            extra: 200,
            vibrato: 300,
        });
        sampler.update(SensorFrame {
            breath: 0,
            bite: 150,
            extra: 250,
            vibrato: 350,
        });
        let current = sampler.current();
        assert_eq!(current.bite, 150);
        assert_eq!(current.extra, 250);
        assert_eq!(current.vibrato, 350);
    }
}
