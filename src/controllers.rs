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
pub mod vibrato;

use crate::config::{Config, DIP_BITE_JUMPER, DIP_LEGACY, DIP_LEGACY_BREATH, DIP_SLOW_MIDI};
use crate::midi::Event;
use crate::sensors::SensorFrame;

use vibrato::Vibrato;

const CC_MOD_WHEEL: u8 = 1;
const CC_BREATH: u8 = 2;
const CC_FOOT: u8 = 4;
const CC_VOLUME: u8 = 7;
const CC_EXPRESSION: u8 = 11;
const CC_CUTOFF: u8 = 74;

/// Pitch bend units per semitone with the standard two semitone range.
const UNITS_PER_SEMITONE: f32 = 4096.0;

/// Per-tick inputs to the controller engine.
pub struct ControlInputs {
    pub frame: SensorFrame,
    /// Halves the sensor bend excursion, driven by the half-bend touch key.
    pub half_bend: bool,
    /// The note currently sounding, if any.
    pub sounding: Option<u8>,
    /// The note the current fingering resolves to.
    pub resolved: u8,
}

/// Translates the continuous sensor streams into control change, channel
/// aftertouch and pitch bend events.
///
/// The engine remembers the last value sent on every stream and only emits
/// when a value moves past the deadband, so calling [`advance`] twice with
/// identical inputs produces no events the second time.
///
/// [`advance`]: ControllerEngine::advance
pub struct ControllerEngine {
    last_cc: [Option<u8>; 128],
    last_bend: Option<i16>,
    last_at: Option<u8>,
    glide: f32,
    vibrato: Vibrato,
}

impl ControllerEngine {
    pub fn new() -> ControllerEngine {
        ControllerEngine {
            last_cc: [None; 128],
            last_bend: None,
            last_at: None,
            glide: 0.0,
            vibrato: Vibrato::new(),
        }
    }

    /// Advances one tick and returns the events to emit, in stream order:
    /// breath, auxiliary controller, pitch bend.
    pub fn advance(&mut self, inputs: &ControlInputs, config: &Config) -> Vec<Event> {
        let slow = config.dip(DIP_SLOW_MIDI);
        let cc_deadband: u8 = if slow { 3 } else { 1 };
        let bend_deadband: i32 = if slow { 48 } else { 12 };

        let mut events = Vec::new();
        self.breath_streams(inputs, config, cc_deadband, &mut events);
        self.extra_stream(inputs, config, cc_deadband, &mut events);
        self.bend_stream(inputs, config, bend_deadband, &mut events);
        events
    }

    /// Whether the boot-time vibrato baseline calibration has completed.
    pub fn calibrated(&self) -> bool {
        self.vibrato.calibrated()
    }

    fn breath_streams(
        &mut self,
        inputs: &ControlInputs,
        config: &Config,
        deadband: u8,
        events: &mut Vec<Event>,
    ) {
        let breath = inputs.frame.breath;
        let norm = if config.dip(DIP_LEGACY_BREATH) {
            // Legacy breath mode maps the full sensor range, ungated by the
            // note-on threshold.
            scale(breath, 0, config.breath_max)
        } else if breath > config.breath_thr as i32 {
            scale(breath, config.breath_thr, config.breath_max)
        } else {
            0.0
        };
        let value = (config.response_curve().apply(norm) * 127.0).round() as u8;

        let (route, with_breath) = breath_route(config.breath_cc);
        if let Some(controller) = route {
            self.push_cc(controller, value, deadband, events);
            if (with_breath || config.dip(DIP_LEGACY)) && controller != CC_BREATH {
                self.push_cc(CC_BREATH, value, deadband, events);
            }
        }

        if config.breath_at != 0 {
            let send = match self.last_at {
                None => value != 0,
                Some(prev) => {
                    value != prev
                        && (value.abs_diff(prev) > deadband || value == 0 || value == 127)
                }
            };
            if send {
                self.last_at = Some(value);
                events.push(Event::AfterTouch { value });
            }
        }
    }

    fn extra_stream(
        &mut self,
        inputs: &ControlInputs,
        config: &Config,
        deadband: u8,
        events: &mut Vec<Event>,
    ) {
        let controller = match config.extra_ct.min(4) {
            0 => return,
            1 => CC_MOD_WHEEL,
            2 => CC_FOOT,
            3 => CC_CUTOFF,
            _ => CC_EXPRESSION,
        };
        let norm = scale(inputs.frame.extra, config.extrac_thr, config.extrac_max);
        let value = (norm * 127.0).round() as u8;
        self.push_cc(controller, value, deadband, events);
    }

    fn bend_stream(
        &mut self,
        inputs: &ControlInputs,
        config: &Config,
        deadband: i32,
        events: &mut Vec<Event>,
    ) {
        let jumper = config.dip(DIP_BITE_JUMPER);
        let bite_touch = inputs.frame.bite > config.ctouch_thr as i32;

        // With the jumper set the bite sensor is a touch gate and the
        // auxiliary sensor drives the bend lever.
        let vib_gate = !jumper || bite_touch;
        let vib_units = self
            .vibrato
            .advance(inputs.frame.vibrato, vib_gate, config);

        let sensor_units = if config.pb_depth == 0 {
            0
        } else {
            let source = if jumper {
                inputs.frame.extra
            } else {
                inputs.frame.bite
            };
            let norm = scale(source, config.pitchb_thr, config.pitchb_max);
            let mut units = (norm * 8191.0) as i32 / config.pb_depth.clamp(1, 12) as i32;
            if inputs.half_bend {
                units /= 2;
            }
            units
        };

        let glide_units = self.glide_units(inputs, bite_touch, config);

        let bend = (sensor_units + vib_units + glide_units).clamp(-8192, 8191) as i16;
        let send = match self.last_bend {
            None => bend != 0,
            Some(prev) => {
                bend != prev && ((bend as i32 - prev as i32).abs() > deadband || bend == 0)
            }
        };
        if send {
            self.last_bend = Some(bend);
            events.push(Event::PitchBend { bend });
        }
    }

    /// Exponential glide from the sounding note toward the resolved
    /// fingering, expressed in bend units.
    fn glide_units(&mut self, inputs: &ControlInputs, bite_touch: bool, config: &Config) -> i32 {
        let engaged = match config.portamento.min(2) {
            0 => false,
            1 => true,
            // Switched mode follows the bite touch gate.
            _ => bite_touch,
        };

        match (engaged, inputs.sounding) {
            (true, Some(sounding)) => {
                let target = inputs.resolved as f32 - sounding as f32;
                let norm = scale(inputs.frame.breath, config.portam_thr, config.portam_max);
                let rate = 0.02 + 0.5 * norm;
                self.glide += (target - self.glide) * rate;
                if (target - self.glide).abs() < 0.005 {
                    self.glide = target;
                }
            }
            _ => self.glide = 0.0,
        }

        (self.glide * UNITS_PER_SEMITONE) as i32
    }

    fn push_cc(&mut self, controller: u8, value: u8, deadband: u8, events: &mut Vec<Event>) {
        let last = &mut self.last_cc[controller as usize];
        let send = match *last {
            None => value != 0,
            Some(prev) => {
                value != prev && (value.abs_diff(prev) > deadband || value == 0 || value == 127)
            }
        };
        if send {
            *last = Some(value);
            events.push(Event::ControlChange { controller, value });
        }
    }
}

impl Default for ControllerEngine {
    fn default() -> ControllerEngine {
        ControllerEngine::new()
    }
}

/// Routing table for the breath control change stream. The second element
/// doubles the stream onto CC2.
fn breath_route(setting: u16) -> (Option<u8>, bool) {
    match setting.min(9) {
        0 => (None, false),
        1 => (Some(CC_MOD_WHEEL), false),
        2 => (Some(CC_BREATH), false),
        3 => (Some(CC_VOLUME), false),
        4 => (Some(CC_EXPRESSION), false),
        5 => (Some(CC_MOD_WHEEL), true),
        6 => (Some(CC_BREATH), true),
        7 => (Some(CC_VOLUME), true),
        8 => (Some(CC_EXPRESSION), true),
        _ => (Some(CC_CUTOFF), false),
    }
}

/// Scales a sensor reading into 0.0..=1.0 over the given window.
fn scale(value: i32, low: u16, high: u16) -> f32 {
    let low = low as i32;
    let high = high as i32;
    if high <= low {
        return 0.0;
    }
    let clamped = value.clamp(low, high);
    (clamped - low) as f32 / (high - low) as f32
}
