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
use crate::midi::Event;

/// The three states of the main state machine. `Off` and `On` are stable;
/// `RiseWait` observes how fast the breath pressure is increasing before
/// committing to a sounding note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteState {
    /// No note is sounding.
    Off,
    /// Breath crossed the threshold; watching the rise slope.
    RiseWait {
        pitch: u8,
        start_breath: i32,
        ticks: u16,
    },
    /// A note is sounding.
    On { pitch: u8, velocity: u8 },
}

/// Drives the OFF -> RISE_WAIT -> ON lifecycle from breath readings and the
/// resolved pitch. All timing is tick counters compared against configured
/// windows; nothing blocks.
pub struct NoteStateMachine {
    state: NoteState,
    crossing_ticks: u16,
    dip_ticks: u16,
}

impl NoteStateMachine {
    pub fn new() -> NoteStateMachine {
        NoteStateMachine {
            state: NoteState::Off,
            crossing_ticks: 0,
            dip_ticks: 0,
        }
    }

    pub fn state(&self) -> NoteState {
        self.state
    }

    /// The currently sounding pitch, if any.
    pub fn sounding(&self) -> Option<u8> {
        match self.state {
            NoteState::On { pitch, .. } => Some(pitch),
            _ => None,
        }
    }

    /// Whether a note is sounding or committing to sound.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, NoteState::Off)
    }

    /// Advances the machine by one tick, returning the note events to emit.
    pub fn advance(&mut self, breath: i32, pitch: u8, config: &Config) -> Vec<Event> {
        let threshold = config.breath_thr as i32;
        let window = config.deglitch.min(70);

        match self.state {
            NoteState::Off => {
                if breath > threshold {
                    self.crossing_ticks += 1;
                    if self.crossing_ticks >= window.max(1) {
                        self.crossing_ticks = 0;
                        self.state = NoteState::RiseWait {
                            pitch,
                            start_breath: breath,
                            ticks: 0,
                        };
                        debug!(pitch, breath, "Breath crossing accepted.");
                    }
                } else {
                    self.crossing_ticks = 0;
                }
                Vec::new()
            }
            NoteState::RiseWait {
                start_breath,
                ticks,
                ..
            } => {
                // Dropping back below the threshold during the wait is
                // treated as noise, not a note.
                if breath < threshold {
                    self.state = NoteState::Off;
                    return Vec::new();
                }

                let ticks = ticks + 1;
                if ticks >= config.vel_smp_dl.min(30) {
                    let velocity = onset_velocity(breath - start_breath, config);
                    self.state = NoteState::On { pitch, velocity };
                    self.dip_ticks = 0;
                    debug!(pitch, velocity, "Note on.");
                    return vec![Event::NoteOn {
                        note: pitch,
                        velocity,
                    }];
                }

                // Key changes during the wait update the pending pitch but
                // never restart the rise timer.
                self.state = NoteState::RiseWait {
                    pitch,
                    start_breath,
                    ticks,
                };
                Vec::new()
            }
            NoteState::On {
                pitch: current,
                velocity,
            } => {
                let mut events = Vec::new();

                if breath < threshold - config.breath_hysteresis() {
                    self.dip_ticks += 1;
                    // The first dip tick is always immune, even with a zero
                    // deglitch window.
                    if self.dip_ticks > window.max(1) {
                        self.dip_ticks = 0;
                        self.state = NoteState::Off;
                        debug!(pitch = current, "Note off.");
                        events.push(Event::NoteOff {
                            note: current,
                            velocity: 0,
                        });
                        return events;
                    }
                } else {
                    self.dip_ticks = 0;
                }

                if pitch != current && config.portamento == 0 {
                    // Legato retrigger. With portamento enabled the glide is
                    // handled on the bend path and the note identity stays.
                    debug!(from = current, to = pitch, "Retrigger.");
                    events.push(Event::NoteOff {
                        note: current,
                        velocity: 0,
                    });
                    events.push(Event::NoteOn {
                        note: pitch,
                        velocity,
                    });
                    self.state = NoteState::On { pitch, velocity };
                }

                events
            }
        }
    }
}

impl Default for NoteStateMachine {
    fn default() -> NoteStateMachine {
        NoteStateMachine::new()
    }
}

/// Converts the breath rise over the observation window into an onset
/// velocity. A nonzero `velocity` setting overrides the slope with a fixed
/// value; otherwise the rise is normalized against the configured breath
/// span, shaped by the response curve, floored by the bias, and clamped to
/// [1,127].
fn onset_velocity(rise: i32, config: &Config) -> u8 {
    if config.velocity != 0 {
        return config.velocity.clamp(1, 127) as u8;
    }

    let span = config.breath_max.saturating_sub(config.breath_thr).max(1) as f32;
    let norm = (rise.max(0) as f32 / span).clamp(0.0, 1.0);
    let shaped = config.response_curve().apply(norm);

    let floor = (config.vel_bias.min(9) * 10) as f32;
    let velocity = (floor + shaped * (127.0 - floor)).round() as i32;
    velocity.clamp(1, 127) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            breath_thr: 200,
            breath_max: 900,
            deglitch: 2,
            vel_smp_dl: 4,
            velocity: 0,
            curve: 0,
            ..Config::default()
        }
    }

    fn run_until_on(machine: &mut NoteStateMachine, breath: i32, pitch: u8, config: &Config) -> Vec<Event> {
        let mut events = Vec::new();
        for _ in 0..32 {
            events.extend(machine.advance(breath, pitch, config));
            if machine.sounding().is_some() {
                break;
            }
        }
        events
    }

    #[test]
    fn test_breath_below_threshold_never_sounds() {
        let config = test_config();
        let mut machine = NoteStateMachine::new();
        for _ in 0..1000 {
            assert!(machine.advance(199, 62, &config).is_empty());
            assert_eq!(machine.state(), NoteState::Off);
        }
    }

    #[test]
    fn test_onset_glitch_rejection() {
        let config = test_config();
        let mut machine = NoteStateMachine::new();

        // One tick above threshold with a two-tick window, then back below.
        assert!(machine.advance(500, 62, &config).is_empty());
        assert!(machine.advance(100, 62, &config).is_empty());
        assert_eq!(machine.state(), NoteState::Off);

        // The counter restarts after the dropout.
        assert!(machine.advance(500, 62, &config).is_empty());
        assert!(machine.advance(100, 62, &config).is_empty());
        assert_eq!(machine.state(), NoteState::Off);
    }

    #[test]
    fn test_rise_abort_emits_nothing() {
        let config = test_config();
        let mut machine = NoteStateMachine::new();

        machine.advance(500, 62, &config);
        machine.advance(500, 62, &config);
        assert!(matches!(machine.state(), NoteState::RiseWait { .. }));

        // Falling below the threshold mid-rise reverts silently.
        assert!(machine.advance(150, 62, &config).is_empty());
        assert_eq!(machine.state(), NoteState::Off);
    }

    #[test]
    fn test_exactly_one_note_on_per_cycle() {
        let config = test_config();
        let mut machine = NoteStateMachine::new();

        let events = run_until_on(&mut machine, 600, 62, &config);
        let note_ons: Vec<&Event> = events
            .iter()
            .filter(|e| matches!(e, Event::NoteOn { .. }))
            .collect();
        assert_eq!(note_ons.len(), 1);
        if let Event::NoteOn { note, velocity } = note_ons[0] {
            assert_eq!(*note, 62);
            assert!((1..=127).contains(velocity));
        }

        // Holding produces no further note events.
        for _ in 0..100 {
            assert!(machine.advance(600, 62, &config).is_empty());
        }
    }

    #[test]
    fn test_velocity_monotonic_in_rise_slope() {
        let config = test_config();
        let mut last_velocity = 0u8;
        for target in [250, 400, 600, 900, 2000] {
            let mut machine = NoteStateMachine::new();
            // Cross at just above the threshold, then jump to the target so
            // the observed rise grows with it.
            machine.advance(210, 62, &config);
            machine.advance(210, 62, &config);
            let events = run_until_on(&mut machine, target, 62, &config);
            let velocity = events
                .iter()
                .find_map(|e| match e {
                    Event::NoteOn { velocity, .. } => Some(*velocity),
                    _ => None,
                })
                .unwrap();
            assert!(
                velocity >= last_velocity,
                "velocity {} not monotonic at target {}",
                velocity,
                target
            );
            last_velocity = velocity;
        }
        assert_eq!(last_velocity, 127);
    }

    #[test]
    fn test_fixed_velocity_setting() {
        let mut config = test_config();
        config.velocity = 99;
        let mut machine = NoteStateMachine::new();
        let events = run_until_on(&mut machine, 600, 62, &config);
        assert!(events.contains(&Event::NoteOn {
            note: 62,
            velocity: 99
        }));
    }

    #[test]
    fn test_velocity_bias_raises_floor() {
        let mut config = test_config();
        config.vel_bias = 9;
        let mut machine = NoteStateMachine::new();
        // Flat rise: without bias this would be the minimum velocity.
        machine.advance(201, 62, &config);
        machine.advance(201, 62, &config);
        let events = run_until_on(&mut machine, 201, 62, &config);
        let velocity = events
            .iter()
            .find_map(|e| match e {
                Event::NoteOn { velocity, .. } => Some(*velocity),
                _ => None,
            })
            .unwrap();
        assert!(velocity >= 90);
    }

    #[test]
    fn test_single_tick_dip_does_not_release() {
        let config = test_config();
        let mut machine = NoteStateMachine::new();
        run_until_on(&mut machine, 600, 62, &config);

        assert!(machine.advance(50, 62, &config).is_empty());
        assert!(machine.advance(600, 62, &config).is_empty());
        assert!(machine.sounding().is_some());
    }

    #[test]
    fn test_single_tick_dip_immune_at_zero_window() {
        let mut config = test_config();
        config.deglitch = 0;
        let mut machine = NoteStateMachine::new();
        run_until_on(&mut machine, 600, 62, &config);

        assert!(machine.advance(50, 62, &config).is_empty());
        assert!(machine.advance(600, 62, &config).is_empty());
        assert!(machine.sounding().is_some());

        // A sustained drop still releases exactly once.
        let mut events = Vec::new();
        for _ in 0..5 {
            events.extend(machine.advance(50, 62, &config));
        }
        assert_eq!(
            events,
            vec![Event::NoteOff {
                note: 62,
                velocity: 0
            }]
        );
    }

    #[test]
    fn test_release_below_hysteresis_margin() {
        let config = test_config();
        let mut machine = NoteStateMachine::new();
        run_until_on(&mut machine, 600, 62, &config);

        // Just below threshold but inside the hysteresis band: still on.
        for _ in 0..50 {
            assert!(machine.advance(190, 62, &config).is_empty());
        }
        assert!(machine.sounding().is_some());

        // Below the band for the whole window: exactly one note off.
        let mut events = Vec::new();
        for _ in 0..10 {
            events.extend(machine.advance(50, 62, &config));
        }
        assert_eq!(
            events,
            vec![Event::NoteOff {
                note: 62,
                velocity: 0
            }]
        );
        assert_eq!(machine.state(), NoteState::Off);
    }

    #[test]
    fn test_retrigger_on_pitch_change() {
        let config = test_config();
        let mut machine = NoteStateMachine::new();
        run_until_on(&mut machine, 600, 62, &config);

        let events = machine.advance(600, 65, &config);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::NoteOff { note: 62, .. }));
        assert!(matches!(events[1], Event::NoteOn { note: 65, .. }));
        assert_eq!(machine.sounding(), Some(65));
    }

    #[test]
    fn test_no_retrigger_with_portamento() {
        let mut config = test_config();
        config.portamento = 1;
        let mut machine = NoteStateMachine::new();
        run_until_on(&mut machine, 600, 62, &config);

        assert!(machine.advance(600, 65, &config).is_empty());
        assert_eq!(machine.sounding(), Some(62));
    }

    #[test]
    fn test_pitch_updates_during_rise_wait() {
        let config = test_config();
        let mut machine = NoteStateMachine::new();
        machine.advance(500, 62, &config);
        machine.advance(500, 62, &config);
        assert!(matches!(machine.state(), NoteState::RiseWait { .. }));

        // Change the fingering mid-rise; the eventual note uses it.
        let events = run_until_on(&mut machine, 500, 67, &config);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::NoteOn { note: 67, .. })));
    }

    #[test]
    fn test_excessive_breath_clamps_velocity() {
        let config = test_config();
        let mut machine = NoteStateMachine::new();
        machine.advance(210, 62, &config);
        machine.advance(210, 62, &config);
        let events = run_until_on(&mut machine, 100_000, 62, &config);
        let velocity = events
            .iter()
            .find_map(|e| match e {
                Event::NoteOn { velocity, .. } => Some(*velocity),
                _ => None,
            })
            .unwrap();
        assert_eq!(velocity, 127);
    }
}
