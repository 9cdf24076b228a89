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
use std::error::Error;

pub mod console;
mod midir;
pub mod mock;

/// A logical MIDI event produced by the core. Values are plain integers,
/// already clamped by the engines; conversion to wire types happens at the
/// device boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8, velocity: u8 },
    ControlChange { controller: u8, value: u8 },
    /// Bend relative to center, -8192..=8191.
    PitchBend { bend: i16 },
    AfterTouch { value: u8 },
    ProgramChange { program: u8 },
}

impl Event {
    /// Dispatches the event to an emitter on the given zero-based channel.
    pub fn send(&self, emitter: &mut dyn Emitter, channel: u8) -> Result<(), Box<dyn Error>> {
        match *self {
            Event::NoteOn { note, velocity } => emitter.note_on(channel, note, velocity),
            Event::NoteOff { note, velocity } => emitter.note_off(channel, note, velocity),
            Event::ControlChange { controller, value } => {
                emitter.control_change(channel, controller, value)
            }
            Event::PitchBend { bend } => emitter.pitch_bend(channel, bend),
            Event::AfterTouch { value } => emitter.after_touch(channel, value),
            Event::ProgramChange { program } => emitter.program_change(channel, program),
        }
    }
}

/// A MIDI output the core emits logical events to. Implementations own the
/// transport encoding; the core only promises clamped 7-bit data bytes and a
/// centered 14-bit bend range.
pub trait Emitter: Send {
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<(), Box<dyn Error>>;

    fn note_off(&mut self, channel: u8, note: u8, velocity: u8) -> Result<(), Box<dyn Error>>;

    fn control_change(&mut self, channel: u8, controller: u8, value: u8)
        -> Result<(), Box<dyn Error>>;

    fn pitch_bend(&mut self, channel: u8, bend: i16) -> Result<(), Box<dyn Error>>;

    fn after_touch(&mut self, channel: u8, value: u8) -> Result<(), Box<dyn Error>>;

    fn program_change(&mut self, channel: u8, program: u8) -> Result<(), Box<dyn Error>>;

    /// Sends a raw identifier-prefixed system-exclusive payload, used for the
    /// configuration dump frame.
    fn sysex(&mut self, data: &[u8]) -> Result<(), Box<dyn Error>>;
}

/// Lists MIDI output devices known to midir.
pub fn list_devices() -> Result<Vec<String>, Box<dyn Error>> {
    midir::list()
}

/// Gets an emitter with the given name. Names starting with `mock` return a
/// capturing mock, `console` prints events instead of sending them.
pub fn get_device(name: &str) -> Result<Box<dyn Emitter>, Box<dyn Error>> {
    if name.starts_with("mock") {
        return Ok(Box::new(mock::Device::get(name)));
    }
    if name == "console" {
        return Ok(Box::new(console::Device::new()));
    }

    Ok(Box::new(midir::get(name)?))
}
