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
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Emitter, Event};

/// A mock emitter. Doesn't send anything anywhere, but records everything so
/// tests can assert on the exact event stream.
#[derive(Clone)]
pub struct Device {
    name: String,
    events: Arc<Mutex<Vec<(u8, Event)>>>,
    sysex_frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            events: Arc::new(Mutex::new(Vec::new())),
            sysex_frames: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All channel events recorded so far, in emission order.
    pub fn events(&self) -> Vec<(u8, Event)> {
        self.events.lock().clone()
    }

    /// All sysex frames recorded so far.
    pub fn sysex_frames(&self) -> Vec<Vec<u8>> {
        self.sysex_frames.lock().clone()
    }

    /// Clears the recorded events and frames.
    pub fn clear(&self) {
        self.events.lock().clear();
        self.sysex_frames.lock().clear();
    }

    fn record(&self, channel: u8, event: Event) {
        self.events.lock().push((channel, event));
    }
}

impl Emitter for Device {
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<(), Box<dyn Error>> {
        self.record(channel, Event::NoteOn { note, velocity });
        Ok(())
    }

    fn note_off(&mut self, channel: u8, note: u8, velocity: u8) -> Result<(), Box<dyn Error>> {
        self.record(channel, Event::NoteOff { note, velocity });
        Ok(())
    }

    fn control_change(
        &mut self,
        channel: u8,
        controller: u8,
        value: u8,
    ) -> Result<(), Box<dyn Error>> {
        self.record(channel, Event::ControlChange { controller, value });
        Ok(())
    }

    fn pitch_bend(&mut self, channel: u8, bend: i16) -> Result<(), Box<dyn Error>> {
        self.record(channel, Event::PitchBend { bend });
        Ok(())
    }

    fn after_touch(&mut self, channel: u8, value: u8) -> Result<(), Box<dyn Error>> {
        self.record(channel, Event::AfterTouch { value });
        Ok(())
    }

    fn program_change(&mut self, channel: u8, program: u8) -> Result<(), Box<dyn Error>> {
        self.record(channel, Event::ProgramChange { program });
        Ok(())
    }

    fn sysex(&mut self, data: &[u8]) -> Result<(), Box<dyn Error>> {
        self.sysex_frames.lock().push(data.to_vec());
        Ok(())
    }
}
