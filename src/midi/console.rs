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

use super::Emitter;

/// An emitter that prints events to stdout, used when replaying a trace
/// without a real MIDI output.
#[derive(Default)]
pub struct Device {}

impl Device {
    pub fn new() -> Device {
        Device {}
    }
}

impl Emitter for Device {
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<(), Box<dyn Error>> {
        println!("ch{:<2} note on   {:>3} vel {:>3}", channel + 1, note, velocity);
        Ok(())
    }

    fn note_off(&mut self, channel: u8, note: u8, velocity: u8) -> Result<(), Box<dyn Error>> {
        println!("ch{:<2} note off  {:>3} vel {:>3}", channel + 1, note, velocity);
        Ok(())
    }

    fn control_change(
        &mut self,
        channel: u8,
        controller: u8,
        value: u8,
    ) -> Result<(), Box<dyn Error>> {
        println!("ch{:<2} cc {:>3}       val {:>3}", channel + 1, controller, value);
        Ok(())
    }

    fn pitch_bend(&mut self, channel: u8, bend: i16) -> Result<(), Box<dyn Error>> {
        println!("ch{:<2} pitch bend {:>6}", channel + 1, bend);
        Ok(())
    }

    fn after_touch(&mut self, channel: u8, value: u8) -> Result<(), Box<dyn Error>> {
        println!("ch{:<2} aftertouch val {:>3}", channel + 1, value);
        Ok(())
    }

    fn program_change(&mut self, channel: u8, program: u8) -> Result<(), Box<dyn Error>> {
        println!("ch{:<2} program    {:>3}", channel + 1, program + 1);
        Ok(())
    }

    fn sysex(&mut self, data: &[u8]) -> Result<(), Box<dyn Error>> {
        let hex: Vec<String> = data.iter().map(|b| format!("{:02x}", b)).collect();
        println!("sysex ({} bytes): {}", data.len(), hex.join(" "));
        Ok(())
    }
}
