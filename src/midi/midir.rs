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

use midir::{MidiOutput, MidiOutputConnection};
use midly::{
    live::LiveEvent,
    num::{u14, u4, u7},
    MidiMessage, PitchBend,
};
use tracing::info;

use super::Emitter;

/// A midir-backed MIDI output.
pub struct Device {
    name: String,
    connection: MidiOutputConnection,
}

/// Lists the names of all midir output ports.
pub fn list() -> Result<Vec<String>, Box<dyn Error>> {
    let output = MidiOutput::new("windcore listing")?;
    let mut names = Vec::new();
    for port in output.ports() {
        names.push(output.port_name(&port)?);
    }
    Ok(names)
}

/// Connects to the output port whose name contains the given string.
pub fn get(name: &str) -> Result<Device, Box<dyn Error>> {
    let output = MidiOutput::new("windcore output")?;

    for port in output.ports() {
        let port_name = output.port_name(&port)?;
        if port_name.contains(name) {
            info!(device = port_name, "Connecting to MIDI output.");
            let connection = output
                .connect(&port, "windcore")
                .map_err(|e| format!("error connecting to MIDI output: {}", e))?;
            return Ok(Device {
                name: port_name,
                connection,
            });
        }
    }

    Err(format!("no MIDI output matching '{}' found", name).into())
}

impl Device {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn send_message(&mut self, channel: u8, message: MidiMessage) -> Result<(), Box<dyn Error>> {
        let event = LiveEvent::Midi {
            channel: channel_num(channel)?,
            message,
        };
        let mut buf = Vec::with_capacity(4);
        event.write(&mut buf)?;
        self.connection.send(&buf)?;
        Ok(())
    }
}

fn channel_num(channel: u8) -> Result<u4, Box<dyn Error>> {
    u4::try_from(channel).ok_or_else(|| "MIDI channel out of range".into())
}

fn data_num(value: u8) -> Result<u7, Box<dyn Error>> {
    u7::try_from(value).ok_or_else(|| "MIDI data byte out of range".into())
}

fn bend_num(bend: i16) -> Result<u14, Box<dyn Error>> {
    u14::try_from((bend as i32 + 8192).clamp(0, 16383) as u16)
        .ok_or_else(|| "pitch bend out of range".into())
}

impl Emitter for Device {
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<(), Box<dyn Error>> {
        self.send_message(
            channel,
            MidiMessage::NoteOn {
                key: data_num(note)?,
                vel: data_num(velocity)?,
            },
        )
    }

    fn note_off(&mut self, channel: u8, note: u8, velocity: u8) -> Result<(), Box<dyn Error>> {
        self.send_message(
            channel,
            MidiMessage::NoteOff {
                key: data_num(note)?,
                vel: data_num(velocity)?,
            },
        )
    }

    fn control_change(
        &mut self,
        channel: u8,
        controller: u8,
        value: u8,
    ) -> Result<(), Box<dyn Error>> {
        self.send_message(
            channel,
            MidiMessage::Controller {
                controller: data_num(controller)?,
                value: data_num(value)?,
            },
        )
    }

    fn pitch_bend(&mut self, channel: u8, bend: i16) -> Result<(), Box<dyn Error>> {
        self.send_message(
            channel,
            MidiMessage::PitchBend {
                bend: PitchBend(bend_num(bend)?),
            },
        )
    }

    fn after_touch(&mut self, channel: u8, value: u8) -> Result<(), Box<dyn Error>> {
        self.send_message(
            channel,
            MidiMessage::ChannelAftertouch {
                vel: data_num(value)?,
            },
        )
    }

    fn program_change(&mut self, channel: u8, program: u8) -> Result<(), Box<dyn Error>> {
        self.send_message(
            channel,
            MidiMessage::ProgramChange {
                program: data_num(program)?,
            },
        )
    }

    fn sysex(&mut self, data: &[u8]) -> Result<(), Box<dyn Error>> {
        // Dump frame payloads are nibble-encoded and 7-bit clean, so they
        // frame directly between the sysex status bytes.
        let mut buf = Vec::with_capacity(data.len() + 2);
        buf.push(0xf0);
        buf.extend_from_slice(data);
        buf.push(0xf7);
        self.connection.send(&buf)?;
        Ok(())
    }
}
