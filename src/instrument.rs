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

use tracing::{debug, info};

use crate::config::{self, Config, ConfigError, Nvs, Store};
use crate::controllers::{ControlInputs, ControllerEngine};
use crate::keys::{KeyResolver, Keys};
use crate::midi::Emitter;
use crate::note::{NoteState, NoteStateMachine};
use crate::sensors::{SensorFrame, SensorSampler};

/// Raw inputs for one tick: the analog sensor frame and the key levels.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawInputs {
    pub sensors: SensorFrame,
    pub keys: Keys,
}

/// The complete instrument core. Owns the configuration and the per-tick
/// pipeline: sensor sampling, key resolution, the note state machine and the
/// continuous controller engine.
pub struct Instrument {
    config: Config,
    sampler: SensorSampler,
    resolver: KeyResolver,
    note: NoteStateMachine,
    controllers: ControllerEngine,
    last_program: Option<u8>,
}

impl Instrument {
    pub fn new(config: Config) -> Instrument {
        Instrument {
            config,
            sampler: SensorSampler::new(),
            resolver: KeyResolver::new(),
            note: NoteStateMachine::new(),
            controllers: ControllerEngine::new(),
            last_program: None,
        }
    }

    /// Boots the instrument from persistent storage, falling back to factory
    /// settings when the stored record is missing or unrecognized.
    pub fn boot<N: Nvs>(store: &Store<N>) -> Instrument {
        let config = store.load();
        info!(%config, "Instrument booted.");
        Instrument::new(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mutable access for the configuration surface. Changes take effect on
    /// the next tick; call [`save`] to persist them.
    ///
    /// [`save`]: Instrument::save
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Persists the current configuration.
    pub fn save<N: Nvs>(&self, store: &mut Store<N>) -> Result<(), ConfigError> {
        store.save(&self.config)
    }

    /// The note currently sounding, if any.
    pub fn sounding(&self) -> Option<u8> {
        self.note.sounding()
    }

    /// Runs one control tick: updates every engine from the raw inputs and
    /// sends the resulting events to the emitter in a fixed order, program
    /// change first, then note events, then continuous controllers.
    pub fn tick(
        &mut self,
        inputs: RawInputs,
        emitter: &mut dyn Emitter,
    ) -> Result<(), Box<dyn Error>> {
        self.sampler.update(inputs.sensors);
        let frame = self.sampler.current();

        if let Some(program) = self
            .resolver
            .update(inputs.keys, self.note.is_active(), &self.config)
        {
            self.config.patch = program as u16 + 1;
        }

        let resolved = self.resolver.note(&self.config);
        let was_active = self.note.is_active();
        let note_events = self.note.advance(frame.breath, resolved, &self.config);

        // A fresh articulation advances the rotation cycle, so the pitch that
        // actually sounds after the rise delay picks up the new offset.
        if !was_active && matches!(self.note.state(), NoteState::RiseWait { .. }) {
            self.resolver.advance_rotation(&self.config);
        }

        let channel = self.config.channel();

        let program = (self.config.patch.clamp(1, 128) - 1) as u8;
        if self.last_program != Some(program) {
            self.last_program = Some(program);
            debug!(program, "Program change.");
            emitter.program_change(channel, program)?;
        }

        for event in &note_events {
            event.send(emitter, channel)?;
        }

        let control_inputs = ControlInputs {
            frame,
            half_bend: self.resolver.half_bend_scaling(&self.config),
            sounding: self.note.sounding(),
            resolved,
        };
        for event in self.controllers.advance(&control_inputs, &self.config) {
            event.send(emitter, channel)?;
        }

        Ok(())
    }

    /// Serializes the configuration into a system-exclusive dump frame.
    pub fn dump_frame(&self) -> Vec<u8> {
        config::dump_frame(&self.config)
    }

    /// Sends the configuration dump out the emitter.
    pub fn send_dump(&self, emitter: &mut dyn Emitter) -> Result<(), Box<dyn Error>> {
        info!("Sending configuration dump.");
        emitter.sysex(&self.dump_frame())
    }

    /// Restores the configuration from a received dump frame. Invalid frames
    /// leave the configuration untouched.
    pub fn apply_dump(&mut self, frame: &[u8]) -> Result<(), ConfigError> {
        config::apply_frame(&mut self.config, frame)?;
        info!(config = %self.config, "Configuration restored from dump.");
        Ok(())
    }
}
