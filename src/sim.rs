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
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::instrument::{Instrument, RawInputs};
use crate::keys::Keys;
use crate::midi::Emitter;
use crate::sensors::SensorFrame;

/// A recorded sensor trace. Each step holds the raw sensor levels and held
/// keys for a span of ticks, so sustained gestures compress to one entry.
#[derive(Debug, Deserialize)]
pub struct Trace {
    pub steps: Vec<Step>,
}

/// One span of a trace.
#[derive(Debug, Deserialize)]
pub struct Step {
    /// Number of ticks this step holds for.
    #[serde(default = "default_ticks")]
    pub ticks: u32,
    #[serde(default)]
    pub breath: i32,
    #[serde(default)]
    pub bite: i32,
    #[serde(default)]
    pub extra: i32,
    #[serde(default)]
    pub vibrato: i32,
    /// Held keys as space-separated tokens: `K1`-`K7`, `SP`, `PK`, `HB`.
    #[serde(default)]
    pub keys: String,
}

fn default_ticks() -> u32 {
    1
}

impl Step {
    /// Parses the key token list into key levels.
    pub fn keys(&self) -> Result<Keys, Box<dyn Error>> {
        let mut keys = Keys::default();
        for token in self.keys.split_whitespace() {
            match token {
                "K1" => keys.k1 = true,
                "K2" => keys.k2 = true,
                "K3" => keys.k3 = true,
                "K4" => keys.k4 = true,
                "K5" => keys.k5 = true,
                "K6" => keys.k6 = true,
                "K7" => keys.k7 = true,
                "SP" => keys.special = true,
                "PK" => keys.pinky = true,
                "HB" => keys.half_bend = true,
                _ => return Err(format!("unrecognized key token {token}").into()),
            }
        }
        Ok(keys)
    }

    fn inputs(&self) -> Result<RawInputs, Box<dyn Error>> {
        Ok(RawInputs {
            sensors: SensorFrame {
                breath: self.breath,
                bite: self.bite,
                extra: self.extra,
                vibrato: self.vibrato,
            },
            keys: self.keys()?,
        })
    }
}

/// Loads a trace from a YAML file.
pub fn load(file: &Path) -> Result<Trace, Box<dyn Error>> {
    let trace: Trace = serde_yml::from_str(&fs::read_to_string(file)?)?;
    Ok(trace)
}

/// Replays a trace through the instrument at a fixed tick interval. A zero
/// interval runs the trace as fast as possible.
pub fn run(
    trace: &Trace,
    instrument: &mut Instrument,
    emitter: &mut dyn Emitter,
    tick: Duration,
) -> Result<(), Box<dyn Error>> {
    let total: u32 = trace.steps.iter().map(|step| step.ticks.max(1)).sum();
    info!(
        steps = trace.steps.len(),
        ticks = total,
        "Replaying trace."
    );

    for step in &trace.steps {
        let inputs = step.inputs()?;
        for _ in 0..step.ticks.max(1) {
            instrument.tick(inputs, emitter)?;
            if !tick.is_zero() {
                spin_sleep::sleep(tick);
            }
        }
    }

    Ok(())
}
