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
//! The real-time control core of a breath-driven wind instrument controller.
//!
//! The core converts per-tick sensor readings (breath pressure, bite pressure,
//! an auxiliary sensor and a vibrato sensor) plus a key-fingering pattern into
//! MIDI note events and continuous controller streams. Everything advances on
//! a fixed sampling tick with no blocking; debounce and rise-time windows are
//! tick counters, never sleeps.

pub mod config;
pub mod controllers;
pub mod instrument;
pub mod keys;
pub mod midi;
pub mod note;
pub mod sensors;
pub mod sim;

pub use config::Config;
pub use instrument::{Instrument, RawInputs};
pub use keys::Keys;
pub use sensors::SensorFrame;
