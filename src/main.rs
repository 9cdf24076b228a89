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
use std::path::PathBuf;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};

use windcore::config::{Config, FileNvs, Store};
use windcore::{midi, sim, Instrument};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A breath controller core."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available MIDI output devices.
    Devices {},
    /// Replays a recorded sensor trace through the instrument.
    Play {
        /// The path to the trace file.
        trace_path: PathBuf,
        /// The MIDI device to play through. Defaults to printing events to
        /// the console.
        #[arg(short, long)]
        device_name: Option<String>,
        /// The path to the settings image. Factory settings when omitted.
        #[arg(short, long)]
        settings_path: Option<PathBuf>,
        /// The tick interval in milliseconds, 0 to run unpaced.
        #[arg(short, long, default_value_t = 1)]
        tick_ms: u64,
    },
    /// Prints the configuration dump frame as hex.
    Dump {
        /// The path to the settings image. Factory settings when omitted.
        #[arg(short, long)]
        settings_path: Option<PathBuf>,
    },
}

fn load_config(settings_path: Option<PathBuf>) -> Result<Config, Box<dyn Error>> {
    match settings_path {
        Some(path) => Ok(Store::new(FileNvs::open(path)?).load()),
        None => Ok(Config::default()),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Play {
            trace_path,
            device_name,
            settings_path,
            tick_ms,
        } => {
            let trace = sim::load(&trace_path)?;
            let mut instrument = Instrument::new(load_config(settings_path)?);
            let mut device = midi::get_device(device_name.as_deref().unwrap_or("console"))?;

            sim::run(
                &trace,
                &mut instrument,
                device.as_mut(),
                Duration::from_millis(tick_ms),
            )?;
        }
        Commands::Dump {
            settings_path,
        } => {
            let instrument = Instrument::new(load_config(settings_path)?);
            let frame = instrument.dump_frame();
            let hex: Vec<String> = frame.iter().map(|byte| format!("{:02x}", byte)).collect();
            println!("{}", hex.join(" "));
        }
    }

    Ok(())
}
