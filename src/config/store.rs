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
use std::fs;
use std::path::PathBuf;

use tracing::{info, warn};

use super::{Config, ConfigError};

/// Size of the logical non-volatile storage array in bytes.
pub const NVS_SIZE: usize = 1024;

/// Magic sentinel preceding the settings record. Erased storage reads back
/// 0xFF so a blank device (or one written by an unknown format) never matches.
const SETTINGS_MAGIC: u16 = 0x5743;

/// Base address of the settings area.
const SETTINGS_BASE: usize = 0;
const MAGIC_ADDR: usize = SETTINGS_BASE;
const RECORD_ADDR: usize = SETTINGS_BASE + 2;

/// Byte-addressable non-volatile storage. The core defines the layout; the
/// physical access mechanism is the implementer's concern. Out-of-range
/// addresses read as erased and ignore writes, matching the clamp-don't-fault
/// posture of the rest of the core.
pub trait Nvs {
    /// Reads a single byte.
    fn read(&self, addr: usize) -> u8;

    /// Writes a single byte.
    fn write(&mut self, addr: usize, value: u8);

    /// Bulk read starting at the given offset.
    fn get(&self, offset: usize, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.read(offset + i);
        }
    }

    /// Bulk write starting at the given offset.
    fn put(&mut self, offset: usize, bytes: &[u8]) {
        for (i, byte) in bytes.iter().enumerate() {
            self.write(offset + i, *byte);
        }
    }

    /// Flushes any buffered writes to the backing medium.
    fn persist(&mut self) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// An in-memory storage array, initialized to the erased state.
pub struct MemoryNvs {
    bytes: [u8; NVS_SIZE],
}

impl MemoryNvs {
    pub fn new() -> MemoryNvs {
        MemoryNvs {
            bytes: [0xff; NVS_SIZE],
        }
    }
}

impl Default for MemoryNvs {
    fn default() -> MemoryNvs {
        MemoryNvs::new()
    }
}

impl Nvs for MemoryNvs {
    fn read(&self, addr: usize) -> u8 {
        self.bytes.get(addr).copied().unwrap_or(0xff)
    }

    fn write(&mut self, addr: usize, value: u8) {
        if let Some(byte) = self.bytes.get_mut(addr) {
            *byte = value;
        }
    }
}

/// File-backed storage for the CLI. The image is read once when opened and
/// written back only on persist, never on every write.
pub struct FileNvs {
    path: PathBuf,
    bytes: [u8; NVS_SIZE],
}

impl FileNvs {
    /// Opens the backing file, reading as much of an existing image as fits.
    /// A missing file yields an erased array.
    pub fn open(path: impl Into<PathBuf>) -> Result<FileNvs, ConfigError> {
        let path = path.into();
        let mut bytes = [0xff; NVS_SIZE];
        match fs::read(&path) {
            Ok(image) => {
                let len = image.len().min(NVS_SIZE);
                bytes[..len].copy_from_slice(&image[..len]);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No storage image found, starting blank.");
            }
            Err(err) => return Err(err.into()),
        }
        Ok(FileNvs { path, bytes })
    }
}

impl Nvs for FileNvs {
    fn read(&self, addr: usize) -> u8 {
        self.bytes.get(addr).copied().unwrap_or(0xff)
    }

    fn write(&mut self, addr: usize, value: u8) {
        if let Some(byte) = self.bytes.get_mut(addr) {
            *byte = value;
        }
    }

    fn persist(&mut self) -> Result<(), ConfigError> {
        fs::write(&self.path, self.bytes)?;
        Ok(())
    }
}

/// Owns a storage device and the settings record layout within it.
pub struct Store<N: Nvs> {
    nvs: N,
}

impl<N: Nvs> Store<N> {
    pub fn new(nvs: N) -> Store<N> {
        Store { nvs }
    }

    /// Loads the configuration record in one bulk read. Blank or unrecognized
    /// storage substitutes factory defaults; a recognized record is clamped
    /// field by field, so garbage can never reach playback.
    pub fn load(&self) -> Config {
        let mut magic = [0u8; 2];
        self.nvs.get(MAGIC_ADDR, &mut magic);
        if u16::from_le_bytes(magic) != SETTINGS_MAGIC {
            warn!("Storage magic mismatch, loading factory defaults.");
            return Config::default();
        }

        let mut record = [0u8; Config::RECORD_LEN];
        self.nvs.get(RECORD_ADDR, &mut record);
        match Config::from_bytes(&record) {
            Ok(config) => config,
            // Unreachable with a fixed-size buffer, but never propagate.
            Err(_) => Config::default(),
        }
    }

    /// Writes the configuration record in one bulk write and flushes it.
    pub fn save(&mut self, config: &Config) -> Result<(), ConfigError> {
        self.nvs.put(MAGIC_ADDR, &SETTINGS_MAGIC.to_le_bytes());
        self.nvs.put(RECORD_ADDR, &config.to_bytes());
        self.nvs.persist()?;
        info!("Configuration saved.");
        Ok(())
    }

    pub fn into_inner(self) -> N {
        self.nvs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_storage_loads_defaults() {
        let store = Store::new(MemoryNvs::new());
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut store = Store::new(MemoryNvs::new());
        let config = Config {
            breath_thr: 333,
            midi_channel: 5,
            vibrato: 7,
            ..Config::default()
        };
        store.save(&config).unwrap();
        assert_eq!(store.load(), config);
    }

    #[test]
    fn test_corrupt_record_is_clamped_not_propagated() {
        let mut store = Store::new(MemoryNvs::new());
        store.save(&Config::default()).unwrap();

        // Scribble over the MIDI channel field (11th u16 in the record).
        let mut nvs = store.into_inner();
        nvs.put(2 + 10 * 2, &0xffffu16.to_le_bytes());
        let store = Store::new(nvs);

        let config = store.load();
        assert_eq!(config.midi_channel, 16);
    }

    #[test]
    fn test_out_of_range_addresses_are_harmless() {
        let mut nvs = MemoryNvs::new();
        nvs.write(NVS_SIZE + 100, 0x42);
        assert_eq!(nvs.read(NVS_SIZE + 100), 0xff);
    }

    #[test]
    fn test_file_nvs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.bin");

        let mut store = Store::new(FileNvs::open(&path).unwrap());
        let config = Config {
            deglitch: 35,
            ..Config::default()
        };
        store.save(&config).unwrap();
        drop(store);

        let store = Store::new(FileNvs::open(&path).unwrap());
        assert_eq!(store.load(), config);
    }

    #[test]
    fn test_file_nvs_missing_file_is_blank() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(FileNvs::open(dir.path().join("missing.bin")).unwrap());
        assert_eq!(store.load(), Config::default());
    }
}
