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
use tracing::info;

use super::{Config, ConfigError};

/// Non-commercial vendor id prefixed to the dump frame.
pub const VENDOR_ID: [u8; 3] = [0x7d, 0x00, 0x00];

/// Literal signature naming this as a configuration dump, format version "00".
pub const SIGNATURE: &[u8; 8] = b"WINDCc00";

/// Total frame length: vendor id, signature, nibble-encoded record, two
/// checksum nibbles.
pub const FRAME_LEN: usize = VENDOR_ID.len() + SIGNATURE.len() + Config::RECORD_LEN * 2 + 2;

const RECORD_START: usize = VENDOR_ID.len() + SIGNATURE.len();

fn checksum(record: &[u8]) -> u8 {
    record.iter().fold(0, |acc, byte| acc ^ byte)
}

/// Splits bytes into nibbles, low nibble first. Record bytes can carry any
/// value, so they are encoded down to the 7-bit sysex data range rather than
/// sent raw.
fn encode_nibbles(bytes: &[u8], out: &mut Vec<u8>) {
    for byte in bytes {
        out.push(byte & 0x0f);
        out.push(byte >> 4);
    }
}

fn decode_nibbles(nibbles: &[u8]) -> Result<Vec<u8>, ConfigError> {
    let mut bytes = Vec::with_capacity(nibbles.len() / 2);
    for pair in nibbles.chunks_exact(2) {
        if pair[0] > 0x0f || pair[1] > 0x0f {
            return Err(ConfigError::Payload);
        }
        bytes.push(pair[0] | (pair[1] << 4));
    }
    Ok(bytes)
}

/// Builds the bulk dump frame for the given configuration. The frame is
/// handed to the MIDI emitter as a single system-exclusive payload; every
/// byte stays below 0x80 so the frame survives a real sysex transport.
pub fn dump_frame(config: &Config) -> Vec<u8> {
    let record = config.to_bytes();
    let mut frame = Vec::with_capacity(FRAME_LEN);
    frame.extend_from_slice(&VENDOR_ID);
    frame.extend_from_slice(SIGNATURE);
    encode_nibbles(&record, &mut frame);
    encode_nibbles(&[checksum(&record)], &mut frame);
    frame
}

/// Validates a received dump frame and applies it to the given configuration.
/// A frame with the wrong length, vendor id, signature, payload encoding or
/// checksum is rejected outright and the configuration is left untouched.
pub fn apply_frame(config: &mut Config, frame: &[u8]) -> Result<(), ConfigError> {
    if frame.len() != FRAME_LEN {
        return Err(ConfigError::FrameLength {
            expected: FRAME_LEN,
            actual: frame.len(),
        });
    }
    if frame[..VENDOR_ID.len()] != VENDOR_ID {
        return Err(ConfigError::VendorId);
    }
    if &frame[VENDOR_ID.len()..RECORD_START] != SIGNATURE {
        return Err(ConfigError::Signature);
    }

    let payload = decode_nibbles(&frame[RECORD_START..])?;
    let (record, check) = payload.split_at(Config::RECORD_LEN);
    if checksum(record) != check[0] {
        return Err(ConfigError::Checksum);
    }

    *config = Config::from_bytes(record)?;
    info!("Configuration restored from dump frame.");
    Ok(())
}
