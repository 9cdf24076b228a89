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

/// Typed error for configuration persistence and dump/restore failures so
/// callers can distinguish a rejected frame from an I/O problem without
/// string matching.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config record length mismatch: expected {expected} bytes, got {actual}")]
    RecordLength { expected: usize, actual: usize },

    #[error("dump frame length mismatch: expected {expected} bytes, got {actual}")]
    FrameLength { expected: usize, actual: usize },

    #[error("dump frame vendor id mismatch")]
    VendorId,

    #[error("dump frame signature mismatch")]
    Signature,

    #[error("dump frame payload byte outside the 7-bit range")]
    Payload,

    #[error("dump frame checksum mismatch")]
    Checksum,

    #[error("NVS I/O error: {0}")]
    Nvs(#[from] std::io::Error),
}
