/*
 *  lcd/error.rs
 *
 *  netlcd - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Unified error types for the LCD subsystem
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::io;
use thiserror::Error;

/// Unified error type for all LCD operations
///
/// None of these abort the process; the caller decides whether to retry,
/// degrade or give up.
#[derive(Debug, Error)]
pub enum LcdError {
    /// The bus device node could not be opened
    #[error("Failed to open I2C bus {path}: {source}")]
    ChannelOpen {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The chip address could not be bound to the open bus
    #[error("Failed to set I2C address 0x{address:02x}: {source}")]
    AddressBind {
        address: u8,
        #[source]
        source: io::Error,
    },

    /// Raw writer: fewer physical writes were accepted than issued
    #[error("I2C write incomplete: {written} of {expected} bytes accepted")]
    TransportWrite { expected: usize, written: usize },

    /// Block writer: an SMBus block transfer was rejected
    #[error("SMBus block write failed: {0}")]
    BlockWrite(#[source] io::Error),

    /// Expanded frame does not fit the transport staging buffer
    #[error("Frame of {len} bytes expands beyond the {max} byte staging buffer")]
    PayloadTooLarge { len: usize, max: usize },

    /// Fewer than all power-on steps were accepted
    #[error("LCD init incomplete: {completed} of {expected} steps succeeded")]
    InitSequenceIncomplete { completed: usize, expected: usize },

    /// Display command issued before a successful init
    #[error("LCD session is not initialized")]
    NotInitialized,

    /// Width/height outside what an HD44780 can address
    #[error("Invalid LCD geometry {width}x{height}")]
    InvalidGeometry { width: u32, height: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = LcdError::AddressBind {
            address: 0x3f,
            source: io::Error::from_raw_os_error(libc::EBUSY),
        };
        assert!(err.to_string().contains("0x3f"));

        let err = LcdError::TransportWrite { expected: 60, written: 59 };
        assert_eq!(err.to_string(), "I2C write incomplete: 59 of 60 bytes accepted");
    }
}
