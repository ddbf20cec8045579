/*
 *  lcd/channel.rs
 *
 *  netlcd - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Linux i2c-dev channel: bus open, chip address bind, raw and SMBus writes
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
use std::path::Path;

use linux_embedded_hal::i2cdev::core::I2CDevice;
use linux_embedded_hal::i2cdev::linux::{LinuxI2CDevice, LinuxI2CError};
use log::{debug, info};

use crate::lcd::error::LcdError;

/// Largest payload a single SMBus block transfer can carry
pub const SMBUS_BLOCK_MAX: usize = 32;

/// Byte-level access to one bound device
///
/// Implemented by [`I2cChannel`] for hardware and by the mock channel for
/// tests. A channel is exclusively owned by one transport.
pub trait Channel: Send {
    /// Single-byte write(2) to the bound address; returns bytes accepted
    fn write_byte(&mut self, byte: u8) -> io::Result<usize>;

    /// SMBus "write block data" of at most [`SMBUS_BLOCK_MAX`] bytes
    fn write_block(&mut self, command: u8, block: &[u8]) -> io::Result<()>;
}

/// An open `/dev/i2c-N` node bound to one chip address
///
/// The device node is released when the channel is dropped.
pub struct I2cChannel {
    dev: LinuxI2CDevice,
}

impl I2cChannel {
    /// Open the bus and bind the chip address
    ///
    /// # Arguments
    ///
    /// * `path` - Path to I2C device (e.g., "/dev/i2c-1")
    /// * `address` - 7-bit chip address (PCF8574 backpacks: 0x27 or 0x3F)
    ///
    /// # Returns
    ///
    /// The bound channel, or `ChannelOpen` / `AddressBind` naming the step
    /// that failed
    pub fn open<P: AsRef<Path>>(path: P, address: u8) -> Result<Self, LcdError> {
        let path = path.as_ref();
        info!("Opening LCD on {} at address 0x{:02X}", path.display(), address);

        let dev = LinuxI2CDevice::new(path, address as u16).map_err(|e| match e {
            // the node itself could not be opened
            LinuxI2CError::Io(source) => LcdError::ChannelOpen {
                path: path.display().to_string(),
                source,
            },
            // I2C_SLAVE rejected
            other => LcdError::AddressBind { address, source: other.into() },
        })?;

        debug!("I2C address 0x{:02X} bound", address);
        Ok(Self { dev })
    }
}

impl Channel for I2cChannel {
    fn write_byte(&mut self, byte: u8) -> io::Result<usize> {
        self.dev.write(&[byte])?;
        Ok(1)
    }

    fn write_block(&mut self, command: u8, block: &[u8]) -> io::Result<()> {
        if block.len() > SMBUS_BLOCK_MAX {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("SMBus block of {} bytes exceeds {}", block.len(), SMBUS_BLOCK_MAX),
            ));
        }
        self.dev.smbus_write_block_data(command, block)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_bus_reports_open_step() {
        let err = I2cChannel::open("/dev/netlcd-no-such-bus", 0x3f).err().expect("open must fail");
        assert!(matches!(err, LcdError::ChannelOpen { .. }));
    }

    #[test]
    fn test_bind_on_non_i2c_node_reports_bind_step() {
        // /dev/null opens fine but rejects the I2C_SLAVE ioctl
        let err = I2cChannel::open("/dev/null", 0x27).err().expect("bind must fail");
        match err {
            LcdError::AddressBind { address, .. } => assert_eq!(address, 0x27),
            other => panic!("unexpected error: {other}"),
        }
    }
}
