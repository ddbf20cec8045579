/*
 *  lcd/transports/block.rs
 *
 *  netlcd - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  SMBus block transport: stage the whole frame, ship it in <=32 byte blocks
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

use arrayvec::ArrayVec;
use embedded_hal::delay::DelayNs;
use log::{trace, warn};

use crate::lcd::channel::{Channel, SMBUS_BLOCK_MAX};
use crate::lcd::error::LcdError;
use crate::lcd::packer::{expand_byte, strobe_pair, Mode};
use crate::lcd::transports::{Frame, Transport, DEFAULT_SETTLE_US};

/// Staging buffer size in port bytes (16 LCD bytes)
pub const STAGING_CAPACITY: usize = 64;

/// SMBus register byte; the PCF8574 ignores it
const BLOCK_COMMAND: u8 = 0x00;

/// Batching writer - the whole frame goes out as one or two block writes
pub struct BlockWriter<C, D> {
    channel: C,
    delay: D,
}

impl<C, D> BlockWriter<C, D>
where
    C: Channel,
    D: DelayNs + Send,
{
    pub fn new(channel: C, delay: D) -> Self {
        Self { channel, delay }
    }

    fn stage(mode: Mode, backlight: bool, frame: Frame<'_>) -> Result<ArrayVec<u8, STAGING_CAPACITY>, LcdError> {
        let too_large = || LcdError::PayloadTooLarge {
            len: frame.expanded_len(),
            max: STAGING_CAPACITY,
        };

        let mut staging = ArrayVec::new();
        match frame {
            Frame::Startup(byte) => {
                staging
                    .try_extend_from_slice(&strobe_pair(mode, backlight, byte >> 4))
                    .map_err(|_| too_large())?;
            }
            Frame::Bytes(data) => {
                for &byte in data {
                    staging
                        .try_extend_from_slice(&expand_byte(mode, backlight, byte))
                        .map_err(|_| too_large())?;
                }
            }
        }
        Ok(staging)
    }

    /// Issue every block; a failed block does not stop the next one
    fn ship(&mut self, staged: &[u8]) -> Option<io::Error> {
        let mut failure = None;
        for block in staged.chunks(SMBUS_BLOCK_MAX) {
            if let Err(e) = self.channel.write_block(BLOCK_COMMAND, block) {
                trace!("SMBus block write of {} bytes failed: {}", block.len(), e);
                failure.get_or_insert(e);
            }
        }
        failure
    }
}

impl<C, D> Transport for BlockWriter<C, D>
where
    C: Channel,
    D: DelayNs + Send,
{
    fn name(&self) -> &'static str {
        "block"
    }

    fn send(
        &mut self,
        mode: Mode,
        backlight: bool,
        frame: Frame<'_>,
        settle_us: u32,
    ) -> Result<(), LcdError> {
        let staged = Self::stage(mode, backlight, frame)?;
        let failure = self.ship(&staged);

        // caller delay and default, always both
        self.delay.delay_us(settle_us);
        self.delay.delay_us(DEFAULT_SETTLE_US);

        match failure {
            Some(e) => {
                warn!("SMBus LCD write failed: {}", e);
                Err(LcdError::BlockWrite(e))
            }
            None => Ok(()),
        }
    }

    fn max_payload(&self) -> Option<usize> {
        Some(STAGING_CAPACITY / 4)
    }
}
