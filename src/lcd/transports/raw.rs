/*
 *  lcd/transports/raw.rs
 *
 *  netlcd - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Raw transport: one write(2) per port byte
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

use embedded_hal::delay::DelayNs;
use log::{trace, warn};

use crate::lcd::channel::Channel;
use crate::lcd::error::LcdError;
use crate::lcd::packer::{expand_byte, strobe_pair, Mode};
use crate::lcd::transports::{Frame, Transport, DEFAULT_SETTLE_US};

/// Sequential writer - each port byte is its own bus transaction
///
/// Slow but works on adapters without SMBus block support. Every nibble
/// costs two writes (strobe high, strobe low).
pub struct RawWriter<C, D> {
    channel: C,
    delay: D,
}

impl<C, D> RawWriter<C, D>
where
    C: Channel,
    D: DelayNs + Send,
{
    pub fn new(channel: C, delay: D) -> Self {
        Self { channel, delay }
    }

    /// Write one port byte, returning how many bytes the device accepted
    fn put(&mut self, port: u8) -> usize {
        match self.channel.write_byte(port) {
            Ok(n) => n,
            Err(e) => {
                trace!("raw write of 0x{:02X} failed: {}", port, e);
                0
            }
        }
    }
}

impl<C, D> Transport for RawWriter<C, D>
where
    C: Channel,
    D: DelayNs + Send,
{
    fn name(&self) -> &'static str {
        "raw"
    }

    fn send(
        &mut self,
        mode: Mode,
        backlight: bool,
        frame: Frame<'_>,
        settle_us: u32,
    ) -> Result<(), LcdError> {
        let expected = frame.expanded_len();
        let mut written = 0;

        match frame {
            Frame::Startup(byte) => {
                for port in strobe_pair(mode, backlight, byte >> 4) {
                    written += self.put(port);
                }
            }
            Frame::Bytes(data) => {
                for &byte in data {
                    for port in expand_byte(mode, backlight, byte) {
                        written += self.put(port);
                    }
                }
            }
        }

        self.delay.delay_us(if settle_us != 0 { settle_us } else { DEFAULT_SETTLE_US });

        if written != expected {
            warn!("raw LCD write short: {} of {} bytes", written, expected);
            return Err(LcdError::TransportWrite { expected, written });
        }
        Ok(())
    }
}
