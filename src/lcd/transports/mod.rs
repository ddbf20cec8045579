/*
 *  lcd/transports/mod.rs
 *
 *  netlcd - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Frame transports: raw byte writer and SMBus block writer
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

use crate::lcd::error::LcdError;
use crate::lcd::packer::Mode;

pub mod raw;
pub mod block;

// Mock channel and delay, usable without hardware
pub mod mock;

pub use raw::RawWriter;
pub use block::BlockWriter;

/// Settle time appended after every transmission, in microseconds
pub const DEFAULT_SETTLE_US: u32 = 200;

/// What a single `send` puts on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Power-on wake-up: only the high nibble of the byte is latched
    Startup(u8),

    /// Whole bytes, each latched as high then low nibble
    Bytes(&'a [u8]),
}

impl Frame<'_> {
    /// Number of port bytes this frame expands to
    pub fn expanded_len(&self) -> usize {
        match self {
            Frame::Startup(_) => 2,
            Frame::Bytes(b) => b.len() * 4,
        }
    }
}

/// Minimal transport abstraction - every LCD backend implements this
///
/// A transport owns the open channel and the delay source. Sends are
/// blocking; the settle delay is slept to completion before returning.
pub trait Transport: Send {
    /// Short backend name for logging
    fn name(&self) -> &'static str;

    /// Push one frame with the given register select and backlight bit,
    /// then wait the settle delay.
    fn send(
        &mut self,
        mode: Mode,
        backlight: bool,
        frame: Frame<'_>,
        settle_us: u32,
    ) -> Result<(), LcdError>;

    /// Largest `Frame::Bytes` payload accepted in one send, if bounded
    fn max_payload(&self) -> Option<usize> {
        None
    }
}

/// Type alias for boxed transport trait objects
pub type BoxedTransport = Box<dyn Transport>;
