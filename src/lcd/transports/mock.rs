/*
 *  lcd/transports/mock.rs
 *
 *  netlcd - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Mock channel and delay for testing without hardware
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
use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::delay::DelayNs;

use crate::lcd::channel::Channel;
use crate::lcd::packer::{Mode, TransportByte};

/// One recorded bus or timing operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// Single-byte raw write
    Byte(u8),
    /// SMBus block write
    Block { command: u8, data: Vec<u8> },
    /// Blocking delay in microseconds
    Delay(u32),
}

/// Shared state for the mock channel and delay (inspected in tests)
#[derive(Debug, Default)]
pub struct MockBusState {
    /// Every operation in the order it happened
    pub events: Vec<BusEvent>,

    /// Number of raw write attempts so far
    pub byte_attempts: usize,

    /// Number of block write attempts so far
    pub block_attempts: usize,

    /// Fail every write
    pub simulate_write_failure: bool,

    /// Fail the raw write attempt with this index (0-based)
    pub fail_byte_write: Option<usize>,

    /// Fail the block write attempt with this index (0-based)
    pub fail_block_write: Option<usize>,
}

impl MockBusState {
    /// Port bytes that reached the device, flattened across both paths
    pub fn wire_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for ev in &self.events {
            match ev {
                BusEvent::Byte(b) => out.push(*b),
                BusEvent::Block { data, .. } => out.extend_from_slice(data),
                BusEvent::Delay(_) => {}
            }
        }
        out
    }

    /// Sizes of successful block writes in order
    pub fn block_sizes(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|ev| match ev {
                BusEvent::Block { data, .. } => Some(data.len()),
                _ => None,
            })
            .collect()
    }

    pub fn delays(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|ev| match ev {
                BusEvent::Delay(us) => Some(*us),
                _ => None,
            })
            .collect()
    }

    /// Reassemble latched (mode, byte) pairs from the strobe-low bytes.
    ///
    /// Startup frames latch a lone nibble and break the pairing; clear the
    /// init traffic before decoding.
    pub fn decoded(&self) -> Vec<(Mode, u8)> {
        let latched: Vec<TransportByte> = self
            .wire_bytes()
            .into_iter()
            .map(TransportByte::from_bits)
            .filter(|b| !b.strobe())
            .collect();
        latched
            .chunks_exact(2)
            .map(|pair| (pair[0].mode(), (pair[0].nibble() << 4) | pair[1].nibble()))
            .collect()
    }

    /// Forget everything recorded so far, keeping failure switches
    pub fn clear_events(&mut self) {
        self.events.clear();
        self.byte_attempts = 0;
        self.block_attempts = 0;
    }
}

/// Mock channel recording every write
#[derive(Debug, Clone)]
pub struct MockChannel {
    state: Arc<Mutex<MockBusState>>,
}

/// Mock delay recording every sleep instead of sleeping
#[derive(Debug, Clone)]
pub struct MockDelay {
    state: Arc<Mutex<MockBusState>>,
}

/// Handle to the shared mock state
#[derive(Debug, Clone, Default)]
pub struct MockBus {
    state: Arc<Mutex<MockBusState>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(&self) -> MockChannel {
        MockChannel { state: Arc::clone(&self.state) }
    }

    pub fn delay(&self) -> MockDelay {
        MockDelay { state: Arc::clone(&self.state) }
    }

    pub fn state(&self) -> MutexGuard<'_, MockBusState> {
        // a test that panicked mid-send must not hide the recorded events
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn lock(state: &Arc<Mutex<MockBusState>>) -> MutexGuard<'_, MockBusState> {
    state.lock().unwrap_or_else(|p| p.into_inner())
}

impl Channel for MockChannel {
    fn write_byte(&mut self, byte: u8) -> io::Result<usize> {
        let mut state = lock(&self.state);
        let attempt = state.byte_attempts;
        state.byte_attempts += 1;

        if state.simulate_write_failure || state.fail_byte_write == Some(attempt) {
            return Err(io::Error::from_raw_os_error(libc::EREMOTEIO));
        }
        state.events.push(BusEvent::Byte(byte));
        Ok(1)
    }

    fn write_block(&mut self, command: u8, block: &[u8]) -> io::Result<()> {
        let mut state = lock(&self.state);
        let attempt = state.block_attempts;
        state.block_attempts += 1;

        if state.simulate_write_failure || state.fail_block_write == Some(attempt) {
            return Err(io::Error::from_raw_os_error(libc::EREMOTEIO));
        }
        state.events.push(BusEvent::Block { command, data: block.to_vec() });
        Ok(())
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        lock(&self.state).events.push(BusEvent::Delay(ns / 1_000));
    }

    fn delay_us(&mut self, us: u32) {
        lock(&self.state).events.push(BusEvent::Delay(us));
    }
}
