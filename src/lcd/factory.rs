/*
 *  lcd/factory.rs
 *
 *  netlcd - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Factory for the LCD transport, chosen once at startup
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

use std::path::Path;

use embedded_hal::delay::DelayNs;
use linux_embedded_hal::Delay;
use log::{debug, info};

use crate::config::{DisplayConfig, TransportKind};
use crate::lcd::channel::{Channel, I2cChannel};
use crate::lcd::error::LcdError;
use crate::lcd::session::{Geometry, LcdSession};
use crate::lcd::transports::{BlockWriter, BoxedTransport, RawWriter};

/// Factory for creating transports and sessions from configuration
pub struct TransportFactory;

impl TransportFactory {
    /// Open the bus and wrap it in the requested transport
    pub fn create<P: AsRef<Path>>(
        path: P,
        address: u8,
        kind: TransportKind,
    ) -> Result<BoxedTransport, LcdError> {
        let channel = I2cChannel::open(path, address)?;
        Ok(Self::wrap(channel, Delay, kind))
    }

    /// Build a transport around any channel and delay source
    pub fn wrap<C, D>(channel: C, delay: D, kind: TransportKind) -> BoxedTransport
    where
        C: Channel + 'static,
        D: DelayNs + Send + 'static,
    {
        debug!("Using {:?} LCD transport", kind);
        match kind {
            TransportKind::Raw => Box::new(RawWriter::new(channel, delay)),
            TransportKind::Block => Box::new(BlockWriter::new(channel, delay)),
        }
    }

    /// Open and initialize a session from configuration
    ///
    /// A session whose init failed is closed again before the error is
    /// returned; it cannot be used for display commands.
    pub fn open_session(config: &DisplayConfig) -> Result<LcdSession, LcdError> {
        Self::validate_config(config)?;
        let bus = config.bus.clone().unwrap_or_default();

        let mut lcd = LcdSession::open(&bus.bus, bus.address, config.transport_kind())?;
        lcd.init(config.width(), config.height(), config.backlight())?;
        info!(
            "LCD on {} (0x{:02X}) initialized, {} transport",
            bus.bus,
            bus.address,
            lcd.transport_name()
        );
        Ok(lcd)
    }

    /// Validate a configuration without touching hardware
    pub fn validate_config(config: &DisplayConfig) -> Result<(), LcdError> {
        Geometry::new(config.width(), config.height()).map(|_| ())
    }
}
