/*
 *  lcd/mod.rs
 *
 *  netlcd - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  HD44780 character LCD behind a PCF8574 I2C backpack
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

// Wire format and bus access
pub mod packer;
pub mod channel;
pub mod error;

// Raw and SMBus block transports
pub mod transports;

// Protocol engine and session lifecycle
pub mod session;
pub mod factory;

// Re-exports for convenience
pub use packer::{Mode, TransportByte};
pub use channel::{Channel, I2cChannel};
pub use error::LcdError;
pub use transports::{BlockWriter, BoxedTransport, Frame, RawWriter, Transport};
pub use session::{DisplayState, Geometry, LcdSession};
pub use factory::TransportFactory;
