/*
 *  lcd/packer.rs
 *
 *  netlcd - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  PCF8574 backpack bit packing for HD44780 4-bit mode
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

// PCF8574T backpack wiring, LCD pins D0-D3 unused:
//
//   P0 RS   P1 RW   P2 EN   P3 backlight   P4..P7 D4..D7
//
// I2C byte: D7 D6 D5 D4 BL EN RW RS

const RS: u8 = 0x01;
const RW: u8 = 0x02;
const EN: u8 = 0x04;
const BL: u8 = 0x08;

/// Register select - command or character data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Command,
    Data,
}

/// One byte as it appears on the PCF8574 port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportByte(u8);

impl TransportByte {
    /// Pack a nibble with its control lines. Only the low 4 bits of
    /// `nibble` are used.
    #[inline]
    pub fn pack(mode: Mode, backlight: bool, nibble: u8, strobe: bool) -> Self {
        let mut b = (nibble & 0x0F) << 4;
        if mode == Mode::Data { b |= RS; }
        if strobe { b |= EN; }
        if backlight { b |= BL; }
        // write only, never read back
        b &= !RW;
        Self(b)
    }

    /// Reinterpret a byte read back off the port
    pub fn from_bits(bits: u8) -> Self { Self(bits) }

    #[inline]
    pub fn bits(self) -> u8 { self.0 }

    pub fn nibble(self) -> u8 { self.0 >> 4 }

    pub fn mode(self) -> Mode {
        if self.0 & RS != 0 { Mode::Data } else { Mode::Command }
    }

    pub fn backlight(self) -> bool { self.0 & BL != 0 }

    pub fn strobe(self) -> bool { self.0 & EN != 0 }
}

impl From<TransportByte> for u8 {
    fn from(b: TransportByte) -> u8 { b.0 }
}

/// Strobe high then low with the same nibble, latching it into the LCD.
#[inline]
pub fn strobe_pair(mode: Mode, backlight: bool, nibble: u8) -> [u8; 2] {
    [
        TransportByte::pack(mode, backlight, nibble, true).bits(),
        TransportByte::pack(mode, backlight, nibble, false).bits(),
    ]
}

/// Full byte as two latched nibbles, high nibble first.
#[inline]
pub fn expand_byte(mode: Mode, backlight: bool, byte: u8) -> [u8; 4] {
    let [h0, h1] = strobe_pair(mode, backlight, byte >> 4);
    let [l0, l1] = strobe_pair(mode, backlight, byte);
    [h0, h1, l0, l1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibble_and_flags_survive_packing() {
        for n in 0u8..16 {
            for mode in [Mode::Command, Mode::Data] {
                for backlight in [false, true] {
                    for strobe in [false, true] {
                        let b = TransportByte::pack(mode, backlight, n, strobe);
                        assert_eq!(b.nibble(), n);
                        assert_eq!(b.mode(), mode);
                        assert_eq!(b.backlight(), backlight);
                        assert_eq!(b.strobe(), strobe);
                        assert_eq!(b.bits() & RW, 0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_nibble_is_masked() {
        let b = TransportByte::pack(Mode::Command, false, 0xA7, false);
        assert_eq!(b.nibble(), 0x7);
        assert_eq!(b.bits(), 0x70);
    }

    #[test]
    fn test_known_bytes() {
        // data 'T' (0x54) with backlight
        assert_eq!(expand_byte(Mode::Data, true, 0x54), [0x5D, 0x59, 0x4D, 0x49]);
        // function set wake-up, backlight off
        assert_eq!(strobe_pair(Mode::Command, false, 0x3), [0x34, 0x30]);
    }
}
