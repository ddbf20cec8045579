/*
 *  lcd/session.rs
 *
 *  netlcd - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  HD44780 protocol engine: power-on handshake, addressing, text, control
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

use std::fmt::{self, Write as _};
use std::path::Path;

use arrayvec::ArrayVec;
use log::{debug, info, warn};

use crate::config::TransportKind;
use crate::lcd::error::LcdError;
use crate::lcd::factory::TransportFactory;
use crate::lcd::packer::Mode;
use crate::lcd::transports::{BoxedTransport, Frame};

/*
    DDRAM Address (16x4 Line)
    |00|01|02|03|04|05|06|07|08|09|0A|0B|0C|0D|0E|0F| --+
    |40|41|42|43|44|45|46|47|48|49|4A|4B|4C|4D|4E|4F| --|--+
    |10|11|12|13|14|15|16|17|18|19|1A|1B|1C|1D|1E|1F| <-+  |
    |50|51|52|53|54|55|56|57|58|59|5A|5B|5C|5D|5E|5F| <----+

    DDRAM Address (20x4 Line)
    |00|01|02|03|04|05|06|07|08|09|0A|0B|0C|0D|0E|0F|10|11|12|13| --+
    |40|41|42|43|44|45|46|47|48|49|4A|4B|4C|4D|4E|4F|50|51|52|53| --|--+
    |14|15|16|17|18|19|1A|1B|1C|1D|1E|1F|20|21|22|23|24|25|26|27| <-+  |
    |54|55|56|57|58|59|5A|5B|5C|5D|5E|5F|60|61|62|63|64|65|66|67| <----+
*/

pub const DEFAULT_LCD_WIDTH: u8 = 16;
pub const DEFAULT_LCD_HEIGHT: u8 = 2;

/// One DDRAM line holds 40 characters
pub const LCD_MAX_WIDTH: usize = 40;

const CMD_CLEAR: u8 = 0x01;
const CMD_DISPLAY_CONTROL: u8 = 0x08;
const CMD_SET_DDRAM: u8 = 0x80;
const ROW1_BASE: u8 = 0xC0;

/// Clear needs 1.52ms on the controller
const CLEAR_SETTLE_US: u32 = 2000;

struct InitStep {
    frame: Frame<'static>,
    settle_us: u32,
    what: &'static str,
}

/// Power-on handshake; backlight stays off until the last step.
const INIT_SEQUENCE: [InitStep; 9] = [
    InitStep { frame: Frame::Startup(0x30), settle_us: 15_000, what: "wake-up 1" },
    InitStep { frame: Frame::Startup(0x30), settle_us: 4100, what: "wake-up 2" },
    InitStep { frame: Frame::Startup(0x30), settle_us: 100, what: "wake-up 3" },
    InitStep { frame: Frame::Startup(0x20), settle_us: 4100, what: "4-bit mode" },
    // 2 line, 5x8 font
    InitStep { frame: Frame::Bytes(&[0x28]), settle_us: 100, what: "function set" },
    InitStep { frame: Frame::Bytes(&[0x08]), settle_us: 100, what: "display off" },
    InitStep { frame: Frame::Bytes(&[0x01]), settle_us: 100, what: "clear" },
    // increment, no shift
    InitStep { frame: Frame::Bytes(&[0x06]), settle_us: 100, what: "entry mode" },
    InitStep { frame: Frame::Bytes(&[0x0C]), settle_us: 100, what: "display on" },
];

pub const INIT_STEPS: usize = INIT_SEQUENCE.len();

/// Character grid of the attached panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    width: u8,
    height: u8,
}

impl Default for Geometry {
    fn default() -> Self {
        Self { width: DEFAULT_LCD_WIDTH, height: DEFAULT_LCD_HEIGHT }
    }
}

impl Geometry {
    /// Width 1..=40, height 1, 2 or 4
    pub fn new(width: u32, height: u32) -> Result<Self, LcdError> {
        let width_ok = (1..=LCD_MAX_WIDTH as u32).contains(&width);
        let height_ok = matches!(height, 1 | 2 | 4);
        if !width_ok || !height_ok {
            return Err(LcdError::InvalidGeometry { width, height });
        }
        Ok(Self { width: width as u8, height: height as u8 })
    }

    pub fn width(&self) -> u8 { self.width }

    pub fn height(&self) -> u8 { self.height }

    /// DDRAM base of a row. Rows 2 and 3 continue rows 0 and 1; any other
    /// row falls back to row 0.
    pub fn row_base(&self, y: u8) -> u8 {
        match y {
            1 => ROW1_BASE,
            2 => CMD_SET_DDRAM.wrapping_add(self.width),
            3 => ROW1_BASE.wrapping_add(self.width),
            _ => CMD_SET_DDRAM,
        }
    }

    /// Set-DDRAM command byte for a cell. Columns past the edge clamp to
    /// `width` itself, one past the last visible cell.
    pub fn address(&self, x: u8, y: u8) -> u8 {
        self.row_base(y).wrapping_add(x.min(self.width))
    }
}

/// What the engine last told the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayState {
    pub backlight: bool,
    pub display_on: bool,
    pub cursor_on: bool,
    pub cursor_blink: bool,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self { backlight: true, display_on: false, cursor_on: false, cursor_blink: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Ready,
}

/// Fixed-size line buffer; formatting past the limit is dropped.
struct LineBuffer {
    buf: ArrayVec<u8, LCD_MAX_WIDTH>,
    limit: usize,
}

impl LineBuffer {
    fn new(limit: u8) -> Self {
        Self { buf: ArrayVec::new(), limit: (limit as usize).min(LCD_MAX_WIDTH) }
    }

    fn format(limit: u8, args: fmt::Arguments<'_>) -> Self {
        let mut line = Self::new(limit);
        // write_str never fails, truncation is silent
        let _ = line.write_fmt(args);
        line
    }

    fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl fmt::Write for LineBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.limit.saturating_sub(self.buf.len());
        let bytes = s.as_bytes();
        self.buf
            .try_extend_from_slice(&bytes[..bytes.len().min(room)])
            .map_err(|_| fmt::Error)
    }
}

/// One open display: the transport (which owns the bus handle), the panel
/// geometry and the last commanded state
///
/// Every operation takes `&mut self`; a session has exactly one driver.
/// Dropping the session switches the backlight off and releases the bus.
pub struct LcdSession {
    transport: BoxedTransport,
    geometry: Geometry,
    state: DisplayState,
    phase: Phase,
}

impl LcdSession {
    /// Wrap an already-open transport
    pub fn new(transport: BoxedTransport) -> Self {
        Self {
            transport,
            geometry: Geometry::default(),
            state: DisplayState::default(),
            phase: Phase::Uninitialized,
        }
    }

    /// Open the bus, bind the chip address and pick the transport
    ///
    /// # Arguments
    ///
    /// * `path` - Path to I2C device (e.g., "/dev/i2c-1")
    /// * `address` - chip address of the backpack (typically 0x27 or 0x3F)
    /// * `kind` - raw byte writes or SMBus block writes
    pub fn open<P: AsRef<Path>>(path: P, address: u8, kind: TransportKind) -> Result<Self, LcdError> {
        let transport = TransportFactory::create(path, address, kind)?;
        Ok(Self::new(transport))
    }

    pub fn geometry(&self) -> Geometry { self.geometry }

    pub fn state(&self) -> DisplayState { self.state }

    pub fn is_ready(&self) -> bool { self.phase == Phase::Ready }

    pub fn transport_name(&self) -> &'static str { self.transport.name() }

    /// Run the power-on handshake and switch the display on
    ///
    /// All nine steps are always issued; the session becomes ready only if
    /// every one of them was accepted.
    pub fn init(&mut self, width: u32, height: u32, backlight: bool) -> Result<(), LcdError> {
        self.geometry = Geometry::new(width, height)?;
        self.state = DisplayState { backlight, ..DisplayState::default() };
        self.phase = Phase::Uninitialized;

        let mut completed = 0;
        for (i, step) in INIT_SEQUENCE.iter().enumerate() {
            let bl = if i + 1 == INIT_STEPS { backlight } else { false };
            match self.transport.send(Mode::Command, bl, step.frame, step.settle_us) {
                Ok(()) => {
                    debug!("LCD init step {} ({}) ok", i + 1, step.what);
                    completed += 1;
                }
                Err(e) => warn!("LCD init step {} ({}) failed: {}", i + 1, step.what, e),
            }
        }

        if completed < INIT_STEPS {
            return Err(LcdError::InitSequenceIncomplete { completed, expected: INIT_STEPS });
        }

        self.state.display_on = true;
        self.phase = Phase::Ready;
        info!(
            "LCD {}x{} ready ({} transport, backlight {})",
            self.geometry.width,
            self.geometry.height,
            self.transport.name(),
            if backlight { "on" } else { "off" }
        );
        Ok(())
    }

    /// Move the cursor; columns past the edge clamp, unknown rows map to row 0
    pub fn goto(&mut self, x: u8, y: u8) -> Result<(), LcdError> {
        self.ensure_ready()?;
        let addr = self.geometry.address(x, y);
        self.command(addr, 0)
    }

    /// Write text at (x, y), truncated to the panel width
    pub fn print(&mut self, x: u8, y: u8, text: &str) -> Result<(), LcdError> {
        self.print_fmt(x, y, format_args!("{}", text))
    }

    /// Format into a width-sized line buffer and write it at (x, y)
    ///
    /// ```ignore
    /// lcd.print_fmt(0, 1, format_args!("count = {}", n))?;
    /// ```
    pub fn print_fmt(&mut self, x: u8, y: u8, args: fmt::Arguments<'_>) -> Result<(), LcdError> {
        self.ensure_ready()?;
        let line = LineBuffer::format(self.geometry.width, args);
        self.goto(x, y)?;
        self.data(line.as_bytes())
    }

    /// Clear the whole display when `line < 0`, otherwise blank one row
    ///
    /// A row past the configured height is pulled back to the last row.
    pub fn clear(&mut self, line: i32) -> Result<(), LcdError> {
        self.ensure_ready()?;
        if line < 0 {
            return self.command(CMD_CLEAR, CLEAR_SETTLE_US);
        }

        let height = self.geometry.height as i32;
        let row = if line > height { height - 1 } else { line };
        self.goto(0, row as u8)?;

        let blanks = [b' '; LCD_MAX_WIDTH];
        self.data(&blanks[..self.geometry.width as usize])
    }

    /// Switch the backlight; the flag is recorded even if the send fails
    pub fn set_backlight(&mut self, on: bool) -> Result<(), LcdError> {
        self.ensure_ready()?;
        self.backlight_frame(on)
    }

    /// Display control command; also sets the backlight
    pub fn set_control(
        &mut self,
        backlight: bool,
        display_on: bool,
        cursor_on: bool,
        blink: bool,
    ) -> Result<(), LcdError> {
        self.ensure_ready()?;
        self.state = DisplayState {
            backlight,
            display_on,
            cursor_on,
            cursor_blink: blink,
        };
        let cmd = CMD_DISPLAY_CONTROL
            | (display_on as u8) << 2
            | (cursor_on as u8) << 1
            | blink as u8;
        self.command(cmd, 0)
    }

    /// Backlight off, then release the bus
    pub fn close(self) {
        drop(self);
    }

    fn ensure_ready(&self) -> Result<(), LcdError> {
        match self.phase {
            Phase::Ready => Ok(()),
            Phase::Uninitialized => Err(LcdError::NotInitialized),
        }
    }

    // a no-op command byte carrying only the backlight bit
    fn backlight_frame(&mut self, on: bool) -> Result<(), LcdError> {
        self.state.backlight = on;
        self.command(0x00, 0)
    }

    fn command(&mut self, byte: u8, settle_us: u32) -> Result<(), LcdError> {
        self.transport
            .send(Mode::Command, self.state.backlight, Frame::Bytes(&[byte]), settle_us)
    }

    fn data(&mut self, bytes: &[u8]) -> Result<(), LcdError> {
        if bytes.is_empty() {
            return Ok(());
        }
        let chunk = self.transport.max_payload().unwrap_or(bytes.len()).max(1);
        for part in bytes.chunks(chunk) {
            self.transport
                .send(Mode::Data, self.state.backlight, Frame::Bytes(part), 0)?;
        }
        Ok(())
    }
}

impl Drop for LcdSession {
    fn drop(&mut self) {
        if let Err(e) = self.backlight_frame(false) {
            debug!("backlight off on close failed: {}", e);
        }
        info!("LCD session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lcd::transports::mock::{BusEvent, MockBus};
    use crate::lcd::transports::{BlockWriter, RawWriter, DEFAULT_SETTLE_US};

    fn block_session(bus: &MockBus) -> LcdSession {
        LcdSession::new(Box::new(BlockWriter::new(bus.channel(), bus.delay())))
    }

    fn raw_session(bus: &MockBus) -> LcdSession {
        LcdSession::new(Box::new(RawWriter::new(bus.channel(), bus.delay())))
    }

    fn ready(bus: &MockBus, width: u32, height: u32) -> LcdSession {
        let mut lcd = block_session(bus);
        lcd.init(width, height, true).unwrap();
        bus.state().clear_events();
        lcd
    }

    #[test]
    fn test_transport_name_follows_writer() {
        let bus = MockBus::new();
        assert_eq!(block_session(&bus).transport_name(), "block");
        assert_eq!(raw_session(&bus).transport_name(), "raw");
    }

    #[test]
    fn test_geometry_validation() {
        assert!(Geometry::new(16, 2).is_ok());
        assert!(Geometry::new(20, 4).is_ok());
        assert!(Geometry::new(8, 1).is_ok());
        assert!(Geometry::new(16, 3).is_err());
        assert!(Geometry::new(0, 2).is_err());
        assert!(Geometry::new(41, 2).is_err());
    }

    #[test]
    fn test_row_bases() {
        let g = Geometry::new(20, 4).unwrap();
        assert_eq!(g.row_base(0), 0x80);
        assert_eq!(g.row_base(1), 0xC0);
        assert_eq!(g.row_base(2), 0x80 + 20);
        assert_eq!(g.row_base(3), 0xC0 + 20);
        assert_eq!(g.row_base(4), 0x80);
        assert_eq!(g.row_base(200), 0x80);
    }

    #[test]
    fn test_column_clamps_to_width() {
        let g = Geometry::new(16, 2).unwrap();
        assert_eq!(g.address(16, 1), g.address(21, 1));
        assert_eq!(g.address(16, 1), 0xC0 + 16);
        assert_eq!(g.address(15, 0), 0x80 + 15);
    }

    #[test]
    fn test_init_sequence_on_the_wire() {
        let bus = MockBus::new();
        let mut lcd = raw_session(&bus);

        lcd.init(16, 2, true).unwrap();
        assert!(lcd.is_ready());

        let state = bus.state();
        let wire = state.wire_bytes();
        // 4 startup frames of 2 bytes + 5 full bytes of 4
        assert_eq!(wire.len(), 4 * 2 + 5 * 4);
        assert_eq!(&wire[..8], &[0x34, 0x30, 0x34, 0x30, 0x34, 0x30, 0x24, 0x20]);
        // backlight stays off until the display-on byte
        assert!(wire[..24].iter().all(|b| b & 0x08 == 0));
        assert!(wire[24..].iter().all(|b| b & 0x08 != 0));
        assert_eq!(
            state.delays(),
            vec![15_000, 4100, 100, 4100, 100, 100, 100, 100, 100]
        );
    }

    #[test]
    fn test_init_fails_on_any_single_step() {
        for failing in 0..INIT_STEPS {
            let bus = MockBus::new();
            bus.state().fail_block_write = Some(failing);
            let mut lcd = block_session(&bus);

            let err = lcd.init(16, 2, true).unwrap_err();
            assert!(matches!(
                err,
                LcdError::InitSequenceIncomplete { completed: 8, expected: 9 }
            ));
            assert!(!lcd.is_ready());
            // every step is still attempted
            assert_eq!(bus.state().block_attempts, INIT_STEPS);
        }
    }

    #[test]
    fn test_operations_require_init() {
        let bus = MockBus::new();
        let mut lcd = block_session(&bus);

        assert!(matches!(lcd.goto(0, 0), Err(LcdError::NotInitialized)));
        assert!(matches!(lcd.print(0, 0, "x"), Err(LcdError::NotInitialized)));
        assert!(matches!(lcd.clear(-1), Err(LcdError::NotInitialized)));
        assert_eq!(bus.state().block_attempts, 0);
    }

    #[test]
    fn test_init_rejects_bad_geometry_without_traffic() {
        let bus = MockBus::new();
        let mut lcd = block_session(&bus);
        assert!(matches!(lcd.init(16, 3, true), Err(LcdError::InvalidGeometry { .. })));
        assert_eq!(bus.state().block_attempts, 0);
    }

    #[test]
    fn test_print_truncates_to_width() {
        let bus = MockBus::new();
        let mut lcd = ready(&bus, 16, 2);

        lcd.print(0, 1, "Speed=1000, FULL duplex").unwrap();

        let decoded = bus.state().decoded();
        assert_eq!(decoded[0], (Mode::Command, 0xC0));
        let text: Vec<u8> = decoded[1..].iter().map(|(_, b)| *b).collect();
        assert_eq!(text, b"Speed=1000, FULL");
        assert!(decoded[1..].iter().all(|(m, _)| *m == Mode::Data));
    }

    #[test]
    fn test_print_fmt() {
        let bus = MockBus::new();
        let mut lcd = ready(&bus, 16, 2);

        lcd.print_fmt(0, 1, format_args!("count = {}", 42)).unwrap();

        let text: Vec<u8> = bus.state().decoded()[1..].iter().map(|(_, b)| *b).collect();
        assert_eq!(text, b"count = 42");
    }

    #[test]
    fn test_wide_panel_splits_data_frames_on_block_transport() {
        let bus = MockBus::new();
        let mut lcd = ready(&bus, 20, 4);

        lcd.print(0, 3, "01234567890123456789").unwrap();

        // goto + 16 byte frame + 4 byte frame
        assert_eq!(bus.state().block_sizes(), vec![4, 32, 32, 16]);
        let text: Vec<u8> = bus.state().decoded()[1..].iter().map(|(_, b)| *b).collect();
        assert_eq!(text, b"01234567890123456789");
    }

    #[test]
    fn test_failed_goto_aborts_print() {
        let bus = MockBus::new();
        let mut lcd = ready(&bus, 16, 2);
        bus.state().fail_block_write = Some(0);

        assert!(lcd.print(0, 0, "hello").is_err());
        assert_eq!(bus.state().block_attempts, 1);
    }

    #[test]
    fn test_clear_all() {
        let bus = MockBus::new();
        let mut lcd = ready(&bus, 16, 2);

        lcd.clear(-1).unwrap();

        let state = bus.state();
        assert_eq!(state.decoded(), vec![(Mode::Command, 0x01)]);
        assert_eq!(state.delays(), vec![2000, DEFAULT_SETTLE_US]);
    }

    #[test]
    fn test_clear_line_writes_width_spaces() {
        let bus = MockBus::new();
        let mut lcd = ready(&bus, 16, 2);

        lcd.clear(1).unwrap();

        let decoded = bus.state().decoded();
        assert_eq!(decoded[0], (Mode::Command, 0xC0));
        assert_eq!(decoded.len(), 1 + 16);
        assert!(decoded[1..].iter().all(|&(m, b)| m == Mode::Data && b == b' '));
    }

    #[test]
    fn test_clear_line_past_height_uses_last_row() {
        let bus = MockBus::new();
        let mut lcd = ready(&bus, 16, 2);

        lcd.clear(7).unwrap();
        assert_eq!(bus.state().decoded()[0], (Mode::Command, 0xC0));
    }

    #[test]
    fn test_clear_line_at_height_is_not_clamped() {
        let bus = MockBus::new();
        let mut lcd = ready(&bus, 16, 2);

        // row 2 passes through and addresses like a third row
        lcd.clear(2).unwrap();
        let decoded = bus.state().decoded();
        assert_eq!(decoded[0], (Mode::Command, 0x80 + 16));
        assert_eq!(decoded.len(), 1 + 16);
    }

    #[test]
    fn test_backlight_frame() {
        let bus = MockBus::new();
        let mut lcd = ready(&bus, 16, 2);

        lcd.set_backlight(false).unwrap();
        assert!(!lcd.state().backlight);
        assert_eq!(bus.state().wire_bytes(), vec![0x04, 0x00, 0x04, 0x00]);

        bus.state().clear_events();
        lcd.set_backlight(true).unwrap();
        assert_eq!(bus.state().wire_bytes(), vec![0x0C, 0x08, 0x0C, 0x08]);
    }

    #[test]
    fn test_backlight_recorded_even_when_send_fails() {
        let bus = MockBus::new();
        let mut lcd = ready(&bus, 16, 2);
        bus.state().simulate_write_failure = true;

        assert!(lcd.set_backlight(false).is_err());
        assert!(!lcd.state().backlight);
    }

    #[test]
    fn test_control_byte() {
        let bus = MockBus::new();
        let mut lcd = ready(&bus, 16, 2);

        lcd.set_control(false, true, true, false).unwrap();
        assert_eq!(bus.state().decoded(), vec![(Mode::Command, 0x0E)]);
        assert!(bus.state().wire_bytes().iter().all(|b| b & 0x08 == 0));
        assert_eq!(
            lcd.state(),
            DisplayState { backlight: false, display_on: true, cursor_on: true, cursor_blink: false }
        );

        bus.state().clear_events();
        lcd.set_control(true, true, true, true).unwrap();
        assert_eq!(bus.state().decoded(), vec![(Mode::Command, 0x0F)]);
    }

    #[test]
    fn test_close_switches_backlight_off() {
        let bus = MockBus::new();
        let lcd = ready(&bus, 16, 2);

        lcd.close();

        let state = bus.state();
        assert_eq!(state.decoded(), vec![(Mode::Command, 0x00)]);
        assert!(state.wire_bytes().iter().all(|b| b & 0x08 == 0));
    }

    #[test]
    fn test_close_never_fails() {
        let bus = MockBus::new();
        let lcd = block_session(&bus);
        bus.state().simulate_write_failure = true;
        // uninitialized and failing bus; must not panic
        lcd.close();
        assert_eq!(bus.state().block_attempts, 1);
    }

    #[test]
    fn test_text_bytes_sent_unchanged() {
        let bus = MockBus::new();
        let mut lcd = ready(&bus, 16, 2);

        lcd.print(0, 0, "~/home~").unwrap();
        let text: Vec<u8> = bus.state().decoded()[1..].iter().map(|(_, b)| *b).collect();
        assert_eq!(text, b"~/home~");

        bus.state().clear_events();
        lcd.print(0, 1, "21\u{b0}C\x7f\n").unwrap();
        let text: Vec<u8> = bus.state().decoded()[1..].iter().map(|(_, b)| *b).collect();
        assert_eq!(text, "21\u{b0}C\x7f\n".as_bytes());
    }
}
