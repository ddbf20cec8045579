/*
 *  tests/lcd_protocol.rs
 *
 *  End-to-end protocol checks against the mock bus
 *
 *  netlcd - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 */

use netlcd::config::TransportKind;
use netlcd::lcd::transports::mock::{BusEvent, MockBus};
use netlcd::lcd::{LcdError, LcdSession, Mode, TransportFactory};

fn session(bus: &MockBus, kind: TransportKind, width: u32, height: u32) -> LcdSession {
    let mut lcd = LcdSession::new(TransportFactory::wrap(bus.channel(), bus.delay(), kind));
    lcd.init(width, height, true).expect("init on a healthy bus");
    bus.state().clear_events();
    lcd
}

#[test]
fn test_init_wire_sequence() {
    let bus = MockBus::new();
    let mut lcd = LcdSession::new(TransportFactory::wrap(bus.channel(), bus.delay(), TransportKind::Raw));
    lcd.init(16, 2, true).unwrap();

    let state = bus.state();
    let wire = state.wire_bytes();
    // four wake-up nibbles, then five full bytes
    assert_eq!(wire.len(), 4 * 2 + 5 * 4);
    assert_eq!(&wire[..8], &[0x34, 0x30, 0x34, 0x30, 0x34, 0x30, 0x24, 0x20]);
    // backlight only on the final display-on command
    assert!(wire[..24].iter().all(|b| b & 0x08 == 0));
    assert!(wire[24..].iter().all(|b| b & 0x08 != 0));
    assert_eq!(
        state.delays(),
        vec![15000, 4100, 100, 4100, 100, 100, 100, 100, 100]
    );
}

#[test]
fn test_print_sample_line() {
    let bus = MockBus::new();
    let mut lcd = session(&bus, TransportKind::Raw, 16, 2);

    lcd.print(0, 0, "This is sample!").unwrap();

    let decoded = bus.state().decoded();
    assert_eq!(decoded[0], (Mode::Command, 0x80));
    let text: Vec<u8> = decoded[1..].iter().map(|&(m, b)| {
        assert_eq!(m, Mode::Data);
        b
    }).collect();
    assert_eq!(text, b"This is sample!");
    assert_eq!(bus.state().wire_bytes().len(), 4 * 16);
}

#[test]
fn test_full_clear_settles() {
    let bus = MockBus::new();
    let mut lcd = session(&bus, TransportKind::Raw, 16, 2);

    lcd.clear(-1).unwrap();

    let state = bus.state();
    assert_eq!(state.decoded(), vec![(Mode::Command, 0x01)]);
    assert_eq!(state.delays(), vec![2000]);
}

#[test]
fn test_block_transport_same_bytes_as_raw() {
    let raw_bus = MockBus::new();
    let block_bus = MockBus::new();
    let mut raw = session(&raw_bus, TransportKind::Raw, 20, 4);
    let mut block = session(&block_bus, TransportKind::Block, 20, 4);

    raw.print(2, 3, "Hello, block world!").unwrap();
    block.print(2, 3, "Hello, block world!").unwrap();

    assert_eq!(raw_bus.state().wire_bytes(), block_bus.state().wire_bytes());
    assert!(block_bus.state().block_sizes().iter().all(|&n| n <= 32));
}

#[test]
fn test_failed_init_leaves_session_unusable() {
    let bus = MockBus::new();
    bus.state().fail_byte_write = Some(9);
    let mut lcd = LcdSession::new(TransportFactory::wrap(bus.channel(), bus.delay(), TransportKind::Raw));

    assert!(matches!(
        lcd.init(16, 2, true),
        Err(LcdError::InitSequenceIncomplete { completed: 8, expected: 9 })
    ));
    assert!(matches!(lcd.print(0, 0, "x"), Err(LcdError::NotInitialized)));
}

#[test]
fn test_close_turns_backlight_off() {
    let bus = MockBus::new();
    let lcd = session(&bus, TransportKind::Block, 16, 2);

    lcd.close();

    let state = bus.state();
    assert_eq!(state.decoded(), vec![(Mode::Command, 0x00)]);
    assert!(state.wire_bytes().iter().all(|b| b & 0x08 == 0));
    assert!(state.events.iter().any(|e| matches!(e, BusEvent::Block { .. })));
}
