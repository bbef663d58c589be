use crate::clock::Clock;
use crate::i2c::ExpanderBus;
use crate::lcd::hd44780::driver::{Hd44780Driver, cmd};
use crate::{HwError, HwResult};
use log::{debug, trace};
use std::time::Duration;

/// Bit layout of the expander's output register on the standard PCF8574
/// backpack. Bit 1 is the R/W line; this driver never reads, so it stays low.
mod pin {
    pub const RS: u8 = 0x01;
    pub const ENABLE: u8 = 0x04;
    pub const BACKLIGHT: u8 = 0x08;
    /// D4..D7 sit on the expander's high nibble, so a 4-bit data value maps
    /// 1:1 onto bits 4..7.
    pub const DATA_SHIFT: u8 = 4;
}

/// Minimum enable pulse width.
const ENABLE_PULSE: Duration = Duration::from_micros(1);
/// Settle time after latching a nibble, before any further protocol activity.
const SETTLE: Duration = Duration::from_micros(100);
/// Extra wait for the controller's internal clear/home routine.
const CLEAR_HOME_EXTRA: Duration = Duration::from_millis(2);
/// Worst-case controller boot time after power application.
const POWER_ON: Duration = Duration::from_millis(50);
/// Wait after the first interface-reset nibble.
const RESET_FIRST: Duration = Duration::from_millis(5);
/// Wait after the second interface-reset nibble.
const RESET_SECOND: Duration = Duration::from_micros(150);

/// How far the power-on sequence got. The hardware cannot be queried, so this
/// is the driver's own record; a transport error at any point invalidates it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum DriverState {
    Uninitialized,
    Resetting,
    FunctionSet,
    DisplayConfigured,
    EntryModeSet,
    Ready,
}

/// HD44780 driver talking through a PCF8574-class I2C GPIO expander.
///
/// The expander's single output register fans out to the LCD's control lines
/// and data lines D4..D7, so the controller runs in 4-bit interface mode and
/// every nibble on the wire is one enable pulse spelled out as three register
/// writes. Errors on the display are silent (garbled characters, not a
/// failure code), which is why the timing constants above are minimums and the
/// initialization sequence is replayed in full on every [init](Hd44780Driver::init).
#[derive(Debug)]
pub struct I2cHd44780Driver<'a> {
    bus: &'a mut dyn ExpanderBus,
    clock: &'a dyn Clock,
    state: DriverState,
    backlight: bool,
}

impl<'a> I2cHd44780Driver<'a> {
    pub fn new(bus: &'a mut dyn ExpanderBus, clock: &'a dyn Clock) -> Self {
        I2cHd44780Driver {
            bus,
            clock,
            state: DriverState::Uninitialized,
            backlight: true,
        }
    }

    /// Whether initialization has completed since the last transport error.
    pub fn is_ready(&self) -> bool {
        self.state == DriverState::Ready
    }

    fn line_bits(&self, nibble: u8, rs: bool) -> u8 {
        let mut byte = nibble << pin::DATA_SHIFT;
        if rs {
            byte |= pin::RS;
        }
        if self.backlight {
            byte |= pin::BACKLIGHT;
        }
        byte
    }

    /// One enable pulse: lines settle with E low, E high for at least the
    /// minimum pulse width, E low again to latch, then the standard settle.
    fn write_nibble(&mut self, nibble: u8, rs: bool) -> HwResult<()> {
        trace!("Writing nibble: {:04b}, RS: {}", nibble, rs);
        let byte = self.line_bits(nibble & 0x0F, rs);
        self.bus.write(byte)?;
        self.bus.write(byte | pin::ENABLE)?;
        self.clock.sleep(ENABLE_PULSE);
        self.bus.write(byte)?;
        self.clock.sleep(SETTLE);
        Ok(())
    }

    /// Sends one byte as two nibbles, high then low. Clear and home run a
    /// controller-internal routine that outlives the normal settle window,
    /// so those two commands get an extended wait before anything else may
    /// touch the bus.
    fn try_send(&mut self, data: u8, rs: bool) -> HwResult<()> {
        self.write_nibble(data >> 4, rs)?;
        self.write_nibble(data & 0x0F, rs)?;
        if !rs && (data == cmd::CLEAR || data == cmd::HOME) {
            self.clock.sleep(CLEAR_HOME_EXTRA);
        }
        Ok(())
    }

    fn send(&mut self, data: u8, rs: bool) -> HwResult<()> {
        trace!("Sending data: {:08b}, RS: {}", data, rs);
        if let Err(e) = self.try_send(data, rs) {
            // Unknown hardware state: the controller may have latched half a
            // byte. Only a full re-init recovers from that.
            self.state = DriverState::Uninitialized;
            return Err(e);
        }
        Ok(())
    }

    fn ensure_ready(&self) -> HwResult<()> {
        if self.state != DriverState::Ready {
            return Err(HwError::NotInitialized);
        }
        Ok(())
    }

    fn run_init(&mut self, cursor_on: bool, blink_on: bool) -> HwResult<()> {
        self.state = DriverState::Uninitialized;
        self.clock.sleep(POWER_ON);
        self.state = DriverState::Resetting;

        // Force 4-bit interface mode. Three 0x3 nibbles cover a controller
        // left in 8-bit mode or mid-nibble, then 0x2 selects 4-bit.
        self.write_nibble(0x3, false)?;
        self.clock.sleep(RESET_FIRST);
        self.write_nibble(0x3, false)?;
        self.clock.sleep(RESET_SECOND);
        self.write_nibble(0x3, false)?;
        self.write_nibble(0x2, false)?;

        // 4-bit interface, 2 lines, 5x8 font.
        self.try_send(cmd::FUNCTION_SET | cmd::TWO_LINES, false)?;
        self.state = DriverState::FunctionSet;

        let mut display = cmd::DISPLAY_CTRL | cmd::DISPLAY_ON;
        if cursor_on {
            display |= cmd::CURSOR_ON;
        }
        if blink_on {
            display |= cmd::BLINK_ON;
        }
        self.try_send(display, false)?;
        self.state = DriverState::DisplayConfigured;

        self.try_send(cmd::ENTRY_MODE | cmd::ENTRY_LEFT, false)?;
        self.state = DriverState::EntryModeSet;

        self.try_send(cmd::CLEAR, false)?;
        self.try_send(cmd::SET_DDRAM, false)?;
        self.state = DriverState::Ready;
        Ok(())
    }
}

impl Hd44780Driver for I2cHd44780Driver<'_> {
    fn init(&mut self, cursor_on: bool, blink_on: bool) -> HwResult<()> {
        debug!(
            "Initializing HD44780 (cursor: {}, blink: {})",
            cursor_on, blink_on
        );
        if let Err(e) = self.run_init(cursor_on, blink_on) {
            self.state = DriverState::Uninitialized;
            return Err(e);
        }
        debug!("HD44780 ready");
        Ok(())
    }

    fn send_command(&mut self, command: u8) -> HwResult<()> {
        self.ensure_ready()?;
        self.send(command, false)
    }

    fn send_data(&mut self, data: u8) -> HwResult<()> {
        self.ensure_ready()?;
        self.send(data, true)
    }

    fn set_backlight(&mut self, on: bool) -> HwResult<()> {
        self.ensure_ready()?;
        self.backlight = on;
        // One register write with E low, so nothing is latched and only the
        // backlight line changes.
        let byte = if on { pin::BACKLIGHT } else { 0x00 };
        if let Err(e) = self.bus.write(byte) {
            self.state = DriverState::Uninitialized;
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lcd::hd44780::driver::CursorDirection;
    use crate::testing::{Event, MockBus, Timeline, VirtualClock, timeline};

    fn init_driver<'a>(bus: &'a mut MockBus, clock: &'a VirtualClock) -> I2cHd44780Driver<'a> {
        let mut driver = I2cHd44780Driver::new(bus, clock);
        driver.init(true, true).unwrap();
        driver
    }

    /// Nibbles latched on the wire: each write with the enable bit set
    /// carries the data value on bits 4..7 and RS on bit 0.
    fn latched_nibbles(timeline: &Timeline) -> Vec<(u8, bool)> {
        timeline
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Write(byte) if byte & 0x04 != 0 => {
                    Some((byte >> 4, byte & 0x01 != 0))
                }
                _ => None,
            })
            .collect()
    }

    /// Pairs consecutive same-RS nibbles into bytes. Only valid once the
    /// interface-reset (single-nibble) phase is over.
    fn latched_bytes(timeline: &Timeline) -> Vec<(u8, bool)> {
        latched_nibbles(timeline)
            .chunks(2)
            .map(|pair| ((pair[0].0 << 4) | pair[1].0, pair[0].1))
            .collect()
    }

    fn write_count(timeline: &Timeline) -> usize {
        timeline
            .borrow()
            .iter()
            .filter(|event| matches!(event, Event::Write(_)))
            .count()
    }

    /// Total virtual sleep after write `index` and before the next write
    /// (or the end of the timeline).
    fn sleep_after_write(timeline: &Timeline, index: usize) -> Duration {
        let mut seen = 0;
        let mut total = Duration::ZERO;
        for event in timeline.borrow().iter() {
            match event {
                Event::Write(_) => {
                    if seen > index {
                        break;
                    }
                    seen += 1;
                }
                Event::Sleep(duration) if seen == index + 1 => total += *duration,
                Event::Sleep(_) => {}
            }
        }
        total
    }

    #[test]
    fn init_replays_the_documented_sequence() {
        let timeline = timeline();
        let mut bus = MockBus::new(timeline.clone());
        let clock = VirtualClock::new(timeline.clone());
        init_driver(&mut bus, &clock);

        let nibbles = latched_nibbles(&timeline);
        let expected: Vec<(u8, bool)> = [
            0x3, 0x3, 0x3, 0x2, // interface reset
            0x2, 0x8, // function set: 4-bit, 2 lines, 5x8
            0x0, 0xF, // display control: on, cursor, blink
            0x0, 0x6, // entry mode: left-to-right increment
            0x0, 0x1, // clear
            0x8, 0x0, // DDRAM address 0
        ]
        .iter()
        .map(|&n| (n, false))
        .collect();
        assert_eq!(nibbles, expected);
    }

    #[test]
    fn init_without_cursor_keeps_display_on_bit() {
        let timeline = timeline();
        let mut bus = MockBus::new(timeline.clone());
        let clock = VirtualClock::new(timeline.clone());
        let mut driver = I2cHd44780Driver::new(&mut bus, &clock);
        driver.init(false, false).unwrap();

        // Nibble pair 6/7 is the display-control byte.
        let nibbles = latched_nibbles(&timeline);
        let display = (nibbles[6].0 << 4) | nibbles[7].0;
        assert_eq!(display & cmd::DISPLAY_ON, cmd::DISPLAY_ON);
        assert_eq!(display & (cmd::CURSOR_ON | cmd::BLINK_ON), 0);
    }

    #[test]
    fn init_waits_for_power_on_before_first_write() {
        let timeline = timeline();
        let mut bus = MockBus::new(timeline.clone());
        let clock = VirtualClock::new(timeline.clone());
        init_driver(&mut bus, &clock);

        let first_write = timeline
            .borrow()
            .iter()
            .position(|event| matches!(event, Event::Write(_)))
            .unwrap();
        let boot_wait: Duration = timeline.borrow()[..first_write]
            .iter()
            .map(|event| match event {
                Event::Sleep(duration) => *duration,
                Event::Write(_) => Duration::ZERO,
            })
            .sum();
        assert!(boot_wait >= Duration::from_millis(15));
    }

    #[test]
    fn clear_inside_init_gets_the_extended_wait() {
        let timeline = timeline();
        let mut bus = MockBus::new(timeline.clone());
        let clock = VirtualClock::new(timeline.clone());
        init_driver(&mut bus, &clock);

        // The clear byte is nibbles 10 and 11; its last bus write is the
        // third write of nibble 11.
        let clear_last_write = 12 * 3 - 1;
        assert!(sleep_after_write(&timeline, clear_last_write) >= Duration::from_millis(2));
        // The function-set byte (nibbles 4 and 5) only needs the settle.
        let function_set_last_write = 6 * 3 - 1;
        let settle = sleep_after_write(&timeline, function_set_last_write);
        assert!(settle >= Duration::from_micros(100));
        assert!(settle < Duration::from_millis(2));
    }

    #[test]
    fn clear_and_home_get_the_extended_wait() {
        let timeline = timeline();
        let mut bus = MockBus::new(timeline.clone());
        let clock = VirtualClock::new(timeline.clone());
        let mut driver = init_driver(&mut bus, &clock);

        timeline.borrow_mut().clear();
        driver.clear_display().unwrap();
        let last = write_count(&timeline) - 1;
        assert!(sleep_after_write(&timeline, last) >= Duration::from_millis(2));

        timeline.borrow_mut().clear();
        driver.return_home().unwrap();
        let last = write_count(&timeline) - 1;
        assert!(sleep_after_write(&timeline, last) >= Duration::from_millis(2));

        // Any other command stays within the settle window.
        timeline.borrow_mut().clear();
        driver.set_ddram_address(0).unwrap();
        let last = write_count(&timeline) - 1;
        let settle = sleep_after_write(&timeline, last);
        assert!(settle >= Duration::from_micros(100));
        assert!(settle < Duration::from_millis(2));
    }

    #[test]
    fn second_line_write_addresses_0xc0_before_data() {
        let timeline = timeline();
        let mut bus = MockBus::new(timeline.clone());
        let clock = VirtualClock::new(timeline.clone());
        let mut driver = init_driver(&mut bus, &clock);

        timeline.borrow_mut().clear();
        driver.write_line(1, "48.123 Deg C").unwrap();

        let bytes = latched_bytes(&timeline);
        assert_eq!(bytes[0], (0xC0, false));
        let data: Vec<u8> = bytes[1..].iter().map(|&(byte, _)| byte).collect();
        assert!(bytes[1..].iter().all(|&(_, rs)| rs));
        assert_eq!(data, b"48.123 Deg C    ");
    }

    #[test]
    fn write_line_clips_to_the_display_width() {
        let timeline = timeline();
        let mut bus = MockBus::new(timeline.clone());
        let clock = VirtualClock::new(timeline.clone());
        let mut driver = init_driver(&mut bus, &clock);

        timeline.borrow_mut().clear();
        driver.write_line(0, "this line is longer than the display").unwrap();

        let bytes = latched_bytes(&timeline);
        let data: Vec<u8> = bytes[1..].iter().map(|&(byte, _)| byte).collect();
        assert_eq!(bytes[0], (0x80, false));
        assert_eq!(data, b"this line is lon");
    }

    #[test]
    fn write_line_substitutes_non_ascii() {
        let timeline = timeline();
        let mut bus = MockBus::new(timeline.clone());
        let clock = VirtualClock::new(timeline.clone());
        let mut driver = init_driver(&mut bus, &clock);

        timeline.borrow_mut().clear();
        driver.write_line(0, "21\u{00B0}C").unwrap();

        let bytes = latched_bytes(&timeline);
        let data: Vec<u8> = bytes[1..].iter().map(|&(byte, _)| byte).collect();
        assert_eq!(data[..4], *b"21?C");
    }

    #[test]
    fn out_of_bounds_cursor_is_rejected_without_bus_io() {
        let timeline = timeline();
        let mut bus = MockBus::new(timeline.clone());
        let clock = VirtualClock::new(timeline.clone());
        let mut driver = init_driver(&mut bus, &clock);

        timeline.borrow_mut().clear();
        assert_eq!(driver.set_cursor(2, 0), Err(HwError::InvalidArgument));
        assert_eq!(driver.set_cursor(0, 16), Err(HwError::InvalidArgument));
        assert_eq!(write_count(&timeline), 0);
    }

    #[test]
    fn operations_before_init_fail_without_bus_io() {
        let timeline = timeline();
        let mut bus = MockBus::new(timeline.clone());
        let clock = VirtualClock::new(timeline.clone());
        let mut driver = I2cHd44780Driver::new(&mut bus, &clock);

        assert_eq!(driver.write_line(0, "hello"), Err(HwError::NotInitialized));
        assert_eq!(driver.clear_display(), Err(HwError::NotInitialized));
        assert_eq!(driver.set_backlight(false), Err(HwError::NotInitialized));
        assert_eq!(
            driver.set_entry_mode(CursorDirection::Right, false),
            Err(HwError::NotInitialized)
        );
        assert_eq!(write_count(&timeline), 0);
    }

    #[test]
    fn transport_failure_during_init_leaves_driver_unusable() {
        // Fail each write of the reset phase and a few from the command
        // phase; the whole call must fail and gate later operations.
        for failing_write in [0, 1, 2, 11, 20, 41] {
            let timeline = timeline();
            let mut bus = MockBus::failing_at(timeline.clone(), failing_write);
            let clock = VirtualClock::new(timeline.clone());
            let mut driver = I2cHd44780Driver::new(&mut bus, &clock);

            assert!(matches!(driver.init(true, true), Err(HwError::Transport(_))));
            assert!(!driver.is_ready());

            let writes_after_failure = write_count(&timeline);
            assert_eq!(driver.write_line(1, "48.123 Deg C"), Err(HwError::NotInitialized));
            assert_eq!(write_count(&timeline), writes_after_failure);
        }
    }

    #[test]
    fn init_recovers_after_a_transport_failure() {
        let timeline = timeline();
        let mut bus = MockBus::failing_at(timeline.clone(), 5);
        let clock = VirtualClock::new(timeline.clone());
        let mut driver = I2cHd44780Driver::new(&mut bus, &clock);

        assert!(driver.init(true, true).is_err());
        // The fault was transient; a full replay brings the controller back.
        driver.init(true, true).unwrap();
        assert!(driver.is_ready());
        driver.write_line(0, "back").unwrap();
    }

    #[test]
    fn transport_failure_mid_text_demotes_state() {
        let timeline = timeline();
        // Fail somewhere inside the data bytes of the line write: 42 init
        // writes, then the cursor command and a couple of characters.
        let mut bus = MockBus::failing_at(timeline.clone(), 42 + 6 + 6);
        let clock = VirtualClock::new(timeline.clone());
        let mut driver = init_driver(&mut bus, &clock);

        assert!(matches!(
            driver.write_line(1, "48.123 Deg C"),
            Err(HwError::Transport(_))
        ));
        assert!(!driver.is_ready());
        assert_eq!(driver.send_data(b'x'), Err(HwError::NotInitialized));
    }

    #[test]
    fn backlight_rides_along_on_every_write() {
        let timeline = timeline();
        let mut bus = MockBus::new(timeline.clone());
        let clock = VirtualClock::new(timeline.clone());
        let mut driver = init_driver(&mut bus, &clock);

        timeline.borrow_mut().clear();
        driver.set_backlight(false).unwrap();
        driver.set_ddram_address(0).unwrap();
        assert!(timeline.borrow().iter().all(|event| match event {
            Event::Write(byte) => byte & 0x08 == 0,
            Event::Sleep(_) => true,
        }));

        timeline.borrow_mut().clear();
        driver.set_backlight(true).unwrap();
        driver.set_ddram_address(0).unwrap();
        assert!(timeline.borrow().iter().all(|event| match event {
            Event::Write(byte) => byte & 0x08 != 0,
            Event::Sleep(_) => true,
        }));
    }

    #[test]
    fn display_control_commands_require_ready_state() {
        let timeline = timeline();
        let mut bus = MockBus::new(timeline.clone());
        let clock = VirtualClock::new(timeline.clone());
        let mut driver = init_driver(&mut bus, &clock);

        timeline.borrow_mut().clear();
        driver.set_display_control(true, false, false).unwrap();
        driver.set_entry_mode(CursorDirection::Right, false).unwrap();
        driver.function_set(false, true, false).unwrap();
        let bytes = latched_bytes(&timeline);
        assert_eq!(
            bytes,
            vec![(0x0C, false), (0x06, false), (0x28, false)]
        );
    }
}
