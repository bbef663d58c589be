mod i2c;

use crate::{HwError, HwResult};
pub use i2c::*;
use log::warn;
use std::fmt::Debug;

/// Number of display lines.
pub const ROWS: usize = 2;
/// Number of visible character cells per line.
pub const COLUMNS: usize = 16;

/// HD44780 instruction opcodes and flag bits.
pub mod cmd {
    pub const CLEAR: u8 = 0x01;
    pub const HOME: u8 = 0x02;
    pub const ENTRY_MODE: u8 = 0x04;
    pub const DISPLAY_CTRL: u8 = 0x08;
    pub const FUNCTION_SET: u8 = 0x20;
    pub const SET_DDRAM: u8 = 0x80;

    pub const ENTRY_LEFT: u8 = 0x02;
    pub const ENTRY_SHIFT: u8 = 0x01;

    pub const DISPLAY_ON: u8 = 0x04;
    pub const CURSOR_ON: u8 = 0x02;
    pub const BLINK_ON: u8 = 0x01;

    pub const MODE_8BIT: u8 = 0x10;
    pub const TWO_LINES: u8 = 0x08;
    pub const FONT_5X10: u8 = 0x04;
}

/// DDRAM address of the first cell of the second line.
const SECOND_LINE_OFFSET: usize = 0x40;

pub trait Hd44780Driver: Debug {
    /// Runs the controller's power-on initialization sequence and leaves the
    /// display cleared with the cursor at the home position.
    ///
    /// The controller cannot be asked whether it is already initialized, so
    /// calling this again replays the whole sequence. Every other operation
    /// fails with [HwError::NotInitialized] until this has completed.
    fn init(&mut self, cursor_on: bool, blink_on: bool) -> HwResult<()>;

    /// Clears the display. The controller homes the cursor itself.
    fn clear_display(&mut self) -> HwResult<()> {
        self.send_command(cmd::CLEAR)
    }

    /// Sets the cursor to the home position.
    fn return_home(&mut self) -> HwResult<()> {
        self.send_command(cmd::HOME)
    }

    /// Sets the display to the specified entry mode.
    fn set_entry_mode(&mut self, cursor_direction: CursorDirection, shift: bool) -> HwResult<()> {
        let mut command = cmd::ENTRY_MODE;
        if cursor_direction == CursorDirection::Right {
            command |= cmd::ENTRY_LEFT;
        }
        if shift {
            command |= cmd::ENTRY_SHIFT;
        }
        self.send_command(command)
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    fn set_display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> HwResult<()> {
        let mut command = cmd::DISPLAY_CTRL;
        if display_on {
            command |= cmd::DISPLAY_ON;
        }
        if cursor_on {
            command |= cmd::CURSOR_ON;
        }
        if blink_on {
            command |= cmd::BLINK_ON;
        }
        self.send_command(command)
    }

    /// Sets the interface width, line count and font.
    fn function_set(&mut self, data_length: bool, two_lines: bool, font: bool) -> HwResult<()> {
        let mut command = cmd::FUNCTION_SET;
        if data_length {
            command |= cmd::MODE_8BIT;
        }
        if two_lines {
            command |= cmd::TWO_LINES;
        }
        if font {
            command |= cmd::FONT_5X10;
        }
        self.send_command(command)
    }

    /// Sets the DDRAM address.
    fn set_ddram_address(&mut self, address: u8) -> HwResult<()> {
        if address > 0x7F {
            return Err(HwError::InvalidArgument);
        }
        self.send_command(cmd::SET_DDRAM | address)
    }

    /// Moves the cursor to the given line and column.
    ///
    /// Addressing is absolute; the driver keeps no cursor shadow.
    fn set_cursor(&mut self, row: usize, column: usize) -> HwResult<()> {
        if row >= ROWS || column >= COLUMNS {
            return Err(HwError::InvalidArgument);
        }
        let offset = if row == 1 { SECOND_LINE_OFFSET } else { 0 };
        self.set_ddram_address((offset + column) as u8)
    }

    /// Writes one full display line, clipping or right-padding `text` to the
    /// display width. There is no wraparound onto the other line.
    fn write_line(&mut self, row: usize, text: &str) -> HwResult<()> {
        self.set_cursor(row, 0)?;
        let mut written = 0;
        for c in text.chars().take(COLUMNS) {
            if c.is_ascii() {
                self.send_data(c as u8)?;
            } else {
                warn!("Non-ASCII character: {}", c);
                self.send_data(b'?')?;
            }
            written += 1;
        }
        for _ in written..COLUMNS {
            self.send_data(b' ')?;
        }
        Ok(())
    }

    // Low-level commands
    // These raw commands are used by the high-level functions above.
    // They are not meant to be used directly, but implemented by the driver
    // implementation.

    /// Sends a command to the controller.
    /// Drives the RS line low (command register).
    fn send_command(&mut self, command: u8) -> HwResult<()>;

    /// Sends character data to the controller.
    /// Drives the RS line high (data register).
    fn send_data(&mut self, data: u8) -> HwResult<()>;

    /// Turns the expander's backlight line on or off.
    ///
    /// The backlight is a property of the expander board, not of the HD44780
    /// itself; the new state rides along on every subsequent write.
    fn set_backlight(&mut self, on: bool) -> HwResult<()>;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing data.
    Left,
    /// Moves the cursor to the right after writing data.
    Right,
}
