//! HD44780 LCD module.
//!
//! Targets the classic 16x2 character modules sold with a PCF8574 I2C
//! "backpack". The controller runs in 4-bit interface mode, so every byte
//! crosses the expander as two enable pulses; see [driver::I2cHd44780Driver]
//! for the wire protocol and its timing rules.

pub mod driver;
