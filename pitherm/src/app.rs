//! The module for the main app state and logic.

use crate::config::Config;
use crate::ingress::{self, ParseError};
use log::{debug, warn};
use pitherm_hw::lcd::hd44780::driver::Hd44780Driver;
use pitherm_hw::pwm::FanController;
use pitherm_hw::{HwError, HwResult};
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum UpdateError {
    #[error("invalid ingress input: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Hw(#[from] HwError),
}

/// The main app state struct.
///
/// Owns the composed hardware: the LCD shows a fixed header on line 0 and the
/// latest telemetry sample on line 1, the fan runs independently of the
/// display. Both read-backs return the last accepted value, never a hardware
/// measurement.
pub struct App<'a> {
    /// The configuration for the app.
    config: Config,
    /// The LCD driver for the app.
    lcd: &'a mut dyn Hd44780Driver,
    /// The fan speed controller.
    fan: FanController<'a>,
    /// The last telemetry value accepted for display.
    last_millidegrees: Option<i64>,
}

impl<'a> App<'a> {
    /// Creates a new instance of the App.
    pub fn new(config: Config, lcd: &'a mut dyn Hd44780Driver, fan: FanController<'a>) -> App<'a> {
        App {
            config,
            lcd,
            fan,
            last_millidegrees: None,
        }
    }

    /// Draws the static header line.
    pub fn draw_header(&mut self) -> HwResult<()> {
        self.lcd
            .write_line(0, concat!("pitherm v", env!("CARGO_PKG_VERSION")))
    }

    /// Validates one telemetry sample and pushes it to the display.
    ///
    /// Blocks for the full duration of the underlying bus transaction. A
    /// parse failure issues no bus write at all.
    pub fn handle_temperature(&mut self, raw: &str) -> Result<(), UpdateError> {
        let millidegrees = ingress::parse_millidegrees(raw)?;
        let text = ingress::render_millidegrees(millidegrees);
        debug!("Telemetry {} m\u{00B0}C -> {:?}", millidegrees, text);
        self.lcd.write_line(1, &text)?;
        self.last_millidegrees = Some(millidegrees);
        Ok(())
    }

    /// Validates one fan speed request and programs the duty cycle.
    /// Rejected input leaves the previous speed running.
    pub fn handle_fan_level(&mut self, raw: &str) -> Result<(), UpdateError> {
        let level = ingress::parse_fan_level(raw)?;
        self.fan.set_level(level)?;
        Ok(())
    }

    /// The last telemetry value accepted for display, in milli-degrees.
    pub fn last_temperature(&self) -> Option<i64> {
        self.last_millidegrees
    }

    /// The last accepted fan speed level.
    pub fn fan_level(&self) -> u8 {
        self.fan.level()
    }

    /// Replays the LCD power-on sequence after a transport fault and redraws
    /// everything the display is supposed to show.
    pub fn recover_display(&mut self) -> HwResult<()> {
        warn!("Reinitializing display after transport fault");
        self.lcd.init(self.config.cursor_on, self.config.blink_on)?;
        self.draw_header()?;
        if let Some(millidegrees) = self.last_millidegrees {
            self.lcd
                .write_line(1, &ingress::render_millidegrees(millidegrees))?;
        }
        Ok(())
    }
}
