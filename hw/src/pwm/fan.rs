//! Duty-cycle fan speed control.

use crate::pwm::{PwmPin, PwmPolarity};
use crate::{HwError, HwResult};
use log::{debug, info};

/// Number of speed steps, including the stopped level 0.
const LEVELS: u32 = 10;

/// Speed level programmed when the fan is brought up.
pub const DEFAULT_LEVEL: u8 = 5;

/// Maps a coarse speed level in `0..=9` onto a PWM duty cycle.
///
/// The last accepted level is retained for read-back; the hardware is never
/// queried. The level-to-duty mapping is `level * (period / 10)`, so level 9
/// runs at 90% duty rather than fully on.
#[derive(Debug)]
pub struct FanController<'a> {
    pin: &'a mut dyn PwmPin,
    period_ns: u32,
    level: u8,
}

impl<'a> FanController<'a> {
    /// Programs the period, normal polarity and the default speed, then
    /// enables the output.
    pub fn new(pin: &'a mut dyn PwmPin, period_ns: u32) -> HwResult<Self> {
        if period_ns == 0 {
            return Err(HwError::InvalidArgument);
        }
        pin.set_period_ns(period_ns)?;
        pin.set_polarity(PwmPolarity::Normal)?;
        let mut fan = FanController {
            pin,
            period_ns,
            level: 0,
        };
        fan.apply(DEFAULT_LEVEL)?;
        fan.pin.enable()?;
        info!("Fan PWM enabled at level {} ({} ns period)", fan.level, period_ns);
        Ok(fan)
    }

    /// Sets the fan speed. An out-of-range level is rejected and leaves the
    /// previously programmed duty cycle untouched.
    pub fn set_level(&mut self, level: u8) -> HwResult<()> {
        if level as u32 >= LEVELS {
            return Err(HwError::InvalidArgument);
        }
        self.apply(level)
    }

    fn apply(&mut self, level: u8) -> HwResult<()> {
        let duty_ns = level as u32 * (self.period_ns / LEVELS);
        debug!("Fan level {} -> duty {} ns of {} ns", level, duty_ns, self.period_ns);
        self.pin.set_duty_ns(duty_ns)?;
        self.level = level;
        Ok(())
    }

    /// The last accepted speed level. Not a hardware read-back.
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Disables the PWM output. The programmed level is kept, so a later
    /// [enable](PwmPin::enable) resumes at the same speed.
    pub fn shutdown(&mut self) -> HwResult<()> {
        info!("Disabling fan PWM output");
        self.pin.disable()
    }
}
