mod fan;
mod sysfs;

use crate::{HwError, HwResult};
pub use fan::*;
use std::fmt::{Debug, Display};
use std::str::FromStr;
pub use sysfs::*;

pub trait PwmDriver: Debug {
    fn count(&self) -> HwResult<usize>;

    fn get_pin(&self, index: usize) -> HwResult<Box<dyn PwmPin + '_>>;
}

pub trait PwmPin: Debug {
    fn period_ns(&self) -> HwResult<u32>;
    fn set_period_ns(&mut self, period_ns: u32) -> HwResult<()>;

    fn duty_ns(&self) -> HwResult<u32>;
    fn set_duty_ns(&mut self, duty_ns: u32) -> HwResult<()>;

    fn polarity(&self) -> HwResult<PwmPolarity>;
    fn set_polarity(&mut self, polarity: PwmPolarity) -> HwResult<()>;

    fn is_enabled(&self) -> HwResult<bool>;
    fn enable(&mut self) -> HwResult<()>;
    fn disable(&mut self) -> HwResult<()>;
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PwmPolarity {
    #[default]
    Normal,
    Inversed,
}

impl FromStr for PwmPolarity {
    type Err = HwError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(PwmPolarity::Normal),
            "inversed" => Ok(PwmPolarity::Inversed),
            _ => Err(HwError::Other("parsing PWM polarity failed".to_string())),
        }
    }
}

impl Display for PwmPolarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            PwmPolarity::Normal => "normal",
            PwmPolarity::Inversed => "inversed",
        };
        write!(f, "{}", str)
    }
}
