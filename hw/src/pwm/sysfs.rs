use crate::pwm::{PwmDriver, PwmPin, PwmPolarity};
use crate::{HwError, HwResult};
use log::debug;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// PWM driver over the kernel's `/sys/class/pwm` interface.
pub struct SysfsPwmDriver {
    base_path: PathBuf,
}

impl SysfsPwmDriver {
    pub fn count_chips() -> HwResult<usize> {
        let path = Path::new("/sys/class/pwm");
        let mut count = 0;
        for index in 0.. {
            let chip_path = path.join(format!("pwmchip{}", index));
            if chip_path.exists() {
                count += 1;
            } else {
                break;
            }
        }
        Ok(count)
    }

    pub fn get_chip(index: usize) -> HwResult<Self> {
        let path = Path::new("/sys/class/pwm");
        let chip_path = path.join(format!("pwmchip{}", index));
        if !chip_path.exists() {
            return Err(HwError::InvalidArgument);
        }
        Ok(SysfsPwmDriver {
            base_path: chip_path,
        })
    }
}

impl Debug for SysfsPwmDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SysfsPwmDriver({:?})", self.base_path)
    }
}

impl PwmDriver for SysfsPwmDriver {
    fn count(&self) -> HwResult<usize> {
        let path = self.base_path.join("npwm");
        let content = std::fs::read_to_string(&path)?;
        let count: usize = content
            .trim()
            .parse()
            .map_err(|_| HwError::Other("parsing PWM pin count failed".to_string()))?;
        Ok(count)
    }

    fn get_pin(&self, index: usize) -> HwResult<Box<dyn PwmPin + '_>> {
        let path = self.base_path.join(format!("pwm{}", index));
        if !path.exists() {
            // Exporting creates the channel directory; a channel someone
            // already exported is left alone.
            debug!("Exporting {:?} channel {}", self.base_path, index);
            let export_path = self.base_path.join("export");
            std::fs::write(&export_path, index.to_string())?;
        }
        if !path.exists() {
            return Err(HwError::InvalidArgument);
        }
        let pin = SysfsPwmPin { base_path: path };
        Ok(Box::new(pin))
    }
}

pub struct SysfsPwmPin {
    base_path: PathBuf,
}

impl Debug for SysfsPwmPin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SysfsPwmPin({:?})", self.base_path)
    }
}

impl PwmPin for SysfsPwmPin {
    fn period_ns(&self) -> HwResult<u32> {
        let path = self.base_path.join("period");
        let content = std::fs::read_to_string(&path)?;
        let period: u32 = content
            .trim()
            .parse()
            .map_err(|_| HwError::Other("parsing PWM period failed".to_string()))?;
        Ok(period)
    }

    fn set_period_ns(&mut self, period_ns: u32) -> HwResult<()> {
        let path = self.base_path.join("period");
        std::fs::write(&path, period_ns.to_string())?;
        Ok(())
    }

    fn duty_ns(&self) -> HwResult<u32> {
        let path = self.base_path.join("duty_cycle");
        let content = std::fs::read_to_string(&path)?;
        let duty: u32 = content
            .trim()
            .parse()
            .map_err(|_| HwError::Other("parsing PWM duty cycle failed".to_string()))?;
        Ok(duty)
    }

    fn set_duty_ns(&mut self, duty_ns: u32) -> HwResult<()> {
        let path = self.base_path.join("duty_cycle");
        std::fs::write(&path, duty_ns.to_string())?;
        Ok(())
    }

    fn polarity(&self) -> HwResult<PwmPolarity> {
        let path = self.base_path.join("polarity");
        let content = std::fs::read_to_string(&path)?;
        let polarity = PwmPolarity::from_str(content.trim())?;
        Ok(polarity)
    }

    fn set_polarity(&mut self, polarity: PwmPolarity) -> HwResult<()> {
        let path = self.base_path.join("polarity");
        std::fs::write(&path, polarity.to_string())?;
        Ok(())
    }

    fn is_enabled(&self) -> HwResult<bool> {
        let path = self.base_path.join("enable");
        let content = std::fs::read_to_string(&path)?;
        let enabled: bool = match content.trim() {
            "1" => true,
            "0" => false,
            _ => return Err(HwError::Other("parsing PWM enabled state failed".to_string())),
        };
        Ok(enabled)
    }

    fn enable(&mut self) -> HwResult<()> {
        let path = self.base_path.join("enable");
        std::fs::write(&path, "1")?;
        Ok(())
    }

    fn disable(&mut self) -> HwResult<()> {
        let path = self.base_path.join("enable");
        std::fs::write(&path, "0")?;
        Ok(())
    }
}
