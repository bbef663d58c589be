use dotenv::var;
use serde::{Deserialize, Serialize};
use std::env::var_os;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// PWM period in nanoseconds. 40 000 ns gives the 25 kHz most fans want.
    pub pwm_period_ns: u32,
    /// File read each poll for a milli-degree Celsius sample.
    pub thermal_source: PathBuf,
    /// Milliseconds between telemetry polls.
    pub poll_interval_ms: u64,
    /// Show the cursor underline.
    pub cursor_on: bool,
    /// Blink the cursor cell.
    pub blink_on: bool,
}

impl Config {
    pub fn try_load() -> Option<Self> {
        let config_str = var_os("CONFIG_FILE");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new("config.json"));
        let config_path = Path::new(config_str);
        if config_path.exists() {
            let file = std::fs::File::open(config_path).ok()?;
            let reader = std::io::BufReader::new(file);
            serde_json::from_reader(reader).ok()
        } else {
            None
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let config_str = var("CONFIG_FILE").unwrap_or_else(|_| "config.json".to_string());
        let config_path = Path::new(&config_str);
        let file = std::fs::File::create(config_path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pwm_period_ns: 40_000,
            thermal_source: PathBuf::from("/sys/class/thermal/thermal_zone0/temp"),
            poll_interval_ms: 1000,
            cursor_on: true,
            blink_on: true,
        }
    }
}
