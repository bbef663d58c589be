mod app;
mod config;
mod ingress;

use crate::app::{App, UpdateError};
use crate::config::Config;
use dotenv::dotenv;
use log::{debug, info, warn};
use pitherm_hw::clock::ThreadClock;
use pitherm_hw::i2c::RppalExpanderBus;
use pitherm_hw::lcd::hd44780::driver::{Hd44780Driver, I2cHd44780Driver};
use pitherm_hw::pwm::{FanController, PwmDriver, SysfsPwmDriver};
use std::env::var;
use std::thread;
use std::time::Duration;

/// Parses a bus address given either as decimal or as `0x`-prefixed hex.
fn parse_addr(raw: &str) -> eyre::Result<u8> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => Ok(u8::from_str_radix(hex, 16)?),
        None => Ok(raw.parse()?),
    }
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    info!("pitherm starting...");

    // Hardware wiring comes from the environment, behavior from config.json.
    let i2c_bus_no: u8 = var("PITHERM_I2C_BUS").unwrap_or_else(|_| "1".to_string()).parse()?;
    let lcd_addr = parse_addr(&var("PITHERM_LCD_ADDR").unwrap_or_else(|_| "0x27".to_string()))?;
    let pwm_chip_no: usize = var("PITHERM_PWM_CHIP").unwrap_or_else(|_| "0".to_string()).parse()?;
    let pwm_pin_no: usize = var("PITHERM_PWM_PIN").unwrap_or_else(|_| "0".to_string()).parse()?;

    info!(
        "LCD @ I2C bus {}, address 0x{:02X}; fan @ pwmchip{}, channel {}",
        i2c_bus_no, lcd_addr, pwm_chip_no, pwm_pin_no
    );

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load() {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };

    let thermal_source = config.thermal_source.clone();
    let poll_interval = Duration::from_millis(config.poll_interval_ms);

    debug!("Initializing I2C expander bus...");
    let mut bus = RppalExpanderBus::new(i2c_bus_no, lcd_addr)?;
    let clock = ThreadClock;
    debug!("{:?} initialized.", bus);

    debug!("Initializing LCD driver...");
    let mut lcd = I2cHd44780Driver::new(&mut bus, &clock);
    lcd.init(config.cursor_on, config.blink_on)?;
    debug!("{:?} initialized.", lcd);

    debug!("Initializing fan PWM...");
    let pwm = SysfsPwmDriver::get_chip(pwm_chip_no)?;
    let mut pwm_pin = pwm.get_pin(pwm_pin_no)?;
    let fan = FanController::new(&mut *pwm_pin, config.pwm_period_ns)?;
    debug!("{:?} initialized.", fan);

    let mut app = App::new(config, &mut lcd, fan);
    app.draw_header()?;

    if let Ok(raw) = var("PITHERM_FAN_LEVEL") {
        match app.handle_fan_level(&raw) {
            Ok(()) => info!("Fan level set to {} from environment.", app.fan_level()),
            Err(e) => warn!("Ignoring PITHERM_FAN_LEVEL: {}", e),
        }
    }

    info!("pitherm initialized.");
    info!("Starting main loop...");

    loop {
        match std::fs::read_to_string(&thermal_source) {
            Ok(raw) => match app.handle_temperature(&raw) {
                Ok(()) => {}
                Err(UpdateError::Hw(e)) => {
                    // Hardware state is unknown after a transport fault; the
                    // only way back is a full re-init.
                    warn!("Display update failed: {}", e);
                    if let Err(e) = app.recover_display() {
                        warn!("Display recovery failed: {}", e);
                    }
                }
                Err(e) => warn!("Ignoring telemetry sample: {}", e),
            },
            Err(e) => warn!("Failed to read {:?}: {}", thermal_source, e),
        }

        thread::sleep(poll_interval);
    }
}
