//! Validation and rendering for the telemetry and fan ingress strings.
//!
//! Validation happens before any hardware side effect: a rejected input must
//! never reach the bus, so there are no partial display updates.

use thiserror::Error;

/// Highest telemetry value the fixed two-digit whole field can show.
const MAX_MILLIDEGREES: i64 = 99_999;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum ParseError {
    #[error("malformed decimal input: {0:?}")]
    Malformed(String),
    #[error("temperature {0} m\u{00B0}C outside the displayable range")]
    TemperatureOutOfRange(i64),
    #[error("fan level {0} outside 0..=9")]
    FanLevelOutOfRange(i64),
}

/// Parses a milli-degree Celsius reading, e.g. the contents of a
/// `/sys/class/thermal/*/temp` file.
///
/// Values outside the displayable range are rejected rather than wrapped or
/// saturated; the two-digit whole field cannot show them.
pub fn parse_millidegrees(raw: &str) -> Result<i64, ParseError> {
    let trimmed = raw.trim();
    let value: i64 = trimmed
        .parse()
        .map_err(|_| ParseError::Malformed(trimmed.to_string()))?;
    if !(0..=MAX_MILLIDEGREES).contains(&value) {
        return Err(ParseError::TemperatureOutOfRange(value));
    }
    Ok(value)
}

/// Renders a telemetry value as the fixed-width display field: two whole
/// digits, a point, three fractional digits and the unit suffix.
pub fn render_millidegrees(millidegrees: i64) -> String {
    format!("{:02}.{:03} Deg C", millidegrees / 1000, millidegrees % 1000)
}

/// Parses a fan speed level: a decimal integer within `0..=9` (a single
/// ASCII digit being the common case).
pub fn parse_fan_level(raw: &str) -> Result<u8, ParseError> {
    let trimmed = raw.trim();
    let value: i64 = trimmed
        .parse()
        .map_err(|_| ParseError::Malformed(trimmed.to_string()))?;
    if !(0..=9).contains(&value) {
        return Err(ParseError::FanLevelOutOfRange(value));
    }
    Ok(value as u8)
}
