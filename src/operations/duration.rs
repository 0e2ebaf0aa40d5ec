use crate::common::errors::ConfigError;
use std::time::Duration;

/// Parse a compact duration such as `30s`, `15m` or `2W` into whole seconds.
pub fn parse_duration_secs(input: &str) -> Result<u64, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(input.to_string());

    let unit = input.chars().last().ok_or_else(invalid)?;
    let digits = &input[..input.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let multiplier = match unit.to_ascii_lowercase() {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        'w' => 7 * 24 * 60 * 60,
        _ => return Err(invalid()),
    };

    let count: u64 = digits
        .parse()
        .map_err(|_| ConfigError::DurationOverflow(input.to_string()))?;
    count
        .checked_mul(multiplier)
        .ok_or_else(|| ConfigError::DurationOverflow(input.to_string()))
}

pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    parse_duration_secs(input).map(Duration::from_secs)
}
