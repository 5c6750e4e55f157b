//! A tiny duration-string parser for `max_age` values like `"2d"`, `"90s"`,
//! `"45m"`, `"1h"` — just enough for the one config field that needs it,
//! without pulling in a full duration-parsing crate.

use crate::error::ConfigError;

/// Parse a duration string of the form `<number><unit>` where unit is one
/// of `ms`, `s`, `m`, `h`, `d`. Returns the duration in milliseconds.
pub fn parse_duration_ms(value: &str) -> Result<i64, ConfigError> {
    let trimmed = value.trim();
    let (digits, unit) = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .map(|idx| trimmed.split_at(idx))
        .ok_or_else(|| ConfigError::InvalidMaxAge {
            value: value.to_string(),
            reason: "missing time unit (expected ms, s, m, h, or d)".to_string(),
        })?;

    let amount: i64 = digits.parse().map_err(|_| ConfigError::InvalidMaxAge {
        value: value.to_string(),
        reason: "not a valid number".to_string(),
    })?;

    let multiplier: i64 = match unit {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        other => {
            return Err(ConfigError::InvalidMaxAge {
                value: value.to_string(),
                reason: format!("unknown unit '{other}' (expected ms, s, m, h, or d)"),
            })
        }
    };

    Ok(amount * multiplier)
}
