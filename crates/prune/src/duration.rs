//! Parsing of duration strings such as `"3h"`, `"1h30m"` or `"1.5h"`.
//!
//! The accepted syntax is a possibly signed sequence of decimal numbers, each
//! with an optional fraction and a mandatory unit suffix: `ns`, `us` (or `µs`),
//! `ms`, `s`, `m`, `h`. A bare `"0"` is also accepted.

use chrono::Duration;
use thiserror::Error;

/// Reasons a duration string can be rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("duration is empty")]
    Empty,

    #[error("expected a number at '{rest}'")]
    ExpectedNumber { rest: String },

    #[error("missing unit after '{number}'")]
    MissingUnit { number: String },

    #[error("unknown unit '{unit}'")]
    UnknownUnit { unit: String },

    #[error("duration out of range")]
    Overflow,
}

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;
const NANOS_PER_MINUTE: u128 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MINUTE;

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(NANOS_PER_MINUTE),
        "h" => Some(NANOS_PER_HOUR),
        _ => None,
    }
}

/// Parse a duration string into a [`chrono::Duration`].
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }

    let (negative, mut rest) = match s.as_bytes()[0] {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    if rest == "0" {
        return Ok(Duration::zero());
    }
    if rest.is_empty() {
        return Err(DurationError::ExpectedNumber {
            rest: String::new(),
        });
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_len];
        rest = &rest[number_len..];

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
            return Err(DurationError::ExpectedNumber {
                rest: format!("{number}{rest}"),
            });
        }

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];
        if unit.is_empty() {
            return Err(DurationError::MissingUnit {
                number: number.to_string(),
            });
        }
        let scale = unit_nanos(unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.to_string(),
        })?;

        let whole_value: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| DurationError::Overflow)?
        };
        let mut value = whole_value
            .checked_mul(scale)
            .ok_or(DurationError::Overflow)?;

        // Digits past nanosecond precision cannot change the result.
        let fraction = &fraction[..fraction.len().min(18)];
        if !fraction.is_empty() {
            let digits: u128 = fraction.parse().map_err(|_| DurationError::Overflow)?;
            let divisor = 10u128.pow(u32::try_from(fraction.len()).unwrap_or(18));
            value = value
                .checked_add(digits * scale / divisor)
                .ok_or(DurationError::Overflow)?;
        }

        total = total.checked_add(value).ok_or(DurationError::Overflow)?;
    }

    let nanos = i64::try_from(total).map_err(|_| DurationError::Overflow)?;
    Ok(Duration::nanoseconds(if negative { -nanos } else { nanos }))
}
