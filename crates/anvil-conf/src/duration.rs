//! Parses the `duration` config type (e.g. `grace_period: 20s`). Accepts
//! a bare integer (seconds) or a suffixed literal: `ms`, `s`, `m`, `h`.

use std::time::Duration;

use crate::error::{Error, Result};

pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let split_at = raw.find(|c: char| !c.is_ascii_digit() && c != '.');
    let (number, suffix) = match split_at {
        Some(idx) => raw.split_at(idx),
        None => return Err(Error::InvalidDuration(raw.to_string())),
    };
    let value: f64 = number.parse().map_err(|_| Error::InvalidDuration(raw.to_string()))?;

    let scale = match suffix {
        "ms" => 0.001,
        "s" => 1.0,
        "m" => 60.0,
        "h" => 3600.0,
        _ => return Err(Error::InvalidDuration(raw.to_string())),
    };
    Ok(Duration::from_secs_f64(value * scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_seconds() {
        assert_eq!(parse_duration("20").unwrap(), Duration::from_secs(20));
    }

    #[test]
    fn parses_suffixed_literals() {
        assert_eq!(parse_duration("20s").unwrap(), Duration::from_secs(20));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
    }

    #[test]
    fn rejects_unknown_suffix() {
        assert!(parse_duration("20weeks").is_err());
    }
}
