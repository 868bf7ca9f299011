//! # Validation
//!
//! Duration strings and WebUI URLs found in resource specs.

use crate::qbittorrent::ParseError;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static DURATION_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?:\d+(?:\.\d+)?(?:ms|s|m|h|d))+$").ok());

static DURATION_PART_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?P<number>\d+(?:\.\d+)?)(?P<unit>ms|s|m|h|d)").ok());

static URL_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").ok());

/// Parse a Go-style duration such as `30s`, `5m`, `1h30m` or `1.5h`
///
/// Units: `ms`, `s`, `m`, `h`, plus `d` for days. A zero total is rejected
/// because it would requeue in a tight loop.
///
/// # Errors
///
/// [`ParseError::InvalidDuration`] for anything else.
pub fn parse_duration(duration_str: &str) -> Result<Duration, ParseError> {
    let trimmed = duration_str.trim();
    let invalid = || ParseError::InvalidDuration(duration_str.to_string());

    let (Some(whole), Some(part)) = (DURATION_REGEX.as_ref(), DURATION_PART_REGEX.as_ref()) else {
        return Err(invalid());
    };
    if !whole.is_match(trimmed) {
        return Err(invalid());
    }

    let mut total = 0f64;
    for captures in part.captures_iter(trimmed) {
        let number: f64 = captures["number"].parse().map_err(|_err| invalid())?;
        let seconds_per_unit = match &captures["unit"] {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            "d" => 86400.0,
            _ => return Err(invalid()),
        };
        total += number * seconds_per_unit;
    }

    let duration = Duration::try_from_secs_f64(total).map_err(|_err| invalid())?;
    if duration.is_zero() {
        return Err(invalid());
    }
    Ok(duration)
}

/// Check that a WebUI URL is an absolute http(s) URL
///
/// # Errors
///
/// Returns a human readable reason when the URL is rejected.
pub fn validate_url(url: &str) -> Result<(), String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err("url cannot be empty".to_string());
    }
    let matches = URL_REGEX
        .as_ref()
        .is_some_and(|regex| regex.is_match(trimmed));
    if !matches {
        return Err(format!(
            "url must be a valid http:// or https:// URL, got '{trimmed}'"
        ));
    }
    Ok(())
}
