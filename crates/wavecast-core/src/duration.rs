// SPDX-FileCopyrightText: © 2026 Wavecast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Flexible duration parsing shared by configuration and resume-offset
//! policies (§4.3): a duration string is parsed as a human-readable duration
//! (`"90s"`, `"5m"`, `"2h30m"`) or, if that fails, as a plain number of
//! seconds (`"90"`, `"90.5"`).

use std::time::Duration;

/// Parses `s` as a human-readable duration first, falling back to a bare
/// float number of seconds. Returns `None` if neither parse succeeds.
#[must_use]
pub fn parse_flexible_duration(s: &str) -> Option<Duration> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(d) = humantime::parse_duration(trimmed) {
        return Some(d);
    }
    trimmed.parse::<f64>().ok().filter(|secs| secs.is_finite() && *secs >= 0.0).map(Duration::from_secs_f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_human_readable_forms() {
        assert_eq!(parse_flexible_duration("90s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_flexible_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_flexible_duration("2h30m"), Some(Duration::from_secs(9000)));
    }

    #[test]
    fn falls_back_to_bare_seconds() {
        assert_eq!(parse_flexible_duration("90"), Some(Duration::from_secs(90)));
        assert_eq!(parse_flexible_duration("90.5"), Some(Duration::from_secs_f64(90.5)));
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert_eq!(parse_flexible_duration(""), None);
        assert_eq!(parse_flexible_duration("   "), None);
        assert_eq!(parse_flexible_duration("not-a-duration"), None);
        assert_eq!(parse_flexible_duration("-5"), None);
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(parse_flexible_duration("  30s  "), Some(Duration::from_secs(30)));
    }
}
