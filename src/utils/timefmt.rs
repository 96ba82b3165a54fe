//! Timezone-aware date formatting
//!
//! User timezones arrive as IANA zone names. When a zone name is embedded in
//! a URL path or a bus payload, its `/` is escaped as `@`
//! (`America@Sao_Paulo`); these helpers convert between the two forms and
//! format UTC timestamps in the user's local time.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Zone name reported by clients that never picked an explicit timezone
pub const DEFAULT_DEVICE_ZONE: &str = "Default device";

/// Restore an escaped zone name (`America@Sao_Paulo` -> `America/Sao_Paulo`)
pub fn unescape_zone(zone: &str) -> String {
    zone.replace('@', "/")
}

/// Escape a zone name for use in URL paths and payloads
pub fn escape_zone(zone: &str) -> String {
    zone.replace('/', "@")
}

/// Resolve a user-supplied zone name to a timezone, treating the
/// "Default device" marker as UTC
pub fn resolve_zone(zone: &str) -> Result<Tz> {
    let zone = unescape_zone(zone);
    if zone == DEFAULT_DEVICE_ZONE {
        return Ok(Tz::UTC);
    }
    zone.parse::<Tz>()
        .map_err(|_| anyhow::anyhow!("Unknown timezone: {}", zone))
}

/// Format a UTC timestamp in the given zone
pub fn format_in_zone(utc: DateTime<Utc>, zone: Tz, format: &str) -> String {
    utc.with_timezone(&zone).format(format).to_string()
}

/// Shift a naive UTC timestamp into the user's local wall-clock time
pub fn to_local_naive(utc: NaiveDateTime, zone: Tz) -> NaiveDateTime {
    Utc.from_utc_datetime(&utc)
        .with_timezone(&zone)
        .naive_local()
}

/// Parse a timestamp as stored in the database (RFC 3339 or
/// `YYYY-MM-DD HH:MM:SS`)
pub fn parse_db_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S") {
        return Some(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
    }
    None
}

/// Parse a datetime path parameter (RFC 3339 with or without offset)
pub fn parse_datetime_param(raw: &str) -> Result<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .with_context(|| format!("Invalid datetime: {}", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_zone_escaping_round_trip() {
        assert_eq!(escape_zone("America/Sao_Paulo"), "America@Sao_Paulo");
        assert_eq!(unescape_zone("America@Sao_Paulo"), "America/Sao_Paulo");
        // Zones without a slash pass through untouched
        assert_eq!(escape_zone("UTC"), "UTC");
    }

    #[test]
    fn test_default_device_is_utc() {
        assert_eq!(resolve_zone(DEFAULT_DEVICE_ZONE).unwrap(), Tz::UTC);
    }

    #[test]
    fn test_resolve_escaped_zone() {
        let tz = resolve_zone("America@Sao_Paulo").unwrap();
        assert_eq!(tz, chrono_tz::America::Sao_Paulo);
    }

    #[test]
    fn test_unknown_zone_is_an_error() {
        assert!(resolve_zone("Atlantis/Capital").is_err());
    }

    #[test]
    fn test_to_local_naive_shifts_wall_clock() {
        let utc = NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        // Sao Paulo is UTC-3 in June (no DST)
        let local = to_local_naive(utc, chrono_tz::America::Sao_Paulo);
        assert_eq!(local.format("%H:%M").to_string(), "09:00");
    }

    #[test]
    fn test_parse_db_timestamp_formats() {
        assert!(parse_db_timestamp("2024-06-15T12:00:00Z").is_some());
        assert!(parse_db_timestamp("2024-06-15 12:00:00").is_some());
        assert!(parse_db_timestamp("garbage").is_none());
    }

    #[test]
    fn test_parse_datetime_param() {
        assert!(parse_datetime_param("2024-06-15T12:00:00").is_ok());
        assert!(parse_datetime_param("2024-06-15T12:00:00Z").is_ok());
        assert!(parse_datetime_param("15/06/2024").is_err());
    }
}
