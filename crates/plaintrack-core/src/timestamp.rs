use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, UtcOffset};

/// Milliseconds in one second.
pub const SECOND_MS: i64 = 1_000;
/// Milliseconds in one minute.
pub const MINUTE_MS: i64 = 60 * SECOND_MS;
/// Milliseconds in one hour.
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
/// Milliseconds in one day.
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// Parse an RFC 3339 timestamp, or a bare `YYYY-MM-DD` date meaning midnight UTC.
///
/// The result is always normalized to UTC.
///
/// # Errors
/// Returns the RFC 3339 parse error when neither form matches.
pub fn parse_timestamp(input: &str) -> Result<OffsetDateTime, time::error::Parse> {
    let trimmed = input.trim();
    match OffsetDateTime::parse(trimmed, &Rfc3339) {
        Ok(parsed) => Ok(parsed.to_offset(UtcOffset::UTC)),
        Err(err) => Date::parse(trimmed, format_description!("[year]-[month]-[day]"))
            .map(|date| date.midnight().assume_utc())
            .map_err(|_| err),
    }
}

/// Format a timestamp as RFC 3339 in UTC.
#[must_use]
pub fn format_timestamp(ts: OffsetDateTime) -> String {
    let utc = ts.to_offset(UtcOffset::UTC);
    utc.format(&Rfc3339)
        .unwrap_or_else(|_| utc.unix_timestamp().to_string())
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn unix_millis(ts: OffsetDateTime) -> i64 {
    i64::try_from(ts.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

/// Signed difference `later - earlier` in milliseconds.
#[must_use]
pub fn delta_millis(later: OffsetDateTime, earlier: OffsetDateTime) -> i64 {
    i64::try_from((later - earlier).whole_milliseconds()).unwrap_or(i64::MAX)
}

/// Midnight UTC of the calendar day containing `ts`.
#[must_use]
pub fn start_of_day(ts: OffsetDateTime) -> OffsetDateTime {
    ts.to_offset(UtcOffset::UTC).date().midnight().assume_utc()
}

/// Midnight UTC of the calendar day after the one containing `ts`.
#[must_use]
pub fn start_of_next_day(ts: OffsetDateTime) -> OffsetDateTime {
    start_of_day(ts) + Duration::days(1)
}

/// True when both timestamps fall on the same UTC calendar day.
#[must_use]
pub fn same_day(a: OffsetDateTime, b: OffsetDateTime) -> bool {
    a.to_offset(UtcOffset::UTC).date() == b.to_offset(UtcOffset::UTC).date()
}

/// Serde adapter for timestamps stored as RFC 3339 (or date-only) strings.
pub mod serde_timestamp {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;

    /// Serialize as an RFC 3339 string.
    ///
    /// # Errors
    /// Propagates serializer errors.
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S>(ts: &OffsetDateTime, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&super::format_timestamp(*ts))
    }

    /// Deserialize from an RFC 3339 or `YYYY-MM-DD` string.
    ///
    /// # Errors
    /// Fails when the string is not a recognizable timestamp.
    pub fn deserialize<'de, D>(d: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(d)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}
