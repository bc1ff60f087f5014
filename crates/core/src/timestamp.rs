//! Event timestamp coercion
//!
//! Callers may stamp an event themselves, either as epoch milliseconds or
//! as a date string. Both forms normalize to an ISO-8601 UTC string with
//! millisecond precision before the payload is built; anything that cannot
//! be coerced rejects the track call.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

use crate::error::{PayloadError, Result};

/// A caller-supplied event timestamp, prior to normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum EventTimestamp {
    /// Milliseconds since the Unix epoch
    EpochMillis(i64),
    /// A date string in any format chrono can parse
    Text(String),
}

impl EventTimestamp {
    /// Normalize to an ISO-8601 UTC string with millisecond precision,
    /// e.g. `2024-01-01T09:09:09.000Z`.
    ///
    /// # Errors
    ///
    /// [`PayloadError::InvalidTimestamp`] when the value is out of range
    /// or the text form does not parse as a date.
    pub fn resolve(&self) -> Result<String> {
        let datetime = match self {
            Self::EpochMillis(ms) => Utc
                .timestamp_millis_opt(*ms)
                .single()
                .ok_or_else(|| PayloadError::invalid_timestamp(ms.to_string()))?,
            Self::Text(text) => parse_text(text)
                .ok_or_else(|| PayloadError::invalid_timestamp(text.clone()))?,
        };
        Ok(datetime.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl From<i64> for EventTimestamp {
    fn from(ms: i64) -> Self {
        Self::EpochMillis(ms)
    }
}

impl From<&str> for EventTimestamp {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for EventTimestamp {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// The current time as an ISO-8601 UTC string with millisecond precision.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_text(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    // Date-only form, midnight UTC
    if let Ok(date) = chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_millis_resolve() {
        let ts = EventTimestamp::EpochMillis(1_704_099_549_000);
        assert_eq!(ts.resolve().unwrap(), "2024-01-01T09:39:09.000Z");
    }

    #[test]
    fn test_rfc3339_text_resolve() {
        let ts = EventTimestamp::from("2024-01-01T09:09:09.000Z");
        assert_eq!(ts.resolve().unwrap(), "2024-01-01T09:09:09.000Z");
    }

    #[test]
    fn test_offset_text_normalizes_to_utc() {
        let ts = EventTimestamp::from("2024-01-01T09:09:09.000+02:00");
        assert_eq!(ts.resolve().unwrap(), "2024-01-01T07:09:09.000Z");
    }

    #[test]
    fn test_date_only_text() {
        let ts = EventTimestamp::from("2024-06-15");
        assert_eq!(ts.resolve().unwrap(), "2024-06-15T00:00:00.000Z");
    }

    #[test]
    fn test_garbage_text_rejected() {
        let err = EventTimestamp::from("not a date").resolve().unwrap_err();
        assert!(matches!(
            err,
            PayloadError::InvalidTimestamp { ref value } if value == "not a date"
        ));
    }

    #[test]
    fn test_out_of_range_millis_rejected() {
        assert!(EventTimestamp::EpochMillis(i64::MAX).resolve().is_err());
    }

    #[test]
    fn test_now_iso8601_shape() {
        let now = now_iso8601();
        assert!(now.ends_with('Z'));
        assert_eq!(now.len(), "2024-01-01T09:09:09.000Z".len());
    }
}
