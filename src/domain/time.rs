//! Date/time inputs and the wire format used by the API.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde_json::Value;
use tracing::warn;

/// Canonical outgoing format. Fractional seconds are only written when present.
pub const API_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// A point in time as supplied by a caller. Converted to a naive UTC
/// datetime during validation.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeInput {
    Naive(NaiveDateTime),
    Utc(DateTime<Utc>),
    Date(NaiveDate),
    Text(String),
}

impl TimeInput {
    pub fn resolve(&self) -> Result<NaiveDateTime, String> {
        match self {
            TimeInput::Naive(dt) => Ok(*dt),
            TimeInput::Utc(dt) => Ok(dt.naive_utc()),
            TimeInput::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
            TimeInput::Text(s) => parse_datetime(s),
        }
    }

    /// Manifest value. Typed inputs are rendered in the wire format, text is
    /// passed through for the validator to parse.
    pub fn to_value(&self) -> Value {
        match self {
            TimeInput::Text(s) => Value::String(s.clone()),
            other => match other.resolve() {
                Ok(dt) => Value::String(format_datetime(&dt)),
                Err(_) => Value::Null,
            },
        }
    }
}

impl From<NaiveDateTime> for TimeInput {
    fn from(dt: NaiveDateTime) -> Self {
        TimeInput::Naive(dt)
    }
}

impl From<DateTime<Utc>> for TimeInput {
    fn from(dt: DateTime<Utc>) -> Self {
        TimeInput::Utc(dt)
    }
}

impl From<NaiveDate> for TimeInput {
    fn from(d: NaiveDate) -> Self {
        TimeInput::Date(d)
    }
}

impl From<&str> for TimeInput {
    fn from(s: &str) -> Self {
        TimeInput::Text(s.to_string())
    }
}

impl From<String> for TimeInput {
    fn from(s: String) -> Self {
        TimeInput::Text(s)
    }
}

pub fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format(API_DATETIME_FORMAT).to_string()
}

/// Parse a caller supplied date/time string into naive UTC.
///
/// Accepts `YYYY-MM-DD HH:MM:SS[.f]`, `YYYY-MM-DD`, and ISO 8601 with an
/// offset. ISO 8601 without an offset is taken as local time.
pub fn parse_datetime(s: &str) -> Result<NaiveDateTime, String> {
    let s = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, NAIVE_FORMATS[0]) {
        return Ok(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d.and_time(NaiveTime::MIN));
    }
    if let Some(dt) = parse_with_offset(s) {
        return Ok(dt);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, NAIVE_FORMATS[1]) {
        warn!(
            value = s,
            "ISO8601 dates with no timezone are assumed to be local time and converted to UTC"
        );
        return Ok(local_to_utc(naive));
    }
    Err("Date/time given as string should be 'YYYY-MM-DD HH:MM:SS' or ISO8601 format.".into())
}

/// Parse a datetime returned by the server. Naive values are already UTC.
pub fn parse_api_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| parse_with_offset(s))
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn parse_with_offset(s: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z"))
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
        .map(|dt| dt.with_timezone(&Utc).naive_utc())
}

fn local_to_utc(naive: NaiveDateTime) -> NaiveDateTime {
    match Local.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc).naive_utc(),
        None => naive,
    }
}

/// Serde adapter for server datetimes in either `T` or space separated form.
pub mod api_datetime {
    use chrono::NaiveDateTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_datetime(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_api_datetime(&raw)
            .ok_or_else(|| D::Error::custom(format!("invalid datetime '{}'", raw)))
    }
}

pub mod option_api_datetime {
    use chrono::NaiveDateTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &Option<NaiveDateTime>, s: S) -> Result<S::Ok, S::Error> {
        match dt {
            Some(dt) => s.serialize_some(&super::format_datetime(dt)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        match Option::<String>::deserialize(d)? {
            None => Ok(None),
            Some(raw) => super::parse_api_datetime(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid datetime '{}'", raw))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_parse_plain_and_fractional() {
        assert_eq!(
            parse_datetime("2024-01-01 12:30:00"),
            Ok(dt("2024-01-01 12:30:00"))
        );
        let frac = parse_datetime("2024-01-01 12:30:00.25").unwrap();
        assert_eq!(frac.and_utc().timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_parse_date_only() {
        assert_eq!(parse_datetime("2024-01-01"), Ok(dt("2024-01-01 00:00:00")));
    }

    #[test]
    fn test_parse_iso_with_offset_converts_to_utc() {
        assert_eq!(
            parse_datetime("2024-01-01T05:00:00+02:00"),
            Ok(dt("2024-01-01 03:00:00"))
        );
        assert_eq!(
            parse_datetime("2024-01-01T05:00:00Z"),
            Ok(dt("2024-01-01 05:00:00"))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_datetime("next tuesday").is_err());
    }

    #[test]
    fn test_format_omits_zero_fraction() {
        assert_eq!(format_datetime(&dt("2024-01-01 00:00:00")), "2024-01-01 00:00:00");
    }

    #[test]
    fn test_api_datetime_accepts_both_separators() {
        assert_eq!(
            parse_api_datetime("2024-01-01T01:02:03"),
            Some(dt("2024-01-01 01:02:03"))
        );
        assert_eq!(
            parse_api_datetime("2024-01-01 01:02:03"),
            Some(dt("2024-01-01 01:02:03"))
        );
    }

    #[test]
    fn test_time_input_to_value() {
        let input = TimeInput::from(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(input.to_value(), Value::String("2024-01-01 00:00:00".into()));
        let text = TimeInput::from("2024-01-01");
        assert_eq!(text.to_value(), Value::String("2024-01-01".into()));
    }
}
