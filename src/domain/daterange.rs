//! Date range value object: any two of begin, end and length determine the third.

use super::time::{format_datetime, TimeInput};
use crate::errors::ValidationError;
use chrono::{Duration, NaiveDateTime};
use serde_json::{Map, Value};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// A fully resolved range. `length` is in fractional days.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedRange {
    pub begin: NaiveDateTime,
    pub end: NaiveDateTime,
    pub length: f64,
}

impl ResolvedRange {
    pub fn duration(&self) -> Duration {
        self.end - self.begin
    }
}

/// `None` when the span does not fit a `Duration`.
pub fn days_to_duration(days: f64) -> Option<Duration> {
    Duration::try_milliseconds((days * MILLIS_PER_DAY).round() as i64)
}

pub fn duration_to_days(d: Duration) -> f64 {
    d.num_milliseconds() as f64 / MILLIS_PER_DAY
}

/// Derive the missing member of `(begin, end, length)`.
///
/// Returns `Ok(None)` when fewer than two members are known. When all three
/// are given, `length` is recomputed from `begin` and `end`.
pub fn resolve(
    begin: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    length: Option<f64>,
) -> Result<Option<ResolvedRange>, ValidationError> {
    if let Some(days) = length {
        if !days.is_finite() || days < 0.0 {
            return Err(ValidationError::field(
                "length",
                "length must be a non-negative number of days",
            ));
        }
    }
    let (begin, end) = match (begin, end, length) {
        (Some(b), Some(e), _) => (b, e),
        (Some(b), None, Some(len)) => {
            let end = days_to_duration(len).and_then(|d| b.checked_add_signed(d));
            (b, end.ok_or_else(out_of_range)?)
        }
        (None, Some(e), Some(len)) => {
            let begin = days_to_duration(len).and_then(|d| e.checked_sub_signed(d));
            (begin.ok_or_else(out_of_range)?, e)
        }
        _ => return Ok(None),
    };
    if end < begin {
        return Err(ValidationError::fields(
            ["begin", "end"],
            "end must not be before begin",
        ));
    }
    Ok(Some(ResolvedRange {
        begin,
        end,
        length: duration_to_days(end - begin),
    }))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateRange {
    pub begin: Option<TimeInput>,
    pub end: Option<TimeInput>,
    pub length: Option<f64>,
}

fn out_of_range() -> ValidationError {
    ValidationError::field("length", "length is out of range")
}

impl DateRange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn between(begin: impl Into<TimeInput>, end: impl Into<TimeInput>) -> Self {
        Self {
            begin: Some(begin.into()),
            end: Some(end.into()),
            length: None,
        }
    }

    pub fn starting(begin: impl Into<TimeInput>, length_days: f64) -> Self {
        Self {
            begin: Some(begin.into()),
            end: None,
            length: Some(length_days),
        }
    }

    pub fn ending(end: impl Into<TimeInput>, length_days: f64) -> Self {
        Self {
            begin: None,
            end: Some(end.into()),
            length: Some(length_days),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.begin.is_none() && self.end.is_none() && self.length.is_none()
    }

    pub fn resolved(&self) -> Result<Option<ResolvedRange>, ValidationError> {
        let begin = parse_member("begin", self.begin.as_ref())?;
        let end = parse_member("end", self.end.as_ref())?;
        resolve(begin, end, self.length)
    }

    /// Overwrite with server values, keeping length consistent.
    pub fn assign(&mut self, begin: NaiveDateTime, end: NaiveDateTime) {
        self.begin = Some(TimeInput::Naive(begin));
        self.end = Some(TimeInput::Naive(end));
        self.length = Some(duration_to_days(end - begin));
    }

    pub fn write_fields(&self, fields: &mut Map<String, Value>) {
        let member = |t: Option<&TimeInput>| t.map(TimeInput::to_value).unwrap_or(Value::Null);
        fields.insert("begin".into(), member(self.begin.as_ref()));
        fields.insert("end".into(), member(self.end.as_ref()));
        fields.insert(
            "length".into(),
            self.length
                .map(crate::utils::float_value)
                .unwrap_or(Value::Null),
        );
    }
}

fn parse_member(
    name: &str,
    value: Option<&TimeInput>,
) -> Result<Option<NaiveDateTime>, ValidationError> {
    value
        .map(|t| t.resolve().map_err(|e| ValidationError::field(name, e)))
        .transpose()
}

/// Apply the range derivation to a field manifest in place. Used by the
/// schema validator before per-field checks.
pub fn normalize_fields(
    fields: &mut Map<String, Value>,
    required: bool,
) -> Result<(), ValidationError> {
    let begin = datetime_member(fields, "begin")?;
    let end = datetime_member(fields, "end")?;
    let length = match fields.get("length") {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            crate::utils::num(v)
                .ok_or_else(|| ValidationError::field("length", "length must be a number"))?,
        ),
    };
    match resolve(begin, end, length)? {
        Some(range) => {
            fields.insert("begin".into(), Value::String(format_datetime(&range.begin)));
            fields.insert("end".into(), Value::String(format_datetime(&range.end)));
            fields.insert("length".into(), crate::utils::float_value(range.length));
            Ok(())
        }
        None if required => Err(ValidationError::fields(
            ["begin", "end"],
            "Begin and end required",
        )),
        None => Ok(()),
    }
}

fn datetime_member(
    fields: &Map<String, Value>,
    name: &str,
) -> Result<Option<NaiveDateTime>, ValidationError> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => super::time::parse_datetime(s)
            .map(Some)
            .map_err(|e| ValidationError::field(name, e)),
        Some(_) => Err(ValidationError::field(name, "expected a date/time string")),
    }
}
