//! Planning calendar entries scheduled for TOO requests.

use super::{envelope_accessors, opt, Credentials, Resource};
use crate::domain::instrument::{deserialize_hex_mode, deserialize_xrt_mode};
use crate::domain::time::option_api_datetime;
use crate::domain::{DateRange, SkyPosition, Status};
use crate::schema::{FieldKind, FieldSpec, Rule, Schema, Verb, BEGIN, DEC, END, RA, RADIUS, USERNAME};
use chrono::{Duration, NaiveDateTime};
use serde::Deserialize;
use serde_json::{Map, Value};

static GET: Schema = Schema::new(
    &[
        USERNAME,
        FieldSpec::optional("too_id", FieldKind::Int),
        BEGIN,
        END,
        RA,
        DEC,
        RADIUS,
        FieldSpec::optional("targetid", FieldKind::Int),
    ],
    &[
        Rule::DateRange { required: false },
        Rule::Together(&["ra", "dec"]),
        Rule::AtLeastOne(&[&["too_id"], &["begin", "end"], &["ra", "dec"], &["targetid"]]),
    ],
);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CalendarEntry {
    #[serde(default, with = "option_api_datetime")]
    pub start: Option<NaiveDateTime>,
    #[serde(default, with = "option_api_datetime")]
    pub stop: Option<NaiveDateTime>,
    #[serde(default, alias = "xrt", deserialize_with = "deserialize_xrt_mode")]
    pub xrt_mode: Option<String>,
    #[serde(default, alias = "bat", deserialize_with = "deserialize_hex_mode")]
    pub bat_mode: Option<String>,
    #[serde(default, alias = "uvot", deserialize_with = "deserialize_hex_mode")]
    pub uvot_mode: Option<String>,
    /// Requested exposure, seconds.
    #[serde(default)]
    pub duration: Option<f64>,
    /// Exposure actually taken, seconds.
    #[serde(default)]
    pub asflown: Option<f64>,
    #[serde(default)]
    pub merit: Option<f64>,
    #[serde(default)]
    pub targetid: Option<u32>,
    #[serde(default)]
    pub ra: Option<f64>,
    #[serde(default)]
    pub dec: Option<f64>,
}

impl CalendarEntry {
    pub fn window(&self) -> Option<Duration> {
        Some(self.stop? - self.start?)
    }

    /// Fraction of the requested exposure already taken.
    pub fn completion(&self) -> Option<f64> {
        match (self.asflown, self.duration) {
            (Some(taken), Some(wanted)) if wanted > 0.0 => Some(taken / wanted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Calendar {
    pub name: Option<String>,
    pub too_id: Option<i64>,
    pub targetid: Option<u32>,
    pub range: DateRange,
    pub position: SkyPosition,
    pub entries: Vec<CalendarEntry>,
    pub status: Status,
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize)]
pub struct CalendarResponse {
    #[serde(default)]
    pub entries: Option<Vec<CalendarEntry>>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl Calendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_too(too_id: i64) -> Self {
        Self {
            too_id: Some(too_id),
            ..Self::default()
        }
    }

    pub fn total_asflown(&self) -> f64 {
        self.entries.iter().filter_map(|e| e.asflown).sum()
    }
}

impl Resource for Calendar {
    type Response = CalendarResponse;

    fn api_name(&self) -> &'static str {
        "Calendar"
    }

    fn schema(&self, verb: Verb) -> Option<&'static Schema> {
        match verb {
            Verb::Get => Some(&GET),
            _ => None,
        }
    }

    fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("username".into(), Value::String(self.credentials.username.clone()));
        fields.insert("too_id".into(), opt(self.too_id));
        fields.insert("targetid".into(), opt(self.targetid));
        self.range.write_fields(&mut fields);
        self.position.write_fields(&mut fields);
        fields
    }

    fn absorb(&mut self, response: CalendarResponse) {
        if let Some(entries) = response.entries {
            self.entries = entries;
        }
        if let Some(status) = response.status {
            self.status = status;
        }
    }

    envelope_accessors!();

    fn target_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn has_position(&self) -> bool {
        self.position.is_set()
    }

    fn set_position(&mut self, ra: f64, dec: f64) {
        self.position.set(ra, dec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_needs_a_selector() {
        let err = GET.validate(&Calendar::new().fields()).unwrap_err();
        assert_eq!(err.message, "At least one of the query parameters must be set");
        assert_eq!(err.fields, vec!["too_id", "begin", "end", "ra", "dec", "targetid"]);
        assert!(GET.validate(&Calendar::for_too(18000).fields()).is_ok());
    }

    #[test]
    fn test_entries() {
        let mut calendar = Calendar::for_too(18000);
        calendar.absorb(
            serde_json::from_value(json!({
                "entries": [
                    {"start": "2024-05-01 10:00:00", "stop": "2024-05-01 22:00:00",
                     "xrt_mode": 7, "uvot_mode": 39321, "bat_mode": 0,
                     "duration": 2000, "asflown": 1500.0, "merit": 70, "targetid": 16000}
                ]
            }))
            .unwrap(),
        );
        let entry = &calendar.entries[0];
        assert_eq!(entry.xrt_mode.as_deref(), Some("PC"));
        assert_eq!(entry.bat_mode.as_deref(), Some("0x0000"));
        assert_eq!(entry.window(), Some(Duration::hours(12)));
        assert_eq!(entry.completion(), Some(0.75));
        assert_eq!(calendar.total_asflown(), 1500.0);
    }
}
