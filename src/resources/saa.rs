//! South Atlantic Anomaly passages, spacecraft or BAT definition.

use super::{envelope_accessors, opt, Credentials, Resource};
use crate::domain::time::api_datetime;
use crate::domain::{DateRange, Status};
use crate::schema::{DefaultValue, FieldKind, FieldSpec, Rule, Schema, Verb};
use chrono::{Duration, NaiveDateTime};
use serde::Deserialize;
use serde_json::{Map, Value};

static GET: Schema = Schema::new(
    &[
        FieldSpec::required("begin", FieldKind::DateTime),
        FieldSpec::required("end", FieldKind::DateTime),
        FieldSpec::optional("bat", FieldKind::Bool).default(DefaultValue::Bool(false)),
        FieldSpec::optional("hires", FieldKind::Bool).default(DefaultValue::Bool(false)),
    ],
    &[Rule::DateRange { required: true }],
);

/// Days covered when only a start is given.
const DEFAULT_LENGTH_DAYS: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SaaEntry {
    #[serde(with = "api_datetime")]
    pub begin: NaiveDateTime,
    #[serde(with = "api_datetime")]
    pub end: NaiveDateTime,
}

impl SaaEntry {
    pub fn length(&self) -> Duration {
        self.end - self.begin
    }
}

#[derive(Debug, Clone, Default)]
pub struct Saa {
    pub range: DateRange,
    /// Use the BAT count rate flag estimate instead of the spacecraft model.
    pub bat: Option<bool>,
    pub hires: Option<bool>,
    pub entries: Vec<SaaEntry>,
    pub status: Status,
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize)]
pub struct SaaResponse {
    #[serde(default)]
    pub entries: Option<Vec<SaaEntry>>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl Saa {
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            ..Self::default()
        }
    }

    pub fn bat(mut self) -> Self {
        self.bat = Some(true);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Resource for Saa {
    type Response = SaaResponse;

    fn api_name(&self) -> &'static str {
        "SAA"
    }

    fn schema(&self, verb: Verb) -> Option<&'static Schema> {
        match verb {
            Verb::Get => Some(&GET),
            _ => None,
        }
    }

    fn fields(&self) -> Map<String, Value> {
        let mut range = self.range.clone();
        if range.length.is_none() && range.end.is_none() {
            range.length = Some(DEFAULT_LENGTH_DAYS);
        }
        let mut fields = Map::new();
        range.write_fields(&mut fields);
        fields.insert("bat".into(), opt(self.bat));
        fields.insert("hires".into(), opt(self.hires));
        fields
    }

    fn absorb(&mut self, response: SaaResponse) {
        if let Some(entries) = response.entries {
            self.entries = entries;
        }
        if let Some(status) = response.status {
            self.status = status;
        }
    }

    envelope_accessors!();
}
