//! Long-term target visibility windows.

use super::{envelope_accessors, opt, Credentials, Resource};
use crate::domain::time::api_datetime;
use crate::domain::{DateRange, SkyPosition, Status};
use crate::schema::{DefaultValue, FieldKind, FieldSpec, Rule, Schema, Verb, DEC_REQUIRED, RA_REQUIRED};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

static GET: Schema = Schema::new(
    &[
        RA_REQUIRED,
        DEC_REQUIRED,
        FieldSpec::required("begin", FieldKind::DateTime),
        FieldSpec::required("end", FieldKind::DateTime),
        FieldSpec::optional("hires", FieldKind::Bool).default(DefaultValue::Bool(false)),
    ],
    &[Rule::DateRange { required: true }],
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisWindow {
    #[serde(with = "api_datetime")]
    pub begin: NaiveDateTime,
    #[serde(with = "api_datetime")]
    pub end: NaiveDateTime,
    #[serde(default)]
    pub initial: Option<String>,
    #[serde(default, rename = "final")]
    pub final_constraint: Option<String>,
}

impl VisWindow {
    pub fn length(&self) -> Duration {
        self.end - self.begin
    }
}

#[derive(Debug, Clone, Default)]
pub struct VisQuery {
    pub name: Option<String>,
    pub position: SkyPosition,
    pub range: DateRange,
    pub hires: Option<bool>,
    pub entries: Vec<VisWindow>,
    pub status: Status,
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize)]
pub struct VisQueryResponse {
    #[serde(default)]
    pub entries: Option<Vec<VisWindow>>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl VisQuery {
    pub fn new(position: SkyPosition, range: DateRange) -> Self {
        Self {
            position,
            range,
            ..Self::default()
        }
    }

    pub fn for_name(name: impl Into<String>, range: DateRange) -> Self {
        Self {
            name: Some(name.into()),
            range,
            ..Self::default()
        }
    }

    pub fn windows(&self) -> &[VisWindow] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Resource for VisQuery {
    type Response = VisQueryResponse;

    fn api_name(&self) -> &'static str {
        "VisQuery"
    }

    fn schema(&self, verb: Verb) -> Option<&'static Schema> {
        match verb {
            Verb::Get => Some(&GET),
            _ => None,
        }
    }

    fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        self.position.write_fields(&mut fields);
        self.range.write_fields(&mut fields);
        fields.insert("hires".into(), opt(self.hires));
        fields
    }

    fn absorb(&mut self, response: VisQueryResponse) {
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
