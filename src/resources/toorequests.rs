//! Listing of submitted TOO requests.

use super::{envelope_accessors, opt, too::TooFields, Credentials, Resource};
use crate::domain::{DateRange, SkyPosition, Status};
use crate::schema::{
    DefaultValue, FieldKind, FieldSpec, Rule, Schema, Verb, BEGIN, DEC, END, RA, RADIUS, USERNAME,
};
use serde::Deserialize;
use serde_json::{Map, Value};

static GET: Schema = Schema::new(
    &[
        USERNAME,
        FieldSpec::optional("limit", FieldKind::Int),
        FieldSpec::optional("year", FieldKind::Int),
        FieldSpec::optional("detail", FieldKind::Bool).default(DefaultValue::Bool(false)),
        FieldSpec::optional("too_id", FieldKind::Int),
        FieldSpec::optional("debug", FieldKind::Bool).default(DefaultValue::Bool(false)),
        BEGIN,
        END,
        RA,
        DEC,
        RADIUS,
    ],
    &[
        Rule::DateRange { required: false },
        Rule::Together(&["ra", "dec"]),
    ],
);

#[derive(Debug, Clone, Default)]
pub struct TooRequests {
    pub name: Option<String>,
    pub limit: Option<u32>,
    pub year: Option<i32>,
    pub detail: Option<bool>,
    pub too_id: Option<i64>,
    pub debug: Option<bool>,
    pub range: DateRange,
    pub position: SkyPosition,
    pub entries: Vec<TooFields>,
    pub status: Status,
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize)]
pub struct TooRequestsResponse {
    #[serde(default)]
    pub entries: Option<Vec<TooFields>>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl TooRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent `limit` requests.
    pub fn latest(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn by_id(&self, too_id: i64) -> Option<&TooFields> {
        self.entries.iter().find(|e| e.identifier() == Some(too_id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Resource for TooRequests {
    type Response = TooRequestsResponse;

    fn api_name(&self) -> &'static str {
        "TOORequests"
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
        fields.insert("limit".into(), opt(self.limit));
        fields.insert("year".into(), opt(self.year));
        fields.insert("detail".into(), opt(self.detail));
        fields.insert("too_id".into(), opt(self.too_id));
        fields.insert("debug".into(), opt(self.debug));
        self.range.write_fields(&mut fields);
        self.position.write_fields(&mut fields);
        fields
    }

    fn absorb(&mut self, response: TooRequestsResponse) {
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
