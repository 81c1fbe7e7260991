//! Latest two-line element set for the spacecraft.

use super::{envelope_accessors, Credentials, Resource};
use crate::domain::{Status, TimeInput, TleEntry};
use crate::schema::{FieldKind, FieldSpec, Schema, Verb};
use serde::Deserialize;
use serde_json::{Map, Value};

static GET: Schema = Schema::new(&[FieldSpec::optional("epoch", FieldKind::DateTime)], &[]);

#[derive(Debug, Clone, Default)]
pub struct Tle {
    /// Closest element set to this time; latest when unset.
    pub epoch: Option<TimeInput>,
    pub tle: Option<TleEntry>,
    pub status: Status,
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize)]
pub struct TleResponse {
    #[serde(default)]
    pub tle: Option<TleEntry>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl Tle {
    pub fn latest() -> Self {
        Self::default()
    }

    pub fn at(epoch: impl Into<TimeInput>) -> Self {
        Self {
            epoch: Some(epoch.into()),
            ..Self::default()
        }
    }
}

impl Resource for Tle {
    type Response = TleResponse;

    fn api_name(&self) -> &'static str {
        "TLE"
    }

    fn schema(&self, verb: Verb) -> Option<&'static Schema> {
        match verb {
            Verb::Get => Some(&GET),
            _ => None,
        }
    }

    fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            "epoch".into(),
            self.epoch
                .as_ref()
                .map(TimeInput::to_value)
                .unwrap_or(Value::Null),
        );
        fields
    }

    fn absorb(&mut self, response: TleResponse) {
        if response.tle.is_some() {
            self.tle = response.tle;
        }
        if let Some(status) = response.status {
            self.status = status;
        }
    }

    envelope_accessors!();
}
