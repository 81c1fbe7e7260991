//! Name resolution (Simbad, TNS, MARS) performed by the server.

use super::{absorb_fields, envelope_accessors, opt, Credentials, Resource};
use crate::domain::Status;
use crate::schema::{FieldKind, FieldSpec, Schema, Verb};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

static GET: Schema = Schema::new(&[FieldSpec::required("name", FieldKind::Str)], &[]);

#[derive(Debug, Clone, Default)]
pub struct Resolve {
    pub name: Option<String>,
    pub ra: Option<f64>,
    pub dec: Option<f64>,
    pub resolver: Option<String>,
    pub status: Status,
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize)]
pub struct ResolveResponse {
    #[serde(default)]
    pub ra: Option<f64>,
    #[serde(default)]
    pub dec: Option<f64>,
    #[serde(default)]
    pub resolver: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl Resolve {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        self.ra.zip(self.dec)
    }
}

impl Resource for Resolve {
    type Response = ResolveResponse;

    fn api_name(&self) -> &'static str {
        "Resolve"
    }

    fn schema(&self, verb: Verb) -> Option<&'static Schema> {
        match verb {
            Verb::Get => Some(&GET),
            _ => None,
        }
    }

    fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("name".into(), opt(self.name.clone()));
        fields
    }

    fn absorb(&mut self, response: ResolveResponse) {
        absorb_fields!(self, response; ra, dec, resolver);
        if let Some(status) = response.status {
            self.status = status;
        }
    }

    envelope_accessors!();
}

impl fmt::Display for Resolve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.position(), &self.name) {
            (Some((ra, dec)), Some(name)) => write!(
                f,
                "{}: RA={:.5} Dec={:.5} ({})",
                name,
                ra,
                dec,
                self.resolver.as_deref().unwrap_or("unknown resolver")
            ),
            _ => write!(f, "{}", self.status),
        }
    }
}
