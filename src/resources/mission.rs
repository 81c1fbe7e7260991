//! Mission configuration published by the service: the spacecraft, its
//! instruments and the constraint settings used for visibility.

use super::{envelope_accessors, Credentials, Resource};
use crate::domain::{Instrument, Status};
use crate::schema::{Schema, Verb};
use serde::Deserialize;
use serde_json::{Map, Value};

static GET: Schema = Schema::new(&[], &[]);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MissionInfo {
    pub name: String,
    pub shortname: String,
    #[serde(default)]
    pub agency: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub pi: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MissionConfig {
    pub mission: Option<MissionInfo>,
    pub instruments: Vec<Instrument>,
    pub ephem: Option<Value>,
    pub visibility: Option<Value>,
    pub tle: Option<Value>,
    pub status: Status,
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize)]
pub struct MissionConfigResponse {
    #[serde(default)]
    pub mission: Option<MissionInfo>,
    #[serde(default)]
    pub instruments: Option<Vec<Instrument>>,
    #[serde(default)]
    pub ephem: Option<Value>,
    #[serde(default)]
    pub visibility: Option<Value>,
    #[serde(default)]
    pub tle: Option<Value>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl MissionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instrument(&self, shortname: &str) -> Option<&Instrument> {
        self.instruments
            .iter()
            .find(|i| i.shortname.eq_ignore_ascii_case(shortname))
    }
}

impl Resource for MissionConfig {
    type Response = MissionConfigResponse;

    fn api_name(&self) -> &'static str {
        "Config"
    }

    fn schema(&self, verb: Verb) -> Option<&'static Schema> {
        match verb {
            Verb::Get => Some(&GET),
            _ => None,
        }
    }

    fn fields(&self) -> Map<String, Value> {
        Map::new()
    }

    fn absorb(&mut self, response: MissionConfigResponse) {
        if response.mission.is_some() {
            self.mission = response.mission;
        }
        if let Some(instruments) = response.instruments {
            self.instruments = instruments;
        }
        for (slot, value) in [
            (&mut self.ephem, response.ephem),
            (&mut self.visibility, response.visibility),
            (&mut self.tle, response.tle),
        ] {
            if value.is_some() {
                *slot = value;
            }
        }
        if let Some(status) = response.status {
            self.status = status;
        }
    }

    envelope_accessors!();
}
