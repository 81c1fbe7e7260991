//! GUANO: BAT event data dumps commanded after external triggers.

use super::{envelope_accessors, opt, Credentials, Resource, ANONYMOUS};
use crate::domain::time::{api_datetime, option_api_datetime};
use crate::domain::{DateRange, MissionTime, ObsId, Status, TimeBase, TimeInput};
use crate::errors::ValidationError;
use crate::schema::{DefaultValue, FieldKind, FieldSpec, Rule, Schema, Verb, BEGIN, END, USERNAME};
use chrono::{Duration, NaiveDateTime};
use serde::Deserialize;
use serde_json::{Map, Value};

static GET: Schema = Schema::new(
    &[
        USERNAME,
        FieldSpec::optional("subthreshold", FieldKind::Bool).default(DefaultValue::Bool(false)),
        FieldSpec::optional("successful", FieldKind::Bool).default(DefaultValue::Bool(false)),
        FieldSpec::optional("target_time", FieldKind::DateTime),
        BEGIN,
        END,
        FieldSpec::optional("limit", FieldKind::Int),
    ],
    &[
        Rule::DateRange { required: false },
        Rule::Check(check_subthreshold_user),
    ],
);

fn check_subthreshold_user(f: &Map<String, Value>) -> Result<(), ValidationError> {
    let subthreshold = f.get("subthreshold").and_then(Value::as_bool).unwrap_or(false);
    let user = f.get("username").and_then(Value::as_str).unwrap_or(ANONYMOUS);
    if subthreshold && user == ANONYMOUS {
        return Err(ValidationError::field(
            "username",
            "For subthreshold triggers, username cannot be anonymous.",
        ));
    }
    Ok(())
}

fn seconds(s: f64) -> Option<Duration> {
    if !s.is_finite() {
        return None;
    }
    Duration::try_milliseconds((s * 1e3).round() as i64)
}

/// One good time interval of dumped event data, in spacecraft time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GuanoGti {
    #[serde(with = "api_datetime")]
    pub begin: NaiveDateTime,
    #[serde(with = "api_datetime")]
    pub end: NaiveDateTime,
    #[serde(default)]
    pub exposure: Option<f64>,
    pub utcf: f64,
    #[serde(default)]
    pub acs: Option<String>,
    /// One file name or a list of them.
    #[serde(default)]
    pub filename: Option<Value>,
}

impl GuanoGti {
    fn mission_time(&self, at: NaiveDateTime) -> MissionTime {
        MissionTime::with_base(at, TimeBase::Spacecraft).with_utcf(self.utcf)
    }

    pub fn begin_time(&self) -> MissionTime {
        self.mission_time(self.begin)
    }

    pub fn end_time(&self) -> MissionTime {
        self.mission_time(self.end)
    }

    pub fn filenames(&self) -> Vec<String> {
        match &self.filename {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GuanoData {
    #[serde(with = "option_api_datetime")]
    pub target_time: Option<NaiveDateTime>,
    #[serde(deserialize_with = "crate::domain::obsid::deserialize_optional")]
    pub obsid: Option<ObsId>,
    #[serde(with = "option_api_datetime")]
    pub begin: Option<NaiveDateTime>,
    #[serde(with = "option_api_datetime")]
    pub end: Option<NaiveDateTime>,
    pub exposure: Option<f64>,
    pub filenames: Option<Vec<String>>,
    pub gti: Option<GuanoGti>,
    pub all_gtis: Vec<GuanoGti>,
    pub acs: Option<String>,
}

impl GuanoData {
    /// Data filed under the subthreshold trigger area of the archive rather
    /// than under a target id. `None` when no files are known.
    pub fn subthresh(&self) -> Option<bool> {
        let files = self.filenames.as_ref()?;
        Some(files.len() == 1 && files[0].contains("ms"))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GuanoEntry {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, with = "option_api_datetime")]
    pub begin: Option<NaiveDateTime>,
    #[serde(default, with = "option_api_datetime")]
    pub end: Option<NaiveDateTime>,
    #[serde(default)]
    pub target_type: Option<String>,
    #[serde(default, with = "option_api_datetime")]
    pub target_time: Option<NaiveDateTime>,
    /// Seconds from the trigger to the centre of the dump window.
    #[serde(default)]
    pub offset: Option<f64>,
    /// Seconds.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub quadsaway: Option<i64>,
    #[serde(default, with = "option_api_datetime")]
    pub exectime: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "crate::domain::obsid::deserialize_optional")]
    pub obsid: Option<ObsId>,
    #[serde(default)]
    pub ra: Option<f64>,
    #[serde(default)]
    pub dec: Option<f64>,
    #[serde(default)]
    pub data: GuanoData,
    #[serde(default, alias = "uplink", with = "option_api_datetime")]
    pub uplinked: Option<NaiveDateTime>,
    #[serde(default)]
    pub brbd_filename: Option<String>,
    #[serde(default)]
    pub brbd_commandnum: Option<i64>,
}

impl GuanoEntry {
    /// Quadsaway 1 and 3 mark a command that never reached the spacecraft.
    pub fn is_uplinked(&self) -> bool {
        !matches!(self.quadsaway, Some(1) | Some(3))
    }

    /// Quadsaway 2 and 3 mark a command the spacecraft did not execute.
    pub fn is_executed(&self) -> bool {
        !matches!(self.quadsaway, Some(2) | Some(3))
    }

    /// Quadrant count with the uplink/execution failure codes removed.
    pub fn quadrants_away(&self) -> Option<i64> {
        self.quadsaway.map(|q| if (1..=3).contains(&q) { 0 } else { q })
    }

    /// Dump window: the reported one, or `target_time + offset` widened by
    /// half the duration on either side.
    pub fn window(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        if let (Some(begin), Some(end)) = (self.begin, self.end) {
            return Some((begin, end));
        }
        let centre = self
            .target_time?
            .checked_add_signed(seconds(self.offset?)?)?;
        let half = seconds(self.duration? / 2.0)?;
        Some((centre.checked_sub_signed(half)?, centre.checked_add_signed(half)?))
    }
}

#[derive(Debug, Clone)]
pub struct Guano {
    pub range: DateRange,
    pub target_time: Option<TimeInput>,
    pub subthreshold: Option<bool>,
    /// Only dumps that produced data.
    pub successful: Option<bool>,
    pub limit: Option<u32>,
    pub entries: Vec<GuanoEntry>,
    pub guanostatus: Option<bool>,
    pub lastcommand: Option<NaiveDateTime>,
    pub status: Status,
    pub credentials: Credentials,
}

impl Default for Guano {
    fn default() -> Self {
        Self {
            range: DateRange::default(),
            target_time: None,
            subthreshold: None,
            successful: Some(true),
            limit: None,
            entries: Vec::new(),
            guanostatus: None,
            lastcommand: None,
            status: Status::default(),
            credentials: Credentials::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GuanoResponse {
    #[serde(default)]
    pub entries: Option<Vec<GuanoEntry>>,
    #[serde(default)]
    pub guanostatus: Option<bool>,
    #[serde(default, with = "option_api_datetime")]
    pub lastcommand: Option<NaiveDateTime>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl Guano {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn around(target_time: impl Into<TimeInput>) -> Self {
        Self {
            target_time: Some(target_time.into()),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Resource for Guano {
    type Response = GuanoResponse;

    fn api_name(&self) -> &'static str {
        "GUANO"
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
        fields.insert("subthreshold".into(), opt(self.subthreshold));
        fields.insert("successful".into(), opt(self.successful));
        fields.insert(
            "target_time".into(),
            self.target_time
                .as_ref()
                .map(TimeInput::to_value)
                .unwrap_or(Value::Null),
        );
        fields.insert("limit".into(), opt(self.limit));
        self.range.write_fields(&mut fields);
        fields
    }

    fn absorb(&mut self, response: GuanoResponse) {
        if let Some(entries) = response.entries {
            self.entries = entries;
        }
        if response.guanostatus.is_some() {
            self.guanostatus = response.guanostatus;
        }
        if response.lastcommand.is_some() {
            self.lastcommand = response.lastcommand;
        }
        if let Some(status) = response.status {
            self.status = status;
        }
    }

    envelope_accessors!();
}
