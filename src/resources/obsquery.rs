//! As-flown science timeline (AFST): what was observed and when.

use super::{envelope_accessors, opt, Credentials, Data, Resource};
use crate::domain::instrument::{deserialize_hex_mode, deserialize_xrt_mode};
use crate::domain::time::{api_datetime, option_api_datetime};
use crate::domain::{DateRange, ObsId, SkyPosition, Status};
use crate::schema::{FieldKind, FieldSpec, Rule, Schema, Verb, BEGIN, DEC, END, RA, RADIUS};
use chrono::{Duration, NaiveDateTime};
use serde::Deserialize;
use serde_json::{Map, Value};

static GET: Schema = Schema::new(
    &[
        BEGIN,
        END,
        RA,
        DEC,
        RADIUS,
        FieldSpec::optional("targetid", FieldKind::Int),
        FieldSpec::optional("obsid", FieldKind::ObsIdSpacecraft),
    ],
    &[
        Rule::DateRange { required: false },
        Rule::Together(&["ra", "dec"]),
        Rule::AtLeastOne(&[&["begin"], &["ra", "dec"], &["targetid"], &["obsid"]]),
    ],
);

/// One snapshot of the as-flown timeline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AfstEntry {
    #[serde(with = "api_datetime")]
    pub begin: NaiveDateTime,
    #[serde(default, with = "option_api_datetime")]
    pub settle: Option<NaiveDateTime>,
    #[serde(with = "api_datetime")]
    pub end: NaiveDateTime,
    pub targetid: u32,
    pub seg: u32,
    #[serde(default)]
    pub ra: Option<f64>,
    #[serde(default)]
    pub dec: Option<f64>,
    #[serde(default)]
    pub roll: Option<f64>,
    #[serde(default)]
    pub target_name: Option<String>,
    #[serde(default)]
    pub obstype: Option<String>,
    #[serde(default, alias = "xrt", deserialize_with = "deserialize_xrt_mode")]
    pub xrt_mode: Option<String>,
    #[serde(default, alias = "uvot", deserialize_with = "deserialize_hex_mode")]
    pub uvot_mode: Option<String>,
    #[serde(default, alias = "bat", deserialize_with = "deserialize_hex_mode")]
    pub bat_mode: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub timetarget: Option<f64>,
    #[serde(default)]
    pub timeobs: Option<f64>,
    #[serde(default)]
    pub flag: Option<i64>,
    #[serde(default)]
    pub mvdfwpos: Option<i64>,
    #[serde(default)]
    pub targettype: Option<i64>,
    #[serde(default)]
    pub sunha: Option<f64>,
    #[serde(default)]
    pub ra_object: Option<f64>,
    #[serde(default)]
    pub dec_object: Option<f64>,
}

impl AfstEntry {
    pub fn obsid(&self) -> ObsId {
        ObsId::new(self.targetid, self.seg)
    }

    /// Time from the start of the slew until the spacecraft settled.
    pub fn slewtime(&self) -> Duration {
        self.settle
            .map(|s| s - self.begin)
            .unwrap_or_else(Duration::zero)
    }

    pub fn exposure(&self) -> Duration {
        self.end - self.settle.unwrap_or(self.begin)
    }
}

/// All snapshots sharing one observation id.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub obsid: ObsId,
    pub snapshots: Vec<AfstEntry>,
}

impl Observation {
    /// Archive query for this observation's data.
    pub fn data(&self) -> Data {
        Data::for_observation(self)
    }

    pub fn begin(&self) -> Option<NaiveDateTime> {
        self.snapshots.iter().map(|s| s.begin).min()
    }

    pub fn end(&self) -> Option<NaiveDateTime> {
        self.snapshots.iter().map(|s| s.end).max()
    }

    pub fn exposure(&self) -> Duration {
        self.snapshots
            .iter()
            .fold(Duration::zero(), |acc, s| acc + s.exposure())
    }

    pub fn slewtime(&self) -> Duration {
        self.snapshots
            .iter()
            .fold(Duration::zero(), |acc, s| acc + s.slewtime())
    }

    pub fn target_name(&self) -> Option<&str> {
        self.snapshots.first().and_then(|s| s.target_name.as_deref())
    }

    pub fn ra_object(&self) -> Option<f64> {
        self.snapshots.first().and_then(|s| s.ra_object)
    }

    pub fn dec_object(&self) -> Option<f64> {
        self.snapshots.first().and_then(|s| s.dec_object)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObsQuery {
    pub name: Option<String>,
    pub position: SkyPosition,
    pub range: DateRange,
    pub targetid: Option<u32>,
    pub obsid: Option<ObsId>,
    pub entries: Vec<AfstEntry>,
    pub afstmax: Option<NaiveDateTime>,
    pub status: Status,
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize)]
pub struct ObsQueryResponse {
    #[serde(default)]
    pub entries: Option<Vec<AfstEntry>>,
    #[serde(default, with = "option_api_datetime")]
    pub afstmax: Option<NaiveDateTime>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl ObsQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_target(targetid: u32) -> Self {
        Self {
            targetid: Some(targetid),
            ..Self::default()
        }
    }

    /// Snapshots grouped by observation id, in order of first appearance.
    pub fn observations(&self) -> Vec<Observation> {
        let mut groups: Vec<Observation> = Vec::new();
        for entry in &self.entries {
            let obsid = entry.obsid();
            match groups.iter_mut().find(|g| g.obsid == obsid) {
                Some(group) => group.snapshots.push(entry.clone()),
                None => groups.push(Observation {
                    obsid,
                    snapshots: vec![entry.clone()],
                }),
            }
        }
        groups
    }
}

impl Resource for ObsQuery {
    type Response = ObsQueryResponse;

    fn api_name(&self) -> &'static str {
        "AFST"
    }

    fn schema(&self, verb: Verb) -> Option<&'static Schema> {
        match verb {
            Verb::Get => Some(&GET),
            _ => None,
        }
    }

    fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        self.range.write_fields(&mut fields);
        self.position.write_fields(&mut fields);
        fields.insert("targetid".into(), opt(self.targetid));
        fields.insert(
            "obsid".into(),
            self.obsid
                .map(|id| Value::from(id.spacecraft()))
                .unwrap_or(Value::Null),
        );
        fields
    }

    fn absorb(&mut self, response: ObsQueryResponse) {
        if let Some(entries) = response.entries {
            self.entries = entries;
        }
        if response.afstmax.is_some() {
            self.afstmax = response.afstmax;
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
