//! Pre-planned science timeline (PPST) queries.

use super::{envelope_accessors, Credentials, Resource};
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
        FieldSpec::optional("obsid", FieldKind::ObsIdSpacecraft),
    ],
    &[
        Rule::DateRange { required: false },
        Rule::Together(&["ra", "dec"]),
        Rule::AtLeastOne(&[&["begin"], &["end"], &["ra", "dec"], &["obsid"]]),
    ],
);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlanEntry {
    #[serde(with = "api_datetime")]
    pub begin: NaiveDateTime,
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
    #[serde(default, alias = "xrt", deserialize_with = "deserialize_xrt_mode")]
    pub xrt_mode: Option<String>,
    #[serde(default, alias = "uvot", deserialize_with = "deserialize_hex_mode")]
    pub uvot_mode: Option<String>,
    #[serde(default, alias = "bat", deserialize_with = "deserialize_hex_mode")]
    pub bat_mode: Option<String>,
    #[serde(default)]
    pub fom: Option<f64>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub timetarg: Option<f64>,
    #[serde(default)]
    pub takodb: Option<String>,
    #[serde(default, rename = "sunHA", alias = "sunha")]
    pub sunha: Option<f64>,
}

impl PlanEntry {
    pub fn obsid(&self) -> ObsId {
        ObsId::new(self.targetid, self.seg)
    }

    pub fn exposure(&self) -> Duration {
        self.end - self.begin
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanQuery {
    pub name: Option<String>,
    pub position: SkyPosition,
    pub range: DateRange,
    pub obsid: Option<ObsId>,
    pub entries: Vec<PlanEntry>,
    pub ppstmax: Option<NaiveDateTime>,
    pub status: Status,
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize)]
pub struct PlanQueryResponse {
    #[serde(default)]
    pub entries: Option<Vec<PlanEntry>>,
    #[serde(default, with = "option_api_datetime")]
    pub ppstmax: Option<NaiveDateTime>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl PlanQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn around(position: SkyPosition) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn during(range: DateRange) -> Self {
        Self {
            range,
            ..Self::default()
        }
    }

    pub fn for_obsid(obsid: ObsId) -> Self {
        Self {
            obsid: Some(obsid),
            ..Self::default()
        }
    }

    /// Total planned exposure per observation id, in first-seen order.
    pub fn exposure_by_obsid(&self) -> Vec<(ObsId, Duration)> {
        let mut totals: Vec<(ObsId, Duration)> = Vec::new();
        for entry in &self.entries {
            match totals.iter_mut().find(|(id, _)| *id == entry.obsid()) {
                Some((_, total)) => *total += entry.exposure(),
                None => totals.push((entry.obsid(), entry.exposure())),
            }
        }
        totals
    }
}

impl Resource for PlanQuery {
    type Response = PlanQueryResponse;

    fn api_name(&self) -> &'static str {
        "PlanQuery"
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
        fields.insert(
            "obsid".into(),
            self.obsid
                .map(|id| Value::from(id.spacecraft()))
                .unwrap_or(Value::Null),
        );
        fields
    }

    fn absorb(&mut self, response: PlanQueryResponse) {
        if let Some(entries) = response.entries {
            self.entries = entries;
        }
        if response.ppstmax.is_some() {
            self.ppstmax = response.ppstmax;
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
    fn test_empty_query_rejected() {
        let err = GET.validate(&PlanQuery::new().fields()).unwrap_err();
        assert_eq!(err.message, "At least one of the query parameters must be set");
    }

    #[test]
    fn test_position_sends_default_radius() {
        let params = GET
            .validate(&PlanQuery::around(SkyPosition::new(10.0, 20.0)).fields())
            .unwrap();
        assert_eq!(params["radius"], json!(11.8 / 60.0));
    }

    #[test]
    fn test_obsid_sent_in_spacecraft_form() {
        let params = GET
            .validate(&PlanQuery::for_obsid(ObsId::new(12345, 3)).fields())
            .unwrap();
        assert_eq!(params["obsid"], json!(12345 + (3 << 24)));
    }

    #[test]
    fn test_entry_modes_and_exposure() {
        let mut query = PlanQuery::new();
        let response: PlanQueryResponse = serde_json::from_value(json!({
            "entries": [
                {"begin": "2024-01-01 00:00:00", "end": "2024-01-01 00:10:00",
                 "targetid": 12345, "seg": 1, "xrt": 7, "uvot": 12525, "bat": 0,
                 "target_name": "Crab"},
                {"begin": "2024-01-01 02:00:00", "end": "2024-01-01 02:05:00",
                 "targetid": 12345, "seg": 1, "xrt_mode": "WT"}
            ],
            "ppstmax": "2024-01-08 00:00:00"
        }))
        .unwrap();
        query.absorb(response);
        assert_eq!(query.entries[0].xrt_mode.as_deref(), Some("PC"));
        assert_eq!(query.entries[0].uvot_mode.as_deref(), Some("0x30ed"));
        assert_eq!(query.entries[1].xrt_mode.as_deref(), Some("WT"));
        assert_eq!(
            query.exposure_by_obsid(),
            vec![(ObsId::new(12345, 1), Duration::minutes(15))]
        );
        assert!(query.ppstmax.is_some());
    }
}
