//! UVOT mode lookup: the filter sequence a mode code expands to.

use super::{envelope_accessors, Credentials, Resource};
use crate::domain::instrument::{deserialize_mode_code, hex_mode};
use crate::domain::{SkyPosition, Status};
use crate::schema::{FieldKind, FieldSpec, Rule, Schema, Verb, DEC, RA};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

static GET: Schema = Schema::new(
    &[FieldSpec::required("uvot_mode", FieldKind::Mode), RA, DEC],
    &[Rule::Together(&["ra", "dec"])],
);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UvotModeEntry {
    pub uvot_mode: i64,
    pub filter_num: i64,
    pub min_exposure: f64,
    pub filter_pos: i64,
    pub filter_seqid: i64,
    #[serde(default)]
    pub image_fov: Option<i64>,
    #[serde(default)]
    pub event_fov: Option<i64>,
    #[serde(default)]
    pub binning: Option<i64>,
    #[serde(default)]
    pub max_exposure: Option<f64>,
    pub weight: i64,
    pub special: String,
    pub comment: String,
    pub filter_name: String,
}

impl UvotModeEntry {
    /// Image field of view when imaging, otherwise the event mode one.
    pub fn field_of_view(&self) -> Option<i64> {
        self.image_fov.or(self.event_fov)
    }

    pub fn eventmode(&self) -> bool {
        self.event_fov.is_some()
    }
}

impl fmt::Display for UvotModeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filter_name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UvotMode {
    pub uvot_mode: Option<i64>,
    pub position: SkyPosition,
    pub entries: Vec<UvotModeEntry>,
    pub status: Status,
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize)]
pub struct UvotModeResponse {
    #[serde(default, deserialize_with = "deserialize_mode_code")]
    pub uvot_mode: Option<i64>,
    #[serde(default)]
    pub entries: Option<Vec<UvotModeEntry>>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl UvotMode {
    pub fn new(uvot_mode: i64) -> Self {
        Self {
            uvot_mode: Some(uvot_mode),
            ..Self::default()
        }
    }

    /// Filter names in sequence order.
    pub fn filters(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.filter_name.as_str()).collect()
    }

    /// Weighted share of the exposure each filter receives.
    pub fn exposure_fractions(&self) -> Vec<(&str, f64)> {
        let total: i64 = self.entries.iter().map(|e| e.weight).sum();
        if total == 0 {
            return Vec::new();
        }
        self.entries
            .iter()
            .map(|e| (e.filter_name.as_str(), e.weight as f64 / total as f64))
            .collect()
    }
}

impl Resource for UvotMode {
    type Response = UvotModeResponse;

    fn api_name(&self) -> &'static str {
        "UVOTMode"
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
            "uvot_mode".into(),
            self.uvot_mode.map(Value::from).unwrap_or(Value::Null),
        );
        self.position.write_fields(&mut fields);
        fields
    }

    fn absorb(&mut self, response: UvotModeResponse) {
        if response.uvot_mode.is_some() {
            self.uvot_mode = response.uvot_mode;
        }
        if let Some(entries) = response.entries {
            self.entries = entries;
        }
        if let Some(status) = response.status {
            self.status = status;
        }
    }

    envelope_accessors!();
}

impl fmt::Display for UvotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.uvot_mode {
            Some(mode) => write!(f, "UVOT mode {}: {}", hex_mode(mode), self.filters().join(", ")),
            None => write!(f, "{}", self.status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(name: &str, weight: i64, image_fov: Option<i64>, event_fov: Option<i64>) -> Value {
        json!({"uvot_mode": 0x30ed, "filter_num": 1, "min_exposure": 20.0, "filter_pos": 2,
               "filter_seqid": 3, "image_fov": image_fov, "event_fov": event_fov,
               "weight": weight, "special": "", "comment": "", "filter_name": name})
    }

    #[test]
    fn test_hex_mode_accepted() {
        let mut mode = UvotMode::default();
        let mut fields = mode.fields();
        fields.insert("uvot_mode".into(), json!("0x30ed"));
        assert_eq!(GET.validate(&fields).unwrap()["uvot_mode"], json!(12525));

        mode.uvot_mode = None;
        assert_eq!(GET.validate(&mode.fields()).unwrap_err().fields, vec!["uvot_mode"]);
    }

    #[test]
    fn test_entries_and_fractions() {
        let mut mode = UvotMode::new(0x30ed);
        mode.absorb(
            serde_json::from_value(json!({
                "uvot_mode": "0x30ed",
                "entries": [entry("uvw1", 3, Some(17), None), entry("white", 1, None, Some(8))]
            }))
            .unwrap(),
        );
        assert_eq!(mode.filters(), vec!["uvw1", "white"]);
        assert_eq!(mode.exposure_fractions(), vec![("uvw1", 0.75), ("white", 0.25)]);
        assert_eq!(mode.entries[1].field_of_view(), Some(8));
        assert!(mode.entries[1].eventmode());
        assert_eq!(mode.to_string(), "UVOT mode 0x30ed: uvw1, white");
    }
}
