//! TOO requests: submit, fetch, update and withdraw.

use super::{absorb_fields, envelope_accessors, opt, Credentials, Resource};
use crate::domain::instrument::{
    deserialize_hex_mode, deserialize_mode_code, deserialize_xrt_mode, hex_mode,
    UVOT_FILTER_OF_THE_DAY,
};
use crate::domain::time::option_api_datetime;
use crate::domain::Status;
use crate::errors::ValidationError;
use crate::schema::{
    is_set, Constraint, DefaultValue, FieldKind, FieldSpec, Rule, Schema, Verb, DEC, DEC_REQUIRED,
    RA, RA_REQUIRED, USERNAME,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const OBS_TYPES: &[&str] = &["Spectroscopy", "Light Curve", "Position", "Timing"];
pub const INSTRUMENTS: &[&str] = &["XRT", "UVOT", "BAT"];

const ID: FieldSpec = FieldSpec::required("id", FieldKind::Int);

static GET: Schema = Schema::new(&[ID], &[]);

static DELETE: Schema = Schema::new(
    &[
        ID,
        FieldSpec::required("username", FieldKind::Str),
        FieldSpec::required("api_key", FieldKind::Str),
    ],
    &[],
);

static PUT: Schema = Schema::new(
    &[
        ID,
        USERNAME,
        FieldSpec::optional("source_name", FieldKind::Str),
        FieldSpec::optional("source_type", FieldKind::Str),
        RA,
        DEC,
        FieldSpec::optional("poserr", FieldKind::Float),
        FieldSpec::optional("instrument", FieldKind::Str),
        FieldSpec::optional("obs_type", FieldKind::Str),
        FieldSpec::optional("urgency", FieldKind::Int).constrained(Constraint::Range {
            min: 0.0,
            max: 5.0,
            max_inclusive: true,
        }),
        FieldSpec::optional("opt_mag", FieldKind::Json),
        FieldSpec::optional("opt_filt", FieldKind::Str),
        FieldSpec::optional("xrt_countrate", FieldKind::Str),
        FieldSpec::optional("bat_countrate", FieldKind::Str),
        FieldSpec::optional("other_brightness", FieldKind::Str),
        FieldSpec::optional("grb_detector", FieldKind::Str),
        FieldSpec::optional("grb_target_time", FieldKind::DateTime),
        FieldSpec::optional("redshift_val", FieldKind::Float),
        FieldSpec::optional("redshift_status", FieldKind::Str),
        FieldSpec::optional("uvot_mode", FieldKind::HexMode),
        FieldSpec::optional("uvot_just", FieldKind::Str),
        FieldSpec::optional("science_just", FieldKind::Str),
        FieldSpec::optional("immediate_objective", FieldKind::Str),
        FieldSpec::optional("exposure", FieldKind::Float),
        FieldSpec::optional("exp_time_just", FieldKind::Str),
        FieldSpec::optional("exp_time_per_visit", FieldKind::Float),
        FieldSpec::optional("num_of_visits", FieldKind::Int),
        FieldSpec::optional("monitoring_freq", FieldKind::Str),
        FieldSpec::optional("proposal", FieldKind::Bool),
        FieldSpec::optional("proposal_id", FieldKind::Int),
        FieldSpec::optional("proposal_pi", FieldKind::Str),
        FieldSpec::optional("proposal_trigger_just", FieldKind::Str),
        FieldSpec::optional("xrt_mode", FieldKind::Mode),
        FieldSpec::optional("slewinplace", FieldKind::Int),
        FieldSpec::optional("tiling", FieldKind::Bool),
        FieldSpec::optional("number_of_tiles", FieldKind::Json),
        FieldSpec::optional("exposure_time_per_tile", FieldKind::Float),
        FieldSpec::optional("tiling_justification", FieldKind::Str),
        FieldSpec::optional("debug", FieldKind::Bool),
    ],
    &[],
);

static POST: Schema = Schema::new(
    &[
        FieldSpec::required("source_name", FieldKind::Str),
        FieldSpec::required("source_type", FieldKind::Str),
        RA_REQUIRED,
        DEC_REQUIRED,
        FieldSpec::optional("instrument", FieldKind::Str)
            .default(DefaultValue::Str("XRT"))
            .constrained(Constraint::OneOf(INSTRUMENTS)),
        FieldSpec::required("obs_type", FieldKind::Str).constrained(Constraint::OneOf(OBS_TYPES)),
        FieldSpec::optional("urgency", FieldKind::Int)
            .default(DefaultValue::Int(3))
            .constrained(Constraint::Range {
                min: 0.0,
                max: 4.0,
                max_inclusive: true,
            }),
        FieldSpec::optional("opt_mag", FieldKind::Json),
        FieldSpec::optional("opt_filt", FieldKind::Str),
        FieldSpec::optional("xrt_countrate", FieldKind::Str),
        FieldSpec::optional("bat_countrate", FieldKind::Str),
        FieldSpec::optional("other_brightness", FieldKind::Str),
        FieldSpec::optional("grb_detector", FieldKind::Str),
        FieldSpec::optional("grb_target_time", FieldKind::DateTime),
        FieldSpec::optional("redshift_val", FieldKind::Float),
        FieldSpec::optional("redshift_status", FieldKind::Str),
        FieldSpec::optional("uvot_mode", FieldKind::HexMode).default(DefaultValue::Str("0x9999")),
        FieldSpec::required("science_just", FieldKind::Str),
        FieldSpec::required("immediate_objective", FieldKind::Str),
        FieldSpec::required("exposure", FieldKind::Float),
        FieldSpec::optional("proposal", FieldKind::Bool).default(DefaultValue::Bool(false)),
        FieldSpec::optional("proposal_id", FieldKind::Int),
        FieldSpec::optional("proposal_trigger_just", FieldKind::Str),
        FieldSpec::optional("proposal_pi", FieldKind::Str),
        FieldSpec::optional("poserr", FieldKind::Float),
        FieldSpec::optional("uvot_just", FieldKind::Str),
        FieldSpec::optional("exp_time_just", FieldKind::Str),
        FieldSpec::optional("exp_time_per_visit", FieldKind::Float),
        FieldSpec::optional("num_of_visits", FieldKind::Int),
        FieldSpec::optional("monitoring_freq", FieldKind::Str),
        FieldSpec::optional("xrt_mode", FieldKind::Mode).default(DefaultValue::Int(7)),
        FieldSpec::optional("tiling", FieldKind::Bool).default(DefaultValue::Bool(false)),
        FieldSpec::optional("number_of_tiles", FieldKind::Json),
        FieldSpec::optional("exposure_time_per_tile", FieldKind::Float),
        FieldSpec::optional("tiling_justification", FieldKind::Str),
        FieldSpec::optional("debug", FieldKind::Bool).default(DefaultValue::Bool(false)),
    ],
    &[
        Rule::Check(check_brightness),
        Rule::Check(check_grb),
        Rule::Check(check_proposal),
        Rule::Check(check_uvot_justification),
        Rule::Check(check_monitoring),
        Rule::Check(check_tiling),
    ],
);

fn check_brightness(f: &Map<String, Value>) -> Result<(), ValidationError> {
    let optical = is_set(f, "opt_mag") && is_set(f, "opt_filt");
    if optical || ["xrt_countrate", "bat_countrate", "other_brightness"].iter().any(|n| is_set(f, n)) {
        return Ok(());
    }
    Err(ValidationError::fields(
        ["opt_mag", "opt_filt", "xrt_countrate", "bat_countrate", "other_brightness"],
        "Must specify at least one brightness value. If specifying optical brightness, ensure filter is set.",
    ))
}

fn check_grb(f: &Map<String, Value>) -> Result<(), ValidationError> {
    let is_grb = f.get("source_type").and_then(Value::as_str) == Some("GRB");
    if is_grb && !(is_set(f, "grb_target_time") && is_set(f, "grb_detector")) {
        return Err(ValidationError::fields(
            ["grb_target_time", "grb_detector"],
            "Must specify GRB trigger time and detector if source type is GRB.",
        ));
    }
    Ok(())
}

fn check_proposal(f: &Map<String, Value>) -> Result<(), ValidationError> {
    if !is_set(f, "proposal") {
        return Ok(());
    }
    if !(is_set(f, "proposal_id") && is_set(f, "proposal_pi")) {
        return Err(ValidationError::fields(
            ["proposal_id", "proposal_pi"],
            "Must specify proposal ID and PI if GI proposal.",
        ));
    }
    if !is_set(f, "proposal_trigger_just") {
        return Err(ValidationError::field(
            "proposal_trigger_just",
            "Must specify proposal trigger justification if proposal is True.",
        ));
    }
    Ok(())
}

fn check_uvot_justification(f: &Map<String, Value>) -> Result<(), ValidationError> {
    let filter_of_the_day = hex_mode(UVOT_FILTER_OF_THE_DAY);
    let mode = f.get("uvot_mode").and_then(Value::as_str).unwrap_or_default();
    if !is_set(f, "uvot_just") && !mode.contains(&filter_of_the_day) {
        return Err(ValidationError::field(
            "uvot_just",
            "Must specify UVOT justification if UVOT mode is not filter of the day (0x9999).",
        ));
    }
    Ok(())
}

fn check_monitoring(f: &Map<String, Value>) -> Result<(), ValidationError> {
    if !is_set(f, "exp_time_just") {
        return Err(ValidationError::field(
            "exp_time_just",
            "Must specify exposure time justification if exposure time per visit is specified.",
        ));
    }
    if is_set(f, "num_of_visits") && !is_set(f, "exp_time_per_visit") {
        return Err(ValidationError::field(
            "exp_time_per_visit",
            "Must specify exposure time per visit if number of visits is specified.",
        ));
    }
    let visits = f.get("num_of_visits").and_then(Value::as_i64).unwrap_or(0);
    if visits > 1 && !is_set(f, "monitoring_freq") {
        return Err(ValidationError::field(
            "monitoring_freq",
            "Must specify monitoring frequency if number of visits is greater than 1.",
        ));
    }
    Ok(())
}

fn check_tiling(f: &Map<String, Value>) -> Result<(), ValidationError> {
    if is_set(f, "tiling") && !is_set(f, "tiling_justification") {
        return Err(ValidationError::field(
            "tiling_justification",
            "Must specify tiling justification if tiling is True.",
        ));
    }
    Ok(())
}

/// Every field of a TOO request as submitted and as reported back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TooFields {
    pub id: Option<i64>,
    pub too_id: Option<i64>,
    pub username: Option<String>,
    #[serde(with = "option_api_datetime")]
    pub timestamp: Option<NaiveDateTime>,
    pub source_name: Option<String>,
    pub source_type: Option<String>,
    pub ra: Option<f64>,
    pub dec: Option<f64>,
    /// arcminutes, 90% confidence
    pub poserr: Option<f64>,
    pub instrument: Option<String>,
    pub obs_type: Option<String>,
    pub urgency: Option<i64>,
    pub opt_mag: Option<Value>,
    pub opt_filt: Option<String>,
    pub xrt_countrate: Option<String>,
    pub bat_countrate: Option<String>,
    pub other_brightness: Option<String>,
    pub grb_detector: Option<String>,
    #[serde(with = "option_api_datetime")]
    pub grb_target_time: Option<NaiveDateTime>,
    pub redshift_val: Option<f64>,
    pub redshift_status: Option<String>,
    #[serde(deserialize_with = "deserialize_hex_mode")]
    pub uvot_mode: Option<String>,
    pub uvot_just: Option<String>,
    pub science_just: Option<String>,
    pub immediate_objective: Option<String>,
    pub exposure: Option<f64>,
    pub exp_time_just: Option<String>,
    pub exp_time_per_visit: Option<f64>,
    pub num_of_visits: Option<i64>,
    pub monitoring_freq: Option<String>,
    pub proposal: Option<bool>,
    pub proposal_id: Option<i64>,
    pub proposal_pi: Option<String>,
    pub proposal_trigger_just: Option<String>,
    #[serde(deserialize_with = "deserialize_mode_code")]
    pub xrt_mode: Option<i64>,
    pub slewinplace: Option<i64>,
    pub tiling: Option<bool>,
    #[serde(alias = "tiling_type")]
    pub number_of_tiles: Option<Value>,
    pub exposure_time_per_tile: Option<f64>,
    pub tiling_justification: Option<String>,
    pub debug: Option<bool>,
    // Assigned by the observatory.
    pub decision: Option<String>,
    #[serde(with = "option_api_datetime")]
    pub decision_date: Option<NaiveDateTime>,
    pub done: Option<i64>,
    pub target_id: Option<i64>,
    pub date_begin: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
    #[serde(deserialize_with = "deserialize_xrt_mode")]
    pub xrt_mode_approved: Option<String>,
    #[serde(deserialize_with = "deserialize_hex_mode")]
    pub uvot_mode_approved: Option<String>,
    #[serde(deserialize_with = "deserialize_hex_mode")]
    pub bat_mode_approved: Option<String>,
    pub exp_time_per_visit_approved: Option<f64>,
    pub num_of_visits_approved: Option<i64>,
    pub total_exp_time_approved: Option<f64>,
    pub monitoring_freq_approved: Option<String>,
    pub tiling_approved: Option<bool>,
    pub fot_comment: Option<String>,
    pub obs_comment: Option<String>,
}

impl TooFields {
    /// Server id of this request under either of its names.
    pub fn identifier(&self) -> Option<i64> {
        self.id.or(self.too_id)
    }

    pub fn set_uvot_mode(&mut self, mode: i64) {
        self.uvot_mode = Some(hex_mode(mode));
    }

    /// Take every field `other` carries, keep the rest.
    pub fn merge(&mut self, other: TooFields) {
        absorb_fields!(self, other;
            id, too_id, username, timestamp, source_name, source_type, ra, dec, poserr,
            instrument, obs_type, urgency, opt_mag, opt_filt, xrt_countrate, bat_countrate,
            other_brightness, grb_detector, grb_target_time, redshift_val, redshift_status,
            uvot_mode, uvot_just, science_just, immediate_objective, exposure, exp_time_just,
            exp_time_per_visit, num_of_visits, monitoring_freq, proposal, proposal_id,
            proposal_pi, proposal_trigger_just, xrt_mode, slewinplace, tiling, number_of_tiles,
            exposure_time_per_tile, tiling_justification, debug, decision, decision_date, done,
            target_id, date_begin, date_end, xrt_mode_approved, uvot_mode_approved,
            bat_mode_approved, exp_time_per_visit_approved, num_of_visits_approved,
            total_exp_time_approved, monitoring_freq_approved, tiling_approved, fot_comment,
            obs_comment,
        );
    }
}

impl fmt::Display for TooFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TOO {}: {} ({})",
            self.identifier().map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
            self.source_name.as_deref().unwrap_or("unnamed"),
            self.decision.as_deref().unwrap_or("undecided")
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct Too {
    pub request: TooFields,
    pub status: Status,
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize)]
pub struct TooResponse {
    #[serde(flatten)]
    pub fields: TooFields,
    #[serde(default)]
    pub status: Option<Status>,
}

impl Too {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            ..Self::default()
        }
    }

    /// An existing request, to be fetched, updated or withdrawn.
    pub fn by_id(id: i64, credentials: Credentials) -> Self {
        let mut too = Self::new(credentials);
        too.request.id = Some(id);
        too
    }
}

impl Resource for Too {
    type Response = TooResponse;

    fn api_name(&self) -> &'static str {
        "TOO"
    }

    fn schema(&self, verb: Verb) -> Option<&'static Schema> {
        Some(match verb {
            Verb::Get => &GET,
            Verb::Put => &PUT,
            Verb::Post => &POST,
            Verb::Delete => &DELETE,
        })
    }

    fn fields(&self) -> Map<String, Value> {
        let mut fields = match serde_json::to_value(&self.request) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        fields.insert("id".into(), opt(self.request.identifier()));
        fields.insert("username".into(), Value::String(self.credentials.username.clone()));
        fields.insert("api_key".into(), opt(self.credentials.api_key.clone()));
        fields
    }

    fn absorb(&mut self, response: TooResponse) {
        self.request.merge(response.fields);
        if let Some(status) = response.status {
            self.status = status;
        }
        if let Some(id) = self.status.too_id {
            self.request.too_id.get_or_insert(id);
        }
    }

    envelope_accessors!();

    fn identifier(&self) -> Option<i64> {
        self.request.identifier()
    }
}
