//! Many-point command uploads: a command file is posted and the server
//! reports the pass it was queued for and the commands it contained.

use super::{absorb_fields, envelope_accessors, Credentials, Resource};
use crate::domain::instrument::{deserialize_hex_mode, deserialize_xrt_mode};
use crate::domain::obsid::deserialize_optional;
use crate::domain::time::option_api_datetime;
use crate::domain::{ObsId, Status};
use crate::schema::{FieldKind, FieldSpec, Schema, Verb, USERNAME};
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

static POST: Schema = Schema::new(
    &[USERNAME, FieldSpec::required("filename", FieldKind::File)],
    &[],
);

/// Commands that close a sequence rather than start an observation.
const CLOSING_COMMANDS: [&str; 2] = ["ABORTAT", "END"];

/// Where an uploaded command stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Done(NaiveDateTime),
    Pending,
    Failed,
    /// Closing commands have nothing to execute.
    NotApplicable,
}

impl fmt::Display for CommandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandState::Done(at) => write!(f, "{}", at),
            CommandState::Pending => f.write_str("Pending"),
            CommandState::Failed => f.write_str("Failed"),
            CommandState::NotApplicable => Ok(()),
        }
    }
}

/// The server writes the Unix epoch for "never happened".
fn happened(at: Option<NaiveDateTime>) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?.and_hms_opt(0, 0, 0)?;
    at.filter(|t| *t != epoch)
}

fn state_at(
    happened_at: Option<NaiveDateTime>,
    scheduled: Option<NaiveDateTime>,
    closing: bool,
    now: NaiveDateTime,
) -> CommandState {
    if let Some(at) = happened(happened_at) {
        return CommandState::Done(at);
    }
    match scheduled {
        Some(t) if t < now && closing => CommandState::NotApplicable,
        Some(t) if t < now => CommandState::Failed,
        _ => CommandState::Pending,
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManyPointCommand {
    #[serde(default, with = "option_api_datetime")]
    pub begin: Option<NaiveDateTime>,
    #[serde(default, with = "option_api_datetime")]
    pub end: Option<NaiveDateTime>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional")]
    pub obsid: Option<ObsId>,
    #[serde(default)]
    pub grbmet: Option<f64>,
    #[serde(default)]
    pub merit: Option<f64>,
    #[serde(default)]
    pub ra: Option<f64>,
    #[serde(default)]
    pub dec: Option<f64>,
    #[serde(default)]
    pub roll: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_xrt_mode")]
    pub xrt_mode: Option<String>,
    #[serde(default, deserialize_with = "deserialize_hex_mode")]
    pub uvot_mode: Option<String>,
    #[serde(default, deserialize_with = "deserialize_hex_mode")]
    pub bat_mode: Option<String>,
    #[serde(default, with = "option_api_datetime")]
    pub executed: Option<NaiveDateTime>,
    #[serde(default)]
    pub source_name: Option<String>,
}

impl ManyPointCommand {
    pub fn is_too(&self) -> bool {
        self.command.as_deref() == Some("TOO")
    }

    fn is_closing(&self) -> bool {
        self.command
            .as_deref()
            .map(|c| CLOSING_COMMANDS.contains(&c))
            .unwrap_or(false)
    }

    pub fn execution_state_at(&self, now: NaiveDateTime) -> CommandState {
        state_at(self.executed, self.begin, self.is_closing(), now)
    }

    pub fn execution_state(&self) -> CommandState {
        self.execution_state_at(Utc::now().naive_utc())
    }

    /// Time on target, only defined for TOO pointings.
    pub fn exposure(&self) -> Option<Duration> {
        if !self.is_too() {
            return None;
        }
        Some(self.end? - self.begin?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ManyPoint {
    pub filename: Option<PathBuf>,
    pub year: Option<i32>,
    pub day: Option<i32>,
    pub passtime: Option<NaiveDateTime>,
    pub uplink: Option<NaiveDateTime>,
    pub number: Option<i64>,
    pub transferred: Option<bool>,
    pub entries: Vec<ManyPointCommand>,
    pub status: Status,
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize)]
pub struct ManyPointResponse {
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub day: Option<i32>,
    #[serde(default, with = "option_api_datetime")]
    pub passtime: Option<NaiveDateTime>,
    #[serde(default, with = "option_api_datetime")]
    pub uplink: Option<NaiveDateTime>,
    #[serde(default)]
    pub number: Option<i64>,
    #[serde(default)]
    pub transferred: Option<bool>,
    #[serde(default)]
    pub entries: Option<Vec<ManyPointCommand>>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl ManyPoint {
    pub fn new(filename: impl Into<PathBuf>, credentials: Credentials) -> Self {
        Self {
            filename: Some(filename.into()),
            credentials,
            ..Self::default()
        }
    }

    pub fn uplink_state_at(&self, now: NaiveDateTime) -> CommandState {
        state_at(self.uplink, self.passtime, false, now)
    }

    pub fn uplink_state(&self) -> CommandState {
        self.uplink_state_at(Utc::now().naive_utc())
    }

    /// TOO pointing time per observation id, in upload order.
    pub fn exposure(&self) -> Vec<(ObsId, Duration)> {
        self.entries
            .iter()
            .filter_map(|c| Some((c.obsid?, c.exposure()?)))
            .collect()
    }

    /// A TOO pointing lasts until the next command starts.
    fn close_pointings(&mut self) {
        for i in 0..self.entries.len().saturating_sub(1) {
            if self.entries[i].is_too() {
                self.entries[i].end = self.entries[i + 1].begin;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Resource for ManyPoint {
    type Response = ManyPointResponse;

    fn api_name(&self) -> &'static str {
        "ManyPoint"
    }

    fn schema(&self, verb: Verb) -> Option<&'static Schema> {
        match verb {
            Verb::Post => Some(&POST),
            _ => None,
        }
    }

    fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("username".into(), Value::String(self.credentials.username.clone()));
        fields.insert(
            "filename".into(),
            self.filename
                .as_ref()
                .map(|p| Value::String(p.to_string_lossy().into_owned()))
                .unwrap_or(Value::Null),
        );
        fields
    }

    fn absorb(&mut self, response: ManyPointResponse) {
        absorb_fields!(self, response; year, day, passtime, uplink, number, transferred);
        if let Some(entries) = response.entries {
            self.entries = entries;
            self.close_pointings();
        }
        if let Some(status) = response.status {
            self.status = status;
        }
    }

    envelope_accessors!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn uploaded() -> ManyPoint {
        let mut mp = ManyPoint::default();
        mp.absorb(
            serde_json::from_value(json!({
                "year": 2024, "day": 100,
                "passtime": "2024-04-09 10:00:00",
                "uplink": "1970-01-01 00:00:00",
                "entries": [
                    {"begin": "2024-04-09 12:00:00", "command": "TOO", "obsid": 16777216 + 1000,
                     "executed": "2024-04-09 12:00:05"},
                    {"begin": "2024-04-09 12:30:00", "command": "TOO", "obsid": 1001,
                     "executed": "1970-01-01 00:00:00"},
                    {"begin": "2024-04-09 13:00:00", "command": "END"}
                ]
            }))
            .unwrap(),
        );
        mp
    }

    #[test]
    fn test_pointings_end_at_next_command() {
        let mp = uploaded();
        assert_eq!(mp.entries[0].end, Some(dt("2024-04-09 12:30:00")));
        assert_eq!(mp.entries[2].end, None);
        assert_eq!(
            mp.exposure(),
            vec![
                (ObsId::new(1000, 1), Duration::minutes(30)),
                (ObsId::new(1001, 0), Duration::minutes(30)),
            ]
        );
    }

    #[test]
    fn test_execution_and_uplink_states() {
        let mp = uploaded();
        let later = dt("2024-04-10 00:00:00");
        let earlier = dt("2024-04-09 00:00:00");
        assert_eq!(
            mp.entries[0].execution_state_at(later),
            CommandState::Done(dt("2024-04-09 12:00:05"))
        );
        assert_eq!(mp.entries[1].execution_state_at(later), CommandState::Failed);
        assert_eq!(mp.entries[1].execution_state_at(earlier), CommandState::Pending);
        assert_eq!(mp.entries[2].execution_state_at(later), CommandState::NotApplicable);
        assert_eq!(mp.uplink_state_at(later), CommandState::Failed);
        assert_eq!(mp.uplink_state_at(earlier), CommandState::Pending);
    }

    #[test]
    fn test_filename_must_exist() {
        let mp = ManyPoint::new("/no/such/commands.txt", Credentials::new("jamie", "s3cret"));
        assert!(POST.validate(&mp.fields()).is_err());

        let file = tempfile::NamedTempFile::new().unwrap();
        let mp = ManyPoint::new(file.path(), Credentials::new("jamie", "s3cret"));
        let params = POST.validate(&mp.fields()).unwrap();
        assert_eq!(params["username"], json!("jamie"));
    }
}
