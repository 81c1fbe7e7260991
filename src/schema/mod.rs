/// Declarative request schemas and the validator that applies them
use crate::domain::{daterange, instrument, time, Angle, ObsId};
use crate::errors::ValidationError;
use crate::utils;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Put,
    Post,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Put => "PUT",
            Verb::Post => "POST",
            Verb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a manifest value is coerced before it is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Float,
    Int,
    /// Numbers, numeric strings or unit-tagged quantities; sent as degrees.
    Angle,
    /// Integer mode, also accepted as `0x` hex; sent as an integer.
    Mode,
    /// Integer mode sent as a `0x%04x` string.
    HexMode,
    Bool,
    Str,
    DateTime,
    Date,
    /// Observation id sent in archive form.
    ObsId,
    /// Observation id sent in spacecraft form.
    ObsIdSpacecraft,
    /// Local file path, uploaded as a multipart part.
    File,
    Entries,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constraint {
    Range {
        min: f64,
        max: f64,
        max_inclusive: bool,
    },
    Length {
        min: usize,
        max: usize,
    },
    OneOf(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'static str),
}

impl DefaultValue {
    fn to_value(self) -> Value {
        match self {
            DefaultValue::Bool(b) => Value::Bool(b),
            DefaultValue::Int(i) => Value::from(i),
            DefaultValue::Float(f) => utils::float_value(f),
            DefaultValue::Str(s) => Value::String(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<DefaultValue>,
    pub constraint: Option<Constraint>,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            constraint: None,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
            constraint: None,
        }
    }

    pub const fn default(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    pub const fn constrained(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }
}

pub type CheckFn = fn(&Map<String, Value>) -> Result<(), ValidationError>;

#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// Derive the missing member of begin/end/length before field checks.
    DateRange { required: bool },
    /// Either all or none of the fields are set.
    Together(&'static [&'static str]),
    /// At least one group must be fully set.
    AtLeastOne(&'static [&'static [&'static str]]),
    /// Resource specific check over the coerced fields.
    Check(CheckFn),
}

#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub fields: &'static [FieldSpec],
    pub rules: &'static [Rule],
}

pub const RA: FieldSpec = FieldSpec::optional("ra", FieldKind::Angle).constrained(Constraint::Range {
    min: 0.0,
    max: 360.0,
    max_inclusive: false,
});
pub const DEC: FieldSpec = FieldSpec::optional("dec", FieldKind::Angle).constrained(Constraint::Range {
    min: -90.0,
    max: 90.0,
    max_inclusive: true,
});
pub const RADIUS: FieldSpec = FieldSpec::optional("radius", FieldKind::Angle);
pub const BEGIN: FieldSpec = FieldSpec::optional("begin", FieldKind::DateTime);
pub const END: FieldSpec = FieldSpec::optional("end", FieldKind::DateTime);
pub const USERNAME: FieldSpec = FieldSpec::optional("username", FieldKind::Str);

pub const RA_REQUIRED: FieldSpec = FieldSpec { required: true, ..RA };
pub const DEC_REQUIRED: FieldSpec = FieldSpec { required: true, ..DEC };

impl Schema {
    pub const fn new(fields: &'static [FieldSpec], rules: &'static [Rule]) -> Self {
        Self { fields, rules }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        self.field(name).map(|f| f.kind)
    }

    /// Validate a field manifest. The result holds only declared, non-null
    /// fields in their wire representation.
    pub fn validate(&self, input: &Map<String, Value>) -> Result<Map<String, Value>, ValidationError> {
        let mut work = input.clone();
        for rule in self.rules {
            if let Rule::DateRange { required } = rule {
                daterange::normalize_fields(&mut work, *required)?;
            }
        }

        let mut out = Map::new();
        for spec in self.fields {
            let value = match work.get(spec.name) {
                Some(v) if !v.is_null() => Some(coerce(spec, v)?),
                _ => spec.default.map(DefaultValue::to_value),
            };
            match value {
                Some(v) => {
                    if let Some(c) = &spec.constraint {
                        check_constraint(spec.name, c, &v)?;
                    }
                    out.insert(spec.name.to_string(), v);
                }
                None if spec.required => {
                    return Err(ValidationError::field(spec.name, "field required"));
                }
                None => {}
            }
        }

        for rule in self.rules {
            match rule {
                Rule::DateRange { .. } => {}
                Rule::Together(names) => {
                    let set = names.iter().filter(|n| is_set(&out, n)).count();
                    if set != 0 && set != names.len() {
                        return Err(ValidationError::fields(
                            names.iter().copied(),
                            "should all be set, or all not set",
                        ));
                    }
                }
                Rule::AtLeastOne(groups) => {
                    let any = groups
                        .iter()
                        .any(|group| group.iter().all(|n| is_set(&out, n)));
                    if !any {
                        let mut names: Vec<&str> = Vec::new();
                        for name in groups.iter().flat_map(|g| g.iter().copied()) {
                            if !names.contains(&name) {
                                names.push(name);
                            }
                        }
                        return Err(ValidationError::fields(
                            names,
                            "At least one of the query parameters must be set",
                        ));
                    }
                }
                Rule::Check(check) => check(&out)?,
            }
        }
        Ok(out)
    }
}

/// Present and not `false`.
pub fn is_set(fields: &Map<String, Value>, name: &str) -> bool {
    !matches!(fields.get(name), None | Some(Value::Null) | Some(Value::Bool(false)))
}

fn coerce(spec: &FieldSpec, v: &Value) -> Result<Value, ValidationError> {
    let name = spec.name;
    let fail = |msg: &str| ValidationError::field(name, msg);
    match spec.kind {
        FieldKind::Float => utils::num(v)
            .filter(|x| x.is_finite())
            .map(utils::float_value)
            .ok_or_else(|| fail("must be a number")),
        FieldKind::Int => utils::int(v)
            .map(Value::from)
            .ok_or_else(|| fail("must be an integer")),
        FieldKind::Angle => {
            let angle: Angle = serde_json::from_value(v.clone())
                .map_err(|_| fail("must be an angle"))?;
            angle
                .degrees()
                .map(utils::float_value)
                .map_err(|e| ValidationError::field(name, e))
        }
        FieldKind::Mode => instrument::parse_mode(v)
            .map(Value::from)
            .ok_or_else(|| fail("must be an integer or hex mode")),
        FieldKind::HexMode => instrument::parse_mode(v)
            .map(|m| Value::String(instrument::hex_mode(m)))
            .ok_or_else(|| fail("must be an integer or hex mode")),
        FieldKind::Bool => match v {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            other => match utils::int(other) {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                _ => Err(fail("must be a boolean")),
            },
        },
        FieldKind::Str => match v {
            Value::String(s) => Ok(Value::String(s.clone())),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            _ => Err(fail("must be a string")),
        },
        FieldKind::DateTime => match v {
            Value::String(s) => time::parse_datetime(s)
                .map(|dt| Value::String(time::format_datetime(&dt)))
                .map_err(|e| ValidationError::field(name, e)),
            _ => Err(fail("must be a date/time string")),
        },
        FieldKind::Date => match v {
            Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .or_else(|_| time::parse_datetime(s).map(|dt| dt.date()))
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .map_err(|_| fail("must be a date")),
            _ => Err(fail("must be a date")),
        },
        FieldKind::ObsId => ObsId::from_value(v)
            .map(|id| Value::String(id.archive()))
            .map_err(|e| ValidationError::field(name, e)),
        FieldKind::ObsIdSpacecraft => ObsId::from_value(v)
            .map(|id| Value::from(id.spacecraft()))
            .map_err(|e| ValidationError::field(name, e)),
        FieldKind::File => match v {
            Value::String(path) if Path::new(path).is_file() => Ok(Value::String(path.clone())),
            Value::String(path) => Err(ValidationError::field(
                name,
                format!("file not found: {}", path),
            )),
            _ => Err(fail("must be a file path")),
        },
        FieldKind::Entries => match v {
            Value::Array(_) => Ok(v.clone()),
            _ => Err(fail("must be a list")),
        },
        FieldKind::Json => Ok(v.clone()),
    }
}

fn check_constraint(name: &str, c: &Constraint, v: &Value) -> Result<(), ValidationError> {
    match *c {
        Constraint::Range {
            min,
            max,
            max_inclusive,
        } => {
            let x = utils::num(v).ok_or_else(|| ValidationError::field(name, "must be a number"))?;
            let below_max = if max_inclusive { x <= max } else { x < max };
            if x >= min && below_max {
                Ok(())
            } else {
                let close = if max_inclusive { ']' } else { ')' };
                Err(ValidationError::field(
                    name,
                    format!("{} is outside [{}, {}{}", x, min, max, close),
                ))
            }
        }
        Constraint::Length { min, max } => {
            let len = v.as_str().map(|s| s.chars().count()).unwrap_or(0);
            if (min..=max).contains(&len) {
                Ok(())
            } else {
                Err(ValidationError::field(
                    name,
                    format!("length must be between {} and {}", min, max),
                ))
            }
        }
        Constraint::OneOf(options) => match v.as_str() {
            Some(s) if options.contains(&s) => Ok(()),
            _ => Err(ValidationError::field(
                name,
                format!("must be one of {}", options.join(", ")),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    const POSITION: Schema = Schema::new(
        &[RA, DEC, RADIUS, BEGIN, END],
        &[
            Rule::DateRange { required: false },
            Rule::Together(&["ra", "dec"]),
            Rule::AtLeastOne(&[&["begin"], &["ra", "dec"]]),
        ],
    );

    const VISIBILITY: Schema = Schema::new(
        &[
            RA_REQUIRED,
            DEC_REQUIRED,
            FieldSpec::required("begin", FieldKind::DateTime),
            FieldSpec::required("end", FieldKind::DateTime),
            FieldSpec::optional("hires", FieldKind::Bool).default(DefaultValue::Bool(false)),
        ],
        &[Rule::DateRange { required: true }],
    );

    #[test]
    fn test_visibility_range_and_defaults() {
        let out = VISIBILITY
            .validate(&manifest(json!({
                "ra": 83.63, "dec": 22.01, "begin": "2024-01-01", "length": 1, "end": null
            })))
            .unwrap();
        assert_eq!(out["begin"], json!("2024-01-01 00:00:00"));
        assert_eq!(out["end"], json!("2024-01-02 00:00:00"));
        assert_eq!(out["hires"], json!(false));
        assert!(!out.contains_key("length"));
    }

    #[test]
    fn test_missing_everything_fails() {
        let err = VISIBILITY.validate(&Map::new()).unwrap_err();
        assert_eq!(err.message, "Begin and end required");
    }

    #[test]
    fn test_ra_range_is_half_open() {
        let ok = POSITION.validate(&manifest(json!({"ra": 0.0, "dec": 90.0})));
        assert!(ok.is_ok());
        let err = POSITION
            .validate(&manifest(json!({"ra": 360.0, "dec": 0.0})))
            .unwrap_err();
        assert_eq!(err.fields, vec!["ra"]);
        let err = POSITION
            .validate(&manifest(json!({"ra": 10.0, "dec": -90.5})))
            .unwrap_err();
        assert_eq!(err.fields, vec!["dec"]);
    }

    #[test]
    fn test_angle_quantities_are_converted() {
        let out = POSITION
            .validate(&manifest(json!({
                "ra": {"value": 5.0, "unit": "hourangle"},
                "dec": "-30.5",
                "radius": {"value": 30.0, "unit": "arcminute"}
            })))
            .unwrap();
        assert_eq!(out["ra"], json!(75.0));
        assert_eq!(out["dec"], json!(-30.5));
        assert_eq!(out["radius"], json!(0.5));
    }

    #[test]
    fn test_together_and_at_least_one() {
        let err = POSITION
            .validate(&manifest(json!({"ra": 10.0})))
            .unwrap_err();
        assert_eq!(err.fields, vec!["ra", "dec"]);

        let err = POSITION.validate(&Map::new()).unwrap_err();
        assert_eq!(err.message, "At least one of the query parameters must be set");
        assert_eq!(err.fields, vec!["begin", "ra", "dec"]);
        assert_eq!(
            err.to_string(),
            "begin, ra, dec: At least one of the query parameters must be set"
        );

        assert!(POSITION
            .validate(&manifest(json!({"begin": "2024-01-01"})))
            .is_ok());
    }

    #[test]
    fn test_undeclared_fields_dropped() {
        let out = POSITION
            .validate(&manifest(json!({"ra": 1.0, "dec": 2.0, "secret": "x"})))
            .unwrap();
        assert!(!out.contains_key("secret"));
    }

    #[test]
    fn test_kind_coercions() {
        const KINDS: Schema = Schema::new(
            &[
                FieldSpec::optional("mode", FieldKind::Mode),
                FieldSpec::optional("hex", FieldKind::HexMode),
                FieldSpec::optional("flag", FieldKind::Bool),
                FieldSpec::optional("obsid", FieldKind::ObsId),
                FieldSpec::optional("sc", FieldKind::ObsIdSpacecraft),
                FieldSpec::optional("day", FieldKind::Date),
            ],
            &[],
        );
        let out = KINDS
            .validate(&manifest(json!({
                "mode": "0x9999",
                "hex": 12525,
                "flag": "true",
                "obsid": 12345 + (2 << 24),
                "sc": "00012345002",
                "day": "2024-02-03 10:00:00"
            })))
            .unwrap();
        assert_eq!(out["mode"], json!(0x9999));
        assert_eq!(out["hex"], json!("0x30ed"));
        assert_eq!(out["flag"], json!(true));
        assert_eq!(out["obsid"], json!("00012345002"));
        assert_eq!(out["sc"], json!(12345 + (2 << 24)));
        assert_eq!(out["day"], json!("2024-02-03"));
    }

    #[test]
    fn test_one_of_and_length() {
        const CHOICE: Schema = Schema::new(
            &[
                FieldSpec::optional("instrument", FieldKind::Str)
                    .constrained(Constraint::OneOf(&["XRT", "UVOT", "BAT"])),
                FieldSpec::optional("line", FieldKind::Str)
                    .constrained(Constraint::Length { min: 2, max: 3 }),
            ],
            &[],
        );
        assert!(CHOICE.validate(&manifest(json!({"instrument": "XRT"}))).is_ok());
        assert!(CHOICE.validate(&manifest(json!({"instrument": "HST"}))).is_err());
        assert!(CHOICE.validate(&manifest(json!({"line": "abcd"}))).is_err());
    }

    #[test]
    fn test_file_kind_requires_existing_file() {
        const UPLOAD: Schema =
            Schema::new(&[FieldSpec::required("filename", FieldKind::File)], &[]);
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_string_lossy().to_string();
        assert!(UPLOAD.validate(&manifest(json!({"filename": path}))).is_ok());
        let err = UPLOAD
            .validate(&manifest(json!({"filename": "/no/such/file.txt"})))
            .unwrap_err();
        assert!(err.message.contains("file not found"));
    }
}
