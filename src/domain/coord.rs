//! Sky coordinate inputs and their normalisation to plain degrees.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Default search radius when a position is given without one (XRT field of view).
pub const DEFAULT_RADIUS_DEG: f64 = 11.8 / 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
    Degree,
    Arcminute,
    Arcsecond,
    Radian,
    #[serde(rename = "hourangle")]
    HourAngle,
}

impl AngleUnit {
    pub fn to_degrees(self, value: f64) -> f64 {
        match self {
            AngleUnit::Degree => value,
            AngleUnit::Arcminute => value / 60.0,
            AngleUnit::Arcsecond => value / 3600.0,
            AngleUnit::Radian => value * 180.0 / PI,
            AngleUnit::HourAngle => value * 15.0,
        }
    }
}

/// An angle as supplied by a caller. Resources keep the raw input and only
/// convert it when a request is validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Angle {
    Degrees(f64),
    Quantity { value: f64, unit: AngleUnit },
    Text(String),
}

impl Angle {
    pub fn quantity(value: f64, unit: AngleUnit) -> Self {
        Angle::Quantity { value, unit }
    }

    /// Value in decimal degrees. Text must be a plain number.
    pub fn degrees(&self) -> Result<f64, String> {
        let deg = match self {
            Angle::Degrees(d) => *d,
            Angle::Quantity { value, unit } => unit.to_degrees(*value),
            Angle::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("could not convert '{}' to degrees", s))?,
        };
        if deg.is_finite() {
            Ok(deg)
        } else {
            Err("coordinate must be finite".to_string())
        }
    }
}

impl From<f64> for Angle {
    fn from(v: f64) -> Self {
        Angle::Degrees(v)
    }
}

impl From<i32> for Angle {
    fn from(v: i32) -> Self {
        Angle::Degrees(v as f64)
    }
}

impl From<&str> for Angle {
    fn from(s: &str) -> Self {
        Angle::Text(s.to_string())
    }
}

impl From<String> for Angle {
    fn from(s: String) -> Self {
        Angle::Text(s)
    }
}

/// Search position shared by the query resources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkyPosition {
    pub ra: Option<Angle>,
    pub dec: Option<Angle>,
    pub radius: Option<Angle>,
}

impl SkyPosition {
    pub fn new(ra: impl Into<Angle>, dec: impl Into<Angle>) -> Self {
        Self {
            ra: Some(ra.into()),
            dec: Some(dec.into()),
            radius: None,
        }
    }

    pub fn with_radius(mut self, radius: impl Into<Angle>) -> Self {
        self.radius = Some(radius.into());
        self
    }

    pub fn is_set(&self) -> bool {
        self.ra.is_some() && self.dec.is_some()
    }

    /// Radius to send. Falls back to the default once both coordinates are set.
    pub fn effective_radius(&self) -> Option<Angle> {
        match &self.radius {
            Some(r) => Some(r.clone()),
            None if self.is_set() => Some(Angle::Degrees(DEFAULT_RADIUS_DEG)),
            None => None,
        }
    }

    pub fn set(&mut self, ra: f64, dec: f64) {
        self.ra = Some(Angle::Degrees(ra));
        self.dec = Some(Angle::Degrees(dec));
    }

    /// Manifest entries for `ra`, `dec` and `radius`.
    pub fn write_fields(&self, fields: &mut serde_json::Map<String, serde_json::Value>) {
        fields.insert("ra".into(), angle_value(self.ra.as_ref()));
        fields.insert("dec".into(), angle_value(self.dec.as_ref()));
        fields.insert("radius".into(), angle_value(self.effective_radius().as_ref()));
    }
}

pub(crate) fn angle_value(angle: Option<&Angle>) -> serde_json::Value {
    angle
        .and_then(|a| serde_json::to_value(a).ok())
        .unwrap_or(serde_json::Value::Null)
}
