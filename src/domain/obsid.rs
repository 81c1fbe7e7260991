//! Observation identifiers: target id plus segment, in the two encodings the
//! service uses.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

const TARGET_MASK: i64 = 0xFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObsId {
    pub target_id: u32,
    pub segment: u32,
}

impl ObsId {
    pub fn new(target_id: u32, segment: u32) -> Self {
        Self { target_id, segment }
    }

    /// Spacecraft encoding: `target_id + (segment << 24)`.
    pub fn spacecraft(&self) -> i64 {
        self.target_id as i64 + ((self.segment as i64) << 24)
    }

    pub fn from_spacecraft(value: i64) -> Result<Self, String> {
        if value < 0 {
            return Err(format!("invalid observation id {}", value));
        }
        Ok(Self {
            target_id: (value & TARGET_MASK) as u32,
            segment: (value >> 24) as u32,
        })
    }

    /// Archive encoding: 8 digit target id followed by 3 digit segment.
    pub fn archive(&self) -> String {
        format!("{:08}{:03}", self.target_id, self.segment)
    }

    /// Integers are spacecraft encoded; 11 digit strings are archive encoded.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(s) => s.parse(),
            other => crate::utils::int(other)
                .ok_or_else(|| format!("invalid observation id {}", other))
                .and_then(Self::from_spacecraft),
        }
    }
}

impl FromStr for ObsId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("invalid observation id '{}'", s));
        }
        if s.len() == 11 {
            let target_id = s[..8].parse::<u32>().map_err(|e| e.to_string())?;
            let segment = s[8..].parse::<u32>().map_err(|e| e.to_string())?;
            return Ok(Self { target_id, segment });
        }
        s.parse::<i64>()
            .map_err(|e| e.to_string())
            .and_then(Self::from_spacecraft)
    }
}

impl fmt::Display for ObsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.archive())
    }
}

/// Serde adapter for an optional observation id in either encoding.
pub fn deserialize_optional<'de, D: Deserializer<'de>>(d: D) -> Result<Option<ObsId>, D::Error> {
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(None),
        Some(v) => ObsId::from_value(&v)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
