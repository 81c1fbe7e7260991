//! Two-line element sets.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

pub const TLE_LINE_LENGTH: usize = 69;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TleLines")]
pub struct TleEntry {
    pub tle1: String,
    pub tle2: String,
}

#[derive(Deserialize)]
struct TleLines {
    tle1: String,
    tle2: String,
}

impl TryFrom<TleLines> for TleEntry {
    type Error = String;

    fn try_from(lines: TleLines) -> Result<Self, Self::Error> {
        TleEntry::new(lines.tle1, lines.tle2)
    }
}

impl TleEntry {
    pub fn new(tle1: impl Into<String>, tle2: impl Into<String>) -> Result<Self, String> {
        let entry = Self {
            tle1: tle1.into(),
            tle2: tle2.into(),
        };
        entry.check()?;
        Ok(entry)
    }

    pub fn check(&self) -> Result<(), String> {
        for (name, line) in [("tle1", &self.tle1), ("tle2", &self.tle2)] {
            if line.len() != TLE_LINE_LENGTH {
                return Err(format!(
                    "{} must be {} characters, got {}",
                    name,
                    TLE_LINE_LENGTH,
                    line.len()
                ));
            }
        }
        if self.epoch().is_none() {
            return Err("tle1 does not carry a valid epoch".into());
        }
        Ok(())
    }

    /// Epoch from the fourth field of line 1 (`YYDDD.DDDDDDDD`).
    pub fn epoch(&self) -> Option<NaiveDateTime> {
        let field = self.tle1.split_whitespace().nth(3)?;
        let year = 2000 + field.get(..2)?.parse::<i32>().ok()?;
        let day_of_year = field.get(2..)?.parse::<f64>().ok()?;
        if !(1.0..367.0).contains(&day_of_year) {
            return None;
        }
        let whole_days = Duration::try_days(day_of_year.trunc() as i64 - 1)?;
        let frac = Duration::microseconds((day_of_year.fract() * 86_400e6).round() as i64);
        NaiveDate::from_ymd_opt(year, 1, 1)?
            .and_time(NaiveTime::MIN)
            .checked_add_signed(whole_days)?
            .checked_add_signed(frac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE1: &str = "1 28485U 04047A   24001.50000000  .00001000  00000-0  50000-4 0  9990";
    const LINE2: &str = "2 28485  20.5560 100.0000 0008000 200.0000 160.0000 15.05000000 10000";

    #[test]
    fn test_epoch_from_line1() {
        let tle = TleEntry::new(LINE1, LINE2).unwrap();
        let epoch = tle.epoch().unwrap();
        assert_eq!(
            epoch,
            NaiveDateTime::parse_from_str("2024-01-01 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
        );
    }

    #[test]
    fn test_line_length_checked() {
        assert!(TleEntry::new("1 short", LINE2).is_err());
    }

    #[test]
    fn test_bad_epoch_is_rejected() {
        let huge = "1 28485U 04047A   24999999999.000 .00001000  00000-0  50000-4 0  9990";
        assert_eq!(huge.len(), TLE_LINE_LENGTH);
        assert!(TleEntry::new(huge, LINE2).is_err());

        let entry = TleEntry {
            tle1: huge.into(),
            tle2: LINE2.into(),
        };
        assert_eq!(entry.epoch(), None);

        let multibyte = TleEntry {
            tle1: "1 28485U 04047A   2é001.50000000".into(),
            tle2: LINE2.into(),
        };
        assert_eq!(multibyte.epoch(), None);
    }
}
