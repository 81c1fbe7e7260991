//! Date/time tagged with a time base (UTC or spacecraft clock) and an optional
//! UTCF offset bridging the two.

use crate::errors::TimeError;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBase {
    Utc,
    Spacecraft,
}

/// Mission elapsed time epoch, 2001-01-01 00:00:00.
pub fn met_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2001, 1, 1)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN)
}

fn seconds(s: f64) -> Option<Duration> {
    if !s.is_finite() {
        return None;
    }
    Some(Duration::microseconds((s * 1e6).round() as i64))
}

fn shift(t: NaiveDateTime, s: f64) -> Option<NaiveDateTime> {
    t.checked_add_signed(seconds(s)?)
}

/// Projections into the other base are computed from `value` and `utcf` on
/// every call, so setting the offset can never leave a stale projection.
#[derive(Debug, Clone, Copy)]
pub struct MissionTime {
    value: NaiveDateTime,
    base: Option<TimeBase>,
    utcf: Option<f64>,
}

impl MissionTime {
    /// A value whose time base has not been fixed yet. Until it is, the value
    /// is read as spacecraft time.
    pub fn new(value: NaiveDateTime) -> Self {
        Self {
            value,
            base: None,
            utcf: None,
        }
    }

    pub fn with_base(value: NaiveDateTime, base: TimeBase) -> Self {
        Self {
            value,
            base: Some(base),
            utcf: None,
        }
    }

    /// Build from mission elapsed seconds. When `base` is UTC and the offset
    /// is known, the stored value is shifted into UTC.
    pub fn from_met(met: f64, utcf: Option<f64>, base: TimeBase) -> Result<Self, TimeError> {
        let mut value = shift(met_epoch(), met).ok_or(TimeError::OutOfRange)?;
        if let (TimeBase::Utc, Some(offset)) = (base, utcf) {
            value = shift(value, offset).ok_or(TimeError::OutOfRange)?;
        }
        Ok(Self {
            value,
            base: Some(base),
            utcf,
        })
    }

    pub fn value(&self) -> NaiveDateTime {
        self.value
    }

    pub fn time_base(&self) -> TimeBase {
        self.base.unwrap_or(TimeBase::Spacecraft)
    }

    pub fn is_utc(&self) -> bool {
        self.time_base() == TimeBase::Utc
    }

    pub fn set_time_base(&mut self, base: TimeBase) -> Result<(), TimeError> {
        if self.base.is_some() {
            return Err(TimeError::TimeBaseAlreadySet);
        }
        self.base = Some(base);
        Ok(())
    }

    pub fn utcf(&self) -> Option<f64> {
        self.utcf
    }

    pub fn set_utcf(&mut self, utcf: Option<f64>) {
        self.utcf = utcf;
    }

    pub fn with_utcf(mut self, utcf: f64) -> Self {
        self.utcf = Some(utcf);
        self
    }

    pub fn spacecraft_time(&self) -> Option<NaiveDateTime> {
        match self.time_base() {
            TimeBase::Spacecraft => Some(self.value),
            TimeBase::Utc => self.utcf.and_then(|u| shift(self.value, -u)),
        }
    }

    pub fn utc_time(&self) -> Option<NaiveDateTime> {
        match self.time_base() {
            TimeBase::Utc => Some(self.value),
            TimeBase::Spacecraft => self.utcf.and_then(|u| shift(self.value, u)),
        }
    }

    /// Mission elapsed time in seconds. `None` without a spacecraft
    /// projection.
    pub fn met(&self) -> Option<f64> {
        let elapsed = self.spacecraft_time()? - met_epoch();
        let micros = elapsed.num_microseconds()?;
        Some(micros as f64 / 1e6)
    }

    /// Shift by `rhs`, keeping the time base. The offset is not carried over.
    pub fn checked_add_signed(&self, rhs: Duration) -> Option<MissionTime> {
        Some(MissionTime {
            value: self.value.checked_add_signed(rhs)?,
            base: self.base,
            utcf: None,
        })
    }

    pub fn checked_sub_signed(&self, rhs: Duration) -> Option<MissionTime> {
        Some(MissionTime {
            value: self.value.checked_sub_signed(rhs)?,
            base: self.base,
            utcf: None,
        })
    }

    /// Difference `self - other`. Values in different bases are compared
    /// through their UTC projections, which both must have.
    pub fn checked_sub(&self, other: &MissionTime) -> Result<Duration, TimeError> {
        if self.time_base() == other.time_base() {
            return Ok(self.value - other.value);
        }
        match (self.utc_time(), other.utc_time()) {
            (Some(a), Some(b)) => Ok(a - b),
            _ => Err(TimeError::MismatchedTimeBase),
        }
    }
}

impl PartialEq for MissionTime {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for MissionTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.time_base() == other.time_base() {
            return self.value.partial_cmp(&other.value);
        }
        match (self.utc_time(), other.utc_time()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        }
    }
}

impl fmt::Display for MissionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.time_base() {
            TimeBase::Utc => "UTC",
            TimeBase::Spacecraft => "Swift",
        };
        write!(f, "{} ({})", super::time::format_datetime(&self.value), tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_time_base_set_once() {
        let mut t = MissionTime::new(dt("2024-01-01 00:00:00"));
        assert!(t.set_time_base(TimeBase::Utc).is_ok());
        assert_eq!(
            t.set_time_base(TimeBase::Spacecraft),
            Err(TimeError::TimeBaseAlreadySet)
        );
        assert!(t.is_utc());
    }

    #[test]
    fn test_projection_needs_utcf() {
        let mut t = MissionTime::with_base(dt("2024-01-01 00:00:00"), TimeBase::Spacecraft);
        assert_eq!(t.utc_time(), None);
        t.set_utcf(Some(-30.0));
        assert_eq!(t.utc_time(), Some(dt("2023-12-31 23:59:30")));
        t.set_utcf(Some(10.0));
        assert_eq!(t.utc_time(), Some(dt("2024-01-01 00:00:10")));
    }

    #[test]
    fn test_from_met() {
        let t = MissionTime::from_met(86_400.0, None, TimeBase::Spacecraft).unwrap();
        assert_eq!(t.value(), dt("2001-01-02 00:00:00"));
        assert_eq!(t.met(), Some(86_400.0));

        let u = MissionTime::from_met(86_400.0, Some(5.0), TimeBase::Utc).unwrap();
        assert_eq!(u.value(), dt("2001-01-02 00:00:05"));
        assert_eq!(u.met(), Some(86_400.0));
    }

    #[test]
    fn test_out_of_range_values_do_not_panic() {
        assert_eq!(
            MissionTime::from_met(1e18, None, TimeBase::Spacecraft).unwrap_err(),
            TimeError::OutOfRange
        );
        assert!(MissionTime::from_met(86_400.0, Some(f64::NAN), TimeBase::Utc).is_err());

        let t = MissionTime::with_base(dt("2024-01-01 00:00:00"), TimeBase::Spacecraft);
        assert_eq!(t.with_utcf(1e18).utc_time(), None);
        assert_eq!(t.with_utcf(1e18).met(), Some(725_760_000.0));
        assert!(t.checked_add_signed(Duration::days(365 * 300_000)).is_none());
        assert!(t.checked_sub_signed(Duration::days(365 * 300_000)).is_none());

        let u = MissionTime::with_base(dt("2024-01-01 00:00:00"), TimeBase::Utc).with_utcf(1e14);
        assert_eq!(u.spacecraft_time(), None);
        assert_eq!(u.met(), None);
    }

    #[test]
    fn test_met_absent_for_utc_without_offset() {
        let t = MissionTime::with_base(dt("2024-01-01 00:00:00"), TimeBase::Utc);
        assert_eq!(t.met(), None);
    }

    #[test]
    fn test_sub_mismatched_bases() {
        let a = MissionTime::with_base(dt("2024-01-01 00:00:10"), TimeBase::Utc);
        let b = MissionTime::with_base(dt("2024-01-01 00:00:00"), TimeBase::Spacecraft);
        assert_eq!(a.checked_sub(&b), Err(TimeError::MismatchedTimeBase));

        let b = b.with_utcf(5.0);
        assert_eq!(a.checked_sub(&b), Ok(Duration::seconds(5)));
    }

    #[test]
    fn test_sub_same_base() {
        let a = MissionTime::with_base(dt("2024-01-01 00:01:00"), TimeBase::Utc);
        let b = MissionTime::with_base(dt("2024-01-01 00:00:00"), TimeBase::Utc);
        assert_eq!(a.checked_sub(&b), Ok(Duration::minutes(1)));
    }

    #[test]
    fn test_add_keeps_base_drops_offset() {
        let t = MissionTime::with_base(dt("2024-01-01 00:00:00"), TimeBase::Utc).with_utcf(3.0);
        let later = t.checked_add_signed(Duration::hours(1)).unwrap();
        assert!(later.is_utc());
        assert_eq!(later.utcf(), None);
        assert_eq!(later.value(), dt("2024-01-01 01:00:00"));
        let mut later = later;
        assert!(later.set_time_base(TimeBase::Spacecraft).is_err());
    }

    #[test]
    fn test_ordering_across_bases() {
        let utc = MissionTime::with_base(dt("2024-01-01 00:00:10"), TimeBase::Utc);
        let sc = MissionTime::with_base(dt("2024-01-01 00:00:00"), TimeBase::Spacecraft);
        assert_eq!(utc.partial_cmp(&sc), None);
        let sc = sc.with_utcf(20.0);
        assert!(utc < sc);
    }
}
