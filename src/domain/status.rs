//! Request status envelope attached to every resource.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a request. Once `Rejected`, a submission stays rejected until
/// the envelope is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JobState {
    #[default]
    Accepted,
    Rejected,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Accepted => write!(f, "Accepted"),
            JobState::Rejected => write!(f, "Rejected"),
        }
    }
}

/// Accumulates errors and warnings for a resource. Any error forces the
/// state to `Rejected`; warnings never change it. Both lists are
/// de-duplicated on insert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Status {
    pub status: JobState,
    pub too_id: Option<i64>,
    pub jobnumber: Option<i64>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error to the list of errors
    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.errors.contains(&message) {
            self.errors.push(message);
        }
        self.status = JobState::Rejected;
    }

    /// Add a warning to the list of warnings
    pub fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.warnings.contains(&message) {
            self.warnings.push(message);
        }
    }

    /// Reset to a fresh `Accepted` envelope.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_rejected(&self) -> bool {
        self.status == JobState::Rejected
    }

    pub fn num_errors(&self) -> usize {
        self.errors.len()
    }

    pub fn num_warnings(&self) -> usize {
        self.warnings.len()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.too_id {
            Some(id) => write!(f, "{} TOO_ID={}", self.status, id),
            None => write!(f, "{}", self.status),
        }
    }
}

impl PartialEq<&str> for Status {
    fn eq(&self, other: &&str) -> bool {
        self.status.to_string() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_idempotent_and_rejects() {
        let mut status = Status::new();
        status.error("x");
        status.error("x");
        assert_eq!(status.errors, vec!["x".to_string()]);
        assert_eq!(status, "Rejected");
    }

    #[test]
    fn test_warning_never_changes_status() {
        let mut status = Status::new();
        status.warning("y");
        status.warning("y");
        assert_eq!(status.warnings.len(), 1);
        assert_eq!(status.status, JobState::Accepted);
    }

    #[test]
    fn test_warning_does_not_unreject() {
        let mut status = Status::new();
        status.error("bad");
        status.warning("meh");
        assert!(status.is_rejected());
    }

    #[test]
    fn test_clear_resets() {
        let mut status = Status::new();
        status.too_id = Some(12);
        status.error("bad");
        status.warning("meh");
        status.clear();
        assert_eq!(status, Status::default());
    }

    #[test]
    fn test_display() {
        let mut status = Status::new();
        assert_eq!(status.to_string(), "Accepted");
        status.too_id = Some(19345);
        assert_eq!(status.to_string(), "Accepted TOO_ID=19345");
    }

    #[test]
    fn test_deserialize_partial() {
        let status: Status =
            serde_json::from_value(serde_json::json!({"status": "Rejected", "errors": ["nope"]}))
                .unwrap();
        assert!(status.is_rejected());
        assert_eq!(status.num_errors(), 1);
        assert_eq!(status.num_warnings(), 0);
    }

    #[test]
    fn test_instances_do_not_share_lists() {
        let mut a = Status::new();
        let b = Status::new();
        a.error("only a");
        assert!(b.errors.is_empty());
    }
}
