/// Unified error handling module
use std::fmt;
use thiserror::Error;

/// A request failed local schema validation.
///
/// `fields` names the offending field(s); it is empty when the failure is
/// not attributable to a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub fields: Vec<String>,
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            fields: Vec::new(),
            message: message.into(),
        }
    }

    pub fn field(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            fields: vec![name.into()],
            message: message.into(),
        }
    }

    pub fn fields<I, S>(names: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: names.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.fields.join(", "), self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised by mission time arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    #[error("time base has already been set")]
    TimeBaseAlreadySet,
    #[error("cannot subtract mismatched time bases with no UTCF")]
    MismatchedTimeBase,
    #[error("time is out of range")]
    OutOfRange,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("HTTP {status} from {url}: {detail}")]
    Http {
        status: u16,
        url: String,
        detail: String,
    },
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Time error: {0}")]
    Time(#[from] TimeError),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// HTTP status code carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
