/// Remote resources and the contract the client drives them through
use crate::domain::Status;
use crate::schema::{Schema, Verb};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub mod calendar;
pub mod data;
pub mod guano;
pub mod manypoint;
pub mod mission;
pub mod obsquery;
pub mod planquery;
pub mod resolve;
pub mod saa;
pub mod tle;
pub mod too;
pub mod toorequests;
pub mod uvot;
pub mod visquery;

pub use calendar::{Calendar, CalendarEntry};
pub use data::{Data, DataFile};
pub use guano::{Guano, GuanoEntry};
pub use manypoint::{ManyPoint, ManyPointCommand};
pub use mission::MissionConfig;
pub use obsquery::{AfstEntry, ObsQuery, Observation};
pub use planquery::{PlanEntry, PlanQuery};
pub use resolve::Resolve;
pub use saa::{Saa, SaaEntry};
pub use tle::Tle;
pub use too::{Too, TooFields};
pub use toorequests::TooRequests;
pub use uvot::{UvotMode, UvotModeEntry};
pub use visquery::{VisQuery, VisWindow};

pub const ANONYMOUS: &str = "anonymous";

/// API identity. Basic auth is only attached for a named user with a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub api_key: Option<String>,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            username: ANONYMOUS.to_string(),
            api_key: None,
        }
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            api_key: Some(api_key.into()),
        }
    }

    /// Older releases called the API key a shared secret.
    pub fn with_shared_secret(username: impl Into<String>, shared_secret: impl Into<String>) -> Self {
        Self::new(username, shared_secret)
    }

    pub fn is_anonymous(&self) -> bool {
        self.username == ANONYMOUS
    }

    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        match &self.api_key {
            Some(key) if !self.is_anonymous() && !self.username.is_empty() => {
                Some((self.username.as_str(), key.as_str()))
            }
            _ => None,
        }
    }
}

/// A typed object mapped onto one API endpoint.
///
/// `fields` is the explicit manifest of every request-side value; the verb
/// schema decides which of them are sent. `absorb` receives a response that
/// has already been decoded in full and assigns the fields it carries.
pub trait Resource: Send {
    type Response: DeserializeOwned + Send;

    fn api_name(&self) -> &'static str;

    fn mission(&self) -> &'static str {
        "Swift"
    }

    /// Schema for `verb`, or `None` when the verb is not supported.
    fn schema(&self, verb: Verb) -> Option<&'static Schema>;

    fn fields(&self) -> Map<String, Value>;

    fn absorb(&mut self, response: Self::Response);

    fn status(&self) -> &Status;

    fn status_mut(&mut self) -> &mut Status;

    fn credentials(&self) -> &Credentials;

    /// Path segment identifying a single existing record.
    fn identifier(&self) -> Option<i64> {
        None
    }

    /// JSON body for PUT/POST when the resource carries entries to upload.
    fn entries_payload(&self) -> Option<Value> {
        None
    }

    /// Name to resolve into a position before querying.
    fn target_name(&self) -> Option<&str> {
        None
    }

    fn has_position(&self) -> bool {
        true
    }

    fn set_position(&mut self, _ra: f64, _dec: f64) {}
}

/// Assign every `Some` field of a decoded response onto the resource.
macro_rules! absorb_fields {
    ($target:expr, $source:expr; $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $source.$field {
                $target.$field = Some(value);
            }
        )+
    };
}

/// `status`, `status_mut` and `credentials` for resources that keep them in
/// fields of the same names.
macro_rules! envelope_accessors {
    () => {
        fn status(&self) -> &$crate::domain::Status {
            &self.status
        }

        fn status_mut(&mut self) -> &mut $crate::domain::Status {
            &mut self.status
        }

        fn credentials(&self) -> &$crate::resources::Credentials {
            &self.credentials
        }
    };
}

pub(crate) use absorb_fields;
pub(crate) use envelope_accessors;

/// Manifest entry for an optional value.
pub(crate) fn opt<T: Into<Value>>(v: Option<T>) -> Value {
    v.map(Into::into).unwrap_or(Value::Null)
}
