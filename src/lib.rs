//! Typed client for the Swift TOO and scheduling API.
pub mod clients;
pub mod config;
pub mod domain;
pub mod errors;
pub mod resources;
pub mod schema;
pub mod services;
pub mod utils;

pub use clients::{ApiClient, HttpClient, Transport};
pub use config::{ClientConfig, Environment};
pub use errors::{ApiError, ApiResult, ValidationError};
pub use resources::{Credentials, Resource};
