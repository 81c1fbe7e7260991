/// Client configuration module
use crate::errors::{ApiError, ApiResult};
use crate::resources::{Credentials, ANONYMOUS};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const PRODUCTION_URL: &str = "https://e1-swiftweb24.swift.psu.edu/api/v1/";
pub const LOCAL_URL: &str = "http://localhost:8000/api/v1/";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Production,
    Local,
}

impl Environment {
    pub fn api_url(&self) -> &'static str {
        match self {
            Environment::Production => PRODUCTION_URL,
            Environment::Local => LOCAL_URL,
        }
    }
}

impl FromStr for Environment {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "local" | "localhost" => Ok(Environment::Local),
            other => Err(ApiError::Config(format!("unknown environment '{}'", other))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    pub environment: Environment,
    /// Always ends with `/`.
    pub api_url: String,
    /// Used when a resource carries no credentials of its own.
    pub credentials: Credentials,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(Environment::Production)
    }
}

impl ClientConfig {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            api_url: environment.api_url().to_string(),
            credentials: Credentials::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        let mut url = url.into();
        if !url.ends_with('/') {
            url.push('/');
        }
        self.api_url = url;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load configuration from environment variables
    pub fn from_env() -> ApiResult<Self> {
        dotenvy::dotenv().ok();

        let environment = match env::var("SWIFT_TOO_ENV") {
            Ok(s) => s.parse()?,
            Err(_) => Environment::Production,
        };
        let mut config = Self::new(environment);

        if let Ok(url) = env::var("SWIFT_TOO_API_URL") {
            if !url.trim().is_empty() {
                config = config.with_api_url(url.trim());
            }
        }

        let username = env::var("SWIFT_TOO_USERNAME").unwrap_or_else(|_| ANONYMOUS.to_string());
        let api_key = env::var("SWIFT_TOO_API_KEY")
            .or_else(|_| env::var("SWIFT_TOO_SHARED_SECRET"))
            .ok();
        config.credentials = Credentials { username, api_key };

        config.timeout = Duration::from_secs(env_u64(
            "SWIFT_TOO_TIMEOUT_SECONDS",
            DEFAULT_TIMEOUT_SECONDS,
        )?);
        Ok(config)
    }
}

fn env_u64(key: &str, default: u64) -> ApiResult<u64> {
    match env::var(key) {
        Ok(s) => s
            .trim()
            .parse()
            .map_err(|_| ApiError::Config(format!("{} must be a whole number of seconds", key))),
        Err(_) => Ok(default),
    }
}
