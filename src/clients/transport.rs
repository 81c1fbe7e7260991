/// HTTP transport seam and the reqwest implementation behind it
use crate::errors::{ApiError, ApiResult};
use crate::schema::Verb;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const USER_AGENT: &str = concat!("swift-too-rust/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(Vec<MultipartPart>),
}

/// One uploaded file of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    pub name: String,
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// A fully prepared API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Verb,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub auth: Option<(String, String)>,
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub url: String,
    pub body: String,
}

impl ApiResponse {
    pub fn json(&self) -> ApiResult<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// The server's `detail` message, or the raw body when there is none.
    pub fn detail(&self) -> String {
        match serde_json::from_str::<Value>(&self.body) {
            Ok(Value::Object(obj)) => match obj.get("detail") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => self.body.clone(),
            },
            _ => self.body.clone(),
        }
    }

    pub(crate) fn into_http_error(self) -> ApiError {
        let detail = self.detail();
        ApiError::Http {
            status: self.status,
            url: self.url,
            detail,
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> ApiResult<ApiResponse>;

    /// Stream `url` into `dest`, returning the number of bytes written.
    async fn download(&self, url: &str, dest: &Path) -> ApiResult<u64>;
}

/// HTTP client wrapper with common configuration
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> ApiResult<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }

    pub fn get_client(&self) -> &Client {
        &self.client
    }
}

fn method(verb: Verb) -> Method {
    match verb {
        Verb::Get => Method::GET,
        Verb::Put => Method::PUT,
        Verb::Post => Method::POST,
        Verb::Delete => Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        let mut builder = self
            .client
            .request(method(request.method), &request.url)
            .query(&request.query);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some((user, key)) = &request.auth {
            builder = builder.basic_auth(user, Some(key));
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(parts) => {
                let mut form = Form::new();
                for part in parts {
                    form = form.part(part.name, Part::bytes(part.bytes).file_name(part.filename));
                }
                builder.multipart(form)
            }
        };

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let url = resp.url().to_string();
        let body = resp.text().await?;
        Ok(ApiResponse { status, url, body })
    }

    async fn download(&self, url: &str, dest: &Path) -> ApiResult<u64> {
        let mut resp = self.client.get(url).send().await?.error_for_status()?;
        if let Some(dir) = dest.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        debug!(url, bytes = written, "download complete");
        Ok(written)
    }
}
