/// API client: drives a resource through validate, dispatch and copy-back
pub mod download;
pub mod transport;

pub use transport::{ApiRequest, ApiResponse, HttpClient, MultipartPart, RequestBody, Transport};

use crate::config::ClientConfig;
use crate::errors::ApiResult;
use crate::resources::Resource;
use crate::schema::{FieldKind, Schema, Verb};
use crate::utils::{int, query_pairs};
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::{debug, info, warn};

pub struct ApiClient<T: Transport = HttpClient> {
    transport: T,
    config: ClientConfig,
}

impl ApiClient<HttpClient> {
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        Ok(Self {
            transport: HttpClient::new()?,
            config,
        })
    }

    pub fn from_env() -> ApiResult<Self> {
        Self::new(ClientConfig::from_env()?)
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch information. Server rejections are recorded on the resource.
    pub async fn get<R: Resource>(&self, resource: &mut R) -> ApiResult<bool> {
        self.submit(Verb::Get, resource).await
    }

    /// Replace an existing record.
    pub async fn put<R: Resource>(&self, resource: &mut R) -> ApiResult<bool> {
        self.submit(Verb::Put, resource).await
    }

    /// Create a record or upload a file.
    pub async fn post<R: Resource>(&self, resource: &mut R) -> ApiResult<bool> {
        self.submit(Verb::Post, resource).await
    }

    pub async fn delete<R: Resource>(&self, resource: &mut R) -> ApiResult<bool> {
        self.submit(Verb::Delete, resource).await
    }

    /// `{api_url}{mission}/{resource}[/{id}]`, lower-cased path.
    pub fn endpoint<R: Resource>(&self, resource: &R, id: Option<i64>) -> String {
        let mut url = format!(
            "{}{}/{}",
            self.config.api_url,
            resource.mission().to_lowercase(),
            resource.api_name().to_lowercase()
        );
        if let Some(id) = id {
            url.push_str(&format!("/{}", id));
        }
        url
    }

    async fn submit<R: Resource>(&self, verb: Verb, resource: &mut R) -> ApiResult<bool> {
        let Some(schema) = resource.schema(verb) else {
            let message = format!("{} not allowed for {}.", verb, resource.api_name());
            warn!("{}", message);
            resource.status_mut().warning(message);
            return Ok(false);
        };

        let mut params = match schema.validate(&resource.fields()) {
            Ok(params) => params,
            Err(e) => {
                warn!(resource = resource.api_name(), %verb, "validation failed: {}", e);
                let status = resource.status_mut();
                status.clear();
                status.error(e.message);
                return Ok(false);
            }
        };

        let request = self.prepare(verb, resource, schema, &mut params).await?;
        debug!(%verb, url = %request.url, params = request.query.len(), "dispatching");
        let response = self.transport.send(request).await?;
        info!(%verb, status = response.status, url = %response.url, "{} {}", response.status, response.url);

        self.interpret(verb, resource, response)
    }

    async fn prepare<R: Resource>(
        &self,
        verb: Verb,
        resource: &R,
        schema: &Schema,
        params: &mut Map<String, Value>,
    ) -> ApiResult<ApiRequest> {
        let id = params
            .remove("id")
            .as_ref()
            .and_then(int)
            .or_else(|| resource.identifier());
        let url = self.endpoint(resource, id);

        params.remove("entries");
        let mut files = Vec::new();
        if verb == Verb::Post {
            let names: Vec<String> = params
                .keys()
                .filter(|k| schema.kind_of(k) == Some(FieldKind::File))
                .cloned()
                .collect();
            for name in names {
                if let Some(Value::String(path)) = params.remove(&name) {
                    files.push(file_part(name, Path::new(&path)).await?);
                }
            }
        }

        let body = match verb {
            Verb::Get | Verb::Delete => RequestBody::Empty,
            Verb::Post if !files.is_empty() => RequestBody::Multipart(files),
            Verb::Put | Verb::Post => {
                RequestBody::Json(resource.entries_payload().unwrap_or_else(|| json!({})))
            }
        };

        let auth = resource
            .credentials()
            .basic_auth()
            .or_else(|| self.config.credentials.basic_auth())
            .map(|(user, key)| (user.to_string(), key.to_string()));

        Ok(ApiRequest {
            method: verb,
            url,
            query: query_pairs(params),
            body,
            auth,
            timeout: Some(self.config.timeout),
        })
    }

    fn interpret<R: Resource>(
        &self,
        verb: Verb,
        resource: &mut R,
        response: ApiResponse,
    ) -> ApiResult<bool> {
        let ok_status = match verb {
            Verb::Get | Verb::Delete => 200,
            Verb::Put | Verb::Post => 201,
        };

        if response.status == ok_status {
            return match serde_json::from_str::<R::Response>(&response.body) {
                Ok(decoded) => {
                    resource.absorb(decoded);
                    Ok(true)
                }
                Err(e) if verb == Verb::Get => {
                    warn!(url = %response.url, "undecodable response: {}", e);
                    resource
                        .status_mut()
                        .error(format!("Could not decode response: {}", e));
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            };
        }

        match (verb, response.status) {
            (Verb::Get, 404) | (Verb::Post, 200) => {
                let detail = response.detail();
                warn!(url = %response.url, "{}", detail);
                resource.status_mut().warning(detail);
                Ok(false)
            }
            (Verb::Get, _) => {
                let detail = response.detail();
                warn!(status = response.status, url = %response.url, "{}", detail);
                resource.status_mut().error(detail);
                Ok(false)
            }
            _ => Err(response.into_http_error()),
        }
    }
}

async fn file_part(name: String, path: &Path) -> ApiResult<MultipartPart> {
    let bytes = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.clone());
    Ok(MultipartPart {
        name,
        filename,
        bytes,
    })
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use crate::errors::ApiError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Records every request and replays scripted responses in order.
    #[derive(Default)]
    pub struct MockTransport {
        pub requests: Mutex<Vec<ApiRequest>>,
        responses: Mutex<VecDeque<ApiResponse>>,
        pub downloads: Mutex<Vec<String>>,
        pub failing_urls: Vec<String>,
    }

    impl MockTransport {
        pub fn replying(responses: Vec<(u16, Value)>) -> Self {
            let responses = responses
                .into_iter()
                .map(|(status, body)| ApiResponse {
                    status,
                    url: "http://localhost:8000/api/v1/".into(),
                    body: body.to_string(),
                })
                .collect();
            Self {
                responses: Mutex::new(responses),
                ..Self::default()
            }
        }

        pub fn failing(urls: &[&str]) -> Self {
            Self {
                failing_urls: urls.iter().map(|u| u.to_string()).collect(),
                ..Self::default()
            }
        }

        pub fn sent(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
            let mut response = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted response left");
            response.url = request.url.clone();
            self.requests.lock().unwrap().push(request);
            Ok(response)
        }

        async fn download(&self, url: &str, dest: &Path) -> ApiResult<u64> {
            self.downloads.lock().unwrap().push(url.to_string());
            if self.failing_urls.iter().any(|u| url.ends_with(u.as_str())) {
                return Err(ApiError::Http {
                    status: 404,
                    url: url.to_string(),
                    detail: "missing".into(),
                });
            }
            if let Some(dir) = dest.parent() {
                tokio::fs::create_dir_all(dir).await?;
            }
            tokio::fs::write(dest, url.as_bytes()).await?;
            Ok(url.len() as u64)
        }
    }

    pub fn client(transport: MockTransport) -> ApiClient<MockTransport> {
        ApiClient::with_transport(
            ClientConfig::new(crate::config::Environment::Local),
            transport,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{client, MockTransport};
    use super::*;
    use crate::domain::{DateRange, SkyPosition, Status};
    use crate::errors::ApiError;
    use crate::schema::FieldSpec;
    use crate::resources::{Credentials, ManyPoint, Resolve, Too, TooFields, VisQuery};

    fn window(begin: &str, end: &str) -> Value {
        json!({"begin": begin, "end": end, "initial": "Earth", "final": "Sun"})
    }

    #[tokio::test]
    async fn test_visibility_query_round_trip() {
        let api = client(MockTransport::replying(vec![(
            200,
            json!({
                "entries": [
                    window("2024-01-01 00:00:00", "2024-01-01 00:40:00"),
                    window("2024-01-01 01:30:00", "2024-01-01 02:10:00")
                ],
                "status": {"status": "Accepted", "errors": [], "warnings": []}
            }),
        )]));
        let mut query = VisQuery::new(
            SkyPosition::new(83.63, 22.01),
            DateRange::starting("2024-01-01", 1.0),
        );

        assert!(api.get(&mut query).await.unwrap());
        assert_eq!(query.len(), 2);
        assert!(query.status == "Accepted");

        let sent = api.transport().sent();
        assert_eq!(sent[0].url, "http://localhost:8000/api/v1/swift/visquery");
        assert_eq!(sent[0].query_value("ra"), Some("83.63"));
        assert_eq!(sent[0].query_value("end"), Some("2024-01-02 00:00:00"));
        assert_eq!(sent[0].body, RequestBody::Empty);
        assert_eq!(sent[0].auth, None);
    }

    #[tokio::test]
    async fn test_invalid_query_never_reaches_network() {
        let api = client(MockTransport::default());
        let mut query = VisQuery::default();
        query.status.warning("left over from a previous call");

        assert!(!api.get(&mut query).await.unwrap());
        assert!(query.status == "Rejected");
        assert_eq!(query.status.num_errors(), 1);
        assert_eq!(query.status.num_warnings(), 0);
        assert!(api.transport().sent().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_range_is_rejected_locally() {
        let api = client(MockTransport::default());
        let mut query = VisQuery::new(
            SkyPosition::new(83.63, 22.01),
            DateRange::starting("2024-01-01", 1e15),
        );

        assert!(!api.get(&mut query).await.unwrap());
        assert!(query.status.is_rejected());
        assert!(api.transport().sent().is_empty());
    }

    #[tokio::test]
    async fn test_not_found_is_a_warning() {
        let api = client(MockTransport::replying(vec![(
            404,
            json!({"detail": "not found"}),
        )]));
        let mut resolve = Resolve::new("Nowhere-1");
        resolve.ra = Some(10.0);

        assert!(!api.get(&mut resolve).await.unwrap());
        assert!(resolve.status.warnings.iter().any(|w| w.contains("not found")));
        assert!(resolve.status == "Accepted");
        assert_eq!(resolve.ra, Some(10.0));
    }

    #[tokio::test]
    async fn test_server_rejection_on_get_is_recorded() {
        let api = client(MockTransport::replying(vec![(
            500,
            json!({"detail": "database unavailable"}),
        )]));
        let mut resolve = Resolve::new("Crab");

        assert!(!api.get(&mut resolve).await.unwrap());
        assert_eq!(resolve.status.errors, vec!["database unavailable".to_string()]);
        assert!(resolve.status.is_rejected());
    }

    #[tokio::test]
    async fn test_undecodable_get_body_is_an_error() {
        let api = client(MockTransport::replying(vec![(
            200,
            json!({"entries": [{"begin": "yesterday"}]}),
        )]));
        let mut query = VisQuery::new(
            SkyPosition::new(83.63, 22.01),
            DateRange::starting("2024-01-01", 1.0),
        );
        assert!(!api.get(&mut query).await.unwrap());
        assert!(query.status.is_rejected());
        assert!(query.is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_verbs_are_refused() {
        let api = client(MockTransport::default());
        let mut resolve = Resolve::new("Crab");

        assert!(!api.put(&mut resolve).await.unwrap());
        assert!(!api.delete(&mut resolve).await.unwrap());
        assert_eq!(
            resolve.status.warnings,
            vec![
                "PUT not allowed for Resolve.".to_string(),
                "DELETE not allowed for Resolve.".to_string()
            ]
        );
        assert!(resolve.status == "Accepted");
        assert!(api.transport().sent().is_empty());
    }

    #[tokio::test]
    async fn test_file_upload_is_multipart() {
        let file = tempfile::Builder::new()
            .suffix(".txt")
            .tempfile()
            .unwrap();
        std::fs::write(file.path(), b"TOO 2024-100-12:00:00 00001000001").unwrap();
        let api = client(MockTransport::replying(vec![(
            201,
            json!({"year": 2024, "day": 100, "number": 1, "entries": []}),
        )]));
        let mut upload = ManyPoint::new(file.path(), Credentials::new("jamie", "s3cret"));

        assert!(api.post(&mut upload).await.unwrap());
        assert_eq!(upload.year, Some(2024));

        let sent = api.transport().sent();
        let request = &sent[0];
        assert_eq!(request.url, "http://localhost:8000/api/v1/swift/manypoint");
        assert_eq!(request.query_value("username"), Some("jamie"));
        assert_eq!(request.query_value("filename"), None);
        assert_eq!(request.auth, Some(("jamie".into(), "s3cret".into())));
        match &request.body {
            RequestBody::Multipart(parts) => {
                assert_eq!(parts.len(), 1);
                assert_eq!(parts[0].name, "filename");
                assert!(parts[0].filename.ends_with(".txt"));
                assert_eq!(parts[0].bytes, b"TOO 2024-100-12:00:00 00001000001");
            }
            other => panic!("expected multipart body, got {:?}", other),
        }
    }

    static BATCH_PUT: Schema = Schema::new(
        &[FieldSpec::required("entries", FieldKind::Entries)],
        &[],
    );
    static BATCH_POST: Schema = Schema::new(
        &[
            FieldSpec::optional("entries", FieldKind::Entries),
            FieldSpec::optional("filename", FieldKind::File),
        ],
        &[],
    );

    #[derive(serde::Deserialize)]
    struct BatchResponse {
        #[serde(default)]
        count: Option<u32>,
    }

    /// Uploads a list of records, either inline or as a file.
    #[derive(Default)]
    struct Batch {
        entries: Vec<Value>,
        filename: Option<String>,
        count: Option<u32>,
        status: Status,
        credentials: Credentials,
    }

    impl Resource for Batch {
        type Response = BatchResponse;

        fn api_name(&self) -> &'static str {
            "Batch"
        }

        fn schema(&self, verb: Verb) -> Option<&'static Schema> {
            match verb {
                Verb::Put => Some(&BATCH_PUT),
                Verb::Post => Some(&BATCH_POST),
                _ => None,
            }
        }

        fn fields(&self) -> Map<String, Value> {
            let mut fields = Map::new();
            let entries = match self.entries.is_empty() {
                true => Value::Null,
                false => Value::Array(self.entries.clone()),
            };
            fields.insert("entries".into(), entries);
            fields.insert(
                "filename".into(),
                self.filename.clone().map(Value::String).unwrap_or(Value::Null),
            );
            fields
        }

        fn absorb(&mut self, response: BatchResponse) {
            self.count = response.count;
        }

        fn entries_payload(&self) -> Option<Value> {
            if self.entries.is_empty() {
                return None;
            }
            Some(json!({ "entries": self.entries }))
        }

        crate::resources::envelope_accessors!();
    }

    #[tokio::test]
    async fn test_entries_travel_in_the_json_body() {
        let api = client(MockTransport::replying(vec![
            (201, json!({"count": 2})),
            (201, json!({"count": 2})),
        ]));
        let mut batch = Batch {
            entries: vec![json!({"obsid": "00012345001"}), json!({"obsid": "00012345002"})],
            ..Batch::default()
        };

        assert!(api.put(&mut batch).await.unwrap());
        assert_eq!(batch.count, Some(2));
        assert!(api.post(&mut batch).await.unwrap());

        let sent = api.transport().sent();
        let expected = RequestBody::Json(json!({
            "entries": [{"obsid": "00012345001"}, {"obsid": "00012345002"}]
        }));
        for request in &sent {
            assert_eq!(request.body, expected);
            assert_eq!(request.query_value("entries"), None);
        }
        assert_eq!(sent[0].method, Verb::Put);
        assert_eq!(sent[1].method, Verb::Post);
    }

    #[tokio::test]
    async fn test_file_takes_precedence_over_entries() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"obsid\n00012345001\n").unwrap();
        let api = client(MockTransport::replying(vec![(201, json!({"count": 1}))]));
        let mut batch = Batch {
            entries: vec![json!({"obsid": "00012345001"})],
            filename: Some(file.path().to_string_lossy().into_owned()),
            ..Batch::default()
        };

        assert!(api.post(&mut batch).await.unwrap());
        let sent = api.transport().sent();
        assert_eq!(sent[0].query_value("entries"), None);
        assert_eq!(sent[0].query_value("filename"), None);
        match &sent[0].body {
            RequestBody::Multipart(parts) => {
                assert_eq!(parts.len(), 1);
                assert_eq!(parts[0].name, "filename");
            }
            other => panic!("expected multipart body, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_entries_are_rejected_before_sending() {
        let api = client(MockTransport::default());
        let mut batch = Batch::default();
        assert!(!api.put(&mut batch).await.unwrap());
        assert!(batch.status.is_rejected());
        assert!(api.transport().sent().is_empty());
    }

    #[tokio::test]
    async fn test_post_200_is_a_warning() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let api = client(MockTransport::replying(vec![(
            200,
            json!({"detail": "Commands already queued for this pass"}),
        )]));
        let mut upload = ManyPoint::new(file.path(), Credentials::new("jamie", "s3cret"));
        assert!(!api.post(&mut upload).await.unwrap());
        assert_eq!(upload.status.num_warnings(), 1);
        assert!(!upload.status.is_rejected());
    }

    #[tokio::test]
    async fn test_too_lifecycle() {
        let accepted = json!({
            "too_id": 19000,
            "source_name": "SN 2024abc",
            "status": {"status": "Accepted", "too_id": 19000, "errors": [], "warnings": []}
        });
        let api = client(MockTransport::replying(vec![
            (201, accepted.clone()),
            (200, accepted),
            (400, json!({"detail": "TOO already approved"})),
        ]));
        let creds = Credentials::new("jamie", "s3cret");
        let mut too = Too::new(creds.clone());
        too.request = TooFields {
            source_name: Some("SN 2024abc".into()),
            source_type: Some("Supernova".into()),
            ra: Some(150.1),
            dec: Some(-20.5),
            obs_type: Some("Light Curve".into()),
            xrt_countrate: Some("0.3".into()),
            science_just: Some("Early UV light curve.".into()),
            immediate_objective: Some("Catch the shock cooling.".into()),
            exposure: Some(2000.0),
            exp_time_just: Some("Need 2 ks for 5 sigma.".into()),
            ..TooFields::default()
        };

        assert!(api.post(&mut too).await.unwrap());
        assert_eq!(too.identifier(), Some(19000));
        assert_eq!(too.status.too_id, Some(19000));

        let mut fetched = Too::by_id(19000, creds.clone());
        assert!(api.get(&mut fetched).await.unwrap());
        assert_eq!(fetched.request.source_name.as_deref(), Some("SN 2024abc"));

        let mut withdrawn = Too::by_id(19000, creds);
        match api.delete(&mut withdrawn).await {
            Err(ApiError::Http { status, detail, .. }) => {
                assert_eq!(status, 400);
                assert_eq!(detail, "TOO already approved");
            }
            other => panic!("expected HTTP error, got {:?}", other),
        }

        let sent = api.transport().sent();
        assert_eq!(sent[0].url, "http://localhost:8000/api/v1/swift/too");
        assert_eq!(sent[0].query_value("urgency"), Some("3"));
        assert_eq!(sent[0].query_value("api_key"), None);
        assert_eq!(sent[0].body, RequestBody::Json(json!({})));
        assert_eq!(sent[1].url, "http://localhost:8000/api/v1/swift/too/19000");
        assert_eq!(sent[1].query_value("id"), None);
        assert_eq!(sent[2].method, Verb::Delete);
        assert_eq!(sent[2].url, "http://localhost:8000/api/v1/swift/too/19000");
        assert_eq!(sent[2].query_value("username"), Some("jamie"));
    }

    #[tokio::test]
    async fn test_put_requires_201() {
        let api = client(MockTransport::replying(vec![(
            200,
            json!({"detail": "unexpected"}),
        )]));
        let mut too = Too::by_id(19000, Credentials::new("jamie", "s3cret"));
        too.request.exposure = Some(3000.0);
        let err = api.put(&mut too).await.unwrap_err();
        assert_eq!(err.status(), Some(200));
    }

    #[tokio::test]
    async fn test_config_credentials_are_the_fallback() {
        let transport = MockTransport::replying(vec![(
            200,
            json!({"ra": 83.63, "dec": 22.01, "resolver": "Simbad"}),
        )]);
        let config = ClientConfig::new(crate::config::Environment::Local)
            .with_credentials(Credentials::new("robin", "k3y"));
        let api = ApiClient::with_transport(config, transport);
        let mut resolve = Resolve::new("Crab");

        assert!(api.get(&mut resolve).await.unwrap());
        assert_eq!(resolve.position(), Some((83.63, 22.01)));
        assert_eq!(
            api.transport().sent()[0].auth,
            Some(("robin".into(), "k3y".into()))
        );
    }

    #[test]
    fn test_endpoint_includes_identifier() {
        let api = client(MockTransport::default());
        let too = Too::by_id(42, Credentials::default());
        assert_eq!(
            api.endpoint(&too, too.identifier()),
            "http://localhost:8000/api/v1/swift/too/42"
        );
    }
}
