//! HTTP implementation of [`ExecutionBackend`].

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use url::{Host, Url};

use blockrun_types::{
    BackendEnvelope, BlockRunEnvelope, DatasetCatalog, DatasetsEnvelope, RunEnvelope, RunList, RunQuery, RunSpec,
    RunSummary,
};
use blockrun_util::redact_json;

use crate::error::BackendError;
use crate::{ExecutionBackend, RunStream};

/// Characters left unescaped in a path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Connection settings for [`BackendClient`].
#[derive(Debug, Clone)]
pub struct BackendClientConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Applied to every call except `stream_run`, whose output may run arbitrarily long.
    pub request_timeout: Option<Duration>,
    /// Allow plain `http` to non-loopback hosts.
    pub allow_insecure: bool,
}

impl BackendClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Some(Duration::from_secs(60)),
            allow_insecure: false,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_insecure(mut self, allow_insecure: bool) -> Self {
        self.allow_insecure = allow_insecure;
        self
    }
}

/// Thin wrapper around a configured `reqwest::Client` for the execution backend.
///
/// The client pre-configures default headers and builds requests against a
/// validated base URL.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    http: Client,
    user_agent: String,
    request_timeout: Option<Duration>,
}

impl BackendClient {
    /// Build a client from `config`, validating the base URL first.
    pub fn new(config: BackendClientConfig) -> Result<Self, BackendError> {
        let base_url = validate_base_url(&config.base_url, config.allow_insecure)?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(default_headers)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .build()
            .map_err(|e| BackendError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            http,
            user_agent: format!("blockrun/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS),
            request_timeout: config.request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a request for a method and backend-relative path.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "building request");

        self.http
            .request(method, url)
            .header(header::USER_AGENT, &self.user_agent)
    }

    /// Like [`Self::request`] with the configured request timeout applied.
    fn bounded_request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.request(method, path);
        match self.request_timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }
}

#[async_trait]
impl ExecutionBackend for BackendClient {
    async fn create_run(&self, project_id: &str, spec: &RunSpec) -> Result<RunSummary, BackendError> {
        let response = self
            .bounded_request(Method::POST, &project_path(project_id, &["runs"]))
            .json(spec)
            .send()
            .await?;
        let envelope: RunEnvelope = read_payload(response).await?;
        Ok(envelope.run)
    }

    async fn stream_run(&self, project_id: &str, spec: &RunSpec) -> Result<RunStream, BackendError> {
        let response = self
            .request(Method::POST, &project_path(project_id, &["runs", "stream"]))
            .json(spec)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(read_failure(response).await);
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| BackendError::stream(e.to_string())));
        Ok(stream.boxed())
    }

    async fn list_runs(&self, project_id: &str, query: &RunQuery) -> Result<RunList, BackendError> {
        let response = self
            .bounded_request(Method::GET, &project_path(project_id, &["runs"]))
            .query(&[
                ("limit", query.limit.to_string()),
                ("offset", query.offset.to_string()),
                ("run_type", query.run_type.to_string()),
            ])
            .send()
            .await?;
        read_payload(response).await
    }

    async fn get_run_block(
        &self,
        project_id: &str,
        run_id: &str,
        block_type: &str,
        block_name: &str,
    ) -> Result<JsonValue, BackendError> {
        let path = project_path(project_id, &["runs", run_id, "blocks", block_type, block_name]);
        let response = self.bounded_request(Method::GET, &path).send().await?;
        let envelope: BlockRunEnvelope = read_payload(response).await?;
        Ok(envelope.run)
    }

    async fn list_datasets(&self, project_id: &str) -> Result<DatasetCatalog, BackendError> {
        let response = self
            .bounded_request(Method::GET, &project_path(project_id, &["datasets"]))
            .send()
            .await?;
        let envelope: DatasetsEnvelope = read_payload(response).await?;
        Ok(envelope.datasets)
    }
}

/// `/projects/{project_id}/{segments...}` with every dynamic segment percent-encoded.
fn project_path(project_id: &str, segments: &[&str]) -> String {
    let mut path = format!("/projects/{}", utf8_percent_encode(project_id, PATH_SEGMENT));
    for segment in segments {
        path.push('/');
        path.extend(utf8_percent_encode(segment, PATH_SEGMENT));
    }
    path
}

/// Decode a `{error, response}` envelope, surfacing structured errors as rejections.
async fn read_payload<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let status = response.status();
    let body = response.bytes().await?;

    let envelope: BackendEnvelope<JsonValue> = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(error) if status.is_success() => return Err(BackendError::invalid_response(error.to_string())),
        Err(_) => return Err(BackendError::Status { status: status.as_u16() }),
    };

    if let Some(error) = envelope.error {
        // A structured error under a success status is still a failure.
        let status = if status.is_success() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            status
        };
        warn!(status = status.as_u16(), error = %redact_json(&error), "backend rejected request");
        return Err(BackendError::rejected(status.as_u16(), error));
    }

    if !status.is_success() {
        return Err(BackendError::Status { status: status.as_u16() });
    }

    let payload = envelope
        .response
        .ok_or_else(|| BackendError::invalid_response("missing response payload"))?;
    serde_json::from_value(payload).map_err(|e| BackendError::invalid_response(e.to_string()))
}

/// Turn a non-success response into the matching error.
async fn read_failure(response: Response) -> BackendError {
    let status = response.status().as_u16();
    match read_payload::<JsonValue>(response).await {
        Err(error) => error,
        Ok(_) => BackendError::Status { status },
    }
}

/// Validate a backend base URL and return it without a trailing slash.
///
/// Rules:
/// - scheme must be `http` or `https` and a host must be present
/// - loopback hosts may use either scheme
/// - other hosts must use `https` unless `allow_insecure` is set
pub fn validate_base_url(base: &str, allow_insecure: bool) -> Result<String, BackendError> {
    let parsed = Url::parse(base).map_err(|e| BackendError::config(format!("Invalid backend URL '{base}': {e}")))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(BackendError::config(format!(
            "backend URL must use http or https; got '{scheme}://'"
        )));
    }

    let host = parsed
        .host()
        .ok_or_else(|| BackendError::config("backend URL must include a host"))?;

    let is_loopback = match host {
        Host::Domain(domain) => domain.eq_ignore_ascii_case("localhost"),
        Host::Ipv4(ip) => ip.is_loopback(),
        Host::Ipv6(ip) => ip.is_loopback(),
    };

    if !is_loopback && scheme != "https" && !allow_insecure {
        return Err(BackendError::config(format!(
            "backend URL must use https for non-loopback hosts; got '{scheme}://'"
        )));
    }

    Ok(base.trim_end_matches('/').to_string())
}
