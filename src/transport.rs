//! One-shot HTTP transport with outcome classification.
//!
//! A single entry point issues exactly one network attempt per call and turns
//! the outcome into either the unwrapped `response` payload or one typed
//! error. Classification order is fixed: HTTP 513 (backend temporarily
//! unavailable), HTTP 401 (session expired), then the response envelope's
//! `status.responseStatus`. There is no retry, queuing, or timeout at this
//! layer; timeout policy lives in the underlying HTTP client.
//!
//! The raw HTTP exchange sits behind the [`HttpBackend`] port so the
//! classification logic is testable against scripted fixtures.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::crypto;
use crate::error::{NoDataKind, PortalError, Result};
use crate::session::Session;

/// A fully assembled HTTP request, ready to send.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Raw body bytes, if any.
    pub body: Option<Vec<u8>>,
}

impl BackendRequest {
    /// Returns the first value of the named header, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A raw HTTP response: status code plus body bytes.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

impl BackendResponse {
    /// Convenience constructor for fixtures and adapters.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Failures below the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The host could not be reached (DNS, refused connection, timeout).
    #[error("connection failed: {0}")]
    Connect(String),
    /// Any other failure while sending or reading the exchange.
    #[error("{0}")]
    Other(String),
}

/// Port for the raw HTTP exchange.
///
/// The production adapter is [`ReqwestBackend`]; tests drive the transport
/// with scripted replies instead.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// Performs one HTTP exchange. Exactly one attempt, no retries.
    async fn execute(&self, request: BackendRequest) -> std::result::Result<BackendResponse, BackendError>;
}

/// Production [`HttpBackend`] backed by a shared reqwest client.
pub struct ReqwestBackend {
    client: reqwest::Client,
}

impl ReqwestBackend {
    /// Wraps an already configured reqwest client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn execute(&self, request: BackendRequest) -> std::result::Result<BackendResponse, BackendError> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                BackendError::Connect(e.to_string())
            } else {
                BackendError::Other(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| BackendError::Other(e.to_string()))?
            .to_vec();

        Ok(BackendResponse { status, body })
    }
}

/// Which error kind a failed call maps into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorScope {
    /// Generic API error (the default).
    Api,
    /// Login-flow error.
    Login,
    /// Account-operation (password change) error.
    Account,
}

impl ErrorScope {
    /// HTTP 513: temporary backend unavailability, phrased per scope.
    fn unavailable(self) -> PortalError {
        match self {
            ErrorScope::Api => PortalError::Unavailable,
            ErrorScope::Login => {
                PortalError::login("the portal backend is temporarily unavailable, try again later")
            }
            ErrorScope::Account => {
                PortalError::account("the portal backend is temporarily unavailable, try again later")
            }
        }
    }

    /// Network-level failure: the host could not be reached.
    fn network(self, detail: &str) -> PortalError {
        match self {
            ErrorScope::Api => PortalError::network(detail.to_string()),
            ErrorScope::Login => PortalError::login(format!(
                "cannot reach the portal, check your connection: {detail}"
            )),
            ErrorScope::Account => PortalError::account(format!(
                "cannot reach the portal, check your connection: {detail}"
            )),
        }
    }

    /// Envelope-level failure: `status.responseStatus` was not `"Success"`.
    /// In the API scope, known soft conditions map to the structured no-data
    /// variant; login and account failures are never soft. The raw status
    /// object always survives into the message.
    fn domain(self, status: Value) -> PortalError {
        if self == ErrorScope::Api {
            if let Some(kind) = soft_condition(&status) {
                return PortalError::no_data(kind, status);
            }
        }
        match self {
            ErrorScope::Api => PortalError::api(status),
            ErrorScope::Login => PortalError::login(status.to_string()),
            ErrorScope::Account => PortalError::account(status.to_string()),
        }
    }

    /// Any other unexpected failure, original message preserved.
    fn other(self, detail: String) -> PortalError {
        match self {
            ErrorScope::Api => PortalError::parse(detail),
            ErrorScope::Login => PortalError::login(detail),
            ErrorScope::Account => PortalError::account(detail),
        }
    }
}

/// Recognizes the closed set of soft backend conditions in a status object.
/// Only string values are inspected; key names never match.
fn soft_condition(status: &Value) -> Option<NoDataKind> {
    match status {
        Value::String(s) => {
            let text = s.to_ascii_lowercase();
            if text.contains("no approved") {
                Some(NoDataKind::NoApprovedRequest)
            } else if text.contains("no attendance found")
                || text.contains("no data found")
                || text.contains("no record found")
            {
                Some(NoDataKind::NoDataForPeriod)
            } else {
                None
            }
        }
        Value::Object(map) => map.values().find_map(soft_condition),
        Value::Array(items) => items.iter().find_map(soft_condition),
        _ => None,
    }
}

/// Body of an outgoing request.
#[derive(Debug)]
pub(crate) enum RequestBody {
    /// No body (binary GET).
    Empty,
    /// Plain JSON object.
    Json(Value),
    /// Pre-signed payload, sent as a single JSON string.
    Signed(String),
}

/// One portal call, assembled by a facade method.
#[derive(Debug)]
pub(crate) struct RequestSpec<'a> {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
    pub scope: ErrorScope,
    pub session: Option<&'a Session>,
    pub extra_headers: Vec<(String, String)>,
}

impl<'a> RequestSpec<'a> {
    pub(crate) fn post(path: impl Into<String>, body: RequestBody) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body,
            scope: ErrorScope::Api,
            session: None,
            extra_headers: Vec::new(),
        }
    }

    pub(crate) fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: RequestBody::Empty,
            scope: ErrorScope::Api,
            session: None,
            extra_headers: Vec::new(),
        }
    }

    pub(crate) fn scope(mut self, scope: ErrorScope) -> Self {
        self.scope = scope;
        self
    }

    pub(crate) fn session(mut self, session: &'a Session) -> Self {
        self.session = Some(session);
        self
    }

    pub(crate) fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }
}

/// Classification layer over an [`HttpBackend`].
#[derive(Clone)]
pub(crate) struct Transport {
    backend: Arc<dyn HttpBackend>,
    base_url: String,
}

impl Transport {
    pub(crate) fn new(backend: Arc<dyn HttpBackend>, base_url: impl Into<String>) -> Self {
        Self {
            backend,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Headers attached to every call: JSON content type, a fresh `LocalName`
    /// token, and a bearer token when a session is attached. The session is
    /// captured here, at header-build time.
    fn headers(session: Option<&Session>) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("LocalName".to_string(), crypto::local_name(crypto::today())),
        ];
        if let Some(session) = session {
            headers.push(("Authorization".to_string(), session.bearer()));
        }
        headers
    }

    /// Assembles one exchange and issues the single attempt, mapping
    /// below-HTTP failures per scope.
    async fn send(&self, spec: RequestSpec<'_>) -> Result<BackendResponse> {
        let scope = spec.scope;
        let url = self.url(&spec.path);
        tracing::debug!(%url, method = %spec.method, "issuing portal request");

        let body = match spec.body {
            RequestBody::Empty => None,
            RequestBody::Json(value) => Some(
                serde_json::to_vec(&value)
                    .map_err(|e| PortalError::parse(format!("unserializable body: {e}")))?,
            ),
            // The signed payload travels as a JSON string, quotes included.
            RequestBody::Signed(signed) => Some(
                serde_json::to_vec(&signed)
                    .map_err(|e| PortalError::parse(format!("unserializable body: {e}")))?,
            ),
        };

        // Caller headers are merged after the computed set, so they can
        // override the defaults.
        let mut headers = Self::headers(spec.session);
        headers.extend(spec.extra_headers);

        let request = BackendRequest {
            method: spec.method,
            url,
            headers,
            body,
        };

        self.backend.execute(request).await.map_err(|e| match e {
            BackendError::Connect(detail) => {
                tracing::warn!(%detail, "portal unreachable");
                scope.network(&detail)
            }
            BackendError::Other(detail) => scope.other(detail),
        })
    }

    /// Issues one call and returns the unwrapped `response` payload.
    pub(crate) async fn call(&self, spec: RequestSpec<'_>) -> Result<Value> {
        let scope = spec.scope;
        let response = self.send(spec).await?;
        self.classify(response, scope)
    }

    /// Binary GET that bypasses envelope parsing and returns raw bytes.
    pub(crate) async fn download(&self, path: &str, session: &Session) -> Result<Vec<u8>> {
        let response = self
            .send(
                RequestSpec::get(path)
                    .session(session)
                    .header("Accept", "application/pdf"),
            )
            .await?;

        match response.status {
            513 => Err(PortalError::Unavailable),
            401 => Err(PortalError::SessionExpired),
            200 => Ok(response.body),
            status => Err(PortalError::parse(format!(
                "document download returned HTTP {status}"
            ))),
        }
    }

    /// Fixed classification order: 513, 401, then the response envelope.
    fn classify(&self, response: BackendResponse, scope: ErrorScope) -> Result<Value> {
        match response.status {
            513 => {
                tracing::warn!("portal returned 513, backend temporarily unavailable");
                return Err(scope.unavailable());
            }
            401 => {
                tracing::warn!("portal returned 401, session expired");
                return Err(PortalError::SessionExpired);
            }
            _ => {}
        }

        let mut envelope: Value = serde_json::from_slice(&response.body).map_err(|e| {
            scope.other(format!(
                "malformed envelope (HTTP {}): {e}",
                response.status
            ))
        })?;

        let response_status = envelope
            .get("status")
            .and_then(|s| s.get("responseStatus"))
            .and_then(Value::as_str);

        if response_status == Some("Success") {
            return Ok(envelope.get_mut("response").map(Value::take).unwrap_or(Value::Null));
        }

        let status = envelope.get("status").cloned().unwrap_or(Value::Null);
        tracing::warn!(%status, "portal reported a non-success status");
        Err(scope.domain(status))
    }
}
