//! HTTP seam for the license server and the update feed.

use crate::config::LicenseConfig;
use parking_lot::Mutex;
use std::collections::VecDeque;
use thiserror::Error;

/// A raw HTTP exchange outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// A 200 response with the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// The request never produced an HTTP response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("license server unreachable: {0}")]
pub struct TransportError(pub String);

/// Sends requests to the license server and the update feed.
///
/// Implementations honor `config.timeout` and `config.verify_tls`. Errors
/// from this trait never propagate past the license manager: an unreachable
/// server degrades into cached state.
pub trait LicenseTransport: Send + Sync {
    /// POSTs a form to the license server.
    fn post_form(
        &self,
        url: &str,
        fields: &[(String, String)],
        config: &LicenseConfig,
    ) -> Result<HttpResponse, TransportError>;

    /// GETs a resource, used for the plugin update feed.
    fn get(&self, url: &str, config: &LicenseConfig) -> Result<HttpResponse, TransportError>;
}

/// Scripted license server for tests.
///
/// Responses are consumed in order; every received request is recorded.
#[derive(Debug, Default)]
pub struct MockLicenseServer {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// One request seen by [`MockLicenseServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Target URL.
    pub url: String,
    /// Form fields for POSTs; empty for GETs.
    pub fields: Vec<(String, String)>,
}

impl MockLicenseServer {
    /// Creates a server with no scripted responses; requests will error.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    pub fn push_response(&self, response: HttpResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    /// Queues a transport failure.
    pub fn push_unreachable(&self) {
        self.responses
            .lock()
            .push_back(Err(TransportError("connection refused".into())));
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Form field value from the `index`-th recorded request.
    pub fn field(&self, index: usize, name: &str) -> Option<String> {
        self.requests.lock().get(index).and_then(|req| {
            req.fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        })
    }

    fn next(&self, url: &str, fields: &[(String, String)]) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(RecordedRequest {
            url: url.into(),
            fields: fields.to_vec(),
        });
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError("no scripted response".into())))
    }
}

impl LicenseTransport for MockLicenseServer {
    fn post_form(
        &self,
        url: &str,
        fields: &[(String, String)],
        _config: &LicenseConfig,
    ) -> Result<HttpResponse, TransportError> {
        self.next(url, fields)
    }

    fn get(&self, url: &str, _config: &LicenseConfig) -> Result<HttpResponse, TransportError> {
        self.next(url, &[])
    }
}
