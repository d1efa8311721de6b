//! HTTP seam for webhook delivery.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;

/// Response to a webhook POST.
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

/// The POST never produced an HTTP response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("webhook delivery failed: {0}")]
pub struct HttpError(pub String);

/// Sends form-encoded POSTs to partner sites.
///
/// The dispatcher treats every error as a per-site delivery failure; nothing
/// from this trait propagates past the dispatch report.
pub trait HttpClient: Send + Sync {
    /// POSTs a form to `url` with the given timeout.
    fn post_form(
        &self,
        url: &str,
        fields: &[(String, String)],
        timeout: Duration,
    ) -> Result<HttpResponse, HttpError>;
}

/// One request captured by [`RecordingClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRequest {
    /// Target URL.
    pub url: String,
    /// Form fields in send order.
    pub fields: Vec<(String, String)>,
}

impl SentRequest {
    /// The value of a form field, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Test client that records every request.
///
/// Scripted responses are consumed in order; once exhausted, requests
/// succeed with an empty 200.
#[derive(Debug, Default)]
pub struct RecordingClient {
    requests: Mutex<Vec<SentRequest>>,
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
}

impl RecordingClient {
    /// Creates a client that answers every request with an empty 200.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for the next request.
    pub fn push_response(&self, response: HttpResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    /// Queues a delivery failure for the next request.
    pub fn push_failure(&self, reason: &str) {
        self.responses.lock().push_back(Err(HttpError(reason.into())));
    }

    /// All requests sent so far.
    pub fn requests(&self) -> Vec<SentRequest> {
        self.requests.lock().clone()
    }
}

impl HttpClient for RecordingClient {
    fn post_form(
        &self,
        url: &str,
        fields: &[(String, String)],
        _timeout: Duration,
    ) -> Result<HttpResponse, HttpError> {
        self.requests.lock().push(SentRequest {
            url: url.into(),
            fields: fields.to_vec(),
        });
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(HttpResponse::ok("")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_client_captures_and_scripts() {
        let client = RecordingClient::new();
        client.push_failure("timed out");

        let fields = vec![("action".to_string(), "test_connection".to_string())];
        let first = client.post_form("https://a.test", &fields, Duration::from_secs(1));
        assert!(first.is_err());

        // Unscripted requests default to an empty 200.
        let second = client.post_form("https://b.test", &fields, Duration::from_secs(1));
        assert_eq!(second.unwrap().status, 200);

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].field("action"), Some("test_connection"));
    }
}
