//! HTTP transport capability
//!
//! Normalizes a single HTTP request into a success value or a structured
//! error. Two delivery modes:
//!
//! - [`Transport::send`] — awaited request/response, used by geolocation,
//!   flag fetch, identity reconciliation, and the retry queue.
//! - [`Transport::send_beacon`] — fire-and-forget best-effort POST, used
//!   for page-exit events where the page may terminate before a queued
//!   retry could ever run.
//!
//! Known crawler user agents are acknowledged without delivery so bot
//! traffic never reaches the collection endpoint.

mod error;

pub use error::{Result, TransportError};

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Request timeout for awaited sends
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Shorter timeout for fire-and-forget beacons
const BEACON_TIMEOUT: Duration = Duration::from_secs(3);

/// HTTP method for a transport request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// A single outbound request.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Header name/value pairs
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Option<String>,
}

impl Request {
    /// A bare GET request.
    #[must_use]
    pub fn get() -> Self {
        Self {
            method: Method::Get,
            headers: Vec::new(),
            body: None,
        }
    }

    /// A POST request with a JSON body.
    #[must_use]
    pub fn post_json(body: &Value) -> Self {
        Self {
            method: Method::Post,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(body.to_string()),
        }
    }
}

/// A normalized response body.
///
/// GET endpoints return parseable JSON; POST acknowledgements from the
/// collection endpoint are empty or plain text.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Body parsed as JSON
    Json(Value),
    /// Body kept as raw text
    Text(String),
}

impl Response {
    /// The JSON value, if this response parsed as JSON.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }
}

/// Shared transport handle.
pub type SharedTransport = Arc<dyn Transport>;

/// HTTP transport capability.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request, normalizing the outcome.
    ///
    /// # Errors
    ///
    /// [`TransportError::Status`] on a non-2xx answer,
    /// [`TransportError::Network`] when the request never completes.
    async fn send(&self, url: &str, request: Request) -> Result<Response>;

    /// Fire-and-forget POST. Never awaited by callers, never fails them.
    fn send_beacon(&self, url: &str, body: String);
}

/// Whether a user agent belongs to a known crawler.
///
/// Matches the same bot/crawl/spider markers the collection pipeline
/// filters on; queue processors skip delivery for these.
pub fn is_bot_user_agent(user_agent: &str) -> bool {
    static BOT_RE: OnceLock<Regex> = OnceLock::new();
    let re = BOT_RE.get_or_init(|| Regex::new(r"(?i)bot|crawl|spider").unwrap());
    re.is_match(user_agent)
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    beacon_client: reqwest::Client,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    /// Create a transport with default timeouts.
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();
        let beacon_client = reqwest::Client::builder()
            .timeout(BEACON_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            beacon_client,
        }
    }

    /// Wrap in a shared handle.
    #[must_use]
    pub fn shared() -> SharedTransport {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, url: &str, request: Request) -> Result<Response> {
        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network {
                url: url.to_string(),
                method: request.method,
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            // GET responses parse as JSON; collection acknowledgements are
            // plain text or empty.
            match serde_json::from_str(&text) {
                Ok(value) => Ok(Response::Json(value)),
                Err(_) => Ok(Response::Text(text)),
            }
        } else {
            Err(TransportError::Status {
                url: url.to_string(),
                method: request.method,
                status: status.as_u16(),
                body: if text.is_empty() {
                    "network failure".to_string()
                } else {
                    text
                },
            })
        }
    }

    fn send_beacon(&self, url: &str, body: String) {
        let client = self.beacon_client.clone();
        let url = url.to_string();
        let _ = tokio::spawn(async move {
            let result = client
                .post(&url)
                .header("Content-Type", "application/json")
                .body(body)
                .send()
                .await;
            if let Err(e) = result {
                debug!(url = %url, error = %e, "beacon delivery failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_get() {
        let request = Request::get();
        assert_eq!(request.method, Method::Get);
        assert!(request.headers.is_empty());
        assert!(request.body.is_none());
    }

    #[test]
    fn test_request_post_json() {
        let request = Request::post_json(&serde_json::json!({"ukid": "u-1"}));
        assert_eq!(request.method, Method::Post);
        assert_eq!(
            request.headers,
            vec![("Content-Type".to_string(), "application/json".to_string())]
        );
        assert!(request.body.unwrap().contains("u-1"));
    }

    #[test]
    fn test_response_as_json() {
        let response = Response::Json(serde_json::json!({"ok": true}));
        assert!(response.as_json().is_some());
        assert!(Response::Text("ok".to_string()).as_json().is_none());
    }

    #[test]
    fn test_bot_user_agent_detection() {
        assert!(is_bot_user_agent("Googlebot/2.1"));
        assert!(is_bot_user_agent("some-CRAWLer"));
        assert!(is_bot_user_agent("my spider agent"));
        assert!(!is_bot_user_agent(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)"
        ));
    }

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Post.to_string(), "POST");
    }
}
