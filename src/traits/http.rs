//! HTTP client trait abstraction.
//!
//! Provides a trait-based abstraction for the outbound requests the
//! resilience layer makes (health probes and candidate verification),
//! enabling dependency injection and mocking in tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;

/// HTTP headers represented as a key-value map.
pub type Headers = HashMap<String, String>;

/// HTTP response wrapper.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Headers,
    /// Response body
    pub body: Bytes,
}

impl Response {
    /// Create a new response.
    pub fn new(status: u16, body: Bytes) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body,
        }
    }

    /// Create a new response with headers.
    pub fn with_headers(status: u16, headers: Headers, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create a JSON response from any serializable value.
    pub fn json_body(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, Bytes::from(value.to_string()))
    }

    /// Check if the response indicates success (2xx status).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get the response body as a string.
    pub fn text(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body.to_vec())
    }

    /// Parse the response body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// HTTP client errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// Connection failed
    ConnectionFailed(String),
    /// Connection was reset by the peer mid-request
    ConnectionReset(String),
    /// Request timeout
    Timeout(String),
    /// Server returned an error status
    ServerError { status: u16, message: String },
    /// Request was cancelled
    Cancelled,
    /// Invalid URL
    InvalidUrl(String),
    /// Other error
    Other(String),
}

impl HttpError {
    /// Whether the failure is a transient, timeout-class error that a
    /// short local retry is likely to get past.
    pub fn is_temporary(&self) -> bool {
        matches!(self, HttpError::Timeout(_) | HttpError::ConnectionReset(_))
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            HttpError::ConnectionReset(msg) => write!(f, "Connection reset: {}", msg),
            HttpError::Timeout(msg) => write!(f, "Request timeout: {}", msg),
            HttpError::ServerError { status, message } => {
                write!(f, "Server error ({}): {}", status, message)
            }
            HttpError::Cancelled => write!(f, "Request cancelled"),
            HttpError::InvalidUrl(msg) => write!(f, "Invalid URL: {}", msg),
            HttpError::Other(msg) => write!(f, "HTTP error: {}", msg),
        }
    }
}

impl std::error::Error for HttpError {}

/// Trait for HTTP client operations.
///
/// Implementations include the production reqwest-based client and the
/// mock client in [`crate::adapters::mock`].
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform a GET request.
    async fn get(&self, url: &str, headers: &Headers) -> Result<Response, HttpError>;

    /// Perform a GET request bounded by `timeout`.
    ///
    /// The default wraps [`HttpClient::get`] in a tokio timer; adapters with
    /// native request timeouts should override it.
    async fn get_with_timeout(
        &self,
        url: &str,
        headers: &Headers,
        timeout: Duration,
    ) -> Result<Response, HttpError> {
        match tokio::time::timeout(timeout, self.get(url, headers)).await {
            Ok(result) => result,
            Err(_) => Err(HttpError::Timeout(format!(
                "no response from {} within {:?}",
                url, timeout
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_is_success() {
        assert!(Response::new(200, Bytes::new()).is_success());
        assert!(Response::new(204, Bytes::new()).is_success());
        assert!(!Response::new(300, Bytes::new()).is_success());
        assert!(!Response::new(503, Bytes::new()).is_success());
    }

    #[test]
    fn test_response_json() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct Health {
            status: String,
        }

        let response = Response::json_body(200, &serde_json::json!({"status": "ok"}));
        let data: Health = response.json().unwrap();
        assert_eq!(data.status, "ok");
        assert_eq!(response.text().unwrap(), r#"{"status":"ok"}"#);
    }

    #[test]
    fn test_http_error_is_temporary() {
        assert!(HttpError::Timeout("5s".to_string()).is_temporary());
        assert!(HttpError::ConnectionReset("peer".to_string()).is_temporary());
        assert!(!HttpError::ConnectionFailed("refused".to_string()).is_temporary());
        assert!(!HttpError::ServerError {
            status: 503,
            message: "down".to_string()
        }
        .is_temporary());
        assert!(!HttpError::Cancelled.is_temporary());
    }

    #[test]
    fn test_http_error_display() {
        assert_eq!(
            HttpError::Timeout("5s".to_string()).to_string(),
            "Request timeout: 5s"
        );
        assert_eq!(
            HttpError::ServerError {
                status: 500,
                message: "Internal Error".to_string()
            }
            .to_string(),
            "Server error (500): Internal Error"
        );
        assert_eq!(HttpError::Cancelled.to_string(), "Request cancelled");
    }

    struct NeverResponds;

    #[async_trait]
    impl HttpClient for NeverResponds {
        async fn get(&self, _url: &str, _headers: &Headers) -> Result<Response, HttpError> {
            futures::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_get_with_timeout_elapses() {
        let client = NeverResponds;
        let result = client
            .get_with_timeout("http://10.0.0.9/health", &Headers::new(), Duration::from_secs(5))
            .await;
        match result {
            Err(err) => assert!(err.is_temporary()),
            Ok(_) => panic!("expected timeout"),
        }
    }
}
