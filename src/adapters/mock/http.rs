//! Mock HTTP client for testing.
//!
//! Provides a configurable mock HTTP client that can return predefined
//! responses or errors, optionally after a delay, and records every request.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::traits::{Headers, HttpClient, HttpError, Response};

/// A recorded HTTP request for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request URL
    pub url: String,
    /// Request headers
    pub headers: Headers,
}

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return a successful response
    Success(Response),
    /// Return an error
    Error(HttpError),
}

impl MockResponse {
    /// `200 {"status":"ok"}`
    pub fn healthy() -> Self {
        MockResponse::Success(Response::json_body(200, &serde_json::json!({"status": "ok"})))
    }

    /// `503 {"status":"error"}`
    pub fn unhealthy() -> Self {
        MockResponse::Success(Response::json_body(503, &serde_json::json!({"status": "error"})))
    }

    /// A timeout-class transport error.
    pub fn timeout() -> Self {
        MockResponse::Error(HttpError::Timeout("mock timeout".to_string()))
    }

    /// A non-temporary transport error.
    pub fn refused() -> Self {
        MockResponse::Error(HttpError::ConnectionFailed("connection refused".to_string()))
    }
}

#[derive(Debug, Default)]
struct Route {
    /// Served first, one per request
    queue: VecDeque<MockResponse>,
    /// Served once the queue is drained
    sticky: Option<MockResponse>,
}

impl Route {
    fn next(&mut self) -> Option<MockResponse> {
        self.queue.pop_front().or_else(|| self.sticky.clone())
    }
}

/// Mock HTTP client for testing.
///
/// # Example
///
/// ```ignore
/// use poslink::adapters::mock::{MockHttpClient, MockResponse};
///
/// let client = MockHttpClient::new();
/// client.push_responses(
///     "http://192.168.1.50:3737/health",
///     vec![MockResponse::timeout(), MockResponse::healthy()],
/// );
/// ```
#[derive(Debug, Clone)]
pub struct MockHttpClient {
    /// Configured responses by URL (exact, then prefix)
    routes: Arc<Mutex<HashMap<String, Route>>>,
    /// Default response when no specific match
    default_response: Arc<Mutex<Option<MockResponse>>>,
    /// Recorded requests for verification
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    /// Artificial latency before answering
    delay: Arc<Mutex<Option<Duration>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockHttpClient {
    /// Create a new mock HTTP client.
    pub fn new() -> Self {
        Self {
            routes: Arc::new(Mutex::new(HashMap::new())),
            default_response: Arc::new(Mutex::new(None)),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: Arc::new(Mutex::new(None)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the response served for `url` whenever its queue is empty.
    pub fn set_response(&self, url: &str, response: MockResponse) {
        let mut routes = self.routes.lock().unwrap();
        routes.entry(url.to_string()).or_default().sticky = Some(response);
    }

    /// Queue responses served in order before the sticky one.
    pub fn push_responses(&self, url: &str, responses: Vec<MockResponse>) {
        let mut routes = self.routes.lock().unwrap();
        routes
            .entry(url.to_string())
            .or_default()
            .queue
            .extend(responses);
    }

    /// Set a default response for URLs without specific matches.
    pub fn set_default_response(&self, response: MockResponse) {
        *self.default_response.lock().unwrap() = Some(response);
    }

    /// Delay every response by `delay`.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Get all recorded requests.
    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests made to exactly `url`.
    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url == url)
            .count()
    }

    /// Total number of requests made.
    pub fn total_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Highest number of requests that were outstanding at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Clear all recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    fn record_request(&self, url: &str, headers: &Headers) {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_string(),
            headers: headers.clone(),
        });
    }

    fn get_response(&self, url: &str) -> Option<MockResponse> {
        let mut routes = self.routes.lock().unwrap();

        // First try exact match
        if let Some(route) = routes.get_mut(url) {
            if let Some(response) = route.next() {
                return Some(response);
            }
        }

        // Then try prefix match (for URL patterns)
        for (pattern, route) in routes.iter_mut() {
            if url.starts_with(pattern.as_str()) {
                if let Some(response) = route.next() {
                    return Some(response);
                }
            }
        }

        // Finally use default
        self.default_response.lock().unwrap().clone()
    }
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.record_request(url, headers);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.get_response(url) {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            None => Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_then_sticky() {
        let client = MockHttpClient::new();
        let url = "http://10.0.0.2:3737/health";
        client.set_response(url, MockResponse::healthy());
        client.push_responses(url, vec![MockResponse::timeout()]);

        let first = client.get(url, &Headers::new()).await;
        assert!(matches!(first, Err(HttpError::Timeout(_))));
        let second = client.get(url, &Headers::new()).await.unwrap();
        assert_eq!(second.status, 200);
        let third = client.get(url, &Headers::new()).await.unwrap();
        assert_eq!(third.status, 200);
        assert_eq!(client.request_count(url), 3);
    }

    #[tokio::test]
    async fn test_unconfigured_url_errors() {
        let client = MockHttpClient::new();
        let result = client.get("http://nowhere/health", &Headers::new()).await;
        assert!(matches!(result, Err(HttpError::Other(_))));
    }

    #[tokio::test]
    async fn test_default_response() {
        let client = MockHttpClient::new();
        client.set_default_response(MockResponse::unhealthy());
        let response = client.get("http://any/health", &Headers::new()).await.unwrap();
        assert_eq!(response.status, 503);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_tracks_in_flight() {
        let client = MockHttpClient::new();
        client.set_default_response(MockResponse::healthy());
        client.set_delay(Some(Duration::from_millis(100)));

        let headers = Headers::new();
        let (a, b) = tokio::join!(
            client.get("http://a/health", &headers),
            client.get("http://b/health", &headers)
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(client.max_in_flight(), 2);
    }
}
